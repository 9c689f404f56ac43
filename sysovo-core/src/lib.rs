//! Sysovo board engine: ordered boards, lists and cards, drag-and-drop
//! reordering applied locally first, and minimal background persistence.

pub mod dispatch;
pub mod edit;
pub mod error;
pub mod position;
pub mod reconcile;
pub mod reorder;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod view;

pub use dispatch::{DispatchReport, DispatchTicket, SyncDispatcher};
pub use error::{ActionError, LoadError, PersistError, ValidationError};
pub use reconcile::{reconcile, ChangeSet};
pub use reorder::{reorder, try_reorder, DragEvent, DropLocation, ReorderOutcome};
pub use session::{BoardSession, Created, SyncPhase};
pub use storage::{ApiError, BoardApi};
pub use store::LocalBoardStore;
pub use view::AssignedView;
