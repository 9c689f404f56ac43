//! Fire-and-forget persistence of a change-set.
//!
//! Every update becomes its own tokio task: no ordering between them, no
//! retry, no rollback. Failures are logged. The returned ticket can be
//! dropped to detach the tasks or awaited to observe how they settled.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::PersistError;
use crate::reconcile::ChangeSet;
use crate::storage::{ApiError, BoardApi};
use crate::types::EntityKind;

type PersistResult = Result<String, PersistError>;

pub struct SyncDispatcher {
    api: Arc<dyn BoardApi>,
}

impl SyncDispatcher {
    pub fn new(api: Arc<dyn BoardApi>) -> Self {
        Self { api }
    }

    /// Spawn one persistence call per update. Must be called from within a
    /// tokio runtime. Returns immediately.
    pub fn dispatch(&self, changes: ChangeSet) -> DispatchTicket {
        let mut handles = Vec::with_capacity(changes.len());

        for update in changes.lists {
            let api = Arc::clone(&self.api);
            handles.push(tokio::spawn(async move {
                let result = api.update_list(&update.id, &update.patch).await;
                settle(EntityKind::List, update.id, result.map(|_| ()))
            }));
        }

        for update in changes.cards {
            let api = Arc::clone(&self.api);
            handles.push(tokio::spawn(async move {
                let result = api.update_card(&update.id, &update.patch).await;
                settle(EntityKind::Card, update.id, result.map(|_| ()))
            }));
        }

        log::debug!(
            target: "sysovo.sync.dispatch",
            "Dispatched {} update(s)",
            handles.len()
        );
        DispatchTicket { handles }
    }
}

fn settle(
    kind: EntityKind,
    id: String,
    result: Result<(), ApiError>,
) -> PersistResult {
    match result {
        Ok(()) => Ok(id),
        Err(source) => {
            let err = PersistError { kind, id, source };
            log::warn!(target: "sysovo.sync.dispatch", "{}", err);
            Err(err)
        }
    }
}

/// Handles of the tasks spawned for one change-set. Dropping the ticket
/// detaches them; they still run to completion.
#[derive(Debug)]
#[must_use = "drop the ticket explicitly to detach, or await `settled`"]
pub struct DispatchTicket {
    handles: Vec<JoinHandle<PersistResult>>,
}

impl DispatchTicket {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task and collect the outcome.
    pub async fn settled(self) -> DispatchReport {
        let mut report = DispatchReport::default();
        for handle in self.handles {
            match handle.await {
                Ok(Ok(id)) => report.succeeded.push(id),
                Ok(Err(err)) => report.failed.push(err),
                Err(join_err) => {
                    log::error!(
                        target: "sysovo.sync.dispatch",
                        "Persistence task did not finish: {}",
                        join_err
                    );
                    report.aborted += 1;
                }
            }
        }
        report
    }
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Ids of the entities whose update was accepted.
    pub succeeded: Vec<String>,
    pub failed: Vec<PersistError>,
    /// Tasks that panicked or were cancelled by runtime shutdown.
    pub aborted: usize,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.aborted == 0
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|e| e.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use crate::reorder::{reorder, DragEvent};
    use crate::storage::memory::MemoryApi;
    use crate::types::{Board, BoardList, BoardState, Card, CardStatus};

    fn make_card(id: &str, list_id: &str, position: usize) -> Card {
        Card {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            list_id: list_id.to_string(),
            position,
            assigned_to: None,
            status: CardStatus::Pending,
            due_date: None,
        }
    }

    fn make_state() -> BoardState {
        BoardState::new(
            "b1",
            vec![
                BoardList {
                    id: "L1".to_string(),
                    title: "Todo".to_string(),
                    board_id: "b1".to_string(),
                    position: 0,
                    cards: vec![make_card("A", "L1", 0), make_card("B", "L1", 1)],
                },
                BoardList {
                    id: "L2".to_string(),
                    title: "Done".to_string(),
                    board_id: "b1".to_string(),
                    position: 1,
                    cards: Vec::new(),
                },
            ],
        )
    }

    fn seeded(state: &BoardState) -> Arc<MemoryApi> {
        let api = Arc::new(MemoryApi::new());
        api.seed(
            Board {
                id: "b1".to_string(),
                name: "Board".to_string(),
                description: None,
                created_by: None,
                members: Vec::new(),
            },
            state,
        );
        api
    }

    #[tokio::test]
    async fn test_dispatch_persists_every_update() {
        let old = make_state();
        let api = seeded(&old);
        let dispatcher = SyncDispatcher::new(api.clone());

        let new = reorder(&old, &DragEvent::card("A", ("L1", 0), ("L2", 0)));
        let ticket = dispatcher.dispatch(reconcile(&old, &new));
        assert_eq!(ticket.len(), 2);

        let report = ticket.settled().await;
        assert!(report.is_clean());
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(api.update_calls(), 2);

        let a = api.card("A").unwrap();
        assert_eq!((a.list_id.as_str(), a.position), ("L2", 0));
        assert_eq!(api.card("B").unwrap().position, 0);
    }

    #[tokio::test]
    async fn test_empty_change_set_spawns_nothing() {
        let api = seeded(&make_state());
        let dispatcher = SyncDispatcher::new(api.clone());
        let ticket = dispatcher.dispatch(ChangeSet::default());
        assert!(ticket.is_empty());
        assert!(ticket.settled().await.is_clean());
        assert_eq!(api.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_others_still_land() {
        let old = make_state();
        let api = seeded(&old);
        api.fail_on("B");
        let dispatcher = SyncDispatcher::new(api.clone());

        let new = reorder(&old, &DragEvent::card("A", ("L1", 0), ("L2", 0)));
        let report = dispatcher.dispatch(reconcile(&old, &new)).settled().await;

        assert_eq!(report.succeeded, vec!["A".to_string()]);
        assert_eq!(report.failed_ids(), vec!["B"]);
        let err = &report.failed[0];
        assert_eq!(err.kind, EntityKind::Card);
        assert!(matches!(err.source, ApiError::Unavailable(_)));
        // not retried, not rolled back
        assert_eq!(api.update_calls(), 2);
        assert_eq!(api.card("B").unwrap().position, 1);
    }

    #[tokio::test]
    async fn test_dropped_ticket_still_completes() {
        let old = make_state();
        let api = seeded(&old);
        let dispatcher = SyncDispatcher::new(api.clone());

        let new = reorder(&old, &DragEvent::list("b1", "L2", 1, 0));
        drop(dispatcher.dispatch(reconcile(&old, &new)));

        for _ in 0..100 {
            if api.update_calls() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(api.list("L2").unwrap().position, 0);
        assert_eq!(api.list("L1").unwrap().position, 1);
    }
}
