//! Argument parsing and command execution for `sysovo-board`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use sysovo_core::storage::BoardApi;
use sysovo_core::types::{BoardState, CardPatch, CardStatus};
use sysovo_core::{
    try_reorder, ActionError, ApiError, AssignedView, BoardSession, DispatchTicket, DragEvent,
    LoadError, ValidationError,
};

use crate::config::{default_config_path, load_config, ClientConfig};
use crate::http::HttpBoardApi;

/// sysovo-board - inspect and reorder dashboard boards.
///
/// Moves are applied to the loaded board first and then saved with one
/// update per changed list or card.
#[derive(Parser, Debug)]
#[command(name = "sysovo-board")]
#[command(version)]
#[command(about = "Inspect and reorder dashboard boards")]
#[command(
    long_about = "Inspect and reorder dashboard boards.\n\n\
    Environment variables:\n  \
    SYSOVO_API_URL   Override the API base URL\n  \
    SYSOVO_TOKEN     Bearer token for the API\n  \
    SYSOVO_ACTOR_ID  Your user id, for `mine`, `boards --mine` and `status`\n  \
    RUST_LOG         Log filter (default: warn)"
)]
pub struct Cli {
    /// Config file (default: <config dir>/sysovo/client.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List boards
    Boards {
        /// Only boards you are a member of
        #[arg(long)]
        mine: bool,
    },

    /// Print lists and cards
    Show { board: String },

    /// Print only cards assigned to you
    Mine { board: String },

    /// Move a list to a new index
    MoveList {
        board: String,
        list: String,
        index: usize,
    },

    /// Move a card, possibly to another list
    MoveCard {
        board: String,
        card: String,
        /// Destination list
        list: String,
        index: usize,
    },

    /// Set the status of one of your cards
    Status {
        board: String,
        card: String,
        /// Pending, "In Progress", OnHold or Completed
        #[arg(value_parser = parse_status)]
        status: CardStatus,
    },

    /// Create a board
    NewBoard {
        name: String,
        description: Option<String>,
    },

    /// Delete a board with its lists and cards
    RmBoard { board: String },

    /// Add users to a board
    AddMembers {
        board: String,
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        users: Vec<String>,
        /// Add every employee
        #[arg(long)]
        all: bool,
    },

    /// Append a list
    AddList { board: String, title: String },

    /// Append a card
    AddCard {
        board: String,
        list: String,
        title: String,
    },

    /// Delete a list and its cards
    RmList { board: String, list: String },

    /// Delete a card
    RmCard { board: String, card: String },
}

fn parse_status(raw: &str) -> Result<CardStatus, String> {
    CardStatus::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = CardStatus::ALL.iter().map(CardStatus::as_str).collect();
        format!("unknown status {:?}, expected one of {}", raw, known.join(", "))
    })
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("No actor configured; set SYSOVO_ACTOR_ID or actorId in the config file")]
    NoActor,

    #[error("{0} update(s) could not be saved")]
    Persist(usize),
}

pub fn resolve_config(cli: &Cli) -> ClientConfig {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    load_config(&path).with_env()
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(&cli);
    log::debug!(target: "sysovo.cli", "Using API at {}", config.api_url);
    let api: Arc<dyn BoardApi> = Arc::new(HttpBoardApi::new(&config)?);
    execute(api, &config, cli.command).await
}

/// Run one command against `api`, printing results to stdout.
pub async fn execute(
    api: Arc<dyn BoardApi>,
    config: &ClientConfig,
    command: Command,
) -> Result<(), CliError> {
    let mut session = BoardSession::new(api);
    let actor = || -> Result<AssignedView, CliError> {
        config
            .actor_id
            .as_deref()
            .map(AssignedView::new)
            .ok_or(CliError::NoActor)
    };

    match command {
        Command::Boards { mine } => {
            let boards = session.list_boards().await?;
            let view = if mine { Some(actor()?) } else { None };
            let shown: Vec<_> = match &view {
                Some(view) => view.visible_boards(&boards),
                None => boards.iter().collect(),
            };
            for board in shown {
                println!("{}\t{}\t{} member(s)", board.id, board.name, board.members.len());
            }
        }
        Command::Show { board } => {
            session.open(&board).await?;
            print!("{}", render_board(session.state()));
        }
        Command::Mine { board } => {
            let view = actor()?;
            session.open(&board).await?;
            print!("{}", render_board(&view.filter(session.state())));
        }
        Command::MoveList { board, list, index } => {
            session.open(&board).await?;
            let from = session
                .state()
                .list_index(&list)
                .ok_or_else(|| ValidationError::UnknownList(list.clone()))?;
            let drag = DragEvent::list(&board, &list, from, index);
            apply_drag(&mut session, &drag).await?;
        }
        Command::MoveCard {
            board,
            card,
            list,
            index,
        } => {
            session.open(&board).await?;
            let state = session.state();
            let (li, ci) = state
                .find_card(&card)
                .ok_or_else(|| ValidationError::UnknownCard(card.clone()))?;
            let source = state.lists[li].id.clone();
            let drag = DragEvent::card(&card, (&source, ci), (&list, index));
            apply_drag(&mut session, &drag).await?;
        }
        Command::Status {
            board,
            card,
            status,
        } => {
            let view = actor()?;
            session.open(&board).await?;
            let mine = view.filter(session.state());
            if mine.card(&card).is_none() {
                return Err(ValidationError::UnknownCard(card).into());
            }
            let patch = CardPatch::status(status);
            view.authorize(&patch)?;
            let updated = session.update_card(&card, &patch).await?;
            println!("{}\t{}", updated.id, updated.status);
        }
        Command::NewBoard { name, description } => {
            let created = session.create_board(&name, description.as_deref()).await?;
            println!("{}\t{}", created.id, created.name);
        }
        Command::RmBoard { board } => {
            session.delete_board(&board).await?;
        }
        Command::AddMembers { board, users, all } => {
            let added = if all {
                session.add_all_employees(&board).await?
            } else {
                session.add_members(&board, &users).await?
            };
            println!("added {} member(s)", added);
        }
        Command::AddList { board, title } => {
            session.open(&board).await?;
            let created = session.create_list(&title).await?;
            let list = &created.entity;
            println!("{}\t{}\t{}", list.id, list.position, list.title);
            settle(created.ticket).await?;
        }
        Command::AddCard { board, list, title } => {
            session.open(&board).await?;
            let created = session.create_card(&list, &title).await?;
            let card = &created.entity;
            println!("{}\t{}\t{}", card.id, card.position, card.title);
            settle(created.ticket).await?;
        }
        Command::RmList { board, list } => {
            session.open(&board).await?;
            let ticket = session.delete_list(&list).await?;
            settle(ticket).await?;
        }
        Command::RmCard { board, card } => {
            session.open(&board).await?;
            let ticket = session.delete_card(&card).await?;
            settle(ticket).await?;
        }
    }
    Ok(())
}

async fn apply_drag(session: &mut BoardSession, drag: &DragEvent) -> Result<(), CliError> {
    // surface malformed moves instead of silently ignoring them
    try_reorder(session.state(), drag)?;
    session.begin_drag();
    let ticket = session.drop_drag(drag);
    if ticket.is_none() {
        println!("nothing to move");
    }
    settle(ticket).await
}

async fn settle(ticket: Option<DispatchTicket>) -> Result<(), CliError> {
    let Some(ticket) = ticket else {
        return Ok(());
    };
    let report = ticket.settled().await;
    println!("saved {} update(s)", report.succeeded.len());
    let failed = report.failed.len() + report.aborted;
    if failed > 0 {
        return Err(CliError::Persist(failed));
    }
    Ok(())
}

/// Plain-text rendering: one line per list, cards indented below it.
pub fn render_board(state: &BoardState) -> String {
    let mut out = String::new();
    for list in &state.lists {
        out.push_str(&format!("[{}] {} ({})\n", list.position, list.title, list.id));
        for card in &list.cards {
            let assignee = card
                .assigned_to
                .as_ref()
                .map(|a| format!(" @{}", a.id()))
                .unwrap_or_default();
            let due = card
                .due_date
                .map(|d| format!(" due {}", d.format("%Y-%m-%d")))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {}. {} <{}>{}{} ({})\n",
                card.position, card.title, card.status, assignee, due, card.id
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysovo_core::storage::memory::MemoryApi;
    use sysovo_core::types::UserShort;

    fn parse(raw: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sysovo-board").chain(raw.iter().copied()))
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_move_card_with_config() {
        let cli = parse(&["--config", "/tmp/c.json", "move-card", "b1", "c1", "l2", "3"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        assert_eq!(
            cli.command,
            Command::MoveCard {
                board: "b1".to_string(),
                card: "c1".to_string(),
                list: "l2".to_string(),
                index: 3,
            }
        );

        // global flag after the subcommand
        let cli = parse(&["show", "b1", "--config", "/tmp/d.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/d.json")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["fly"]).is_err());
        assert!(parse(&["move-list", "b1", "l1", "first"]).is_err());
        assert!(parse(&["status", "b1", "c1", "done"]).is_err());
        assert!(parse(&["add-members", "b1"]).is_err());
        assert!(parse(&["add-members", "b1", "u1", "--all"]).is_err());
    }

    #[test]
    fn test_parse_status_boards_and_members() {
        let cli = parse(&["status", "b1", "c1", "In Progress"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Status { status: CardStatus::InProgress, .. }
        ));
        let cli = parse(&["boards", "--mine"]).unwrap();
        assert_eq!(cli.command, Command::Boards { mine: true });

        let cli = parse(&["add-members", "b1", "--all"]).unwrap();
        assert_eq!(
            cli.command,
            Command::AddMembers {
                board: "b1".to_string(),
                users: Vec::new(),
                all: true,
            }
        );
        let cli = parse(&["add-members", "b1", "u1", "u2"]).unwrap();
        assert!(matches!(cli.command, Command::AddMembers { ref users, all: false, .. } if users.len() == 2));
    }

    async fn seeded() -> (Arc<MemoryApi>, String, Vec<String>) {
        let api = Arc::new(MemoryApi::new());
        let board = api.create_board("Ops", None).await.unwrap();
        let todo = api.create_list(&board.id, "Todo").await.unwrap();
        let done = api.create_list(&board.id, "Done").await.unwrap();
        let a = api.create_card(&todo.id, "A").await.unwrap();
        api.create_card(&todo.id, "B").await.unwrap();
        (api, board.id, vec![todo.id, done.id, a.id])
    }

    #[tokio::test]
    async fn test_execute_move_card_persists() {
        let (api, board, ids) = seeded().await;
        let command = Command::MoveCard {
            board,
            card: ids[2].clone(),
            list: ids[1].clone(),
            index: 0,
        };
        execute(api.clone(), &ClientConfig::default(), command)
            .await
            .unwrap();
        let moved = api.card(&ids[2]).unwrap();
        assert_eq!((moved.list_id.as_str(), moved.position), (ids[1].as_str(), 0));
    }

    #[tokio::test]
    async fn test_execute_rejects_out_of_range_move() {
        let (api, board, ids) = seeded().await;
        let command = Command::MoveList {
            board,
            list: ids[0].clone(),
            index: 5,
        };
        let err = execute(api.clone(), &ClientConfig::default(), command)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Invalid(ValidationError::IndexOutOfRange { .. })));
        assert_eq!(api.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_status_requires_actor_and_assignment() {
        let (api, board, ids) = seeded().await;
        let command = Command::Status {
            board: board.clone(),
            card: ids[2].clone(),
            status: CardStatus::Completed,
        };
        let err = execute(api.clone(), &ClientConfig::default(), command.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::NoActor));

        let config = ClientConfig {
            actor_id: Some("u1".to_string()),
            ..ClientConfig::default()
        };
        let err = execute(api.clone(), &config, command.clone()).await.unwrap_err();
        assert!(matches!(err, CliError::Invalid(ValidationError::UnknownCard(_))));

        let assign = CardPatch {
            assigned_to: Some(Some("u1".to_string())),
            ..CardPatch::default()
        };
        api.update_card(&ids[2], &assign).await.unwrap();
        execute(api.clone(), &config, command).await.unwrap();
        assert_eq!(api.card(&ids[2]).unwrap().status, CardStatus::Completed);
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported() {
        let (api, board, ids) = seeded().await;
        api.fail_on(&ids[2]);
        let command = Command::MoveCard {
            board,
            card: ids[2].clone(),
            list: ids[0].clone(),
            index: 1,
        };
        let err = execute(api.clone(), &ClientConfig::default(), command)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Persist(1)));
    }

    #[tokio::test]
    async fn test_add_all_members() {
        let (api, board, _) = seeded().await;
        api.add_employee(UserShort {
            id: "u9".to_string(),
            name: "Kim".to_string(),
            email: None,
            role: Some("employee".to_string()),
            sub_role: None,
        });
        let command = Command::AddMembers {
            board: board.clone(),
            users: Vec::new(),
            all: true,
        };
        execute(api.clone(), &ClientConfig::default(), command)
            .await
            .unwrap();
        let boards = api.list_boards().await.unwrap();
        assert!(boards.iter().find(|b| b.id == board).unwrap().is_member("u9"));
    }

    #[test]
    fn test_render_board() {
        let state: BoardState = serde_json::from_value(serde_json::json!({
            "boardId": "b1",
            "lists": [{
                "_id": "l1", "title": "Todo", "boardId": "b1", "position": 0,
                "cards": [{
                    "_id": "c1", "title": "Write", "listId": "l1", "position": 0,
                    "assignedTo": "u1", "dueDate": "2025-04-02"
                }]
            }]
        }))
        .unwrap();
        assert_eq!(
            render_board(&state),
            "[0] Todo (l1)\n  0. Write <Pending> @u1 due 2025-04-02 (c1)\n"
        );
    }
}
