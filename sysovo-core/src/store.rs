//! Local board store: the single in-memory tree used for rendering and
//! diffing.
//!
//! The store is mutated only by whole-state replacement. Each replacement
//! keeps the replaced tree as the preceding snapshot and bumps a monotonic
//! version, so a reorder always runs against the most recently applied
//! state and the reconciler always has the matching "before" tree.

use futures_util::future::try_join_all;

use crate::error::LoadError;
use crate::position::sort_by_position;
use crate::storage::BoardApi;
use crate::types::BoardState;

#[derive(Debug, Default)]
pub struct LocalBoardStore {
    current: BoardState,
    previous: Option<BoardState>,
    version: u64,
}

impl LocalBoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already built tree (no preceding snapshot).
    pub fn with_state(state: BoardState) -> Self {
        Self {
            current: state,
            previous: None,
            version: 1,
        }
    }

    pub fn current(&self) -> &BoardState {
        &self.current
    }

    /// The tree replaced by the most recent `replace`, if any.
    pub fn previous(&self) -> Option<&BoardState> {
        self.previous.as_ref()
    }

    /// Monotonic counter, incremented on every load and replace.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_loaded(&self) -> bool {
        !self.current.board_id.is_empty()
    }

    /// Atomically swap the whole tree.
    pub fn replace(&mut self, next: BoardState) {
        let prior = std::mem::replace(&mut self.current, next);
        self.previous = Some(prior);
        self.version += 1;
    }

    /// Fetch a board and replace the whole local state with it.
    /// On failure the current state is left exactly as it was. A fresh load
    /// has no preceding snapshot: trees of different loads are never diffed.
    pub async fn load(&mut self, api: &dyn BoardApi, board_id: &str) -> Result<(), LoadError> {
        let state = fetch_board(api, board_id).await?;
        if !state.is_consistent() {
            log::warn!(
                target: "sysovo.store.load",
                "Board {} has non-dense positions; the next move in an affected parent renumbers it",
                board_id
            );
        }
        log::debug!(
            target: "sysovo.store.load",
            "Loaded board {}: {} lists, {} cards",
            board_id,
            state.lists.len(),
            state.card_count()
        );
        self.current = state;
        self.previous = None;
        self.version += 1;
        Ok(())
    }

    /// Drop the loaded tree (e.g. after the board itself was deleted).
    pub fn clear(&mut self) {
        self.current = BoardState::default();
        self.previous = None;
        self.version += 1;
    }
}

/// Fetch the lists of a board, then the cards of every list concurrently.
/// Lists are ordered by position, cards by position within each list.
/// Any failed fetch fails the whole load.
pub async fn fetch_board(api: &dyn BoardApi, board_id: &str) -> Result<BoardState, LoadError> {
    let mut lists = api
        .list_lists(board_id)
        .await
        .map_err(|source| LoadError::Lists {
            board_id: board_id.to_string(),
            source,
        })?;

    let card_sets = try_join_all(lists.iter().map(|list| async move {
        api.list_cards(&list.id)
            .await
            .map_err(|source| LoadError::Cards {
                list_id: list.id.clone(),
                source,
            })
    }))
    .await?;

    for (list, mut cards) in lists.iter_mut().zip(card_sets) {
        sort_by_position(&mut cards);
        list.cards = cards;
    }
    sort_by_position(&mut lists);

    Ok(BoardState::new(board_id, lists))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryApi;
    use crate::types::{Board, BoardList, Card, CardStatus};

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

    fn make_list(id: &str, position: usize, cards: Vec<Card>) -> BoardList {
        BoardList {
            id: id.to_string(),
            title: id.to_string(),
            board_id: "b1".to_string(),
            position,
            cards,
        }
    }

    fn make_board() -> Board {
        Board {
            id: "b1".to_string(),
            name: "Board".to_string(),
            description: None,
            created_by: None,
            members: Vec::new(),
        }
    }

    /// Seeded out of order so the loader has to sort.
    fn seeded_api() -> MemoryApi {
        let api = MemoryApi::new();
        let state = BoardState::new(
            "b1",
            vec![
                make_list(
                    "l2",
                    1,
                    vec![make_card("c3", "l2", 1), make_card("c2", "l2", 0)],
                ),
                make_list("l1", 0, vec![make_card("c1", "l1", 0)]),
            ],
        );
        api.seed(make_board(), &state);
        api
    }

    fn list_ids(state: &BoardState) -> Vec<&str> {
        state.lists.iter().map(|l| l.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_sorts_lists_and_cards() {
        let api = seeded_api();
        let mut store = LocalBoardStore::new();
        store.load(&api, "b1").await.unwrap();

        let state = store.current();
        assert_eq!(list_ids(state), vec!["l1", "l2"]);
        let l2: Vec<&str> = state.lists[1].cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(l2, vec!["c2", "c3"]);
        assert!(state.is_consistent());
        assert!(store.previous().is_none());
        assert_eq!(store.version(), 1);
    }

    #[tokio::test]
    async fn test_failed_card_fetch_keeps_prior_state() {
        let api = seeded_api();
        let mut store = LocalBoardStore::new();
        store.load(&api, "b1").await.unwrap();
        let before = store.current().clone();

        api.fail_on("l2");
        let err = store.load(&api, "b1").await.unwrap_err();
        assert!(matches!(err, LoadError::Cards { ref list_id, .. } if list_id == "l2"));
        assert_eq!(store.current(), &before);
        assert_eq!(store.version(), 1);
    }

    #[tokio::test]
    async fn test_failed_list_fetch_is_load_error() {
        let api = seeded_api();
        let mut store = LocalBoardStore::new();
        let err = store.load(&api, "missing").await.unwrap_err();
        assert!(matches!(err, LoadError::Lists { .. }));
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_replace_keeps_previous() {
        let first = BoardState::new("b1", vec![make_list("l1", 0, Vec::new())]);
        let second = BoardState::new("b1", Vec::new());
        let mut store = LocalBoardStore::with_state(first.clone());

        store.replace(second.clone());
        assert_eq!(store.current(), &second);
        assert_eq!(store.previous(), Some(&first));
        assert_eq!(store.version(), 2);
    }

    #[tokio::test]
    async fn test_load_flags_non_dense_positions() {
        let api = MemoryApi::new();
        let state = BoardState::new(
            "b1",
            vec![make_list(
                "l1",
                0,
                vec![make_card("a", "l1", 0), make_card("b", "l1", 5)],
            )],
        );
        api.seed(make_board(), &state);

        let mut store = LocalBoardStore::new();
        store.load(&api, "b1").await.unwrap();
        assert!(!store.current().is_consistent());
        assert_eq!(store.current().lists[0].cards[1].position, 5);
    }
}
