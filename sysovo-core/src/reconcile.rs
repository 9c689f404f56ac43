//! Change-set reconciler.
//!
//! Compares two trees by entity id and emits one update per entity whose
//! persisted placement changed: a list carries its new `position`, a card
//! whose `position` or `listId` changed carries both new values. Unchanged
//! entities are never included, and entities that exist only in the new
//! tree are left to whoever created them.

use std::collections::HashMap;

use crate::types::{BoardState, CardPatch, ListPatch};

#[derive(Debug, Clone, PartialEq)]
pub struct ListUpdate {
    pub id: String,
    pub patch: ListPatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardUpdate {
    pub id: String,
    pub patch: CardPatch,
}

/// Minimal set of persistence requests for one local mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub lists: Vec<ListUpdate>,
    pub cards: Vec<CardUpdate>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.lists.len() + self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() && self.cards.is_empty()
    }

    pub fn list(&self, list_id: &str) -> Option<&ListPatch> {
        self.lists.iter().find(|u| u.id == list_id).map(|u| &u.patch)
    }

    pub fn card(&self, card_id: &str) -> Option<&CardPatch> {
        self.cards.iter().find(|u| u.id == card_id).map(|u| &u.patch)
    }
}

/// Placement of a card as persisted: rank plus owning list.
#[derive(Debug, Clone, Copy)]
struct CardPlacement<'a> {
    position: usize,
    list_id: &'a str,
}

fn snapshot_lists(state: &BoardState) -> HashMap<&str, usize> {
    state
        .lists
        .iter()
        .map(|l| (l.id.as_str(), l.position))
        .collect()
}

fn snapshot_cards(state: &BoardState) -> HashMap<&str, CardPlacement<'_>> {
    state
        .cards()
        .map(|c| {
            (
                c.id.as_str(),
                CardPlacement {
                    position: c.position,
                    list_id: c.list_id.as_str(),
                },
            )
        })
        .collect()
}

/// Diff `old` against `new`. Output follows `new` display order: lists
/// first, then cards list by list.
pub fn reconcile(old: &BoardState, new: &BoardState) -> ChangeSet {
    let old_lists = snapshot_lists(old);
    let old_cards = snapshot_cards(old);
    let mut changes = ChangeSet::default();

    for list in &new.lists {
        match old_lists.get(list.id.as_str()) {
            Some(&position) if position != list.position => changes.lists.push(ListUpdate {
                id: list.id.clone(),
                patch: ListPatch::position(list.position),
            }),
            _ => {}
        }
    }

    for card in new.cards() {
        let Some(before) = old_cards.get(card.id.as_str()) else {
            continue;
        };
        if before.position != card.position || before.list_id != card.list_id {
            changes.cards.push(CardUpdate {
                id: card.id.clone(),
                patch: CardPatch::placement(card.position, &card.list_id),
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reorder::{reorder, DragEvent};
    use crate::types::{BoardList, Card, CardStatus};

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

    fn make_state(lists: Vec<(&str, Vec<&str>)>) -> BoardState {
        BoardState::new(
            "b1",
            lists
                .into_iter()
                .enumerate()
                .map(|(pos, (list_id, cards))| BoardList {
                    id: list_id.to_string(),
                    title: list_id.to_string(),
                    board_id: "b1".to_string(),
                    position: pos,
                    cards: cards
                        .into_iter()
                        .enumerate()
                        .map(|(i, id)| make_card(id, list_id, i))
                        .collect(),
                })
                .collect(),
        )
    }

    /// Count entities whose position or list differ, independently of
    /// `reconcile`.
    fn count_changed(old: &BoardState, new: &BoardState) -> usize {
        let lists = new
            .lists
            .iter()
            .filter(|l| old.list(&l.id).is_some_and(|o| o.position != l.position))
            .count();
        let cards = new
            .cards()
            .filter(|c| {
                old.card(&c.id)
                    .is_some_and(|o| o.position != c.position || o.list_id != c.list_id)
            })
            .count();
        lists + cards
    }

    #[test]
    fn test_no_changes() {
        let state = make_state(vec![("L1", vec!["A", "B"])]);
        assert!(reconcile(&state, &state).is_empty());
    }

    #[test]
    fn test_cross_list_move_scenario() {
        let old = make_state(vec![("L1", vec!["A", "B"]), ("L2", vec![])]);
        let new = reorder(&old, &DragEvent::card("A", ("L1", 0), ("L2", 0)));
        let changes = reconcile(&old, &new);

        assert_eq!(changes.len(), 2);
        assert!(changes.lists.is_empty());
        assert_eq!(changes.card("B"), Some(&CardPatch::placement(0, "L1")));
        assert_eq!(changes.card("A"), Some(&CardPatch::placement(0, "L2")));
    }

    #[test]
    fn test_cards_after_insert_point_are_included() {
        let old = make_state(vec![("L1", vec!["A", "B"]), ("L2", vec!["C", "D"])]);
        let new = reorder(&old, &DragEvent::card("A", ("L1", 0), ("L2", 1)));
        let changes = reconcile(&old, &new);
        // L2 becomes [C, A, D]: C keeps rank 0
        assert_eq!(changes.card("A"), Some(&CardPatch::placement(1, "L2")));
        assert_eq!(changes.card("D"), Some(&CardPatch::placement(2, "L2")));
        assert_eq!(changes.card("B"), Some(&CardPatch::placement(0, "L1")));
        assert!(changes.card("C").is_none());
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_card_patch_serializes_placement_only() {
        let patch = CardPatch::placement(3, "L2");
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"position": 3, "listId": "L2"})
        );
    }

    #[test]
    fn test_list_move_includes_only_moved_ranks() {
        let old = make_state(vec![("L1", vec![]), ("L2", vec![]), ("L3", vec![]), ("L4", vec![])]);
        let new = reorder(&old, &DragEvent::list("b1", "L3", 2, 1));
        let changes = reconcile(&old, &new);
        // [L1, L3, L2, L4]: L1 and L4 keep their ranks
        assert_eq!(changes.len(), 2);
        assert_eq!(changes.list("L3"), Some(&ListPatch::position(1)));
        assert_eq!(changes.list("L2"), Some(&ListPatch::position(2)));
        assert!(changes.list("L1").is_none());
        assert!(changes.list("L4").is_none());
    }

    #[test]
    fn test_list_move_to_front_changes_every_rank() {
        let old = make_state(vec![("L1", vec!["A"]), ("L2", vec![]), ("L3", vec![])]);
        let new = reorder(&old, &DragEvent::list("b1", "L3", 2, 0));
        let changes = reconcile(&old, &new);
        assert_eq!(changes.lists.len(), 3);
        assert!(changes.cards.is_empty());
        let ids: Vec<&str> = changes.lists.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["L3", "L1", "L2"]);
    }

    #[test]
    fn test_new_entities_are_ignored() {
        let old = make_state(vec![("L1", vec!["A"])]);
        let mut new = old.clone();
        new.lists[0].cards.push(make_card("fresh", "L1", 1));
        new.lists.push(BoardList {
            id: "L2".to_string(),
            title: "L2".to_string(),
            board_id: "b1".to_string(),
            position: 1,
            cards: Vec::new(),
        });
        assert!(reconcile(&old, &new).is_empty());
    }

    #[test]
    fn test_size_matches_changed_entities() {
        let old = make_state(vec![
            ("L1", vec!["a", "b", "c", "d"]),
            ("L2", vec!["e", "f"]),
            ("L3", vec!["g"]),
        ]);
        let drags = [
            DragEvent::card("a", ("L1", 0), ("L2", 2)),
            DragEvent::card("b", ("L1", 1), ("L1", 3)),
            DragEvent::card("g", ("L3", 0), ("L1", 0)),
            DragEvent::card("d", ("L1", 3), ("L1", 3)),
            DragEvent::list("b1", "L1", 0, 2),
            DragEvent::list("b1", "L2", 1, 0),
        ];
        for drag in &drags {
            let new = reorder(&old, drag);
            assert_eq!(reconcile(&old, &new).len(), count_changed(&old, &new), "{:?}", drag);
        }
    }
}
