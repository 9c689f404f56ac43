//! Position model: dense zero-based ranks per parent.
//!
//! Every sibling sequence (the lists of a board, the cards of a list) keeps
//! `position == index` in display order. Any insert, removal or move is
//! followed by `renumber` on each affected sequence, so committed state never
//! carries gaps or duplicates.

use crate::types::{BoardList, Card};

/// An entity with an identity and a rank among its siblings.
pub trait Ranked {
    fn id(&self) -> &str;
    fn position(&self) -> usize;
    fn set_position(&mut self, position: usize);
}

impl Ranked for BoardList {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

impl Ranked for Card {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

/// Re-derive `position = index` for every item, in current order.
pub fn renumber<T: Ranked>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index);
    }
}

/// Order by position. The sort is stable, so equal ranks keep their
/// arrival order.
pub fn sort_by_position<T: Ranked>(items: &mut [T]) {
    items.sort_by_key(|item| item.position());
}

/// True iff positions are exactly `0..n` in sequence order.
pub fn is_dense<T: Ranked>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index)
}

/// Position assigned to a newly created sibling (appended at the end).
pub fn next_position<T>(items: &[T]) -> usize {
    items.len()
}

/// Move the item at `from` to `to` within one sequence and renumber it.
/// Returns false (and leaves the sequence untouched) when either index is
/// out of range.
pub fn move_within<T: Ranked>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    renumber(items);
    true
}
