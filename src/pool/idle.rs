//! Storage for idle channels awaiting reuse.

use std::collections::VecDeque;

/// The pool's holding area for currently-unused channels.
///
/// Borrowers receive the most recently returned channel; the reclaimer trims
/// from the other end, so the coldest channel is the first to go.
#[derive(Debug)]
pub(super) struct IdleChannels<C> {
    entries: VecDeque<C>,
}

impl<C> Default for IdleChannels<C> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<C> IdleChannels<C> {
    pub(super) fn push(&mut self, channel: C) {
        self.entries.push_back(channel);
    }

    pub(super) fn pop(&mut self) -> Option<C> {
        self.entries.pop_back()
    }

    pub(super) fn pop_oldest(&mut self) -> Option<C> {
        self.entries.pop_front()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn drain(&mut self) -> VecDeque<C> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_is_most_recent_first() {
        let mut idle = IdleChannels::default();
        idle.push(1);
        idle.push(2);
        assert_eq!(idle.pop(), Some(2));
        assert_eq!(idle.pop(), Some(1));
        assert_eq!(idle.pop(), None);
    }

    #[test]
    fn pop_oldest_is_coldest_first() {
        let mut idle = IdleChannels::default();
        idle.push(1);
        idle.push(2);
        assert_eq!(idle.pop_oldest(), Some(1));
        assert_eq!(idle.len(), 1);
    }

    #[test]
    fn drain_empties_the_store() {
        let mut idle = IdleChannels::default();
        idle.push(1);
        idle.push(2);
        let drained = idle.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(idle.len(), 0);
    }
}
