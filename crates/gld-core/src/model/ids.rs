//! Item id generation.
//!
//! Collections draw ids from an injected generator so tests can use a
//! deterministic sequence instead of random 64-bit values.

use uuid::Uuid;

/// Source of item ids for a collection.
pub trait IdGenerator: Send + Sync {
    fn next_id(&mut self) -> u64;
}

/// Random 64-bit ids taken from version 4 UUID bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> u64 {
        let (high, low) = Uuid::new_v4().as_u64_pair();
        high ^ low
    }
}

/// Ids counting up from a starting value.
#[derive(Debug, Clone, Copy)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub const fn starting_at(first: u64) -> Self {
        Self { next: first }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut ids = SequentialIds::starting_at(10);
        assert_eq!(ids.next_id(), 10);
        assert_eq!(ids.next_id(), 11);
    }

    #[test]
    fn test_random_ids_differ() {
        let mut ids = RandomIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
