use std::collections::VecDeque;
use std::sync::Mutex;

use super::Id;

/// Source of ids for newly created records. Backends own one so tests can
/// predict the ids they hand out.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> Id;
}

#[derive(Debug, Clone, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn new_id(&self) -> Id {
        Id::new()
    }
}

/// Returns a pre-seeded sequence of ids, then falls back to random ones.
#[derive(Debug, Default)]
pub struct FixedIdGenerator {
    ids: Mutex<VecDeque<Id>>,
}

impl FixedIdGenerator {
    pub fn new(ids: impl IntoIterator<Item = Id>) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().collect()),
        }
    }
}

impl IdGenerator for FixedIdGenerator {
    fn new_id(&self) -> Id {
        let mut ids = match self.ids.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        ids.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_generator_yields_seeded_ids_in_order() {
        let ids = FixedIdGenerator::new([Id::from("tx-1"), Id::from("tx-2")]);
        assert_eq!(ids.new_id().as_str(), "tx-1");
        assert_eq!(ids.new_id().as_str(), "tx-2");
        assert!(!ids.new_id().as_str().is_empty());
    }
}
