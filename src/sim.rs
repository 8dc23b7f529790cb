//! Simulated sensor input.
//!
//! Emulates a live analog signal by stepping the designated input's
//! present-value each simulation period. State lives in the store, so
//! reads between steps always see the latest value.

use crate::core::types::{ObjectType, PropertyId, PropertyValue};
use crate::store::{ObjectStore, PropertyKey};

/// Steps one analog input by a fixed increment
pub struct ValueSimulator {
    device_instance: u32,
    object_instance: u32,
    increment: f32,
}

impl ValueSimulator {
    pub fn new(device_instance: u32, object_instance: u32, increment: f32) -> Self {
        Self {
            device_instance,
            object_instance,
            increment,
        }
    }

    /// Step the input once, writing through the store.
    ///
    /// Returns the mutated key and the new value so the caller can emit
    /// exactly one change notification for it. Returns `None` when the
    /// input was never seeded or holds a non-real value.
    pub fn step(&self, store: &mut ObjectStore) -> Option<(PropertyKey, f32)> {
        let key = PropertyKey::new(
            self.device_instance,
            ObjectType::AnalogInput,
            self.object_instance,
            PropertyId::PresentValue,
        );
        let current = match store.get(&key) {
            Some(PropertyValue::Real(value)) => *value,
            _ => return None,
        };
        let next = current + self.increment;
        store.set(&key, PropertyValue::Real(next));
        Some((key, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_increments_present_value() {
        let mut store = ObjectStore::new();
        let key = PropertyKey::new(389055, ObjectType::AnalogInput, 0, PropertyId::PresentValue);
        store.set(&key, PropertyValue::Real(127.5));

        let sim = ValueSimulator::new(389055, 0, 1.1);
        let (mutated, value) = sim.step(&mut store).unwrap();

        assert_eq!(mutated, key);
        assert!((value - 128.6).abs() < 1e-4);
        match store.get(&key) {
            Some(PropertyValue::Real(stored)) => assert!((stored - 128.6).abs() < 1e-4),
            other => panic!("unexpected store entry {:?}", other),
        }
    }

    #[test]
    fn test_step_without_seed_is_a_noop() {
        let mut store = ObjectStore::new();
        let sim = ValueSimulator::new(389055, 0, 1.1);
        assert!(sim.step(&mut store).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_step_ignores_non_real_value() {
        let mut store = ObjectStore::new();
        let key = PropertyKey::new(389055, ObjectType::AnalogInput, 0, PropertyId::PresentValue);
        store.set(&key, PropertyValue::CharacterString("oops".to_string()));

        let sim = ValueSimulator::new(389055, 0, 1.1);
        assert!(sim.step(&mut store).is_none());
        assert_eq!(
            store.get(&key),
            Some(&PropertyValue::CharacterString("oops".to_string()))
        );
    }
}
