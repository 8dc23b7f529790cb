//! Untyped property store, the single source of truth for object data.
//!
//! Values are tagged [`PropertyValue`]s keyed by the 4-part
//! [`PropertyKey`]. Absence of a key is a first-class outcome, distinct
//! from "present with the wrong kind" which the dispatcher reports.

use crate::core::types::{ObjectType, PropertyId, PropertyRequest, PropertyValue};
use std::collections::HashMap;
use std::fmt;

/// Composite key identifying one property of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    pub device_instance: u32,
    pub object_type: ObjectType,
    pub object_instance: u32,
    pub property: PropertyId,
}

impl PropertyKey {
    pub fn new(
        device_instance: u32,
        object_type: ObjectType,
        object_instance: u32,
        property: PropertyId,
    ) -> Self {
        Self {
            device_instance,
            object_type,
            object_instance,
            property,
        }
    }

    /// Delimited form used as the map key
    fn map_key(&self) -> String {
        self.to_string()
    }
}

impl From<&PropertyRequest> for PropertyKey {
    fn from(req: &PropertyRequest) -> Self {
        Self::new(
            req.device_instance,
            req.object_type,
            req.object_instance,
            req.property,
        )
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.device_instance,
            self.object_type as u32,
            self.object_instance,
            self.property as u32
        )
    }
}

/// Map of property keys to tagged values
#[derive(Debug, Default)]
pub struct ObjectStore {
    entries: HashMap<String, PropertyValue>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up a value; `None` means the key was never written
    pub fn get(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.entries.get(&key.map_key())
    }

    /// Total overwrite, immediately visible to subsequent reads
    pub fn set(&mut self, key: &PropertyKey, value: PropertyValue) {
        self.entries.insert(key.map_key(), value);
    }

    /// Bulk load of initial data, used once at startup
    pub fn seed<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (PropertyKey, PropertyValue)>,
    {
        for (key, value) in entries {
            self.set(&key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PropertyKey {
        PropertyKey::new(389055, ObjectType::AnalogInput, 0, PropertyId::PresentValue)
    }

    #[test]
    fn test_read_your_write() {
        let mut store = ObjectStore::new();
        store.set(&key(), PropertyValue::Real(127.5));
        assert_eq!(store.get(&key()), Some(&PropertyValue::Real(127.5)));
    }

    #[test]
    fn test_overwrite_last_wins() {
        let mut store = ObjectStore::new();
        store.set(&key(), PropertyValue::Real(1.0));
        store.set(&key(), PropertyValue::Real(2.0));
        assert_eq!(store.get(&key()), Some(&PropertyValue::Real(2.0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_absent_key() {
        let store = ObjectStore::new();
        assert_eq!(store.get(&key()), None);
    }

    #[test]
    fn test_keys_are_distinct_per_tuple_part() {
        let mut store = ObjectStore::new();
        store.set(&key(), PropertyValue::Real(1.0));

        let other_property =
            PropertyKey::new(389055, ObjectType::AnalogInput, 0, PropertyId::ObjectName);
        let other_instance =
            PropertyKey::new(389055, ObjectType::AnalogInput, 1, PropertyId::PresentValue);
        let other_type =
            PropertyKey::new(389055, ObjectType::AnalogValue, 0, PropertyId::PresentValue);
        assert_eq!(store.get(&other_property), None);
        assert_eq!(store.get(&other_instance), None);
        assert_eq!(store.get(&other_type), None);
    }

    #[test]
    fn test_seed() {
        let mut store = ObjectStore::new();
        store.seed(vec![
            (key(), PropertyValue::Real(127.5)),
            (
                PropertyKey::new(389055, ObjectType::AnalogInput, 0, PropertyId::ObjectName),
                PropertyValue::CharacterString("AnalogInput Bronze".to_string()),
            ),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&key()), Some(&PropertyValue::Real(127.5)));
    }
}
