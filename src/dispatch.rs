//! Typed property dispatch between the protocol engine and the store.
//!
//! The engine issues one read or write per value kind. Every accessor
//! validates the stored tag and, for variable-length kinds, the caller's
//! capacity before anything is returned. Writes pass an explicit
//! allow-list that is independent of the engine's own writable metadata.
//! Values are never coerced between kinds.

use crate::core::types::{
    DateValue, ObjectType, PropertyId, PropertyKind, PropertyRequest, PropertyValue, TimeValue,
};
use crate::store::{ObjectStore, PropertyKey};
use crate::transport::ConnectionString;

/// Result alias for property accessors
pub type PropertyResult<T> = Result<T, PropertyError>;

/// Local failure taxonomy, surfaced to the engine as boolean outcomes.
/// Nothing here is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("property not found")]
    KeyNotFound,

    #[error("stored value is {stored}, requested {requested}")]
    TypeMismatch {
        stored: PropertyKind,
        requested: PropertyKind,
    },

    #[error("value needs {needed} elements, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("array index {index} out of range (length {len})")]
    IndexOutOfRange { index: u32, len: usize },

    #[error("object/property pair does not accept this writer")]
    WriteRejected,
}

/// Pairs allowed to accept writes, bound to the writer's kind.
///
/// This guard is independent of the engine's writable metadata: a write
/// that is not listed here is rejected even if the engine marked the
/// property writable.
const WRITE_ALLOW_LIST: &[(ObjectType, PropertyId, PropertyKind)] = &[
    (
        ObjectType::AnalogValue,
        PropertyId::PresentValue,
        PropertyKind::Real,
    ),
    (
        ObjectType::BinaryValue,
        PropertyId::PresentValue,
        PropertyKind::Enumerated,
    ),
    (
        ObjectType::MultiStateValue,
        PropertyId::PresentValue,
        PropertyKind::UnsignedInteger,
    ),
];

fn write_allowed(object_type: ObjectType, property: PropertyId, kind: PropertyKind) -> bool {
    WRITE_ALLOW_LIST
        .iter()
        .any(|entry| *entry == (object_type, property, kind))
}

/// Routes per-kind property reads and writes against the store
pub struct Dispatcher {
    store: ObjectStore,
    device_instance: u32,
    device_name: String,
    analog_input_instance: u32,
}

impl Dispatcher {
    pub fn new(
        store: ObjectStore,
        device_instance: u32,
        device_name: impl Into<String>,
        analog_input_instance: u32,
    ) -> Self {
        Self {
            store,
            device_instance,
            device_name: device_name.into(),
            analog_input_instance,
        }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ObjectStore {
        &mut self.store
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Character string reader. `capacity` is the caller's buffer size
    /// in bytes. List-valued properties are read element-wise with a
    /// 1-based array index.
    pub fn get_character_string(
        &self,
        req: &PropertyRequest,
        capacity: usize,
    ) -> PropertyResult<String> {
        // The device object's name is served from configuration, ahead
        // of the store.
        if req.device_instance == self.device_instance
            && req.object_type == ObjectType::Device
            && req.property == PropertyId::ObjectName
        {
            return fit_string(&self.device_name, capacity);
        }
        match self.lookup(req)? {
            PropertyValue::CharacterString(value) => fit_string(value, capacity),
            PropertyValue::CharacterStringList(items) => match req.array_index {
                Some(index) if index >= 1 && (index as usize) <= items.len() => {
                    fit_string(&items[index as usize - 1], capacity)
                }
                Some(index) => Err(PropertyError::IndexOutOfRange {
                    index,
                    len: items.len(),
                }),
                None => Err(mismatch(
                    req,
                    PropertyKind::CharacterStringList,
                    PropertyKind::CharacterString,
                )),
            },
            other => Err(mismatch(req, other.kind(), PropertyKind::CharacterString)),
        }
    }

    pub fn get_real(&self, req: &PropertyRequest) -> PropertyResult<f32> {
        // The simulated analog input's live present-value is checked
        // before any generic resolution.
        if req.device_instance == self.device_instance
            && req.object_type == ObjectType::AnalogInput
            && req.object_instance == self.analog_input_instance
            && req.property == PropertyId::PresentValue
        {
            if let Some(PropertyValue::Real(value)) = self.store.get(&PropertyKey::from(req)) {
                return Ok(*value);
            }
        }
        match self.lookup(req)? {
            PropertyValue::Real(value) => Ok(*value),
            other => Err(mismatch(req, other.kind(), PropertyKind::Real)),
        }
    }

    pub fn get_double(&self, req: &PropertyRequest) -> PropertyResult<f64> {
        match self.lookup(req)? {
            PropertyValue::Double(value) => Ok(*value),
            other => Err(mismatch(req, other.kind(), PropertyKind::Double)),
        }
    }

    pub fn get_signed_integer(&self, req: &PropertyRequest) -> PropertyResult<i32> {
        match self.lookup(req)? {
            PropertyValue::SignedInteger(value) => Ok(*value),
            other => Err(mismatch(req, other.kind(), PropertyKind::SignedInteger)),
        }
    }

    /// Unsigned reader. On list-shaped values, array index 0 yields the
    /// element count; the registration address pair also exposes its
    /// port at index 2.
    pub fn get_unsigned_integer(&self, req: &PropertyRequest) -> PropertyResult<u32> {
        match self.lookup(req)? {
            PropertyValue::UnsignedInteger(value) => Ok(*value),
            PropertyValue::CharacterStringList(items) => match req.array_index {
                Some(0) => Ok(items.len() as u32),
                Some(index) if (index as usize) <= items.len() => Err(mismatch(
                    req,
                    PropertyKind::CharacterString,
                    PropertyKind::UnsignedInteger,
                )),
                Some(index) => Err(PropertyError::IndexOutOfRange {
                    index,
                    len: items.len(),
                }),
                None => Err(mismatch(
                    req,
                    PropertyKind::CharacterStringList,
                    PropertyKind::UnsignedInteger,
                )),
            },
            PropertyValue::OctetString(bytes)
                if req.property == PropertyId::FdBbmdAddress
                    && bytes.len() == ConnectionString::LENGTH =>
            {
                match req.array_index {
                    Some(0) => Ok(2),
                    Some(2) => Ok(u32::from(u16::from_le_bytes([bytes[4], bytes[5]]))),
                    Some(1) => Err(mismatch(
                        req,
                        PropertyKind::OctetString,
                        PropertyKind::UnsignedInteger,
                    )),
                    Some(index) => Err(PropertyError::IndexOutOfRange { index, len: 2 }),
                    None => Err(mismatch(
                        req,
                        PropertyKind::OctetString,
                        PropertyKind::UnsignedInteger,
                    )),
                }
            }
            other => Err(mismatch(req, other.kind(), PropertyKind::UnsignedInteger)),
        }
    }

    pub fn get_boolean(&self, req: &PropertyRequest) -> PropertyResult<bool> {
        match self.lookup(req)? {
            PropertyValue::Boolean(value) => Ok(*value),
            other => Err(mismatch(req, other.kind(), PropertyKind::Boolean)),
        }
    }

    pub fn get_enumerated(&self, req: &PropertyRequest) -> PropertyResult<u32> {
        match self.lookup(req)? {
            PropertyValue::Enumerated(value) => Ok(*value),
            other => Err(mismatch(req, other.kind(), PropertyKind::Enumerated)),
        }
    }

    /// Bit string reader. `capacity` is the caller's buffer size in bits.
    pub fn get_bit_string(&self, req: &PropertyRequest, capacity: usize) -> PropertyResult<String> {
        match self.lookup(req)? {
            PropertyValue::BitString(value) => fit_string(value, capacity),
            other => Err(mismatch(req, other.kind(), PropertyKind::BitString)),
        }
    }

    /// Octet string reader. `capacity` is the caller's buffer size in
    /// bytes. The registration address pair exposes its host at array
    /// index 1.
    pub fn get_octet_string(
        &self,
        req: &PropertyRequest,
        capacity: usize,
    ) -> PropertyResult<Vec<u8>> {
        match self.lookup(req)? {
            PropertyValue::OctetString(bytes) => {
                if req.property == PropertyId::FdBbmdAddress
                    && bytes.len() == ConnectionString::LENGTH
                {
                    if let Some(index) = req.array_index {
                        return match index {
                            1 => fit_octets(&bytes[..4], capacity),
                            2 => Err(mismatch(
                                req,
                                PropertyKind::UnsignedInteger,
                                PropertyKind::OctetString,
                            )),
                            _ => Err(PropertyError::IndexOutOfRange { index, len: 2 }),
                        };
                    }
                }
                fit_octets(bytes, capacity)
            }
            other => Err(mismatch(req, other.kind(), PropertyKind::OctetString)),
        }
    }

    pub fn get_date(&self, req: &PropertyRequest) -> PropertyResult<DateValue> {
        match self.lookup(req)? {
            PropertyValue::Date(value) => Ok(*value),
            other => Err(mismatch(req, other.kind(), PropertyKind::Date)),
        }
    }

    pub fn get_time(&self, req: &PropertyRequest) -> PropertyResult<TimeValue> {
        match self.lookup(req)? {
            PropertyValue::Time(value) => Ok(*value),
            other => Err(mismatch(req, other.kind(), PropertyKind::Time)),
        }
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    pub fn set_real(
        &mut self,
        req: &PropertyRequest,
        value: f32,
        priority: Option<u8>,
    ) -> PropertyResult<()> {
        self.write(req, PropertyValue::Real(value), priority)
    }

    pub fn set_enumerated(
        &mut self,
        req: &PropertyRequest,
        value: u32,
        priority: Option<u8>,
    ) -> PropertyResult<()> {
        self.write(req, PropertyValue::Enumerated(value), priority)
    }

    pub fn set_unsigned_integer(
        &mut self,
        req: &PropertyRequest,
        value: u32,
        priority: Option<u8>,
    ) -> PropertyResult<()> {
        self.write(req, PropertyValue::UnsignedInteger(value), priority)
    }

    /// Store overwrite behind the allow-list. The store holds one value
    /// per key; priority is accepted for interface completeness only.
    fn write(
        &mut self,
        req: &PropertyRequest,
        value: PropertyValue,
        _priority: Option<u8>,
    ) -> PropertyResult<()> {
        let kind = value.kind();
        if !write_allowed(req.object_type, req.property, kind) {
            log::warn!(
                "Write rejected for {} ({} writer)",
                PropertyKey::from(req),
                kind
            );
            return Err(PropertyError::WriteRejected);
        }
        self.store.set(&PropertyKey::from(req), value);
        Ok(())
    }

    fn lookup(&self, req: &PropertyRequest) -> PropertyResult<&PropertyValue> {
        let key = PropertyKey::from(req);
        match self.store.get(&key) {
            Some(value) => Ok(value),
            None => {
                log::warn!("Property not found: {}", key);
                Err(PropertyError::KeyNotFound)
            }
        }
    }
}

fn mismatch(req: &PropertyRequest, stored: PropertyKind, requested: PropertyKind) -> PropertyError {
    log::error!(
        "Type mismatch for {}: stored {}, requested {}",
        PropertyKey::from(req),
        stored,
        requested
    );
    PropertyError::TypeMismatch { stored, requested }
}

fn fit_string(value: &str, capacity: usize) -> PropertyResult<String> {
    if value.len() > capacity {
        return Err(PropertyError::BufferTooSmall {
            needed: value.len(),
            capacity,
        });
    }
    Ok(value.to_string())
}

fn fit_octets(bytes: &[u8], capacity: usize) -> PropertyResult<Vec<u8>> {
    if bytes.len() > capacity {
        return Err(PropertyError::BufferTooSmall {
            needed: bytes.len(),
            capacity,
        });
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: u32 = 389055;

    fn dispatcher() -> Dispatcher {
        let mut store = ObjectStore::new();
        store.seed(vec![
            (
                PropertyKey::new(DEVICE, ObjectType::AnalogInput, 0, PropertyId::PresentValue),
                PropertyValue::Real(127.5),
            ),
            (
                PropertyKey::new(DEVICE, ObjectType::AnalogInput, 0, PropertyId::ObjectName),
                PropertyValue::CharacterString("AnalogInput Bronze".to_string()),
            ),
            (
                PropertyKey::new(DEVICE, ObjectType::AnalogInput, 0, PropertyId::StatusFlags),
                PropertyValue::BitString("0000".to_string()),
            ),
            (
                PropertyKey::new(DEVICE, ObjectType::NetworkPort, 1, PropertyId::IpDnsServer),
                PropertyValue::CharacterStringList(vec![
                    "8.8.8.8".to_string(),
                    "8.8.4.4".to_string(),
                ]),
            ),
            (
                PropertyKey::new(DEVICE, ObjectType::NetworkPort, 1, PropertyId::FdBbmdAddress),
                // 198.51.100.20:47808
                PropertyValue::OctetString(vec![198, 51, 100, 20, 0xC0, 0xBA]),
            ),
            (
                PropertyKey::new(DEVICE, ObjectType::AnalogValue, 2, PropertyId::PresentValue),
                PropertyValue::Real(0.0),
            ),
            (
                PropertyKey::new(DEVICE, ObjectType::BinaryValue, 5, PropertyId::PresentValue),
                PropertyValue::Enumerated(0),
            ),
            (
                PropertyKey::new(
                    DEVICE,
                    ObjectType::MultiStateValue,
                    19,
                    PropertyId::PresentValue,
                ),
                PropertyValue::UnsignedInteger(1),
            ),
        ]);
        Dispatcher::new(store, DEVICE, "Setu BACnet Bridge", 0)
    }

    fn req(object_type: ObjectType, instance: u32, property: PropertyId) -> PropertyRequest {
        PropertyRequest::new(DEVICE, object_type, instance, property)
    }

    #[test]
    fn test_device_name_served_from_config() {
        let d = dispatcher();
        let name = d
            .get_character_string(&req(ObjectType::Device, DEVICE, PropertyId::ObjectName), 64)
            .unwrap();
        assert_eq!(name, "Setu BACnet Bridge");
    }

    #[test]
    fn test_device_name_buffer_too_small() {
        let d = dispatcher();
        let err = d
            .get_character_string(&req(ObjectType::Device, DEVICE, PropertyId::ObjectName), 4)
            .unwrap_err();
        assert_eq!(
            err,
            PropertyError::BufferTooSmall {
                needed: 18,
                capacity: 4
            }
        );
    }

    #[test]
    fn test_live_analog_input_present_value() {
        let d = dispatcher();
        let value = d
            .get_real(&req(ObjectType::AnalogInput, 0, PropertyId::PresentValue))
            .unwrap();
        assert_eq!(value, 127.5);
    }

    #[test]
    fn test_key_not_found() {
        let d = dispatcher();
        let err = d
            .get_real(&req(ObjectType::AnalogInput, 7, PropertyId::PresentValue))
            .unwrap_err();
        assert_eq!(err, PropertyError::KeyNotFound);
    }

    #[test]
    fn test_type_mismatch_never_coerces() {
        let d = dispatcher();
        // Text stored under the name key, read through the numeric reader.
        let err = d
            .get_real(&req(ObjectType::AnalogInput, 0, PropertyId::ObjectName))
            .unwrap_err();
        assert_eq!(
            err,
            PropertyError::TypeMismatch {
                stored: PropertyKind::CharacterString,
                requested: PropertyKind::Real,
            }
        );
        // Enumerated and unsigned stay distinct in both directions.
        assert!(
            d.get_unsigned_integer(&req(ObjectType::BinaryValue, 5, PropertyId::PresentValue))
                .is_err()
        );
        assert!(
            d.get_enumerated(&req(
                ObjectType::MultiStateValue,
                19,
                PropertyId::PresentValue
            ))
            .is_err()
        );
    }

    #[test]
    fn test_bit_string_capacity() {
        let d = dispatcher();
        let request = req(ObjectType::AnalogInput, 0, PropertyId::StatusFlags);
        assert_eq!(d.get_bit_string(&request, 4).unwrap(), "0000");
        assert_eq!(
            d.get_bit_string(&request, 3).unwrap_err(),
            PropertyError::BufferTooSmall {
                needed: 4,
                capacity: 3
            }
        );
    }

    #[test]
    fn test_dns_list_array_indexing() {
        let d = dispatcher();
        let base = req(ObjectType::NetworkPort, 1, PropertyId::IpDnsServer);

        // Index 0 is the element count, served by the unsigned reader.
        assert_eq!(d.get_unsigned_integer(&base.with_index(0)).unwrap(), 2);
        // Elements are 1-based.
        assert_eq!(
            d.get_character_string(&base.with_index(1), 64).unwrap(),
            "8.8.8.8"
        );
        assert_eq!(
            d.get_character_string(&base.with_index(2), 64).unwrap(),
            "8.8.4.4"
        );
        // Beyond the list length fails.
        assert_eq!(
            d.get_character_string(&base.with_index(3), 64).unwrap_err(),
            PropertyError::IndexOutOfRange { index: 3, len: 2 }
        );
        assert_eq!(
            d.get_character_string(&base.with_index(0), 64).unwrap_err(),
            PropertyError::IndexOutOfRange { index: 0, len: 2 }
        );
    }

    #[test]
    fn test_registration_address_pair_indexing() {
        let d = dispatcher();
        let base = req(ObjectType::NetworkPort, 1, PropertyId::FdBbmdAddress);

        assert_eq!(d.get_unsigned_integer(&base.with_index(0)).unwrap(), 2);
        assert_eq!(
            d.get_octet_string(&base.with_index(1), 16).unwrap(),
            vec![198, 51, 100, 20]
        );
        assert_eq!(d.get_unsigned_integer(&base.with_index(2)).unwrap(), 47808);
        assert_eq!(
            d.get_unsigned_integer(&base.with_index(3)).unwrap_err(),
            PropertyError::IndexOutOfRange { index: 3, len: 2 }
        );
        // Whole-value read still returns the 6-byte encoding.
        assert_eq!(
            d.get_octet_string(&base, 16).unwrap(),
            vec![198, 51, 100, 20, 0xC0, 0xBA]
        );
    }

    #[test]
    fn test_write_guard_allows_listed_pairs() {
        let mut d = dispatcher();
        d.set_real(
            &req(ObjectType::AnalogValue, 2, PropertyId::PresentValue),
            42.5,
            Some(8),
        )
        .unwrap();
        d.set_enumerated(
            &req(ObjectType::BinaryValue, 5, PropertyId::PresentValue),
            1,
            None,
        )
        .unwrap();
        d.set_unsigned_integer(
            &req(ObjectType::MultiStateValue, 19, PropertyId::PresentValue),
            3,
            None,
        )
        .unwrap();

        // Writes are immediately visible.
        assert_eq!(
            d.get_real(&req(ObjectType::AnalogValue, 2, PropertyId::PresentValue))
                .unwrap(),
            42.5
        );
        assert_eq!(
            d.get_enumerated(&req(ObjectType::BinaryValue, 5, PropertyId::PresentValue))
                .unwrap(),
            1
        );
        assert_eq!(
            d.get_unsigned_integer(&req(
                ObjectType::MultiStateValue,
                19,
                PropertyId::PresentValue
            ))
            .unwrap(),
            3
        );
    }

    #[test]
    fn test_write_guard_rejects_unlisted_pairs() {
        let mut d = dispatcher();
        // Unsigned writer on an analog value is not on the allow-list.
        let err = d
            .set_unsigned_integer(
                &req(ObjectType::AnalogValue, 2, PropertyId::PresentValue),
                7,
                None,
            )
            .unwrap_err();
        assert_eq!(err, PropertyError::WriteRejected);
        // The store is untouched.
        assert_eq!(
            d.get_real(&req(ObjectType::AnalogValue, 2, PropertyId::PresentValue))
                .unwrap(),
            0.0
        );

        // Inputs never accept writes, even with the matching kind.
        assert_eq!(
            d.set_real(
                &req(ObjectType::AnalogInput, 0, PropertyId::PresentValue),
                1.0,
                None
            )
            .unwrap_err(),
            PropertyError::WriteRejected
        );
        // Nor do names.
        assert_eq!(
            d.set_real(&req(ObjectType::AnalogValue, 2, PropertyId::ObjectName), 1.0, None)
                .unwrap_err(),
            PropertyError::WriteRejected
        );
    }

    #[test]
    fn test_date_and_time_readers() {
        let mut d = dispatcher();
        let date_key = PropertyKey::new(DEVICE, ObjectType::Device, DEVICE, PropertyId::LocalDate);
        let time_key = PropertyKey::new(DEVICE, ObjectType::Device, DEVICE, PropertyId::LocalTime);
        d.store_mut().set(
            &date_key,
            PropertyValue::Date(DateValue {
                year: 2026,
                month: 8,
                day: 4,
                weekday: 2,
            }),
        );
        d.store_mut().set(
            &time_key,
            PropertyValue::Time(TimeValue {
                hour: 9,
                minute: 30,
                second: 0,
                hundredths: 0,
            }),
        );

        let date = d
            .get_date(&req(ObjectType::Device, DEVICE, PropertyId::LocalDate))
            .unwrap();
        assert_eq!((date.year, date.month, date.day, date.weekday), (2026, 8, 4, 2));
        let time = d
            .get_time(&req(ObjectType::Device, DEVICE, PropertyId::LocalTime))
            .unwrap();
        assert_eq!((time.hour, time.minute), (9, 30));
        // Crossed readers fail.
        assert!(
            d.get_time(&req(ObjectType::Device, DEVICE, PropertyId::LocalDate))
                .is_err()
        );
    }

    #[test]
    fn test_scalar_readers_for_remaining_kinds() {
        let mut d = dispatcher();
        let double_key =
            PropertyKey::new(DEVICE, ObjectType::AnalogValue, 8, PropertyId::PresentValue);
        d.store_mut().set(&double_key, PropertyValue::Double(1.25));
        let signed_key =
            PropertyKey::new(DEVICE, ObjectType::AnalogValue, 9, PropertyId::PresentValue);
        d.store_mut()
            .set(&signed_key, PropertyValue::SignedInteger(-40));
        let bool_key =
            PropertyKey::new(DEVICE, ObjectType::NetworkPort, 1, PropertyId::ChangesPending);
        d.store_mut().set(&bool_key, PropertyValue::Boolean(false));

        assert_eq!(
            d.get_double(&req(ObjectType::AnalogValue, 8, PropertyId::PresentValue))
                .unwrap(),
            1.25
        );
        assert_eq!(
            d.get_signed_integer(&req(ObjectType::AnalogValue, 9, PropertyId::PresentValue))
                .unwrap(),
            -40
        );
        assert!(
            !d.get_boolean(&req(ObjectType::NetworkPort, 1, PropertyId::ChangesPending))
                .unwrap()
        );
    }
}
