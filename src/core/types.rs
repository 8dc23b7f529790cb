//! Core data types for the BACnet object model.
//!
//! Key types:
//! - [`PropertyValue`]: Tagged values held in the object store
//! - [`PropertyRequest`]: One property access as issued by the engine
//! - [`ObjectType`] / [`PropertyId`]: Protocol identifiers used by this bridge

use std::fmt;

/// BACnet object types known to this bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ObjectType {
    AnalogInput = 0,
    AnalogOutput = 1,
    AnalogValue = 2,
    BinaryInput = 3,
    BinaryOutput = 4,
    BinaryValue = 5,
    Device = 8,
    MultiStateInput = 13,
    MultiStateOutput = 14,
    MultiStateValue = 19,
    NetworkPort = 56,
}

impl ObjectType {
    /// Decode a raw protocol identifier
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::AnalogInput),
            1 => Some(Self::AnalogOutput),
            2 => Some(Self::AnalogValue),
            3 => Some(Self::BinaryInput),
            4 => Some(Self::BinaryOutput),
            5 => Some(Self::BinaryValue),
            8 => Some(Self::Device),
            13 => Some(Self::MultiStateInput),
            14 => Some(Self::MultiStateOutput),
            19 => Some(Self::MultiStateValue),
            56 => Some(Self::NetworkPort),
            _ => None,
        }
    }
}

/// BACnet property identifiers known to this bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PropertyId {
    LocalDate = 56,
    LocalTime = 57,
    ObjectName = 77,
    PresentValue = 85,
    StateText = 110,
    StatusFlags = 111,
    IpAddress = 400,
    IpDefaultGateway = 401,
    IpDnsServer = 406,
    IpSubnetMask = 411,
    BacnetIpUdpPort = 412,
    ChangesPending = 416,
    FdBbmdAddress = 418,
    MacAddress = 423,
}

impl PropertyId {
    /// Decode a raw protocol identifier
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            56 => Some(Self::LocalDate),
            57 => Some(Self::LocalTime),
            77 => Some(Self::ObjectName),
            85 => Some(Self::PresentValue),
            110 => Some(Self::StateText),
            111 => Some(Self::StatusFlags),
            400 => Some(Self::IpAddress),
            401 => Some(Self::IpDefaultGateway),
            406 => Some(Self::IpDnsServer),
            411 => Some(Self::IpSubnetMask),
            412 => Some(Self::BacnetIpUdpPort),
            416 => Some(Self::ChangesPending),
            418 => Some(Self::FdBbmdAddress),
            423 => Some(Self::MacAddress),
            _ => None,
        }
    }
}

/// Service choices the engine can be asked to enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ServiceId {
    SubscribeCov = 5,
    ReadPropertyMultiple = 14,
    WriteProperty = 15,
    WritePropertyMultiple = 16,
}

/// Calendar date as carried by date-valued properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    /// 1 = Monday .. 7 = Sunday
    pub weekday: u8,
}

/// Time of day as carried by time-valued properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeValue {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub hundredths: u8,
}

/// Discriminant of a [`PropertyValue`], used in mismatch reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    CharacterString,
    Real,
    Double,
    SignedInteger,
    UnsignedInteger,
    Boolean,
    Enumerated,
    BitString,
    OctetString,
    CharacterStringList,
    Date,
    Time,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::CharacterString => "character string",
            PropertyKind::Real => "real",
            PropertyKind::Double => "double",
            PropertyKind::SignedInteger => "signed integer",
            PropertyKind::UnsignedInteger => "unsigned integer",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Enumerated => "enumerated",
            PropertyKind::BitString => "bit string",
            PropertyKind::OctetString => "octet string",
            PropertyKind::CharacterStringList => "character string list",
            PropertyKind::Date => "date",
            PropertyKind::Time => "time",
        };
        f.write_str(name)
    }
}

/// One stored property value, tagged with exactly one kind.
///
/// Bit strings are text of '0'/'1' characters; string lists back
/// array-valued properties such as multi-state labels and DNS servers.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    CharacterString(String),
    Real(f32),
    Double(f64),
    SignedInteger(i32),
    UnsignedInteger(u32),
    Boolean(bool),
    Enumerated(u32),
    BitString(String),
    OctetString(Vec<u8>),
    CharacterStringList(Vec<String>),
    Date(DateValue),
    Time(TimeValue),
}

impl PropertyValue {
    /// Tag of this value
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::CharacterString(_) => PropertyKind::CharacterString,
            PropertyValue::Real(_) => PropertyKind::Real,
            PropertyValue::Double(_) => PropertyKind::Double,
            PropertyValue::SignedInteger(_) => PropertyKind::SignedInteger,
            PropertyValue::UnsignedInteger(_) => PropertyKind::UnsignedInteger,
            PropertyValue::Boolean(_) => PropertyKind::Boolean,
            PropertyValue::Enumerated(_) => PropertyKind::Enumerated,
            PropertyValue::BitString(_) => PropertyKind::BitString,
            PropertyValue::OctetString(_) => PropertyKind::OctetString,
            PropertyValue::CharacterStringList(_) => PropertyKind::CharacterStringList,
            PropertyValue::Date(_) => PropertyKind::Date,
            PropertyValue::Time(_) => PropertyKind::Time,
        }
    }
}

/// One property access as issued by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyRequest {
    pub device_instance: u32,
    pub object_type: ObjectType,
    pub object_instance: u32,
    pub property: PropertyId,
    /// Array access: 0 asks for the element count, n >= 1 for the n-th
    /// element. `None` addresses the whole value.
    pub array_index: Option<u32>,
}

impl PropertyRequest {
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
            array_index: None,
        }
    }

    /// Same request with an array index attached
    pub fn with_index(mut self, index: u32) -> Self {
        self.array_index = Some(index);
        self
    }
}
