//! Engine contract: the surfaces exchanged with the external BACnet
//! protocol stack.
//!
//! The stack owns message framing, service procedures, and subscription
//! bookkeeping. This crate feeds it datagrams, time, and typed property
//! access, and drives its tick. [`EngineHost`] is what the bridge
//! presents to the stack; [`Engine`] is what the stack presents back.

use crate::core::types::{
    DateValue, ObjectType, PropertyId, PropertyRequest, ServiceId, TimeValue,
};
use crate::dispatch::PropertyResult;
use crate::transport::{ConnectionString, MAX_DATAGRAM_SIZE, ReceivedDatagram};

/// Host capabilities handed to the engine on every call.
///
/// One method per registered capability: transport send/receive, system
/// time, debug logging, and one typed get/set per supported value kind.
/// The implementation lives as long as the scheduler, so the stack
/// never needs to retain handlers of its own.
pub trait EngineHost {
    /// Fire-and-forget datagram send; returns the accepted byte count
    fn send_message(
        &mut self,
        payload: &[u8],
        connection: &ConnectionString,
        broadcast: bool,
    ) -> usize;

    /// Pop the oldest inbound datagram, or `None` when idle
    fn receive_message(&mut self, max_len: usize) -> Option<ReceivedDatagram>;

    /// Unix time in seconds
    fn system_time(&self) -> u64;

    /// Diagnostic output from inside the stack
    fn log_debug(&self, message: &str);

    fn get_character_string(
        &self,
        req: &PropertyRequest,
        capacity: usize,
    ) -> PropertyResult<String>;
    fn get_real(&self, req: &PropertyRequest) -> PropertyResult<f32>;
    fn get_double(&self, req: &PropertyRequest) -> PropertyResult<f64>;
    fn get_signed_integer(&self, req: &PropertyRequest) -> PropertyResult<i32>;
    fn get_unsigned_integer(&self, req: &PropertyRequest) -> PropertyResult<u32>;
    fn get_boolean(&self, req: &PropertyRequest) -> PropertyResult<bool>;
    fn get_enumerated(&self, req: &PropertyRequest) -> PropertyResult<u32>;
    fn get_bit_string(&self, req: &PropertyRequest, capacity: usize) -> PropertyResult<String>;
    fn get_octet_string(&self, req: &PropertyRequest, capacity: usize) -> PropertyResult<Vec<u8>>;
    fn get_date(&self, req: &PropertyRequest) -> PropertyResult<DateValue>;
    fn get_time(&self, req: &PropertyRequest) -> PropertyResult<TimeValue>;

    fn set_real(
        &mut self,
        req: &PropertyRequest,
        value: f32,
        priority: Option<u8>,
    ) -> PropertyResult<()>;
    fn set_enumerated(
        &mut self,
        req: &PropertyRequest,
        value: u32,
        priority: Option<u8>,
    ) -> PropertyResult<()>;
    fn set_unsigned_integer(
        &mut self,
        req: &PropertyRequest,
        value: u32,
        priority: Option<u8>,
    ) -> PropertyResult<()>;
}

/// External protocol stack driven by the scheduler
pub trait Engine {
    /// Process pending work: drain [`EngineHost::receive_message`],
    /// dispatch services, emit replies. Must run at least once a
    /// second; the scheduler calls it every 100 ms.
    fn tick(&mut self, host: &mut dyn EngineHost);

    // One-time provisioning, called at startup before the first tick.
    fn add_device(&mut self, device_instance: u32) -> bool;
    fn add_object(
        &mut self,
        device_instance: u32,
        object_type: ObjectType,
        object_instance: u32,
    ) -> bool;
    fn add_network_port_object(&mut self, device_instance: u32, object_instance: u32) -> bool;
    fn set_service_enabled(
        &mut self,
        device_instance: u32,
        service: ServiceId,
        enabled: bool,
    ) -> bool;
    fn set_property_writable(
        &mut self,
        device_instance: u32,
        object_type: ObjectType,
        object_instance: u32,
        property: PropertyId,
        writable: bool,
    ) -> bool;

    /// Notification hook, called after every store mutation that should
    /// produce a change-of-value report
    fn value_updated(
        &mut self,
        device_instance: u32,
        object_type: ObjectType,
        object_instance: u32,
        property: PropertyId,
    );

    /// One-shot broadcast identification after the startup settle
    /// delay. The engine formats the message; the host only supplies
    /// the socket.
    fn send_identification(&mut self, host: &mut dyn EngineHost);
}

/// Stand-in engine for running the daemon without a linked protocol
/// stack. Accepts provisioning, drains and logs traffic, emits nothing.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    received: u64,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for DiagnosticEngine {
    fn tick(&mut self, host: &mut dyn EngineHost) {
        while let Some(datagram) = host.receive_message(MAX_DATAGRAM_SIZE) {
            self.received += 1;
            log::debug!(
                "Datagram of {} bytes from {} (total {})",
                datagram.payload.len(),
                datagram.source,
                self.received
            );
        }
    }

    fn add_device(&mut self, device_instance: u32) -> bool {
        log::info!("Engine: add device {}", device_instance);
        true
    }

    fn add_object(
        &mut self,
        device_instance: u32,
        object_type: ObjectType,
        object_instance: u32,
    ) -> bool {
        log::info!(
            "Engine: add object {:?} {} to device {}",
            object_type,
            object_instance,
            device_instance
        );
        true
    }

    fn add_network_port_object(&mut self, device_instance: u32, object_instance: u32) -> bool {
        log::info!(
            "Engine: add network port {} to device {}",
            object_instance,
            device_instance
        );
        true
    }

    fn set_service_enabled(
        &mut self,
        device_instance: u32,
        service: ServiceId,
        enabled: bool,
    ) -> bool {
        log::info!(
            "Engine: service {:?} {} on device {}",
            service,
            if enabled { "enabled" } else { "disabled" },
            device_instance
        );
        true
    }

    fn set_property_writable(
        &mut self,
        device_instance: u32,
        object_type: ObjectType,
        object_instance: u32,
        property: PropertyId,
        writable: bool,
    ) -> bool {
        log::info!(
            "Engine: {:?} {} {:?} writable={} on device {}",
            object_type,
            object_instance,
            property,
            writable,
            device_instance
        );
        true
    }

    fn value_updated(
        &mut self,
        device_instance: u32,
        object_type: ObjectType,
        object_instance: u32,
        property: PropertyId,
    ) {
        log::debug!(
            "Engine: value updated {} {:?} {} {:?}",
            device_instance,
            object_type,
            object_instance,
            property
        );
    }

    fn send_identification(&mut self, _host: &mut dyn EngineHost) {
        log::debug!("Engine: no protocol stack linked, skipping identification broadcast");
    }
}
