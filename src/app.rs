//! Application orchestration for the SetuBACnet daemon.
//!
//! The scheduler owns every mutable piece of the bridge - store,
//! dispatcher, transport, engine - and drives the two timing loops from
//! a single thread of control. The only other thread is the socket
//! reader, which does nothing but enqueue.

use crate::config::AppConfig;
use crate::core::engine::{Engine, EngineHost};
use crate::core::types::{
    DateValue, ObjectType, PropertyId, PropertyRequest, PropertyValue, ServiceId, TimeValue,
};
use crate::dispatch::{Dispatcher, PropertyResult};
use crate::error::{Error, Result};
use crate::network::NetworkPortInfo;
use crate::sim::ValueSimulator;
use crate::store::{ObjectStore, PropertyKey};
use crate::transport::{ConnectionString, ReceivedDatagram, UdpLink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Engine processing period; the stack requires at least 1 Hz
const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Delay between socket bind and the one-shot identification broadcast
const STARTUP_SETTLE_DELAY: Duration = Duration::from_secs(3);

// Object instances provisioned alongside the configured analog input.
// Instance numbers follow the reference device layout.
const BINARY_INPUT_INSTANCE: u32 = 3;
const MULTI_STATE_INPUT_INSTANCE: u32 = 13;
const ANALOG_VALUE_INSTANCE: u32 = 2;
const BINARY_VALUE_INSTANCE: u32 = 5;
const MULTI_STATE_VALUE_INSTANCE: u32 = 19;
const NETWORK_PORT_INSTANCE: u32 = 1;

/// Per-call bundle of host capabilities handed to the engine
struct HostServices<'a> {
    link: &'a UdpLink,
    dispatcher: &'a mut Dispatcher,
}

impl EngineHost for HostServices<'_> {
    fn send_message(
        &mut self,
        payload: &[u8],
        connection: &ConnectionString,
        broadcast: bool,
    ) -> usize {
        self.link.send(payload, connection, broadcast)
    }

    fn receive_message(&mut self, max_len: usize) -> Option<ReceivedDatagram> {
        self.link.receive(max_len)
    }

    fn system_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn log_debug(&self, message: &str) {
        log::debug!(target: "engine", "{}", message);
    }

    fn get_character_string(
        &self,
        req: &PropertyRequest,
        capacity: usize,
    ) -> PropertyResult<String> {
        self.dispatcher.get_character_string(req, capacity)
    }

    fn get_real(&self, req: &PropertyRequest) -> PropertyResult<f32> {
        self.dispatcher.get_real(req)
    }

    fn get_double(&self, req: &PropertyRequest) -> PropertyResult<f64> {
        self.dispatcher.get_double(req)
    }

    fn get_signed_integer(&self, req: &PropertyRequest) -> PropertyResult<i32> {
        self.dispatcher.get_signed_integer(req)
    }

    fn get_unsigned_integer(&self, req: &PropertyRequest) -> PropertyResult<u32> {
        self.dispatcher.get_unsigned_integer(req)
    }

    fn get_boolean(&self, req: &PropertyRequest) -> PropertyResult<bool> {
        self.dispatcher.get_boolean(req)
    }

    fn get_enumerated(&self, req: &PropertyRequest) -> PropertyResult<u32> {
        self.dispatcher.get_enumerated(req)
    }

    fn get_bit_string(&self, req: &PropertyRequest, capacity: usize) -> PropertyResult<String> {
        self.dispatcher.get_bit_string(req, capacity)
    }

    fn get_octet_string(&self, req: &PropertyRequest, capacity: usize) -> PropertyResult<Vec<u8>> {
        self.dispatcher.get_octet_string(req, capacity)
    }

    fn get_date(&self, req: &PropertyRequest) -> PropertyResult<DateValue> {
        self.dispatcher.get_date(req)
    }

    fn get_time(&self, req: &PropertyRequest) -> PropertyResult<TimeValue> {
        self.dispatcher.get_time(req)
    }

    fn set_real(
        &mut self,
        req: &PropertyRequest,
        value: f32,
        priority: Option<u8>,
    ) -> PropertyResult<()> {
        self.dispatcher.set_real(req, value, priority)
    }

    fn set_enumerated(
        &mut self,
        req: &PropertyRequest,
        value: u32,
        priority: Option<u8>,
    ) -> PropertyResult<()> {
        self.dispatcher.set_enumerated(req, value, priority)
    }

    fn set_unsigned_integer(
        &mut self,
        req: &PropertyRequest,
        value: u32,
        priority: Option<u8>,
    ) -> PropertyResult<()> {
        self.dispatcher.set_unsigned_integer(req, value, priority)
    }
}

/// Scheduler owning the bridge and the engine
pub struct App<E: Engine> {
    config: AppConfig,
    network: NetworkPortInfo,
    link: UdpLink,
    dispatcher: Dispatcher,
    simulator: ValueSimulator,
    engine: E,
    shutdown: Arc<AtomicBool>,
}

impl<E: Engine> App<E> {
    /// Bind the transport, seed the store, and wire the dispatcher
    pub fn new(config: AppConfig, engine: E) -> Result<Self> {
        let network = NetworkPortInfo::from_config(&config.network)?;
        log::info!(
            "Network port: ip {}, subnet {}, broadcast {}",
            network.ip,
            network.subnet,
            network.broadcast
        );
        let link = UdpLink::bind(&network, config.network.force_broadcast_port)?;

        let mut store = ObjectStore::new();
        store.seed(seed_entries(&config, &network));
        log::info!("Seeded {} store entries", store.len());

        let dispatcher = Dispatcher::new(
            store,
            config.device.instance,
            config.device.name.clone(),
            config.device.analog_input_instance,
        );
        let simulator = ValueSimulator::new(
            config.device.instance,
            config.device.analog_input_instance,
            config.simulation.increment,
        );

        Ok(Self {
            config,
            network,
            link,
            dispatcher,
            simulator,
            engine,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run the tick and simulation loops until shutdown
    pub fn run(&mut self) -> Result<()> {
        self.provision();
        self.install_signal_handler()?;

        let sim_period = Duration::from_secs(self.config.simulation.period_secs.max(1));
        let started = Instant::now();
        let mut last_sim = Instant::now();
        let mut announced = false;

        log::info!(
            "Running: tick every {:?}, simulation every {:?}",
            TICK_PERIOD,
            sim_period
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            self.engine.tick(&mut HostServices {
                link: &self.link,
                dispatcher: &mut self.dispatcher,
            });

            if self.config.simulation.enabled && last_sim.elapsed() >= sim_period {
                last_sim = Instant::now();
                self.step_simulation();
            }

            if !announced && started.elapsed() >= STARTUP_SETTLE_DELAY {
                announced = true;
                log::info!("Broadcasting identification to {}", self.network.broadcast);
                self.engine.send_identification(&mut HostServices {
                    link: &self.link,
                    dispatcher: &mut self.dispatcher,
                });
            }

            std::thread::sleep(TICK_PERIOD);
        }

        log::info!("Shutdown requested, stopping");
        Ok(())
    }

    /// One-time engine provisioning; the engine owns the resulting
    /// object database semantics.
    fn provision(&mut self) {
        let device = self.config.device.instance;
        let engine = &mut self.engine;
        engine.add_device(device);
        engine.add_object(
            device,
            ObjectType::AnalogInput,
            self.config.device.analog_input_instance,
        );
        engine.add_object(device, ObjectType::BinaryInput, BINARY_INPUT_INSTANCE);
        engine.add_object(device, ObjectType::MultiStateInput, MULTI_STATE_INPUT_INSTANCE);
        engine.add_object(device, ObjectType::AnalogValue, ANALOG_VALUE_INSTANCE);
        engine.add_object(device, ObjectType::BinaryValue, BINARY_VALUE_INSTANCE);
        engine.add_object(device, ObjectType::MultiStateValue, MULTI_STATE_VALUE_INSTANCE);
        engine.add_network_port_object(device, NETWORK_PORT_INSTANCE);

        for service in [
            ServiceId::SubscribeCov,
            ServiceId::ReadPropertyMultiple,
            ServiceId::WriteProperty,
            ServiceId::WritePropertyMultiple,
        ] {
            engine.set_service_enabled(device, service, true);
        }

        engine.set_property_writable(
            device,
            ObjectType::AnalogValue,
            ANALOG_VALUE_INSTANCE,
            PropertyId::PresentValue,
            true,
        );
        engine.set_property_writable(
            device,
            ObjectType::BinaryValue,
            BINARY_VALUE_INSTANCE,
            PropertyId::PresentValue,
            true,
        );
        engine.set_property_writable(
            device,
            ObjectType::MultiStateValue,
            MULTI_STATE_VALUE_INSTANCE,
            PropertyId::PresentValue,
            true,
        );
    }

    /// Advance the simulated input and notify the engine once per
    /// mutated property
    fn step_simulation(&mut self) {
        if let Some((key, value)) = self.simulator.step(self.dispatcher.store_mut()) {
            log::debug!("Simulated {} -> {:.1}", key, value);
            self.engine.value_updated(
                key.device_instance,
                key.object_type,
                key.object_instance,
                key.property,
            );
        }
    }

    fn install_signal_handler(&self) -> Result<()> {
        let shutdown = Arc::clone(&self.shutdown);
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal");
            shutdown.store(true, Ordering::Relaxed);
        })
        .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;
        Ok(())
    }
}

/// Initial store contents: object names, starting values, state labels,
/// and the network port identity
fn seed_entries(
    config: &AppConfig,
    network: &NetworkPortInfo,
) -> Vec<(PropertyKey, PropertyValue)> {
    let device = config.device.instance;
    let key = |object_type, instance, property| {
        PropertyKey::new(device, object_type, instance, property)
    };
    let state_text = || {
        PropertyValue::CharacterStringList(vec![
            "Off".to_string(),
            "On".to_string(),
            "Auto".to_string(),
        ])
    };

    let mut entries = vec![
        (
            key(
                ObjectType::AnalogInput,
                config.device.analog_input_instance,
                PropertyId::ObjectName,
            ),
            PropertyValue::CharacterString(config.device.analog_input_name.clone()),
        ),
        (
            key(
                ObjectType::AnalogInput,
                config.device.analog_input_instance,
                PropertyId::PresentValue,
            ),
            PropertyValue::Real(config.simulation.initial_value),
        ),
        (
            key(
                ObjectType::AnalogInput,
                config.device.analog_input_instance,
                PropertyId::StatusFlags,
            ),
            PropertyValue::BitString("0000".to_string()),
        ),
        (
            key(ObjectType::BinaryInput, BINARY_INPUT_INSTANCE, PropertyId::ObjectName),
            PropertyValue::CharacterString("BinaryInput Emerald".to_string()),
        ),
        (
            key(ObjectType::BinaryInput, BINARY_INPUT_INSTANCE, PropertyId::PresentValue),
            PropertyValue::Enumerated(0),
        ),
        (
            key(
                ObjectType::MultiStateInput,
                MULTI_STATE_INPUT_INSTANCE,
                PropertyId::ObjectName,
            ),
            PropertyValue::CharacterString("MultiStateInput Gold".to_string()),
        ),
        (
            key(
                ObjectType::MultiStateInput,
                MULTI_STATE_INPUT_INSTANCE,
                PropertyId::PresentValue,
            ),
            PropertyValue::UnsignedInteger(1),
        ),
        (
            key(
                ObjectType::MultiStateInput,
                MULTI_STATE_INPUT_INSTANCE,
                PropertyId::StateText,
            ),
            state_text(),
        ),
        (
            key(ObjectType::AnalogValue, ANALOG_VALUE_INSTANCE, PropertyId::ObjectName),
            PropertyValue::CharacterString("AnalogValue Diamond".to_string()),
        ),
        (
            key(ObjectType::AnalogValue, ANALOG_VALUE_INSTANCE, PropertyId::PresentValue),
            PropertyValue::Real(0.0),
        ),
        (
            key(ObjectType::BinaryValue, BINARY_VALUE_INSTANCE, PropertyId::ObjectName),
            PropertyValue::CharacterString("BinaryValue Onyx".to_string()),
        ),
        (
            key(ObjectType::BinaryValue, BINARY_VALUE_INSTANCE, PropertyId::PresentValue),
            PropertyValue::Enumerated(0),
        ),
        (
            key(
                ObjectType::MultiStateValue,
                MULTI_STATE_VALUE_INSTANCE,
                PropertyId::ObjectName,
            ),
            PropertyValue::CharacterString("MultiStateValue Opal".to_string()),
        ),
        (
            key(
                ObjectType::MultiStateValue,
                MULTI_STATE_VALUE_INSTANCE,
                PropertyId::PresentValue,
            ),
            PropertyValue::UnsignedInteger(1),
        ),
        (
            key(
                ObjectType::MultiStateValue,
                MULTI_STATE_VALUE_INSTANCE,
                PropertyId::StateText,
            ),
            state_text(),
        ),
    ];
    entries.extend(network.seed_entries(device, NETWORK_PORT_INSTANCE));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Engine double recording every call it receives
    #[derive(Default)]
    struct RecordingEngine {
        ticks: u32,
        devices: Vec<u32>,
        objects: Vec<(ObjectType, u32)>,
        network_ports: Vec<u32>,
        services: Vec<(ServiceId, bool)>,
        writable: Vec<(ObjectType, u32, PropertyId)>,
        updates: Vec<(u32, ObjectType, u32, PropertyId)>,
        identifications: u32,
        /// Value read through the host during the last tick
        observed_present_value: Option<f32>,
    }

    impl Engine for RecordingEngine {
        fn tick(&mut self, host: &mut dyn EngineHost) {
            self.ticks += 1;
            // Exercise the host surface the way a stack would: read the
            // live input and echo any inbound datagram back to its source.
            let req = PropertyRequest::new(389055, ObjectType::AnalogInput, 0, PropertyId::PresentValue);
            self.observed_present_value = host.get_real(&req).ok();
            while let Some(datagram) = host.receive_message(1500) {
                host.send_message(&datagram.payload, &datagram.source, false);
            }
        }

        fn add_device(&mut self, device_instance: u32) -> bool {
            self.devices.push(device_instance);
            true
        }

        fn add_object(
            &mut self,
            _device_instance: u32,
            object_type: ObjectType,
            object_instance: u32,
        ) -> bool {
            self.objects.push((object_type, object_instance));
            true
        }

        fn add_network_port_object(&mut self, _device_instance: u32, object_instance: u32) -> bool {
            self.network_ports.push(object_instance);
            true
        }

        fn set_service_enabled(
            &mut self,
            _device_instance: u32,
            service: ServiceId,
            enabled: bool,
        ) -> bool {
            self.services.push((service, enabled));
            true
        }

        fn set_property_writable(
            &mut self,
            _device_instance: u32,
            object_type: ObjectType,
            object_instance: u32,
            property: PropertyId,
            writable: bool,
        ) -> bool {
            assert!(writable);
            self.writable.push((object_type, object_instance, property));
            true
        }

        fn value_updated(
            &mut self,
            device_instance: u32,
            object_type: ObjectType,
            object_instance: u32,
            property: PropertyId,
        ) {
            self.updates
                .push((device_instance, object_type, object_instance, property));
        }

        fn send_identification(&mut self, host: &mut dyn EngineHost) {
            self.identifications += 1;
            let conn = ConnectionString::from_parts(std::net::Ipv4Addr::new(0, 0, 0, 0), 0);
            host.send_message(b"identify", &conn, true);
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.network.ip = "127.0.0.1".to_string();
        config.network.subnet = "255.0.0.0".to_string();
        // Ephemeral port so tests never collide.
        config.network.port = 0;
        config
    }

    #[test]
    fn test_new_seeds_store() {
        let app = App::new(test_config(), RecordingEngine::default()).unwrap();
        let key = PropertyKey::new(389055, ObjectType::AnalogInput, 0, PropertyId::PresentValue);
        assert_eq!(
            app.dispatcher.store().get(&key),
            Some(&PropertyValue::Real(127.5))
        );
        let name_key =
            PropertyKey::new(389055, ObjectType::MultiStateValue, 19, PropertyId::ObjectName);
        assert!(app.dispatcher.store().get(&name_key).is_some());
    }

    #[test]
    fn test_provision_covers_device_model() {
        let mut app = App::new(test_config(), RecordingEngine::default()).unwrap();
        app.provision();

        assert_eq!(app.engine.devices, vec![389055]);
        assert_eq!(app.engine.objects.len(), 6);
        assert!(app.engine.objects.contains(&(ObjectType::AnalogInput, 0)));
        assert!(app.engine.objects.contains(&(ObjectType::MultiStateValue, 19)));
        assert_eq!(app.engine.network_ports, vec![1]);
        assert_eq!(app.engine.services.len(), 4);
        assert!(app.engine.services.contains(&(ServiceId::SubscribeCov, true)));
        assert_eq!(app.engine.writable.len(), 3);
    }

    #[test]
    fn test_simulation_updates_store_and_notifies_once() {
        let mut app = App::new(test_config(), RecordingEngine::default()).unwrap();
        app.step_simulation();

        let key = PropertyKey::new(389055, ObjectType::AnalogInput, 0, PropertyId::PresentValue);
        match app.dispatcher.store().get(&key) {
            Some(PropertyValue::Real(value)) => assert!((value - 128.6).abs() < 1e-4),
            other => panic!("unexpected store entry {:?}", other),
        }
        assert_eq!(
            app.engine.updates,
            vec![(389055, ObjectType::AnalogInput, 0, PropertyId::PresentValue)]
        );
    }

    #[test]
    fn test_tick_reads_live_value_through_host() {
        let mut app = App::new(test_config(), RecordingEngine::default()).unwrap();
        app.engine.tick(&mut HostServices {
            link: &app.link,
            dispatcher: &mut app.dispatcher,
        });
        assert_eq!(app.engine.ticks, 1);
        assert_eq!(app.engine.observed_present_value, Some(127.5));

        app.step_simulation();
        app.engine.tick(&mut HostServices {
            link: &app.link,
            dispatcher: &mut app.dispatcher,
        });
        let observed = app.engine.observed_present_value.unwrap();
        assert!((observed - 128.6).abs() < 1e-4);
    }

    #[test]
    fn test_identification_goes_out_as_broadcast() {
        let mut app = App::new(test_config(), RecordingEngine::default()).unwrap();
        app.engine.send_identification(&mut HostServices {
            link: &app.link,
            dispatcher: &mut app.dispatcher,
        });
        assert_eq!(app.engine.identifications, 1);
    }
}
