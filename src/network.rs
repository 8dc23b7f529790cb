//! Network port identity, derived once at startup.
//!
//! The `[network]` config section supplies the interface address and
//! subnet mask; the broadcast address is computed from them before the
//! first outbound broadcast. Everything here is immutable for the
//! process lifetime except the changes-pending flag.

use crate::config::NetworkConfig;
use crate::core::types::{ObjectType, PropertyId, PropertyValue};
use crate::error::{Error, Result};
use crate::store::PropertyKey;
use crate::transport::ConnectionString;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Host network identity exposed through the network port object
#[derive(Debug, Clone)]
pub struct NetworkPortInfo {
    pub ip: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub broadcast: Ipv4Addr,
    pub udp_port: u16,
    pub gateway: Option<Ipv4Addr>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub mac: Option<[u8; 6]>,
    /// Foreign-device registration address, for relaying broadcasts
    /// across network boundaries
    pub foreign_device: Option<SocketAddrV4>,
    pub changes_pending: bool,
}

impl NetworkPortInfo {
    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        let ip: Ipv4Addr = config.ip.parse()?;
        let subnet: Ipv4Addr = config.subnet.parse()?;
        let broadcast = broadcast_address(ip, subnet);
        let gateway = match &config.gateway {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        let dns_servers = config
            .dns
            .iter()
            .map(|raw| raw.parse())
            .collect::<std::result::Result<Vec<Ipv4Addr>, _>>()?;
        let mac = match &config.mac {
            Some(raw) => Some(parse_mac(raw)?),
            None => None,
        };
        let foreign_device = match &config.foreign_device {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        Ok(Self {
            ip,
            subnet,
            broadcast,
            udp_port: config.port,
            gateway,
            dns_servers,
            mac,
            foreign_device,
            changes_pending: false,
        })
    }

    /// Store entries for the network port object's properties
    pub fn seed_entries(
        &self,
        device_instance: u32,
        object_instance: u32,
    ) -> Vec<(PropertyKey, PropertyValue)> {
        let key = |property| {
            PropertyKey::new(
                device_instance,
                ObjectType::NetworkPort,
                object_instance,
                property,
            )
        };
        let mut entries = vec![
            (
                key(PropertyId::IpAddress),
                PropertyValue::OctetString(self.ip.octets().to_vec()),
            ),
            (
                key(PropertyId::IpSubnetMask),
                PropertyValue::OctetString(self.subnet.octets().to_vec()),
            ),
            (
                key(PropertyId::BacnetIpUdpPort),
                PropertyValue::UnsignedInteger(u32::from(self.udp_port)),
            ),
            (
                key(PropertyId::ChangesPending),
                PropertyValue::Boolean(self.changes_pending),
            ),
        ];
        if let Some(gateway) = self.gateway {
            entries.push((
                key(PropertyId::IpDefaultGateway),
                PropertyValue::OctetString(gateway.octets().to_vec()),
            ));
        }
        if !self.dns_servers.is_empty() {
            entries.push((
                key(PropertyId::IpDnsServer),
                PropertyValue::CharacterStringList(
                    self.dns_servers.iter().map(|dns| dns.to_string()).collect(),
                ),
            ));
        }
        if let Some(mac) = self.mac {
            entries.push((
                key(PropertyId::MacAddress),
                PropertyValue::OctetString(mac.to_vec()),
            ));
        }
        if let Some(fd) = self.foreign_device {
            entries.push((
                key(PropertyId::FdBbmdAddress),
                PropertyValue::OctetString(ConnectionString::from_socket_addr(fd).as_bytes().to_vec()),
            ));
        }
        entries
    }
}

/// Broadcast address for an interface: per octet, `ip | !subnet`
pub fn broadcast_address(ip: Ipv4Addr, subnet: Ipv4Addr) -> Ipv4Addr {
    let ip = ip.octets();
    let subnet = subnet.octets();
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = ip[i] | !subnet[i];
    }
    Ipv4Addr::from(out)
}

fn parse_mac(raw: &str) -> Result<[u8; 6]> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 6 {
        return Err(Error::InvalidConfig(format!("MAC address: {}", raw)));
    }
    let mut mac = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        mac[i] = u8::from_str_radix(part, 16)
            .map_err(|_| Error::InvalidConfig(format!("MAC address: {}", raw)))?;
    }
    Ok(mac)
}
