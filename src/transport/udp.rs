//! UDP socket owner and inbound FIFO.
//!
//! One reader thread blocks on the socket and enqueues every datagram
//! unconditionally; the scheduler's tick drains the queue through
//! [`UdpLink::receive`]. The reader never touches the store and never
//! blocks the tick.

use super::{
    ConnectionString, InboundDatagram, MAX_DATAGRAM_SIZE, NETWORK_TYPE_IP, ReceivedDatagram,
};
use crate::config::DEFAULT_BACNET_PORT;
use crate::error::Result;
use crate::network::NetworkPortInfo;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// UDP transport bridge: owns the socket and the inbound message queue
pub struct UdpLink {
    socket: UdpSocket,
    inbound: Receiver<InboundDatagram>,
    broadcast_addr: Ipv4Addr,
    force_broadcast_port: bool,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl UdpLink {
    /// Bind the socket and start the reader thread.
    ///
    /// Bind failure is fatal; there is no retry or backoff.
    pub fn bind(network: &NetworkPortInfo, force_broadcast_port: bool) -> Result<Self> {
        let bind_addr = SocketAddrV4::new(network.ip, network.udp_port);
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_broadcast(true)?;
        log::info!("UDP socket bound to {}", bind_addr);

        let (tx, rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let reader = spawn_reader(socket.try_clone()?, tx, Arc::clone(&running))?;

        Ok(Self {
            socket,
            inbound: rx,
            broadcast_addr: network.broadcast,
            force_broadcast_port,
            running,
            reader: Some(reader),
        })
    }

    /// Send one engine-originated buffer.
    ///
    /// Fire-and-forget: returns the payload length once the datagram is
    /// handed to the OS. A send error is logged and does not invalidate
    /// the returned count. An empty payload is refused with 0.
    pub fn send(&self, payload: &[u8], connection: &ConnectionString, broadcast: bool) -> usize {
        if payload.is_empty() {
            return 0;
        }
        let target = self.resolve_target(connection, broadcast);
        log::trace!("Sending {} bytes to {}", payload.len(), target);
        if let Err(e) = self.socket.send_to(payload, target) {
            log::error!("UDP send to {} failed: {}", target, e);
        }
        payload.len()
    }

    /// Destination for one send: the encoded address, or the broadcast
    /// address (optionally on the well-known port) when requested.
    fn resolve_target(&self, connection: &ConnectionString, broadcast: bool) -> SocketAddrV4 {
        let mut target = connection.to_socket_addr();
        if broadcast {
            target.set_ip(self.broadcast_addr);
            if self.force_broadcast_port {
                target.set_port(DEFAULT_BACNET_PORT);
            }
        }
        target
    }

    /// Pop the oldest queued datagram.
    ///
    /// Returns `None` when the queue is empty. A datagram larger than
    /// `max_len` also returns `None` and is dropped permanently, not
    /// requeued.
    pub fn receive(&self, max_len: usize) -> Option<ReceivedDatagram> {
        let datagram = self.inbound.try_recv().ok()?;
        if datagram.payload.len() > max_len {
            log::error!(
                "Dropping {}-byte datagram from {}: engine buffer is {} bytes",
                datagram.payload.len(),
                datagram.source,
                max_len
            );
            return None;
        }
        Some(ReceivedDatagram {
            source: ConnectionString::from_socket_addr(datagram.source),
            source_length: ConnectionString::LENGTH,
            network_type: NETWORK_TYPE_IP,
            payload: datagram.payload,
        })
    }

    /// Number of datagrams waiting in the queue
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UdpLink {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Receipt handler thread: enqueue only, no size cap, no backpressure.
fn spawn_reader(
    socket: UdpSocket,
    tx: Sender<InboundDatagram>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    // Short timeout so the thread notices shutdown promptly.
    socket.set_read_timeout(Some(Duration::from_millis(100)))?;
    let handle = std::thread::Builder::new()
        .name("udp-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            while running.load(Ordering::Relaxed) {
                match socket.recv_from(&mut buf) {
                    Ok((len, SocketAddr::V4(source))) => {
                        let datagram = InboundDatagram {
                            payload: buf[..len].to_vec(),
                            source,
                        };
                        if tx.send(datagram).is_err() {
                            break;
                        }
                    }
                    Ok((_, source)) => {
                        log::warn!("Ignoring non-IPv4 datagram from {}", source);
                    }
                    Err(e)
                        if e.kind() == ErrorKind::WouldBlock
                            || e.kind() == ErrorKind::TimedOut => {}
                    Err(e)
                        if e.kind() == ErrorKind::ConnectionRefused
                            || e.kind() == ErrorKind::ConnectionReset =>
                    {
                        // ICMP unreachable bounced back from an earlier
                        // send; not a socket fault.
                        log::debug!("Ignoring ICMP-driven receive error: {}", e);
                    }
                    Err(e) => {
                        // Unrecoverable socket error: fail fast, no
                        // reconnect logic in this daemon.
                        log::error!("UDP receive failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            log::debug!("UDP reader thread exiting");
        })?;
    Ok(handle)
}
