//! Transport abstraction and UDP multicast transport for SD messages.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::error::{Result, SdError};
use crate::message::SdMessage;
use crate::types::{SD_DEFAULT_PORT, SD_MULTICAST_ADDR};

/// Receiver of parsed SD messages.
///
/// A transport holds its receiver weakly: dropping the receiving client
/// stops delivery without a reference cycle.
pub trait SdReceiver: Send + Sync {
    /// Deliver one received SD message.
    fn on_sd_message(&self, message: SdMessage);
}

/// An unreliable, unordered, at-most-once message channel for SD.
///
/// Implementations do not retry failed sends; protocol-level
/// retransmission is the client's repetition schedule.
pub trait SdTransport: Send + Sync {
    /// Send an SD message.
    fn send(&self, message: &SdMessage) -> Result<()>;

    /// Register the receiver for incoming SD messages, replacing any
    /// previous one.
    fn set_receiver(&self, receiver: Weak<dyn SdReceiver>);
}

/// UDP transport configuration.
#[derive(Debug, Clone)]
pub struct UdpSdTransportConfig {
    /// Local address to bind to.
    pub bind_addr: SocketAddr,
    /// Multicast address for SD.
    pub multicast_addr: SocketAddr,
    /// Interface address for multicast (None = any).
    pub multicast_interface: Option<Ipv4Addr>,
}

impl Default for UdpSdTransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SD_DEFAULT_PORT)),
            multicast_addr: SocketAddr::V4(SocketAddrV4::new(SD_MULTICAST_ADDR, SD_DEFAULT_PORT)),
            multicast_interface: None,
        }
    }
}

/// SD transport over UDP multicast.
///
/// A background task reads datagrams off the socket, parses them, and
/// forwards SD messages to the registered receiver; malformed or non-SD
/// datagrams are dropped. Must be created within a tokio runtime.
pub struct UdpSdTransport {
    socket: Arc<tokio::net::UdpSocket>,
    multicast_addr: SocketAddr,
    receiver: Mutex<Option<Weak<dyn SdReceiver>>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpSdTransport {
    /// Create a transport with default configuration.
    pub fn bind() -> Result<Arc<Self>> {
        Self::with_config(UdpSdTransportConfig::default())
    }

    /// Create a transport with custom configuration.
    pub fn with_config(config: UdpSdTransportConfig) -> Result<Arc<Self>> {
        let socket = std::net::UdpSocket::bind(config.bind_addr)?;

        // Join the multicast group
        if let SocketAddr::V4(multicast) = config.multicast_addr {
            let interface = config.multicast_interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
            socket.join_multicast_v4(multicast.ip(), &interface)?;
        }

        // Non-blocking is required to hand the socket to tokio
        socket.set_nonblocking(true)?;
        let socket = Arc::new(tokio::net::UdpSocket::from_std(socket)?);

        let transport = Arc::new(Self {
            socket,
            multicast_addr: config.multicast_addr,
            receiver: Mutex::new(None),
            recv_task: Mutex::new(None),
        });
        transport.spawn_receive_loop();

        Ok(transport)
    }

    /// Get the local address of the socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(SdError::Io)
    }

    fn spawn_receive_loop(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let socket = Arc::clone(&self.socket);
        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, from)) => {
                        let Some(transport) = weak.upgrade() else {
                            break;
                        };
                        transport.deliver(&buf[..len], from);
                    }
                    Err(e) => {
                        warn!("SD receive failed: {e}");
                        break;
                    }
                }
            }
        });
        *self.recv_task.lock().unwrap() = Some(task);
    }

    fn deliver(&self, data: &[u8], from: SocketAddr) {
        let message = match SdMessage::from_frame(data) {
            Ok(message) => message,
            Err(e) => {
                debug!("dropping datagram from {from}: {e}");
                return;
            }
        };

        let receiver = self.receiver.lock().unwrap().clone();
        if let Some(receiver) = receiver.and_then(|weak| weak.upgrade()) {
            receiver.on_sd_message(message);
        }
    }
}

impl SdTransport for UdpSdTransport {
    fn send(&self, message: &SdMessage) -> Result<()> {
        let frame = message.to_frame();
        self.socket
            .try_send_to(&frame, self.multicast_addr)
            .map_err(SdError::Io)?;
        Ok(())
    }

    fn set_receiver(&self, receiver: Weak<dyn SdReceiver>) {
        *self.receiver.lock().unwrap() = Some(receiver);
    }
}

impl Drop for UdpSdTransport {
    fn drop(&mut self) {
        if let Some(task) = self.recv_task.lock().unwrap().take() {
            task.abort();
        }
    }
}
