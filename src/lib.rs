//! SOME/IP-SD service discovery client.
//!
//! This crate implements the client side of SOME/IP service discovery:
//! it locates a remote service instance on the local network, tracks
//! its availability through a TTL lease, and re-announces interest with
//! randomized and exponential-backoff retransmission until an offer
//! arrives.
//!
//! # Features
//!
//! - Six-state discovery lifecycle with exhaustive event dispatch
//! - Randomized initial wait and bounded exponential repetition of find
//!   requests
//! - TTL lease tracking with last-offer-wins renewal and race-free
//!   timer cancellation
//! - Wildcard matching on instance ID, major version, and minor version
//! - SD wire codec (SOME/IP header framing, entries, flags) and a UDP
//!   multicast transport
//!
//! # Example
//!
//! ```no_run
//! use someip_sd::{SdClient, SdClientConfig, ServiceId, UdpSdTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> someip_sd::Result<()> {
//! let transport = UdpSdTransport::bind()?;
//!
//! let mut config = SdClientConfig::new(ServiceId(0x1234));
//! config.service_requested = true;
//! let client = SdClient::new(transport, config)?;
//!
//! // ... the client transmits find requests and ingests offers in the
//! // background; poll or observe its state:
//! println!("state: {:?}", client.current_state());
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle Overview
//!
//! ```text
//!                  start()                 timer          exhausted
//! ServiceNotSeen ---------> InitialWait ---------> Repetition ----> Stopped
//!       ^  |                     |                     |
//!       |  | offer               | offer               | offer
//!       |  v                     v                     v
//!  ServiceSeen -- start() --> ServiceReady <-----------+
//!       ^                        |   ^
//!       |  TTL expired           |   | TTL expired (re-discovers)
//!       +------- Stopped <-------+   +--> InitialWait
//!                         stop()
//! ```
//!
//! Offers carry a TTL in seconds; a TTL of zero withdraws the offer. A
//! lease that expires without renewal either settles the client back to
//! passive listening or, when the service is still requested, re-enters
//! the retransmission path.

pub mod client;
pub mod entry;
pub mod error;
pub mod fsm;
pub mod header;
pub mod message;
mod retransmission;
pub mod timer;
pub mod transport;
pub mod types;

// Re-export commonly used types at the crate root
pub use client::{SdClient, SdClientConfig};
pub use entry::ServiceEntry;
pub use error::{Result, SdError};
pub use fsm::SdClientState;
pub use header::{HEADER_SIZE, SdFrameHeader, ServiceId, SessionId};
pub use message::{SdFlags, SdMessage};
pub use timer::{CountdownTimer, TimerToken};
pub use transport::{SdReceiver, SdTransport, UdpSdTransport, UdpSdTransportConfig};
pub use types::{
    ANY_MAJOR_VERSION, ANY_MINOR_VERSION, EntryType, InstanceId, SD_DEFAULT_PORT, SD_ENTRY_SIZE,
    SD_METHOD_ID, SD_MULTICAST_ADDR, SD_SERVICE_ID,
};
