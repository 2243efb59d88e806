//! The service discovery client coordinator.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, warn};

use crate::entry::ServiceEntry;
use crate::error::{Result, SdError};
use crate::fsm::{Effect, SdClientFsm, SdClientState};
use crate::header::ServiceId;
use crate::message::SdMessage;
use crate::retransmission::{InitialWaitSchedule, RepetitionSchedule};
use crate::timer::{CountdownTimer, TimerToken};
use crate::transport::{SdReceiver, SdTransport};
use crate::types::{ANY_MAJOR_VERSION, ANY_MINOR_VERSION, InstanceId};

/// Configuration of a discovery client.
///
/// The initial delay bounds carry the naming of the governing
/// configuration surface: the *minimum* is the upper edge of the
/// randomized wait window, and construction rejects configurations
/// where `initial_delay_min_ms < initial_delay_max_ms` or either bound
/// is negative.
#[derive(Debug, Clone)]
pub struct SdClientConfig {
    /// Service ID to discover (exact match).
    pub service_id: ServiceId,
    /// Instance ID to discover, [`InstanceId::ANY`] by default.
    pub instance_id: InstanceId,
    /// Major version to discover, [`ANY_MAJOR_VERSION`] by default.
    pub major_version: u8,
    /// Minor version to discover, [`ANY_MINOR_VERSION`] by default.
    pub minor_version: u32,
    /// Upper edge of the randomized initial wait window, milliseconds.
    pub initial_delay_min_ms: i64,
    /// Lower edge of the randomized initial wait window, milliseconds.
    pub initial_delay_max_ms: i64,
    /// Base delay of the exponential repetition schedule, milliseconds.
    pub repetition_base_delay_ms: i64,
    /// Maximum number of repetition-phase transmissions.
    pub repetition_max: u32,
    /// Whether the service is already requested at startup.
    pub service_requested: bool,
}

impl SdClientConfig {
    /// Create a configuration with default timing for a service.
    pub fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            instance_id: InstanceId::ANY,
            major_version: ANY_MAJOR_VERSION,
            minor_version: ANY_MINOR_VERSION,
            initial_delay_min_ms: 100,
            initial_delay_max_ms: 10,
            repetition_base_delay_ms: 200,
            repetition_max: 3,
            service_requested: false,
        }
    }

    /// Validate the delay bounds.
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay_min_ms < 0 || self.initial_delay_max_ms < 0 {
            return Err(SdError::invalid_config(
                "initial delay bounds must not be negative",
            ));
        }
        if self.initial_delay_min_ms < self.initial_delay_max_ms {
            return Err(SdError::invalid_config(
                "initial delay minimum must not be less than the maximum",
            ));
        }
        if self.repetition_base_delay_ms < 0 {
            return Err(SdError::invalid_config(
                "repetition base delay must not be negative",
            ));
        }
        Ok(())
    }

    fn descriptor(&self) -> ServiceEntry {
        ServiceEntry::find(
            self.service_id,
            self.instance_id,
            self.major_version,
            self.minor_version,
        )
    }
}

/// State owned by the dispatch lock.
struct Inner {
    fsm: SdClientFsm,
    find_message: SdMessage,
    find_timer: CountdownTimer,
    ttl_timer: CountdownTimer,
}

/// A SOME/IP-SD discovery client for one service.
///
/// The client transmits find requests on a randomized and
/// exponential-backoff schedule, ingests offer and stop-offer
/// notifications from its transport, and tracks the offered service's
/// TTL lease through the six-state lifecycle of [`SdClientState`].
///
/// All state transitions - [`start`](Self::start)/[`stop`](Self::stop)
/// calls, received messages, and timer expiries - serialize on one
/// internal dispatch lock; none of them blocks the caller beyond that.
///
/// Must be created within a tokio runtime.
pub struct SdClient {
    weak: Weak<SdClient>,
    transport: Arc<dyn SdTransport>,
    descriptor: ServiceEntry,
    inner: Mutex<Inner>,
}

impl SdClient {
    /// Create a client and register it as the transport's receiver.
    ///
    /// Fails with [`SdError::InvalidConfig`] if the configured delay
    /// bounds are invalid; no client is constructed in that case. When
    /// `service_requested` is set the client enters the initial wait
    /// phase before this returns.
    pub fn new(transport: Arc<dyn SdTransport>, config: SdClientConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let descriptor = config.descriptor();
        let fsm = SdClientFsm::new(
            InitialWaitSchedule::new(
                config.initial_delay_min_ms as u64,
                config.initial_delay_max_ms as u64,
            ),
            RepetitionSchedule::new(config.repetition_base_delay_ms as u64, config.repetition_max),
        );

        let client = Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            transport: Arc::clone(&transport),
            descriptor: descriptor.clone(),
            inner: Mutex::new(Inner {
                fsm,
                find_message: SdMessage::find(descriptor),
                find_timer: CountdownTimer::new(),
                ttl_timer: CountdownTimer::new(),
            }),
        });

        if config.service_requested {
            client.start();
        }

        let receiver: Weak<dyn SdReceiver> = client.weak.clone();
        transport.set_receiver(receiver);

        Ok(client)
    }

    /// Request the service, beginning discovery if it is not already
    /// known or underway.
    ///
    /// Only the passive states react; calling this while discovery is
    /// progressing or the service is ready is a no-op.
    pub fn start(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.fsm.state() {
            SdClientState::ServiceNotSeen | SdClientState::ServiceSeen => {
                let effects = inner.fsm.service_requested();
                self.apply(&mut inner, effects);
            }
            SdClientState::InitialWaitPhase
            | SdClientState::RepetitionPhase
            | SdClientState::ServiceReady
            | SdClientState::Stopped => {}
        }
    }

    /// Withdraw the request for the service.
    ///
    /// A pending retransmission is cancelled in place; a ready service
    /// is released into [`SdClientState::Stopped`] with its lease still
    /// tracked.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.fsm.state() {
            SdClientState::InitialWaitPhase | SdClientState::RepetitionPhase => {
                inner.find_timer.cancel();
            }
            SdClientState::ServiceReady | SdClientState::Stopped => {
                let effects = inner.fsm.service_not_requested();
                self.apply(&mut inner, effects);
            }
            SdClientState::ServiceNotSeen | SdClientState::ServiceSeen => {}
        }
    }

    /// The currently active lifecycle state.
    pub fn current_state(&self) -> SdClientState {
        self.inner.lock().unwrap().fsm.state()
    }

    /// Whether the service is currently offered and requested.
    pub fn is_ready(&self) -> bool {
        self.current_state() == SdClientState::ServiceReady
    }

    /// The find descriptor this client matches offers against.
    pub fn descriptor(&self) -> &ServiceEntry {
        &self.descriptor
    }

    fn apply(&self, inner: &mut Inner, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SendFind => self.send_find(inner),
                Effect::ArmFindTimer(delay) => self.arm_find_timer(inner, delay),
                Effect::CancelFindTimer => inner.find_timer.cancel(),
                Effect::ArmTtlTimer(delay) => self.arm_ttl_timer(inner, delay),
                Effect::CancelTtlTimer => inner.ttl_timer.cancel(),
            }
        }
    }

    fn send_find(&self, inner: &mut Inner) {
        debug!(
            "sending find for service {} (session {})",
            self.descriptor.service_id, inner.find_message.session_id
        );
        if let Err(e) = self.transport.send(&inner.find_message) {
            // The transport is unreliable by contract; the repetition
            // schedule is the only retry mechanism.
            warn!("failed to send find request: {e}");
        }
        inner.find_message.session_id = inner.find_message.session_id.next();
    }

    fn arm_find_timer(&self, inner: &mut Inner, delay: Duration) {
        let weak = self.weak.clone();
        inner.find_timer.arm(delay, move |token| {
            if let Some(client) = weak.upgrade() {
                client.on_find_deadline(token);
            }
        });
    }

    fn arm_ttl_timer(&self, inner: &mut Inner, delay: Duration) {
        let weak = self.weak.clone();
        inner.ttl_timer.arm(delay, move |token| {
            if let Some(client) = weak.upgrade() {
                client.on_ttl_deadline(token);
            }
        });
    }

    fn on_find_deadline(&self, token: TimerToken) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.find_timer.is_current(token) {
            return;
        }
        let effects = inner.fsm.find_timer_elapsed();
        self.apply(&mut inner, effects);
    }

    fn on_ttl_deadline(&self, token: TimerToken) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.ttl_timer.is_current(token) {
            return;
        }
        let effects = inner.fsm.ttl_expired();
        self.apply(&mut inner, effects);
    }
}

impl SdReceiver for SdClient {
    fn on_sd_message(&self, message: SdMessage) {
        let Some(ttl) = message
            .find_matching_offer(&self.descriptor)
            .map(|offer| offer.ttl)
        else {
            return;
        };

        let mut inner = self.inner.lock().unwrap();
        let effects = if ttl > 0 {
            inner.fsm.service_offered(ttl)
        } else {
            // A withdrawal is meaningful only in the ready-class states.
            match inner.fsm.state() {
                SdClientState::ServiceSeen
                | SdClientState::ServiceReady
                | SdClientState::RepetitionPhase => inner.fsm.service_offer_stopped(),
                SdClientState::ServiceNotSeen
                | SdClientState::InitialWaitPhase
                | SdClientState::Stopped => return,
            }
        };
        self.apply(&mut inner, effects);
    }
}
