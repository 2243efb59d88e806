//! The client discovery state machine.
//!
//! The machine is pure: dispatching an event mutates only the state
//! selector and the retransmission schedules, and returns the side
//! effects (find transmissions, timer operations) for the caller to
//! execute. Every dispatch matches exhaustively over all six states, so
//! an event arriving in a state that has no use for it degrades to a
//! no-op instead of a failed downcast.

use std::time::Duration;

use log::debug;

use crate::retransmission::{InitialWaitSchedule, RepetitionSchedule};

/// Lifecycle states of a discovery client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdClientState {
    /// No service known and none requested.
    ServiceNotSeen,
    /// An offer was received while the service was not requested; a TTL
    /// lease is running.
    ServiceSeen,
    /// Requested; waiting out the randomized delay before the first
    /// find transmission.
    InitialWaitPhase,
    /// Requested; retransmitting finds on an exponential backoff
    /// schedule.
    RepetitionPhase,
    /// Offered while requested; the service is usable and its TTL lease
    /// is running.
    ServiceReady,
    /// Was ready, then unrequested or withdrawn.
    Stopped,
}

impl std::fmt::Display for SdClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SdClientState::ServiceNotSeen => "ServiceNotSeen",
            SdClientState::ServiceSeen => "ServiceSeen",
            SdClientState::InitialWaitPhase => "InitialWaitPhase",
            SdClientState::RepetitionPhase => "RepetitionPhase",
            SdClientState::ServiceReady => "ServiceReady",
            SdClientState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Side effects requested by a state transition, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    /// Transmit the find message and increment its session ID.
    SendFind,
    /// Arm the retransmission timer.
    ArmFindTimer(Duration),
    /// Cancel any pending retransmission.
    CancelFindTimer,
    /// Arm the TTL lease timer, superseding any previous lease.
    ArmTtlTimer(Duration),
    /// Cancel the TTL lease timer.
    CancelTtlTimer,
}

/// The discovery state machine.
pub(crate) struct SdClientFsm {
    state: SdClientState,
    initial_wait: InitialWaitSchedule,
    repetition: RepetitionSchedule,
}

impl SdClientFsm {
    /// Create a machine in the passive [`SdClientState::ServiceNotSeen`]
    /// state.
    pub(crate) fn new(
        initial_wait: InitialWaitSchedule,
        repetition: RepetitionSchedule,
    ) -> Self {
        Self {
            state: SdClientState::ServiceNotSeen,
            initial_wait,
            repetition,
        }
    }

    /// The currently active state.
    pub(crate) fn state(&self) -> SdClientState {
        self.state
    }

    fn transition(&mut self, to: SdClientState) {
        debug!("state {} -> {}", self.state, to);
        self.state = to;
    }

    /// The application requested the service.
    pub(crate) fn service_requested(&mut self) -> Vec<Effect> {
        match self.state {
            SdClientState::ServiceNotSeen => self.enter_initial_wait(),
            SdClientState::ServiceSeen => {
                // The lease is already running; the service is usable
                // right away.
                self.transition(SdClientState::ServiceReady);
                Vec::new()
            }
            // Already discovering, ready, or stopped; repeated requests
            // are a no-op.
            SdClientState::InitialWaitPhase
            | SdClientState::RepetitionPhase
            | SdClientState::ServiceReady
            | SdClientState::Stopped => Vec::new(),
        }
    }

    /// The application no longer requests the service.
    pub(crate) fn service_not_requested(&mut self) -> Vec<Effect> {
        match self.state {
            SdClientState::ServiceReady => {
                // The lease keeps running so a later expiry settles the
                // client back to ServiceNotSeen.
                self.transition(SdClientState::Stopped);
                Vec::new()
            }
            SdClientState::ServiceNotSeen
            | SdClientState::ServiceSeen
            | SdClientState::InitialWaitPhase
            | SdClientState::RepetitionPhase
            | SdClientState::Stopped => Vec::new(),
        }
    }

    /// A matching offer with the given TTL arrived.
    pub(crate) fn service_offered(&mut self, ttl_secs: u32) -> Vec<Effect> {
        let lease = Effect::ArmTtlTimer(Duration::from_secs(u64::from(ttl_secs)));
        match self.state {
            SdClientState::ServiceNotSeen => {
                self.transition(SdClientState::ServiceSeen);
                vec![lease]
            }
            SdClientState::Stopped => {
                // A fresh offer while unrequested is exactly what
                // ServiceSeen tracks.
                self.transition(SdClientState::ServiceSeen);
                vec![lease]
            }
            SdClientState::ServiceSeen | SdClientState::ServiceReady => vec![lease],
            SdClientState::InitialWaitPhase | SdClientState::RepetitionPhase => {
                self.transition(SdClientState::ServiceReady);
                vec![Effect::CancelFindTimer, lease]
            }
        }
    }

    /// A matching stop-offer (TTL = 0) arrived.
    ///
    /// The coordinator gates this dispatch to the ready-class states
    /// (ServiceSeen, ServiceReady, RepetitionPhase); anything else is a
    /// no-op here.
    pub(crate) fn service_offer_stopped(&mut self) -> Vec<Effect> {
        match self.state {
            SdClientState::ServiceSeen => {
                self.transition(SdClientState::ServiceNotSeen);
                vec![Effect::CancelTtlTimer]
            }
            SdClientState::ServiceReady => {
                self.transition(SdClientState::Stopped);
                vec![Effect::CancelTtlTimer]
            }
            SdClientState::RepetitionPhase => {
                // Withdrawal during retransmission takes the ready-state
                // exit; the pending find timer dies with the phase.
                self.transition(SdClientState::Stopped);
                vec![Effect::CancelFindTimer, Effect::CancelTtlTimer]
            }
            SdClientState::ServiceNotSeen
            | SdClientState::InitialWaitPhase
            | SdClientState::Stopped => Vec::new(),
        }
    }

    /// The retransmission timer fired.
    pub(crate) fn find_timer_elapsed(&mut self) -> Vec<Effect> {
        match self.state {
            SdClientState::InitialWaitPhase => {
                let mut effects = vec![Effect::SendFind];
                effects.extend(self.enter_repetition());
                effects
            }
            SdClientState::RepetitionPhase => {
                let mut effects = vec![Effect::SendFind];
                if self.repetition.record_send() {
                    self.transition(SdClientState::Stopped);
                } else {
                    effects.push(Effect::ArmFindTimer(self.repetition.current_delay()));
                }
                effects
            }
            // Stale expiry; the timer was superseded concurrently.
            SdClientState::ServiceNotSeen
            | SdClientState::ServiceSeen
            | SdClientState::ServiceReady
            | SdClientState::Stopped => Vec::new(),
        }
    }

    /// The TTL lease timer fired without a renewing offer.
    pub(crate) fn ttl_expired(&mut self) -> Vec<Effect> {
        match self.state {
            SdClientState::ServiceSeen | SdClientState::Stopped => {
                self.transition(SdClientState::ServiceNotSeen);
                Vec::new()
            }
            SdClientState::ServiceReady => {
                // Still requested: go back to actively searching.
                self.enter_initial_wait()
            }
            // Stale expiry; no lease is tracked here.
            SdClientState::ServiceNotSeen
            | SdClientState::InitialWaitPhase
            | SdClientState::RepetitionPhase => Vec::new(),
        }
    }

    fn enter_initial_wait(&mut self) -> Vec<Effect> {
        self.transition(SdClientState::InitialWaitPhase);
        vec![Effect::ArmFindTimer(self.initial_wait.random_delay())]
    }

    fn enter_repetition(&mut self) -> Vec<Effect> {
        self.repetition.restart();
        if !self.repetition.has_budget() {
            self.transition(SdClientState::Stopped);
            return Vec::new();
        }
        self.transition(SdClientState::RepetitionPhase);
        vec![Effect::ArmFindTimer(self.repetition.current_delay())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm() -> SdClientFsm {
        // Degenerate initial window keeps the drawn delay predictable.
        SdClientFsm::new(
            InitialWaitSchedule::new(50, 50),
            RepetitionSchedule::new(100, 3),
        )
    }

    fn requested_fsm() -> SdClientFsm {
        let mut fsm = fsm();
        fsm.service_requested();
        fsm
    }

    #[test]
    fn test_request_enters_initial_wait() {
        let mut fsm = fsm();
        let effects = fsm.service_requested();

        assert_eq!(fsm.state(), SdClientState::InitialWaitPhase);
        assert_eq!(
            effects,
            vec![Effect::ArmFindTimer(Duration::from_millis(50))]
        );
    }

    #[test]
    fn test_repeated_request_is_noop() {
        let mut fsm = requested_fsm();
        let effects = fsm.service_requested();

        assert_eq!(fsm.state(), SdClientState::InitialWaitPhase);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_initial_wait_expiry_sends_and_enters_repetition() {
        let mut fsm = requested_fsm();
        let effects = fsm.find_timer_elapsed();

        assert_eq!(fsm.state(), SdClientState::RepetitionPhase);
        assert_eq!(
            effects,
            vec![
                Effect::SendFind,
                Effect::ArmFindTimer(Duration::from_millis(100)),
            ]
        );
    }

    #[test]
    fn test_repetition_doubles_then_exhausts() {
        let mut fsm = requested_fsm();
        fsm.find_timer_elapsed();

        let effects = fsm.find_timer_elapsed();
        assert_eq!(
            effects,
            vec![
                Effect::SendFind,
                Effect::ArmFindTimer(Duration::from_millis(200)),
            ]
        );

        let effects = fsm.find_timer_elapsed();
        assert_eq!(
            effects,
            vec![
                Effect::SendFind,
                Effect::ArmFindTimer(Duration::from_millis(400)),
            ]
        );

        let effects = fsm.find_timer_elapsed();
        assert_eq!(effects, vec![Effect::SendFind]);
        assert_eq!(fsm.state(), SdClientState::Stopped);

        // Exhausted: nothing left to do.
        assert!(fsm.find_timer_elapsed().is_empty());
        assert_eq!(fsm.state(), SdClientState::Stopped);
    }

    #[test]
    fn test_zero_repetitions_stop_after_initial_send() {
        let mut fsm = SdClientFsm::new(
            InitialWaitSchedule::new(50, 50),
            RepetitionSchedule::new(100, 0),
        );
        fsm.service_requested();

        let effects = fsm.find_timer_elapsed();
        assert_eq!(effects, vec![Effect::SendFind]);
        assert_eq!(fsm.state(), SdClientState::Stopped);
    }

    #[test]
    fn test_offer_preempts_initial_wait() {
        let mut fsm = requested_fsm();
        let effects = fsm.service_offered(5);

        assert_eq!(fsm.state(), SdClientState::ServiceReady);
        assert_eq!(
            effects,
            vec![
                Effect::CancelFindTimer,
                Effect::ArmTtlTimer(Duration::from_secs(5)),
            ]
        );
    }

    #[test]
    fn test_offer_preempts_repetition() {
        let mut fsm = requested_fsm();
        fsm.find_timer_elapsed();
        assert_eq!(fsm.state(), SdClientState::RepetitionPhase);

        let effects = fsm.service_offered(5);
        assert_eq!(fsm.state(), SdClientState::ServiceReady);
        assert_eq!(
            effects,
            vec![
                Effect::CancelFindTimer,
                Effect::ArmTtlTimer(Duration::from_secs(5)),
            ]
        );
    }

    #[test]
    fn test_offer_while_passive_is_seen() {
        let mut fsm = fsm();
        let effects = fsm.service_offered(7);

        assert_eq!(fsm.state(), SdClientState::ServiceSeen);
        assert_eq!(effects, vec![Effect::ArmTtlTimer(Duration::from_secs(7))]);
    }

    #[test]
    fn test_renewing_offer_extends_lease_without_transition() {
        let mut fsm = fsm();
        fsm.service_offered(7);

        let effects = fsm.service_offered(9);
        assert_eq!(fsm.state(), SdClientState::ServiceSeen);
        assert_eq!(effects, vec![Effect::ArmTtlTimer(Duration::from_secs(9))]);
    }

    #[test]
    fn test_request_while_seen_is_immediately_ready() {
        let mut fsm = fsm();
        fsm.service_offered(7);

        let effects = fsm.service_requested();
        assert_eq!(fsm.state(), SdClientState::ServiceReady);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_ready_ttl_expiry_reenters_initial_wait() {
        let mut fsm = requested_fsm();
        fsm.service_offered(5);

        let effects = fsm.ttl_expired();
        assert_eq!(fsm.state(), SdClientState::InitialWaitPhase);
        assert_eq!(
            effects,
            vec![Effect::ArmFindTimer(Duration::from_millis(50))]
        );
    }

    #[test]
    fn test_seen_ttl_expiry_returns_to_not_seen() {
        let mut fsm = fsm();
        fsm.service_offered(5);

        fsm.ttl_expired();
        assert_eq!(fsm.state(), SdClientState::ServiceNotSeen);
    }

    #[test]
    fn test_unrequest_parks_in_stopped_with_lease_running() {
        let mut fsm = requested_fsm();
        fsm.service_offered(5);

        let effects = fsm.service_not_requested();
        assert_eq!(fsm.state(), SdClientState::Stopped);
        assert!(effects.is_empty());

        fsm.ttl_expired();
        assert_eq!(fsm.state(), SdClientState::ServiceNotSeen);
    }

    #[test]
    fn test_offer_while_stopped_returns_to_seen() {
        let mut fsm = requested_fsm();
        fsm.service_offered(5);
        fsm.service_not_requested();

        let effects = fsm.service_offered(3);
        assert_eq!(fsm.state(), SdClientState::ServiceSeen);
        assert_eq!(effects, vec![Effect::ArmTtlTimer(Duration::from_secs(3))]);
    }

    #[test]
    fn test_stop_offer_routing() {
        // ServiceSeen settles back to ServiceNotSeen.
        let mut fsm = fsm();
        fsm.service_offered(5);
        let effects = fsm.service_offer_stopped();
        assert_eq!(fsm.state(), SdClientState::ServiceNotSeen);
        assert_eq!(effects, vec![Effect::CancelTtlTimer]);

        // ServiceReady parks in Stopped.
        let mut fsm = requested_fsm();
        fsm.service_offered(5);
        let effects = fsm.service_offer_stopped();
        assert_eq!(fsm.state(), SdClientState::Stopped);
        assert_eq!(effects, vec![Effect::CancelTtlTimer]);

        // RepetitionPhase takes the ready-state exit and drops the
        // pending retransmission.
        let mut fsm = requested_fsm();
        fsm.find_timer_elapsed();
        let effects = fsm.service_offer_stopped();
        assert_eq!(fsm.state(), SdClientState::Stopped);
        assert_eq!(
            effects,
            vec![Effect::CancelFindTimer, Effect::CancelTtlTimer]
        );
    }

    #[test]
    fn test_repetition_counter_resets_on_reentry() {
        let mut fsm = requested_fsm();
        fsm.find_timer_elapsed();
        fsm.find_timer_elapsed();

        // Preempt, expire the lease, and ride through the second
        // initial wait back into repetition.
        fsm.service_offered(5);
        fsm.ttl_expired();
        assert_eq!(fsm.state(), SdClientState::InitialWaitPhase);

        let effects = fsm.find_timer_elapsed();
        assert_eq!(
            effects,
            vec![
                Effect::SendFind,
                Effect::ArmFindTimer(Duration::from_millis(100)),
            ]
        );
    }
}
