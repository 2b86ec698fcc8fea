//! Submission gate: the single serialized entry point for "send this".
//!
//! Click, Enter and voice handlers all funnel through `try_acquire`, which
//! enforces at-most-one-in-flight and a minimum interval between accepted
//! sends. A generation counter ties each acceptance to its release so the
//! failsafe timer can never unlock a later send.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::logging;

/// Minimum time between accepted sends, whatever their trigger source
pub const MIN_SEND_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on how long the in-flight lock can stay held if the pipeline
/// never settles.
pub const FAILSAFE_UNLOCK: Duration = Duration::from_millis(2500);

/// Where a send request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendSource {
    Click,
    EnterKey,
    Voice,
}

impl SendSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendSource::Click => "click",
            SendSource::EnterKey => "enter",
            SendSource::Voice => "voice",
        }
    }

    /// Voice text arrives as a finalized transcript, not from the editable
    /// input buffer, so there is no buffer to clear on acceptance.
    fn reads_input_buffer(&self) -> bool {
        !matches!(self, SendSource::Voice)
    }
}

#[derive(Debug, Default)]
struct GateState {
    in_flight: bool,
    last_send: Option<Instant>,
    generation: u64,
}

pub struct SubmissionGate {
    state: Mutex<GateState>,
    input: Mutex<String>,
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            input: Mutex::new(String::new()),
        }
    }

    /// Mirror of the UI's editable input buffer
    pub fn set_input(&self, text: &str) {
        *self.input.lock().unwrap() = text.to_string();
    }

    pub fn input(&self) -> String {
        self.input.lock().unwrap().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().unwrap().in_flight
    }

    /// Decide whether a requested send proceeds. On acceptance the gate is
    /// marked in-flight, the send instant recorded, and (for buffer-sourced
    /// sends) the input buffer cleared; the returned generation must be
    /// passed back to `release`. Rejections are logged no-ops.
    pub fn try_acquire(
        &self,
        source: SendSource,
        text_override: Option<&str>,
    ) -> Option<(String, u64)> {
        let text = match text_override {
            Some(text) => text.trim().to_string(),
            None => self.input.lock().unwrap().trim().to_string(),
        };

        if text.is_empty() {
            logging::log_gate(&format!("Ignored empty send from {}", source.as_str()));
            return None;
        }

        let mut state = self.state.lock().unwrap();

        if state.in_flight {
            logging::log_gate(&format!(
                "Duplicate send prevented from {} (send in flight)",
                source.as_str()
            ));
            return None;
        }

        if let Some(last) = state.last_send {
            if last.elapsed() < MIN_SEND_INTERVAL {
                logging::log_gate(&format!(
                    "Duplicate send prevented from {} (below minimum interval)",
                    source.as_str()
                ));
                return None;
            }
        }

        state.in_flight = true;
        state.last_send = Some(Instant::now());
        state.generation += 1;
        let generation = state.generation;
        drop(state);

        if source.reads_input_buffer() {
            self.input.lock().unwrap().clear();
        }

        logging::log_gate(&format!("Accepted send from {}", source.as_str()));
        Some((text, generation))
    }

    /// Release the in-flight lock for the given acceptance. Returns false
    /// when the lock was already released or belongs to a newer send.
    pub fn release(&self, generation: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.in_flight && state.generation == generation {
            state.in_flight = false;
            true
        } else {
            false
        }
    }

    /// Spawn the failsafe that releases a stuck lock after `FAILSAFE_UNLOCK`
    pub fn arm_failsafe(gate: Arc<SubmissionGate>, generation: u64) {
        Self::arm_failsafe_after(gate, generation, FAILSAFE_UNLOCK);
    }

    fn arm_failsafe_after(gate: Arc<SubmissionGate>, generation: u64, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if gate.release(generation) {
                logging::log_gate("Failsafe released a stuck submission lock");
            }
        });
    }

    #[cfg(test)]
    fn backdate_last_send(&self, by: Duration) {
        let mut state = self.state.lock().unwrap();
        state.last_send = Some(Instant::now() - by);
    }
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_whitespace_input() {
        let gate = SubmissionGate::new();

        assert!(gate.try_acquire(SendSource::Click, None).is_none());

        gate.set_input("   \n ");
        assert!(gate.try_acquire(SendSource::EnterKey, None).is_none());

        assert!(gate.try_acquire(SendSource::Voice, Some("  ")).is_none());
        assert!(!gate.is_in_flight());
    }

    #[test]
    fn test_accept_clears_buffer_for_buffer_sources() {
        let gate = SubmissionGate::new();
        gate.set_input("  hello there  ");

        let (text, _) = gate.try_acquire(SendSource::Click, None).unwrap();
        assert_eq!(text, "hello there");
        assert_eq!(gate.input(), "");
        assert!(gate.is_in_flight());
    }

    #[test]
    fn test_voice_override_leaves_buffer_untouched() {
        let gate = SubmissionGate::new();
        gate.set_input("half-typed draft");

        let (text, _) = gate
            .try_acquire(SendSource::Voice, Some("spoken message"))
            .unwrap();
        assert_eq!(text, "spoken message");
        assert_eq!(gate.input(), "half-typed draft");
    }

    #[test]
    fn test_rejects_while_in_flight_regardless_of_source() {
        let gate = SubmissionGate::new();
        gate.set_input("first");
        let (_, generation) = gate.try_acquire(SendSource::Click, None).unwrap();

        gate.set_input("second");
        assert!(gate.try_acquire(SendSource::EnterKey, None).is_none());
        assert!(gate.try_acquire(SendSource::Voice, Some("third")).is_none());

        assert!(gate.release(generation));
        assert!(!gate.is_in_flight());
    }

    #[test]
    fn test_rejects_below_minimum_interval() {
        let gate = SubmissionGate::new();
        gate.set_input("first");
        let (_, generation) = gate.try_acquire(SendSource::Click, None).unwrap();
        gate.release(generation);

        // immediately after completion: still inside the interval
        gate.set_input("second");
        assert!(gate.try_acquire(SendSource::EnterKey, None).is_none());

        // once the interval has passed the next send is accepted
        gate.backdate_last_send(MIN_SEND_INTERVAL + Duration::from_millis(10));
        assert!(gate.try_acquire(SendSource::EnterKey, None).is_some());
    }

    #[test]
    fn test_release_is_generation_scoped() {
        let gate = SubmissionGate::new();
        gate.set_input("first");
        let (_, first) = gate.try_acquire(SendSource::Click, None).unwrap();
        gate.release(first);

        gate.backdate_last_send(MIN_SEND_INTERVAL + Duration::from_millis(10));
        gate.set_input("second");
        let (_, second) = gate.try_acquire(SendSource::Click, None).unwrap();

        // a stale release must not unlock the newer send
        assert!(!gate.release(first));
        assert!(gate.is_in_flight());

        assert!(gate.release(second));
        assert!(!gate.release(second));
    }

    #[tokio::test]
    async fn test_failsafe_releases_stuck_lock() {
        let gate = Arc::new(SubmissionGate::new());
        gate.set_input("stuck send");
        let (_, generation) = gate.try_acquire(SendSource::Click, None).unwrap();

        SubmissionGate::arm_failsafe_after(
            Arc::clone(&gate),
            generation,
            Duration::from_millis(50),
        );
        assert!(gate.is_in_flight());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!gate.is_in_flight());
    }

    #[tokio::test]
    async fn test_failsafe_does_not_release_settled_send() {
        let gate = Arc::new(SubmissionGate::new());
        gate.set_input("quick send");
        let (_, generation) = gate.try_acquire(SendSource::Click, None).unwrap();

        SubmissionGate::arm_failsafe_after(
            Arc::clone(&gate),
            generation,
            Duration::from_millis(50),
        );
        gate.release(generation);

        gate.backdate_last_send(MIN_SEND_INTERVAL + Duration::from_millis(10));
        gate.set_input("next send");
        let (_, next) = gate.try_acquire(SendSource::Click, None).unwrap();

        // the stale failsafe fires but the new send stays locked
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(gate.is_in_flight());

        gate.release(next);
    }
}
