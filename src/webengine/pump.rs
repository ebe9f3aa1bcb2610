//! External message pump scheduling.
//!
//! The embedded web engine does not own a thread; it asks the host to call
//! its message-loop entry point, either immediately or after a delay. The
//! request lands here from an arbitrary engine thread and the frame loop
//! polls `should_pump` once per iteration. Independent of requests, the pump
//! also fires at the display-refresh interval so the engine never starves.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
struct PumpState {
    pending: bool,
    deadline: Option<Instant>,
    last_work: Option<Instant>,
}

#[derive(Debug)]
pub struct MessagePump {
    state: Mutex<PumpState>,
    /// Display refresh interval — the periodic pump floor.
    interval: Duration,
}

impl MessagePump {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            state: Mutex::new(PumpState {
                pending: false,
                deadline: None,
                last_work: None,
            }),
            interval: refresh_interval,
        }
    }

    /// Engine callback: "call my message-loop entry in `delay_ms` ms"
    /// (0 = immediately). May be invoked from any thread.
    pub fn schedule(&self, delay_ms: i64, now: Instant) {
        let mut state = self.state.lock();
        state.pending = true;
        state.deadline = if delay_ms <= 0 {
            None
        } else {
            Some(now + Duration::from_millis(delay_ms as u64))
        };
    }

    /// Whether the message-loop entry should run this iteration.
    pub fn should_pump(&self, now: Instant) -> bool {
        let state = self.state.lock();
        if state.pending {
            match state.deadline {
                None => return true,
                Some(deadline) if now >= deadline => return true,
                Some(_) => {}
            }
        }
        // Refresh-interval floor keeps the engine serviced while idle.
        match state.last_work {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    /// Record that the message-loop entry ran.
    pub fn mark_pumped(&self, now: Instant) {
        let mut state = self.state.lock();
        state.pending = false;
        state.deadline = None;
        state.last_work = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_schedule_pumps_now() {
        let pump = MessagePump::new(Duration::from_millis(16));
        let now = Instant::now();
        pump.mark_pumped(now);
        assert!(!pump.should_pump(now + Duration::from_millis(1)));
        pump.schedule(0, now);
        assert!(pump.should_pump(now + Duration::from_millis(1)));
    }

    #[test]
    fn delayed_schedule_waits_for_deadline() {
        let pump = MessagePump::new(Duration::from_millis(16));
        let now = Instant::now();
        pump.mark_pumped(now);
        pump.schedule(10, now);
        assert!(!pump.should_pump(now + Duration::from_millis(5)));
        assert!(pump.should_pump(now + Duration::from_millis(10)));
    }

    #[test]
    fn refresh_floor_fires_without_requests() {
        let pump = MessagePump::new(Duration::from_millis(16));
        let now = Instant::now();
        pump.mark_pumped(now);
        assert!(!pump.should_pump(now + Duration::from_millis(15)));
        assert!(pump.should_pump(now + Duration::from_millis(16)));
    }

    #[test]
    fn mark_pumped_clears_request() {
        let pump = MessagePump::new(Duration::from_millis(16));
        let now = Instant::now();
        pump.schedule(0, now);
        assert!(pump.should_pump(now));
        pump.mark_pumped(now);
        assert!(!pump.should_pump(now + Duration::from_millis(1)));
    }
}
