//! Defers the annotation pass until the document has finished rendering.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,
    /// Give up after this many failed checks.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has been spent waiting.
    #[serde(rename = "timeout_ms", with = "opt_millis")]
    pub timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            interval: Duration::from_millis(100),
            max_attempts: None,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Waiting { attempts: u32 },
    Ready,
    Invoked,
    GaveUp { attempts: u32 },
}

#[derive(Debug, PartialEq, Eq)]
pub enum GateOutcome<T> {
    /// The pass ran and returned `T`.
    Invoked(T),
    /// The sentinel never appeared within the configured limits.
    GaveUp { attempts: u32, waited: Duration },
    /// The gate had already invoked the pass or given up.
    AlreadyFinished,
}

/// `Waiting -> Ready -> Invoked`, or `Waiting -> GaveUp`.
pub struct ReadinessGate {
    config: GateConfig,
    state: GateState,
}

impl ReadinessGate {
    pub fn new(config: GateConfig) -> Self {
        ReadinessGate {
            config,
            state: GateState::Waiting { attempts: 0 },
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Check `probe` until it yields a value, sleeping with `wait` between checks,
    /// then hand that value to `pass`.
    ///
    /// The first check happens before any wait, so an already rendered document runs
    /// the pass straight away. `pass` runs at most once over the life of the gate.
    pub fn run<R, T>(
        &mut self,
        mut probe: impl FnMut() -> Option<R>,
        mut wait: impl FnMut(Duration),
        pass: impl FnOnce(R) -> T,
    ) -> GateOutcome<T> {
        let GateState::Waiting { mut attempts } = self.state else {
            warn!(state = ?self.state, "readiness gate already finished");
            return GateOutcome::AlreadyFinished;
        };

        let mut waited = Duration::ZERO;
        let ready = loop {
            attempts += 1;
            if let Some(ready) = probe() {
                break ready;
            }
            self.state = GateState::Waiting { attempts };

            let out_of_attempts = self.config.max_attempts.is_some_and(|max| attempts >= max);
            let out_of_time = self
                .config
                .timeout
                .is_some_and(|t| waited + self.config.interval > t);
            if out_of_attempts || out_of_time {
                info!(attempts, ?waited, "document never became ready");
                self.state = GateState::GaveUp { attempts };
                return GateOutcome::GaveUp { attempts, waited };
            }

            wait(self.config.interval);
            waited += self.config.interval;
        };

        debug!(attempts, ?waited, "document ready");
        self.state = GateState::Ready;
        let out = pass(ready);
        self.state = GateState::Invoked;
        GateOutcome::Invoked(out)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: Option<u32>, timeout_ms: Option<u64>) -> GateConfig {
        GateConfig {
            interval: Duration::from_millis(100),
            max_attempts,
            timeout: timeout_ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn present_sentinel_runs_synchronously() {
        let mut gate = ReadinessGate::new(config(None, None));
        let mut waits = 0;
        let mut calls = 0;
        let out = gate.run(
            || Some(7),
            |_| waits += 1,
            |v| {
                calls += 1;
                v * 2
            },
        );
        assert_eq!(out, GateOutcome::Invoked(14));
        assert_eq!(waits, 0);
        assert_eq!(calls, 1);
        assert_eq!(gate.state(), GateState::Invoked);
    }

    #[test]
    fn polls_until_sentinel_appears() {
        let mut gate = ReadinessGate::new(config(None, None));
        let mut checks = 0;
        let mut waits = Vec::new();
        let mut calls = 0;
        let out = gate.run(
            || {
                checks += 1;
                (checks == 4).then_some(())
            },
            |d| waits.push(d),
            |()| calls += 1,
        );
        assert_eq!(out, GateOutcome::Invoked(()));
        assert_eq!(checks, 4);
        assert_eq!(waits, vec![Duration::from_millis(100); 3]);
        assert_eq!(calls, 1);
    }

    #[test]
    fn never_invokes_twice() {
        let mut gate = ReadinessGate::new(config(None, None));
        let mut calls = 0;
        assert_eq!(gate.run(|| Some(()), |_| {}, |()| calls += 1), GateOutcome::Invoked(()));
        assert_eq!(
            gate.run(|| Some(()), |_| {}, |()| calls += 1),
            GateOutcome::AlreadyFinished
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut gate = ReadinessGate::new(config(Some(3), None));
        let mut checks = 0;
        let mut called = false;
        let out = gate.run(
            || {
                checks += 1;
                None::<()>
            },
            |_| {},
            |()| called = true,
        );
        assert_eq!(
            out,
            GateOutcome::GaveUp {
                attempts: 3,
                waited: Duration::from_millis(200)
            }
        );
        assert_eq!(checks, 3);
        assert!(!called);
        assert_eq!(gate.state(), GateState::GaveUp { attempts: 3 });
        assert_eq!(
            gate.run(|| Some(()), |_| {}, |()| called = true),
            GateOutcome::AlreadyFinished
        );
        assert!(!called);
    }

    #[test]
    fn gives_up_after_timeout() {
        let mut gate = ReadinessGate::new(config(None, Some(450)));
        let out = gate.run(|| None::<()>, |_| {}, |()| ());
        assert_eq!(
            out,
            GateOutcome::GaveUp {
                attempts: 5,
                waited: Duration::from_millis(400)
            }
        );
    }

    #[test]
    fn invoked_exactly_once_within_limits() {
        proptest::proptest!(|(ready_at in 1u32..20, max in 1u32..20)| {
            let mut gate = ReadinessGate::new(config(Some(max), None));
            let mut checks = 0;
            let mut calls = 0;
            let out = gate.run(
                || { checks += 1; (checks >= ready_at).then_some(()) },
                |_| {},
                |()| calls += 1,
            );
            if ready_at <= max {
                proptest::prop_assert_eq!(out, GateOutcome::Invoked(()));
                proptest::prop_assert_eq!(calls, 1);
            } else {
                proptest::prop_assert!(matches!(out, GateOutcome::GaveUp { .. }), "expected to give up");
                proptest::prop_assert_eq!(calls, 0);
            }
        })
    }
}
