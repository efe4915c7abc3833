//! # Summary
//!
//! Timing knobs for a cluster. Defaults suit a human-driven harness;
//! integration tests tighten them to keep runs short.

use std::time::Duration;

#[derive(Copy, Clone, Debug)]
pub struct Config {
    /// How often each server broadcasts a heartbeat
    pub(crate) heartbeat_period: Duration,

    /// How often the liveness view is recomputed; a multiple of the
    /// heartbeat period so slow ticks cannot look like deaths
    pub(crate) update_period: Duration,

    /// How long a recovering acceptor waits for peer accepted sets
    pub(crate) recovery_wait: Duration,

    /// How long a scout or commander may run before it is timed out
    pub(crate) task_timeout: Duration,

    /// How long a client waits for a response before resending
    pub(crate) resend_period: Duration,

    /// How long the network must stay silent before `all_clear` returns
    pub(crate) quiescence: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            heartbeat_period: Duration::from_millis(100),
            update_period: Duration::from_millis(500),
            recovery_wait: Duration::from_millis(2000),
            task_timeout: Duration::from_millis(1000),
            resend_period: Duration::from_millis(5000),
            quiescence: Duration::from_millis(1000),
        }
    }
}

impl Config {
    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self
    }

    pub fn with_update_period(mut self, period: Duration) -> Self {
        self.update_period = period;
        self
    }

    pub fn with_recovery_wait(mut self, wait: Duration) -> Self {
        self.recovery_wait = wait;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_resend_period(mut self, period: Duration) -> Self {
        self.resend_period = period;
        self
    }

    pub fn with_quiescence(mut self, quiescence: Duration) -> Self {
        self.quiescence = quiescence;
        self
    }
}
