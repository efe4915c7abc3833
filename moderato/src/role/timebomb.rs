//! # Summary
//!
//! Deterministic crash injection: once armed, the bomb counts unique
//! outbound P1A/P2A messages to *other* servers and raises the owning
//! server's halt flag when the count runs out. Heartbeats, client
//! responses, and same-process task traffic never tick it. The halt
//! flag is honored by the server loop at message boundaries, so the
//! "explosion" is a cooperative shutdown, not an abrupt thread kill.

use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::Arc;

pub struct Timebomb {
    active: AtomicBool,
    countdown: AtomicIsize,
    halt: Arc<AtomicBool>,
}

impl Timebomb {
    pub fn new(halt: Arc<AtomicBool>) -> Self {
        Timebomb {
            active: AtomicBool::new(false),
            countdown: AtomicIsize::new(0),
            halt,
        }
    }

    /// Arms the bomb for `countdown` messages; values below 1 behave
    /// like 1.
    pub fn set(&self, countdown: usize) {
        self.countdown
            .store(countdown.max(1) as isize, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }

    /// Records one qualifying outbound message. Call sites guarantee
    /// the message is a P1A or P2A addressed to another server.
    pub fn tick(&self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let left = self.countdown.fetch_sub(1, Ordering::SeqCst) - 1;
        if left <= 0 {
            info!("timebomb expired, halting server");
            self.active.store(false, Ordering::SeqCst);
            self.halt.store(true, Ordering::SeqCst);
        } else {
            debug!("timebomb tick: {} left", left);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halts_after_exact_count() {
        let halt = Arc::new(AtomicBool::new(false));
        let bomb = Timebomb::new(halt.clone());
        bomb.set(3);
        bomb.tick();
        bomb.tick();
        assert!(!halt.load(Ordering::SeqCst));
        bomb.tick();
        assert!(halt.load(Ordering::SeqCst));
    }

    #[test]
    fn idle_until_armed() {
        let halt = Arc::new(AtomicBool::new(false));
        let bomb = Timebomb::new(halt.clone());
        for _ in 0..10 {
            bomb.tick();
        }
        assert!(!halt.load(Ordering::SeqCst));
    }

    #[test]
    fn zero_behaves_like_one() {
        let halt = Arc::new(AtomicBool::new(false));
        let bomb = Timebomb::new(halt.clone());
        bomb.set(0);
        bomb.tick();
        assert!(halt.load(Ordering::SeqCst));
    }
}
