//! # Summary
//!
//! Leader liveness without timers on the wire: every server broadcasts
//! a heartbeat carrying its current leader belief on a fixed period,
//! and every update period it marks the peers it has not heard from as
//! dead. The leader folds received beliefs with `max`, so the whole
//! cluster converges monotonically on the highest announced leader
//! counter.

use std::time;

use hashbrown::HashSet as Set;

use crate::config::Config;
use crate::message::{HeartBeat, Message};
use crate::net::Net;

pub struct HeartBeatGenerator {
    id: usize,
    net: Net,
    beat_period: time::Duration,
    update_period: time::Duration,
    next_beat: Option<time::Instant>,
    next_update: Option<time::Instant>,
    heard: Vec<bool>,
}

impl HeartBeatGenerator {
    pub fn new(id: usize, net: Net, config: &Config) -> Self {
        let count = net.count();
        HeartBeatGenerator {
            id,
            net,
            beat_period: config.heartbeat_period,
            update_period: config.update_period,
            next_beat: None,
            next_update: None,
            heard: vec![false; count],
        }
    }

    /// Records a heartbeat received in the current update window.
    pub fn add_beat(&mut self, beat: &HeartBeat) {
        self.heard[beat.sender] = true;
    }

    /// Broadcasts a heartbeat and recomputes the liveness view when
    /// their periods elapse. Returns the freshly computed dead set at
    /// each update boundary, `None` in between.
    pub fn beat_and_analyze(&mut self, current: usize) -> Option<Set<usize>> {
        let now = time::Instant::now();
        let next_beat = *self.next_beat.get_or_insert(now);
        let next_update = *self
            .next_update
            .get_or_insert(now + self.update_period);

        if now >= next_beat {
            self.net.broadcast(Message::HeartBeat(HeartBeat {
                sender: self.id,
                current,
            }));
            self.next_beat = Some(now + self.beat_period);
        }

        if now >= next_update {
            self.next_update = Some(now + self.update_period);
            let dead = self
                .heard
                .iter()
                .enumerate()
                .filter(|(_, heard)| !**heard)
                .map(|(id, _)| id)
                .collect();
            for heard in self.heard.iter_mut() {
                *heard = false;
            }
            trace!("server {} liveness view: dead = {:?}", self.id, dead);
            return Some(dead);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Network;

    fn config() -> Config {
        Config::default()
            .with_heartbeat_period(time::Duration::from_millis(5))
            .with_update_period(time::Duration::from_millis(20))
    }

    #[test]
    fn broadcasts_on_first_call() {
        let network = Network::new(3, 0);
        let mut generator = HeartBeatGenerator::new(0, network.server(0), &config());
        assert!(generator.beat_and_analyze(0).is_none());
        for id in 0..3 {
            let drained = network.drain_server(id);
            assert_eq!(
                drained,
                vec![Message::HeartBeat(HeartBeat {
                    sender: 0,
                    current: 0,
                })],
            );
        }
    }

    #[test]
    fn silent_peers_are_dead_after_one_window() {
        let network = Network::new(3, 0);
        let mut generator = HeartBeatGenerator::new(0, network.server(0), &config());
        generator.add_beat(&HeartBeat {
            sender: 0,
            current: 0,
        });
        generator.add_beat(&HeartBeat {
            sender: 2,
            current: 0,
        });
        let dead = loop {
            if let Some(dead) = generator.beat_and_analyze(0) {
                break dead;
            }
            std::thread::sleep(time::Duration::from_millis(1));
        };
        assert!(!dead.contains(&0));
        assert!(dead.contains(&1));
        assert!(!dead.contains(&2));
    }

    #[test]
    fn view_resets_between_windows() {
        let network = Network::new(2, 0);
        let mut generator = HeartBeatGenerator::new(0, network.server(0), &config());
        generator.add_beat(&HeartBeat {
            sender: 1,
            current: 0,
        });
        let first = loop {
            if let Some(dead) = generator.beat_and_analyze(0) {
                break dead;
            }
            std::thread::sleep(time::Duration::from_millis(1));
        };
        assert!(!first.contains(&1));
        let second = loop {
            if let Some(dead) = generator.beat_and_analyze(0) {
                break dead;
            }
            std::thread::sleep(time::Duration::from_millis(1));
        };
        assert!(second.contains(&1));
    }
}
