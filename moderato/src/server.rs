//! # Summary
//!
//! One simulated server process: a replica, a leader, and an acceptor
//! sharing a single cooperative control loop. The loop drains the
//! inbound queue, shows every message to all three roles in turn, then
//! drives the leader with a null tick so heartbeat and task-timeout
//! logic progress even when the network is quiet. The halt flag is
//! checked at message boundaries; crashes and timebombs terminate the
//! loop cooperatively, never mid-handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time;

use parking_lot::Mutex;

use crate::config::Config;
use crate::net::Net;
use crate::role::acceptor::Acceptor;
use crate::role::leader::Leader;
use crate::role::replica::Replica;
use crate::role::timebomb::Timebomb;
use crate::state::State;

/// Cross-thread probe flags the driver reads for `all_clear` and
/// `time_bomb_leader`. Each server's roles keep them current.
pub struct Status {
    acceptor_recovering: AtomicBool,
    leader_recovering: AtomicBool,
    leading: AtomicBool,
}

impl Status {
    pub fn new() -> Self {
        Status {
            acceptor_recovering: AtomicBool::new(false),
            leader_recovering: AtomicBool::new(false),
            leading: AtomicBool::new(false),
        }
    }

    pub fn set_acceptor_recovering(&self, recovering: bool) {
        self.acceptor_recovering.store(recovering, Ordering::SeqCst);
    }

    pub fn set_leader_recovering(&self, recovering: bool) {
        self.leader_recovering.store(recovering, Ordering::SeqCst);
    }

    pub fn set_leading(&self, leading: bool) {
        self.leading.store(leading, Ordering::SeqCst);
    }

    pub fn recovering(&self) -> bool {
        self.acceptor_recovering.load(Ordering::SeqCst)
            || self.leader_recovering.load(Ordering::SeqCst)
    }

    pub fn leading(&self) -> bool {
        self.leading.load(Ordering::SeqCst)
    }
}

pub struct Server {
    id: usize,
    net: Net,
    replica: Replica,
    leader: Leader,
    acceptor: Acceptor,
    halt: Arc<AtomicBool>,
}

impl Server {
    pub fn new(
        id: usize,
        net: Net,
        status: Arc<Status>,
        timebomb: Arc<Timebomb>,
        halt: Arc<AtomicBool>,
        state: Arc<Mutex<State>>,
        config: &Config,
        recovering: bool,
    ) -> Self {
        let replica = Replica::new(id, net.clone(), state);
        let leader = Leader::new(
            id,
            net.clone(),
            status.clone(),
            timebomb,
            config,
            recovering,
        );
        let acceptor = Acceptor::new(id, net.clone(), status, config, recovering);
        Server {
            id,
            net,
            replica,
            leader,
            acceptor,
            halt,
        }
    }

    pub fn run(mut self) {
        info!("server {} running", self.id);
        while !self.halt.load(Ordering::SeqCst) {
            for message in self.net.drain() {
                trace!("server {} received {:?}", self.id, message);
                self.replica.run_tasks(&message);
                self.leader.run_tasks(Some(&message));
                self.acceptor.run_tasks(&message);
                if self.halt.load(Ordering::SeqCst) {
                    info!("server {} halting", self.id);
                    return;
                }
            }
            self.leader.run_tasks(None);
            self.acceptor.tick();
            thread::sleep(time::Duration::from_millis(1));
        }
        info!("server {} halting", self.id);
    }
}
