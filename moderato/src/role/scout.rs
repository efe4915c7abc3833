//! # Summary
//!
//! A scout runs phase 1 for one leader attempt: it asks every acceptor
//! to promise its ballot and collects the pvalues they have already
//! accepted. One-shot: it reports Adopted or Preempted to its leader
//! through the self link and is then discarded. A scout that cannot
//! reach a majority never finishes on its own; the leader times it out
//! and respawns it with the same ballot once enough peers look alive.

use std::time;

use hashbrown::HashSet as Set;

use crate::ballot::Ballot;
use crate::message;
use crate::message::Message;
use crate::net::Net;
use crate::role::timebomb::Timebomb;
use crate::role::Progress;

pub struct Scout {
    /// Server id of the owning leader, also the reply-to address
    l_id: usize,

    ballot: Ballot,

    net: Net,

    /// Acceptors that have not yet answered for this ballot
    wait_for: Set<usize>,

    /// Largest minority; adoption happens once `wait_for` shrinks below
    /// a strict majority of all acceptors
    minority: usize,

    pvalues: Set<message::PValue>,

    deadline: time::Instant,
}

impl Scout {
    /// Broadcasts P1A to every acceptor, the local one included. Each
    /// send to another server ticks the leader's timebomb.
    pub fn new(
        net: Net,
        timebomb: &Timebomb,
        ballot: Ballot,
        l_id: usize,
        timeout: time::Duration,
    ) -> Self {
        let count = net.count();
        debug!("scout starting for {:?}", ballot);
        for to in 0..count {
            net.send(to, Message::P1A(message::P1A { l_id, ballot }));
            if to != net.id() {
                timebomb.tick();
            }
        }
        Scout {
            l_id,
            ballot,
            net,
            wait_for: (0..count).collect(),
            minority: (count - 1) / 2,
            pvalues: Set::default(),
            deadline: time::Instant::now() + timeout,
        }
    }

    pub fn ballot(&self) -> Ballot {
        self.ballot
    }

    /// Advances the scout with one drained message (or a null tick).
    /// Must not be called again once it returns `Done` or `TimedOut`.
    pub fn run(&mut self, message: Option<&Message>) -> Progress {
        if let Some(Message::P1B(p1b)) = message {
            if p1b.ballot == self.ballot {
                self.pvalues.extend(p1b.accepted.iter().cloned());
                self.wait_for.remove(&p1b.a_id);
                if self.wait_for.len() <= self.minority {
                    debug!("{:?} adopted", self.ballot);
                    self.net.send(
                        self.l_id,
                        Message::Adopted(message::Adopted {
                            ballot: self.ballot,
                            pvalues: self.pvalues.iter().cloned().collect(),
                        }),
                    );
                    return Progress::Done;
                }
            } else if p1b.ballot > self.ballot {
                debug!("{:?} preempted by {:?}", self.ballot, p1b.ballot);
                self.net.send(
                    self.l_id,
                    Message::Preempted(message::Preempted {
                        ballot: p1b.ballot,
                    }),
                );
                return Progress::Done;
            }
            // Replies below our ballot belong to an older attempt.
        }

        if time::Instant::now() >= self.deadline {
            debug!("{:?} scout timed out", self.ballot);
            return Progress::TimedOut;
        }
        Progress::Pending
    }
}
