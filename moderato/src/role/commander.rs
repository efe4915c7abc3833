//! # Summary
//!
//! A commander runs phase 2 for one proposal under one ballot: it
//! pushes its pvalue at every acceptor and, on a strict majority of
//! matching answers, broadcasts the decision to every replica.
//! Symmetric to the scout: one-shot, preempted by any higher ballot it
//! observes, and timed out by its leader if quorum never forms.

use std::time;

use hashbrown::HashSet as Set;

use crate::message;
use crate::message::Message;
use crate::net::Net;
use crate::role::timebomb::Timebomb;
use crate::role::Progress;

pub struct Commander {
    l_id: usize,

    pvalue: message::PValue,

    net: Net,

    wait_for: Set<usize>,

    minority: usize,

    deadline: time::Instant,
}

impl Commander {
    /// Broadcasts P2A to every acceptor, the local one included. Each
    /// send to another server ticks the leader's timebomb.
    pub fn new(
        net: Net,
        timebomb: &Timebomb,
        pvalue: message::PValue,
        l_id: usize,
        timeout: time::Duration,
    ) -> Self {
        let count = net.count();
        debug!("commander starting for {:?}", pvalue);
        for to in 0..count {
            net.send(
                to,
                Message::P2A(message::P2A {
                    l_id,
                    pvalue: pvalue.clone(),
                }),
            );
            if to != net.id() {
                timebomb.tick();
            }
        }
        Commander {
            l_id,
            pvalue,
            net,
            wait_for: (0..count).collect(),
            minority: (count - 1) / 2,
            deadline: time::Instant::now() + timeout,
        }
    }

    pub fn pvalue(&self) -> &message::PValue {
        &self.pvalue
    }

    /// Advances the commander with one drained message (or a null
    /// tick). Must not be called again once it returns `Done` or
    /// `TimedOut`.
    pub fn run(&mut self, message: Option<&Message>) -> Progress {
        if let Some(Message::P2B(p2b)) = message {
            if p2b.ballot == self.pvalue.ballot {
                self.wait_for.remove(&p2b.a_id);
                if self.wait_for.len() <= self.minority {
                    debug!("{:?} decided", self.pvalue);
                    self.net.broadcast(Message::Decision(message::Decision {
                        proposal: message::Proposal {
                            s_id: self.pvalue.s_id,
                            command: self.pvalue.command.clone(),
                        },
                    }));
                    return Progress::Done;
                }
            } else if p2b.ballot > self.pvalue.ballot {
                debug!("{:?} preempted by {:?}", self.pvalue, p2b.ballot);
                self.net.send(
                    self.l_id,
                    Message::Preempted(message::Preempted {
                        ballot: p2b.ballot,
                    }),
                );
                return Progress::Done;
            }
            // Replies below our ballot belong to an older attempt.
        }

        if time::Instant::now() >= self.deadline {
            debug!("{:?} commander timed out", self.pvalue);
            return Progress::TimedOut;
        }
        Progress::Pending
    }
}
