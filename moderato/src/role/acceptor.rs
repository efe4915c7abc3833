//! # Summary
//!
//! The acceptor is the protocol's distributed memory: it tracks the
//! highest ballot it has promised and the set of pvalues it has
//! accepted. A restarted acceptor holds no state, so it re-enters the
//! cluster in a Recovering phase that rebuilds its accepted set from
//! whichever peers answer within a fixed window; this is best-effort by
//! design, not quorum-gated.

use std::sync::Arc;
use std::time;

use hashbrown::HashSet as Set;

use crate::ballot::Ballot;
use crate::config::Config;
use crate::message;
use crate::message::Message;
use crate::net::Net;
use crate::server::Status;

pub struct Acceptor {
    /// Unique id, shared with the server this acceptor lives on
    id: usize,

    net: Net,

    /// Highest ballot promised; `None` is "bottom", below every ballot
    ballot: Option<Ballot>,

    accepted: Set<message::PValue>,

    recovering: bool,

    /// When to give up waiting for peer accepted sets
    recover_until: time::Instant,

    status: Arc<Status>,
}

impl Acceptor {
    pub fn new(
        id: usize,
        net: Net,
        status: Arc<Status>,
        config: &Config,
        recovering: bool,
    ) -> Self {
        status.set_acceptor_recovering(recovering);
        if recovering {
            info!("acceptor {} recovering, requesting peer accepted sets", id);
            net.broadcast(Message::AcceptedSetRequest(message::AcceptedSetRequest {
                sender: id,
            }));
        }
        Acceptor {
            id,
            net,
            ballot: None,
            accepted: Set::default(),
            recovering,
            recover_until: time::Instant::now() + config.recovery_wait,
            status,
        }
    }

    /// Checks the recovery deadline; called between message batches so
    /// a quiet network cannot leave the acceptor stuck in Recovering.
    pub fn tick(&mut self) {
        if self.recovering && time::Instant::now() >= self.recover_until {
            self.recovering = false;
            self.status.set_acceptor_recovering(false);
            info!(
                "acceptor {} recovered with {} accepted pvalues",
                self.id,
                self.accepted.len(),
            );
        }
    }

    pub fn run_tasks(&mut self, message: &Message) {
        self.tick();

        // Peers get an accepted-set answer no matter what state this
        // acceptor is in.
        if let Message::AcceptedSetRequest(request) = message {
            trace!("acceptor {} sending accepted set to {}", self.id, request.sender);
            self.net.send(
                request.sender,
                Message::AcceptedSetResponse(message::AcceptedSetResponse {
                    sender: self.id,
                    accepted: self.accepted.iter().cloned().collect(),
                }),
            );
            return;
        }

        if self.recovering {
            if let Message::AcceptedSetResponse(response) = message {
                self.accepted.extend(response.accepted.iter().cloned());
            }
            // Phase messages are dropped until recovery ends.
            return;
        }

        match message {
        | Message::P1A(p1a) => self.respond_p1a(p1a),
        | Message::P2A(p2a) => self.respond_p2a(p2a),
        | _ => (),
        }
    }

    /// Adopts the scout's ballot when it is at least as high as the
    /// current promise, then answers with the promise and a value
    /// snapshot of the accepted set either way.
    fn respond_p1a(&mut self, p1a: &message::P1A) {
        if self.ballot.map_or(true, |current| p1a.ballot >= current) {
            self.ballot = Some(p1a.ballot);
        }
        let current = self
            .ballot
            .expect("[INTERNAL ERROR]: promise missing after P1A");
        let p1b = Message::P1B(message::P1B {
            a_id: self.id,
            ballot: current,
            accepted: self.accepted.iter().cloned().collect(),
        });
        trace!("acceptor {} sending P1B to {}", self.id, p1a.l_id);
        self.net.send(p1a.l_id, p1b);
    }

    /// Accepts the commander's pvalue when its ballot is at least the
    /// current promise, then answers with the promise either way.
    fn respond_p2a(&mut self, p2a: &message::P2A) {
        if self
            .ballot
            .map_or(true, |current| p2a.pvalue.ballot >= current)
        {
            self.ballot = Some(p2a.pvalue.ballot);
            self.accepted.insert(p2a.pvalue.clone());
        }
        let current = self
            .ballot
            .expect("[INTERNAL ERROR]: promise missing after P2A");
        let p2b = Message::P2B(message::P2B {
            a_id: self.id,
            ballot: current,
        });
        trace!("acceptor {} sending P2B to {}", self.id, p2a.l_id);
        self.net.send(p2a.l_id, p2b);
    }

    #[cfg(test)]
    fn promised(&self) -> Option<Ballot> {
        self.ballot
    }

    #[cfg(test)]
    fn accepted(&self) -> &Set<message::PValue> {
        &self.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Network;
    use crate::state::Command;

    fn command(op: &str) -> Command {
        Command {
            client: 0,
            c_id: 0,
            op: op.to_string(),
        }
    }

    fn pvalue(b_id: usize, l_id: usize, s_id: usize, op: &str) -> message::PValue {
        message::PValue {
            ballot: Ballot { b_id, l_id },
            s_id,
            command: command(op),
        }
    }

    fn acceptor(network: &Network, id: usize) -> Acceptor {
        Acceptor::new(
            id,
            network.server(id),
            Arc::new(Status::new()),
            &Config::default(),
            false,
        )
    }

    fn recovering(network: &Network, id: usize, wait: time::Duration) -> Acceptor {
        Acceptor::new(
            id,
            network.server(id),
            Arc::new(Status::new()),
            &Config::default().with_recovery_wait(wait),
            true,
        )
    }

    #[test]
    fn adopts_higher_ballots_over_bottom() {
        let network = Network::new(2, 0);
        let mut acceptor = acceptor(&network, 1);
        acceptor.run_tasks(&Message::P1A(message::P1A {
            l_id: 0,
            ballot: Ballot { b_id: 1, l_id: 0 },
        }));
        assert_eq!(acceptor.promised(), Some(Ballot { b_id: 1, l_id: 0 }));
        match network.drain_server(0).pop() {
            Some(Message::P1B(p1b)) => {
                assert_eq!(p1b.a_id, 1);
                assert_eq!(p1b.ballot, Ballot { b_id: 1, l_id: 0 });
                assert!(p1b.accepted.is_empty());
            }
            other => panic!("expected P1B, got {:?}", other),
        }
    }

    #[test]
    fn keeps_promise_against_lower_p1a() {
        let network = Network::new(2, 0);
        let mut acceptor = acceptor(&network, 1);
        acceptor.run_tasks(&Message::P1A(message::P1A {
            l_id: 0,
            ballot: Ballot { b_id: 5, l_id: 0 },
        }));
        network.drain_server(0);
        acceptor.run_tasks(&Message::P1A(message::P1A {
            l_id: 0,
            ballot: Ballot { b_id: 2, l_id: 0 },
        }));
        // The reply still goes out, carrying the higher promise.
        match network.drain_server(0).pop() {
            Some(Message::P1B(p1b)) => {
                assert_eq!(p1b.ballot, Ballot { b_id: 5, l_id: 0 });
            }
            other => panic!("expected P1B, got {:?}", other),
        }
        assert_eq!(acceptor.promised(), Some(Ballot { b_id: 5, l_id: 0 }));
    }

    #[test]
    fn p2a_at_promise_is_accepted() {
        let network = Network::new(2, 0);
        let mut acceptor = acceptor(&network, 1);
        let pvalue = pvalue(3, 0, 1, "hi");
        acceptor.run_tasks(&Message::P2A(message::P2A {
            l_id: 0,
            pvalue: pvalue.clone(),
        }));
        // Same ballot again: set union, no duplicate.
        acceptor.run_tasks(&Message::P2A(message::P2A {
            l_id: 0,
            pvalue: pvalue.clone(),
        }));
        assert_eq!(acceptor.accepted().len(), 1);
        assert!(acceptor.accepted().contains(&pvalue));
        assert_eq!(acceptor.promised(), Some(pvalue.ballot));
    }

    #[test]
    fn p2a_below_promise_is_refused_but_answered() {
        let network = Network::new(2, 0);
        let mut acceptor = acceptor(&network, 1);
        acceptor.run_tasks(&Message::P1A(message::P1A {
            l_id: 0,
            ballot: Ballot { b_id: 4, l_id: 0 },
        }));
        network.drain_server(0);
        acceptor.run_tasks(&Message::P2A(message::P2A {
            l_id: 0,
            pvalue: pvalue(1, 0, 1, "stale"),
        }));
        assert!(acceptor.accepted().is_empty());
        match network.drain_server(0).pop() {
            Some(Message::P2B(p2b)) => {
                assert_eq!(p2b.ballot, Ballot { b_id: 4, l_id: 0 });
            }
            other => panic!("expected P2B, got {:?}", other),
        }
    }

    #[test]
    fn recovery_requests_then_unions_then_exits() {
        let network = Network::new(3, 0);
        let mut acceptor = recovering(&network, 0, time::Duration::from_millis(30));
        for id in 0..3 {
            assert_eq!(
                network.drain_server(id),
                vec![Message::AcceptedSetRequest(message::AcceptedSetRequest {
                    sender: 0,
                })],
            );
        }

        // Phase traffic is dropped while recovering.
        acceptor.run_tasks(&Message::P1A(message::P1A {
            l_id: 1,
            ballot: Ballot { b_id: 1, l_id: 1 },
        }));
        assert!(network.drain_server(1).is_empty());

        acceptor.run_tasks(&Message::AcceptedSetResponse(message::AcceptedSetResponse {
            sender: 1,
            accepted: vec![pvalue(1, 1, 1, "a"), pvalue(1, 1, 2, "b")],
        }));
        acceptor.run_tasks(&Message::AcceptedSetResponse(message::AcceptedSetResponse {
            sender: 2,
            accepted: vec![pvalue(1, 1, 1, "a")],
        }));

        std::thread::sleep(time::Duration::from_millis(35));
        acceptor.tick();
        assert_eq!(acceptor.accepted().len(), 2);

        // Back to normal service after the window.
        acceptor.run_tasks(&Message::P1A(message::P1A {
            l_id: 1,
            ballot: Ballot { b_id: 1, l_id: 1 },
        }));
        assert_eq!(network.drain_server(1).len(), 1);
    }

    #[test]
    fn answers_accepted_set_requests_while_recovering() {
        let network = Network::new(2, 0);
        let mut acceptor = recovering(&network, 0, time::Duration::from_secs(60));
        network.drain_server(1);
        acceptor.run_tasks(&Message::AcceptedSetRequest(message::AcceptedSetRequest {
            sender: 1,
        }));
        match network.drain_server(1).pop() {
            Some(Message::AcceptedSetResponse(response)) => {
                assert_eq!(response.sender, 0);
            }
            other => panic!("expected AcceptedSetResponse, got {:?}", other),
        }
    }
}
