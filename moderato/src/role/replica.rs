//! # Summary
//!
//! The replica is the client-facing role: it maps fresh commands onto
//! the lowest free slot, broadcasts the proposal to every leader,
//! applies decisions to its copy of the state in strict slot order, and
//! answers the issuing client. A command displaced from its slot by a
//! conflicting decision is proposed again for a later slot; a command
//! already performed is never executed twice.

use std::sync::Arc;

use hashbrown::HashMap as Map;
use parking_lot::Mutex;

use crate::message;
use crate::message::Message;
use crate::net::Net;
use crate::state::{Command, State, StateEntry};

pub struct Replica {
    id: usize,

    net: Net,

    /// Slot to command, for proposals this replica has made
    proposals: Map<usize, Command>,

    /// Slot to command, for decided slots
    decisions: Map<usize, Command>,

    /// Next slot to perform; slots are 1-indexed
    next_slot: usize,

    /// Shared with the driver so tests and probes can read it
    state: Arc<Mutex<State>>,
}

impl Replica {
    pub fn new(id: usize, net: Net, state: Arc<Mutex<State>>) -> Self {
        Replica {
            id,
            net,
            proposals: Map::default(),
            decisions: Map::default(),
            next_slot: 1,
            state,
        }
    }

    pub fn run_tasks(&mut self, message: &Message) {
        match message {
        | Message::Request(request) => {
            debug!("replica {} received {:?}", self.id, request);
            self.propose(request.command.clone());
        }
        | Message::Decision(decision) => self.respond_decision(decision),
        | _ => (),
        }
    }

    /// Assigns the command the lowest slot not yet occupied by any
    /// proposal or decision and tells every leader. Duplicate client
    /// requests for an already-decided command are absorbed here.
    fn propose(&mut self, command: Command) {
        if self.decisions.values().any(|decided| *decided == command) {
            return;
        }

        let mut s_id = 1;
        while self.proposals.contains_key(&s_id) || self.decisions.contains_key(&s_id) {
            s_id += 1;
        }

        info!("replica {} proposing {:?} for slot {}", self.id, command, s_id);
        self.proposals.insert(s_id, command.clone());
        self.net
            .broadcast(Message::Proposal(message::Proposal { s_id, command }));
    }

    /// Records the decision (duplicates arrive and are dropped), then
    /// performs everything now contiguous from `next_slot`, re-proposing
    /// any of our own proposals the decisions displaced.
    fn respond_decision(&mut self, decision: &message::Decision) {
        let proposal = &decision.proposal;
        if !self.decisions.contains_key(&proposal.s_id) {
            self.decisions
                .insert(proposal.s_id, proposal.command.clone());
        }

        while let Some(decided) = self.decisions.get(&self.next_slot).cloned() {
            if let Some(ours) = self.proposals.get(&self.next_slot) {
                if *ours != decided {
                    let displaced = ours.clone();
                    self.propose(displaced);
                }
            }
            self.perform(decided);
        }
    }

    /// Executes one decided command, unless some earlier slot already
    /// executed it (the same command can be decided for two slots when
    /// different replicas proposed it independently).
    fn perform(&mut self, command: Command) {
        for (s_id, decided) in &self.decisions {
            if *decided == command && *s_id < self.next_slot {
                self.next_slot += 1;
                return;
            }
        }

        info!("replica {} performing {:?} in slot {}", self.id, command, self.next_slot);
        let entry = StateEntry {
            command: command.clone(),
            s_id: self.next_slot,
        };
        self.state.lock().append(entry.clone());
        self.next_slot += 1;
        self.net.send_client(
            command.client,
            Message::Response(message::Response { command, entry }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Network;

    fn command(client: usize, c_id: usize, op: &str) -> Command {
        Command {
            client,
            c_id,
            op: op.to_string(),
        }
    }

    fn decision(s_id: usize, command: Command) -> Message {
        Message::Decision(message::Decision {
            proposal: message::Proposal { s_id, command },
        })
    }

    fn replica(network: &Network) -> (Replica, Arc<Mutex<State>>) {
        let state = Arc::new(Mutex::new(State::default()));
        (Replica::new(0, network.server(0), state.clone()), state)
    }

    fn proposals_sent(network: &Network, to: usize) -> Vec<message::Proposal> {
        network
            .drain_server(to)
            .into_iter()
            .filter_map(|m| match m {
                Message::Proposal(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn requests_take_the_lowest_free_slot() {
        let network = Network::new(2, 1);
        let (mut replica, _) = replica(&network);
        replica.run_tasks(&Message::Request(message::Request {
            command: command(0, 0, "a"),
        }));
        replica.run_tasks(&Message::Request(message::Request {
            command: command(0, 1, "b"),
        }));
        let sent = proposals_sent(&network, 1);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].s_id, 1);
        assert_eq!(sent[1].s_id, 2);
    }

    #[test]
    fn decisions_apply_in_slot_order() {
        let network = Network::new(1, 1);
        let (mut replica, state) = replica(&network);
        // Slot 2 first: nothing performs until slot 1 arrives.
        replica.run_tasks(&decision(2, command(0, 1, "second")));
        assert!(state.lock().is_empty());
        replica.run_tasks(&decision(1, command(0, 0, "first")));
        let ops: Vec<String> = state
            .lock()
            .entries()
            .iter()
            .map(|e| e.command.op.clone())
            .collect();
        assert_eq!(ops, vec!["first".to_string(), "second".to_string()]);
        // One response per performed command for this client.
        let responses = network.drain_client(0);
        assert_eq!(responses.len(), 2);
    }

    #[test]
    fn duplicate_decisions_are_idempotent() {
        let network = Network::new(1, 1);
        let (mut replica, state) = replica(&network);
        let d = decision(1, command(0, 0, "once"));
        replica.run_tasks(&d);
        replica.run_tasks(&d);
        assert_eq!(state.lock().len(), 1);
        assert_eq!(replica.next_slot, 2);
        assert_eq!(network.drain_client(0).len(), 1);
    }

    #[test]
    fn duplicate_requests_for_decided_commands_are_absorbed() {
        let network = Network::new(2, 1);
        let (mut replica, _) = replica(&network);
        replica.run_tasks(&decision(1, command(0, 0, "done")));
        proposals_sent(&network, 1);
        replica.run_tasks(&Message::Request(message::Request {
            command: command(0, 0, "done"),
        }));
        assert!(proposals_sent(&network, 1).is_empty());
    }

    #[test]
    fn displaced_proposal_is_reproposed() {
        let network = Network::new(2, 2);
        let (mut replica, state) = replica(&network);
        replica.run_tasks(&Message::Request(message::Request {
            command: command(0, 0, "mine"),
        }));
        assert_eq!(proposals_sent(&network, 1)[0].s_id, 1);

        // Another replica's command wins slot 1.
        replica.run_tasks(&decision(1, command(1, 0, "theirs")));
        let resent = proposals_sent(&network, 1);
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].command, command(0, 0, "mine"));
        assert_eq!(resent[0].s_id, 2);

        assert_eq!(state.lock().entries()[0].command, command(1, 0, "theirs"));
    }

    #[test]
    fn same_command_decided_twice_executes_once() {
        let network = Network::new(1, 1);
        let (mut replica, state) = replica(&network);
        replica.run_tasks(&decision(1, command(0, 0, "hi")));
        replica.run_tasks(&decision(2, command(0, 0, "hi")));
        assert_eq!(state.lock().len(), 1);
        assert_eq!(replica.next_slot, 3);
        // The skipped duplicate earns no second response.
        assert_eq!(network.drain_client(0).len(), 1);
    }
}
