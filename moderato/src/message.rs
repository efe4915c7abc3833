//! # Summary
//!
//! Every wire message the protocol produces or consumes, as one closed
//! sum type. Each role pattern-matches the variants it cares about and
//! ignores the rest, so a single inbound queue per process serves the
//! replica, leader, and acceptor alike.

use serde_derive::{Deserialize, Serialize};

use crate::ballot::Ballot;
use crate::state::{Command, StateEntry};

/// "This command was, at minimum, proposed for this slot under this
/// ballot." Held in acceptor accepted sets and scout pvalue sets.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PValue {
    pub ballot: Ballot,
    pub s_id: usize,
    pub command: Command,
}

/// A replica's or leader's belief that a command should occupy a slot,
/// without ballot context.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Proposal {
    pub s_id: usize,
    pub command: Command,
}

/// A proposal once majority-accepted. Deliberately a distinct type from
/// `Proposal` so membership tests can never confuse the two.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decision {
    pub proposal: Proposal,
}

/// Client request carrying a fresh command.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
}

/// Replica's answer to the client named in a performed command.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub command: Command,
    pub entry: StateEntry,
}

/// Phase-1 probe from a scout.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct P1A {
    pub l_id: usize,
    pub ballot: Ballot,
}

/// Acceptor's phase-1 reply: its current ballot and a value snapshot of
/// its accepted set.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P1B {
    pub a_id: usize,
    pub ballot: Ballot,
    pub accepted: Vec<PValue>,
}

/// Phase-2 push from a commander.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2A {
    pub l_id: usize,
    pub pvalue: PValue,
}

/// Acceptor's phase-2 reply.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct P2B {
    pub a_id: usize,
    pub ballot: Ballot,
}

/// Scout outcome: the ballot won a majority, with the union of all
/// pvalues the responding acceptors had accepted.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Adopted {
    pub ballot: Ballot,
    pub pvalues: Vec<PValue>,
}

/// Scout or commander outcome: a higher ballot was observed.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Preempted {
    pub ballot: Ballot,
}

/// Periodic liveness broadcast, carrying the sender's current belief
/// about the raw leader counter.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeartBeat {
    pub sender: usize,
    pub current: usize,
}

/// A recovering acceptor's request for a peer's accepted set.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AcceptedSetRequest {
    pub sender: usize,
}

/// A peer's answer: a value snapshot of its accepted set.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedSetResponse {
    pub sender: usize,
    pub accepted: Vec<PValue>,
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Proposal(Proposal),
    Decision(Decision),
    P1A(P1A),
    P1B(P1B),
    P2A(P2A),
    P2B(P2B),
    Adopted(Adopted),
    Preempted(Preempted),
    HeartBeat(HeartBeat),
    AcceptedSetRequest(AcceptedSetRequest),
    AcceptedSetResponse(AcceptedSetResponse),
    Response(Response),
}
