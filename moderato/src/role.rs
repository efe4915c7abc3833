//! # Summary
//!
//! The five cooperating protocol roles from [Paxos Made Moderately
//! Complex][1], plus the liveness and fault-injection machinery that
//! keeps leadership moving. Every server runs one replica, one leader,
//! and one acceptor; scouts and commanders are short-lived objects a
//! leader drives from its own control loop rather than separate tasks.
//!
//! [1]: http://paxos.systems/index.html

/// Distributed memory.
pub(crate) mod acceptor;

/// Phase-2 quorum collector.
pub(crate) mod commander;

/// Liveness broadcast and dead-peer detection.
pub(crate) mod heartbeat;

/// Scout/commander orchestrator and election driver.
pub(crate) mod leader;

/// Replicated state machine.
pub(crate) mod replica;

/// Phase-1 quorum collector.
pub(crate) mod scout;

/// Message-count crash injector.
pub(crate) mod timebomb;

/// One poll step of a scout or commander. `Done` and `TimedOut` are
/// both terminal for the polled task; a timed-out task's work is queued
/// by the leader for a later respawn.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    Pending,
    Done,
    TimedOut,
}
