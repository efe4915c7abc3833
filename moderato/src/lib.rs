//! # Summary
//!
//! A multi-role implementation of the Paxos consensus protocol in the
//! style of [Paxos Made Moderately Complex][1]: replicas, leaders,
//! scouts, commanders, and acceptors cooperate to append opaque client
//! commands to a globally agreed, gapless command sequence despite
//! crashes and leader turnover. Leadership liveness runs on heartbeats;
//! crashed acceptors and leaders recover by querying live peers, not
//! from disk.
//!
//! The crate simulates one process per server or client as an OS
//! thread over an in-memory network; the [`Cluster`] driver starts,
//! crashes, restarts, and timebombs them.
//!
//! [1]: http://paxos.systems/index.html

#[macro_use]
extern crate log;

mod ballot;
mod client;
mod cluster;
mod config;
mod message;
mod net;
mod role;
mod server;
mod state;

pub use crate::cluster::Cluster;
pub use crate::config::Config;
pub use crate::state::{Command, State, StateEntry};
