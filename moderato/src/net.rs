//! # Summary
//!
//! In-memory transport between simulated processes. Each server and
//! client owns an inbound queue of bincode-encoded frames behind a
//! mutex, the only protocol state shared across thread boundaries.
//! Encoding every message at the send boundary also guarantees value
//! copies: a receiver can never observe the sender's later mutations,
//! which matters for acceptor accepted-set snapshots.
//!
//! The network also tracks when the last non-heartbeat message was
//! sent, which the driver's `all_clear` probe uses as its quiescence
//! clock, and lets the driver take a crashed server's link down so
//! in-flight traffic to it is dropped rather than delivered later.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time;

use parking_lot::Mutex;

use crate::message::Message;

#[derive(Clone)]
pub struct Network(Arc<Inner>);

struct Inner {
    servers: Vec<Link>,
    clients: Vec<Link>,
    epoch: time::Instant,
    last_send: AtomicU64,
}

struct Link {
    up: AtomicBool,
    queue: Mutex<Vec<Vec<u8>>>,
}

impl Link {
    fn new() -> Self {
        Link {
            up: AtomicBool::new(true),
            queue: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, message: &Message) {
        if !self.up.load(Ordering::SeqCst) {
            return;
        }
        let frame = bincode::serialize(message)
            .expect("[INTERNAL ERROR]: failed to serialize message");
        self.queue.lock().push(frame);
    }

    fn drain(&self) -> Vec<Message> {
        let frames = std::mem::take(&mut *self.queue.lock());
        frames
            .into_iter()
            .map(|frame| {
                bincode::deserialize(&frame)
                    .expect("[INTERNAL ERROR]: failed to deserialize message")
            })
            .collect()
    }
}

impl Network {
    pub fn new(servers: usize, clients: usize) -> Self {
        Network(Arc::new(Inner {
            servers: (0..servers).map(|_| Link::new()).collect(),
            clients: (0..clients).map(|_| Link::new()).collect(),
            epoch: time::Instant::now(),
            last_send: AtomicU64::new(0),
        }))
    }

    pub fn server_count(&self) -> usize {
        self.0.servers.len()
    }

    pub fn client_count(&self) -> usize {
        self.0.clients.len()
    }

    /// Binds a sending/draining handle to one server's identity.
    pub fn server(&self, id: usize) -> Net {
        Net {
            id,
            network: self.clone(),
        }
    }

    pub fn send_to_server(&self, to: usize, message: &Message) {
        self.stamp(message);
        self.0.servers[to].push(message);
    }

    pub fn send_to_client(&self, to: usize, message: &Message) {
        self.stamp(message);
        self.0.clients[to].push(message);
    }

    pub fn drain_server(&self, id: usize) -> Vec<Message> {
        self.0.servers[id].drain()
    }

    pub fn drain_client(&self, id: usize) -> Vec<Message> {
        self.0.clients[id].drain()
    }

    /// Drops all traffic to a crashed server.
    pub fn take_down(&self, id: usize) {
        self.0.servers[id].up.store(false, Ordering::SeqCst);
        self.0.servers[id].queue.lock().clear();
    }

    /// Reopens a restarting server's link with an empty queue.
    pub fn bring_up(&self, id: usize) {
        self.0.servers[id].queue.lock().clear();
        self.0.servers[id].up.store(true, Ordering::SeqCst);
    }

    /// Time since the last non-heartbeat send anywhere in the cluster.
    pub fn idle_for(&self) -> time::Duration {
        let last = time::Duration::from_millis(self.0.last_send.load(Ordering::SeqCst));
        self.0.epoch.elapsed().checked_sub(last).unwrap_or_default()
    }

    fn stamp(&self, message: &Message) {
        // Heartbeats flow forever and must not hold the quiescence
        // clock open.
        if let Message::HeartBeat(_) = message {
            return;
        }
        let now = self.0.epoch.elapsed().as_millis() as u64;
        self.0.last_send.fetch_max(now, Ordering::SeqCst);
    }
}

/// A server-bound handle: remembers who is sending so roles can
/// broadcast and reach their own inbound queue without carrying ids
/// around.
#[derive(Clone)]
pub struct Net {
    id: usize,
    network: Network,
}

impl Net {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn count(&self) -> usize {
        self.network.server_count()
    }

    pub fn send(&self, to: usize, message: Message) {
        self.network.send_to_server(to, &message);
    }

    /// Sends to every server, the local one included.
    pub fn broadcast(&self, message: Message) {
        for to in 0..self.count() {
            self.network.send_to_server(to, &message);
        }
    }

    pub fn send_client(&self, to: usize, message: Message) {
        self.network.send_to_client(to, &message);
    }

    pub fn drain(&self) -> Vec<Message> {
        self.network.drain_server(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{HeartBeat, Proposal};
    use crate::state::Command;

    fn proposal(op: &str) -> Message {
        Message::Proposal(Proposal {
            s_id: 1,
            command: Command {
                client: 0,
                c_id: 0,
                op: op.to_string(),
            },
        })
    }

    #[test]
    fn round_trips_messages_per_link() {
        let network = Network::new(2, 1);
        let net = network.server(0);
        net.send(1, proposal("a"));
        net.send(1, proposal("b"));
        let drained = network.drain_server(1);
        assert_eq!(drained, vec![proposal("a"), proposal("b")]);
        assert!(network.drain_server(1).is_empty());
        assert!(network.drain_server(0).is_empty());
    }

    #[test]
    fn downed_links_drop_traffic() {
        let network = Network::new(2, 0);
        network.take_down(1);
        network.server(0).send(1, proposal("lost"));
        network.bring_up(1);
        assert!(network.drain_server(1).is_empty());
    }

    #[test]
    fn heartbeats_do_not_stamp_quiescence() {
        let network = Network::new(2, 0);
        std::thread::sleep(time::Duration::from_millis(20));
        let idle = network.idle_for();
        network.server(0).send(
            1,
            Message::HeartBeat(HeartBeat {
                sender: 0,
                current: 0,
            }),
        );
        assert!(network.idle_for() >= idle);
        network.server(0).send(1, proposal("busy"));
        assert!(network.idle_for() < idle);
    }
}
