//! # Summary
//!
//! The control plane: starts a cluster of server and client threads
//! over one in-memory network and exposes the fault-injection commands
//! the test driver needs. All cluster state lives in this struct; there
//! are no process-wide globals. Dropping a `Cluster` halts and joins
//! every thread it spawned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time;

use parking_lot::Mutex;

use crate::client::Client;
use crate::config::Config;
use crate::net::Network;
use crate::role::timebomb::Timebomb;
use crate::server::{Server, Status};
use crate::state::State;

struct ServerHandle {
    halt: Arc<AtomicBool>,
    status: Arc<Status>,
    timebomb: Arc<Timebomb>,
    state: Arc<Mutex<State>>,
    thread: Option<thread::JoinHandle<()>>,
}

struct ClientHandle {
    halt: Arc<AtomicBool>,
    inbox: Arc<Mutex<Vec<String>>>,
    chat: Arc<Mutex<State>>,
    thread: Option<thread::JoinHandle<()>>,
}

pub struct Cluster {
    config: Config,
    network: Network,
    servers: Vec<ServerHandle>,
    clients: Vec<ClientHandle>,
}

impl Cluster {
    /// Starts `servers` server threads and `clients` client threads.
    pub fn start(servers: usize, clients: usize, config: Config) -> Self {
        let network = Network::new(servers, clients);
        let mut cluster = Cluster {
            config,
            network,
            servers: Vec::with_capacity(servers),
            clients: Vec::with_capacity(clients),
        };
        for id in 0..servers {
            let handle = cluster.spawn_server(id, false);
            cluster.servers.push(handle);
        }
        for id in 0..clients {
            let handle = cluster.spawn_client(id);
            cluster.clients.push(handle);
        }
        cluster
    }

    fn spawn_server(&self, id: usize, recovering: bool) -> ServerHandle {
        let halt = Arc::new(AtomicBool::new(false));
        let status = Arc::new(Status::new());
        let timebomb = Arc::new(Timebomb::new(halt.clone()));
        let state = Arc::new(Mutex::new(State::default()));
        let server = Server::new(
            id,
            self.network.server(id),
            status.clone(),
            timebomb.clone(),
            halt.clone(),
            state.clone(),
            &self.config,
            recovering,
        );
        let thread = thread::Builder::new()
            .name(format!("server-{}", id))
            .spawn(move || server.run())
            .expect("[INTERNAL ERROR]: failed to spawn server thread");
        ServerHandle {
            halt,
            status,
            timebomb,
            state,
            thread: Some(thread),
        }
    }

    fn spawn_client(&self, id: usize) -> ClientHandle {
        let halt = Arc::new(AtomicBool::new(false));
        let inbox = Arc::new(Mutex::new(Vec::new()));
        let chat = Arc::new(Mutex::new(State::default()));
        let client = Client::new(
            id,
            self.network.clone(),
            inbox.clone(),
            chat.clone(),
            halt.clone(),
            &self.config,
        );
        let thread = thread::Builder::new()
            .name(format!("client-{}", id))
            .spawn(move || client.run())
            .expect("[INTERNAL ERROR]: failed to spawn client thread");
        ClientHandle {
            halt,
            inbox,
            chat,
            thread: Some(thread),
        }
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Hands a chat message to a client to run through the protocol.
    pub fn send_message(&self, client: usize, message: &str) {
        self.clients[client].inbox.lock().push(message.to_string());
    }

    /// Immediately halts a server; traffic to it is dropped from now
    /// until a restart.
    pub fn crash(&mut self, server: usize) {
        info!("crashing server {}", server);
        self.network.take_down(server);
        let handle = &mut self.servers[server];
        handle.halt.store(true, Ordering::SeqCst);
        if let Some(thread) = handle.thread.take() {
            thread.join().ok();
        }
    }

    /// Brings a crashed server back with a fresh, Recovering
    /// acceptor/leader pair under the same id. Stale queued traffic is
    /// discarded first.
    pub fn restart(&mut self, server: usize) {
        info!("restarting server {}", server);
        // A server that halted itself (timebomb) still has a live link.
        self.servers[server].halt.store(true, Ordering::SeqCst);
        if let Some(thread) = self.servers[server].thread.take() {
            thread.join().ok();
        }
        self.network.take_down(server);
        self.network.bring_up(server);
        self.servers[server] = self.spawn_server(server, true);
    }

    /// Arms a server's timebomb for `count` protocol messages.
    pub fn time_bomb(&self, server: usize, count: usize) {
        self.servers[server].timebomb.set(count);
    }

    /// Arms the timebomb on whichever server currently believes it is
    /// the leader.
    pub fn time_bomb_leader(&self, count: usize) {
        for handle in &self.servers {
            if handle.status.leading() && !Self::finished(handle) {
                handle.timebomb.set(count);
            }
        }
    }

    /// Blocks until no acceptor or leader is recovering, the network
    /// has been quiescent for the configured window, and at least one
    /// full liveness update period has passed since the call began, so
    /// a just-crashed peer's death is observable system-wide.
    pub fn all_clear(&self) {
        let min_wait = time::Instant::now() + 2 * self.config.update_period;
        loop {
            let recovering = self
                .servers
                .iter()
                .any(|handle| !Self::finished(handle) && handle.status.recovering());
            if !recovering
                && self.network.idle_for() >= self.config.quiescence
                && time::Instant::now() >= min_wait
            {
                info!("all clear");
                return;
            }
            thread::sleep(time::Duration::from_millis(10));
        }
    }

    /// A client's current view of the chat log.
    pub fn chat_log(&self, client: usize) -> State {
        self.clients[client].chat.lock().clone()
    }

    /// A replica's current state.
    pub fn server_state(&self, server: usize) -> State {
        self.servers[server].state.lock().clone()
    }

    fn finished(handle: &ServerHandle) -> bool {
        handle
            .thread
            .as_ref()
            .map_or(true, |thread| thread.is_finished())
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for handle in &self.servers {
            handle.halt.store(true, Ordering::SeqCst);
        }
        for handle in &self.clients {
            handle.halt.store(true, Ordering::SeqCst);
        }
        for handle in self.servers.iter_mut() {
            if let Some(thread) = handle.thread.take() {
                thread.join().ok();
            }
        }
        for handle in self.clients.iter_mut() {
            if let Some(thread) = handle.thread.take() {
                thread.join().ok();
            }
        }
    }
}
