//! # Summary
//!
//! A chat client: it turns driver-injected strings into commands with a
//! client-local sequence number, broadcasts each request to every
//! server, and resends on a fixed period until the response arrives.
//! The protocol never surfaces an error to the client; it simply keeps
//! asking. Responses build the client's own view of the chat log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time;

use parking_lot::Mutex;

use crate::config::Config;
use crate::message;
use crate::message::Message;
use crate::net::Network;
use crate::state::{Command, State};

struct PendingCommand {
    command: Command,
    answered: bool,
    resend_at: time::Instant,
}

pub struct Client {
    id: usize,

    network: Network,

    /// Driver-injected chat messages; the driver's thread pushes,
    /// this client's loop drains
    inbox: Arc<Mutex<Vec<String>>>,

    /// This client's view of the chat log, shared with the driver
    chat: Arc<Mutex<State>>,

    halt: Arc<AtomicBool>,

    pending: Vec<PendingCommand>,

    next_c_id: usize,

    resend_period: time::Duration,
}

impl Client {
    pub fn new(
        id: usize,
        network: Network,
        inbox: Arc<Mutex<Vec<String>>>,
        chat: Arc<Mutex<State>>,
        halt: Arc<AtomicBool>,
        config: &Config,
    ) -> Self {
        Client {
            id,
            network,
            inbox,
            chat,
            halt,
            pending: Vec::new(),
            next_c_id: 0,
            resend_period: config.resend_period,
        }
    }

    pub fn run(mut self) {
        info!("client {} running", self.id);
        while !self.halt.load(Ordering::SeqCst) {
            let injected: Vec<String> = self.inbox.lock().drain(..).collect();
            for op in injected {
                let command = Command {
                    client: self.id,
                    c_id: self.next_c_id,
                    op,
                };
                self.next_c_id += 1;
                info!("client {} sending {:?}", self.id, command);
                self.request(&command);
                self.pending.push(PendingCommand {
                    command,
                    answered: false,
                    resend_at: time::Instant::now() + self.resend_period,
                });
            }

            for message in self.network.drain_client(self.id) {
                if let Message::Response(response) = message {
                    debug!("client {} received {:?}", self.id, response);
                    for pending in self.pending.iter_mut() {
                        if pending.command == response.command {
                            pending.answered = true;
                        }
                    }
                    self.chat.lock().observe(response.entry);
                }
            }

            let now = time::Instant::now();
            let mut resend = Vec::new();
            for pending in self.pending.iter_mut() {
                if !pending.answered && now >= pending.resend_at {
                    pending.resend_at = now + self.resend_period;
                    resend.push(pending.command.clone());
                }
            }
            for command in resend {
                info!("client {} re-sending {:?}", self.id, command);
                self.request(&command);
            }

            thread::sleep(time::Duration::from_millis(1));
        }
    }

    fn request(&self, command: &Command) {
        for to in 0..self.network.server_count() {
            self.network.send_to_server(
                to,
                &Message::Request(message::Request {
                    command: command.clone(),
                }),
            );
        }
    }
}
