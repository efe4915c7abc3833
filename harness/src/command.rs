use serde_derive::{Serialize, Deserialize};

#[derive(Serialize, Deserialize)]
pub struct Execution(pub Vec<Command>);

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
#[derive(Clone, Debug)]
pub enum Command {
    /// Start a cluster with the given number of servers and clients
    Start {
        servers: usize,
        clients: usize,
    },

    /// Send a chat message through the specified client
    SendMessage {
        client: usize,
        message: String,
    },

    /// Print the chat log observed by the specified client
    PrintChatLog {
        client: usize,
    },

    /// Crash the specified server
    Crash {
        id: usize,
    },

    /// Restart a previously crashed server in recovery mode
    Restart {
        id: usize,
    },

    /// Arm a timebomb on the current leader
    TimeBombLeader {
        count: usize,
    },

    /// Arm a timebomb on the specified server
    TimeBomb {
        id: usize,
        count: usize,
    },

    /// Block until the cluster has settled
    AllClear,

    /// Sleep the test harness for `ms` milliseconds
    Sleep {
        ms: u64,
    },
}
