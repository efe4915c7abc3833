use structopt::StructOpt;

use moderato::{Cluster, Config};

mod command;

use crate::command::{Command, Execution};

#[derive(StructOpt)]
#[structopt(name = "harness")]
struct Opt {
    /// Test execution to run, as a JSON list of commands
    #[structopt(short = "f", long = "file")]
    file: std::path::PathBuf,

    /// Log verbosity (error, warn, info, debug, trace)
    #[structopt(short = "l", long = "level", default_value = "info")]
    level: log::LevelFilter,
}

fn logger(level: log::LevelFilter) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.target(),
                record.level(),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .expect("[INTERNAL ERROR]: could not initialize logger");
}

fn main() {
    let opt = Opt::from_args();

    logger(opt.level);

    // Test execution
    let execution: Execution = std::fs::File::open(opt.file)
        .map(serde_json::from_reader)
        .expect("[INTERNAL ERROR]: could not find file")
        .expect("[INTERNAL ERROR]: could not parse test");

    let mut cluster: Option<Cluster> = None;

    for command in execution.0 {
        println!("Executing command {:?}", command);
        match command {
        | Command::Start { servers, clients } => {
            cluster = Some(Cluster::start(servers, clients, Config::default()));
        }
        | Command::SendMessage { client, message } => {
            running(&cluster).send_message(client, &message);
        }
        | Command::PrintChatLog { client } => {
            let chat = running(&cluster).chat_log(client);
            println!("Client {} received message log:", client);
            for entry in chat.entries() {
                println!(
                    "  {}: {},{}: {}",
                    entry.s_id, entry.command.client, entry.command.c_id, entry.command.op,
                );
            }
        }
        | Command::Crash { id } => {
            running_mut(&mut cluster).crash(id);
        }
        | Command::Restart { id } => {
            running_mut(&mut cluster).restart(id);
        }
        | Command::TimeBombLeader { count } => {
            running(&cluster).time_bomb_leader(count);
        }
        | Command::TimeBomb { id, count } => {
            running(&cluster).time_bomb(id, count);
        }
        | Command::AllClear => {
            running(&cluster).all_clear();
        }
        | Command::Sleep { ms } => {
            std::thread::sleep(std::time::Duration::from_millis(ms))
        }
        }
    }
}

fn running(cluster: &Option<Cluster>) -> &Cluster {
    cluster.as_ref().expect("[INTERNAL ERROR]: no cluster started")
}

fn running_mut(cluster: &mut Option<Cluster>) -> &mut Cluster {
    cluster.as_mut().expect("[INTERNAL ERROR]: no cluster started")
}
