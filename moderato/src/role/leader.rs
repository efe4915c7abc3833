//! # Summary
//!
//! The leader orchestrates everything above the acceptors: it wins
//! ballots with scouts, pushes proposals with commanders, merges
//! discovered pvalues into its proposal map, and reacts to preemption.
//! Leadership itself is a raw monotonically increasing counter folded
//! across heartbeats; a server leads exactly when the counter equals
//! its id modulo the cluster size. Server 0 starts as leader; everyone
//! else stays passive until the counter reaches them.

use std::sync::Arc;
use std::time;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap as Map;
use hashbrown::HashSet as Set;

use crate::ballot::{Ballot, BallotGenerator};
use crate::config::Config;
use crate::message;
use crate::message::Message;
use crate::net::Net;
use crate::role::commander::Commander;
use crate::role::heartbeat::HeartBeatGenerator;
use crate::role::scout::Scout;
use crate::role::timebomb::Timebomb;
use crate::role::Progress;
use crate::server::Status;
use crate::state::Command;

pub struct Leader {
    id: usize,

    count: usize,

    net: Net,

    status: Arc<Status>,

    timebomb: Arc<Timebomb>,

    /// Raw believed leader counter; only reduced mod `count` when
    /// checking who leads
    current: usize,

    generator: BallotGenerator,

    /// Ballot for the current or next leadership attempt
    ballot: Ballot,

    active: bool,

    /// Slot to command, the leader's working proposal set
    proposals: Map<usize, Command>,

    scouts: Map<usize, Scout>,

    commanders: Map<usize, Commander>,

    next_task: usize,

    /// Scouts awaiting a respawn: timed out, or backing off after a
    /// preemption
    stalled_scouts: Vec<(time::Instant, Ballot)>,

    /// Timed-out commanders' pvalues awaiting a respawn
    stalled_pvalues: Vec<(time::Instant, message::PValue)>,

    heartbeat: HeartBeatGenerator,

    /// Latest liveness view
    dead: Set<usize>,

    /// Set while re-deriving a leader belief after a restart
    recover_until: Option<time::Instant>,

    /// Randomized scout respawn delay after preemption, in milliseconds
    backoff: f32,

    task_timeout: time::Duration,
}

impl Leader {
    pub fn new(
        id: usize,
        net: Net,
        status: Arc<Status>,
        timebomb: Arc<Timebomb>,
        config: &Config,
        recovering: bool,
    ) -> Self {
        let count = net.count();
        let generator = BallotGenerator::new(id);
        let ballot = generator.current();
        let heartbeat = HeartBeatGenerator::new(id, net.clone(), config);
        status.set_leader_recovering(recovering);
        let mut leader = Leader {
            id,
            count,
            net,
            status,
            timebomb,
            current: 0,
            generator,
            ballot,
            active: false,
            proposals: Map::default(),
            scouts: Map::default(),
            commanders: Map::default(),
            next_task: 0,
            stalled_scouts: Vec::new(),
            stalled_pvalues: Vec::new(),
            heartbeat,
            dead: Set::default(),
            recover_until: if recovering {
                Some(time::Instant::now() + config.update_period)
            } else {
                None
            },
            backoff: 50.0 + 50.0 * rand::random::<f32>(),
            task_timeout: config.task_timeout,
        };
        if !recovering && id == 0 {
            // Server 0 starts as leader and runs a scout for its first
            // ballot right away.
            leader.spawn_scout(leader.ballot);
        }
        leader
    }

    fn is_current(&self) -> bool {
        self.current % self.count == self.id
    }

    fn recovering(&self) -> bool {
        self.recover_until.is_some()
    }

    /// One pass of the leader: dispatch a drained message (if any),
    /// drive every live scout and commander with it, then advance the
    /// timer-driven logic. Called with `None` between message batches.
    pub fn run_tasks(&mut self, message: Option<&Message>) {
        if let Some(message) = message {
            match message {
            | Message::HeartBeat(beat) => {
                self.heartbeat.add_beat(beat);
                self.fold_belief(beat.current);
            }
            | Message::Proposal(proposal) if !self.recovering() => {
                self.respond_propose(proposal)
            }
            | Message::Adopted(adopted) if !self.recovering() => {
                self.respond_adopt(adopted)
            }
            | Message::Preempted(preempted) if !self.recovering() => {
                self.respond_preempt(preempted)
            }
            | _ => (),
            }
        }
        self.drive_tasks(message);
        self.tick();
    }

    /// Folds a peer's announced belief into ours; the counter only ever
    /// grows. Gaining leadership this way runs leader initialization
    /// exactly once for the new term.
    fn fold_belief(&mut self, belief: usize) {
        if belief <= self.current {
            return;
        }
        let was = self.is_current();
        self.current = belief;
        if was && !self.is_current() {
            debug!("server {} stepping down, belief now {}", self.id, self.current);
            self.active = false;
        }
        if !was && self.is_current() && !self.recovering() {
            self.init();
        }
    }

    /// Leader initialization for a new term: fresh ballot, new scout.
    fn init(&mut self) {
        self.ballot = self.generator.next();
        self.active = false;
        info!(
            "server {} assuming leadership with {:?}",
            self.id, self.ballot,
        );
        self.spawn_scout(self.ballot);
    }

    fn respond_propose(&mut self, proposal: &message::Proposal) {
        if self.proposals.contains_key(&proposal.s_id) {
            return;
        }
        self.proposals
            .insert(proposal.s_id, proposal.command.clone());
        if self.active && self.is_current() {
            self.spawn_commander(proposal.s_id, proposal.command.clone());
        }
    }

    /// Merges the scout's discovered pvalues into the proposal map via
    /// `proposals ⊕ pmax(pvalues)` and pushes everything with a
    /// commander under the adopted ballot.
    fn respond_adopt(&mut self, adopted: &message::Adopted) {
        if !self.is_current() || adopted.ballot != self.ballot {
            return;
        }
        oplus(&mut self.proposals, pmax(adopted.pvalues.iter().cloned()));
        let proposals = std::mem::take(&mut self.proposals);
        for (s_id, command) in &proposals {
            self.spawn_commander(*s_id, command.clone());
        }
        self.proposals = proposals;
        self.active = true;
        info!("server {} active under {:?}", self.id, self.ballot);
    }

    fn respond_preempt(&mut self, preempted: &message::Preempted) {
        if !self.is_current() {
            return;
        }
        let ballot = preempted.ballot;
        if ballot.l_id > self.current {
            // A leader from a later term is out there; stand down and
            // adopt its term rather than fight it.
            info!(
                "server {} resigning, preempted by {:?}",
                self.id, ballot,
            );
            self.active = false;
            self.current = ballot.l_id;
            return;
        }
        if ballot > self.ballot {
            self.active = false;
            while self.ballot <= ballot {
                self.ballot = self.generator.next();
            }
            self.backoff *= 1.0 + rand::random::<f32>() / 2.0;
            let delay = time::Duration::from_millis(self.backoff.round() as u64);
            debug!(
                "server {} preempted, retrying with {:?} after {:?}",
                self.id, self.ballot, delay,
            );
            self.stalled_scouts
                .push((time::Instant::now() + delay, self.ballot));
        }
    }

    /// Gives every live task a look at the drained message (or a null
    /// tick), then garbage-collects those that finished or timed out.
    fn drive_tasks(&mut self, message: Option<&Message>) {
        let now = time::Instant::now();
        let mut finished = Vec::new();

        for (t_id, scout) in self.scouts.iter_mut() {
            match scout.run(message) {
            | Progress::Pending => (),
            | Progress::Done => finished.push(*t_id),
            | Progress::TimedOut => {
                self.stalled_scouts.push((now, scout.ballot()));
                finished.push(*t_id);
            }
            }
        }
        for t_id in finished.drain(..) {
            self.scouts.remove(&t_id);
        }

        for (t_id, commander) in self.commanders.iter_mut() {
            match commander.run(message) {
            | Progress::Pending => (),
            | Progress::Done => finished.push(*t_id),
            | Progress::TimedOut => {
                self.stalled_pvalues.push((now, commander.pvalue().clone()));
                finished.push(*t_id);
            }
            }
        }
        for t_id in finished.drain(..) {
            self.commanders.remove(&t_id);
        }
    }

    /// Timer-driven work: heartbeats, dead-leader reaction, recovery
    /// settling, and stalled-task respawns.
    fn tick(&mut self) {
        if let Some(dead) = self.heartbeat.beat_and_analyze(self.current) {
            self.dead = dead;
            if !self.recovering() && self.dead.contains(&(self.current % self.count)) {
                self.current += 1;
                debug!(
                    "server {} suspects dead leader, belief now {}",
                    self.id, self.current,
                );
                if self.is_current() {
                    self.init();
                }
            }
        }

        if let Some(deadline) = self.recover_until {
            if time::Instant::now() >= deadline {
                self.recover_until = None;
                self.status.set_leader_recovering(false);
                info!(
                    "server {} leader recovered, belief {}",
                    self.id, self.current,
                );
                if self.is_current() {
                    self.init();
                }
            }
        } else {
            self.respawn_stalled();
        }

        self.status.set_leading(self.is_current());
    }

    /// Respawns timed-out or backed-off tasks once a majority of peers
    /// looks alive again. Work queued for a superseded ballot, or from
    /// a leadership term that has since ended, is dropped.
    fn respawn_stalled(&mut self) {
        if !self.is_current() {
            self.stalled_scouts.clear();
            self.stalled_pvalues.clear();
            return;
        }
        if self.stalled_scouts.is_empty() && self.stalled_pvalues.is_empty() {
            return;
        }
        if !self.live_majority() {
            return;
        }

        let now = time::Instant::now();
        let current = self.ballot;

        let mut keep = Vec::new();
        for (ready_at, ballot) in std::mem::take(&mut self.stalled_scouts) {
            if ballot != current {
                continue;
            }
            if ready_at <= now {
                self.spawn_scout(ballot);
            } else {
                keep.push((ready_at, ballot));
            }
        }
        self.stalled_scouts = keep;

        let mut keep = Vec::new();
        for (ready_at, pvalue) in std::mem::take(&mut self.stalled_pvalues) {
            if pvalue.ballot != current {
                continue;
            }
            if ready_at <= now {
                let t_id = self.next_task_id();
                let commander = Commander::new(
                    self.net.clone(),
                    &self.timebomb,
                    pvalue,
                    self.id,
                    self.task_timeout,
                );
                self.commanders.insert(t_id, commander);
            } else {
                keep.push((ready_at, pvalue));
            }
        }
        self.stalled_pvalues = keep;
    }

    fn live_majority(&self) -> bool {
        self.dead.len() <= (self.count - 1) / 2
    }

    fn next_task_id(&mut self) -> usize {
        let t_id = self.next_task;
        self.next_task += 1;
        t_id
    }

    fn spawn_scout(&mut self, ballot: Ballot) {
        let t_id = self.next_task_id();
        let scout = Scout::new(
            self.net.clone(),
            &self.timebomb,
            ballot,
            self.id,
            self.task_timeout,
        );
        self.scouts.insert(t_id, scout);
    }

    fn spawn_commander(&mut self, s_id: usize, command: Command) {
        let t_id = self.next_task_id();
        let commander = Commander::new(
            self.net.clone(),
            &self.timebomb,
            message::PValue {
                ballot: self.ballot,
                s_id,
                command,
            },
            self.id,
            self.task_timeout,
        );
        self.commanders.insert(t_id, commander);
    }
}

/// Per-slot reduction keeping the command carried by the highest ballot.
fn pmax<I>(pvalues: I) -> Map<usize, Command>
where
    I: IntoIterator<Item = message::PValue>,
{
    let mut pmax: Map<usize, (Ballot, Command)> = Map::default();
    for pvalue in pvalues {
        match pmax.entry(pvalue.s_id) {
        | Entry::Occupied(mut occupied) => {
            if pvalue.ballot > occupied.get().0 {
                occupied.insert((pvalue.ballot, pvalue.command));
            }
        }
        | Entry::Vacant(vacant) => {
            vacant.insert((pvalue.ballot, pvalue.command));
        }
        }
    }
    pmax.into_iter()
        .map(|(s_id, (_, command))| (s_id, command))
        .collect()
}

/// `left ⊕ right`: the right operand's slot mappings win conflicts, the
/// left operand fills the gaps.
fn oplus(left: &mut Map<usize, Command>, right: Map<usize, Command>) {
    for (s_id, command) in right {
        left.insert(s_id, command);
    }
}
