//! 三进程轮转互斥协议。
//!
//! 每个进程 `i` 持有在场库所 `p_i`、信箱 `b_i`，共享临界区库所 `sk`。
//! 进入：消耗 `p_i`，要求 `b_i` 与 `sk` 为空，产生 `sk` 并清空另两个信箱；
//! 退出：消耗 `sk`，要求 `p_i` 为空，清空另两个信箱，产生 `b_i` 与 `p_i`。
//! 信箱非空的进程必须等别的进程进入一次后才能再次进入。
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use anyhow::{Context, Result, anyhow};

use crate::config::AlternatorConfig;
use crate::net::{CancelToken, FireError, InvalidTransition, Net, Transition};

pub const SK: &str = "sk";

#[derive(Debug, Clone)]
pub struct Actor {
    pub name: &'static str,
    pub presence: &'static str,
    pub own_box: &'static str,
    pub entry: Transition<&'static str>,
    pub exit: Transition<&'static str>,
}

impl Actor {
    pub fn new(
        name: &'static str,
        presence: &'static str,
        own_box: &'static str,
        others: [&'static str; 2],
    ) -> Result<Self, InvalidTransition> {
        Ok(Self {
            name,
            presence,
            own_box,
            entry: entry_protocol(name, presence, own_box, others)?,
            exit: final_protocol(name, presence, own_box, others)?,
        })
    }
}

pub fn entry_protocol(
    name: &str,
    presence: &'static str,
    own_box: &'static str,
    others: [&'static str; 2],
) -> Result<Transition<&'static str>, InvalidTransition> {
    Transition::builder(format!("entry-{name}"))
        .input(presence, 1)
        .inhibitor(own_box)
        .inhibitor(SK)
        .reset(others[0])
        .reset(others[1])
        .output(SK, 1)
        .build()
}

pub fn final_protocol(
    name: &str,
    presence: &'static str,
    own_box: &'static str,
    others: [&'static str; 2],
) -> Result<Transition<&'static str>, InvalidTransition> {
    Transition::builder(format!("final-{name}"))
        .input(SK, 1)
        .inhibitor(presence)
        .reset(others[0])
        .reset(others[1])
        .output(own_box, 1)
        .output(presence, 1)
        .build()
}

pub fn actors() -> Result<Vec<Actor>, InvalidTransition> {
    Ok(vec![
        Actor::new("p1", "p1", "b1", ["b2", "b3"])?,
        Actor::new("p2", "p2", "b2", ["b1", "b3"])?,
        Actor::new("p3", "p3", "b3", ["b1", "b2"])?,
    ])
}

pub fn create_net(actors: &[Actor], fair: bool) -> Net<&'static str> {
    Net::new(actors.iter().map(|actor| (actor.presence, 1)), fair)
}

/// Every entry and final transition, for reachability analysis.
pub fn universe(actors: &[Actor]) -> Vec<Transition<&'static str>> {
    actors
        .iter()
        .flat_map(|actor| [actor.entry.clone(), actor.exit.clone()])
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternatorReport {
    /// Size of the reachable state space of the protocol net.
    pub reachable_states: usize,
    /// Critical sections completed by each actor, in actor order.
    pub sections: Vec<usize>,
    /// Whether two actors were ever observed inside at once.
    pub exclusion_violated: bool,
}

impl AlternatorReport {
    pub fn total_sections(&self) -> usize {
        self.sections.iter().sum()
    }
}

/// Runs the three actors until `config.rounds` critical sections have been
/// entered in total, then cancels them.
pub fn run(config: &AlternatorConfig) -> Result<AlternatorReport> {
    let actors = actors()?;
    let net = Arc::new(create_net(&actors, config.fair));
    let reachable_states = net.reachable(&universe(&actors)).len();
    log::info!("alternator net has {} reachable markings", reachable_states);

    let token = CancelToken::new();
    if config.rounds == 0 {
        token.cancel();
    }
    let inside = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let violated = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(actors.len());
    for actor in actors {
        let net = Arc::clone(&net);
        let token = token.clone();
        let inside = Arc::clone(&inside);
        let entered = Arc::clone(&entered);
        let violated = Arc::clone(&violated);
        let rounds = config.rounds;
        let handle = thread::Builder::new()
            .name(actor.name.to_string())
            .spawn(move || -> Result<usize, FireError> {
                let mut sections = 0;
                loop {
                    match net.fire_cancellable(&[actor.entry.clone()], &token) {
                        Ok(_) => {}
                        Err(FireError::CancelledWait) => break,
                        Err(err) => return Err(err),
                    }

                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        violated.store(true, Ordering::SeqCst);
                    }
                    let marking = net.snapshot();
                    if marking.tokens(&SK) != 1 || marking.tokens(&actor.presence) != 0 {
                        violated.store(true, Ordering::SeqCst);
                    }
                    log::info!("{} in critical section", actor.name);
                    sections += 1;
                    inside.fetch_sub(1, Ordering::SeqCst);

                    if entered.fetch_add(1, Ordering::SeqCst) + 1 >= rounds {
                        token.cancel();
                    }

                    match net.fire_cancellable(&[actor.exit.clone()], &token) {
                        Ok(_) => {}
                        Err(FireError::CancelledWait) => break,
                        Err(err) => return Err(err),
                    }
                }
                log::debug!("{} interrupted after {} sections", actor.name, sections);
                Ok(sections)
            })
            .context("failed to spawn alternator actor")?;
        handles.push(handle);
    }

    let mut sections = Vec::with_capacity(handles.len());
    for handle in handles {
        let count = handle
            .join()
            .map_err(|_| anyhow!("alternator actor panicked"))??;
        sections.push(count);
    }

    Ok(AlternatorReport {
        reachable_states,
        sections,
        exclusion_violated: violated.load(Ordering::SeqCst),
    })
}
