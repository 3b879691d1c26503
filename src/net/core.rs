//! 运行时: 共享标识上的互斥发射、阻塞等待、唤醒交接与取消.
//!
//! 网锁由互斥量与"接力棒"组成。发射成功后若队列中存在候选集已可激发的
//! 等待者，接力棒直接交给它：在它完成发射之前，其他调用方即使拿到互斥量
//! 也只能在 `gate` 上等待。公平模式按到达顺序挑选等待者，非公平模式随机挑选。
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};
use rand::seq::IteratorRandom;
use thiserror::Error;

use crate::analysis::reachability::{self, ReachabilityConfig, StateSpace};
use crate::net::cancel::CancelToken;
use crate::net::ids::{PlaceKey, WaiterId};
use crate::net::marking::Marking;
use crate::net::structure::{Transition, Weight};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FireError {
    #[error("fire called with an empty candidate set")]
    EmptyCandidateSet,
    #[error("wait cancelled before any transition was applied")]
    CancelledWait,
}

struct Waiter<P: PlaceKey> {
    id: WaiterId,
    candidates: Vec<Transition<P>>,
    wake: Sender<()>,
}

struct NetState<P: PlaceKey> {
    marking: Marking<P>,
    waiters: VecDeque<Waiter<P>>,
    /// Waiter the net lock has been handed to, if any.
    baton: Option<WaiterId>,
    next_waiter: WaiterId,
}

enum Wakeup {
    HandOff,
    Cancelled,
}

/// A Petri net whose marking is shared between threads.
///
/// Share it behind an `Arc`. [`Net::fire`] is the only operation that blocks.
pub struct Net<P: PlaceKey> {
    fair: bool,
    state: Mutex<NetState<P>>,
    gate: Condvar,
    scan: Mutex<()>,
}

impl<P: PlaceKey> Net<P> {
    pub fn new(initial: impl IntoIterator<Item = (P, Weight)>, fair: bool) -> Self {
        let marking: Marking<P> = initial.into_iter().collect();
        log::debug!("net created (fair: {}) with marking {:?}", fair, marking);
        Self {
            fair,
            state: Mutex::new(NetState {
                marking,
                waiters: VecDeque::new(),
                baton: None,
                next_waiter: WaiterId::new(0),
            }),
            gate: Condvar::new(),
            scan: Mutex::new(()),
        }
    }

    pub fn is_fair(&self) -> bool {
        self.fair
    }

    /// A consistent copy of the current marking.
    pub fn snapshot(&self) -> Marking<P> {
        self.state.lock().marking.clone()
    }

    /// Number of callers currently parked in [`Net::fire`].
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Fires the first enabled transition of `candidates`, in slice order,
    /// blocking until one becomes enabled.
    pub fn fire(&self, candidates: &[Transition<P>]) -> Result<Transition<P>, FireError> {
        self.fire_inner(candidates, None)
    }

    /// Like [`Net::fire`], but gives up with [`FireError::CancelledWait`]
    /// once `token` is cancelled. A token cancelled before the call fails it
    /// immediately.
    pub fn fire_cancellable(
        &self,
        candidates: &[Transition<P>],
        token: &CancelToken,
    ) -> Result<Transition<P>, FireError> {
        self.fire_inner(candidates, Some(token))
    }

    /// Every marking reachable from the current one using `universe`,
    /// including the current marking, all zero-pruned.
    ///
    /// The reachable state space must be finite.
    pub fn reachable(&self, universe: &[Transition<P>]) -> HashSet<Marking<P>> {
        let _scan = self.scan.lock();
        let root = self.snapshot();
        reachability::reachable_from(&root, universe)
    }

    /// The state graph rooted at the current marking.
    pub fn state_space(
        &self,
        universe: &[Transition<P>],
        config: &ReachabilityConfig,
    ) -> StateSpace<P> {
        let _scan = self.scan.lock();
        let root = self.snapshot();
        reachability::explore(&root, universe, config)
    }

    fn fire_inner(
        &self,
        candidates: &[Transition<P>],
        token: Option<&CancelToken>,
    ) -> Result<Transition<P>, FireError> {
        if candidates.is_empty() {
            return Err(FireError::EmptyCandidateSet);
        }
        if token.is_some_and(CancelToken::is_cancelled) {
            return Err(FireError::CancelledWait);
        }

        let mut state = self.acquire();
        if let Some(transition) = first_enabled(candidates, &state.marking) {
            self.commit(&mut state, transition);
            self.pass_baton(&mut state, None);
            return Ok(transition.clone());
        }

        let (wake, woken) = crossbeam_channel::bounded(1);
        let id = state.next_waiter;
        state.next_waiter = id.next();
        state.waiters.push_back(Waiter {
            id,
            candidates: candidates.to_vec(),
            wake,
        });
        log::debug!(
            "waiter {} parked on {} candidate(s), queue length {}",
            id,
            candidates.len(),
            state.waiters.len()
        );
        drop(state);

        loop {
            let wakeup = park(&woken, token);
            let mut state = self.state.lock();

            let cancelled = token.is_some_and(CancelToken::is_cancelled);
            if matches!(wakeup, Wakeup::Cancelled) || cancelled {
                self.withdraw(&mut state, id);
                return Err(FireError::CancelledWait);
            }

            if state.baton != Some(id) {
                crate::unrecoverable!(
                    "waiter {} woken while the net lock belongs to {:?}",
                    id,
                    state.baton
                );
            }

            match first_enabled(candidates, &state.marking) {
                Some(transition) => {
                    remove_waiter(&mut *state, id);
                    self.commit(&mut state, transition);
                    self.pass_baton(&mut state, None);
                    return Ok(transition.clone());
                }
                // the baton blocks every other fire, so the marking that made
                // this waiter satisfiable at hand-off is still current and
                // this arm never runs while that holds
                None => {
                    log::debug!("waiter {} no longer enabled, parking again", id);
                    self.pass_baton(&mut state, Some(id));
                }
            }
        }
    }

    /// Locks the state and waits until no waiter holds the baton.
    fn acquire(&self) -> MutexGuard<'_, NetState<P>> {
        let mut state = self.state.lock();
        while state.baton.is_some() {
            self.gate.wait(&mut state);
        }
        state
    }

    fn commit(&self, state: &mut NetState<P>, transition: &Transition<P>) {
        transition.apply(&mut state.marking);
        log::debug!("fired {:?}, marking {:?}", transition, state.marking);
    }

    /// Hands the net lock to a now-satisfiable waiter, or releases it.
    fn pass_baton(&self, state: &mut NetState<P>, skip: Option<WaiterId>) {
        match self.select_waiter(state, skip) {
            Some(position) => {
                let waiter = &state.waiters[position];
                log::debug!("handing net lock to waiter {}", waiter.id);
                if waiter.wake.try_send(()).is_err() {
                    crate::unrecoverable!("wake signal of waiter {} is unusable", waiter.id);
                }
                state.baton = Some(waiter.id);
            }
            None => {
                if state.baton.take().is_some() {
                    self.gate.notify_all();
                }
            }
        }
    }

    fn select_waiter(&self, state: &NetState<P>, skip: Option<WaiterId>) -> Option<usize> {
        let mut satisfiable = state
            .waiters
            .iter()
            .enumerate()
            .filter(|(_, waiter)| Some(waiter.id) != skip)
            .filter(|(_, waiter)| first_enabled(&waiter.candidates, &state.marking).is_some())
            .map(|(position, _)| position);
        if self.fair {
            satisfiable.next()
        } else {
            satisfiable.choose(&mut rand::rng())
        }
    }

    /// Deregisters a cancelled waiter, forwarding the baton if it held it.
    fn withdraw(&self, state: &mut NetState<P>, id: WaiterId) {
        remove_waiter(state, id);
        log::debug!("waiter {} cancelled", id);
        if state.baton == Some(id) {
            self.pass_baton(state, None);
        }
    }
}

impl<P: PlaceKey> fmt::Debug for Net<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Net")
            .field("fair", &self.fair)
            .field("marking", &state.marking)
            .field("waiting", &state.waiters.len())
            .field("baton", &state.baton)
            .finish()
    }
}

fn first_enabled<'a, P: PlaceKey>(
    candidates: &'a [Transition<P>],
    marking: &Marking<P>,
) -> Option<&'a Transition<P>> {
    let found = candidates.iter().find(|t| t.is_enabled(marking));
    log::trace!(
        "scanned {} candidate(s) against {:?}: {:?}",
        candidates.len(),
        marking,
        found
    );
    found
}

fn remove_waiter<P: PlaceKey>(state: &mut NetState<P>, id: WaiterId) {
    match state.waiters.iter().position(|waiter| waiter.id == id) {
        Some(position) => {
            state.waiters.remove(position);
        }
        None => crate::unrecoverable!("waiter {} missing from the queue", id),
    }
}

fn park(woken: &Receiver<()>, token: Option<&CancelToken>) -> Wakeup {
    let handed_off = match token {
        Some(token) => crossbeam_channel::select! {
            recv(woken) -> msg => msg.is_ok(),
            recv(token.receiver()) -> _ => return Wakeup::Cancelled,
        },
        None => woken.recv().is_ok(),
    };
    if !handed_off {
        crate::unrecoverable!("wake signal dropped while its waiter was parked");
    }
    Wakeup::HandOff
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::util::wait_until;

    const PATIENCE: Duration = Duration::from_secs(5);

    fn mv(name: &str, from: &'static str, to: &'static str) -> Transition<&'static str> {
        Transition::builder(name)
            .input(from, 1)
            .output(to, 1)
            .build()
            .unwrap()
    }

    #[test]
    fn empty_candidate_set_fails_immediately() {
        let net: Net<&str> = Net::new([("a", 1)], true);
        assert_eq!(net.fire(&[]), Err(FireError::EmptyCandidateSet));
        assert_eq!(net.snapshot(), Marking::from([("a", 1)]));
    }

    #[test]
    fn first_enabled_in_caller_order_wins() {
        let net = Net::new([("a", 1), ("b", 1)], false);
        let from_a = mv("from_a", "a", "c");
        let from_b = mv("from_b", "b", "c");

        let fired = net.fire(&[from_b.clone(), from_a.clone()]).unwrap();
        assert_eq!(fired, from_b);
        let fired = net.fire(&[from_b.clone(), from_a.clone()]).unwrap();
        assert_eq!(fired, from_a);
        assert_eq!(net.snapshot(), Marking::from([("c", 2)]));
    }

    #[test]
    fn snapshot_is_a_detached_copy() {
        let net = Net::new([("a", 2)], true);
        let before = net.snapshot();
        net.fire(&[mv("t", "a", "b")]).unwrap();
        assert_eq!(before.tokens(&"a"), 2);
        assert_eq!(net.snapshot().tokens(&"a"), 1);
    }

    #[test]
    fn blocked_fire_resumes_after_progress() {
        let net = Arc::new(Net::new([("a", 0)], true));
        let consume = mv("consume", "a", "done");
        let produce = Transition::builder("produce").output("a", 1).build().unwrap();

        let waiter = {
            let net = Arc::clone(&net);
            let consume = consume.clone();
            thread::spawn(move || net.fire(&[consume]))
        };
        assert!(wait_until(PATIENCE, || net.waiting() == 1));

        assert_eq!(net.fire(&[produce.clone()]).unwrap(), produce);
        assert_eq!(waiter.join().unwrap().unwrap(), consume);
        assert_eq!(net.waiting(), 0);
        assert_eq!(net.snapshot(), Marking::from([("done", 1)]));
    }

    #[test]
    fn cancelled_wait_deregisters_and_applies_nothing() {
        let net = Arc::new(Net::new([("a", 0)], true));
        let token = CancelToken::new();
        let waiter = {
            let net = Arc::clone(&net);
            let token = token.clone();
            thread::spawn(move || net.fire_cancellable(&[mv("t", "a", "b")], &token))
        };
        assert!(wait_until(PATIENCE, || net.waiting() == 1));

        token.cancel();
        assert_eq!(waiter.join().unwrap(), Err(FireError::CancelledWait));
        assert_eq!(net.waiting(), 0);

        // the net is still usable afterwards
        let produce = Transition::builder("produce").output("a", 1).build().unwrap();
        net.fire(&[produce]).unwrap();
        net.fire(&[mv("t", "a", "b")]).unwrap();
        assert_eq!(net.snapshot(), Marking::from([("b", 1)]));
    }

    #[test]
    fn pre_cancelled_token_never_fires() {
        let net = Net::new([("a", 1)], true);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            net.fire_cancellable(&[mv("t", "a", "b")], &token),
            Err(FireError::CancelledWait)
        );
        assert_eq!(net.snapshot(), Marking::from([("a", 1)]));
    }

    #[test]
    fn overflowing_output_waits_instead_of_corrupting() {
        let net = Arc::new(Net::new([("a", 1), ("p", u64::MAX)], true));
        let token = CancelToken::new();
        let waiter = {
            let net = Arc::clone(&net);
            let token = token.clone();
            thread::spawn(move || net.fire_cancellable(&[mv("fill", "a", "p")], &token))
        };
        assert!(wait_until(PATIENCE, || net.waiting() == 1));

        token.cancel();
        assert_eq!(waiter.join().unwrap(), Err(FireError::CancelledWait));
        assert_eq!(net.snapshot(), Marking::from([("a", 1), ("p", u64::MAX)]));
    }

    #[test]
    fn fair_net_serves_waiters_in_arrival_order() {
        const WAITERS: usize = 4;
        let places = ["done0", "done1", "done2", "done3"];
        let net = Arc::new(Net::new([("go", 0)], true));
        let produce = Transition::builder("go").output("go", 1).build().unwrap();

        let mut handles = Vec::new();
        for (i, &done) in places.iter().enumerate() {
            let worker = Arc::clone(&net);
            let consume = mv(done, "go", done);
            handles.push(thread::spawn(move || worker.fire(&[consume])));
            assert!(wait_until(PATIENCE, || net.waiting() == i + 1));
        }

        for served in 1..=WAITERS {
            net.fire(&[produce.clone()]).unwrap();
            assert!(wait_until(PATIENCE, || net.waiting() == WAITERS - served));
            let marking = net.snapshot();
            for (i, done) in places.iter().enumerate() {
                assert_eq!(marking.tokens(done), u64::from(i < served), "after {served} tokens");
            }
        }

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    }

    #[test]
    fn hand_off_skips_unsatisfiable_waiters() {
        let net = Arc::new(Net::new([], true));
        let needs_x = mv("needs_x", "x", "got_x");
        let needs_y = mv("needs_y", "y", "got_y");

        let first = {
            let net = Arc::clone(&net);
            thread::spawn(move || net.fire(&[needs_x]))
        };
        assert!(wait_until(PATIENCE, || net.waiting() == 1));
        let second = {
            let net = Arc::clone(&net);
            thread::spawn(move || net.fire(&[needs_y]))
        };
        assert!(wait_until(PATIENCE, || net.waiting() == 2));

        let give_y = Transition::builder("give_y").output("y", 1).build().unwrap();
        net.fire(&[give_y]).unwrap();
        second.join().unwrap().unwrap();
        assert_eq!(net.waiting(), 1);

        let give_x = Transition::builder("give_x").output("x", 1).build().unwrap();
        net.fire(&[give_x]).unwrap();
        first.join().unwrap().unwrap();
        assert_eq!(net.snapshot(), Marking::from([("got_x", 1), ("got_y", 1)]));
    }

    #[test]
    fn reachable_does_not_touch_live_marking() {
        let net = Net::new([("a", 2)], false);
        let states = net.reachable(&[mv("t", "a", "b")]);
        assert_eq!(states.len(), 3);
        assert_eq!(net.snapshot(), Marking::from([("a", 2)]));
    }
}
