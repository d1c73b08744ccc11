//! The per-worker scheduling loop.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use crossbeam_deque::{Steal, Worker};
use crossbeam_utils::Backoff;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// Layer 3: Internal module imports
use super::pool::{Job, PoolInner, Resumable, SchedulerPolicy};
use crate::actor::lifecycle::RunState;

pub(super) fn worker_loop(index: usize, local: Worker<Job>, inner: &Arc<PoolInner>) {
    inner.install_local(&local);
    let mut rng = SmallRng::seed_from_u64(0x5eed_c0de ^ index as u64);
    let mut backoff = Backoff::new();

    loop {
        match find_job(&local, inner, &mut rng) {
            Some(Job::Terminate) => break,
            Some(Job::Resume(actor)) => {
                backoff.reset();
                run_resumption(actor, inner);
            }
            None => {
                if backoff.is_completed() {
                    inner.idle_wait();
                } else {
                    backoff.snooze();
                }
            }
        }
    }

    // Hand any locally queued work back so peers can finish it.
    while let Some(job) = local.pop() {
        inner.injector.push(job);
    }
    inner.clear_local();
}

/// Search order: local deque (LIFO), global injector, then steal from peers
/// starting at a random victim. The sharing policy uses the injector only.
fn find_job(local: &Worker<Job>, inner: &PoolInner, rng: &mut SmallRng) -> Option<Job> {
    let stealing = inner.policy == SchedulerPolicy::WorkStealing;

    if stealing {
        if let Some(job) = local.pop() {
            return Some(job);
        }
    }

    loop {
        let stolen = if stealing {
            inner.injector.steal_batch_and_pop(local)
        } else {
            inner.injector.steal()
        };
        match stolen {
            Steal::Success(job) => return Some(job),
            Steal::Empty => break,
            Steal::Retry => continue,
        }
    }

    if stealing {
        let count = inner.stealers.len();
        if count > 0 {
            let start = rng.gen_range(0..count);
            for offset in 0..count {
                let stealer = &inner.stealers[(start + offset) % count];
                loop {
                    match stealer.steal() {
                        Steal::Success(job) => return Some(job),
                        Steal::Empty => break,
                        Steal::Retry => continue,
                    }
                }
            }
        }
    }

    None
}

/// The single-activation protocol around one resumption.
///
/// Only the worker that wins scheduled -> running executes the actor. After
/// the resumption, running -> idle publishes the actor's quiescence; if new
/// mail arrived during the run, the same worker immediately re-elects the
/// actor and re-inserts it at the shared end for fairness.
fn run_resumption(actor: Arc<dyn Resumable>, inner: &PoolInner) {
    let ctrl = Arc::clone(actor.control());
    if !ctrl
        .state()
        .transition(RunState::Scheduled, RunState::Running)
    {
        // Terminated between scheduling and execution.
        return;
    }
    actor.resume(inner.throughput);
    if ctrl.state().transition(RunState::Running, RunState::Idle)
        && !ctrl.mailbox.is_empty()
        && ctrl
            .state()
            .transition(RunState::Idle, RunState::Scheduled)
    {
        inner.reinsert(actor);
    }
}
