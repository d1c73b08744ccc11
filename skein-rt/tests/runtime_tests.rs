//! Runtime invariants: single activation, request bijection, timer
//! ordering, and shutdown quiescence.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use skein_rt::prelude::*;
use skein_rt::InMemoryMonitor;
use skein_rt::RuntimeEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Ping;
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Go;
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Plus;
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Tick;

fn test_system(workers: usize) -> ActorSystem {
    let config = SystemConfig::builder()
        .with_workers(workers)
        .with_shutdown_grace(Duration::from_secs(3))
        .build()
        .unwrap();
    ActorSystem::new(config).unwrap()
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// At most one worker executes a given actor at any moment: a non-atomic
/// read-modify-write inside the handler never loses increments, and the
/// handler is never observed re-entered.
#[test]
fn single_activation_under_parallel_senders() {
    let system = test_system(4);
    let counter = Arc::new(AtomicU64::new(0));
    let in_handler = Arc::new(AtomicBool::new(false));
    let violated = Arc::new(AtomicBool::new(false));

    let c = Arc::clone(&counter);
    let busy = Arc::clone(&in_handler);
    let bad = Arc::clone(&violated);
    let actor = system
        .spawn(move |_| {
            let c = Arc::clone(&c);
            let busy = Arc::clone(&busy);
            let bad = Arc::clone(&bad);
            Behavior::new().on(move |_, (_,): (Ping,)| {
                if busy.swap(true, Ordering::SeqCst) {
                    bad.store(true, Ordering::SeqCst);
                }
                // Deliberately racy increment; only single activation keeps
                // it exact.
                let value = c.load(Ordering::SeqCst);
                std::hint::spin_loop();
                c.store(value + 1, Ordering::SeqCst);
                busy.store(false, Ordering::SeqCst);
            })
        })
        .unwrap();

    const SENDERS: usize = 8;
    const PER_SENDER: u64 = 500;
    let mut threads = Vec::new();
    for _ in 0..SENDERS {
        let actor = actor.clone();
        threads.push(std::thread::spawn(move || {
            for _ in 0..PER_SENDER {
                actor.send(payload!(Ping)).unwrap();
            }
        }));
    }
    for t in threads {
        t.join().unwrap();
    }

    let expected = SENDERS as u64 * PER_SENDER;
    assert!(wait_until(Duration::from_secs(10), || {
        counter.load(Ordering::SeqCst) == expected
    }));
    assert!(!violated.load(Ordering::SeqCst), "handler was re-entered");

    system.shutdown().unwrap();
}

/// Every request resolves exactly once: success or error, never both,
/// never zero.
#[test]
fn request_response_bijection() {
    let system = test_system(2);
    let successes = Arc::new(AtomicUsize::new(0));
    let timeouts = Arc::new(AtomicUsize::new(0));
    let other_errors = Arc::new(AtomicUsize::new(0));

    let adder = system
        .spawn(|_| Behavior::new().on(|_, (_, x, y): (Plus, i64, i64)| (x + y,)))
        .unwrap();
    // Matches the request but never answers, forcing the timeout path.
    let silent = system
        .spawn(|_| Behavior::new().on(|_, (_, _x, _y): (Plus, i64, i64)| None::<Payload>))
        .unwrap();

    const ROUNDS: usize = 50;
    let s = Arc::clone(&successes);
    let t = Arc::clone(&timeouts);
    let o = Arc::clone(&other_errors);
    let requester = system
        .spawn(move |_| {
            let adder = adder.clone();
            let silent = silent.clone();
            let s = Arc::clone(&s);
            let t = Arc::clone(&t);
            let o = Arc::clone(&o);
            Behavior::new().on(move |ctx, (_,): (Go,)| {
                for n in 0..ROUNDS as i64 {
                    let s = Arc::clone(&s);
                    ctx.request(
                        &adder,
                        payload!(Plus, n, n),
                        Duration::from_secs(2),
                        move |_, result| {
                            let expected = 2 * n;
                            match result {
                                Ok(p) if p.get::<i64>(0) == Some(&expected) => {
                                    s.fetch_add(1, Ordering::SeqCst);
                                }
                                _ => {}
                            }
                        },
                    );
                    let t = Arc::clone(&t);
                    let o = Arc::clone(&o);
                    ctx.request(
                        &silent,
                        payload!(Plus, n, n),
                        Duration::from_millis(60),
                        move |_, result| match result {
                            Err(RequestError::Timeout) => {
                                t.fetch_add(1, Ordering::SeqCst);
                            }
                            _ => {
                                o.fetch_add(1, Ordering::SeqCst);
                            }
                        },
                    );
                }
            })
        })
        .unwrap();

    requester.send(payload!(Go)).unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        successes.load(Ordering::SeqCst) + timeouts.load(Ordering::SeqCst) == 2 * ROUNDS
    }));
    // Nothing resolves twice.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(successes.load(Ordering::SeqCst), ROUNDS);
    assert_eq!(timeouts.load(Ordering::SeqCst), ROUNDS);
    assert_eq!(other_errors.load(Ordering::SeqCst), 0);

    system.shutdown().unwrap();
}

/// Actions with strictly earlier deadlines fire before later ones.
#[test]
fn delayed_sends_fire_in_deadline_order() {
    let system = test_system(2);
    let order = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&order);
    let collector = system
        .spawn(move |_| {
            let sink = Arc::clone(&sink);
            Behavior::new().on(move |_, (n,): (i64,)| {
                sink.lock().push(n);
            })
        })
        .unwrap();

    let driver = system.scoped();
    driver.delayed_send(&collector, Duration::from_millis(60), payload!(3i64));
    driver.delayed_send(&collector, Duration::from_millis(20), payload!(1i64));
    driver.delayed_send(&collector, Duration::from_millis(40), payload!(2i64));

    assert!(wait_until(Duration::from_secs(2), || order.lock().len() == 3));
    assert_eq!(*order.lock(), vec![1, 2, 3]);

    drop(driver);
    system.shutdown().unwrap();
}

/// Mutating a shared payload never alters another reference's view.
#[test]
fn copy_on_write_isolation_across_actors() {
    let system = test_system(2);
    let views = Arc::new(Mutex::new(Vec::new()));

    let shared = payload!(1i64, 2i64);
    let sink = Arc::clone(&views);
    let mutator = system
        .spawn(move |_| {
            let sink = Arc::clone(&sink);
            Behavior::new().on(move |_, (p,): (Payload,)| {
                let mut mine = p.clone();
                *mine.get_mut::<i64>(0).unwrap() = 999;
                sink.lock().push(mine.get::<i64>(0).copied());
            })
        })
        .unwrap();

    mutator.send(payload!(shared.clone())).unwrap();
    assert!(wait_until(Duration::from_secs(2), || !views.lock().is_empty()));

    assert_eq!(views.lock()[0], Some(999));
    // The original observed no mutation.
    assert_eq!(shared.get::<i64>(0), Some(&1));

    system.shutdown().unwrap();
}

/// After shutdown returns: no actors exist, no timer fires, sends fail.
#[test]
fn shutdown_quiesces_a_ping_storm() {
    let monitor = InMemoryMonitor::new();
    let config = SystemConfig::builder()
        .with_workers(4)
        .with_shutdown_grace(Duration::from_secs(3))
        .build()
        .unwrap();
    let system = ActorSystem::with_monitor(config, Arc::new(monitor.clone())).unwrap();

    const ACTORS: usize = 100;
    let peers: Arc<Mutex<Vec<ActorHandle>>> = Arc::new(Mutex::new(Vec::new()));

    for index in 0..ACTORS {
        let peers_for_actor = Arc::clone(&peers);
        let handle = system
            .spawn(move |_| {
                let peers = Arc::clone(&peers_for_actor);
                Behavior::new().on(move |ctx, (hop,): (i64,)| {
                    let peers = peers.lock();
                    if !peers.is_empty() {
                        let next = &peers[(index + 1) % peers.len()];
                        let _ = ctx.send(next, payload!(hop + 1));
                    }
                })
            })
            .unwrap();
        peers.lock().push(handle);
    }

    // Kick off several ping chains and let them churn.
    {
        let peers = peers.lock();
        for k in 0..10 {
            peers[k * 7 % ACTORS].send(payload!(0i64)).unwrap();
        }
    }
    std::thread::sleep(Duration::from_millis(100));

    // A far-future timer that must never fire once shutdown disposed it.
    let late_fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&late_fired);
    let sentinel = system
        .spawn(move |_| {
            let flag = Arc::clone(&flag);
            Behavior::new().on(move |_, (_,): (Tick,)| {
                flag.store(true, Ordering::SeqCst);
            })
        })
        .unwrap();
    let driver = system.scoped();
    driver.delayed_send(&sentinel, Duration::from_millis(400), payload!(Tick));
    drop(driver);

    let first = peers.lock()[0].clone();
    system.shutdown().unwrap();

    assert_eq!(system.actor_count(), 0);
    assert!(first.is_terminated());
    assert_eq!(first.exit_reason(), Some(ExitReason::UserShutdown));
    assert_eq!(first.send(payload!(0i64)), Err(SendError::Terminated));

    // No timer action fires after shutdown returned.
    std::thread::sleep(Duration::from_millis(500));
    assert!(!late_fired.load(Ordering::SeqCst));

    // The monitor saw the full story.
    assert!(monitor.count_matching(|e| matches!(e, RuntimeEvent::SystemShutdown)) == 1);
    let spawned = monitor.count_matching(|e| matches!(e, RuntimeEvent::ActorSpawned { .. }));
    let terminated =
        monitor.count_matching(|e| matches!(e, RuntimeEvent::ActorTerminated { .. }));
    assert_eq!(spawned, terminated);
}

/// Peers waiting in `await_all_actors_done` wake when the last visible
/// actor leaves.
#[test]
fn await_all_actors_done_unblocks() {
    let system = test_system(2);
    let actor = system
        .spawn(|_| {
            Behavior::new().on(|ctx, (_,): (Ping,)| {
                ctx.quit(ExitReason::Normal);
            })
        })
        .unwrap();

    let waiter_system = system.clone();
    let waiter = std::thread::spawn(move || {
        waiter_system.await_all_actors_done();
    });

    std::thread::sleep(Duration::from_millis(30));
    actor.send(payload!(Ping)).unwrap();
    waiter.join().unwrap();

    system.shutdown().unwrap();
}
