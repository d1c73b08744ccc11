//! Stackful fibres: the cooperative stack-switching primitive.
//!
//! A fibre owns an independent stack and switches control cooperatively with
//! the thread that resumed it. The callee publishes values through a
//! per-thread yield slot; after `resume` returns, the caller sees the
//! published value. Fibres are bound to the thread that last switched into
//! them for the duration of that activation and must never be resumed from
//! two threads at once.
//!
//! The blocking-actor host loop is the only in-tree consumer: the actor body
//! runs inside a fibre and yields park requests while its mailbox is empty.

// Layer 1: Standard library imports
use std::cell::Cell;
use std::time::Instant;

// Layer 2: Third-party crate imports
use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};

// Layer 3: Internal module imports
// (none)

/// Default stack size for fibres.
///
/// Comfortably above typical platform signal-stack recommendations, since
/// user closures run on this stack. The stack is guard-paged by the
/// underlying allocator, so overflow faults instead of corrupting.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Fibre creation failures.
#[derive(Debug, thiserror::Error)]
pub enum FibreError {
    /// Stack allocation failed.
    #[error("failed to allocate fibre stack: {0}")]
    StackAllocation(#[from] std::io::Error),
}

/// A parking request published by a fibre through the yield slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Park {
    /// Park until this instant, or indefinitely when `None`.
    pub deadline: Option<Instant>,
}

/// Outcome of switching into a fibre.
#[derive(Debug)]
pub enum Switch<Y> {
    /// The fibre published a value and suspended.
    Yielded(Y),
    /// The fibre's entry function returned; the fibre is spent.
    Completed,
}

thread_local! {
    // Type-erased pointer to the active fibre's yielder. Valid only while
    // that fibre runs on this thread; reinstalled after every suspension so
    // interleaved fibres on one thread cannot observe each other's slot.
    static CURRENT_SUSPENDER: Cell<Option<*const ()>> = const { Cell::new(None) };
}

/// Whether the current thread is executing inside a fibre.
pub fn in_fibre() -> bool {
    CURRENT_SUSPENDER.with(|c| c.get().is_some())
}

/// Publish `value` in the yield slot and switch back to the caller.
///
/// Returns `false` (dropping the value) when called outside a fibre, or
/// inside a fibre whose yield type differs from `Y` is undefined; the crate
/// only instantiates fibres with [`Park`].
pub fn yield_value<Y: 'static>(value: Y) -> bool {
    CURRENT_SUSPENDER.with(|c| {
        let Some(ptr) = c.get() else {
            return false;
        };
        // The pointer was installed by the fibre body currently executing
        // on this thread, and the yielder it refers to outlives the whole
        // activation.
        let yielder: &Yielder<(), Y> = unsafe { &*(ptr as *const Yielder<(), Y>) };
        yielder.suspend(value);
        // Another fibre may have run on this thread while we were
        // suspended; reinstall our own slot.
        c.set(Some(ptr));
        true
    })
}

/// A cooperative execution context with an independent stack.
pub struct Fibre<Y: 'static> {
    coro: Coroutine<(), Y, ()>,
}

impl<Y: 'static> Fibre<Y> {
    /// Create a fibre running `f` on a default-sized stack.
    ///
    /// The entry function is not invoked until the first [`resume`](Self::resume).
    pub fn new(f: impl FnOnce() + 'static) -> Result<Self, FibreError> {
        Self::with_stack_size(DEFAULT_STACK_SIZE, f)
    }

    /// Create a fibre with an explicit stack size.
    pub fn with_stack_size(size: usize, f: impl FnOnce() + 'static) -> Result<Self, FibreError> {
        let stack = DefaultStack::new(size)?;
        let coro = Coroutine::with_stack(stack, move |yielder: &Yielder<(), Y>, _input: ()| {
            CURRENT_SUSPENDER.with(|c| {
                c.set(Some(yielder as *const Yielder<(), Y> as *const ()));
            });
            f();
            CURRENT_SUSPENDER.with(|c| c.set(None));
        });
        Ok(Self { coro })
    }

    /// Switch into the fibre until it yields or completes.
    ///
    /// Panics raised inside the fibre propagate out of this call after the
    /// fibre's stack has unwound.
    pub fn resume(&mut self) -> Switch<Y> {
        if self.coro.done() {
            return Switch::Completed;
        }
        let result = self.coro.resume(());
        CURRENT_SUSPENDER.with(|c| c.set(None));
        match result {
            CoroutineResult::Yield(value) => Switch::Yielded(value),
            CoroutineResult::Return(()) => Switch::Completed,
        }
    }

    /// Whether the entry function has returned.
    pub fn is_complete(&self) -> bool {
        self.coro.done()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_on_first_resume_only() {
        let mut fibre: Fibre<i32> = Fibre::new(|| {}).unwrap();
        assert!(!fibre.is_complete());
        assert!(matches!(fibre.resume(), Switch::Completed));
        assert!(fibre.is_complete());
        // Resuming a spent fibre is a no-op.
        assert!(matches!(fibre.resume(), Switch::Completed));
    }

    #[test]
    fn test_yield_publishes_values_in_order() {
        let mut fibre: Fibre<i32> = Fibre::new(|| {
            for n in 1..=3 {
                assert!(yield_value(n));
            }
        })
        .unwrap();

        for expected in 1..=3 {
            match fibre.resume() {
                Switch::Yielded(n) => assert_eq!(n, expected),
                Switch::Completed => panic!("completed early"),
            }
        }
        assert!(matches!(fibre.resume(), Switch::Completed));
    }

    #[test]
    fn test_yield_outside_fibre_is_rejected() {
        assert!(!in_fibre());
        assert!(!yield_value(42i32));
    }

    #[test]
    fn test_in_fibre_flag() {
        let mut fibre: Fibre<bool> = Fibre::new(|| {
            yield_value(in_fibre());
        })
        .unwrap();
        match fibre.resume() {
            Switch::Yielded(inside) => assert!(inside),
            Switch::Completed => panic!("expected a yield"),
        }
        // Back on the host side.
        assert!(!in_fibre());
        fibre.resume();
    }

    #[test]
    fn test_interleaved_fibres_keep_their_slots() {
        let mut a: Fibre<i32> = Fibre::new(|| {
            yield_value(1);
            yield_value(2);
        })
        .unwrap();
        let mut b: Fibre<i32> = Fibre::new(|| {
            yield_value(10);
            yield_value(20);
        })
        .unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            if let Switch::Yielded(n) = a.resume() {
                seen.push(n);
            }
            if let Switch::Yielded(n) = b.resume() {
                seen.push(n);
            }
        }
        a.resume();
        b.resume();
        assert_eq!(seen, vec![1, 10, 2, 20]);
    }

    #[test]
    fn test_state_survives_across_switches() {
        let mut fibre: Fibre<i32> = Fibre::new(|| {
            let mut acc = 0;
            for n in 1..=4 {
                acc += n;
                yield_value(acc);
            }
        })
        .unwrap();
        let mut last = 0;
        while let Switch::Yielded(n) = fibre.resume() {
            last = n;
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn test_drop_unfinished_fibre_unwinds_cleanly() {
        struct SetOnDrop(std::sync::Arc<std::sync::atomic::AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let dropped = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&dropped);
        let mut fibre: Fibre<()> = Fibre::new(move || {
            let _guard = SetOnDrop(flag);
            yield_value(());
            yield_value(());
        })
        .unwrap();
        fibre.resume();
        drop(fibre);
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_panic_propagates_to_resumer() {
        let mut fibre: Fibre<()> = Fibre::new(|| panic!("inner failure")).unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fibre.resume()));
        assert!(result.is_err());
    }
}
