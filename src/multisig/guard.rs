//! Per-wallet call serialization and reentrancy exclusion
//!
//! Every mutating wallet call runs inside a [`CallGuard`] scope. The
//! guard records which thread owns the wallet for the duration of the
//! call:
//! - a call from another thread waits until the owner leaves, so calls
//!   against one wallet never interleave;
//! - a call from the owning thread can only come from the external
//!   action a finalize is performing, and is rejected.
//!
//! External actions additionally run under the registry's
//! [`ExecutionLock`]. It is taken before any wallet guard, so nested calls
//! between wallets cannot wait on each other in a cycle, and nothing else
//! can move funds while an action may still need to be reversed.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Busy flag for one wallet
#[derive(Debug, Default)]
pub struct CallGuard {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

/// Returned by [`CallGuard::enter`] when the current thread already holds
/// the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reentered;

impl CallGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the wallet busy until the returned scope is dropped
    pub fn enter(&self) -> Result<CallScope<'_>, Reentered> {
        let me = thread::current().id();
        let mut owner = self.owner();

        loop {
            let current = *owner;
            match current {
                None => {
                    *owner = Some(me);
                    return Ok(CallScope { guard: self });
                }
                Some(current) if current == me => return Err(Reentered),
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self) -> bool {
        self.owner().is_some()
    }
}

/// Scope of one mutating call; releases the guard on drop, including
/// on early returns and panics
#[derive(Debug)]
pub struct CallScope<'a> {
    guard: &'a CallGuard,
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        *self.guard.owner() = None;
        self.guard.released.notify_one();
    }
}

/// Registry-wide lock held for the whole of every finalize
///
/// Re-entrant per thread: nested finalizes performed by an outer action
/// only deepen the hold.
#[derive(Debug, Default)]
pub struct ExecutionLock {
    holder: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

impl ExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn holder(&self) -> MutexGuard<'_, Option<(ThreadId, usize)>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until no other thread holds the lock
    pub fn acquire(&self) -> ExecutionScope<'_> {
        let me = thread::current().id();
        let mut holder = self.holder();

        loop {
            let current = *holder;
            match current {
                None => {
                    *holder = Some((me, 1));
                    break;
                }
                Some((owner, depth)) if owner == me => {
                    *holder = Some((owner, depth + 1));
                    break;
                }
                Some(_) => {
                    holder = self
                        .released
                        .wait(holder)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        ExecutionScope { lock: self }
    }
}

/// One level of an [`ExecutionLock`] hold
#[derive(Debug)]
pub struct ExecutionScope<'a> {
    lock: &'a ExecutionLock,
}

impl Drop for ExecutionScope<'_> {
    fn drop(&mut self) {
        let mut holder = self.lock.holder();
        let current = *holder;
        match current {
            Some((owner, depth)) if depth > 1 => *holder = Some((owner, depth - 1)),
            _ => {
                *holder = None;
                drop(holder);
                self.lock.released.notify_all();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_enter_and_release() {
        let guard = CallGuard::new();
        assert!(!guard.is_busy());

        {
            let _scope = guard.enter().unwrap();
            assert!(guard.is_busy());
        }

        assert!(!guard.is_busy());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn test_same_thread_reentry_rejected() {
        let guard = CallGuard::new();
        let _scope = guard.enter().unwrap();

        assert_eq!(guard.enter().unwrap_err(), Reentered);
        // The failed attempt must not release the outer scope
        assert!(guard.is_busy());
    }

    #[test]
    fn test_other_threads_are_serialized() {
        let guard = Arc::new(CallGuard::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let guard = guard.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _scope = guard.enter().unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!guard.is_busy());
    }

    #[test]
    fn test_execution_lock_reenters_on_same_thread() {
        let lock = ExecutionLock::new();
        let outer = lock.acquire();
        let inner = lock.acquire();
        drop(inner);
        let held = *lock.holder();
        assert_eq!(held.map(|(_, depth)| depth), Some(1));
        drop(outer);
        assert!(lock.holder().is_none());
    }

    #[test]
    fn test_execution_lock_excludes_other_threads() {
        let lock = Arc::new(ExecutionLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _outer = lock.acquire();
                        let _nested = lock.acquire();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(lock.holder().is_none());
    }
}
