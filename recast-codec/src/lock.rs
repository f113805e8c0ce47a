//! Process-wide lock manager for the codec library's critical sections.
//!
//! The library keeps global state in its container probing and codec
//! registration paths; those are not safe to enter from two pipelines at
//! once. The dispatcher installs a [`LockManager`] before the first
//! pipeline runs and uninstalls it after the last one stops. The adapter
//! routes its non-reentrant sequences (`open_input`, `find_stream_info`,
//! output-context construction) through [`library_section`], which acquires
//! the manager's shared mutex for the duration of the returned guard.
//!
//! The manager speaks a four-verb protocol over opaque mutex handles so
//! that every lock it hands out is created, obtained, released and
//! destroyed through the same dispatch point.

use parking_lot::lock_api::RawMutex as _;
use parking_lot::{Mutex, RawMutex};
use std::sync::Arc;

/// The four verbs of the mutex protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOp {
    Create,
    Obtain,
    Release,
    Destroy,
}

/// Opaque handle to a manager-owned mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHandle(usize);

/// Dispatches the four-verb mutex protocol over a table of handles.
pub struct LockManager {
    mutexes: Mutex<Vec<Option<Arc<RawMutex>>>>,
}

impl LockManager {
    fn new() -> Self {
        Self {
            mutexes: Mutex::new(Vec::new()),
        }
    }

    /// Execute one verb. `Create` ignores the incoming handle and returns a
    /// fresh one; the other verbs act on the given handle and return it
    /// unchanged (`Destroy` invalidates it).
    pub fn dispatch(&self, op: LockOp, handle: Option<LockHandle>) -> Option<LockHandle> {
        match op {
            LockOp::Create => {
                let mut table = self.mutexes.lock();
                table.push(Some(Arc::new(RawMutex::INIT)));
                Some(LockHandle(table.len() - 1))
            }
            LockOp::Obtain => {
                let handle = handle?;
                let mutex = self.mutexes.lock().get(handle.0).cloned().flatten()?;
                mutex.lock();
                Some(handle)
            }
            LockOp::Release => {
                let handle = handle?;
                let mutex = self.mutexes.lock().get(handle.0).cloned().flatten()?;
                // The guard protocol guarantees the caller holds the lock.
                unsafe { mutex.unlock() };
                Some(handle)
            }
            LockOp::Destroy => {
                let handle = handle?;
                let mut table = self.mutexes.lock();
                if let Some(slot) = table.get_mut(handle.0) {
                    *slot = None;
                }
                None
            }
        }
    }

    /// Number of live mutex handles.
    pub fn live_handles(&self) -> usize {
        self.mutexes.lock().iter().filter(|m| m.is_some()).count()
    }
}

struct Installed {
    manager: Arc<LockManager>,
    shared: LockHandle,
}

static INSTALLED: Mutex<Option<Installed>> = Mutex::new(None);

/// Fallback serialization when no manager is installed (single-pipeline
/// use of the adapter outside a dispatcher).
static FALLBACK: RawMutex = RawMutex::INIT;

/// Install a fresh lock manager process-wide and create its shared handle.
/// Returns the manager so the host can inspect it; installing twice
/// replaces the previous manager.
pub fn install() -> Arc<LockManager> {
    let manager = Arc::new(LockManager::new());
    let shared = manager
        .dispatch(LockOp::Create, None)
        .expect("create always yields a handle");
    *INSTALLED.lock() = Some(Installed {
        manager: Arc::clone(&manager),
        shared,
    });
    manager
}

/// Uninstall the process-wide lock manager, destroying its shared handle.
/// Callers must ensure no pipeline is still running.
pub fn uninstall() {
    if let Some(installed) = INSTALLED.lock().take() {
        installed
            .manager
            .dispatch(LockOp::Destroy, Some(installed.shared));
    }
}

/// Guard over the library-wide critical section.
pub struct LibraryGuard {
    held: Option<(Arc<LockManager>, LockHandle)>,
}

impl Drop for LibraryGuard {
    fn drop(&mut self) {
        match self.held.take() {
            Some((manager, handle)) => {
                manager.dispatch(LockOp::Release, Some(handle));
            }
            None => unsafe { FALLBACK.unlock() },
        }
    }
}

/// Enter the library-wide critical section for the lifetime of the guard.
///
/// Taken around `open_input`/`find_stream_info` and output-context
/// construction; never held during the demux/encode loop.
pub fn library_section() -> LibraryGuard {
    let held = {
        let installed = INSTALLED.lock();
        installed
            .as_ref()
            .map(|i| (Arc::clone(&i.manager), i.shared))
    };
    match held {
        Some((manager, handle)) => {
            manager.dispatch(LockOp::Obtain, Some(handle));
            LibraryGuard {
                held: Some((manager, handle)),
            }
        }
        None => {
            FALLBACK.lock();
            LibraryGuard { held: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    // Install/uninstall touch process state; keep those tests serial.
    static TEST_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn test_create_obtain_release_destroy() {
        let manager = LockManager::new();
        let handle = manager.dispatch(LockOp::Create, None).unwrap();
        assert_eq!(manager.live_handles(), 1);

        assert!(manager.dispatch(LockOp::Obtain, Some(handle)).is_some());
        assert!(manager.dispatch(LockOp::Release, Some(handle)).is_some());

        assert!(manager.dispatch(LockOp::Destroy, Some(handle)).is_none());
        assert_eq!(manager.live_handles(), 0);

        // Verbs on a destroyed handle are no-ops, not crashes.
        assert!(manager.dispatch(LockOp::Obtain, Some(handle)).is_none());
    }

    #[test]
    fn test_library_section_serializes() {
        let _serial = TEST_GUARD.lock();
        install();

        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _guard = library_section();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        uninstall();
    }

    #[test]
    fn test_fallback_guard_without_manager() {
        let _serial = TEST_GUARD.lock();
        uninstall();
        let guard = library_section();
        drop(guard);
    }
}
