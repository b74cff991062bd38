//! Cooperative cancellation of a running solve.
//!
//! A [`CancelFlag`] is a shared atomic polled at the start of every residual
//! evaluation. The process-wide registration slot lets an OS signal handler
//! reach the flag of whichever solve is active; a [`CancelGuard`] scopes the
//! registration and restores the previous one on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe from any thread, including signal-handler
    /// contexts that only touch atomics.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn active_slot() -> &'static Mutex<Option<CancelFlag>> {
    static SLOT: OnceLock<Mutex<Option<CancelFlag>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Cancel whichever flag is currently registered. Returns whether a flag was
/// registered. Called by the binary's interrupt handler.
pub fn trigger_active() -> bool {
    match active_slot().lock() {
        Ok(slot) => match slot.as_ref() {
            Some(flag) => {
                flag.cancel();
                true
            }
            None => false,
        },
        Err(_) => false,
    }
}

/// RAII registration of a flag as the process-wide active one.
///
/// Dropping the guard restores whatever registration was in place before, so
/// nested solves and early returns both unwind correctly.
#[derive(Debug)]
pub struct CancelGuard {
    previous: Option<CancelFlag>,
}

impl CancelGuard {
    pub fn install(flag: &CancelFlag) -> Self {
        let previous = match active_slot().lock() {
            Ok(mut slot) => slot.replace(flag.clone()),
            Err(_) => None,
        };
        Self { previous }
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = active_slot().lock() {
            *slot = self.previous.take();
        }
    }
}
