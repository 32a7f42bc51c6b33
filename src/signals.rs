//! SIGINT / SIGTERM capture
//!
//! The handler only records the signal number. The orchestrator polls
//! [`take`] between steps and turns a pending signal into a rollback.

use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

static RECEIVED_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn handler(sig: i32) {
    RECEIVED_SIGNAL.store(sig, Ordering::SeqCst);
}

/// Register the recording handler for SIGINT and SIGTERM.
pub fn install_handlers() -> Result<(), nix::Error> {
    let action = SigAction::new(
        SigHandler::Handler(handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only performs an atomic store.
    unsafe {
        signal::sigaction(Signal::SIGINT, &action)?;
        signal::sigaction(Signal::SIGTERM, &action)?;
    }
    Ok(())
}

/// Returns a pending signal number once, clearing it.
pub fn take() -> Option<i32> {
    match RECEIVED_SIGNAL.swap(0, Ordering::AcqRel) {
        0 => None,
        sig => Some(sig),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_records_and_take_clears() {
        take();
        handler(Signal::SIGTERM as i32);
        assert_eq!(take(), Some(15));
        assert_eq!(take(), None);
    }
}
