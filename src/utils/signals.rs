//! Process signals turned into [`ControlEvent`]s.
//!
//! SIGUSR1 (forced refresh) is caught by a handler that only flips an atomic;
//! a bridge thread polls it and forwards the event. SIGINT/SIGTERM go through
//! `ctrlc` and request a shutdown.

use crate::core::ControlEvent;
use crate::error::{RelayError, Result};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

static FORCE_REFRESH: AtomicBool = AtomicBool::new(false);
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

const BRIDGE_POLL: Duration = Duration::from_millis(50);

#[cfg(unix)]
extern "C" fn handle_sigusr1(_: libc::c_int) {
    FORCE_REFRESH.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_sigusr1_handler() -> Result<()> {
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    unsafe {
        let handler = handle_sigusr1 as *const () as libc::sighandler_t;
        if libc::signal(libc::SIGUSR1, handler) == libc::SIG_ERR {
            return Err(RelayError::Signal(
                "failed to install SIGUSR1 handler".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn install_sigusr1_handler() -> Result<()> {
    Ok(())
}

/// Consume a pending refresh request, if any
pub fn take_refresh_request() -> bool {
    FORCE_REFRESH.swap(false, Ordering::SeqCst)
}

/// Install the handlers and start the bridge thread feeding `events`.
///
/// Must be called once, before the generator is spawned, so an early SIGUSR1
/// does not kill the relay with the default action.
pub fn install(events: Sender<ControlEvent>) -> Result<()> {
    install_sigusr1_handler()?;

    let shutdown = events.clone();
    ctrlc::set_handler(move || {
        if SHUTTING_DOWN.swap(true, Ordering::SeqCst) {
            // Second signal while we are still winding down
            std::process::exit(130);
        }
        let _ = shutdown.send(ControlEvent::Shutdown);
    })
    .map_err(|e| RelayError::Signal(e.to_string()))?;

    thread::Builder::new()
        .name("signal-bridge".into())
        .spawn(move || loop {
            thread::sleep(BRIDGE_POLL);
            if take_refresh_request() && events.send(ControlEvent::ForceRefresh).is_err() {
                break;
            }
        })?;

    tracing::debug!("signal handlers installed");
    Ok(())
}
