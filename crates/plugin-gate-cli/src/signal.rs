//! SIGINT/SIGTERM handling for long-running commands.
//!
//! Installing the handlers replaces the default disposition, so a signal no
//! longer kills the process. It raises a flag instead, and the command stops
//! at its next checkpoint and runs its own cleanup.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

/// Installs SIGINT and SIGTERM handlers that raise the returned flag.
///
/// On unix the handlers are registered before this returns, so a signal
/// delivered right after the call is never lost.
pub fn install_interrupt_flag() -> io::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    #[cfg(unix)]
    let (mut sigint, mut sigterm) = {
        use tokio::signal::unix::{signal, SignalKind};
        let _guard = runtime.enter();
        (
            signal(SignalKind::interrupt())?,
            signal(SignalKind::terminate())?,
        )
    };

    let raised = Arc::clone(&flag);
    thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                #[cfg(unix)]
                {
                    tokio::select! {
                        _ = sigint.recv() => {
                            warn!("received SIGINT, stopping after the current step");
                        }
                        _ = sigterm.recv() => {
                            warn!("received SIGTERM, stopping after the current step");
                        }
                    }
                }

                #[cfg(not(unix))]
                {
                    let _ = tokio::signal::ctrl_c().await;
                    warn!("received Ctrl+C, stopping after the current step");
                }
            });
            raised.store(true, Ordering::SeqCst);
        })?;

    debug!("interrupt handlers installed");
    Ok(flag)
}
