//! Signal handling for the shell process.
//!
//! Handlers only record that a signal arrived in an atomic flag. The prompt
//! loop and the foreground wait poll those flags at their blocking points, so
//! no output or bookkeeping ever happens inside a handler.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{
    self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};

use crate::errors::{self, ResultExt, Result};

static INTERRUPT_REQUESTED: AtomicBool = AtomicBool::new(false);
static CHILD_EXITED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(signal: libc::c_int) {
    if signal == libc::SIGINT {
        INTERRUPT_REQUESTED.store(true, Ordering::SeqCst);
    } else if signal == libc::SIGCHLD {
        CHILD_EXITED.store(true, Ordering::SeqCst);
    }
}

/// Installs the SIGINT and SIGCHLD handlers.
///
/// SIGINT is installed without `SA_RESTART` so that a blocking read at the
/// prompt returns `EINTR`. SIGCHLD restarts interrupted calls and ignores
/// stopped children.
pub fn install_handlers() -> Result<()> {
    let interrupt = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let child = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );

    unsafe {
        signal::sigaction(Signal::SIGINT, &interrupt).chain_err(|| "sigaction SIGINT")?;
        signal::sigaction(Signal::SIGCHLD, &child).chain_err(|| "sigaction SIGCHLD")?;
    }

    debug!("installed SIGINT and SIGCHLD handlers");
    Ok(())
}

/// Ignore the signals a job-control shell must not be stopped or killed by.
pub fn ignore_job_control_signals() -> Result<()> {
    unsafe {
        for sig in &[
            Signal::SIGQUIT,
            Signal::SIGTSTP,
            Signal::SIGTTIN,
            Signal::SIGTTOU,
        ] {
            signal::signal(*sig, SigHandler::SigIgn)?;
        }
    }
    Ok(())
}

/// Sets `sig` to be ignored by the shell.
pub fn ignore(sig: Signal) -> Result<()> {
    unsafe {
        signal::signal(sig, SigHandler::SigIgn)?;
    }
    Ok(())
}

/// Returns `true` (and clears the flag) if an interrupt arrived since the
/// last call.
pub fn take_interrupt() -> bool {
    INTERRUPT_REQUESTED.swap(false, Ordering::SeqCst)
}

/// Forgets an interrupt that arrived while no job was outstanding.
pub fn clear_interrupt() {
    INTERRUPT_REQUESTED.store(false, Ordering::SeqCst);
}

/// Returns `true` (and clears the flag) if a child changed state since the
/// last call.
pub fn take_child_exited() -> bool {
    CHILD_EXITED.swap(false, Ordering::SeqCst)
}

/// Records an interrupt exactly as the SIGINT handler does.
#[cfg(test)]
pub fn request_interrupt() {
    INTERRUPT_REQUESTED.store(true, Ordering::SeqCst);
}

/// Puts a forked child back into a plain signal state before `exec`.
///
/// Dispositions the shell changed go back to their defaults and the signal
/// mask inherited from a critical section is cleared. SIGTSTP stays ignored:
/// the shell has no way to resume a stopped job.
///
/// Only async-signal-safe calls are made here.
pub fn reset_for_child() -> nix::Result<()> {
    unsafe {
        for sig in &[
            Signal::SIGINT,
            Signal::SIGQUIT,
            Signal::SIGTTIN,
            Signal::SIGTTOU,
            Signal::SIGCHLD,
            Signal::SIGTERM,
        ] {
            signal::signal(*sig, SigHandler::SigDfl)?;
        }
    }
    signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
}

/// RAII critical section: the given signals stay blocked (pending) until the
/// guard is dropped.
#[derive(Debug)]
pub struct BlockedSignals {
    blocked: Vec<Signal>,
    previous: SigSet,
}

impl BlockedSignals {
    pub fn new(signals: &[Signal]) -> Result<Self> {
        let mut set = SigSet::empty();
        for sig in signals {
            set.add(*sig);
        }

        let mut previous = SigSet::empty();
        signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut previous))?;
        trace!("blocked {:?}", signals);
        Ok(Self {
            blocked: signals.to_vec(),
            previous,
        })
    }

    /// Sleeps until a handler runs, with the guarded signals unblocked only
    /// for the duration of the sleep.
    ///
    /// A guarded signal that became pending after the caller last checked its
    /// flag is delivered as soon as the sleep begins, so it cannot be missed.
    pub fn suspend(&self) -> Result<()> {
        let mut mask = self.previous;
        for sig in &self.blocked {
            mask.remove(*sig);
        }

        let res = unsafe { libc::sigsuspend(mask.as_ref()) };
        match Errno::result(res) {
            Ok(_) | Err(Errno::EINTR) => Ok(()),
            Err(e) => Err(errors::resource("sigsuspend")(e)),
        }
    }
}

impl Drop for BlockedSignals {
    fn drop(&mut self) {
        let temp_result =
            signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None);
        log_if_err!(temp_result, "failed to restore signal mask");
    }
}
