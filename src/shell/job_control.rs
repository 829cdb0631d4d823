use std::os::unix::io::RawFd;
use std::process::ExitStatus;

use log::{debug, error, info, trace, warn};
use nix::{
    errno::Errno,
    libc,
    sys::{
        signal::{self, Signal},
        termios::{self, Termios},
        wait::{self, WaitPidFlag, WaitStatus},
    },
    unistd::{self, Pid},
};

use crate::{
    core::job::{Job, JobId, JobState, WaitOutcome},
    errors::{resource, Result, ResultExt},
    shell::signals::{self, BlockedSignals},
    util::{self, SmshExitStatusExt},
};

/// Makes the shell the foreground process group of `shell_terminal` and
/// ignores the signals a job-control shell must survive.
pub fn initialize_job_control(shell_terminal: RawFd) -> Result<()> {
    // Loop until the shell is in the foreground
    loop {
        let shell_pgid = unistd::getpgrp();
        if unistd::tcgetpgrp(shell_terminal).chain_err(|| "tcgetpgrp")? == shell_pgid {
            break;
        } else {
            signal::kill(
                Pid::from_raw(-libc::pid_t::from(shell_pgid)),
                Signal::SIGTTIN,
            )?;
        }
    }

    signals::ignore_job_control_signals()?;

    // Put ourselves in our own process group; a session leader already is one
    let shell_pgid = Pid::this();
    let temp_result = unistd::setpgid(shell_pgid, shell_pgid);
    log_if_err!(temp_result, "failed to put shell in its own process group");

    // Grab control of the terminal
    let temp_result = unistd::tcsetpgrp(shell_terminal, unistd::getpgrp());
    log_if_err!(temp_result, "failed to grab control of terminal");

    Ok(())
}

/// Returns `terminal` if a shell that did not claim it may still hand it to
/// its foreground jobs, i.e. the shell's process group is already the
/// terminal's foreground group. SIGTTOU is ignored from then on so that the
/// shell can take the terminal back from a background position.
///
/// Without this a job in its own process group would be stopped by SIGTTIN
/// as soon as it read from the terminal.
pub fn foreground_terminal(terminal: RawFd) -> Option<RawFd> {
    if !unistd::isatty(terminal).unwrap_or(false) {
        return None;
    }

    match unistd::tcgetpgrp(terminal) {
        Ok(pgid) if pgid == unistd::getpgrp() => {}
        Ok(pgid) => {
            debug!("terminal belongs to process group {}, leaving it alone", pgid);
            return None;
        }
        Err(e) => {
            debug!("tcgetpgrp: {}", e);
            return None;
        }
    }

    if let Err(e) = signals::ignore(Signal::SIGTTOU) {
        warn!("failed to ignore SIGTTOU, jobs will not get the terminal: {}", e);
        return None;
    }
    Some(terminal)
}

/// Owns the current job state and the background jobs still to be reaped.
#[derive(Debug, Default)]
pub struct JobManager {
    state: JobState,
    background_jobs: Vec<Job>,
}

impl JobManager {
    /// Records a job the executor just launched.
    pub fn job_launched(&mut self, job: Job) {
        debug!(
            "job {} launched in {}",
            job.id(),
            if job.is_foreground() {
                "foreground"
            } else {
                "background"
            }
        );
        if !job.is_foreground() {
            self.background_jobs.push(job);
        }
        self.state = self.state.launch(job);
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn foreground_job(&self) -> Option<Job> {
        self.state.foreground_job()
    }

    pub fn has_background_jobs(&self) -> bool {
        !self.background_jobs.is_empty()
    }

    /// Blocks until every process of `job` has been reaped, or until an
    /// interrupt arrives, in which case the job is killed and reaped before
    /// returning `WaitOutcome::Interrupted`.
    ///
    /// `terminal` is handed to the job's process group for the duration of
    /// the wait. SIGINT and SIGCHLD stay blocked except while the wait is
    /// asleep, so an interrupt cannot slip in between checking for it and
    /// going to sleep.
    pub fn wait_for_job(&mut self, job: Job, terminal: Option<RawFd>) -> Result<WaitOutcome> {
        debug!("waiting for job {} in foreground", job.id());
        let result = {
            let _terminal_state = terminal.map(|fd| TerminalState::new(fd, job.id().pid()));
            BlockedSignals::new(&[Signal::SIGCHLD, Signal::SIGINT])
                .and_then(|blocked| wait_until_reaped(job, &blocked))
        };
        self.state = self.state.complete(job.id());
        result
    }

    /// Reaps background jobs whose processes have all terminated, without
    /// blocking. Returns them in launch order.
    pub fn reap_background_jobs(&mut self) -> Vec<JobId> {
        let mut finished = Vec::new();
        let state = &mut self.state;
        self.background_jobs.retain(|job| {
            if is_reaped(job.id()) {
                finished.push(job.id());
                *state = state.complete(job.id());
                false
            } else {
                true
            }
        });

        if !finished.is_empty() {
            debug!("reaped background jobs: {:?}", finished);
        }
        finished
    }

    /// Sends `sig` to every outstanding job's process group.
    pub fn signal_all(&self, sig: Signal) {
        let foreground = self.state.foreground_job();
        for job in self.background_jobs.iter().chain(foreground.iter()) {
            // Every job leads its own process group
            let temp_result = signal::killpg(job.id().pid(), sig);
            log_if_err!(temp_result, "failed to send {:?} to job {}", sig, job.id());
        }
    }
}

fn wait_until_reaped(job: Job, blocked: &BlockedSignals) -> Result<WaitOutcome> {
    let mut last_status = None;
    loop {
        if signals::take_interrupt() {
            info!("interrupt received, cancelling job {}", job.id());
            cancel_job(job.id())?;
            return Ok(WaitOutcome::Interrupted);
        }

        match wait::waitpid(job.id().wait_target(), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => blocked.suspend()?,
            Ok(wait_status) => {
                trace!("job {}: {:?}", job.id(), wait_status);
                if wait_status.pid() == Some(job.last_stage()) {
                    last_status = Some(wait_status);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => break,
            Err(e) => return Err(resource("waitpid")(e)),
        }
    }

    let outcome = match last_status {
        // Interrupt typed at the terminal while the job owned it
        Some(WaitStatus::Signaled(_, Signal::SIGINT, _)) => WaitOutcome::Interrupted,
        Some(ref wait_status) => WaitOutcome::Completed(
            util::exit_status_of(wait_status).unwrap_or_else(ExitStatus::from_failure),
        ),
        None => {
            warn!("job {} was reaped before its status was seen", job.id());
            WaitOutcome::Completed(ExitStatus::from_success())
        }
    };
    debug!("job {} finished: {:?}", job.id(), outcome);
    Ok(outcome)
}

/// Kills every process of the job and reaps them.
pub(crate) fn cancel_job(id: JobId) -> Result<()> {
    let result = match id {
        JobId::Pid(pid) => signal::kill(pid, Signal::SIGKILL),
        JobId::ProcessGroup(pgid) => signal::killpg(pgid, Signal::SIGKILL),
    };
    match result {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => return Err(resource("kill")(e)),
    }

    loop {
        match wait::waitpid(id.wait_target(), None) {
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(()),
            Err(e) => return Err(resource("waitpid")(e)),
        }
    }
}

/// Collects whatever the job's processes left behind; `true` once none remain.
fn is_reaped(id: JobId) -> bool {
    loop {
        match wait::waitpid(id.wait_target(), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return false,
            Ok(wait_status) => trace!("background job {}: {:?}", id, wait_status),
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return true,
            Err(e) => {
                error!("failed to poll background job {}: {}", id, e);
                return false;
            }
        }
    }
}

/// RAII struct to encapsulate manipulating terminal state.
struct TerminalState {
    terminal: RawFd,
    prev_pgid: Pid,
    prev_tmodes: Option<Termios>,
}

impl TerminalState {
    fn new(terminal: RawFd, new_pgid: Pid) -> TerminalState {
        debug!("setting terminal process group to job's process group");
        let state = TerminalState {
            terminal,
            prev_pgid: unistd::getpgrp(),
            prev_tmodes: termios::tcgetattr(terminal).ok(),
        };
        let temp_result = unistd::tcsetpgrp(terminal, new_pgid);
        log_if_err!(temp_result, "failed to give terminal to {}", new_pgid);
        state
    }
}

impl Drop for TerminalState {
    fn drop(&mut self) {
        debug!("putting shell back into foreground and restoring shell's terminal modes");
        let temp_result = unistd::tcsetpgrp(self.terminal, self.prev_pgid);
        log_if_err!(temp_result, "failed to take back terminal");
        if let Some(ref prev_tmodes) = self.prev_tmodes {
            let temp_result =
                termios::tcsetattr(self.terminal, termios::SetArg::TCSADRAIN, prev_tmodes);
            log_if_err!(
                temp_result,
                "error restoring terminal configuration for shell"
            );
        }
    }
}
