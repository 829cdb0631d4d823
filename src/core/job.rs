use std::{fmt, process::ExitStatus};

use nix::unistd::Pid;

/// What the shell waits on for a job.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobId {
    /// A single command; wait on exactly this process.
    Pid(Pid),
    /// A pipeline; wait on every member of the group.
    ProcessGroup(Pid),
}

impl JobId {
    /// The pid (or group leader) reported to the user.
    pub fn pid(&self) -> Pid {
        match *self {
            JobId::Pid(pid) | JobId::ProcessGroup(pid) => pid,
        }
    }

    /// The first argument to `waitpid(2)` that covers the whole job.
    pub fn wait_target(&self) -> Pid {
        match *self {
            JobId::Pid(pid) => pid,
            JobId::ProcessGroup(pgid) => Pid::from_raw(-pgid.as_raw()),
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pid())
    }
}

/// A launched job.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Job {
    id: JobId,
    /// Process whose exit status becomes the job's
    last_stage: Pid,
    foreground: bool,
}

impl Job {
    pub fn new(id: JobId, last_stage: Pid, foreground: bool) -> Self {
        Self {
            id,
            last_stage,
            foreground,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn last_stage(&self) -> Pid {
        self.last_stage
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }
}

/// State of the current job as seen by the prompt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobState {
    Idle,
    ForegroundRunning(Job),
    BackgroundRunning(Job),
}

impl JobState {
    pub fn launch(self, job: Job) -> Self {
        if job.is_foreground() {
            JobState::ForegroundRunning(job)
        } else {
            JobState::BackgroundRunning(job)
        }
    }

    /// The job with `id` has been reaped (or killed and reaped).
    pub fn complete(self, id: JobId) -> Self {
        match self {
            JobState::ForegroundRunning(job) | JobState::BackgroundRunning(job)
                if job.id() == id =>
            {
                JobState::Idle
            }
            state => state,
        }
    }

    pub fn foreground_job(&self) -> Option<Job> {
        match *self {
            JobState::ForegroundRunning(job) => Some(job),
            _ => None,
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Idle
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            JobState::Idle => write!(f, "Idle"),
            JobState::ForegroundRunning(job) => write!(f, "ForegroundRunning({})", job.id()),
            JobState::BackgroundRunning(job) => write!(f, "BackgroundRunning({})", job.id()),
        }
    }
}

/// How waiting on a foreground job ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitOutcome {
    Completed(ExitStatus),
    /// The job was cancelled by an interrupt; no elapsed time is reported.
    Interrupted,
}
