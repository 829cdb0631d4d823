//! Turns a parsed `CommandList` into running processes.
//!
//! Stages are forked left to right. Each stage reads from the pipe fed by the
//! previous stage (the first inherits the shell's stdin) and writes into a new
//! pipe (the last inherits the shell's stdout). Redirection happens in the
//! child before `exec`, and the parent closes every pipe end it no longer needs
//! before forking the next stage.

use std::convert::Infallible;
use std::env;
use std::ffi::CString;
use std::fs::File;
use std::iter;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};
use std::process::ExitStatus;

use log::{debug, warn};
use nix::{
    libc,
    unistd::{self, ForkResult, Pid},
};

use crate::{
    core::{
        job::{Job, JobId},
        parser::{Command, CommandList},
    },
    errors::{resource, ErrorKind, Result, ResultExt},
    shell::{builtins, job_control, signals, Shell},
    util::SmshExitStatusExt,
};

/// Stage name replaced at launch by the first pager that starts.
pub const PAGER_STAGE: &str = "pager";
const PAGER_VARIABLE: &str = "PAGER";
const DEFAULT_PAGERS: [&str; 2] = ["less", "more"];

/// Runs `command_list`.
///
/// A lone builtin runs inside the shell and its status is returned; no job is
/// registered. Anything else is launched as a job and recorded in the shell's
/// job manager without waiting: whether to block is the caller's decision,
/// driven by the job's foreground flag.
pub fn execute(shell: &mut Shell, command_list: CommandList) -> Result<ExitStatus> {
    if command_list.is_empty() {
        return Ok(ExitStatus::from_success());
    }
    if command_list.commands.iter().any(Command::is_empty) {
        return Err(ErrorKind::EmptyCommand.into());
    }

    if let [ref command] = command_list.commands[..] {
        if let Some(handler) = command.program().and_then(builtins::lookup) {
            debug!("running builtin: {}", command);
            let (status, result) = builtins::run(handler, shell, command.operands());
            if let Err(e) = result {
                eprintln!("smsh: {}", e);
            }
            return Ok(status);
        }
    }

    let foreground = !command_list.background;
    let terminal = shell.job_terminal(foreground);
    let job = spawn_processes(&command_list, terminal)?;
    shell.job_manager_mut().job_launched(job);
    Ok(ExitStatus::from_success())
}

/// Argument vectors are converted before forking so the child only has to
/// call `exec`.
#[derive(Debug)]
struct Stage {
    /// Programs to try in order; only `pager` has more than one.
    candidates: Vec<Vec<CString>>,
}

impl Stage {
    fn new(command: &Command) -> Result<Self> {
        let operands = command.operands();
        let candidates = if command.program() == Some(PAGER_STAGE) {
            pager_candidates()
                .into_iter()
                .map(|pager| {
                    let words = iter::once(pager.as_str()).chain(operands.iter().map(String::as_str));
                    to_argv(words)
                })
                .collect::<Result<_>>()?
        } else {
            vec![to_argv(command.args.iter().map(String::as_str))?]
        };
        Ok(Self { candidates })
    }
}

fn pager_candidates() -> Vec<String> {
    env::var(PAGER_VARIABLE)
        .ok()
        .filter(|pager| !pager.is_empty())
        .into_iter()
        .chain(DEFAULT_PAGERS.iter().map(|pager| pager.to_string()))
        .collect()
}

fn to_argv<'a, I>(words: I) -> Result<Vec<CString>>
where
    I: IntoIterator<Item = &'a str>,
{
    words
        .into_iter()
        .map(|word| {
            CString::new(word).chain_err(|| {
                ErrorKind::Syntax(format!("argument contains a NUL byte: {:?}", word))
            })
        })
        .collect()
}

/// File descriptors a child wires up before `exec`.
#[derive(Clone, Copy, Debug)]
struct StageIo {
    /// `None` inherits the shell's stdin
    stdin: Option<RawFd>,
    /// `None` inherits the shell's stdout
    stdout: Option<RawFd>,
    /// Read end of the stage's own outgoing pipe
    unused: Option<RawFd>,
}

/// Forks every stage of `command_list` into one process group.
///
/// On failure, stages that were already forked are killed and reaped, and all
/// pipe ends are closed, before the error is returned.
fn spawn_processes(command_list: &CommandList, terminal: Option<RawFd>) -> Result<Job> {
    let stages = command_list
        .commands
        .iter()
        .map(Stage::new)
        .collect::<Result<Vec<_>>>()?;

    let mut pgid = None;
    let result = spawn_stages(&stages, terminal, &mut pgid);
    let last_stage = match result {
        Ok(last_stage) => last_stage,
        Err(e) => {
            if let Some(pgid) = pgid {
                warn!("abandoning partially built job {}", pgid);
                log_if_err!(
                    job_control::cancel_job(JobId::ProcessGroup(pgid)),
                    "failed to clean up job {}",
                    pgid
                );
            }
            if let Some(terminal) = terminal {
                log_if_err!(
                    unistd::tcsetpgrp(terminal, unistd::getpgrp()),
                    "failed to take back terminal"
                );
            }
            return Err(e);
        }
    };

    // `spawn_stages` always forks at least once
    let pgid = pgid.unwrap_or(last_stage);
    let id = if stages.len() == 1 {
        JobId::Pid(pgid)
    } else {
        JobId::ProcessGroup(pgid)
    };
    Ok(Job::new(id, last_stage, !command_list.background))
}

/// Returns the pid of the last stage; `pgid` is set as soon as the first
/// stage exists so the caller can clean up after a failure.
fn spawn_stages(stages: &[Stage], terminal: Option<RawFd>, pgid: &mut Option<Pid>) -> Result<Pid> {
    let mut stdin: Option<File> = None;
    let mut last_stage = None;

    for (index, stage) in stages.iter().enumerate() {
        let is_last = index + 1 == stages.len();
        let (read_end, write_end) = if is_last {
            (None, None)
        } else {
            let (read_end, write_end) = create_pipe()?;
            (Some(read_end), Some(write_end))
        };

        let io = StageIo {
            stdin: stdin.as_ref().map(AsRawFd::as_raw_fd),
            stdout: write_end.as_ref().map(AsRawFd::as_raw_fd),
            unused: read_end.as_ref().map(AsRawFd::as_raw_fd),
        };
        let child = fork_stage(stage, io, *pgid, terminal)?;
        let group = *pgid.get_or_insert(child);

        // Also done by the child; whichever runs first wins the race
        let temp_result = unistd::setpgid(child, group);
        log_if_err!(temp_result, "failed to set pgid ({}) for pid ({})", group, child);

        if let Some(previous) = stdin.take() {
            close(previous)?;
        }
        if let Some(write_end) = write_end {
            close(write_end)?;
        }
        stdin = read_end;
        last_stage = Some(child);
    }

    last_stage.ok_or_else(|| ErrorKind::EmptyCommand.into())
}

fn fork_stage(stage: &Stage, io: StageIo, pgid: Option<Pid>, terminal: Option<RawFd>) -> Result<Pid> {
    match unsafe { unistd::fork() }.map_err(resource("fork"))? {
        ForkResult::Parent { child } => {
            debug!("forked {} for {:?}", child, stage.candidates[0][0]);
            Ok(child)
        }
        ForkResult::Child => {
            match exec_stage(stage, io, pgid, terminal) {
                Ok(never) => match never {},
                Err(e) => eprintln!("smsh: {}", e),
            }
            unsafe { libc::_exit(1) }
        }
    }
}

/// Runs in the forked child; only returns on failure.
fn exec_stage(
    stage: &Stage,
    io: StageIo,
    pgid: Option<Pid>,
    terminal: Option<RawFd>,
) -> Result<Infallible> {
    let pid = unistd::getpid();
    let pgid = pgid.unwrap_or(pid);
    unistd::setpgid(pid, pgid).map_err(resource("setpgid"))?;
    if let Some(terminal) = terminal {
        // The parent does this as well, so a failure here is not fatal
        let _ = unistd::tcsetpgrp(terminal, pgid);
    }
    signals::reset_for_child().map_err(resource("sigaction"))?;

    if let Some(stdin) = io.stdin {
        unistd::dup2(stdin, libc::STDIN_FILENO).map_err(resource("dup2"))?;
        unistd::close(stdin).map_err(resource("close"))?;
    }
    if let Some(stdout) = io.stdout {
        unistd::dup2(stdout, libc::STDOUT_FILENO).map_err(resource("dup2"))?;
        unistd::close(stdout).map_err(resource("close"))?;
    }
    if let Some(unused) = io.unused {
        unistd::close(unused).map_err(resource("close"))?;
    }

    let mut last_error = None;
    for (attempt, argv) in stage.candidates.iter().enumerate() {
        let errno = match unistd::execvp(&argv[0], argv) {
            Ok(never) => match never {},
            Err(errno) => errno,
        };
        let program = argv[0].to_string_lossy().into_owned();
        if attempt + 1 < stage.candidates.len() {
            eprintln!("smsh: {}: {}", program, errno);
        }
        last_error = Some(ErrorKind::Launch(program, errno));
    }

    Err(last_error
        .unwrap_or_else(|| ErrorKind::EmptyCommand)
        .into())
}

/// Wraps `unistd::pipe()` to return RAII structs instead of raw, owning file descriptors
/// Returns (`read_end_pipe`, `write_end_pipe`)
fn create_pipe() -> Result<(File, File)> {
    // Ownership moves into `File` immediately so an early return cannot leak
    // either end.
    let (read_end_pipe, write_end_pipe) = unistd::pipe().map_err(resource("pipe"))?;
    unsafe {
        Ok((
            File::from_raw_fd(read_end_pipe),
            File::from_raw_fd(write_end_pipe),
        ))
    }
}

/// Closes `file`, reporting the failure instead of ignoring it like `Drop`.
fn close(file: File) -> Result<()> {
    unistd::close(file.into_raw_fd()).map_err(resource("close"))
}

impl Shell {
    /// Terminal handed to a job's process group, if the shell may lend one
    /// and the job runs in the foreground.
    pub(crate) fn job_terminal(&self, foreground: bool) -> Option<RawFd> {
        if foreground {
            self.terminal
        } else {
            None
        }
    }
}
