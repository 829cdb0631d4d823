//! The interactive loop and the shell state it drives.
//!
//! Each line goes through the same steps whether it came from the prompt, a
//! script or `-c`: parse, dispatch to a builtin or the executor, then wait for
//! the foreground job if one was launched.

use std::env;
use std::fmt;
use std::fs;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::process::{self, ExitStatus};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use nix::sys::signal::Signal;

use crate::{
    core::{job::WaitOutcome, parser},
    editor::Editor,
    errors::Result,
    util,
};

use self::job_control::JobManager;
use self::signals::BlockedSignals;

mod builtins;
pub mod execute_command;
pub mod job_control;
pub mod signals;

const HISTORY_FILE_NAME: &str = ".smsh_history";
const HOME_MARKER: &str = "~";

/// Policy object to control a Shell's behavior
#[derive(Debug, Copy, Clone)]
pub struct ShellConfig {
    /// Determines if new command entries will be added to the shell's command history.
    ///
    /// Note: This is checked before the other command history config fields.
    enable_command_history: bool,

    /// Number of entries to store in the shell's command history
    command_history_capacity: usize,

    /// Determines if the shell takes control of its terminal when it has one.
    claim_terminal: bool,

    /// Determines if some messages (e.g. "exit", elapsed time) should be displayed.
    display_messages: bool,
}

impl ShellConfig {
    /// Creates an interactive shell, e.g. command history, job control
    ///
    /// # Complete List
    /// - Command History is enabled
    /// - The terminal is claimed if standard input is one
    /// - Elapsed time, job completion and exit messages are displayed
    pub fn interactive(command_history_capacity: usize) -> Self {
        Self {
            enable_command_history: true,
            command_history_capacity,
            claim_terminal: true,
            display_messages: true,
        }
    }

    /// Creates a noninteractive shell, e.g. no command history, no job control
    ///
    /// # Complete List
    /// - Command History is disabled
    /// - The terminal and its foreground process group are left alone
    /// - Fewer messages are displayed
    pub fn noninteractive() -> Self {
        Default::default()
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            enable_command_history: false,
            command_history_capacity: 0,
            claim_terminal: false,
            display_messages: false,
        }
    }
}

pub struct Shell {
    /// Responsible for readline and history.
    editor: Editor,
    history_file: Option<PathBuf>,
    job_manager: JobManager,
    config: ShellConfig,
    /// Is `false` if standard input is not a terminal, if the config says to
    /// leave the terminal alone or if initializing job control fails.
    is_interactive: bool,
    /// Terminal lent to foreground jobs. A shell that did not claim its
    /// terminal still lends it when it is already in the foreground.
    terminal: Option<RawFd>,
}

impl Shell {
    /// Installs the signal handlers and, when running on a terminal, takes
    /// control of it.
    pub fn new(config: ShellConfig) -> Result<Self> {
        signals::install_handlers()?;

        let mut shell = Self {
            editor: Editor::with_capacity(config.command_history_capacity),
            history_file: None,
            job_manager: Default::default(),
            config,
            is_interactive: config.claim_terminal && util::isatty(),
            terminal: None,
        };

        let terminal = util::get_terminal();
        if shell.is_interactive {
            let result = job_control::initialize_job_control(terminal);
            if let Err(e) = result {
                error!(
                    "failed to initialize shell for job control despite isatty: {}",
                    e
                );
                shell.is_interactive = false;
            }
        }
        shell.terminal = if shell.is_interactive {
            Some(terminal)
        } else {
            job_control::foreground_terminal(terminal)
        };

        if config.enable_command_history {
            shell.load_history()?
        }

        info!("smsh started up");
        Ok(shell)
    }

    fn load_history(&mut self) -> Result<()> {
        self.history_file = dirs::home_dir().map(|p| p.join(HISTORY_FILE_NAME));
        if let Some(ref history_file) = self.history_file {
            self.editor.load_history(history_file)?;
        } else {
            warn!("unable to get home directory")
        }

        Ok(())
    }

    /// Custom prompt to output to the user.
    /// Returns `None` when end of file is reached.
    fn prompt(&mut self) -> Result<Option<String>> {
        let cwd = env::current_dir()
            .map(|cwd| abbreviate_home(&cwd, dirs::home_dir().as_deref()))
            .unwrap_or_else(|_| String::from("?"));
        let prompt = format!("{} $ ", cwd);
        self.editor.readline(&prompt)
    }

    /// Runs one line of input.
    ///
    /// Parse and launch errors are reported to the user and are not returned;
    /// they only abandon this line.
    pub fn execute_command_string(&mut self, input: &str) -> Result<()> {
        self.run_line(input).map(|_| ())
    }

    /// Returns the outcome of the foreground job the line launched, if any.
    fn run_line(&mut self, input: &str) -> Result<Option<WaitOutcome>> {
        // An interrupt with no job outstanding only redraws the prompt
        signals::clear_interrupt();

        let started = {
            let _blocked = BlockedSignals::new(&[Signal::SIGINT])?;

            let command_list = match parser::parse(input) {
                Ok(command_list) => command_list,
                Err(e) => {
                    eprintln!("smsh: {}", e);
                    return Ok(None);
                }
            };
            if command_list.is_empty() {
                return Ok(None);
            }

            if self.config.enable_command_history {
                self.editor.add_history_entry(input.trim());
            }

            debug!("executing: {}", command_list);
            let started = Instant::now();
            if let Err(e) = execute_command::execute(self, command_list) {
                eprintln!("smsh: {}", e);
                return Ok(None);
            }
            started
        };

        Ok(self.wait_for_foreground_job(started))
    }

    fn wait_for_foreground_job(&mut self, started: Instant) -> Option<WaitOutcome> {
        let job = self.job_manager.foreground_job()?;

        let terminal = self.job_terminal(true);
        match self.job_manager.wait_for_job(job, terminal) {
            Ok(outcome) => {
                info!("job {} finished: {:?}", job.id(), outcome);
                if self.config.display_messages {
                    println!("{}", completion_notice(&outcome, started.elapsed()));
                }
                Some(outcome)
            }
            Err(e) => {
                eprintln!("smsh: {}", e);
                None
            }
        }
    }

    pub fn execute_commands_from_file(&mut self, path: &Path) -> Result<()> {
        let buffer = fs::read_to_string(path)?;
        for line in buffer.lines() {
            self.execute_command_string(line)?;
            self.notify_completed_jobs();
        }

        Ok(())
    }

    pub fn execute_from_stdin(&mut self) {
        loop {
            self.notify_completed_jobs();

            let input = match self.prompt() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("prompt: {}", e);
                    eprintln!("smsh: {}", e);
                    break;
                }
            };

            let temp_result = self.execute_command_string(&input);
            log_if_err!(temp_result, "execute_command_string");
        }
    }

    /// Reaps finished background jobs and reports each as `<pid> done`.
    fn notify_completed_jobs(&mut self) {
        if !signals::take_child_exited() || !self.job_manager.has_background_jobs() {
            return;
        }

        for id in self.job_manager.reap_background_jobs() {
            if self.config.display_messages {
                println!("{} done", id);
            }
        }
    }

    /// Saves the history and terminates the shell process with `status`.
    pub fn exit(&mut self, status: ExitStatus) -> ! {
        if self.config.display_messages {
            println!("exit");
        }

        if self.config.enable_command_history {
            if let Some(ref history_file) = self.history_file {
                if let Err(e) = self.editor.save_history(history_file) {
                    error!(
                        "error: failed to save history to file during shutdown: {}",
                        e
                    );
                }
            }
        }

        info!("smsh has shut down");
        process::exit(status.code().unwrap_or(1));
    }

    pub fn is_interactive(&self) -> bool {
        self.is_interactive
    }

    pub fn job_manager(&self) -> &JobManager {
        &self.job_manager
    }

    pub fn job_manager_mut(&mut self) -> &mut JobManager {
        &mut self.job_manager
    }
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (interactive: {})\n{:?}",
            self.job_manager.state(),
            self.is_interactive,
            self.editor
        )
    }
}

/// Line printed once a foreground job is done. An interrupted job gets a bare
/// line break to move past the echoed `^C`.
fn completion_notice(outcome: &WaitOutcome, elapsed: Duration) -> String {
    match *outcome {
        WaitOutcome::Completed(_) => format!("{} ms", elapsed.as_millis()),
        WaitOutcome::Interrupted => String::new(),
    }
}

/// Renders `cwd` for the prompt, with `home` shortened to `~`.
fn abbreviate_home(cwd: &Path, home: Option<&Path>) -> String {
    match home.and_then(|home| cwd.strip_prefix(home).ok()) {
        Some(rel) if rel.as_os_str().is_empty() => HOME_MARKER.to_string(),
        Some(rel) => Path::new(HOME_MARKER).join(rel).display().to_string(),
        None => cwd.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::util::SmshExitStatusExt;
    use nix::sys::pthread;
    use std::thread;
    use tempdir::TempDir;

    fn test_shell() -> Shell {
        Shell::new(ShellConfig::noninteractive()).unwrap()
    }

    #[test]
    fn test_abbreviate_home() {
        let home = Path::new("/home/user");
        assert_eq!("~", abbreviate_home(home, Some(home)));
        assert_eq!(
            "~/src/smsh",
            abbreviate_home(Path::new("/home/user/src/smsh"), Some(home))
        );
        assert_eq!("/tmp", abbreviate_home(Path::new("/tmp"), Some(home)));
        assert_eq!(
            "/home/username",
            abbreviate_home(Path::new("/home/username"), Some(home))
        );
        assert_eq!("/home/user", abbreviate_home(home, None));
    }

    #[test]
    fn test_config_presets() {
        let interactive = ShellConfig::interactive(1000);
        assert!(interactive.enable_command_history);
        assert_eq!(1000, interactive.command_history_capacity);
        assert!(interactive.display_messages);
        assert!(interactive.claim_terminal);

        let noninteractive = ShellConfig::noninteractive();
        assert!(!noninteractive.enable_command_history);
        assert!(!noninteractive.display_messages);
        assert!(!noninteractive.claim_terminal);
    }

    #[test]
    fn test_noninteractive_shell_leaves_terminal_alone() {
        let _lock = test_support::lock();
        assert!(!test_shell().is_interactive());
    }

    #[test]
    fn test_foreground_line_leaves_shell_idle() {
        let _lock = test_support::lock();
        let mut shell = test_shell();
        shell.execute_command_string("true | false").unwrap();
        assert!(shell.job_manager().foreground_job().is_none());
        assert!(!shell.job_manager().has_background_jobs());
    }

    #[test]
    fn test_rejected_lines_do_not_launch_jobs() {
        let _lock = test_support::lock();
        let mut shell = test_shell();
        for line in &["", "   ", "ls & sort", "ls | | sort", "| |"] {
            shell.execute_command_string(line).unwrap();
            assert!(shell.job_manager().foreground_job().is_none());
            assert!(!shell.job_manager().has_background_jobs());
        }
    }

    #[test]
    fn test_background_line_returns_before_job_finishes() {
        let _lock = test_support::lock();
        let mut shell = test_shell();
        let started = Instant::now();
        shell.execute_command_string("sleep 1 &").unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(shell.job_manager().has_background_jobs());

        while shell.job_manager().has_background_jobs()
            && started.elapsed() < Duration::from_secs(10)
        {
            std::thread::sleep(Duration::from_millis(50));
            shell.job_manager_mut().reap_background_jobs();
        }
        assert!(!shell.job_manager().has_background_jobs());
    }

    #[test]
    fn test_completion_notice() {
        let completed = WaitOutcome::Completed(ExitStatus::from_status(3));
        assert_eq!("250 ms", completion_notice(&completed, Duration::from_millis(250)));
        assert_eq!(
            "",
            completion_notice(&WaitOutcome::Interrupted, Duration::from_millis(250))
        );
    }

    #[test]
    fn test_interrupted_line_gets_no_elapsed_time() {
        let _lock = test_support::lock();
        let mut shell = test_shell();
        signals::clear_interrupt();

        let shell_thread = pthread::pthread_self();
        let interrupter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            pthread::pthread_kill(shell_thread, Signal::SIGINT).unwrap();
        });

        let started = Instant::now();
        let outcome = shell.run_line("sleep 5").unwrap();
        interrupter.join().unwrap();

        assert_eq!(Some(WaitOutcome::Interrupted), outcome);
        assert!(started.elapsed() < Duration::from_secs(4));
        let notice = completion_notice(&outcome.unwrap(), started.elapsed());
        assert!(!notice.contains("ms"));
        assert!(shell.job_manager().foreground_job().is_none());
    }

    #[test]
    fn test_interrupt_without_job_is_forgotten() {
        let _lock = test_support::lock();
        let mut shell = test_shell();
        signals::request_interrupt();

        // Nothing was running, so the next line is not cancelled
        assert_eq!(None, shell.run_line("").unwrap());
        signals::request_interrupt();
        assert_eq!(
            Some(WaitOutcome::Completed(ExitStatus::from_success())),
            shell.run_line("true").unwrap()
        );
    }

    #[test]
    fn test_commands_from_file() {
        let _lock = test_support::lock();
        let dir = TempDir::new("smsh-script").unwrap();
        let marker = dir.path().join("marker");
        let script = dir.path().join("script");
        fs::write(
            &script,
            format!("true\n\nls | | sort\ntouch {}\n", marker.display()),
        )
        .unwrap();

        let mut shell = test_shell();
        shell.execute_commands_from_file(&script).unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn test_missing_script_is_an_error() {
        let _lock = test_support::lock();
        let dir = TempDir::new("smsh-script").unwrap();
        let mut shell = test_shell();
        assert!(shell
            .execute_commands_from_file(&dir.path().join("missing"))
            .is_err());
    }
}
