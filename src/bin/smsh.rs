use std::path::{Path, PathBuf};
use std::process::{self, ExitStatus};

use docopt::Docopt;
use log::{debug, error};
use nix::unistd::Pid;
use serde_derive::Deserialize;

use smsh::errors::*;
use smsh::{Shell, ShellConfig, SmshExitStatusExt};

const COMMAND_HISTORY_CAPACITY: usize = 1000;
const LOG_FILE_NAME: &str = ".smsh_log";

const USAGE: &str = "
smsh.

Usage:
    smsh [options]
    smsh [options] -c <command>
    smsh [options] <file>
    smsh (-h | --help)
    smsh --version

Options:
    -h --help       Show this screen.
    --version       Show version.
    -c              If the -c option is present, then commands are read from the first non-option
                        argument command_string.
    --log=<path>    File to write log to, defaults to ~/.smsh_log
";

/// Docopts input arguments.
#[derive(Debug, Deserialize)]
struct Args {
    arg_command: Option<String>,
    arg_file: Option<String>,
    flag_version: bool,
    flag_c: bool,
    flag_log: Option<String>,
}

fn main() {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    if let Err(e) = init_logger(&args.flag_log) {
        eprintln!("smsh: warning: logging disabled: {}", e);
    }
    debug!("{:?}", args);

    if args.flag_version {
        println!("smsh version {}", env!("CARGO_PKG_VERSION"));
    } else if args.flag_c {
        // docopt only accepts -c together with <command>
        execute_from_command_string(args.arg_command.as_deref().unwrap_or_default());
    } else if let Some(ref file_path) = args.arg_file {
        execute_from_file(Path::new(file_path));
    } else {
        execute_from_stdin();
    }
}

fn init_logger(path: &Option<String>) -> Result<()> {
    let log_path = match path.clone().map(PathBuf::from).or_else(default_log_path) {
        Some(log_path) => log_path,
        None => return Err("unable to get home directory".into()),
    };

    let pid = Pid::this();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                pid,
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(fern::log_file(log_path)?)
        .apply()
        .chain_err(|| "failed to install logger")?;
    Ok(())
}

fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(LOG_FILE_NAME))
}

fn execute_from_command_string(command: &str) -> ! {
    let mut shell = create_shell(ShellConfig::noninteractive());
    let result = shell.execute_command_string(command);
    exit(result, &mut shell);
}

fn execute_from_file(path: &Path) -> ! {
    let mut shell = create_shell(ShellConfig::noninteractive());
    let result = shell.execute_commands_from_file(path);
    exit(result, &mut shell);
}

fn execute_from_stdin() -> ! {
    let mut shell = create_shell(ShellConfig::interactive(COMMAND_HISTORY_CAPACITY));
    shell.execute_from_stdin();
    shell.exit(ExitStatus::from_success())
}

fn create_shell(config: ShellConfig) -> Shell {
    Shell::new(config).unwrap_or_else(|e| display_error_and_exit(&e))
}

fn display_error_and_exit(error: &Error) -> ! {
    error!("failed to create shell: {}", error);
    eprintln!("smsh: {}", error);
    process::exit(ExitStatus::from_failure().code().unwrap_or(1));
}

fn exit(result: Result<()>, shell: &mut Shell) -> ! {
    if let Err(e) = result {
        error!("{}", e);
        eprintln!("smsh: {}", e);
        shell.exit(ExitStatus::from_failure());
    } else {
        shell.exit(ExitStatus::from_success());
    }
}
