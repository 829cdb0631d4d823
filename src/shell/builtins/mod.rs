//! smsh builtins
//!
//! Commands the shell runs itself instead of forking. They are only
//! recognised as the sole command of a line, never as a pipeline stage.

use std::process::ExitStatus;

use crate::{
    errors::{Error, ErrorKind, Result},
    shell::Shell,
    util::SmshExitStatusExt,
};

use self::dirs::Cd;
use self::env::CheckEnv;
use self::exit::Exit;

mod dirs;
mod env;
mod exit;

const CD_NAME: &str = "cd";
const CHECK_ENV_NAME: &str = "checkEnv";
const EXIT_NAME: &str = "exit";

/// Exit status of a builtin invoked with bad arguments.
const USAGE_EXIT_STATUS: i32 = 2;

/// Represents an smsh builtin command such as cd.
pub trait BuiltinCommand {
    /// The NAME of the command.
    const NAME: &'static str;
    /// The help string to display to the user. Its first line is the synopsis.
    const HELP: &'static str;
    /// The usage string to display to the user.
    fn usage() -> &'static str {
        Self::HELP.lines().next().unwrap_or(Self::HELP)
    }
    /// Runs the command with the operands following its name in the `shell`
    /// environment.
    fn run(shell: &mut Shell, args: &[String]) -> Result<()>;
}

pub type Handler = fn(&mut Shell, &[String]) -> Result<()>;

const BUILTINS: [(&str, Handler); 3] = [
    (EXIT_NAME, Exit::run),
    (CD_NAME, Cd::run),
    (CHECK_ENV_NAME, CheckEnv::run),
];

/// Finds the handler registered under exactly `name`.
pub fn lookup(name: &str) -> Option<Handler> {
    BUILTINS
        .iter()
        .find(|&&(builtin, _)| builtin == name)
        .map(|&(_, handler)| handler)
}

/// Returns (`exit_status_code`, `builtin_result`)
pub fn run(handler: Handler, shell: &mut Shell, args: &[String]) -> (ExitStatus, Result<()>) {
    let result = handler(shell, args);
    let exit_status = get_builtin_exit_status(&result);
    (exit_status, result)
}

fn get_builtin_exit_status(result: &Result<()>) -> ExitStatus {
    let status = if let Err(ref e) = *result {
        match *e.kind() {
            ErrorKind::BuiltinCommand(_, code) => code,
            _ => 1,
        }
    } else {
        0
    };

    ExitStatus::from_status(status)
}

/// Error for a builtin invoked with operands it does not accept.
fn usage_error<B: BuiltinCommand>() -> Error {
    Error::builtin_command(
        format!("{}: usage: {}", B::NAME, B::usage()),
        USAGE_EXIT_STATUS,
    )
}
