use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::{
    errors::{Error, Result},
    shell::{
        builtins::{self, BuiltinCommand},
        Shell,
    },
};

const HOME_MARKER: &str = "~";

pub struct Cd;

impl BuiltinCommand for Cd {
    const NAME: &'static str = builtins::CD_NAME;

    const HELP: &'static str = "\
cd [dir]
    Change the current directory to DIR. The default DIR is the value of the
    HOME shell variable. A leading ~ in DIR is replaced by HOME.";

    fn run(_shell: &mut Shell, args: &[String]) -> Result<()> {
        // Operands are never options, so `cd -foo` enters `-foo`
        let dir = match args {
            [] => home_dir()?,
            [dir] if dir.starts_with(HOME_MARKER) => {
                let mut expanded = OsString::from(home_dir()?);
                expanded.push(&dir[HOME_MARKER.len()..]);
                PathBuf::from(expanded)
            }
            [dir] => PathBuf::from(dir),
            _ => return Err(builtins::usage_error::<Self>()),
        };

        log::debug!("cd: changing directory to {}", dir.display());
        env::set_current_dir(&dir).map_err(|e| {
            Error::builtin_command(format!("cd: {}: {}", dir.display(), e), 1)
        })
    }
}

fn home_dir() -> Result<PathBuf> {
    ::dirs::home_dir().ok_or_else(|| Error::builtin_command("cd: HOME not set", 1))
}
