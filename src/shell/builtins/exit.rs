use std::process::ExitStatus;

use log::info;
use nix::{
    sys::signal::{self, Signal},
    unistd::{self, Pid},
};

use crate::{
    errors::Result,
    shell::{
        builtins::{self, BuiltinCommand},
        signals, Shell,
    },
    util::SmshExitStatusExt,
};

pub struct Exit;

impl BuiltinCommand for Exit {
    const NAME: &'static str = builtins::EXIT_NAME;

    const HELP: &'static str = "\
exit
    Terminate every job and exit the shell with a status of 0.";

    fn run(shell: &mut Shell, _args: &[String]) -> Result<()> {
        // Terminated children are discarded by the kernel from here on
        signals::ignore(Signal::SIGCHLD)?;
        signals::ignore(Signal::SIGTERM)?;

        info!("exit: terminating outstanding jobs");
        shell.job_manager().signal_all(Signal::SIGTERM);

        // Only signal our own process group if we lead it
        if unistd::getpgrp() == Pid::this() {
            let temp_result = signal::kill(Pid::from_raw(0), Signal::SIGTERM);
            log_if_err!(temp_result, "failed to signal shell process group");
        }

        shell.exit(ExitStatus::from_success())
    }
}
