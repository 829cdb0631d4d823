use crate::{
    core::parser::{Command, CommandList},
    errors::Result,
    shell::{
        builtins::{self, BuiltinCommand},
        execute_command::{self, PAGER_STAGE},
        Shell,
    },
};

pub struct CheckEnv;

impl BuiltinCommand for CheckEnv {
    const NAME: &'static str = builtins::CHECK_ENV_NAME;

    const HELP: &'static str = "\
checkEnv [grep-args ...]
    Page through the sorted environment. Any arguments are handed to grep to
    filter the listing first.";

    fn run(shell: &mut Shell, args: &[String]) -> Result<()> {
        let command_list = environment_listing(args);
        log::debug!("checkEnv: running `{}`", command_list);
        execute_command::execute(shell, command_list)?;
        Ok(())
    }
}

/// `printenv [| grep args..] | sort | pager`
fn environment_listing(args: &[String]) -> CommandList {
    let mut commands = vec![Command::new(vec!["printenv"])];
    if !args.is_empty() {
        commands.push(Command::new(
            Some("grep".to_string()).into_iter().chain(args.iter().cloned()),
        ));
    }
    commands.push(Command::new(vec!["sort"]));
    commands.push(Command::new(vec![PAGER_STAGE]));
    CommandList::new(commands, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::WaitOutcome;
    use crate::shell::{signals, ShellConfig};
    use crate::test_support;
    use crate::util::SmshExitStatusExt;
    use std::env;
    use std::process::ExitStatus;

    #[test]
    fn test_listing_without_pattern() {
        assert_eq!(
            "printenv | sort | pager",
            environment_listing(&[]).to_string()
        );
    }

    #[test]
    fn test_listing_passes_every_argument_to_grep() {
        let args = vec!["-i".to_string(), "path".to_string()];
        let listing = environment_listing(&args);
        assert_eq!("printenv | grep -i path | sort | pager", listing.to_string());
        assert!(!listing.background);
    }

    #[test]
    fn test_check_env_runs_as_foreground_job() {
        let _lock = test_support::lock();
        signals::clear_interrupt();
        let previous = env::var_os("PAGER");
        env::set_var("PAGER", "true");

        let mut shell = Shell::new(ShellConfig::noninteractive()).unwrap();
        let result = CheckEnv::run(&mut shell, &["PAGER".to_string()]);
        let job = shell.job_manager().foreground_job();
        let outcome = job.map(|job| shell.job_manager_mut().wait_for_job(job, None).unwrap());

        match previous {
            Some(value) => env::set_var("PAGER", value),
            None => env::remove_var("PAGER"),
        }
        result.unwrap();
        assert_eq!(
            Some(WaitOutcome::Completed(ExitStatus::from_success())),
            outcome
        );
    }
}
