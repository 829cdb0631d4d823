use std::fmt;

/// One program invocation, e.g. `ls -l`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    /// `args[0]` is the program or builtin name.
    pub args: Vec<String>,
}

impl Command {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Arguments after the program name.
    pub fn operands(&self) -> &[String] {
        self.args.get(1..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

/// Commands joined by pipes, run together as one job.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    pub commands: Vec<Command>,
    /// Run the job in the background, defaults to false
    pub background: bool,
}

impl CommandList {
    pub fn new(commands: Vec<Command>, background: bool) -> Self {
        Self {
            commands,
            background,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Display for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<String> = self.commands.iter().map(ToString::to_string).collect();
        write!(f, "{}", stages.join(" | "))?;
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}
