//! Error module. See the [error-chain](https://crates.io/crates/error-chain) crate for details.

#![allow(deprecated)]

error_chain! {
    foreign_links {
        Docopt(::docopt::Error);
        Io(::std::io::Error);
        Nix(::nix::Error);
        Readline(::rustyline::error::ReadlineError);
    }

    errors {
        /// Malformed input line, e.g. a misplaced background marker
        Syntax(message: String) {
            description("syntax error")
            display("syntax error: {}", message)
        }
        /// A pipeline stage without any words, e.g. `ls | | sort`
        EmptyCommand {
            description("missing command")
            display("syntax error: missing command in pipeline")
        }
        /// An OS call needed to build or wait on a job failed
        Resource(operation: &'static str, errno: ::nix::Error) {
            description("resource error")
            display("{}: {}", operation, errno)
        }
        /// A builtin command failed; `code` becomes its exit status
        BuiltinCommand(message: String, code: i32) {
            description("builtin command failed")
            display("{}", message)
        }
        /// A forked child could not replace itself with the program
        Launch(program: String, errno: ::nix::Error) {
            description("failed to launch program")
            display("{}: {}", program, errno)
        }
    }
}

impl Error {
    pub(crate) fn syntax<T: AsRef<str>>(message: T) -> Error {
        ErrorKind::Syntax(message.as_ref().to_string()).into()
    }

    pub(crate) fn builtin_command<T: AsRef<str>>(message: T, code: i32) -> Error {
        ErrorKind::BuiltinCommand(message.as_ref().to_string(), code).into()
    }
}

/// Adapter for `map_err` naming the OS operation that failed.
pub(crate) fn resource(operation: &'static str) -> impl FnOnce(::nix::Error) -> Error {
    move |errno| ErrorKind::Resource(operation, errno).into()
}
