//! Smsh Parser
//!
//! Input is split on `|` into stages and each stage on whitespace into words.
//! There is no quoting, escaping or expansion.

use log::debug;

pub use self::ast::{Command, CommandList};
use crate::errors::{Error, Result};

pub mod ast;

/// Word that sends the whole job to the background when it ends the line.
pub const BACKGROUND_MARKER: &str = "&";
pub const PIPE: char = '|';

/// Parse `input` into a pipeline.
///
/// A line without any words yields an empty `CommandList`, which callers
/// skip. Stages without words are kept so that dispatch can reject them.
/// The background marker may only be the final word of the line; anywhere
/// else, including before a pipe, the whole line is rejected.
pub fn parse(input: &str) -> Result<CommandList> {
    let mut commands = Vec::new();
    let mut background = false;

    for stage in input.split(PIPE) {
        if background {
            return Err(misplaced_background_marker(&PIPE.to_string()));
        }

        let mut args = Vec::new();
        for word in stage.split_whitespace() {
            if background {
                return Err(misplaced_background_marker(word));
            }

            if word == BACKGROUND_MARKER {
                background = true;
            } else {
                args.push(word.to_string());
            }
        }
        commands.push(Command { args });
    }

    if commands.iter().all(Command::is_empty) {
        commands.clear();
    }

    let command_list = CommandList::new(commands, background);
    debug!("parsed CommandList: {:?}", command_list);
    Ok(command_list)
}

fn misplaced_background_marker(found: &str) -> Error {
    Error::syntax(format!(
        "inaccurate use of background character '{}' ({})",
        BACKGROUND_MARKER, found
    ))
}
