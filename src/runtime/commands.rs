use std::fmt;

use clap::Subcommand;

use crate::command;

///////////////////////////////
/// Possible subcommands to parse
#[derive(Subcommand)]
pub enum Commands {
    /// Collapse tagged long reads into molecules and isoforms, then classify and validate them
    Collapse(command::CollapseCMD),
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cmd = match self {
            Commands::Collapse(_) => "Collapse",
        };
        write!(f, "{}", cmd)
    }
}
