use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kinddb")]
#[command(about = "Inspect a kinddb key-value store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding kinddb.json (defaults to the user config dir)
    #[arg(short, long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List stored keys
    #[command(alias = "ls")]
    Keys {
        /// Only keys of this kind
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Print the record stored under a urlsafe key token
    Show {
        token: String,
    },

    /// Build a urlsafe token from kind/id pairs (e.g. Author 7 Post hello)
    Encode {
        #[arg(required = true, num_args = 2..)]
        parts: Vec<String>,
    },

    /// Print the key a urlsafe token stands for
    Decode {
        token: String,
    },

    /// Write a default kinddb.json to the config directory
    Init,
}
