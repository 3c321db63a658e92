//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Browse a directory as a lazily loaded tree with a single selection
#[derive(Parser, Debug)]
#[command(name = "treeview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Turn debugging information on (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Generate shell completions and exit
    #[arg(long = "generate", value_enum)]
    pub generator: Option<clap_complete::Shell>,

    /// Directory holding a local .treeview.toml (default: the browsed directory)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the outline of a directory
    Show {
        /// Directory to browse
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,

        /// Levels to load below the root
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },

    /// Select an entry and print the outline expanded along it
    Select {
        /// Directory to browse
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,

        /// Entry path relative to the directory
        path: PathBuf,
    },

    /// Print the effective settings as TOML
    Config,
}
