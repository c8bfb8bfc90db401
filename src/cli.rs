// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shellfs")]
#[command(about = "Browse and change a remote file tree over SSH")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: discover shellfs.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON lines instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new shellfs.yml configuration file
    Init {
        /// Target as user@host[:port]
        #[arg(long)]
        host: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Run one or more shell commands on the remote host
    Exec {
        /// Report each command's exit status
        #[arg(short, long)]
        status: bool,

        /// Commands to run, in order
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// List a remote directory
    Ls {
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        #[arg(default_value = ".")]
        path: String,
    },

    /// Show attributes of a remote path
    Stat { path: String },

    /// Create a remote directory and any missing parents
    Mkdir { path: String },

    /// Remove a remote path recursively
    Rm { path: String },

    /// Change permissions of a remote path
    Chmod {
        /// Octal mode, e.g. 644
        mode: String,
        path: String,
    },

    /// Copy a remote path to the local disk
    Get { remote: String, local: String },

    /// Copy a local path to the remote host
    Put { local: String, remote: String },

    /// Connect and print the host key fingerprint
    Fingerprint,
}
