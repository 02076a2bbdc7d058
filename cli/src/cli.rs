use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "apigraph")]
/// ApiGraph command line tool and SPARQL micro-service gateway
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the ApiGraph HTTP server
    Serve {
        /// The TOML configuration file of the gateway
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// Host and port to listen to
        #[arg(short, long, default_value = "localhost:7878", value_hint = ValueHint::Hostname)]
        bind: String,
        /// Allows cross-origin requests
        #[arg(long)]
        cors: bool,
    },
    /// Load the configuration and every service descriptor, then exit
    ///
    /// The graph store is queried for the services described by a graph.
    Check {
        /// The TOML configuration file of the gateway
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
    },
}
