// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: A single-purpose daemon: flags only, no subcommands.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Per-tenant container gateway for Outline MCP backends")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (default: ./berth.yml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, overriding the configured value
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
