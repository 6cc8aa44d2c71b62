//! # CLI Interface
//!
//! Defines the command-line argument structure for `aval-node` using
//! `clap` derive. Supports two subcommands: `run` and `version`.

use clap::{Parser, Subcommand};

/// AVAL Protocol ledger node.
///
/// Hosts the reputation-staking ledger and serves it over HTTP: vouch and
/// unvouch operations, vault and escrow queries, the administrative fee
/// surface, and Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "aval-node",
    about = "AVAL Protocol ledger node",
    version,
    propagate_version = true
)]
pub struct AvalNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the AVAL node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ledger node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Address to bind both listeners on.
    #[arg(long, env = "AVAL_BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Port for the REST API.
    #[arg(long, env = "AVAL_RPC_PORT", default_value_t = 9761)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "AVAL_METRICS_PORT", default_value_t = 9762)]
    pub metrics_port: u16,

    /// Address that receives protocol and exit fees.
    #[arg(long, env = "AVAL_FEE_RECIPIENT", default_value = "aval:treasury")]
    pub fee_recipient: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "AVAL_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}
