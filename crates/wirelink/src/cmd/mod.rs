use clap::{Args, Subcommand};

use crate::exit::CliResult;

pub mod consume;
pub mod produce;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a consumer and send paced blocks of random messages.
    Produce(ProduceArgs),
    /// Accept connections, buffer incoming messages, and drain them.
    Consume(ConsumeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Produce(args) => produce::run(args),
        Command::Consume(args) => consume::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ProduceArgs {
    /// Peer address to connect to.
    pub address: String,
    /// Number of message blocks to send.
    #[arg(long, default_value = "2")]
    pub blocks: u32,
    /// Messages per block.
    #[arg(long, default_value = "1000")]
    pub block_length: u32,
}

#[derive(Args, Debug, Default)]
pub struct ConsumeArgs {}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {}
