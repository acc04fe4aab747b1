use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "meshcoin")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "keygen", about = "Generate a new wallet and print its address")]
    Keygen,
    #[command(
        name = "simulate",
        about = "Run an in-process multi-node network and mine some blocks"
    )]
    Simulate {
        #[arg(long, default_value_t = 3, help = "Number of nodes in the network")]
        nodes: usize,
        #[arg(long, default_value_t = 5, help = "Number of blocks to mine")]
        blocks: usize,
        #[arg(long, help = "Starting difficulty (leading zero hex digits)")]
        difficulty: Option<u32>,
        #[arg(long, help = "Print the final state as JSON")]
        json: bool,
    },
}
