// Entry point for the meshcoin CLI: key generation and an in-process
// multi-node mining simulation.
use clap::Parser;
use log::{error, info, LevelFilter};
use meshcoin::{Command, Node, Opt, PeerRegistry, Wallet, GLOBAL_CONFIG};
use serde_json::json;
use std::process;
use std::sync::Arc;

fn main() {
    // Info level gives enough detail to follow mining and sync without
    // drowning in per-message noise.
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Keygen => {
            let wallet = Wallet::new()?;
            println!("Your new address: {}", wallet.address());
        }
        Command::Simulate {
            nodes,
            blocks,
            difficulty,
            json,
        } => {
            if nodes == 0 {
                return Err("Need at least one node".into());
            }
            let difficulty = difficulty.unwrap_or_else(|| GLOBAL_CONFIG.get_initial_difficulty());
            run_simulation(nodes, blocks, difficulty, json)?;
        }
    }
    Ok(())
}

/// Spin up `node_count` nodes over one in-process registry, mine `blocks`
/// blocks round-robin with a transfer before each, and print the final
/// state. Every node ends on the same chain or the run errors out.
fn run_simulation(
    node_count: usize,
    blocks: usize,
    difficulty: u32,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(PeerRegistry::new());
    let mut nodes: Vec<Node> = (0..node_count)
        .map(|_| Node::new(Arc::clone(&registry), difficulty))
        .collect::<meshcoin::Result<_>>()?;

    // Full mesh, then initial sync. Each node starts on its own genesis;
    // the first mined block forces everyone onto one chain through the
    // query-all reconciliation path.
    let ids: Vec<_> = nodes.iter().map(|n| n.id()).collect();
    for node in nodes.iter_mut() {
        for id in &ids {
            node.add_peer(*id);
        }
    }
    for node in &nodes {
        node.start_sync();
    }
    drain_network(&mut nodes);

    for round in 0..blocks {
        let miner = round % node_count;

        // A transfer ahead of each block once the miner has funds to move.
        let recipient = nodes[(miner + 1) % node_count].address();
        if node_count > 1 && nodes[miner].balance() >= 10 {
            nodes[miner].send_coins(&recipient, 10)?;
            drain_network(&mut nodes);
        }

        let block = nodes[miner].mine_block()?;
        info!("Round {round}: node {miner} mined {}", block.get_hash());
        drain_network(&mut nodes);
    }

    let tip = nodes[0].blockchain().latest_block().get_hash().to_string();
    for node in &nodes {
        if node.blockchain().latest_block().get_hash() != tip {
            return Err(format!("{} failed to converge", node.id()).into());
        }
    }

    if as_json {
        let state: Vec<_> = nodes
            .iter()
            .map(|node| {
                json!({
                    "node": node.id().to_string(),
                    "address": node.address(),
                    "balance": node.balance(),
                    "height": node.blockchain().height(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("Converged chain:");
        print!("{}", nodes[0].blockchain());
        for node in &nodes {
            println!(
                "{}: address {} balance {}",
                node.id(),
                node.address(),
                node.balance()
            );
        }
    }
    Ok(())
}

/// Keep handing every node its queued events until the whole network goes
/// quiet. Terminates because each processed message generates at most one
/// follow-up query.
fn drain_network(nodes: &mut [Node]) {
    loop {
        let mut processed = 0;
        for node in nodes.iter_mut() {
            processed += node.process_pending();
        }
        if processed == 0 {
            break;
        }
    }
}
