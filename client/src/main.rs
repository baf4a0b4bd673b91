#![allow(dead_code)]
use std::sync::Arc;
use std::thread;

use anyhow::{format_err, Result};
use clap::Parser;
use colorful::Colorful;
use log::{info, warn};

mod amount;
mod calls;
mod config;
mod error;
mod nft;
mod notify;
mod orchestrator;
mod reader;
mod rpc;
mod state;
#[cfg(test)]
mod testing;

use amount::format_ether;
use config::{load_cfg, ClientConfig};
use nft::{image_url, prepare_mint, sale_status, scan_minted, Filter, Rarity};
use notify::{ConsoleSink, Notifications};
use orchestrator::{FlowState, Orchestrator, PendingTransaction, TxKind};
use reader::{AccountState, ChainReader, OnChainReader, Read};
use rpc::RpcClient;
use state::DerivedState;

#[derive(Debug, Parser)]
pub struct Opts {
    /// Path to the INI configuration.
    #[arg(long, default_value = "client_config.ini")]
    pub config: String,
    #[clap(subcommand)]
    pub command: FluxonCommands,
}

#[derive(Debug, Parser)]
pub enum FluxonCommands {
    /// Print balances, stake, rewards and the pool state once.
    Dashboard {
        #[arg(long)]
        amount: Option<String>,
    },
    /// Keep polling the reward pool and reprint the dashboard.
    Watch {
        #[arg(long)]
        rounds: Option<u64>,
    },
    /// Approve or stake, whichever the current allowance calls for.
    Stake {
        #[arg(long, required_unless_present = "max", conflicts_with = "max")]
        amount: Option<String>,
        #[arg(long)]
        max: bool,
    },
    Unstake {
        #[arg(long)]
        amount: String,
    },
    Claim {},
    SaleStatus {},
    Collection {
        #[arg(long, default_value = "legendary")]
        rarity: Rarity,
        #[arg(long, default_value = "all")]
        filter: Filter,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Mint {
        #[arg(long)]
        token_id: u64,
    },
}

type ConsoleOrchestrator = Orchestrator<Arc<RpcClient>, ConsoleSink>;

fn print_dashboard(cfg: &ClientConfig, reader: &ChainReader, derived: &DerivedState, in_flight: bool) {
    let symbol = &cfg.token_symbol;
    match reader.account().address {
        Some(address) => println!("account        {}", address),
        None => println!("account        {}", "not connected".yellow()),
    }
    println!("wallet         {} {}", derived.display_balance, symbol);
    println!("staked         {} {}", derived.display_staked, symbol);
    println!("rewards        {} {}", derived.display_rewards, symbol);
    println!("reward pool    {} {}", derived.display_pool, symbol);
    if derived.staking_halted() {
        println!(
            "{}",
            "Reward pool is empty or unreadable. Staking is paused.".red()
        );
    }
    println!("action         [{}]", derived.stake_label(symbol, in_flight));
}

fn report(kind_hint: &str, tx: &PendingTransaction) {
    println!("{} {}", kind_hint, tx.hash);
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = Opts::parse();
    let cfg = load_cfg(&opts.config)?;

    let rpc = Arc::new(RpcClient::new(&cfg.http_url, cfg.rpc_timeout, cfg.receipt_poll)?);
    let chain_id = match rpc.chain_id() {
        Ok(id) => id,
        Err(e) => {
            // Reads still work; submissions are refused on the network guard.
            warn!("could not read chain id: {e}");
            0
        }
    };
    if chain_id != cfg.chain_id {
        warn!("connected to chain {} but configured for {}", chain_id, cfg.chain_id);
    }
    let account = AccountState {
        address: cfg.account,
        chain_id,
    };
    info!("using {} on chain {}", cfg.http_url, chain_id);

    let reader = ChainReader::new(
        Arc::new(OnChainReader::new(rpc.clone(), cfg.contracts)),
        account,
    );
    reader.refresh_all();

    let notices = Notifications::new(
        ConsoleSink,
        &cfg.explorer_url,
        &cfg.token_symbol,
        cfg.notice_duration,
    );
    let mut orc: ConsoleOrchestrator =
        Orchestrator::new(rpc.clone(), notices, cfg.contracts, account, cfg.chain_id);

    match opts.command {
        FluxonCommands::Dashboard { amount } => {
            if let Some(amount) = amount {
                orc.set_amount(&amount);
            }
            let derived = orc.derived(&reader);
            print_dashboard(&cfg, &reader, &derived, false);
        }
        FluxonCommands::Watch { rounds } => {
            let poller = reader.spawn_poller(cfg.poll_interval);
            let mut round = 0;
            loop {
                thread::sleep(cfg.poll_interval);
                round += 1;
                println!("--- round {} ---", round);
                print_dashboard(&cfg, &reader, &orc.derived(&reader), false);
                if rounds.is_some_and(|limit| round >= limit) {
                    break;
                }
            }
            poller.stop();
        }
        FluxonCommands::Stake { amount, max } => {
            let amount = if max {
                let balance = reader.snapshots().balance;
                let balance = balance
                    .known()
                    .ok_or_else(|| format_err!("wallet balance is unavailable"))?;
                format_ether(*balance)
            } else {
                amount.unwrap_or_default()
            };
            orc.set_amount(&amount);
            let tx = orc.execute(&reader, |o, r| o.submit_stake(r))?;
            report(if tx.kind == TxKind::Approve { "approved" } else { "staked" }, &tx);
            if matches!(orc.state(), FlowState::Approved { .. }) {
                println!("Allowance granted. Run `stake --amount {}` again to stake.", amount);
            }
            print_dashboard(&cfg, &reader, &orc.derived(&reader), false);
        }
        FluxonCommands::Unstake { amount } => {
            orc.set_amount(&amount);
            let tx = orc.execute(&reader, |o, r| o.submit_unstake(r))?;
            report("unstaked", &tx);
        }
        FluxonCommands::Claim {} => {
            let tx = orc.execute(&reader, |o, r| o.submit_claim(r))?;
            report("claimed", &tx);
        }
        FluxonCommands::SaleStatus {} => {
            let sale = match reader.source().sale_active() {
                Ok(active) => Read::Known(active),
                Err(e) => {
                    warn!("saleActive read failed: {e}");
                    Read::Unknown
                }
            };
            println!("Sale Status: {}", sale_status(&sale));
        }
        FluxonCommands::Collection {
            rarity,
            filter,
            page,
        } => {
            let scan = scan_minted(reader.source());
            for tier in Rarity::ALL {
                println!("{:<10} {}/{}", tier, scan.minted_in(tier), tier.capacity());
            }
            for id in scan.page(rarity, filter, page) {
                let status = if scan.minted.contains(&id) {
                    "minted"
                } else if scan.unknown.contains(&id) {
                    "unknown"
                } else {
                    "available"
                };
                println!("#{:03} {:<9} {}", id, status, image_url(&cfg.nft_image_base_url, id));
            }
        }
        FluxonCommands::Mint { token_id } => {
            let ticket = match prepare_mint(reader.source(), token_id, cfg.mint_price) {
                Ok(ticket) => ticket,
                Err(violation) => return Err(orc.refuse(violation).into()),
            };
            println!("price          {} POL", format_ether(ticket.price()));
            let tx = orc.execute(&reader, |o, _| o.submit_mint(ticket))?;
            report("minted", &tx);
        }
    }
    Ok(())
}
