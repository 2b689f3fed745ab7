use crate::config::Config;
use crate::core::{Block, Blockchain, Transaction};
use crate::storage::Database;
use crate::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hashledger")]
#[command(about = "A minimal proof-of-work ledger with UTXO accounting")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Data directory")]
    pub data_dir: Option<String>,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<String>,

    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a blockchain and send the genesis reward to ADDRESS
    #[command(name = "createblockchain")]
    CreateBlockchain {
        /// Address receiving the genesis reward
        address: String,
    },

    /// Get the balance for an address
    #[command(name = "getbalance")]
    GetBalance { address: String },

    /// Send AMOUNT of coins from one address to another
    Send { from: String, to: String, amount: u64 },

    /// Print the blocks in the chain, newest first
    #[command(name = "printchain")]
    PrintChain,
}

pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let default_filter = if cli.debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .try_init();

    let config = load_config(&cli)?;
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db = Arc::new(Database::new(config.db_path())?);

    let outcome = match cli.command {
        Commands::CreateBlockchain { address } => create_blockchain(db.clone(), &config, &address),
        Commands::GetBalance { address } => get_balance(db.clone(), &config, &address),
        Commands::Send { from, to, amount } => send(db.clone(), &config, &from, &to, amount),
        Commands::PrintChain => print_chain(db.clone(), &config),
    };

    db.flush()?;
    Ok(outcome?)
}

/// Reads `--config` if given, otherwise the default config file, then
/// applies `--data-dir`.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = PathBuf::from(data_dir);
    }
    Ok(config)
}

fn create_blockchain(db: Arc<Database>, config: &Config, address: &str) -> Result<()> {
    let chain = Blockchain::create(db, config, address)?;

    println!("✅ Blockchain created");
    println!("📦 Genesis block hash: {}", chain.tip());
    println!("💰 {} coins sent to {}", chain.coinbase_reward(), address);
    Ok(())
}

fn get_balance(db: Arc<Database>, config: &Config, address: &str) -> Result<()> {
    let chain = Blockchain::open(db, config)?;
    let balance = chain.get_balance(address)?;

    println!("Balance of {}: {}", address, balance);
    Ok(())
}

fn send(db: Arc<Database>, config: &Config, from: &str, to: &str, amount: u64) -> Result<()> {
    let mut chain = Blockchain::open(db, config)?;
    let tx = Transaction::new_transfer(from, to, amount, &chain)?;
    let block = chain.add_block(vec![tx])?;

    println!("✅ Sent {} from {} to {}", amount, from, to);
    println!("📦 Block hash: {}", block.hash);
    Ok(())
}

fn print_chain(db: Arc<Database>, config: &Config) -> Result<()> {
    let chain = Blockchain::open(db, config)?;

    for block in chain.iter() {
        match block {
            Ok(block) => print_block(&chain, &block),
            Err(e) => {
                println!("❌ {}", e);
                return Err(e);
            }
        }
    }
    Ok(())
}

fn print_block(chain: &Blockchain, block: &Block) {
    println!("📦 Block {}", block.hash);
    match &block.prev_hash {
        Some(prev_hash) => println!("Previous hash: {}", prev_hash),
        None => println!("Previous hash: (genesis)"),
    }
    println!("Nonce: {}", block.nonce);
    println!("PoW valid: {}", chain.is_valid_proof_of_work(block));
    println!("Transactions: {}", block.transaction_count());

    for tx in &block.transactions {
        println!("  Transaction {}{}", tx.id, if tx.is_coinbase() { " (coinbase)" } else { "" });
        for input in &tx.inputs {
            if tx.is_coinbase() {
                println!("    In:  {}", input.signature);
            } else {
                println!(
                    "    In:  {}:{} by {}",
                    input.previous_output.txid.short(),
                    input.previous_output.vout,
                    input.signature
                );
            }
        }
        for (vout, output) in tx.outputs.iter().enumerate() {
            println!("    Out {}: {} to {}", vout, output.value, output.address);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn write_config(temp_dir: &TempDir) -> anyhow::Result<String> {
        let mut config = Config::default().with_data_dir(temp_dir.path().join("from-file"));
        config.mining.difficulty = 8;
        config.mining.threads = 1;

        let path = temp_dir.path().join("config.json");
        config.save_to(&path)?;
        Ok(path.to_string_lossy().into_owned())
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "hashledger",
            "--data-dir",
            "/tmp/ledger",
            "send",
            "alice",
            "bob",
            "30",
        ])
        .unwrap();

        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/ledger"));
        match cli.command {
            Commands::Send { from, to, amount } => {
                assert_eq!(from, "alice");
                assert_eq!(to, "bob");
                assert_eq!(amount, 30);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_amount() {
        assert!(Cli::try_parse_from(["hashledger", "send", "alice", "bob", "-5"]).is_err());
        assert!(Cli::try_parse_from(["hashledger", "send", "alice", "bob", "lots"]).is_err());
        assert!(Cli::try_parse_from(["hashledger", "send", "alice", "bob"]).is_err());
    }

    #[test]
    fn test_command_names() {
        assert!(matches!(
            Cli::try_parse_from(["hashledger", "printchain"]).unwrap().command,
            Commands::PrintChain
        ));
        assert!(matches!(
            Cli::try_parse_from(["hashledger", "getbalance", "alice"]).unwrap().command,
            Commands::GetBalance { address } if address == "alice"
        ));
        assert!(matches!(
            Cli::try_parse_from(["hashledger", "createblockchain", "alice"]).unwrap().command,
            Commands::CreateBlockchain { address } if address == "alice"
        ));
    }

    #[test]
    fn test_load_config_prefers_config_flag() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = write_config(&temp_dir)?;

        let cli = Cli::try_parse_from(["hashledger", "--config", path.as_str(), "printchain"])?;
        let config = load_config(&cli)?;
        assert_eq!(config.mining.difficulty, 8);
        assert_eq!(config.storage.data_dir, temp_dir.path().join("from-file"));

        let override_dir = temp_dir.path().join("override");
        let override_arg = override_dir.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "hashledger",
            "--config",
            path.as_str(),
            "--data-dir",
            override_arg.as_str(),
            "printchain",
        ])?;
        assert_eq!(load_config(&cli)?.storage.data_dir, override_dir);
        Ok(())
    }

    #[test]
    fn test_load_config_reports_unreadable_file() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ not json")?;

        let path = path.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["hashledger", "--config", path.as_str(), "printchain"])?;
        assert!(load_config(&cli).is_err());
        Ok(())
    }

    #[test]
    fn test_run_commands_end_to_end() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = write_config(&temp_dir)?;
        let run = |args: &[&str]| -> anyhow::Result<()> {
            let mut argv = vec!["hashledger", "--config", path.as_str()];
            argv.extend_from_slice(args);
            run_cli(Cli::try_parse_from(argv)?)
        };

        run(&["createblockchain", "alice"])?;
        assert!(run(&["createblockchain", "bob"]).is_err());
        run(&["send", "alice", "bob", "30"])?;
        assert!(run(&["send", "bob", "alice", "31"]).is_err());
        run(&["getbalance", "bob"])?;
        run(&["printchain"])?;

        let config = Config::load_from(Path::new(&path))?;
        let chain = Blockchain::open(Arc::new(Database::new(config.db_path())?), &config)?;
        assert_eq!(chain.get_balance("alice")?, 70);
        assert_eq!(chain.get_balance("bob")?, 30);
        assert_eq!(chain.block_count()?, 2);
        Ok(())
    }
}
