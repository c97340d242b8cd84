// CLI commands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use crate::{ChainConfig, Ledger, SledStore, CancelToken};
use crate::core::Block;
use crate::error::{Error, Result};
use crate::wallet::{Address, Keystore, TransactionBuilder};

#[derive(Parser)]
#[command(name = "shellchain")]
#[command(about = "Proof-of-work UTXO ledger", long_about = None)]
pub struct Cli {
    /// Directory holding the block store and wallet file
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// JSON chain configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the proof-of-work difficulty
    #[arg(long)]
    pub difficulty: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new blockchain, paying the genesis reward to an address
    Create {
        #[arg(short, long)]
        address: String,
    },

    /// Get balance for an address
    Balance {
        #[arg(short, long)]
        address: String,
    },

    /// Send coins and mine a block holding the transaction
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },

    /// Print every block from the tip back to genesis
    Print,

    /// Wallet commands
    #[command(subcommand)]
    Wallet(WalletCommands),
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new address
    New,

    /// List all addresses
    List,
}

/// CLI handler
pub struct CliHandler {
    data_dir: PathBuf,
    config: ChainConfig,
    keystore: Keystore,
    keystore_path: PathBuf,
}

impl CliHandler {
    /// Create a new CLI handler
    pub fn new(cli: &Cli) -> Result<Self> {
        std::fs::create_dir_all(&cli.data_dir)?;

        let mut config = match &cli.config {
            Some(path) => ChainConfig::load(path)?,
            None => ChainConfig::default(),
        };
        if let Some(difficulty) = cli.difficulty {
            config.difficulty = difficulty;
        }
        config.validate()?;

        let keystore_path = cli.data_dir.join("wallets.json");
        let keystore = Keystore::load_or_new(&keystore_path)?;

        Ok(Self {
            data_dir: cli.data_dir.clone(),
            config,
            keystore,
            keystore_path,
        })
    }

    /// Handle CLI command
    pub fn handle(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Create { address } => self.create(&address),
            Commands::Balance { address } => self.balance(&address),
            Commands::Send { from, to, amount } => self.send(&from, &to, amount),
            Commands::Print => self.print(),
            Commands::Wallet(cmd) => self.handle_wallet(cmd),
        }
    }

    fn store(&self) -> Result<SledStore> {
        SledStore::new(self.data_dir.join("blocks"))
    }

    fn open_ledger(&self) -> Result<Ledger<SledStore>> {
        Ledger::open(self.store()?, self.config.clone())
    }

    fn create(&self, address: &str) -> Result<()> {
        let owner = Address::parse(address)?.to_pubkey_hash()?;
        let ledger = Ledger::create(self.store()?, self.config.clone(), owner, &CancelToken::new())?;

        println!("New blockchain created");
        if let Some(tip) = ledger.tip()? {
            println!("  Genesis: {}", tip);
        }
        Ok(())
    }

    fn balance(&self, address: &str) -> Result<()> {
        let address = Address::parse(address)?;
        let ledger = self.open_ledger()?;
        let balance = TransactionBuilder::new(&self.keystore, &ledger).get_balance(&address)?;

        println!("Balance of {}: {}", address, balance);
        Ok(())
    }

    fn send(&self, from: &str, to: &str, amount: u64) -> Result<()> {
        let from = Address::parse(from)?;
        let to = Address::parse(to)?;
        let ledger = self.open_ledger()?;

        let builder = TransactionBuilder::new(&self.keystore, &ledger);
        let tx = builder.send(&from, &to, amount)?;
        if !ledger.verify_transaction(&tx)? {
            return Err(Error::SignatureVerificationFailed(tx.id));
        }

        let block = ledger.append(vec![tx], &CancelToken::new())?;
        println!("Added new block {}", block.hash);
        Ok(())
    }

    fn print(&self) -> Result<()> {
        let ledger = self.open_ledger()?;
        for block in ledger.iter() {
            let block = block?;
            self.print_block(&block, ledger.miner().validate(&block));
        }
        Ok(())
    }

    /// Handle wallet commands
    fn handle_wallet(&mut self, cmd: WalletCommands) -> Result<()> {
        match cmd {
            WalletCommands::New => {
                let addr = self.keystore.new_address();
                self.keystore.save(&self.keystore_path)?;
                println!("New address is {}", addr);
                Ok(())
            }
            WalletCommands::List => {
                if self.keystore.count() == 0 {
                    println!("No addresses yet, create one with `wallet new`");
                }
                for addr in self.keystore.list_addresses() {
                    println!("{}", addr);
                }
                Ok(())
            }
        }
    }

    /// Print block information
    fn print_block(&self, block: &Block, valid_pow: bool) {
        println!("Block {}", block.hash);
        println!("  Timestamp: {}", block.timestamp);
        match &block.prev_hash {
            Some(prev) => println!("  PreviousHash: {}", prev),
            None => println!("  PreviousHash: (genesis)"),
        }
        println!("  Nonce: {}", block.nonce);
        println!("  Valid PoW: {}", valid_pow);
        for tx in &block.transactions {
            print!("{}", tx);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(dir: &std::path::Path, command: Commands) -> Cli {
        Cli {
            data_dir: dir.to_path_buf(),
            config: None,
            difficulty: Some(4),
            command,
        }
    }

    fn run(dir: &std::path::Path, command: Commands) -> Result<()> {
        let cli = cli(dir, command);
        let mut handler = CliHandler::new(&cli)?;
        handler.handle(cli.command)
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "shellchain", "--difficulty", "6", "send", "--from", "a", "--to", "b", "--amount", "5",
        ])
        .unwrap();
        assert_eq!(cli.difficulty, Some(6));
        assert!(matches!(cli.command, Commands::Send { amount: 5, .. }));
    }

    #[test]
    fn test_create_send_flow() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), Commands::Wallet(WalletCommands::New)).unwrap();
        run(dir.path(), Commands::Wallet(WalletCommands::New)).unwrap();

        let keystore = Keystore::load(dir.path().join("wallets.json")).unwrap();
        let addresses = keystore.list_addresses();
        assert_eq!(addresses.len(), 2);
        let (alice, bob) = (addresses[0].to_string(), addresses[1].to_string());

        run(dir.path(), Commands::Create { address: alice.clone() }).unwrap();
        assert!(matches!(
            run(dir.path(), Commands::Create { address: alice.clone() }),
            Err(Error::ChainAlreadyExists)
        ));

        run(dir.path(), Commands::Send { from: alice.clone(), to: bob.clone(), amount: 30 }).unwrap();
        run(dir.path(), Commands::Print).unwrap();
        run(dir.path(), Commands::Balance { address: bob.clone() }).unwrap();
        run(dir.path(), Commands::Wallet(WalletCommands::List)).unwrap();

        let store = SledStore::new(dir.path().join("blocks")).unwrap();
        let config = ChainConfig { difficulty: 4, ..ChainConfig::default() };
        let ledger = Ledger::open(store, config).unwrap();
        let utxo = ledger.utxo();
        assert_eq!(utxo.balance_of(&Address::parse(&alice).unwrap().to_pubkey_hash().unwrap()).unwrap(), 70);
        assert_eq!(utxo.balance_of(&Address::parse(&bob).unwrap().to_pubkey_hash().unwrap()).unwrap(), 30);
    }

    #[test]
    fn test_invalid_address_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            run(dir.path(), Commands::Create { address: "bogus".to_string() }),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            run(dir.path(), Commands::Balance { address: Address::from_pubkey_hash(&[1; 20]).to_string() }),
            Err(Error::ChainNotInitialized)
        ));
    }
}
