// CLI commands

use crate::chain::Blockchain;
use crate::consensus::{Consensus, ProofOfWork};
use crate::core::{Hash256, Transaction};
use crate::error::{ChainError, Result};
use crate::miner::Miner;
use crate::network::{write_message, Handshake, Message, Node, PROTOCOL_VERSION};
use crate::storage::{ChainStore, Mempool};
use crate::wallet::{Wallet, WalletStore};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "minichain")]
#[command(about = "Minimal proof-of-work blockchain node", long_about = None)]
pub struct Cli {
    /// Data directory for the chain database and wallets
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a node
    Run {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:7000")]
        listen: SocketAddr,

        /// Peers to dial at startup
        #[arg(long)]
        peer: Vec<SocketAddr>,

        /// Mine blocks from pooled transactions
        #[arg(long)]
        mine: bool,
    },

    /// Print every block in the chain
    PrintChain,

    /// Get a block by height or hash
    GetBlock {
        /// Block height or hex hash
        id: String,
    },

    /// Wallet commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Sign a transfer and hand it to a running node
    Send {
        /// Address of a running node
        #[arg(long, default_value = "127.0.0.1:7000")]
        node: SocketAddr,

        /// Sending wallet address (must exist in the wallet directory)
        #[arg(long)]
        from: String,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Amount to transfer
        #[arg(long)]
        amount: u64,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new wallet
    New,

    /// List wallets in the wallet directory
    List,

    /// Set a wallet's balance and announce it to a running node
    SetBalance {
        /// Wallet address
        address: String,

        /// New balance
        balance: u64,

        /// Address of a running node
        #[arg(long, default_value = "127.0.0.1:7000")]
        node: SocketAddr,
    },

    /// Show the last balance record received over gossip
    Balance {
        /// Wallet address
        address: String,
    },
}

/// CLI handler
pub struct CliHandler {
    data_dir: PathBuf,
}

impl CliHandler {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn open_store(&self) -> Result<ChainStore> {
        ChainStore::new(self.data_dir.join("chain"))
    }

    fn wallet_dir(&self) -> PathBuf {
        self.data_dir.join("wallets")
    }

    /// Handle CLI command
    pub async fn handle(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run { listen, peer, mine } => self.run(listen, peer, mine).await,
            Commands::PrintChain => self.print_chain(),
            Commands::GetBlock { id } => self.get_block(&id),
            Commands::Wallet(cmd) => self.handle_wallet(cmd).await,
            Commands::Send {
                node,
                from,
                to,
                amount,
            } => self.send(node, &from, &to, amount).await,
        }
    }

    /// Start a node and block until Ctrl-C
    async fn run(&self, listen: SocketAddr, peers: Vec<SocketAddr>, mine: bool) -> Result<()> {
        let consensus: Arc<dyn Consensus> = Arc::new(ProofOfWork::new());
        let store = self.open_store()?;
        let chain = Blockchain::load(&store, Arc::clone(&consensus))?;

        let node = Node::new(
            chain,
            Mempool::new(),
            store,
            WalletStore::new(self.data_dir.join("balances")),
        );
        Arc::clone(&node).listen(listen).await?;

        for addr in peers {
            match Arc::clone(&node).connect(addr).await {
                Ok(peer_id) => log::info!("connected to {addr} as peer {peer_id}"),
                Err(e) => log::warn!("could not reach {addr}: {e}"),
            }
        }

        let miner = Miner::new(Arc::clone(&node), consensus);
        miner.ensure_genesis().await?;

        if mine {
            tokio::spawn(async move { miner.run().await });
        }

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| ChainError::Io(e.to_string()))?;
        node.stop().await;
        Ok(())
    }

    fn print_chain(&self) -> Result<()> {
        let store = self.open_store()?;
        let chain = Blockchain::load(&store, Arc::new(ProofOfWork::new()))?;

        println!("Chain height: {}", chain.height());
        for (height, block) in chain.blocks().iter().enumerate() {
            println!("Block {height}:");
            println!("  hash:       {}", block.hash);
            println!("  prev:       {}", block.prev_hash);
            println!("  difficulty: {}", block.difficulty);
            println!("  nonce:      {}", block.nonce);
            println!("  txs:        {}", block.transactions.len());
            for tx in &block.transactions {
                println!("    {} -> {} ({})", tx.sender, tx.recipient, tx.amount);
            }
        }
        Ok(())
    }

    fn get_block(&self, id: &str) -> Result<()> {
        let store = self.open_store()?;
        let chain = Blockchain::load(&store, Arc::new(ProofOfWork::new()))?;

        let block = if let Ok(height) = id.parse::<usize>() {
            chain.get_block_by_height(height)
        } else {
            let hash = Hash256::from_hex(id)
                .map_err(|_| ChainError::MalformedAddress(format!("bad block id {id}")))?;
            chain.get_block(&hash)
        };

        match block {
            Some(block) => {
                println!("{}", serde_json::to_string_pretty(block)?);
                Ok(())
            }
            None => Err(ChainError::InvalidBlock(format!("no block {id}"))),
        }
    }

    async fn handle_wallet(&self, cmd: WalletCommands) -> Result<()> {
        match cmd {
            WalletCommands::New => {
                let wallet = Wallet::new();
                let path = wallet.save(self.wallet_dir())?;
                println!("New wallet: {}", wallet.address());
                println!("  saved to {}", path.display());
                Ok(())
            }
            WalletCommands::List => {
                let dir = self.wallet_dir();
                if !dir.exists() {
                    println!("No wallets");
                    return Ok(());
                }
                for entry in std::fs::read_dir(&dir).map_err(|e| ChainError::Io(e.to_string()))? {
                    let entry = entry.map_err(|e| ChainError::Io(e.to_string()))?;
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("wallet") {
                        continue;
                    }
                    match Wallet::load(&path) {
                        Ok(wallet) => {
                            println!("{}  balance {}", wallet.address(), wallet.balance)
                        }
                        Err(e) => log::warn!("skipping {}: {e}", path.display()),
                    }
                }
                Ok(())
            }
            WalletCommands::SetBalance {
                address,
                balance,
                node,
            } => {
                let path = self.wallet_dir().join(format!("{address}.wallet"));
                let mut wallet = Wallet::load(&path)?;
                wallet.balance = balance;
                wallet.save(self.wallet_dir())?;

                self.submit(node, Message::WalletUpdate(wallet.update_record()))
                    .await?;
                println!("Announced balance {balance} for {address} via {node}");
                Ok(())
            }
            WalletCommands::Balance { address } => {
                let store = WalletStore::new(self.data_dir.join("balances"));
                match store.get(&address)? {
                    Some(record) => println!("{}  balance {}", record.address, record.balance),
                    None => println!("No balance record for {address}"),
                }
                Ok(())
            }
        }
    }

    /// Build, sign and gossip a transaction through a running node
    async fn send(&self, node: SocketAddr, from: &str, to: &str, amount: u64) -> Result<()> {
        let wallet_path = self.wallet_dir().join(format!("{from}.wallet"));
        let wallet = Wallet::load(&wallet_path)?;

        let mut tx = Transaction::new(wallet.address(), to.to_string(), amount);
        wallet.sign_transaction(&mut tx);
        if !tx.is_valid() {
            return Err(ChainError::InvalidTransaction(
                "signed transaction failed validation".to_string(),
            ));
        }

        self.submit(node, Message::Tx(tx)).await?;
        println!("Sent {amount} from {from} to {to} via {node}");
        Ok(())
    }

    /// Dial a running node, handshake, and hand it one message
    async fn submit(&self, node: SocketAddr, message: Message) -> Result<()> {
        let mut stream = tokio::net::TcpStream::connect(node)
            .await
            .map_err(|e| ChainError::Network(format!("connect {node}: {e}")))?;

        let hello = Message::Handshake(Handshake {
            protocol_version: PROTOCOL_VERSION,
            best_height: 0,
            addr_from: String::new(),
        });
        write_message(&mut stream, &hello).await?;
        write_message(&mut stream, &message).await
    }
}
