// Gossip node: peer set, message dispatch, single-hop rebroadcast

use crate::chain::Blockchain;
use crate::error::{ChainError, Result};
use crate::network::message::{Handshake, Message, PROTOCOL_VERSION};
use crate::network::peer::{Peer, PeerId};
use crate::storage::{ChainStore, Mempool};
use crate::wallet::{WalletStore, WalletUpdate};
use crate::core::{Block, Transaction};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex, RwLock};

fn generate_node_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// A node on the gossip network.
///
/// Owns the peer set and routes every inbound message: transactions into
/// the mempool, blocks into the chain, wallet updates into the wallet
/// store. Anything accepted is rebroadcast once to every peer except the
/// one it arrived from; duplicates die at the first node that has already
/// seen them, so gossip converges without a routing table.
pub struct Node {
    pub id: String,
    advertised_addr: std::sync::RwLock<String>,
    chain: Arc<Mutex<Blockchain>>,
    mempool: Arc<Mempool>,
    store: Arc<ChainStore>,
    wallet_store: Arc<WalletStore>,
    peers: RwLock<HashMap<PeerId, Peer>>,
    halt_mining: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

impl Node {
    pub fn new(
        chain: Blockchain,
        mempool: Mempool,
        store: ChainStore,
        wallet_store: WalletStore,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            id: generate_node_id(),
            advertised_addr: std::sync::RwLock::new(String::new()),
            chain: Arc::new(Mutex::new(chain)),
            mempool: Arc::new(mempool),
            store: Arc::new(store),
            wallet_store: Arc::new(wallet_store),
            peers: RwLock::new(HashMap::new()),
            halt_mining: Arc::new(AtomicBool::new(false)),
            shutdown,
        })
    }

    /// Bind a listener and accept inbound peers until shutdown.
    ///
    /// Returns the bound address (useful when binding port 0).
    pub async fn listen(self: Arc<Self>, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ChainError::Network(format!("bind {addr}: {e}")))?;
        let local = listener
            .local_addr()
            .map_err(|e| ChainError::Network(e.to_string()))?;

        if let Ok(mut advertised) = self.advertised_addr.write() {
            *advertised = local.to_string();
        }
        log::info!("node {} listening on {local}", self.id);

        let node = Arc::clone(&self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, remote)) => {
                            if let Err(e) = Arc::clone(&node).attach_peer(stream, remote).await {
                                log::warn!("inbound peer {remote}: {e}");
                            }
                        }
                        Err(e) => {
                            log::error!("accept failed: {e}");
                            break;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
        });

        Ok(local)
    }

    /// Dial a remote node and attach it as a peer
    pub async fn connect(self: Arc<Self>, addr: SocketAddr) -> Result<PeerId> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ChainError::Network(format!("connect {addr}: {e}")))?;
        self.attach_peer(stream, addr).await
    }

    /// Wrap a connected stream as a peer: send our handshake, register it,
    /// and spawn its dispatcher.
    async fn attach_peer(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<PeerId> {
        let (peer, inbound) = Peer::spawn(stream, addr);
        let peer_id = peer.id.clone();

        let handshake = Message::Handshake(Handshake {
            protocol_version: PROTOCOL_VERSION,
            best_height: self.chain.lock().await.height() as u64,
            addr_from: self
                .advertised_addr
                .read()
                .map(|a| a.clone())
                .unwrap_or_default(),
        });
        if peer.try_send(handshake).is_err() {
            peer.close();
            return Err(ChainError::Network(format!(
                "peer {addr} rejected handshake"
            )));
        }

        self.peers.write().await.insert(peer_id.clone(), peer);
        log::info!("peer {peer_id} attached ({addr})");

        let node = Arc::clone(&self);
        let dispatch_id = peer_id.clone();
        tokio::spawn(async move {
            node.run_dispatcher(dispatch_id, inbound).await;
        });

        Ok(peer_id)
    }

    async fn run_dispatcher(self: Arc<Self>, peer_id: PeerId, mut inbound: mpsc::Receiver<Message>) {
        while let Some(message) = inbound.recv().await {
            if !self.dispatch(&peer_id, message).await {
                break;
            }
        }
        self.remove_peer(&peer_id).await;
    }

    /// Handle one inbound message. Returns `false` when the peer must be
    /// dropped.
    async fn dispatch(&self, peer_id: &str, message: Message) -> bool {
        match message {
            Message::Handshake(hs) => {
                if hs.protocol_version != PROTOCOL_VERSION {
                    let err = ChainError::VersionMismatch {
                        ours: PROTOCOL_VERSION,
                        theirs: hs.protocol_version,
                    };
                    log::warn!("dropping peer {peer_id}: {err}");
                    return false;
                }
                log::debug!(
                    "peer {peer_id} handshake: height {} from {}",
                    hs.best_height,
                    hs.addr_from
                );
                true
            }
            Message::Tx(tx) => {
                self.handle_transaction(peer_id, tx).await;
                true
            }
            Message::Block(block) => {
                self.handle_block(peer_id, block).await;
                true
            }
            Message::WalletUpdate(update) => {
                match self.wallet_store.apply(&update) {
                    Ok(()) => {
                        self.broadcast(Message::WalletUpdate(update), Some(peer_id))
                            .await;
                    }
                    Err(e) => log::warn!("wallet update from {peer_id}: {e}"),
                }
                true
            }
            Message::Ping(nonce) => {
                log::trace!("ping {nonce} from {peer_id}");
                true
            }
        }
    }

    async fn handle_transaction(&self, peer_id: &str, tx: Transaction) {
        if !tx.is_valid() {
            log::debug!("dropping invalid transaction from {peer_id}");
            return;
        }
        // First sighting only; a duplicate means the gossip already went out
        if self.mempool.contains(&tx) {
            return;
        }
        self.mempool.add(tx.clone());
        self.broadcast(Message::Tx(tx), Some(peer_id)).await;
    }

    async fn handle_block(&self, peer_id: &str, block: Block) {
        let save_result = {
            let mut chain = self.chain.lock().await;
            match chain.add_block(block.clone()) {
                Ok(()) => {
                    // Raised under the chain lock: the miner clears this flag
                    // under the same lock when building a candidate, so a
                    // search on the old tail always observes the raise
                    self.halt_mining.store(true, Ordering::Relaxed);
                    chain.save(&self.store)
                }
                Err(e) => {
                    log::debug!("rejected block from {peer_id}: {e}");
                    return;
                }
            }
        };
        if let Err(e) = save_result {
            log::error!("failed to persist chain: {e}");
        }

        self.mempool.remove(&block.transactions);
        self.broadcast(Message::Block(block), Some(peer_id)).await;
    }

    /// Queue a message to every peer, optionally skipping the one it came
    /// from. Peers whose queue is full are disconnected.
    pub async fn broadcast(&self, message: Message, except: Option<&str>) {
        let mut stalled = Vec::new();
        {
            let peers = self.peers.read().await;
            for (id, peer) in peers.iter() {
                if Some(id.as_str()) == except {
                    continue;
                }
                if peer.try_send(message.clone()).is_err() {
                    stalled.push(id.clone());
                }
            }
        }
        for id in stalled {
            log::warn!("peer {id} cannot keep up; disconnecting");
            self.remove_peer(&id).await;
        }
    }

    pub async fn broadcast_transaction(&self, tx: &Transaction) {
        self.broadcast(Message::Tx(tx.clone()), None).await;
    }

    pub async fn broadcast_block(&self, block: &Block) {
        self.broadcast(Message::Block(block.clone()), None).await;
    }

    pub async fn broadcast_wallet_update(&self, update: &WalletUpdate) {
        self.broadcast(Message::WalletUpdate(update.clone()), None)
            .await;
    }

    async fn remove_peer(&self, peer_id: &str) {
        if let Some(peer) = self.peers.write().await.remove(peer_id) {
            peer.close();
            log::info!("peer {peer_id} ({}) disconnected", peer.addr);
        }
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Stop the accept loop and close every peer
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let mut peers = self.peers.write().await;
        for (_, peer) in peers.drain() {
            peer.close();
        }
        log::info!("node {} stopped", self.id);
    }

    pub fn chain(&self) -> Arc<Mutex<Blockchain>> {
        Arc::clone(&self.chain)
    }

    pub fn mempool(&self) -> Arc<Mempool> {
        Arc::clone(&self.mempool)
    }

    pub fn store(&self) -> Arc<ChainStore> {
        Arc::clone(&self.store)
    }

    pub fn wallet_store(&self) -> Arc<WalletStore> {
        Arc::clone(&self.wallet_store)
    }

    /// Shared flag the mining task polls; raised when a network block wins
    pub fn halt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halt_mining)
    }

    /// Observe node shutdown (used by the mining loop)
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
