// One live connection: queued writer, framed reader, periodic pings

use crate::network::message::{read_message, write_message, Message};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

/// Random identifier assigned to each connection
pub type PeerId = String;

/// Outbound queue depth; a peer that falls this far behind is disconnected
pub const SEND_QUEUE_CAPACITY: usize = 64;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub fn generate_peer_id() -> PeerId {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes)
}

/// Handle to a connected peer.
///
/// Owns the outbound queue and the shutdown signal for the three tasks
/// spawned in [`Peer::spawn`]. Inbound messages surface through the
/// receiver returned alongside the handle; when the connection dies the
/// receiver closes, which is how the owner learns the peer is gone.
pub struct Peer {
    pub id: PeerId,
    pub addr: SocketAddr,
    outbound: mpsc::Sender<Message>,
    shutdown: watch::Sender<bool>,
}

impl Peer {
    /// Take ownership of a connected stream and spawn its read, write and
    /// ping tasks. Returns the handle plus the channel of inbound messages.
    pub fn spawn(stream: TcpStream, addr: SocketAddr) -> (Peer, mpsc::Receiver<Message>) {
        let id = generate_peer_id();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(SEND_QUEUE_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Message>(SEND_QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (mut read_half, mut write_half) = stream.into_split();

        // Write task: drains the outbound queue onto the socket
        let write_id = id.clone();
        let mut write_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    queued = outbound_rx.recv() => match queued {
                        Some(message) => {
                            if let Err(e) = write_message(&mut write_half, &message).await {
                                log::debug!("peer {write_id}: {e}");
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = write_shutdown.changed() => break,
                }
            }
        });

        // Read task: decodes frames until the stream breaks or we shut down.
        // Dropping inbound_tx closes the receiver, which the owner treats as
        // the peer going away.
        let read_id = id.clone();
        let mut read_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    decoded = read_message(&mut read_half) => match decoded {
                        Ok(message) => {
                            if inbound_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::debug!("peer {read_id}: {e}");
                            break;
                        }
                    },
                    _ = read_shutdown.changed() => break,
                }
            }
        });

        // Ping task: keepalive with a random nonce on a fixed interval
        let ping_tx = outbound_tx.clone();
        let mut ping_shutdown = shutdown_rx;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PING_INTERVAL);
            ticker.tick().await; // the first tick fires immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let nonce: u64 = rand::random();
                        if ping_tx.send(Message::Ping(nonce)).await.is_err() {
                            break;
                        }
                    }
                    _ = ping_shutdown.changed() => break,
                }
            }
        });

        let peer = Peer {
            id,
            addr,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
        };
        (peer, inbound_rx)
    }

    /// Queue a message without blocking.
    ///
    /// Fails when the queue is full (the peer cannot keep up) or already
    /// closed; the caller disconnects the peer in response.
    pub fn try_send(&self, message: Message) -> std::result::Result<(), Message> {
        self.outbound.try_send(message).map_err(|e| e.into_inner())
    }

    /// Signal all three tasks to stop
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}
