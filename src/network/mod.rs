// Peer-to-peer gossip layer

mod message;
mod node;
mod peer;

pub use message::{
    read_message, write_message, Handshake, Message, MAX_PAYLOAD_LEN, PROTOCOL_VERSION,
};
pub use node::Node;
pub use peer::{Peer, PeerId, SEND_QUEUE_CAPACITY};
