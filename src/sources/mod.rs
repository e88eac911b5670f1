//! Datagram source implementations

pub mod channel;
pub mod udp;

pub use channel::ChannelSource;
pub use udp::{MAX_DATAGRAM_SIZE, UdpSource};
