//! Realtime connectivity: the supervisor gate and reconnecting channels

mod backoff;
mod channel;
mod supervisor;

pub use channel::{ChannelEvent, ChannelHandle, SocketChannel};
pub use supervisor::ConnectionSupervisor;
