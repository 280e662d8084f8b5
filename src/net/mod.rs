//! 联机同步模块（点对点意图转发）。

pub mod protocol;
pub mod session;

pub use protocol::PeerMessage;
pub use session::{ChannelError, LobbyStatus, PeerChannel, PeerError, PeerRole, PeerSession};
