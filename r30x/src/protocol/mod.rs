//! Wire protocol of R30x modules.

pub mod checksum;
pub mod packet;
pub mod receiver;
pub mod stream;

// Re-export common types
pub use checksum::{Checksum, checksum};
pub use packet::{
    DEFAULT_ADDRESS, Frame, Header, PacketType, decode_frame, encode_command, encode_frame, parse_header,
};
pub use receiver::{FrameReceiver, ReceiveMode, ReceiverConfig, receive_frame};
pub use stream::{receive_stream, send_stream};
