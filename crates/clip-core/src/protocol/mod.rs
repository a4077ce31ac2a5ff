//! Protocol module containing message types, the binary codec, and transport
//! error classification.

pub mod codec;
pub mod messages;
pub mod sequence;
pub mod transport;

pub use codec::{
    decode_header, decode_message, decode_payload, encode_message, encode_message_now,
    ProtocolError,
};
pub use messages::*;
pub use sequence::SequenceCounter;
pub use transport::is_transient;
