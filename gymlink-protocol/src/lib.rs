//! gymlink-protocol: Wire definitions for driving a remote environment
//!
//! This crate defines the request packets, payload types and framing
//! routines shared by everything that speaks the environment protocol.
//! It performs no networking of its own; readers pull from any blocking
//! [`std::io::Read`] and writers stage bytes into any [`bytes::BufMut`].

pub mod codec;
pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use codec::{CodecError, ObservationFrame, RequestCodec, MAX_FIELD_SIZE};
pub use messages::{
    ObservationEncoding, PacketType, Request, SpaceId, ACTION_TYPE_JSON, HANDSHAKE_FLAGS,
    HANDSHAKE_OPERATION,
};
pub use types::{
    Action, ByteList, JsonMap, JsonValue, Observation, Space, SpaceFormatError, MAX_NESTING_DEPTH,
};
