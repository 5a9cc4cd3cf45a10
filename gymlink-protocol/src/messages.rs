//! Request packets and the single-byte tags used on the wire

use crate::codec::CodecError;
use crate::types::{Action, JsonMap};

/// Flags byte that opens every connection. No flags are defined yet.
pub const HANDSHAKE_FLAGS: u8 = 0;

/// Operation name reported for the connection handshake
pub const HANDSHAKE_OPERATION: &str = "make environment";

/// Type tag for JSON-encoded actions, the only action encoding
pub const ACTION_TYPE_JSON: u8 = 0;

/// Opcode selecting the remote operation for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Reset = 0,
    Step = 1,
    GetSpace = 2,
    SampleAction = 3,
    Monitor = 4,
    Render = 5,
    Upload = 6,
    UniverseConfigure = 7,
    UniverseWrap = 8,
    RetroConfigure = 9,
    RetroWrap = 10,
}

impl PacketType {
    /// Human-readable operation name, used for log and error context
    pub fn operation_name(self) -> &'static str {
        match self {
            Self::Reset => "reset environment",
            Self::Step => "step environment",
            Self::GetSpace => "get space info",
            Self::SampleAction => "sample action",
            Self::Monitor => "monitor environment",
            Self::Render => "render environment",
            Self::Upload => "upload monitor",
            Self::UniverseConfigure => "configure Universe environment",
            Self::UniverseWrap => "wrap Universe environment",
            Self::RetroConfigure => "configure Retro environment",
            Self::RetroWrap => "wrap Retro environment",
        }
    }
}

impl TryFrom<u8> for PacketType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Reset,
            1 => Self::Step,
            2 => Self::GetSpace,
            3 => Self::SampleAction,
            4 => Self::Monitor,
            5 => Self::Render,
            6 => Self::Upload,
            7 => Self::UniverseConfigure,
            8 => Self::UniverseWrap,
            9 => Self::RetroConfigure,
            10 => Self::RetroWrap,
            other => return Err(CodecError::UnknownPacketType(other)),
        })
    }
}

/// Which space a GetSpace request asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SpaceId {
    Action = 0,
    Observation = 1,
}

impl TryFrom<u8> for SpaceId {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Action),
            1 => Ok(Self::Observation),
            other => Err(CodecError::UnknownSpaceId(other)),
        }
    }
}

/// Leading byte of an observation response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObservationEncoding {
    Json = 0,
    ByteList = 1,
}

impl TryFrom<u8> for ObservationEncoding {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Json),
            1 => Ok(Self::ByteList),
            other => Err(CodecError::UnknownObservationEncoding(other)),
        }
    }
}

/// A complete client request, including the connection handshake
///
/// Paths carried by [`Request::Monitor`] and [`Request::Upload`] must already
/// be absolute; the server has no knowledge of the client's working
/// directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Opening exchange naming the environment to create
    Handshake { env_name: String },

    Reset,

    Step { action: Action },

    GetSpace { space: SpaceId },

    SampleAction,

    Monitor {
        dir: String,
        force: bool,
        resume: bool,
        video: bool,
    },

    /// Fire-and-forget; the server sends no response
    Render,

    Upload {
        dir: String,
        api_key: String,
        algorithm_id: Option<String>,
    },

    UniverseConfigure { options: JsonMap },

    UniverseWrap { wrapper: String, options: JsonMap },

    RetroConfigure { options: JsonMap },

    RetroWrap { wrapper: String, options: JsonMap },
}

impl Request {
    /// Opcode for this request, or `None` for the handshake
    pub fn packet_type(&self) -> Option<PacketType> {
        Some(match self {
            Self::Handshake { .. } => return None,
            Self::Reset => PacketType::Reset,
            Self::Step { .. } => PacketType::Step,
            Self::GetSpace { .. } => PacketType::GetSpace,
            Self::SampleAction => PacketType::SampleAction,
            Self::Monitor { .. } => PacketType::Monitor,
            Self::Render => PacketType::Render,
            Self::Upload { .. } => PacketType::Upload,
            Self::UniverseConfigure { .. } => PacketType::UniverseConfigure,
            Self::UniverseWrap { .. } => PacketType::UniverseWrap,
            Self::RetroConfigure { .. } => PacketType::RetroConfigure,
            Self::RetroWrap { .. } => PacketType::RetroWrap,
        })
    }

    /// Operation name for log and error context
    pub fn name(&self) -> &'static str {
        match self.packet_type() {
            Some(packet) => packet.operation_name(),
            None => HANDSHAKE_OPERATION,
        }
    }

    /// Whether the server answers this request at all
    pub fn expects_response(&self) -> bool {
        !matches!(self, Self::Render)
    }
}
