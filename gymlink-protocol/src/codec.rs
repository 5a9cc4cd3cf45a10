//! Framing codec for the environment protocol
//!
//! Every multi-byte value on the wire is little-endian and is written and
//! read through explicit `*_le` accessors. Writers stage into any [`BufMut`]
//! so a request is complete before it reaches the socket. Readers pull from
//! a blocking [`Read`] cursor and consume exactly the bytes of the element
//! they decode.

use std::io::Read;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::messages::{ObservationEncoding, PacketType, Request, ACTION_TYPE_JSON, HANDSHAKE_FLAGS};
use crate::types::{Action, ByteList, JsonMap, Observation};

/// Maximum size of a single byte field (256 MB)
pub const MAX_FIELD_SIZE: usize = 256 * 1024 * 1024;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Field too large: {size} bytes (max {max})")]
    FieldTooLarge { size: usize, max: usize },

    #[error("Unknown observation type: {0}")]
    UnknownObservationEncoding(u8),

    #[error("Byte list has 0 dimensions")]
    InvalidShape,

    #[error("Byte list has {ndims} dimensions, too deep to nest (max {max})")]
    TooManyDimensions { ndims: usize, max: usize },

    #[error("Byte list header truncated: need {needed} bytes, have {available}")]
    TruncatedHeader { needed: usize, available: usize },

    #[error("Incorrect byte list size: shape {dims:?} does not match {actual} bytes")]
    ShapeMismatch { dims: Vec<usize>, actual: usize },

    #[error("Unsupported action type: {0}")]
    UnsupportedActionType(u8),

    #[error("Invalid bool: {0}")]
    InvalidBoolean(u8),

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u8),

    #[error("Unknown space ID: {0}")]
    UnknownSpaceId(u8),
}

impl CodecError {
    /// Whether a read that failed this way left the stream mid-element
    ///
    /// After such an error the position of the next response is unknown
    /// and the connection cannot be used again.
    pub fn breaks_framing(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::FieldTooLarge { .. } | Self::UnsupportedActionType(_)
        )
    }
}

/// Encoder for complete client requests
///
/// Encoding either appends the whole request to the buffer or leaves the
/// buffer as it was.
#[derive(Debug)]
pub struct RequestCodec;

impl RequestCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Request> for RequestCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        let result = encode_request(&item, dst);
        if result.is_err() {
            dst.truncate(start);
        }
        result
    }
}

fn encode_request(request: &Request, dst: &mut BytesMut) -> Result<(), CodecError> {
    match request.packet_type() {
        Some(packet) => put_packet_type(dst, packet),
        None => dst.put_u8(HANDSHAKE_FLAGS),
    }

    match request {
        Request::Handshake { env_name } => put_byte_field(dst, env_name.as_bytes())?,
        Request::Reset | Request::SampleAction | Request::Render => {}
        Request::Step { action } => put_action(dst, action)?,
        Request::GetSpace { space } => dst.put_u8(*space as u8),
        Request::Monitor {
            dir,
            force,
            resume,
            video,
        } => {
            // The server reads resume before force.
            put_bool(dst, *resume);
            put_bool(dst, *force);
            put_bool(dst, *video);
            put_byte_field(dst, dir.as_bytes())?;
        }
        Request::Upload {
            dir,
            api_key,
            algorithm_id,
        } => {
            put_byte_field(dst, dir.as_bytes())?;
            put_byte_field(dst, api_key.as_bytes())?;
            put_byte_field(dst, algorithm_id.as_deref().unwrap_or_default().as_bytes())?;
        }
        Request::UniverseConfigure { options } | Request::RetroConfigure { options } => {
            put_json_field(dst, options)?;
        }
        Request::UniverseWrap { wrapper, options } | Request::RetroWrap { wrapper, options } => {
            put_byte_field(dst, wrapper.as_bytes())?;
            put_json_field(dst, options)?;
        }
    }
    Ok(())
}

// ==================== Writers ====================

/// Write a length-prefixed byte field
pub fn put_byte_field<B: BufMut>(dst: &mut B, field: &[u8]) -> Result<(), CodecError> {
    if field.len() > MAX_FIELD_SIZE {
        return Err(CodecError::FieldTooLarge {
            size: field.len(),
            max: MAX_FIELD_SIZE,
        });
    }
    dst.put_u32_le(field.len() as u32);
    dst.put_slice(field);
    Ok(())
}

pub fn put_packet_type<B: BufMut>(dst: &mut B, packet: PacketType) {
    dst.put_u8(packet as u8);
}

pub fn put_bool<B: BufMut>(dst: &mut B, flag: bool) {
    dst.put_u8(u8::from(flag));
}

pub fn put_reward<B: BufMut>(dst: &mut B, reward: f64) {
    dst.put_f64_le(reward);
}

pub fn put_action<B: BufMut>(dst: &mut B, action: &Action) -> Result<(), CodecError> {
    dst.put_u8(ACTION_TYPE_JSON);
    put_byte_field(dst, action.as_bytes())
}

/// Write an observation the way a server frames it
pub fn put_observation<B: BufMut>(
    dst: &mut B,
    observation: &Observation,
) -> Result<(), CodecError> {
    match observation {
        Observation::Json(json) => {
            dst.put_u8(ObservationEncoding::Json as u8);
            put_byte_field(dst, json)
        }
        Observation::ByteList(list) => {
            dst.put_u8(ObservationEncoding::ByteList as u8);
            put_byte_field(dst, &encode_byte_list(list))
        }
    }
}

fn put_json_field<B: BufMut>(dst: &mut B, options: &JsonMap) -> Result<(), CodecError> {
    let json = serde_json::to_vec(options)?;
    put_byte_field(dst, &json)
}

/// Encode the payload of a byte-list observation: dimension header then values
pub fn encode_byte_list(list: &ByteList) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 + 4 * list.dims().len() + list.values().len());
    buf.put_u32_le(list.dims().len() as u32);
    for &dim in list.dims() {
        buf.put_u32_le(dim as u32);
    }
    buf.put_slice(list.values());
    buf
}

// ==================== Readers ====================

pub fn read_u8<R: Read>(src: &mut R) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    src.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(src: &mut R) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    src.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a length-prefixed byte field
///
/// A zero length yields an empty value. The length is checked against
/// [`MAX_FIELD_SIZE`] before anything is allocated.
pub fn read_byte_field<R: Read>(src: &mut R) -> Result<Bytes, CodecError> {
    let len = read_u32(src)? as usize;
    if len == 0 {
        return Ok(Bytes::new());
    }
    if len > MAX_FIELD_SIZE {
        return Err(CodecError::FieldTooLarge {
            size: len,
            max: MAX_FIELD_SIZE,
        });
    }

    let mut data = vec![0u8; len];
    src.read_exact(&mut data)?;
    Ok(Bytes::from(data))
}

/// Read an error field: `None` on success, the server's message otherwise
pub fn read_error_field<R: Read>(src: &mut R) -> Result<Option<String>, CodecError> {
    let data = read_byte_field(src)?;
    if data.is_empty() {
        Ok(None)
    } else {
        Ok(Some(String::from_utf8_lossy(&data).into_owned()))
    }
}

pub fn read_reward<R: Read>(src: &mut R) -> Result<f64, CodecError> {
    let mut buf = [0u8; 8];
    src.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Interpret a single wire byte as a boolean; only 0 and 1 are valid
pub fn bool_from_byte(byte: u8) -> Result<bool, CodecError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::InvalidBoolean(other)),
    }
}

pub fn read_bool<R: Read>(src: &mut R) -> Result<bool, CodecError> {
    bool_from_byte(read_u8(src)?)
}

/// An observation as it arrived, before its payload is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationFrame {
    pub encoding: u8,
    pub payload: Bytes,
}

impl ObservationFrame {
    /// Dispatch on the encoding byte and decode the payload
    pub fn decode(self) -> Result<Observation, CodecError> {
        match ObservationEncoding::try_from(self.encoding)? {
            ObservationEncoding::Json => Ok(Observation::Json(self.payload)),
            ObservationEncoding::ByteList => {
                decode_byte_list(self.payload).map(Observation::ByteList)
            }
        }
    }
}

/// Read the encoding byte and payload field of an observation
pub fn read_observation_frame<R: Read>(src: &mut R) -> Result<ObservationFrame, CodecError> {
    let encoding = read_u8(src)?;
    let payload = read_byte_field(src)?;
    Ok(ObservationFrame { encoding, payload })
}

/// Read and decode an observation
///
/// The whole frame is consumed before the payload is interpreted, so decode
/// errors leave the stream positioned after the observation.
pub fn read_observation<R: Read>(src: &mut R) -> Result<Observation, CodecError> {
    read_observation_frame(src)?.decode()
}

/// Decode a byte-list payload: `u32 ndims`, `u32 dim[ndims]`, then values
///
/// The returned values are a view into `data`, not a copy.
pub fn decode_byte_list(data: Bytes) -> Result<ByteList, CodecError> {
    let mut header = &data[..];
    if header.remaining() < 4 {
        return Err(CodecError::TruncatedHeader {
            needed: 4,
            available: header.remaining(),
        });
    }

    let ndims = header.get_u32_le() as usize;
    if ndims == 0 {
        return Err(CodecError::InvalidShape);
    }

    let dims_len = ndims.saturating_mul(4);
    if header.remaining() < dims_len {
        return Err(CodecError::TruncatedHeader {
            needed: 4 + dims_len,
            available: data.len(),
        });
    }

    let mut dims = Vec::with_capacity(ndims);
    for _ in 0..ndims {
        dims.push(header.get_u32_le() as usize);
    }

    let header_len = data.len() - header.remaining();
    ByteList::new(dims, data.slice(header_len..))
}

/// Read a tagged action
///
/// An unknown type tag is reported before its payload is read, since the
/// framing of other action encodings is not defined.
pub fn read_action<R: Read>(src: &mut R) -> Result<Action, CodecError> {
    let type_id = read_u8(src)?;
    if type_id != ACTION_TYPE_JSON {
        return Err(CodecError::UnsupportedActionType(type_id));
    }
    Ok(Action::from_json_bytes(read_byte_field(src)?))
}
