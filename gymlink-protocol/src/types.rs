//! Payload types carried by requests and responses

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::CodecError;

/// JSON value type for opaque documents (step info, space bounds)
pub use serde_json::Value as JsonValue;

/// Ordered key-value document used for configure/wrap options
pub type JsonMap = serde_json::Map<String, JsonValue>;

/// An environment observation
///
/// The variant is chosen once, from the encoding byte, when the observation
/// is decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Raw JSON document, decoded by the caller
    Json(Bytes),
    /// Multi-dimensional byte array
    ByteList(ByteList),
}

impl Observation {
    pub fn as_json(&self) -> Option<&[u8]> {
        match self {
            Self::Json(json) => Some(json),
            Self::ByteList(_) => None,
        }
    }

    pub fn as_byte_list(&self) -> Option<&ByteList> {
        match self {
            Self::Json(_) => None,
            Self::ByteList(list) => Some(list),
        }
    }

    /// Convert the observation into a caller-chosen type
    ///
    /// JSON observations are deserialized directly. Byte lists are presented
    /// as nested arrays of integers in row-major order, so `[2, 3]` decodes as
    /// `Vec<Vec<u8>>` with two rows of three.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        match self {
            Self::Json(json) => Ok(serde_json::from_slice(json)?),
            Self::ByteList(list) => Ok(serde_json::from_value(list.to_json()?)?),
        }
    }
}

/// Row-major multi-dimensional byte array
///
/// Always has at least one dimension, and the product of the dimensions
/// equals the number of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteList {
    dims: Vec<usize>,
    values: Bytes,
}

impl ByteList {
    pub fn new(dims: Vec<usize>, values: Bytes) -> Result<Self, CodecError> {
        if dims.is_empty() {
            return Err(CodecError::InvalidShape);
        }
        let product = dims.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
        if product != Some(values.len()) {
            return Err(CodecError::ShapeMismatch {
                dims,
                actual: values.len(),
            });
        }
        Ok(Self { dims, values })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Shared handle to the flattened values
    pub fn bytes(&self) -> Bytes {
        self.values.clone()
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Nested JSON arrays following the dimensions
    ///
    /// Fails with [`CodecError::TooManyDimensions`] past
    /// [`MAX_NESTING_DEPTH`] dimensions.
    pub fn to_json(&self) -> Result<JsonValue, CodecError> {
        if self.dims.len() > MAX_NESTING_DEPTH {
            return Err(CodecError::TooManyDimensions {
                ndims: self.dims.len(),
                max: MAX_NESTING_DEPTH,
            });
        }
        Ok(nest(&self.dims, &self.values))
    }
}

/// Deepest byte list that converts to nested JSON, matching serde_json's
/// own recursion limit
pub const MAX_NESTING_DEPTH: usize = 128;

fn nest(dims: &[usize], values: &[u8]) -> JsonValue {
    match dims {
        [] => JsonValue::Array(Vec::new()),
        [_] => JsonValue::Array(values.iter().map(|&v| JsonValue::from(v)).collect()),
        [outer, rest @ ..] => {
            let stride: usize = rest.iter().product();
            JsonValue::Array(
                (0..*outer)
                    .map(|i| nest(rest, &values[i * stride..(i + 1) * stride]))
                    .collect(),
            )
        }
    }
}

/// A JSON-encoded action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    json: Bytes,
}

impl Action {
    /// Serialize any value as an action
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> Result<Self, CodecError> {
        Ok(Self {
            json: serde_json::to_vec(value)?.into(),
        })
    }

    pub fn from_json_bytes(json: impl Into<Bytes>) -> Self {
        Self { json: json.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.json
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(&self.json)?)
    }
}

/// Error converting a space document into a [`Space`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} space: {reason}")]
pub struct SpaceFormatError {
    pub kind: String,
    pub reason: String,
}

/// Description of the legal actions or observations of an environment
///
/// The well-known space shapes are typed; any other `type` is kept by name
/// so an unfamiliar document still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpace", into = "RawSpace")]
pub enum Space {
    Box {
        shape: Vec<usize>,
        low: Vec<f64>,
        high: Vec<f64>,
    },
    Discrete {
        n: u64,
    },
    MultiBinary {
        n: u64,
    },
    MultiDiscrete {
        low: Vec<i64>,
        high: Vec<i64>,
    },
    Tuple {
        subspaces: Vec<Space>,
    },
    Other {
        kind: String,
    },
}

impl Space {
    /// The document's `type` name
    pub fn kind(&self) -> &str {
        match self {
            Self::Box { .. } => "Box",
            Self::Discrete { .. } => "Discrete",
            Self::MultiBinary { .. } => "MultiBinary",
            Self::MultiDiscrete { .. } => "MultiDiscrete",
            Self::Tuple { .. } => "Tuple",
            Self::Other { kind } => kind,
        }
    }
}

/// Wire form of a space document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawSpace {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shape: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    low: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    high: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subspaces: Option<Vec<Space>>,
}

impl RawSpace {
    fn required<T>(&self, field: &str, value: Option<T>) -> Result<T, SpaceFormatError> {
        value.ok_or_else(|| SpaceFormatError {
            kind: self.kind.clone(),
            reason: format!("missing field `{}`", field),
        })
    }

    fn bounds<T: DeserializeOwned>(
        &self,
        field: &str,
        value: Option<&JsonValue>,
    ) -> Result<Vec<T>, SpaceFormatError> {
        let value = self.required(field, value)?;
        serde_json::from_value(value.clone()).map_err(|e| SpaceFormatError {
            kind: self.kind.clone(),
            reason: format!("bad `{}`: {}", field, e),
        })
    }
}

impl TryFrom<RawSpace> for Space {
    type Error = SpaceFormatError;

    fn try_from(raw: RawSpace) -> Result<Self, Self::Error> {
        Ok(match raw.kind.as_str() {
            "Box" => Space::Box {
                shape: raw.required("shape", raw.shape.clone())?,
                low: raw.bounds("low", raw.low.as_ref())?,
                high: raw.bounds("high", raw.high.as_ref())?,
            },
            "Discrete" => Space::Discrete {
                n: raw.required("n", raw.n)?,
            },
            "MultiBinary" => Space::MultiBinary {
                n: raw.required("n", raw.n)?,
            },
            "MultiDiscrete" => Space::MultiDiscrete {
                low: raw.bounds("low", raw.low.as_ref())?,
                high: raw.bounds("high", raw.high.as_ref())?,
            },
            "Tuple" => Space::Tuple {
                subspaces: raw.required("subspaces", raw.subspaces.clone())?,
            },
            other => Space::Other {
                kind: other.to_string(),
            },
        })
    }
}

impl From<Space> for RawSpace {
    fn from(space: Space) -> Self {
        let kind = space.kind().to_string();
        match space {
            Space::Box { shape, low, high } => RawSpace {
                kind,
                shape: Some(shape),
                low: Some(JsonValue::from(low)),
                high: Some(JsonValue::from(high)),
                ..Default::default()
            },
            Space::Discrete { n } | Space::MultiBinary { n } => RawSpace {
                kind,
                n: Some(n),
                ..Default::default()
            },
            Space::MultiDiscrete { low, high } => RawSpace {
                kind,
                low: Some(JsonValue::from(low)),
                high: Some(JsonValue::from(high)),
                ..Default::default()
            },
            Space::Tuple { subspaces } => RawSpace {
                kind,
                subspaces: Some(subspaces),
                ..Default::default()
            },
            Space::Other { .. } => RawSpace {
                kind,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_byte_list_rejects_bad_shapes() {
        assert!(matches!(
            ByteList::new(vec![], Bytes::new()),
            Err(CodecError::InvalidShape)
        ));
        assert!(matches!(
            ByteList::new(vec![2, 2], Bytes::from_static(&[0; 3])),
            Err(CodecError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_byte_list_zero_sized_dimension() {
        let list = ByteList::new(vec![2, 0], Bytes::new()).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.to_json().unwrap(), json!([[], []]));
    }

    #[test]
    fn test_byte_list_to_json_row_major() {
        let list = ByteList::new(vec![2, 3], Bytes::from_static(&[1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(list.to_json().unwrap(), json!([[1, 2, 3], [4, 5, 6]]));
        assert_eq!(list.len(), 6);
    }

    #[test]
    fn test_byte_list_too_deep_for_json() {
        let list = ByteList::new(vec![1; 200_000], Bytes::from_static(&[5])).unwrap();
        assert_eq!(list.dims().len(), 200_000);
        assert!(matches!(
            list.to_json(),
            Err(CodecError::TooManyDimensions { ndims: 200_000, max: 128 })
        ));

        let obs = Observation::ByteList(list);
        assert!(matches!(
            obs.decode::<JsonValue>(),
            Err(CodecError::TooManyDimensions { .. })
        ));

        let deepest =
            ByteList::new(vec![1; MAX_NESTING_DEPTH], Bytes::from_static(&[5])).unwrap();
        assert!(deepest.to_json().is_ok());
    }

    #[test]
    fn test_observation_decode_byte_list() {
        let list = ByteList::new(vec![1, 2, 2], Bytes::from_static(&[9, 8, 7, 6])).unwrap();
        let obs = Observation::ByteList(list);
        let nested: Vec<Vec<Vec<u8>>> = obs.decode().unwrap();
        assert_eq!(nested, vec![vec![vec![9, 8], vec![7, 6]]]);
        assert!(obs.as_json().is_none());
    }

    #[test]
    fn test_observation_decode_json() {
        let obs = Observation::Json(Bytes::from_static(br#"{"x":1.5}"#));
        let value: JsonValue = obs.decode().unwrap();
        assert_eq!(value, json!({"x": 1.5}));
        assert!(obs.as_byte_list().is_none());
    }

    #[test]
    fn test_observation_decode_wrong_type() {
        let obs = Observation::Json(Bytes::from_static(b"\"text\""));
        let result: Result<Vec<u8>, _> = obs.decode();
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_action_json() {
        let action = Action::from_value(&json!({"key": "left"})).unwrap();
        assert_eq!(action.as_bytes(), br#"{"key":"left"}"#);
        let value: JsonValue = action.decode().unwrap();
        assert_eq!(value["key"], "left");
    }

    #[test]
    fn test_space_box() {
        let space: Space = serde_json::from_value(json!({
            "type": "Box",
            "shape": [2],
            "low": [-1.0, -2.0],
            "high": [1.0, 2.0]
        }))
        .unwrap();
        assert_eq!(
            space,
            Space::Box {
                shape: vec![2],
                low: vec![-1.0, -2.0],
                high: vec![1.0, 2.0],
            }
        );
    }

    #[test]
    fn test_space_discrete_and_tuple() {
        let space: Space = serde_json::from_value(json!({
            "type": "Tuple",
            "subspaces": [
                {"type": "Discrete", "n": 4},
                {"type": "MultiBinary", "n": 3},
                {"type": "MultiDiscrete", "low": [0, 0], "high": [4, 1]}
            ]
        }))
        .unwrap();

        match space {
            Space::Tuple { subspaces } => {
                assert_eq!(subspaces[0], Space::Discrete { n: 4 });
                assert_eq!(subspaces[1], Space::MultiBinary { n: 3 });
                assert_eq!(
                    subspaces[2],
                    Space::MultiDiscrete {
                        low: vec![0, 0],
                        high: vec![4, 1],
                    }
                );
            }
            other => panic!("expected Tuple, got {:?}", other),
        }
    }

    #[test]
    fn test_space_unknown_kind_is_kept() {
        let space: Space = serde_json::from_value(json!({"type": "Dict"})).unwrap();
        assert_eq!(space.kind(), "Dict");
        assert_eq!(
            serde_json::to_value(&space).unwrap(),
            json!({"type": "Dict"})
        );
    }

    #[test]
    fn test_space_missing_field() {
        let result: Result<Space, _> = serde_json::from_value(json!({"type": "Discrete"}));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid Discrete space"));
        assert!(err.contains("`n`"));
    }

    #[test]
    fn test_space_serializes_wire_form() {
        let space = Space::Discrete { n: 2 };
        assert_eq!(
            serde_json::to_value(&space).unwrap(),
            json!({"type": "Discrete", "n": 2})
        );
    }
}
