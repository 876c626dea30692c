use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// JSON-RPC envelope returned by the ledger RPC endpoints.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Transaction outcomes of one block, as returned by `block_results`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockResults {
    #[serde(default)]
    pub height: String,
    /// The RPC sends `null` for blocks without transactions.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub txs_results: Vec<TxResult>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TxResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub events: Vec<Event>,
}

/// A tagged event emitted by a transaction.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// Maps the RPC field named `type` into a Rust-safe identifier.
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct EventAttribute {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub index: bool,
}

/// How the RPC encodes attribute keys and values on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeEncoding {
    /// Tendermint 0.34 and older: base64 of the raw bytes.
    #[default]
    Base64,
    /// Newer RPCs send attributes as plain strings.
    Plain,
}

impl FromStr for AttributeEncoding {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "plain" => Ok(Self::Plain),
            other => Err(format!("unknown attribute encoding `{other}`")),
        }
    }
}

impl fmt::Display for AttributeEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 => write!(f, "base64"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeDecodeError {
    #[error("attribute {position} {field} is not valid base64: {message}")]
    Base64 {
        position: usize,
        field: &'static str,
        message: String,
    },
    #[error("attribute {position} {field} is not valid UTF-8")]
    Utf8 {
        position: usize,
        field: &'static str,
    },
}

/// One attribute after wire decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttribute {
    pub key: String,
    pub value: String,
}

impl EventAttribute {
    /// Decodes key and value according to the wire encoding. Missing fields decode to empty
    /// strings.
    pub fn decode(
        &self,
        position: usize,
        encoding: AttributeEncoding,
    ) -> Result<DecodedAttribute, AttributeDecodeError> {
        Ok(DecodedAttribute {
            key: decode_field(self.key.as_deref(), position, "key", encoding)?,
            value: decode_field(self.value.as_deref(), position, "value", encoding)?,
        })
    }
}

impl Event {
    /// Decodes every attribute in order, failing on the first malformed one.
    pub fn decode_attributes(
        &self,
        encoding: AttributeEncoding,
    ) -> Result<Vec<DecodedAttribute>, AttributeDecodeError> {
        self.attributes
            .iter()
            .enumerate()
            .map(|(position, attribute)| attribute.decode(position, encoding))
            .collect()
    }
}

fn decode_field(
    raw: Option<&str>,
    position: usize,
    field: &'static str,
    encoding: AttributeEncoding,
) -> Result<String, AttributeDecodeError> {
    let Some(raw) = raw else {
        return Ok(String::new());
    };

    match encoding {
        AttributeEncoding::Plain => Ok(raw.to_string()),
        AttributeEncoding::Base64 => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(raw)
                .map_err(|err| AttributeDecodeError::Base64 {
                    position,
                    field,
                    message: err.to_string(),
                })?;
            String::from_utf8(bytes).map_err(|_| AttributeDecodeError::Utf8 { position, field })
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
