//! Generation 2 binary framing.
//!
//! ```text
//! [request id: u32 LE] [payload length: u32 LE] [payload: JSON, XOR-enciphered]
//! ```
//!
//! The header is encoded with bincode's fixed-width little-endian integers.
//! The payload is a JSON envelope; once the session key is known every
//! payload is enciphered with it, the header never is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use crate::cipher::xor_cipher;
use crate::error::FrameError;

pub const HEADER_LEN: usize = 8;
/// Payloads above this size are treated as a corrupt stream.
pub const MAX_PAYLOAD: usize = 16 * 1024 * 1024;
pub const PROTOCOL_VERSION: u32 = 2;
pub const STATUS_OK: i32 = 200;
pub const STATUS_UNAUTHORIZED: i32 = 401;

pub const SERVER_CONNECT: &str = "ServerConnect";
pub const LOGIN: &str = "Login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub request_id: u32,
    pub length: u32,
}

impl FrameHeader {
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != HEADER_LEN {
            return Err(FrameError::ShortHeader {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let header: FrameHeader = bincode::deserialize(bytes)?;
        if header.length as usize > MAX_PAYLOAD {
            return Err(FrameError::TooLarge {
                len: header.length as usize,
                max: MAX_PAYLOAD,
            });
        }
        Ok(header)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestEnvelope {
    pub auth_token: String,
    pub version: u32,
    pub name: String,
    pub content_body: String,
}

impl RequestEnvelope {
    pub fn new(auth_token: &str, name: &str, content_body: &str) -> Self {
        Self {
            auth_token: auth_token.to_string(),
            version: PROTOCOL_VERSION,
            name: name.to_string(),
            content_body: content_body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseEnvelope {
    pub status_code: i32,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "content_as_string")]
    pub content_body: String,
}

impl ResponseEnvelope {
    pub fn ok(name: &str, content_body: impl Into<String>) -> Self {
        Self {
            status_code: STATUS_OK,
            status_message: "OK".to_string(),
            version: PROTOCOL_VERSION,
            name: name.to_string(),
            content_body: content_body.into(),
        }
    }

    pub fn error(name: &str, status_code: i32, message: &str) -> Self {
        Self {
            status_code,
            status_message: message.to_string(),
            version: PROTOCOL_VERSION,
            name: name.to_string(),
            content_body: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

/// Servers send `ContentBody` either as a string holding JSON or as an inline
/// JSON value; both are normalised to a string.
fn content_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Serialises `envelope`, enciphers it with `key` and prefixes the header.
pub fn encode_frame<T: Serialize>(
    request_id: u32,
    envelope: &T,
    key: &[u8],
) -> Result<Vec<u8>, FrameError> {
    let mut body = serde_json::to_vec(envelope)?;
    if body.len() > MAX_PAYLOAD {
        return Err(FrameError::TooLarge {
            len: body.len(),
            max: MAX_PAYLOAD,
        });
    }
    xor_cipher(&mut body, key, 0);

    let header = FrameHeader {
        request_id,
        length: body.len() as u32,
    };
    let mut frame = header.encode()?;
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Deciphers a frame payload in place and parses the envelope.
pub fn decode_payload<T: for<'de> Deserialize<'de>>(
    payload: &mut [u8],
    key: &[u8],
) -> Result<T, FrameError> {
    xor_cipher(payload, key, 0);
    Ok(serde_json::from_slice(payload)?)
}

pub fn decode_session_key(content_body: &str) -> Result<Vec<u8>, FrameError> {
    let key = STANDARD.decode(content_body.trim())?;
    if key.is_empty() {
        return Err(FrameError::malformed("session key", content_body));
    }
    Ok(key)
}

pub fn encode_session_key(key: &[u8]) -> String {
    STANDARD.encode(key)
}
