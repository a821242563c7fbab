//! Message definitions
//!
//! Request/response shapes exchanged between register clients and replicas.

use serde::{Deserialize, Serialize};

use crate::tag::Tag;

/// Message types (first header byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    GetRequest = 0x01,
    SetRequest = 0x02,
    GetResponse = 0x81,
    SetResponse = 0x82,
    Error = 0xFF,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(MessageType::GetRequest),
            0x02 => Some(MessageType::SetRequest),
            0x81 => Some(MessageType::GetResponse),
            0x82 => Some(MessageType::SetResponse),
            0xFF => Some(MessageType::Error),
            _ => None,
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Read the replica's current entry for `key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    pub key: String,
}

/// Snapshot of one replica's entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    /// `false` if the key has never been written on this replica
    pub exists: bool,
    pub value: String,
    pub timestamp: u64,
    pub writer_id: i64,
}

impl GetResponse {
    pub fn tag(&self) -> Tag {
        Tag::new(self.timestamp, self.writer_id)
    }
}

/// Conditionally overwrite the replica's entry for `key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
    pub timestamp: u64,
    pub writer_id: i64,
}

impl SetRequest {
    pub fn new(key: impl Into<String>, value: impl Into<String>, tag: Tag) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            timestamp: tag.timestamp,
            writer_id: tag.writer_id,
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::new(self.timestamp, self.writer_id)
    }
}

/// Acknowledgement of a `SetRequest`; stale writes are acknowledged too
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResponse {
    pub ok: bool,
}

// =============================================================================
// Envelopes
// =============================================================================

/// A request sent to a replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get(GetRequest),
    Set(SetRequest),
}

impl Request {
    pub fn message_type(&self) -> MessageType {
        match self {
            Request::Get(_) => MessageType::GetRequest,
            Request::Set(_) => MessageType::SetRequest,
        }
    }

    /// Key addressed by this request
    pub fn key(&self) -> &str {
        match self {
            Request::Get(req) => &req.key,
            Request::Set(req) => &req.key,
        }
    }
}

/// A response sent back by a replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Get(GetResponse),
    Set(SetResponse),

    /// The replica could not serve the request
    Error(String),
}

impl Response {
    pub fn message_type(&self) -> MessageType {
        match self {
            Response::Get(_) => MessageType::GetResponse,
            Response::Set(_) => MessageType::SetResponse,
            Response::Error(_) => MessageType::Error,
        }
    }

    pub fn error(message: &str) -> Self {
        Response::Error(message.to_string())
    }
}
