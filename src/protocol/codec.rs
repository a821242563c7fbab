//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Message Type
//! - GET / SET request and response: bincode-encoded message struct
//! - ERROR: UTF-8 message

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{GetRequest, GetResponse, MessageType, Request, Response, SetRequest, SetResponse};
use crate::error::{RegisterError, Result};

/// Header size: 1 byte message type + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Framing
// =============================================================================

fn frame(message_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(RegisterError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(message_type as u8);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);

    Ok(message.to_vec())
}

fn encode_payload<T: Serialize>(message_type: MessageType, body: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(body)?;
    frame(message_type, &payload)
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(payload)?)
}

/// Split a complete frame into its type byte and payload
fn unframe(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(RegisterError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let type_byte = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(RegisterError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(RegisterError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok((type_byte, &bytes[HEADER_SIZE..total_len]))
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    match request {
        Request::Get(req) => encode_payload(MessageType::GetRequest, req),
        Request::Set(req) => encode_payload(MessageType::SetRequest, req),
    }
}

/// Decode a request from a complete frame
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let (type_byte, payload) = unframe(bytes)?;

    match MessageType::from_byte(type_byte) {
        Some(MessageType::GetRequest) => Ok(Request::Get(decode_payload::<GetRequest>(payload)?)),
        Some(MessageType::SetRequest) => Ok(Request::Set(decode_payload::<SetRequest>(payload)?)),
        _ => Err(RegisterError::Protocol(format!(
            "Unknown request type: 0x{:02x}",
            type_byte
        ))),
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    match response {
        Response::Get(resp) => encode_payload(MessageType::GetResponse, resp),
        Response::Set(resp) => encode_payload(MessageType::SetResponse, resp),
        Response::Error(message) => frame(MessageType::Error, message.as_bytes()),
    }
}

/// Decode a response from a complete frame
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (type_byte, payload) = unframe(bytes)?;

    match MessageType::from_byte(type_byte) {
        Some(MessageType::GetResponse) => {
            Ok(Response::Get(decode_payload::<GetResponse>(payload)?))
        }
        Some(MessageType::SetResponse) => {
            Ok(Response::Set(decode_payload::<SetResponse>(payload)?))
        }
        Some(MessageType::Error) => Ok(Response::Error(
            String::from_utf8_lossy(payload).into_owned(),
        )),
        _ => Err(RegisterError::Protocol(format!(
            "Unknown response type: 0x{:02x}",
            type_byte
        ))),
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(RegisterError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut message[HEADER_SIZE..])?;
    }

    Ok(message)
}

/// Read a complete request from a stream
///
/// Blocks until a complete request is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let message = read_frame(reader)?;
    decode_request(&message)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader)?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
