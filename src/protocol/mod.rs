//! Protocol Module
//!
//! Defines the wire protocol between register clients and replicas.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Message Types
//! - 0x01: GET request   - Payload: bincode(GetRequest)
//! - 0x02: SET request   - Payload: bincode(SetRequest)
//! - 0x81: GET response  - Payload: bincode(GetResponse)
//! - 0x82: SET response  - Payload: bincode(SetResponse)
//! - 0xFF: ERROR         - Payload: UTF-8 message
//!
//! The protocol is stateless per call: each request frame is answered by
//! exactly one response frame on the same connection.

mod codec;
mod message;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use message::{
    GetRequest, GetResponse, MessageType, Request, Response, SetRequest, SetResponse,
};
