//! Snappy-framed protobuf bodies.
//!
//! Remote-read bodies use the snappy block format (not the streaming frame
//! format) around a single protobuf message.

use crate::remote::proto::{ReadRequest, ReadResponse};
use prost::Message;
use thiserror::Error;

/// Content type of remote-read responses.
pub const CONTENT_TYPE: &str = "application/x-protobuf";
/// Content encoding of remote-read bodies.
pub const CONTENT_ENCODING: &str = "snappy";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("snappy: {0}")]
    Snappy(#[from] snap::Error),

    #[error("protobuf: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("protobuf: {0}")]
    Encode(#[from] prost::EncodeError),
}

/// Decompress and decode a read request body.
pub fn decode_read_request(body: &[u8]) -> Result<ReadRequest, CodecError> {
    let raw = snap::raw::Decoder::new().decompress_vec(body)?;
    Ok(ReadRequest::decode(raw.as_slice())?)
}

/// Encode and compress a read request (client side and tests).
pub fn encode_read_request(request: &ReadRequest) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::with_capacity(request.encoded_len());
    request.encode(&mut raw)?;
    Ok(snap::raw::Encoder::new().compress_vec(&raw)?)
}

/// Encode and compress a read response body.
pub fn encode_read_response(response: &ReadResponse) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::with_capacity(response.encoded_len());
    response.encode(&mut raw)?;
    Ok(snap::raw::Encoder::new().compress_vec(&raw)?)
}

/// Decompress and decode a read response body (client side and tests).
pub fn decode_read_response(body: &[u8]) -> Result<ReadResponse, CodecError> {
    let raw = snap::raw::Decoder::new().decompress_vec(body)?;
    Ok(ReadResponse::decode(raw.as_slice())?)
}
