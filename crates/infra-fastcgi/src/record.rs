//! FastCGI record framing.
//!
//! Every record is an 8-byte header (version, type, request id, content
//! length, padding length, reserved) followed by content and padding.
//! `RecordCodec` plugs that framing into `tokio_util::codec` so a socket
//! can be driven as a `Sink<Record>` + `Stream<Item = Record>`.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FastCgiError;

pub const FCGI_VERSION_1: u8 = 1;
pub const HEADER_LEN: usize = 8;
pub const MAX_CONTENT_LENGTH: usize = u16::MAX as usize;

/// Only one request is ever in flight per connection
pub const REQUEST_ID: u16 = 1;

pub const ROLE_RESPONDER: u16 = 1;
pub const FLAG_KEEP_CONN: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    BeginRequest,
    AbortRequest,
    EndRequest,
    Params,
    Stdin,
    Stdout,
    Stderr,
    Data,
    GetValues,
    GetValuesResult,
    UnknownType,
}

impl RecordType {
    pub fn as_u8(self) -> u8 {
        match self {
            RecordType::BeginRequest => 1,
            RecordType::AbortRequest => 2,
            RecordType::EndRequest => 3,
            RecordType::Params => 4,
            RecordType::Stdin => 5,
            RecordType::Stdout => 6,
            RecordType::Stderr => 7,
            RecordType::Data => 8,
            RecordType::GetValues => 9,
            RecordType::GetValuesResult => 10,
            RecordType::UnknownType => 11,
        }
    }
}

impl TryFrom<u8> for RecordType {
    type Error = FastCgiError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => RecordType::BeginRequest,
            2 => RecordType::AbortRequest,
            3 => RecordType::EndRequest,
            4 => RecordType::Params,
            5 => RecordType::Stdin,
            6 => RecordType::Stdout,
            7 => RecordType::Stderr,
            8 => RecordType::Data,
            9 => RecordType::GetValues,
            10 => RecordType::GetValuesResult,
            11 => RecordType::UnknownType,
            other => {
                return Err(FastCgiError::Malformed(format!(
                    "unknown record type {}",
                    other
                )))
            }
        })
    }
}

/// Protocol-level outcome carried by END_REQUEST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStatus {
    RequestComplete,
    CantMpxConn,
    Overloaded,
    UnknownRole,
    Other(u8),
}

impl From<u8> for ProtocolStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => ProtocolStatus::RequestComplete,
            1 => ProtocolStatus::CantMpxConn,
            2 => ProtocolStatus::Overloaded,
            3 => ProtocolStatus::UnknownRole,
            other => ProtocolStatus::Other(other),
        }
    }
}

impl From<ProtocolStatus> for u8 {
    fn from(status: ProtocolStatus) -> Self {
        match status {
            ProtocolStatus::RequestComplete => 0,
            ProtocolStatus::CantMpxConn => 1,
            ProtocolStatus::Overloaded => 2,
            ProtocolStatus::UnknownRole => 3,
            ProtocolStatus::Other(other) => other,
        }
    }
}

impl fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolStatus::RequestComplete => write!(f, "REQUEST_COMPLETE"),
            ProtocolStatus::CantMpxConn => write!(f, "CANT_MPX_CONN"),
            ProtocolStatus::Overloaded => write!(f, "OVERLOADED"),
            ProtocolStatus::UnknownRole => write!(f, "UNKNOWN_ROLE"),
            ProtocolStatus::Other(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub record_type: RecordType,
    pub request_id: u16,
    pub content: Bytes,
}

impl Record {
    pub fn new(record_type: RecordType, request_id: u16, content: impl Into<Bytes>) -> Self {
        Self {
            record_type,
            request_id,
            content: content.into(),
        }
    }

    /// Zero-length record closing a PARAMS/STDIN/STDOUT/STDERR stream
    pub fn end_of_stream(record_type: RecordType, request_id: u16) -> Self {
        Self::new(record_type, request_id, Bytes::new())
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.content.is_empty()
    }

    pub fn begin_request(request_id: u16, keep_alive: bool) -> Self {
        let mut body = BytesMut::with_capacity(8);
        body.put_u16(ROLE_RESPONDER);
        body.put_u8(if keep_alive { FLAG_KEEP_CONN } else { 0 });
        body.put_bytes(0, 5);
        Self::new(RecordType::BeginRequest, request_id, body.freeze())
    }
}

/// Split `data` into records of at most `MAX_CONTENT_LENGTH` bytes, followed
/// by the zero-length terminator.
pub fn stream_records(record_type: RecordType, request_id: u16, data: &[u8]) -> Vec<Record> {
    let mut records: Vec<Record> = data
        .chunks(MAX_CONTENT_LENGTH)
        .map(|chunk| Record::new(record_type, request_id, Bytes::copy_from_slice(chunk)))
        .collect();
    records.push(Record::end_of_stream(record_type, request_id));
    records
}

/// Decoded END_REQUEST body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRequest {
    pub app_status: u32,
    pub protocol_status: ProtocolStatus,
}

impl EndRequest {
    pub fn parse(content: &[u8]) -> Result<Self, FastCgiError> {
        if content.len() < 8 {
            return Err(FastCgiError::Malformed(format!(
                "END_REQUEST body is {} bytes, expected 8",
                content.len()
            )));
        }
        let mut buf = content;
        let app_status = buf.get_u32();
        let protocol_status = ProtocolStatus::from(buf.get_u8());
        Ok(Self {
            app_status,
            protocol_status,
        })
    }

    pub fn into_record(self, request_id: u16) -> Record {
        let mut body = BytesMut::with_capacity(8);
        body.put_u32(self.app_status);
        body.put_u8(self.protocol_status.into());
        body.put_bytes(0, 3);
        Record::new(RecordType::EndRequest, request_id, body.freeze())
    }
}

/// Codec framing FastCGI records
#[derive(Debug, Clone)]
pub struct RecordCodec {
    max_content_length: usize,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCodec {
    pub fn new() -> Self {
        Self {
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }

    /// Reject incoming records whose declared content exceeds `max`
    pub fn with_max_content_length(max: usize) -> Self {
        Self {
            max_content_length: max.min(MAX_CONTENT_LENGTH),
        }
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = FastCgiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let version = src[0];
        if version != FCGI_VERSION_1 {
            return Err(FastCgiError::Malformed(format!(
                "unsupported protocol version {}",
                version
            )));
        }
        let record_type = RecordType::try_from(src[1])?;
        let request_id = u16::from_be_bytes([src[2], src[3]]);
        let content_length = u16::from_be_bytes([src[4], src[5]]) as usize;
        let padding_length = src[6] as usize;

        if content_length > self.max_content_length {
            return Err(FastCgiError::Malformed(format!(
                "content length {} exceeds maximum {}",
                content_length, self.max_content_length
            )));
        }

        let total = HEADER_LEN + content_length + padding_length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let content = src.split_to(content_length).freeze();
        src.advance(padding_length);

        tracing::trace!(?record_type, request_id, content_length, "Decoded record");

        Ok(Some(Record {
            record_type,
            request_id,
            content,
        }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(record) => Ok(Some(record)),
            None if buf.is_empty() => Ok(None),
            // peer hung up in the middle of a record
            None => Err(FastCgiError::Closed),
        }
    }
}

impl Encoder<Record> for RecordCodec {
    type Error = FastCgiError;

    fn encode(&mut self, item: Record, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let content_length = item.content.len();
        if content_length > MAX_CONTENT_LENGTH {
            return Err(FastCgiError::Malformed(format!(
                "record content of {} bytes does not fit a single record",
                content_length
            )));
        }
        // pad content to an 8-byte boundary
        let padding_length = (8 - content_length % 8) % 8;

        dst.reserve(HEADER_LEN + content_length + padding_length);
        dst.put_u8(FCGI_VERSION_1);
        dst.put_u8(item.record_type.as_u8());
        dst.put_u16(item.request_id);
        dst.put_u16(content_length as u16);
        dst.put_u8(padding_length as u8);
        dst.put_u8(0);
        dst.extend_from_slice(&item.content);
        dst.put_bytes(0, padding_length);
        Ok(())
    }
}
