//! Name/value pair encoding for the PARAMS stream.
//!
//! Each length is one byte when it is at most 127, otherwise four bytes
//! big-endian with the high bit set.

use bytes::{Buf, BufMut, BytesMut};
use indexmap::IndexMap;

use crate::error::FastCgiError;

/// Ordered PARAMS map
pub type Params = IndexMap<String, String>;

const SHORT_LENGTH_MAX: usize = 127;
const LONG_LENGTH_FLAG: u32 = 0x8000_0000;
const LONG_LENGTH_MAX: usize = 0x7fff_ffff;

pub fn encode_params(params: &Params) -> Result<BytesMut, FastCgiError> {
    let mut buf = BytesMut::new();
    for (name, value) in params {
        put_length(&mut buf, name.len())?;
        put_length(&mut buf, value.len())?;
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(value.as_bytes());
    }
    Ok(buf)
}

fn put_length(buf: &mut BytesMut, len: usize) -> Result<(), FastCgiError> {
    if len <= SHORT_LENGTH_MAX {
        buf.put_u8(len as u8);
    } else if len <= LONG_LENGTH_MAX {
        buf.put_u32(len as u32 | LONG_LENGTH_FLAG);
    } else {
        return Err(FastCgiError::Malformed(format!(
            "parameter of {} bytes is too long",
            len
        )));
    }
    Ok(())
}

pub fn decode_params(mut data: &[u8]) -> Result<Params, FastCgiError> {
    let mut params = Params::new();
    while data.has_remaining() {
        let name_len = get_length(&mut data)?;
        let value_len = get_length(&mut data)?;
        let name = take_string(&mut data, name_len)?;
        let value = take_string(&mut data, value_len)?;
        params.insert(name, value);
    }
    Ok(params)
}

fn get_length(data: &mut &[u8]) -> Result<usize, FastCgiError> {
    let first = *data
        .first()
        .ok_or_else(|| FastCgiError::Malformed("truncated parameter length".to_string()))?;

    if first & 0x80 == 0 {
        data.advance(1);
        return Ok(first as usize);
    }
    if data.len() < 4 {
        return Err(FastCgiError::Malformed(
            "truncated parameter length".to_string(),
        ));
    }
    Ok((data.get_u32() & !LONG_LENGTH_FLAG) as usize)
}

fn take_string(data: &mut &[u8], len: usize) -> Result<String, FastCgiError> {
    if data.len() < len {
        return Err(FastCgiError::Malformed(format!(
            "parameter needs {} bytes, {} left",
            len,
            data.len()
        )));
    }
    let (head, tail) = data.split_at(len);
    *data = tail;
    String::from_utf8(head.to_vec())
        .map_err(|_| FastCgiError::Malformed("parameter is not valid UTF-8".to_string()))
}
