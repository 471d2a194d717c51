//! # RESP2 Framing
//!
//! Purpose: Encode commands and decode replies for Redis-compatible stores
//! without pulling in a full client library.
//!
//! ## Design Principles
//! 1. **Buffer Reuse**: The reader keeps one line buffer per connection.
//! 2. **Binary-Safe**: Bulk strings are raw bytes end to end.
//! 3. **Fail Fast**: Any framing violation is `ClientError::Protocol`.

use std::io::{BufRead, BufReader, Read};

use crate::client::{ClientError, ClientResult};

/// Redis `proto-max-bulk-len` default (512 MiB).
const MAX_DECLARED_LEN: i64 = 512 * 1024 * 1024;
/// Array slots reserved up front; larger arrays grow as elements arrive.
const ARRAY_PREALLOC: usize = 64;

/// One decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK`, `+PONG`.
    Simple(Vec<u8>),
    /// `-ERR ...`.
    Error(Vec<u8>),
    /// `:42`.
    Integer(i64),
    /// `$5 hello`, `None` for the null bulk string.
    Bulk(Option<Vec<u8>>),
    /// `*n ...`, `None` for the null array.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Turns a server error reply into `ClientError::Server`.
    pub fn into_result(self) -> ClientResult<RespValue> {
        match self {
            RespValue::Error(message) => Err(ClientError::Server { message }),
            other => Ok(other),
        }
    }
}

/// Appends one command as a RESP array of bulk strings.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], out: &mut Vec<u8>) {
    push_header(out, b'*', args.len());
    for arg in args {
        let arg = arg.as_ref();
        push_header(out, b'$', arg.len());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

fn push_header(out: &mut Vec<u8>, prefix: u8, len: usize) {
    out.push(prefix);
    out.extend_from_slice(len.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Reply decoder over a buffered byte stream.
pub struct RespReader<R> {
    inner: BufReader<R>,
    line: Vec<u8>,
}

impl<R: Read> RespReader<R> {
    pub fn new(inner: R) -> Self {
        RespReader {
            inner: BufReader::new(inner),
            line: Vec::with_capacity(128),
        }
    }

    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }

    /// Reads one complete reply, recursing into arrays.
    pub fn read_value(&mut self) -> ClientResult<RespValue> {
        self.read_line()?;
        let (&tag, body) = self.line.split_first().ok_or(ClientError::Protocol)?;
        match tag {
            b'+' => Ok(RespValue::Simple(body.to_vec())),
            b'-' => Ok(RespValue::Error(body.to_vec())),
            b':' => Ok(RespValue::Integer(parse_i64(body)?)),
            b'$' => {
                let len = parse_i64(body)?;
                self.read_bulk(len)
            }
            b'*' => {
                let len = parse_i64(body)?;
                if len < 0 {
                    return Ok(RespValue::Array(None));
                }
                let len = checked_len(len)?;
                let mut items = Vec::with_capacity(len.min(ARRAY_PREALLOC));
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                Ok(RespValue::Array(Some(items)))
            }
            _ => Err(ClientError::Protocol),
        }
    }

    fn read_bulk(&mut self, len: i64) -> ClientResult<RespValue> {
        if len < 0 {
            return Ok(RespValue::Bulk(None));
        }
        let len = checked_len(len)?;
        // Payload plus the trailing CRLF in one read.
        let mut data = vec![0u8; len + 2];
        self.inner.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(ClientError::Protocol);
        }
        data.truncate(len);
        Ok(RespValue::Bulk(Some(data)))
    }

    fn read_line(&mut self) -> ClientResult<()> {
        self.line.clear();
        if self.inner.read_until(b'\n', &mut self.line)? == 0 {
            return Err(ClientError::Protocol);
        }
        if !self.line.ends_with(b"\r\n") {
            return Err(ClientError::Protocol);
        }
        self.line.truncate(self.line.len() - 2);
        Ok(())
    }
}

/// Rejects declared lengths beyond what a server may legally send.
fn checked_len(len: i64) -> ClientResult<usize> {
    if len > MAX_DECLARED_LEN {
        return Err(ClientError::Protocol);
    }
    usize::try_from(len).map_err(|_| ClientError::Protocol)
}

fn parse_i64(data: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(ClientError::Protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> ClientResult<RespValue> {
        RespReader::new(Cursor::new(bytes.to_vec())).read_value()
    }

    #[test]
    fn encodes_command() {
        let mut buf = Vec::new();
        encode_command(&[&b"GET"[..], b"key"], &mut buf);
        assert_eq!(&buf, b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn encodes_empty_argument() {
        let mut buf = Vec::new();
        encode_command(&["SET", "k", ""], &mut buf);
        assert_eq!(&buf, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n");
    }

    #[test]
    fn parses_scalars() {
        assert_eq!(decode(b"+OK\r\n").unwrap(), RespValue::Simple(b"OK".to_vec()));
        assert_eq!(decode(b"-ERR bad\r\n").unwrap(), RespValue::Error(b"ERR bad".to_vec()));
        assert_eq!(decode(b":-42\r\n").unwrap(), RespValue::Integer(-42));
    }

    #[test]
    fn parses_bulk_strings() {
        assert_eq!(
            decode(b"$5\r\nhe\r\no\r\n").unwrap(),
            RespValue::Bulk(Some(b"he\r\no".to_vec()))
        );
        assert_eq!(decode(b"$-1\r\n").unwrap(), RespValue::Bulk(None));
    }

    #[test]
    fn parses_nested_array_with_nulls() {
        let value = decode(b"*3\r\n$1\r\na\r\n$-1\r\n*1\r\n:7\r\n").unwrap();
        assert_eq!(
            value,
            RespValue::Array(Some(vec![
                RespValue::Bulk(Some(b"a".to_vec())),
                RespValue::Bulk(None),
                RespValue::Array(Some(vec![RespValue::Integer(7)])),
            ]))
        );
        assert_eq!(decode(b"*-1\r\n").unwrap(), RespValue::Array(None));
    }

    #[test]
    fn rejects_bad_framing() {
        assert!(matches!(decode(b"+OK\n"), Err(ClientError::Protocol)));
        assert!(matches!(decode(b"?what\r\n"), Err(ClientError::Protocol)));
        assert!(matches!(decode(b":4x\r\n"), Err(ClientError::Protocol)));
        assert!(matches!(decode(b"$3\r\nabcd\r\n"), Err(ClientError::Protocol)));
        assert!(matches!(decode(b""), Err(ClientError::Protocol)));
    }

    #[test]
    fn reads_consecutive_replies() {
        let mut reader = RespReader::new(Cursor::new(b"+PONG\r\n:1\r\n".to_vec()));
        assert_eq!(reader.read_value().unwrap(), RespValue::Simple(b"PONG".to_vec()));
        assert_eq!(reader.read_value().unwrap(), RespValue::Integer(1));
    }

    #[test]
    fn server_error_becomes_client_error() {
        let err = RespValue::Error(b"WRONGTYPE".to_vec()).into_result().unwrap_err();
        assert!(matches!(err, ClientError::Server { message } if message == b"WRONGTYPE"));
    }

    #[test]
    fn rejects_oversized_lengths() {
        assert!(matches!(
            decode(b"*9223372036854775807\r\n"),
            Err(ClientError::Protocol)
        ));
        assert!(matches!(
            decode(b"$9223372036854775807\r\n"),
            Err(ClientError::Protocol)
        ));
        assert!(matches!(decode(b"$536870913\r\n"), Err(ClientError::Protocol)));
    }

    #[test]
    fn large_array_header_with_short_body_fails_cleanly() {
        // Declared within bounds but the stream ends after one element.
        assert!(matches!(
            decode(b"*100000000\r\n:1\r\n"),
            Err(ClientError::Protocol)
        ));
    }
}
