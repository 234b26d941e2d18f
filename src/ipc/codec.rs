//! Incremental newline-delimited JSON decoder. Owns a byte buffer and
//! yields zero or more framed messages per `feed()` call, the way a
//! `tokio_util::codec::Decoder` would, but exposed directly so both the
//! server and client connection loops can drive it from a plain
//! `AsyncRead` without committing to the `Framed` wrapper.

use serde::de::DeserializeOwned;

use crate::error::{BrokerError, Result};

#[derive(Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed raw bytes read off the socket; returns every complete
    /// newline-terminated JSON message now available, in order.
    pub fn feed<T: DeserializeOwned>(&mut self, chunk: &[u8]) -> Result<Vec<T>> {
        self.buf.extend_from_slice(chunk);
        let mut messages = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1]; // strip the newline
            if line.is_empty() {
                continue;
            }
            let value = serde_json::from_slice(line)
                .map_err(|e| BrokerError::ProtocolError(format!("malformed frame: {e}")))?;
            messages.push(value);
        }
        Ok(messages)
    }
}

pub fn encode<T: serde::Serialize>(message: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message)
        .map_err(|e| BrokerError::ProtocolError(format!("encoding frame: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn decodes_multiple_frames_in_one_chunk() {
        let mut decoder = LineDecoder::new();
        let messages: Vec<Value> = decoder.feed(b"{\"a\":1}\n{\"a\":2}\n").unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn buffers_a_partial_frame() {
        let mut decoder = LineDecoder::new();
        let messages: Vec<Value> = decoder.feed(b"{\"a\":1").unwrap();
        assert!(messages.is_empty());
        let messages: Vec<Value> = decoder.feed(b"}\n").unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn rejects_malformed_json() {
        let mut decoder = LineDecoder::new();
        let result: Result<Vec<Value>> = decoder.feed(b"not json\n");
        assert!(result.is_err());
    }
}
