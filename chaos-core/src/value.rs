//! Value framing for workload writes.
//!
//! Every value a writer stores is prefixed with the writer index and the step
//! that produced it, so a reader can tell which operation a read reflects:
//!
//! ```text
//! | writer: u64 LE | step: u64 LE | payload ... |
//! ```

use thiserror::Error;

/// Size of the writer/step header in bytes.
pub const HEADER_LEN: usize = 2 * std::mem::size_of::<u64>();

/// Errors decoding a framed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Buffer is shorter than the header.
    #[error("value too short: {len} bytes, header needs {HEADER_LEN}")]
    TooShort {
        /// Length of the rejected buffer.
        len: usize,
    },
}

/// A payload tagged with the writer and step that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    writer: u64,
    step: u64,
    payload: Vec<u8>,
}

impl Value {
    /// Create a new framed value.
    pub fn new(writer: u64, step: u64, payload: Vec<u8>) -> Self {
        Self {
            writer,
            step,
            payload,
        }
    }

    /// Encode to the on-store representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.writer.to_le_bytes());
        buf.extend_from_slice(&self.step.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode from the on-store representation.
    pub fn decode(bytes: &[u8]) -> Result<Self, ValueError> {
        if bytes.len() < HEADER_LEN {
            return Err(ValueError::TooShort { len: bytes.len() });
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        let writer = u64::from_le_bytes(word);
        word.copy_from_slice(&bytes[8..HEADER_LEN]);
        let step = u64::from_le_bytes(word);
        Ok(Self {
            writer,
            step,
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Index of the writer that stored this value.
    pub fn writer(&self) -> u64 {
        self.writer
    }

    /// Step at which the writer stored this value.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// The untagged payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
