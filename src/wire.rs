//! Replicant stream format.
//!
//! A stream is a sequence of frames, one per tuple, with no header or
//! trailer:
//!
//! ```text
//! +----------------+------------------------------------------+
//! | length: u32 LE | bincode((type name, id, attributes))     |
//! +----------------+------------------------------------------+
//! ```
//!
//! Reference placeholders are encoded as tagged attribute values, so a
//! single reference travels as `[Reference, type, remote id]` and a list as
//! `[ReferenceList, type, [remote id, ...]]`. End of input exactly at a frame
//! boundary is the end of the stream; end of input anywhere else is a
//! truncated stream.

use crate::emitter::Listener;
use crate::error::{ReplicateError, Result};
use crate::stats::Stats;
use crate::tuple::{Attributes, Tuple};
use crate::value::RecordId;
use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, BytesMut};
use std::any::Any;
use std::io::{self, Read, Write};

/// Size of the frame length prefix in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Largest frame payload accepted (64MB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Append one encoded tuple frame to `buf`.
pub fn encode_frame(
    type_name: &str,
    id: &RecordId,
    attributes: &Attributes,
    buf: &mut BytesMut,
) -> Result<()> {
    let payload = bincode::serialize(&(type_name, id, attributes))?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ReplicateError::Corrupt(format!(
            "{} {} encodes to {} bytes, over the {} byte frame limit",
            type_name,
            id,
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }
    buf.reserve(FRAME_HEADER_SIZE + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(&payload);
    Ok(())
}

/// Decode a frame payload (without its length prefix).
pub fn decode_payload(payload: &[u8]) -> Result<Tuple> {
    let (type_name, id, attributes): (String, RecordId, Attributes) = bincode::deserialize(payload)?;
    Ok(Tuple {
        type_name,
        id,
        attributes,
    })
}

/// Listener writing every emitted tuple to a byte stream
pub struct StreamWriter<W: Write> {
    out: W,
    buffer: BytesMut,
    written: usize,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            buffer: BytesMut::with_capacity(8192),
            written: 0,
        }
    }

    /// Write a single tuple frame.
    pub fn write_tuple(&mut self, type_name: &str, id: &RecordId, attributes: &Attributes) -> Result<()> {
        self.buffer.clear();
        encode_frame(type_name, id, attributes, &mut self.buffer)?;
        self.out.write_all(&self.buffer)?;
        self.written += 1;
        Ok(())
    }

    /// Number of tuples written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Listener for StreamWriter<W> {
    fn on_tuple(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &mut Attributes,
        _object: &dyn Any,
    ) -> Result<()> {
        self.write_tuple(type_name, id, attributes)
    }

    fn on_complete(&mut self, _stats: &Stats) -> Result<()> {
        self.flush()
    }
}

/// Iterator over the tuples of a byte stream.
///
/// Yields `None` at a clean end of stream. After an error the iterator is
/// exhausted.
pub struct StreamReader<R: Read> {
    input: R,
    done: bool,
}

impl<R: Read> StreamReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, done: false }
    }

    /// Read the next tuple, `Ok(None)` at end of stream.
    pub fn read_tuple(&mut self) -> Result<Option<Tuple>> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let got = read_fully(&mut self.input, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < FRAME_HEADER_SIZE {
            return Err(ReplicateError::Truncated {
                expected: FRAME_HEADER_SIZE,
                actual: got,
            });
        }

        let len = LittleEndian::read_u32(&header) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(ReplicateError::Corrupt(format!(
                "frame length {} exceeds the {} byte limit",
                len, MAX_FRAME_SIZE
            )));
        }

        let mut payload = Vec::with_capacity(len);
        (&mut self.input).take(len as u64).read_to_end(&mut payload)?;
        if payload.len() < len {
            return Err(ReplicateError::Truncated {
                expected: len,
                actual: payload.len(),
            });
        }

        let tuple = decode_payload(&payload)?;
        log::debug!("decoded {}:{} ({} bytes)", tuple.type_name, tuple.id, len);
        Ok(Some(tuple))
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: Read> Iterator for StreamReader<R> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_tuple() {
            Ok(Some(tuple)) => Some(Ok(tuple)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the input allows; returns the bytes read.
fn read_fully<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
