use std::io::{self, Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

use crate::error::NbtError;
use crate::mutf8;
use crate::tag::TagKind;

/// Bytes read per step when consuming a length-prefixed payload, so a
/// lying length cannot trigger a huge up-front allocation.
const READ_STEP: usize = 4096;

/// Compression applied to an NBT byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zlib,
}

impl Compression {
    /// Detects the compression of a byte stream from its magic bytes:
    /// `1F 8B` is gzip, `78 9C`/`78 DA`/`78 01` are zlib, anything else
    /// is taken as raw NBT.
    pub fn detect(magic: &[u8]) -> Compression {
        match magic {
            [0x1F, 0x8B, ..] => Compression::Gzip,
            [0x78, 0x9C, ..] | [0x78, 0xDA, ..] | [0x78, 0x01, ..] => Compression::Zlib,
            _ => Compression::None,
        }
    }
}

/// Decompresses an entire buffer according to the given compression.
pub(crate) fn decompress(bytes: &[u8], compression: Compression) -> io::Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Gzip => {
            let mut decoder = GzDecoder::new(bytes);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        }
        Compression::Zlib => {
            let mut decoder = ZlibDecoder::new(bytes);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        }
    }
}

/// Compresses an entire buffer according to the given compression.
pub(crate) fn compress(bytes: &[u8], compression: Compression) -> io::Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(bytes)?;
            encoder.finish()
        }
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(bytes)?;
            encoder.finish()
        }
    }
}

/// Byte source wrapper that counts consumed bytes, so parse errors can
/// carry the offset at which they happened.
pub(crate) struct TrackedReader<R> {
    source: R,
    offset: u64,
}

impl<R: Read> TrackedReader<R> {
    pub fn new(source: R) -> Self {
        TrackedReader { source, offset: 0 }
    }

    /// Offset of the next unread byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn eof(&self) -> NbtError {
        NbtError::UnexpectedEnd {
            offset: self.offset,
        }
    }

    fn fill(&mut self, buffer: &mut [u8]) -> Result<(), NbtError> {
        match self.source.read_exact(buffer) {
            Ok(()) => {
                self.offset += buffer.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.eof()),
            Err(e) => Err(NbtError::from(e)),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, NbtError> {
        let mut buffer = [0u8; 1];
        self.fill(&mut buffer)?;
        Ok(buffer[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, NbtError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16, NbtError> {
        let mut buffer = [0u8; 2];
        self.fill(&mut buffer)?;
        Ok(i16::from_be_bytes(buffer))
    }

    pub fn read_u16(&mut self) -> Result<u16, NbtError> {
        let mut buffer = [0u8; 2];
        self.fill(&mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }

    pub fn read_i32(&mut self) -> Result<i32, NbtError> {
        let mut buffer = [0u8; 4];
        self.fill(&mut buffer)?;
        Ok(i32::from_be_bytes(buffer))
    }

    pub fn read_i64(&mut self) -> Result<i64, NbtError> {
        let mut buffer = [0u8; 8];
        self.fill(&mut buffer)?;
        Ok(i64::from_be_bytes(buffer))
    }

    pub fn read_f32(&mut self) -> Result<f32, NbtError> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    pub fn read_f64(&mut self) -> Result<f64, NbtError> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    /// Reads exactly `length` bytes, growing the buffer in bounded steps.
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, NbtError> {
        let mut buffer = Vec::with_capacity(length.min(READ_STEP));
        let mut remaining = length;

        while remaining > 0 {
            let step = remaining.min(READ_STEP);
            let filled = buffer.len();
            buffer.resize(filled + step, 0);
            self.fill(&mut buffer[filled..])?;
            remaining -= step;
        }

        Ok(buffer)
    }

    /// Reads a length-prefixed modified UTF-8 string (tag names and
    /// TAG_String payloads share this layout).
    pub fn read_string(&mut self) -> Result<String, NbtError> {
        let length = self.read_u16()? as usize;
        let start = self.offset;
        let bytes = self.read_bytes(length)?;

        mutf8::decode(&bytes).map_err(|e| NbtError::InvalidString {
            offset: start + e.position as u64,
        })
    }

    /// Reads an array length, rejecting negative values.
    pub fn read_array_length(&mut self, kind: TagKind) -> Result<usize, NbtError> {
        let at = self.offset;
        let length = self.read_i32()?;
        if length < 0 {
            return Err(NbtError::NegativeLength {
                kind,
                length,
                offset: at,
            });
        }
        Ok(length as usize)
    }

    /// Discards exactly `length` bytes.
    pub fn skip_bytes(&mut self, length: u64) -> Result<(), NbtError> {
        let mut scratch = [0u8; READ_STEP];
        let mut remaining = length;
        while remaining > 0 {
            let step = remaining.min(READ_STEP as u64) as usize;
            self.fill(&mut scratch[..step])?;
            remaining -= step as u64;
        }
        Ok(())
    }
}

/// Reads `length` big-endian i32 values.
pub(crate) fn read_i32_array<R: Read>(
    reader: &mut TrackedReader<R>,
    length: usize,
) -> Result<Vec<i32>, NbtError> {
    let mut values = Vec::with_capacity(length.min(READ_STEP));
    for _ in 0..length {
        values.push(reader.read_i32()?);
    }
    Ok(values)
}

/// Reads `length` big-endian i64 values.
pub(crate) fn read_i64_array<R: Read>(
    reader: &mut TrackedReader<R>,
    length: usize,
) -> Result<Vec<i64>, NbtError> {
    let mut values = Vec::with_capacity(length.min(READ_STEP));
    for _ in 0..length {
        values.push(reader.read_i64()?);
    }
    Ok(values)
}
