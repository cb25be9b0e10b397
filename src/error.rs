use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::position::RegionPosition;
use crate::tag::TagKind;

/// Possible errors while reading or writing NBT data.
#[derive(Debug)]
pub enum NbtError {
    /// The underlying byte source or sink failed.
    Io { io_error: io::Error },
    /// The stream ended in the middle of a tag.
    UnexpectedEnd {
        /// Stream offset at which more bytes were expected.
        offset: u64,
    },
    /// A kind byte outside `0..=12` was encountered.
    InvalidKind { kind: u8, offset: u64 },
    /// A string payload is not valid modified UTF-8.
    InvalidString { offset: u64 },
    /// An array or list declared a negative length.
    NegativeLength {
        kind: TagKind,
        length: i32,
        offset: u64,
    },
    /// The root of the document is not a TAG_Compound.
    InvalidRoot { kind: u8 },
    /// A TAG_Compound contains the same name twice.
    DuplicateName { name: String },
    /// A TAG_List declared element kind TAG_End but a nonzero length.
    ListOfEnd { length: i32 },
    /// A tag of the wrong kind was supplied where another was required,
    /// for example pushing a TAG_Int into a list of TAG_String.
    WrongKind { expected: TagKind, actual: TagKind },
    /// A writer or builder call violated the document structure.
    Structure { reason: String },
}

impl From<io::Error> for NbtError {
    fn from(io_error: io::Error) -> Self {
        NbtError::Io { io_error }
    }
}

impl fmt::Display for NbtError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NbtError::Io { io_error } => write!(f, "i/o error: {}", io_error),
            NbtError::UnexpectedEnd { offset } => {
                write!(f, "stream ended prematurely at offset {}", offset)
            }
            NbtError::InvalidKind { kind, offset } => {
                write!(f, "invalid tag kind {:#04x} at offset {}", kind, offset)
            }
            NbtError::InvalidString { offset } => {
                write!(f, "malformed modified UTF-8 string at offset {}", offset)
            }
            NbtError::NegativeLength {
                kind,
                length,
                offset,
            } => write!(
                f,
                "negative length {} for {} at offset {}",
                length, kind, offset
            ),
            NbtError::InvalidRoot { kind } => write!(
                f,
                "root tag is expected to be a {}, but is {:#04x} instead",
                TagKind::Compound,
                kind
            ),
            NbtError::DuplicateName { name } => {
                write!(f, "there is already a tag named \"{}\" in this compound", name)
            }
            NbtError::ListOfEnd { length } => write!(
                f,
                "list declares element kind {} with length {}",
                TagKind::End,
                length
            ),
            NbtError::WrongKind { expected, actual } => {
                write!(f, "expected {}, but received {} instead", expected, actual)
            }
            NbtError::Structure { reason } => write!(f, "structural error: {}", reason),
        }
    }
}

impl std::error::Error for NbtError {}

/// Failed lookup of a typed value in a [`CompoundTag`](crate::CompoundTag).
#[derive(Debug)]
pub enum CompoundTagError {
    /// No tag with the requested name.
    NotFound { name: String },
    /// A tag with the requested name exists but has a different kind.
    WrongKind {
        name: String,
        expected: TagKind,
        actual: TagKind,
    },
}

impl fmt::Display for CompoundTagError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompoundTagError::NotFound { name } => write!(f, "tag \"{}\" not found", name),
            CompoundTagError::WrongKind {
                name,
                expected,
                actual,
            } => write!(
                f,
                "tag \"{}\" is expected to be a {}, but is a {} instead",
                name, expected, actual
            ),
        }
    }
}

impl std::error::Error for CompoundTagError {}

/// Possible errors while loading a chunk from a region file.
#[derive(Debug)]
pub enum ChunkReadError {
    /// Chunk at the specified coordinates inside the region not found.
    ChunkNotFound { chunk_x: u8, chunk_z: u8 },
    /// Region file with the specified coordinates not found.
    ///
    /// Reported by providers that resolve absolute chunk coordinates.
    RegionNotFound { region_x: i32, region_z: i32 },
    /// The header entry points outside the file's chunk data area,
    /// either beyond the end of the file or into the header itself.
    CorruptHeader {
        chunk_x: u8,
        chunk_z: u8,
        /// First sector claimed by the entry.
        start_sector: u32,
        /// Total sectors in the file.
        file_sectors: u64,
    },
    /// The chunk declares more payload than its sectors can hold, or the
    /// payload bytes are missing from the file.
    TruncatedChunk {
        chunk_x: u8,
        chunk_z: u8,
        length: u32,
        maximum_length: u32,
    },
    /// The compression byte is not gzip, zlib or uncompressed.
    ///
    /// Region file is corrupted or a new compression type was introduced.
    UnsupportedCompressionScheme {
        chunk_x: u8,
        chunk_z: u8,
        compression_scheme: u8,
    },
    /// Two live header entries claim the same sector.
    ///
    /// Only reported by [`Region::scan_sectors`](crate::Region::scan_sectors).
    SectorOverlap {
        first_chunk: (u8, u8),
        second_chunk: (u8, u8),
        sector: u32,
    },
    /// The chunk payload lives in an external `.mcc` sidecar file, but the
    /// region was opened from a source with no directory to search.
    ExternalPayloadUnavailable { chunk_x: u8, chunk_z: u8 },
    /// I/O error while reading chunk data from the region file.
    IoError { io_error: io::Error },
    /// Error while decoding the chunk payload as NBT.
    InvalidNbt { nbt_error: NbtError },
}

impl From<io::Error> for ChunkReadError {
    fn from(io_error: io::Error) -> Self {
        ChunkReadError::IoError { io_error }
    }
}

impl From<NbtError> for ChunkReadError {
    fn from(nbt_error: NbtError) -> Self {
        ChunkReadError::InvalidNbt { nbt_error }
    }
}

impl fmt::Display for ChunkReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChunkReadError::ChunkNotFound { chunk_x, chunk_z } => {
                write!(f, "chunk ({}, {}) not found in region", chunk_x, chunk_z)
            }
            ChunkReadError::RegionNotFound { region_x, region_z } => {
                write!(f, "region ({}, {}) not found", region_x, region_z)
            }
            ChunkReadError::CorruptHeader {
                chunk_x,
                chunk_z,
                start_sector,
                file_sectors,
            } => write!(
                f,
                "chunk ({}, {}) starts at sector {} but the file has only {} sectors",
                chunk_x, chunk_z, start_sector, file_sectors
            ),
            ChunkReadError::TruncatedChunk {
                chunk_x,
                chunk_z,
                length,
                maximum_length,
            } => write!(
                f,
                "chunk ({}, {}) declares {} bytes but at most {} are available",
                chunk_x, chunk_z, length, maximum_length
            ),
            ChunkReadError::UnsupportedCompressionScheme {
                chunk_x,
                chunk_z,
                compression_scheme,
            } => write!(
                f,
                "chunk ({}, {}) uses unsupported compression scheme {}",
                chunk_x, chunk_z, compression_scheme
            ),
            ChunkReadError::SectorOverlap {
                first_chunk,
                second_chunk,
                sector,
            } => write!(
                f,
                "chunks ({}, {}) and ({}, {}) both claim sector {}",
                first_chunk.0, first_chunk.1, second_chunk.0, second_chunk.1, sector
            ),
            ChunkReadError::ExternalPayloadUnavailable { chunk_x, chunk_z } => write!(
                f,
                "chunk ({}, {}) payload is in an external .mcc file, which this source cannot reach",
                chunk_x, chunk_z
            ),
            ChunkReadError::IoError { io_error } => write!(f, "i/o error: {}", io_error),
            ChunkReadError::InvalidNbt { nbt_error } => {
                write!(f, "invalid chunk NBT: {}", nbt_error)
            }
        }
    }
}

impl std::error::Error for ChunkReadError {}

/// Possible errors while decoding blocks out of a chunk document.
#[derive(Debug)]
pub enum ChunkDecodeError {
    /// A field required by the chunk schema is absent or of the wrong kind.
    MissingField { field: &'static str },
    /// The chunk stores palette sections but carries no readable
    /// `DataVersion`, so the index packing variant cannot be classified.
    UnsupportedDataVersion,
    /// A fixed-size block data array has the wrong length.
    WrongFieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The packed index array has the wrong number of longs for the
    /// palette size.
    BadPackedData {
        expected_longs: usize,
        actual_longs: usize,
    },
    /// A decoded index points outside the palette.
    BadPaletteIndex { index: usize, palette_len: usize },
}

impl fmt::Display for ChunkDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChunkDecodeError::MissingField { field } => {
                write!(f, "chunk is missing required field \"{}\"", field)
            }
            ChunkDecodeError::UnsupportedDataVersion => {
                write!(f, "palette chunk carries no readable DataVersion")
            }
            ChunkDecodeError::WrongFieldLength {
                field,
                expected,
                actual,
            } => write!(
                f,
                "field \"{}\" holds {} entries, expected {}",
                field, actual, expected
            ),
            ChunkDecodeError::BadPackedData {
                expected_longs,
                actual_longs,
            } => write!(
                f,
                "packed block states hold {} longs, expected {}",
                actual_longs, expected_longs
            ),
            ChunkDecodeError::BadPaletteIndex { index, palette_len } => write!(
                f,
                "block state index {} is outside palette of size {}",
                index, palette_len
            ),
        }
    }
}

impl std::error::Error for ChunkDecodeError {}

/// Possible errors while reading a world directory.
#[derive(Debug)]
pub enum WorldError {
    /// The given path is not a directory.
    NotADirectory { path: PathBuf },
    /// The world has no readable `level.dat`.
    MissingLevelData { path: PathBuf },
    /// I/O error while scanning the world directory.
    IoError { io_error: io::Error },
    /// A world file failed to decode as NBT.
    InvalidNbt { nbt_error: NbtError },
}

impl From<io::Error> for WorldError {
    fn from(io_error: io::Error) -> Self {
        WorldError::IoError { io_error }
    }
}

impl From<NbtError> for WorldError {
    fn from(nbt_error: NbtError) -> Self {
        WorldError::InvalidNbt { nbt_error }
    }
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorldError::NotADirectory { path } => {
                write!(f, "{} is not a directory", path.display())
            }
            WorldError::MissingLevelData { path } => {
                write!(f, "no level.dat found in {}", path.display())
            }
            WorldError::IoError { io_error } => write!(f, "i/o error: {}", io_error),
            WorldError::InvalidNbt { nbt_error } => write!(f, "invalid NBT: {}", nbt_error),
        }
    }
}

impl std::error::Error for WorldError {}

/// Per-chunk failure yielded by a block walk, which reports the failing
/// chunk and continues with the next one.
#[derive(Debug)]
pub enum BlockWalkError {
    /// A region file could not be opened.
    Region {
        position: RegionPosition,
        io_error: io::Error,
    },
    /// A chunk could not be read out of its region.
    ChunkRead {
        chunk_x: i32,
        chunk_z: i32,
        chunk_read_error: ChunkReadError,
    },
    /// A chunk was read but its block data could not be decoded.
    ChunkDecode {
        chunk_x: i32,
        chunk_z: i32,
        chunk_decode_error: ChunkDecodeError,
    },
}

impl fmt::Display for BlockWalkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockWalkError::Region { position, io_error } => write!(
                f,
                "cannot open region ({}, {}): {}",
                position.x, position.z, io_error
            ),
            BlockWalkError::ChunkRead {
                chunk_x,
                chunk_z,
                chunk_read_error,
            } => write!(
                f,
                "cannot read chunk ({}, {}): {}",
                chunk_x, chunk_z, chunk_read_error
            ),
            BlockWalkError::ChunkDecode {
                chunk_x,
                chunk_z,
                chunk_decode_error,
            } => write!(
                f,
                "cannot decode chunk ({}, {}): {}",
                chunk_x, chunk_z, chunk_decode_error
            ),
        }
    }
}

impl std::error::Error for BlockWalkError {}
