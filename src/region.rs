use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bitvec::prelude::*;
use byteorder::{BigEndian, ReadBytesExt};
use log::debug;

use crate::error::ChunkReadError;
use crate::io::{decompress, Compression};
use crate::position::{RegionChunkPosition, RegionPosition};
use crate::tree::{read_compound_tag, CompoundTag};

/// Amount of chunks in region.
const REGION_CHUNKS: usize = 1024;
/// Length of chunks metadata in region.
const REGION_CHUNKS_METADATA_LENGTH: usize = 2 * REGION_CHUNKS;
/// Region header length in bytes.
const REGION_HEADER_BYTES_LENGTH: u64 = 8 * REGION_CHUNKS as u64;
/// Region sector length in bytes.
const REGION_SECTOR_BYTES_LENGTH: u64 = 4096;
/// Maximum chunk length in bytes.
const CHUNK_MAXIMUM_BYTES_LENGTH: u32 = REGION_SECTOR_BYTES_LENGTH as u32 * 256;

/// Gzip compression type value.
const GZIP_COMPRESSION_TYPE: u8 = 1;
/// Zlib compression type value.
const ZLIB_COMPRESSION_TYPE: u8 = 2;
/// Uncompressed type value.
const UNCOMPRESSED_TYPE: u8 = 3;
/// Bit 7 of the compression byte marks an oversized chunk whose payload
/// lives in an external `c.<x>.<z>.mcc` file next to the region file.
const EXTERNAL_PAYLOAD_FLAG: u8 = 0x80;

/// Region represents a 32x32 group of chunks, read out of a `.mca` or
/// `.mcr` container.
///
/// The 8 KiB header is parsed eagerly on load; chunk payloads are read,
/// decompressed and parsed on demand. The container is read-only.
pub struct Region<S> {
    /// Region coordinates within its dimension.
    position: RegionPosition,
    /// Source in which region is stored.
    source: S,
    /// Source length in bytes at load time.
    source_len: u64,
    /// Array of chunks metadata.
    chunks_metadata: [ChunkMetadata; REGION_CHUNKS],
    /// Folder to search for `.mcc` sidecar files.
    ///
    /// Only set when the region was opened from a filesystem path.
    sidecar_folder: Option<PathBuf>,
}

fn metadata_chunk_position(index: usize) -> RegionChunkPosition {
    RegionChunkPosition::new((index % 32) as u8, (index / 32) as u8)
}

impl<S> Region<S> {
    /// Returns chunk metadata at specified position.
    fn get_metadata(&self, position: RegionChunkPosition) -> ChunkMetadata {
        self.chunks_metadata[position.metadata_index()]
    }

    pub fn position(&self) -> RegionPosition {
        self.position
    }

    /// Whether the header has an entry for the chunk at this position.
    pub fn contains_chunk(&self, position: RegionChunkPosition) -> bool {
        !self.get_metadata(position).is_empty()
    }

    /// Last-modified timestamp (unix seconds) of a present chunk.
    pub fn chunk_timestamp(&self, position: RegionChunkPosition) -> Option<u32> {
        let metadata = self.get_metadata(position);

        if metadata.is_empty() {
            None
        } else {
            Some(metadata.last_modified_timestamp)
        }
    }

    /// Positions of all present chunks, sorted by file offset so callers
    /// iterating them always read the source in a forward direction.
    pub fn chunk_positions(&self) -> Vec<RegionChunkPosition> {
        let mut positions: Vec<(u32, RegionChunkPosition)> = self
            .chunks_metadata
            .iter()
            .enumerate()
            .filter(|(_, metadata)| !metadata.is_empty())
            .map(|(index, metadata)| (metadata.start_sector_index, metadata_chunk_position(index)))
            .collect();

        positions.sort();
        positions
            .into_iter()
            .map(|(_, position)| position)
            .collect()
    }

    /// Total sectors in the source, counting a trailing partial sector.
    fn total_sectors(&self) -> u64 {
        if self.source_len > REGION_HEADER_BYTES_LENGTH {
            (self.source_len + REGION_SECTOR_BYTES_LENGTH - 1) / REGION_SECTOR_BYTES_LENGTH
        } else {
            2
        }
    }

    /// Checks the header against the file layout: every live entry must
    /// lie inside the chunk data area and no two entries may claim the
    /// same sector.
    ///
    /// This is an on-demand integrity scan; plain chunk reads do not pay
    /// for it.
    pub fn scan_sectors(&self) -> Result<(), ChunkReadError> {
        let total_sectors = self.total_sectors() as usize;

        // First two sectors are used to store the header.
        let mut used_sectors = bitvec![0; total_sectors];
        used_sectors.set(0, true);
        used_sectors.set(1, true);

        for (index, metadata) in self.chunks_metadata.iter().enumerate() {
            if metadata.is_empty() {
                continue;
            }

            let position = metadata_chunk_position(index);
            let start_index = metadata.start_sector_index as usize;
            let end_index = start_index + metadata.sectors as usize;

            if start_index < 2 || end_index > total_sectors {
                return Err(ChunkReadError::CorruptHeader {
                    chunk_x: position.x,
                    chunk_z: position.z,
                    start_sector: metadata.start_sector_index,
                    file_sectors: total_sectors as u64,
                });
            }

            for sector_index in start_index..end_index {
                if used_sectors[sector_index] {
                    let first = self.sector_owner(index, sector_index);
                    return Err(ChunkReadError::SectorOverlap {
                        first_chunk: (first.x, first.z),
                        second_chunk: (position.x, position.z),
                        sector: sector_index as u32,
                    });
                }
                used_sectors.set(sector_index, true);
            }
        }

        Ok(())
    }

    /// Finds the chunk before `before_index` whose sectors include
    /// `sector_index`. Only called when an overlap was already detected.
    fn sector_owner(&self, before_index: usize, sector_index: usize) -> RegionChunkPosition {
        for (index, metadata) in self.chunks_metadata.iter().enumerate().take(before_index) {
            if metadata.is_empty() {
                continue;
            }
            let start_index = metadata.start_sector_index as usize;
            let end_index = start_index + metadata.sectors as usize;
            if (start_index..end_index).contains(&sector_index) {
                return metadata_chunk_position(index);
            }
        }
        metadata_chunk_position(before_index)
    }
}

impl Region<File> {
    /// Opens a region file, deriving the region coordinates from its
    /// `r.<x>.<z>.mca` / `r.<x>.<z>.mcr` filename.
    ///
    /// Oversized chunks with external `.mcc` payloads are readable through
    /// regions opened this way.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Region<File>, io::Error> {
        let path = path.as_ref();
        let (position, _) = RegionPosition::from_filename(path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;

        let file = File::open(path)?;
        let mut region = Region::load(position, file)?;
        region.sidecar_folder = path.parent().map(Path::to_path_buf);

        Ok(region)
    }
}

impl<S: Read + Seek> Region<S> {
    /// Loads a region from any seekable byte source, reading the header
    /// eagerly. A source shorter than the header is an empty region.
    pub fn load(position: RegionPosition, mut source: S) -> Result<Self, io::Error> {
        let source_len = source.len()?;
        let chunks_metadata = Self::read_header(&mut source, source_len)?;

        Ok(Region {
            position,
            source,
            source_len,
            chunks_metadata,
            sidecar_folder: None,
        })
    }

    /// First 8KB of source are header of 1024 offsets and 1024 timestamps.
    fn read_header(
        source: &mut S,
        source_len: u64,
    ) -> Result<[ChunkMetadata; REGION_CHUNKS], io::Error> {
        let mut chunks_metadata = [ChunkMetadata::default(); REGION_CHUNKS];

        if REGION_HEADER_BYTES_LENGTH > source_len {
            return Ok(chunks_metadata);
        }

        source.seek(SeekFrom::Start(0))?;

        let mut values = [0u32; REGION_CHUNKS_METADATA_LENGTH];

        for value in values.iter_mut() {
            *value = source.read_u32::<BigEndian>()?;
        }

        for index in 0..REGION_CHUNKS {
            let last_modified_timestamp = values[REGION_CHUNKS + index];
            let offset = values[index];

            let start_sector_index = offset >> 8;
            let sectors = (offset & 0xFF) as u8;

            chunks_metadata[index] =
                ChunkMetadata::new(start_sector_index, sectors, last_modified_timestamp);
        }

        Ok(chunks_metadata)
    }

    /// Reads and parses the chunk at the given position.
    pub fn read_chunk(
        &mut self,
        position: RegionChunkPosition,
    ) -> Result<CompoundTag, ChunkReadError> {
        let data = self.read_chunk_data(position)?;
        Ok(read_compound_tag(&mut Cursor::new(data))?)
    }

    /// Reads and decompresses the chunk payload at the given position
    /// without parsing it, for callers that feed the streaming parser.
    pub fn read_chunk_data(
        &mut self,
        position: RegionChunkPosition,
    ) -> Result<Vec<u8>, ChunkReadError> {
        let metadata = self.get_metadata(position);

        if metadata.is_empty() {
            return Err(ChunkReadError::ChunkNotFound {
                chunk_x: position.x,
                chunk_z: position.z,
            });
        }

        let start_sector = metadata.start_sector_index;
        let end_sector = start_sector as u64 + metadata.sectors as u64;
        let file_sectors = self.total_sectors();

        if start_sector < 2 || end_sector > file_sectors {
            return Err(ChunkReadError::CorruptHeader {
                chunk_x: position.x,
                chunk_z: position.z,
                start_sector,
                file_sectors,
            });
        }

        let seek_offset = start_sector as u64 * REGION_SECTOR_BYTES_LENGTH;
        let maximum_length = (metadata.sectors as u32 * REGION_SECTOR_BYTES_LENGTH as u32)
            .min(CHUNK_MAXIMUM_BYTES_LENGTH);

        self.source.seek(SeekFrom::Start(seek_offset))?;
        let length = self.source.read_u32::<BigEndian>()?;

        if length == 0 || length > maximum_length {
            return Err(ChunkReadError::TruncatedChunk {
                chunk_x: position.x,
                chunk_z: position.z,
                length,
                maximum_length,
            });
        }

        let compression_scheme = self.source.read_u8()?;
        let external = compression_scheme & EXTERNAL_PAYLOAD_FLAG != 0;
        let compression_scheme = compression_scheme & !EXTERNAL_PAYLOAD_FLAG;

        let compression = match compression_scheme {
            GZIP_COMPRESSION_TYPE => Compression::Gzip,
            ZLIB_COMPRESSION_TYPE => Compression::Zlib,
            UNCOMPRESSED_TYPE => Compression::None,
            _ => {
                return Err(ChunkReadError::UnsupportedCompressionScheme {
                    chunk_x: position.x,
                    chunk_z: position.z,
                    compression_scheme,
                })
            }
        };

        let compressed_buffer = if external {
            self.read_sidecar(position)?
        } else {
            let mut compressed_buffer = vec![0u8; (length - 1) as usize];

            if let Err(e) = self.source.read_exact(&mut compressed_buffer) {
                return if e.kind() == io::ErrorKind::UnexpectedEof {
                    Err(ChunkReadError::TruncatedChunk {
                        chunk_x: position.x,
                        chunk_z: position.z,
                        length,
                        maximum_length,
                    })
                } else {
                    Err(ChunkReadError::from(e))
                };
            }

            compressed_buffer
        };

        debug!(
            target: "anvil-nbt",
            "Read chunk x: {}, z: {} of region x: {}, z: {} ({} compressed bytes)",
            position.x, position.z, self.position.x, self.position.z, compressed_buffer.len()
        );

        Ok(decompress(&compressed_buffer, compression)?)
    }

    /// Reads the external payload of an oversized chunk from its
    /// `c.<x>.<z>.mcc` file, named by absolute chunk coordinates.
    fn read_sidecar(&self, position: RegionChunkPosition) -> Result<Vec<u8>, ChunkReadError> {
        let folder =
            self.sidecar_folder
                .as_ref()
                .ok_or(ChunkReadError::ExternalPayloadUnavailable {
                    chunk_x: position.x,
                    chunk_z: position.z,
                })?;

        let chunk_x = self.position.x * 32 + position.x as i32;
        let chunk_z = self.position.z * 32 + position.z as i32;
        let sidecar_path = folder.join(format!("c.{}.{}.mcc", chunk_x, chunk_z));

        debug!(
            target: "anvil-nbt",
            "Chunk x: {}, z: {} is oversized, reading {}",
            position.x, position.z, sidecar_path.display()
        );

        Ok(fs::read(sidecar_path)?)
    }
}

/// Chunk metadata are stored in header.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
struct ChunkMetadata {
    /// Sector index from which starts chunk data.
    start_sector_index: u32,
    /// Amount of sectors used to store chunk.
    sectors: u8,
    /// Last time in seconds when chunk was modified.
    last_modified_timestamp: u32,
}

impl ChunkMetadata {
    fn new(start_sector_index: u32, sectors: u8, last_modified_timestamp: u32) -> Self {
        ChunkMetadata {
            start_sector_index,
            sectors,
            last_modified_timestamp,
        }
    }

    fn is_empty(&self) -> bool {
        self.sectors == 0 && self.start_sector_index == 0
    }
}

/// Trait adds additional helper methods for `Seek`.
trait SeekExt {
    fn len(&mut self) -> Result<u64, io::Error>;
}

impl<S: Seek> SeekExt for S {
    fn len(&mut self) -> Result<u64, io::Error> {
        let old_pos = self.seek(SeekFrom::Current(0))?;
        let len = self.seek(SeekFrom::End(0))?;

        if old_pos != len {
            self.seek(SeekFrom::Start(old_pos))?;
        }

        Ok(len)
    }
}
