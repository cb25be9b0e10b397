//! Block decoding across the chunk schema revisions.
//!
//! Three on-disk layouts are supported:
//!
//! * McRegion chunks: one flat `Level.Blocks` column of numeric IDs.
//! * Legacy Anvil sections: per-section `Blocks` byte array with optional
//!   `Add` nibbles extending IDs to 12 bits.
//! * Palette sections: `Palette`/`BlockStates` (up to 1.17, under
//!   `Level.Sections`) or the renamed `sections[].block_states` compound
//!   with lowercase `palette`/`data` (1.18 and later). The key names pick
//!   the layout; `DataVersion` picks the index packing variant.

use log::trace;

use crate::error::ChunkDecodeError;
use crate::tree::{CompoundTag, ListTag, Tag};

/// First DataVersion whose packed indices never straddle a 64-bit word;
/// earlier chunks pack indices back to back across word boundaries.
///
/// Fixed by the game (20w17a), never inferred from the data.
pub const DATA_VERSION_PADDED_PACKING: i32 = 2529;

const SECTION_BLOCKS: usize = 4096;
const COLUMN_BLOCKS: usize = 32768;

const AIR_BLOCK_NAMES: [&str; 3] = ["minecraft:air", "minecraft:cave_air", "minecraft:void_air"];

/// Identity of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    /// Numeric ID from a pre-palette world (12 bits with `Add`).
    Numeric(u16),
    /// Namespaced name from a palette world, e.g. `minecraft:iron_ore`.
    Name(String),
}

impl BlockId {
    pub fn is_air(&self) -> bool {
        match self {
            BlockId::Numeric(id) => *id == 0,
            BlockId::Name(name) => AIR_BLOCK_NAMES.contains(&name.as_str()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            BlockId::Name(name) => Some(name),
            BlockId::Numeric(_) => None,
        }
    }

    pub fn numeric(&self) -> Option<u16> {
        match self {
            BlockId::Numeric(id) => Some(*id),
            BlockId::Name(_) => None,
        }
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BlockId::Numeric(id) => write!(f, "{}", id),
            BlockId::Name(name) => write!(f, "{}", name),
        }
    }
}

/// One block at absolute world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub id: BlockId,
}

/// A chunk document together with its absolute chunk coordinates.
pub struct Chunk {
    x: i32,
    z: i32,
    root: CompoundTag,
}

impl Chunk {
    pub fn new(x: i32, z: i32, root: CompoundTag) -> Chunk {
        Chunk { x, z, root }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn root(&self) -> &CompoundTag {
        &self.root
    }

    /// Schema revision embedded in modern chunks.
    pub fn data_version(&self) -> Option<i32> {
        self.root.get_i32("DataVersion").ok()
    }

    /// Iterates the chunk's blocks in ascending section-Y order, then y
    /// within the section, then z, then x.
    ///
    /// Sections with no stored block data decode to all-air and are
    /// skipped; use [`blocks_with_air`](Chunk::blocks_with_air) to have
    /// them yielded too.
    pub fn blocks(&self) -> Result<ChunkBlocks, ChunkDecodeError> {
        self.decode(false)
    }

    /// Like [`blocks`](Chunk::blocks), but all-air sections are yielded
    /// as 4096 air blocks instead of being skipped.
    pub fn blocks_with_air(&self) -> Result<ChunkBlocks, ChunkDecodeError> {
        self.decode(true)
    }

    fn decode(&self, include_air: bool) -> Result<ChunkBlocks, ChunkDecodeError> {
        let mut sections = self.decoded_sections()?;

        if !include_air {
            sections.retain(|section| !section.is_all_air());
        }
        sections.sort_by_key(|section| section.base_y);

        trace!(
            target: "anvil-nbt",
            "Decoded chunk x: {}, z: {} into {} sections",
            self.x, self.z, sections.len()
        );

        Ok(ChunkBlocks {
            chunk_x: self.x,
            chunk_z: self.z,
            sections,
            section_index: 0,
            block_index: 0,
        })
    }

    fn decoded_sections(&self) -> Result<Vec<DecodedSection>, ChunkDecodeError> {
        // 1.18+ layout: a root-level `sections` list.
        if let Ok(sections) = self.root.get_list("sections") {
            let mut decoded = Vec::with_capacity(sections.len());
            for section in compounds_of(sections)? {
                decoded.push(self.decode_modern_section(section)?);
            }
            return Ok(decoded);
        }

        let level = self
            .root
            .get_compound_tag("Level")
            .map_err(|_| ChunkDecodeError::MissingField { field: "Level" })?;

        // Anvil layout: `Level.Sections`, palette or legacy per section.
        if let Ok(sections) = level.get_list("Sections") {
            let mut decoded = Vec::with_capacity(sections.len());
            for section in compounds_of(sections)? {
                if section.contains_key("Palette") {
                    decoded.push(self.decode_anvil_palette_section(section)?);
                } else if section.contains_key("Blocks") {
                    decoded.push(decode_legacy_section(section)?);
                }
                // A section with neither is empty; nothing to decode.
            }
            return Ok(decoded);
        }

        // McRegion layout: one flat column under `Level.Blocks`.
        if let Ok(blocks) = level.get_i8_vec("Blocks") {
            if blocks.len() != COLUMN_BLOCKS {
                return Err(ChunkDecodeError::WrongFieldLength {
                    field: "Blocks",
                    expected: COLUMN_BLOCKS,
                    actual: blocks.len(),
                });
            }
            return Ok(vec![DecodedSection {
                base_y: 0,
                data: SectionData::Column {
                    blocks: as_unsigned(blocks),
                },
            }]);
        }

        Err(ChunkDecodeError::MissingField { field: "Sections" })
    }

    /// `sections[]` entry: `Y` plus a `block_states` compound holding
    /// `palette` and optionally `data`.
    fn decode_modern_section(
        &self,
        section: &CompoundTag,
    ) -> Result<DecodedSection, ChunkDecodeError> {
        let base_y = section_y(section)? * 16;

        let block_states = match section.get_compound_tag("block_states") {
            Ok(block_states) => block_states,
            // No block states at all: an empty (all-air) section.
            Err(_) => {
                return Ok(DecodedSection {
                    base_y,
                    data: SectionData::Palette {
                        palette: vec!["minecraft:air".to_string()],
                        indices: None,
                    },
                })
            }
        };

        let palette = palette_names(
            block_states
                .get_list("palette")
                .map_err(|_| ChunkDecodeError::MissingField {
                    field: "block_states.palette",
                })?,
        )?;

        let indices = match block_states.get_i64_vec("data") {
            Ok(data) => Some(self.unpack_indices(data, palette.len())?),
            Err(_) => None,
        };

        Ok(DecodedSection {
            base_y,
            data: SectionData::Palette { palette, indices },
        })
    }

    /// `Level.Sections[]` entry with `Palette` and `BlockStates`.
    fn decode_anvil_palette_section(
        &self,
        section: &CompoundTag,
    ) -> Result<DecodedSection, ChunkDecodeError> {
        let base_y = section_y(section)? * 16;

        let palette = palette_names(section.get_list("Palette").map_err(|_| {
            ChunkDecodeError::MissingField { field: "Palette" }
        })?)?;

        let indices = match section.get_i64_vec("BlockStates") {
            Ok(data) => Some(self.unpack_indices(data, palette.len())?),
            Err(_) => None,
        };

        Ok(DecodedSection {
            base_y,
            data: SectionData::Palette { palette, indices },
        })
    }

    /// Unpacks a packed index array, choosing the packing variant from
    /// the chunk's DataVersion.
    fn unpack_indices(
        &self,
        data: &[i64],
        palette_len: usize,
    ) -> Result<Vec<u16>, ChunkDecodeError> {
        let data_version = self
            .data_version()
            .ok_or(ChunkDecodeError::UnsupportedDataVersion)?;

        let bits = bits_per_index(palette_len);
        let indices = if data_version >= DATA_VERSION_PADDED_PACKING {
            unpack_padded(data, bits)?
        } else {
            unpack_straddling(data, bits)?
        };

        for &index in &indices {
            if index as usize >= palette_len {
                return Err(ChunkDecodeError::BadPaletteIndex {
                    index: index as usize,
                    palette_len,
                });
            }
        }

        Ok(indices)
    }
}

/// Index bit width for a palette: `max(4, ceil(log2(len)))`.
pub(crate) fn bits_per_index(palette_len: usize) -> u32 {
    if palette_len <= 1 {
        4
    } else {
        (usize::BITS - (palette_len - 1).leading_zeros()).max(4)
    }
}

/// 1.16+ packing: each long holds `64 / bits` whole indices, the
/// leftover high bits are padding.
fn unpack_padded(data: &[i64], bits: u32) -> Result<Vec<u16>, ChunkDecodeError> {
    let per_long = (64 / bits) as usize;
    let expected_longs = (SECTION_BLOCKS + per_long - 1) / per_long;

    if data.len() != expected_longs {
        return Err(ChunkDecodeError::BadPackedData {
            expected_longs,
            actual_longs: data.len(),
        });
    }

    let mask = (1u64 << bits) - 1;
    let mut indices = Vec::with_capacity(SECTION_BLOCKS);

    'outer: for &long in data {
        let mut value = long as u64;
        for _ in 0..per_long {
            indices.push((value & mask) as u16);
            if indices.len() == SECTION_BLOCKS {
                break 'outer;
            }
            value >>= bits;
        }
    }

    Ok(indices)
}

/// Pre-1.16 packing: indices are laid out back to back and may straddle
/// two longs.
fn unpack_straddling(data: &[i64], bits: u32) -> Result<Vec<u16>, ChunkDecodeError> {
    let bits = bits as usize;
    let expected_longs = (SECTION_BLOCKS * bits + 63) / 64;

    if data.len() != expected_longs {
        return Err(ChunkDecodeError::BadPackedData {
            expected_longs,
            actual_longs: data.len(),
        });
    }

    let mask = (1u64 << bits) - 1;
    let mut indices = Vec::with_capacity(SECTION_BLOCKS);

    for index in 0..SECTION_BLOCKS {
        let bit_index = index * bits;
        let long_index = bit_index / 64;
        let offset = bit_index % 64;

        let value = if offset + bits <= 64 {
            (data[long_index] as u64) >> offset
        } else {
            let low = (data[long_index] as u64) >> offset;
            let high = (data[long_index + 1] as u64) << (64 - offset);
            low | high
        };

        indices.push((value & mask) as u16);
    }

    Ok(indices)
}

/// Legacy Anvil section: `Blocks` plus optional `Add` nibbles.
fn decode_legacy_section(section: &CompoundTag) -> Result<DecodedSection, ChunkDecodeError> {
    let base_y = section_y(section)? * 16;

    let blocks = section
        .get_i8_vec("Blocks")
        .map_err(|_| ChunkDecodeError::MissingField { field: "Blocks" })?;
    if blocks.len() != SECTION_BLOCKS {
        return Err(ChunkDecodeError::WrongFieldLength {
            field: "Blocks",
            expected: SECTION_BLOCKS,
            actual: blocks.len(),
        });
    }

    let add = match section.get_i8_vec("Add") {
        Ok(add) => {
            if add.len() != SECTION_BLOCKS / 2 {
                return Err(ChunkDecodeError::WrongFieldLength {
                    field: "Add",
                    expected: SECTION_BLOCKS / 2,
                    actual: add.len(),
                });
            }
            Some(as_unsigned(add))
        }
        Err(_) => None,
    };

    Ok(DecodedSection {
        base_y,
        data: SectionData::Legacy {
            blocks: as_unsigned(blocks),
            add,
        },
    })
}

/// Reads a section's Y index, stored as a byte in most revisions but as
/// an int by some.
fn section_y(section: &CompoundTag) -> Result<i32, ChunkDecodeError> {
    match section.get("Y") {
        Some(Tag::Byte(y)) => Ok(*y as i32),
        Some(Tag::Int(y)) => Ok(*y),
        _ => Err(ChunkDecodeError::MissingField { field: "Y" }),
    }
}

/// Extracts the `Name` of every palette entry.
fn palette_names(palette: &ListTag) -> Result<Vec<String>, ChunkDecodeError> {
    let mut names = Vec::with_capacity(palette.len());

    for entry in compounds_of(palette)? {
        let name = entry
            .get_str("Name")
            .map_err(|_| ChunkDecodeError::MissingField { field: "Name" })?;
        names.push(name.to_string());
    }

    Ok(names)
}

fn compounds_of(list: &ListTag) -> Result<Vec<&CompoundTag>, ChunkDecodeError> {
    let mut compounds = Vec::with_capacity(list.len());

    for tag in list {
        match tag {
            Tag::Compound(compound) => compounds.push(compound),
            _ => return Err(ChunkDecodeError::MissingField { field: "Sections" }),
        }
    }

    Ok(compounds)
}

fn as_unsigned(values: &[i8]) -> Vec<u8> {
    values.iter().map(|&value| value as u8).collect()
}

/// Little-endian nibble lookup: even indices take the low nibble.
fn nibble(array: &[u8], index: usize) -> u8 {
    let byte = array.get(index / 2).copied().unwrap_or(0);
    if index & 1 == 0 {
        byte & 0x0F
    } else {
        byte >> 4
    }
}

struct DecodedSection {
    base_y: i32,
    data: SectionData,
}

enum SectionData {
    /// Legacy Anvil 16x16x16 section with numeric IDs.
    Legacy { blocks: Vec<u8>, add: Option<Vec<u8>> },
    /// Palette section; `indices` is absent for a uniform section, where
    /// every block is palette entry 0.
    Palette {
        palette: Vec<String>,
        indices: Option<Vec<u16>>,
    },
    /// McRegion 16x128x16 whole-chunk column, stored in XZY order.
    Column { blocks: Vec<u8> },
}

impl DecodedSection {
    fn len(&self) -> usize {
        match &self.data {
            SectionData::Column { .. } => COLUMN_BLOCKS,
            _ => SECTION_BLOCKS,
        }
    }

    fn is_all_air(&self) -> bool {
        match &self.data {
            SectionData::Palette {
                palette,
                indices: None,
            } => AIR_BLOCK_NAMES.contains(&palette[0].as_str()),
            _ => false,
        }
    }

    /// Block at iteration index `i`, in ascending y, then z, then x.
    fn block_at(&self, chunk_x: i32, chunk_z: i32, i: usize) -> Block {
        let (x, y, z) = match &self.data {
            // Sections store blocks in YZX order, so the iteration index
            // is also the storage index.
            SectionData::Legacy { .. } | SectionData::Palette { .. } => {
                ((i & 15) as i32, (i >> 8) as i32, ((i >> 4) & 15) as i32)
            }
            // The column stores blocks in XZY order; recompute the
            // storage position from the y-z-x iteration index.
            SectionData::Column { .. } => {
                let y = (i / 256) as i32;
                let z = ((i / 16) & 15) as i32;
                let x = (i & 15) as i32;
                (x, y, z)
            }
        };

        let id = match &self.data {
            SectionData::Legacy { blocks, add } => {
                let mut id = blocks[i] as u16;
                if let Some(add) = add {
                    id |= (nibble(add, i) as u16) << 8;
                }
                BlockId::Numeric(id)
            }
            SectionData::Palette { palette, indices } => {
                let palette_index = indices.as_ref().map_or(0, |indices| indices[i] as usize);
                BlockId::Name(palette[palette_index].clone())
            }
            SectionData::Column { blocks } => {
                let storage = (x as usize) * 2048 + (z as usize) * 128 + y as usize;
                BlockId::Numeric(blocks[storage] as u16)
            }
        };

        Block {
            x: chunk_x * 16 + x,
            y: self.base_y + y,
            z: chunk_z * 16 + z,
            id,
        }
    }
}

/// Iterator over a chunk's blocks in the canonical order.
pub struct ChunkBlocks {
    chunk_x: i32,
    chunk_z: i32,
    sections: Vec<DecodedSection>,
    section_index: usize,
    block_index: usize,
}

impl Iterator for ChunkBlocks {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        loop {
            let section = self.sections.get(self.section_index)?;

            if self.block_index >= section.len() {
                self.section_index += 1;
                self.block_index = 0;
                continue;
            }

            let index = self.block_index;
            self.block_index += 1;

            return Some(section.block_at(self.chunk_x, self.chunk_z, index));
        }
    }
}
