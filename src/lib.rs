//! Library for reading and writing Named Binary Tag (NBT) data and for
//! navigating the Minecraft world saves that embed it, down to individual
//! blocks.
//!
//! Both event-driven and tree-based processing are supported, sharing a
//! single parser and a single encoder:
//!
//! * [`parse`] walks an NBT stream and reports events to an
//!   [`NbtHandler`]; [`NbtWriter`] is the mirrored producer side.
//! * [`NbtDocument`] and [`CompoundTag`] materialize documents for
//!   in-place inspection and mutation.
//!
//! Reading a document and fixing a field:
//!
//! ```no_run
//! use anvil_nbt::NbtDocument;
//!
//! # fn main() -> Result<(), anvil_nbt::NbtError> {
//! let mut document = NbtDocument::read_from_path("servers.dat")?;
//! document.root_mut().insert_str("lastServer", "localhost");
//! document.write()?;
//! # Ok(())
//! # }
//! ```
//!
//! Finding iron ore in the overworld:
//!
//! ```no_run
//! use anvil_nbt::{DimensionId, World};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let world = World::open("saves/New World")?;
//! let overworld = world.dimension(DimensionId::Overworld).unwrap();
//!
//! for block in overworld.blocks()? {
//!     let block = block?;
//!     if block.id.name() == Some("minecraft:iron_ore") {
//!         println!("{} {} {}", block.x, block.y, block.z);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod document;
pub mod error;
mod io;
pub mod mutf8;
pub mod parse;
pub mod position;
pub mod provider;
pub mod region;
pub mod tag;
pub mod tree;
pub mod world;
pub mod writer;
pub mod zip_chunk_provider;

pub use chunk::{Block, BlockId, Chunk, ChunkBlocks, DATA_VERSION_PADDED_PACKING};
pub use document::NbtDocument;
pub use error::{
    BlockWalkError, ChunkDecodeError, ChunkReadError, CompoundTagError, NbtError, WorldError,
};
pub use io::Compression;
pub use parse::{parse, parse_gzip, parse_zlib, Control, NbtHandler};
pub use position::{RegionChunkPosition, RegionFormat, RegionPosition};
pub use provider::{ChunkProvider, FolderRegionProvider, RegionProvider};
pub use region::Region;
pub use tag::TagKind;
pub use tree::{
    read_compound_tag, read_gzip_compound_tag, read_zlib_compound_tag, CompoundTag, ListTag, Tag,
    TreeBuilder,
};
pub use world::{Dimension, DimensionBlocks, DimensionId, Player, World, WorldBlocks};
pub use writer::{
    write_compound_tag, write_gzip_compound_tag, write_zlib_compound_tag, NbtWriter,
};
pub use zip_chunk_provider::{ZipChunkProvider, ZipProviderError};
