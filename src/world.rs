//! Minecraft save-directory model: world, dimensions, regions, players.
//!
//! A world directory holds `level.dat`, per-player save files, and one
//! directory per non-overworld dimension; the overworld lives in the
//! world directory itself. Each dimension keeps its chunks in
//! `region/r.<x>.<z>.mca` (or `.mcr`) containers.

use std::fmt;
use std::fs::{read_dir, File};
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::chunk::{Block, Chunk, ChunkBlocks};
use crate::document::NbtDocument;
use crate::error::{BlockWalkError, ChunkReadError, WorldError};
use crate::position::{RegionChunkPosition, RegionFormat, RegionPosition};
use crate::provider::{ChunkProvider, FolderRegionProvider, RegionProvider};
use crate::region::Region;
use crate::tree::CompoundTag;

/// Identity of a dimension within a world.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DimensionId {
    /// The overworld; stored in the world directory itself.
    Overworld,
    /// The Nether, stored in `DIM-1/`.
    Nether,
    /// The End, stored in `DIM1/`.
    End,
    /// A modded or custom dimension, addressed by its directory name.
    Custom(String),
}

impl DimensionId {
    /// Directory under the world root, or `None` for the overworld.
    pub fn directory_name(&self) -> Option<&str> {
        match self {
            DimensionId::Overworld => None,
            DimensionId::Nether => Some("DIM-1"),
            DimensionId::End => Some("DIM1"),
            DimensionId::Custom(name) => Some(name),
        }
    }

    fn from_directory_name(name: &str) -> DimensionId {
        match name {
            "DIM-1" => DimensionId::Nether,
            "DIM1" => DimensionId::End,
            other => DimensionId::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DimensionId::Overworld => f.write_str("overworld"),
            DimensionId::Nether => f.write_str("nether"),
            DimensionId::End => f.write_str("end"),
            DimensionId::Custom(name) => f.write_str(name),
        }
    }
}

/// An entire Minecraft world: global metadata plus its dimensions.
pub struct World {
    path: PathBuf,
}

impl World {
    /// Opens a world directory.
    pub fn open(path: impl AsRef<Path>) -> Result<World, WorldError> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(WorldError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(World {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the world's `level.dat` (a gzip-compressed NBT document).
    pub fn level_data(&self) -> Result<NbtDocument, WorldError> {
        let path = self.path.join("level.dat");

        if !path.is_file() {
            return Err(WorldError::MissingLevelData {
                path: self.path.clone(),
            });
        }

        Ok(NbtDocument::read_from_path(path)?)
    }

    /// `Data.DataVersion` from level.dat, absent in old worlds.
    pub fn data_version(&self) -> Result<Option<i32>, WorldError> {
        let document = self.level_data()?;
        Ok(document
            .root()
            .get_compound_tag("Data")
            .ok()
            .and_then(|data| data.get_i32("DataVersion").ok()))
    }

    /// The singleplayer player compound from level.dat, if the world is
    /// a singleplayer world.
    pub fn sp_player(&self) -> Result<Option<CompoundTag>, WorldError> {
        let document = self.level_data()?;
        Ok(document
            .root()
            .get_compound_tag("Data")
            .ok()
            .and_then(|data| data.get_compound_tag("Player").ok())
            .cloned())
    }

    /// Every dimension of the world, the overworld first and the rest
    /// ordered by directory name.
    ///
    /// A subdirectory counts as a dimension when it contains a `region`
    /// folder. A stray `DIM0` directory is ignored; only mods create it,
    /// wrongly assuming the overworld's directory.
    pub fn dimensions(&self) -> Result<Vec<Dimension>, WorldError> {
        let mut dimensions = vec![Dimension {
            id: DimensionId::Overworld,
            path: self.path.clone(),
        }];

        let mut named = Vec::new();

        for entry in read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();

            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.eq_ignore_ascii_case("DIM0") {
                continue;
            }

            if path.join("region").is_dir() {
                named.push((name, path));
            }
        }

        named.sort();

        for (name, path) in named {
            debug!(target: "anvil-nbt", "Found dimension {}", name);
            dimensions.push(Dimension {
                id: DimensionId::from_directory_name(&name),
                path,
            });
        }

        Ok(dimensions)
    }

    /// The dimension with the given identity, or `None` if its directory
    /// does not exist.
    pub fn dimension(&self, id: DimensionId) -> Option<Dimension> {
        let path = match id.directory_name() {
            None => self.path.clone(),
            Some(name) => self.path.join(name),
        };

        if path.is_dir() {
            Some(Dimension { id, path })
        } else {
            None
        }
    }

    /// Every player with a save file in this world.
    ///
    /// Modern worlds keep `playerdata/<uuid>.dat`; ancient worlds keep
    /// `players/<name>.dat`. Both are searched. Documents are loaded
    /// lazily through [`Player::document`].
    pub fn players(&self) -> Result<Vec<Player>, WorldError> {
        let mut players = Vec::new();

        let playerdata = self.path.join("playerdata");
        if playerdata.is_dir() {
            for entry in read_dir(&playerdata)? {
                let path = entry?.path();
                if let Some(uuid) = player_uuid_from_filename(&path) {
                    players.push(Player {
                        uuid: Some(uuid),
                        name: None,
                        path,
                    });
                }
            }
        }

        let by_name = self.path.join("players");
        if by_name.is_dir() {
            for entry in read_dir(&by_name)? {
                let path = entry?.path();
                let is_dat = path
                    .extension()
                    .map_or(false, |e| e.eq_ignore_ascii_case("dat"));
                if path.is_file() && is_dat {
                    if let Some(stem) = path.file_stem() {
                        players.push(Player {
                            uuid: None,
                            name: Some(stem.to_string_lossy().into_owned()),
                            path,
                        });
                    }
                }
            }
        }

        players.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(players)
    }

    /// Walks every block of every dimension.
    pub fn blocks(&self) -> Result<WorldBlocks, WorldError> {
        let mut walks = Vec::new();
        for dimension in self.dimensions()? {
            walks.push(dimension.blocks()?);
        }
        Ok(WorldBlocks {
            walks: walks.into_iter(),
            current: None,
        })
    }
}

/// Parses a `playerdata` filename of the form
/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx.dat` into the UUID.
fn player_uuid_from_filename(path: &Path) -> Option<String> {
    let filename = path.file_name()?.to_string_lossy();
    let stem = filename.strip_suffix(".dat")?;

    let groups: Vec<&str> = stem.split('-').collect();
    let expected_lengths = [8, 4, 4, 4, 12];

    if groups.len() != expected_lengths.len() {
        return None;
    }
    for (group, expected) in groups.iter().zip(expected_lengths) {
        if group.len() != expected || !group.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
    }

    Some(stem.to_string())
}

/// A player known to a world through a save file.
pub struct Player {
    uuid: Option<String>,
    name: Option<String>,
    path: PathBuf,
}

impl Player {
    /// UUID with dashes, known for `playerdata/` saves.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Player name, known only for ancient `players/` saves.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the player's save file (a gzip-compressed NBT document).
    pub fn document(&self) -> Result<NbtDocument, WorldError> {
        Ok(NbtDocument::read_from_path(&self.path)?)
    }
}

/// One dimension of a world: a sparse, practically infinite grid of
/// regions.
pub struct Dimension {
    id: DimensionId,
    path: PathBuf,
}

impl Dimension {
    pub fn id(&self) -> &DimensionId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn region_folder(&self) -> PathBuf {
        self.path.join("region")
    }

    /// Positions and formats of every region file in this dimension,
    /// sorted by coordinates.
    pub fn region_positions(&self) -> Result<Vec<(RegionPosition, RegionFormat)>, WorldError> {
        let folder = self.region_folder();
        if !folder.is_dir() {
            return Ok(Vec::new());
        }

        let mut positions: Vec<_> = FolderRegionProvider::new(&folder)
            .iter_positions()?
            .collect();
        positions.sort();
        Ok(positions)
    }

    /// Opens the region with the given coordinates, or returns `None`
    /// when neither container exists for them.
    pub fn region(&self, position: RegionPosition) -> Result<Option<Region<File>>, WorldError> {
        let folder = self.region_folder();
        if !folder.is_dir() {
            return Ok(None);
        }

        match FolderRegionProvider::new(&folder).get_region(position) {
            Ok(region) => Ok(Some(region)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorldError::from(e)),
        }
    }

    /// Reads the chunk with the given absolute chunk coordinates, or
    /// returns `None` when its region or header entry is absent.
    pub fn chunk(&self, chunk_x: i32, chunk_z: i32) -> Result<Option<CompoundTag>, ChunkReadError> {
        let folder = self.region_folder();
        if !folder.is_dir() {
            return Ok(None);
        }

        match FolderRegionProvider::new(&folder).load_chunk(chunk_x, chunk_z) {
            Ok(compound_tag) => Ok(Some(compound_tag)),
            Err(ChunkReadError::RegionNotFound { .. })
            | Err(ChunkReadError::ChunkNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Walks every block in this dimension, region by region, chunk by
    /// chunk. A chunk that fails to read or decode is reported once and
    /// the walk continues with the next chunk.
    pub fn blocks(&self) -> Result<DimensionBlocks, WorldError> {
        self.blocks_impl(false)
    }

    /// Like [`blocks`](Dimension::blocks), but all-air sections are
    /// yielded too.
    pub fn blocks_with_air(&self) -> Result<DimensionBlocks, WorldError> {
        self.blocks_impl(true)
    }

    fn blocks_impl(&self, include_air: bool) -> Result<DimensionBlocks, WorldError> {
        let folder = self.region_folder();

        let mut positions: Vec<RegionPosition> = if folder.is_dir() {
            FolderRegionProvider::new(&folder)
                .iter_positions()?
                .map(|(position, _)| position)
                .collect()
        } else {
            Vec::new()
        };

        // The same coordinates can appear as both .mca and .mcr; the
        // provider resolves the preference on open.
        positions.sort();
        positions.dedup();

        debug!(
            target: "anvil-nbt",
            "Walking blocks of dimension {} across {} regions",
            self.id, positions.len()
        );

        Ok(DimensionBlocks {
            include_air,
            region_folder: folder,
            regions: positions.into_iter(),
            current_region: None,
            current_blocks: None,
        })
    }
}

/// Block iterator over a dimension; see [`Dimension::blocks`].
pub struct DimensionBlocks {
    include_air: bool,
    region_folder: PathBuf,
    regions: std::vec::IntoIter<RegionPosition>,
    current_region: Option<(Region<File>, std::vec::IntoIter<RegionChunkPosition>)>,
    current_blocks: Option<ChunkBlocks>,
}

impl Iterator for DimensionBlocks {
    type Item = Result<Block, BlockWalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(blocks) = &mut self.current_blocks {
                match blocks.next() {
                    Some(block) => return Some(Ok(block)),
                    None => self.current_blocks = None,
                }
            }

            if let Some((region, chunk_positions)) = &mut self.current_region {
                match chunk_positions.next() {
                    Some(position) => {
                        let chunk_x = region.position().x * 32 + position.x as i32;
                        let chunk_z = region.position().z * 32 + position.z as i32;

                        let root = match region.read_chunk(position) {
                            Ok(root) => root,
                            Err(chunk_read_error) => {
                                return Some(Err(BlockWalkError::ChunkRead {
                                    chunk_x,
                                    chunk_z,
                                    chunk_read_error,
                                }))
                            }
                        };

                        let chunk = Chunk::new(chunk_x, chunk_z, root);
                        let blocks = if self.include_air {
                            chunk.blocks_with_air()
                        } else {
                            chunk.blocks()
                        };

                        match blocks {
                            Ok(blocks) => self.current_blocks = Some(blocks),
                            Err(chunk_decode_error) => {
                                return Some(Err(BlockWalkError::ChunkDecode {
                                    chunk_x,
                                    chunk_z,
                                    chunk_decode_error,
                                }))
                            }
                        }
                        continue;
                    }
                    None => self.current_region = None,
                }
            }

            match self.regions.next() {
                Some(position) => {
                    match FolderRegionProvider::new(&self.region_folder).get_region(position) {
                        Ok(region) => {
                            let chunk_positions = region.chunk_positions().into_iter();
                            self.current_region = Some((region, chunk_positions));
                        }
                        Err(io_error) => {
                            return Some(Err(BlockWalkError::Region { position, io_error }))
                        }
                    }
                }
                None => return None,
            }
        }
    }
}

/// Block iterator over every dimension of a world; see [`World::blocks`].
pub struct WorldBlocks {
    walks: std::vec::IntoIter<DimensionBlocks>,
    current: Option<DimensionBlocks>,
}

impl Iterator for WorldBlocks {
    type Item = Result<Block, BlockWalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(walk) = &mut self.current {
                if let Some(item) = walk.next() {
                    return Some(item);
                }
                self.current = None;
            }

            match self.walks.next() {
                Some(walk) => self.current = Some(walk),
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DimensionId, World};
    use crate::chunk::BlockId;
    use crate::document::NbtDocument;
    use crate::io::{compress, Compression};
    use crate::position::RegionPosition;
    use crate::tag::TagKind;
    use crate::tree::{CompoundTag, ListTag, Tag};
    use crate::writer::write_compound_tag;
    use std::fs;
    use std::path::Path;

    /// Root compound of a modern chunk whose single section is uniform
    /// stone.
    fn stone_chunk_root() -> CompoundTag {
        let mut palette = ListTag::of(TagKind::Compound);
        let mut stone = CompoundTag::new();
        stone.insert_str("Name", "minecraft:stone");
        palette.push(Tag::Compound(stone)).unwrap();

        let mut block_states = CompoundTag::new();
        block_states.insert_list("palette", palette);

        let mut section = CompoundTag::new();
        section.insert_i8("Y", 0);
        section.insert_compound_tag("block_states", block_states);

        let mut sections = ListTag::of(TagKind::Compound);
        sections.push(Tag::Compound(section)).unwrap();

        let mut root = CompoundTag::new();
        root.insert_i32("DataVersion", 2566);
        root.insert_list("sections", sections);
        root
    }

    /// Writes a region file holding the given chunks at consecutive
    /// sectors.
    fn write_region_file(path: &Path, chunks: &[(u8, u8, &CompoundTag)]) {
        let mut bytes = vec![0u8; 2 * 4096];

        for (i, (x, z, compound_tag)) in chunks.iter().enumerate() {
            let mut raw = Vec::new();
            write_compound_tag(&mut raw, compound_tag).unwrap();
            let compressed = compress(&raw, Compression::Zlib).unwrap();

            let sector = (2 + i) as u32;
            let index = (*x as usize + *z as usize * 32) * 4;
            let location = (sector << 8) | 1;
            bytes[index..index + 4].copy_from_slice(&location.to_be_bytes());

            let mut sector_bytes = vec![0u8; 4096];
            sector_bytes[0..4].copy_from_slice(&((compressed.len() + 1) as u32).to_be_bytes());
            sector_bytes[4] = 2;
            sector_bytes[5..5 + compressed.len()].copy_from_slice(&compressed);
            bytes.extend_from_slice(&sector_bytes);
        }

        fs::write(path, bytes).unwrap();
    }

    /// Builds a world with a level.dat, one overworld chunk at (1, 2),
    /// an empty Nether, and one player save.
    fn build_test_world(path: &Path) {
        let mut player = CompoundTag::new();
        player.insert_i16("SleepTimer", 0);

        let mut data = CompoundTag::new();
        data.insert_i32("DataVersion", 2566);
        data.insert_str("LevelName", "test world");
        data.insert_compound_tag("Player", player);

        let mut root = CompoundTag::new();
        root.insert_compound_tag("Data", data);
        NbtDocument::new("", root)
            .write_to_path(path.join("level.dat"))
            .unwrap();

        fs::create_dir_all(path.join("region")).unwrap();
        write_region_file(
            &path.join("region").join("r.0.0.mca"),
            &[(1, 2, &stone_chunk_root())],
        );

        fs::create_dir_all(path.join("DIM-1").join("region")).unwrap();

        fs::create_dir_all(path.join("playerdata")).unwrap();
        let mut player_root = CompoundTag::new();
        player_root.insert_f32("Health", 20.0);
        NbtDocument::new("", player_root)
            .write_to_path(
                path.join("playerdata")
                    .join("11111111-2222-3333-4444-555555555555.dat"),
            )
            .unwrap();
    }

    #[test]
    fn test_open_rejects_missing_directory() {
        let directory = tempfile::tempdir().unwrap();
        let missing = directory.path().join("nope");

        assert!(World::open(&missing).is_err());
    }

    #[test]
    fn test_level_data_and_metadata() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        let world = World::open(directory.path()).unwrap();

        let level = world.level_data().unwrap();
        let data = level.root().get_compound_tag("Data").unwrap();
        assert_eq!(data.get_str("LevelName").unwrap(), "test world");

        assert_eq!(world.data_version().unwrap(), Some(2566));

        let player = world.sp_player().unwrap().unwrap();
        assert_eq!(player.get_i16("SleepTimer").unwrap(), 0);
    }

    #[test]
    fn test_missing_level_data() {
        let directory = tempfile::tempdir().unwrap();
        let world = World::open(directory.path()).unwrap();

        assert!(world.level_data().is_err());
    }

    #[test]
    fn test_dimensions_enumeration() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        let world = World::open(directory.path()).unwrap();
        let dimensions = world.dimensions().unwrap();

        let ids: Vec<_> = dimensions.iter().map(|d| d.id().clone()).collect();
        assert_eq!(ids, [DimensionId::Overworld, DimensionId::Nether]);
    }

    #[test]
    fn test_dimension_lookup() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        let world = World::open(directory.path()).unwrap();

        assert!(world.dimension(DimensionId::Overworld).is_some());
        assert!(world.dimension(DimensionId::Nether).is_some());
        assert!(world.dimension(DimensionId::End).is_none());
        assert!(world
            .dimension(DimensionId::Custom("TROPICS".to_string()))
            .is_none());
    }

    #[test]
    fn test_chunk_lookup_by_world_coordinates() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        let world = World::open(directory.path()).unwrap();
        let overworld = world.dimension(DimensionId::Overworld).unwrap();

        let chunk = overworld.chunk(1, 2).unwrap().unwrap();
        assert_eq!(chunk.get_i32("DataVersion").unwrap(), 2566);

        // Present region, absent chunk.
        assert!(overworld.chunk(9, 9).unwrap().is_none());
        // Absent region (negative coordinates).
        assert!(overworld.chunk(-5, -5).unwrap().is_none());
    }

    #[test]
    fn test_region_positions() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        let world = World::open(directory.path()).unwrap();
        let overworld = world.dimension(DimensionId::Overworld).unwrap();

        let positions = overworld.region_positions().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].0, RegionPosition::new(0, 0));

        let nether = world.dimension(DimensionId::Nether).unwrap();
        assert!(nether.region_positions().unwrap().is_empty());
    }

    #[test]
    fn test_dimension_block_walk() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        let world = World::open(directory.path()).unwrap();
        let overworld = world.dimension(DimensionId::Overworld).unwrap();

        let blocks: Vec<_> = overworld
            .blocks()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(blocks.len(), 4096);
        assert!(blocks
            .iter()
            .all(|block| block.id == BlockId::Name("minecraft:stone".to_string())));

        // Chunk (1, 2) spans blocks (16..32, 0..16, 32..48).
        assert_eq!((blocks[0].x, blocks[0].y, blocks[0].z), (16, 0, 32));
        let last = blocks.last().unwrap();
        assert_eq!((last.x, last.y, last.z), (31, 15, 47));
    }

    #[test]
    fn test_world_block_walk_covers_all_dimensions() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        let world = World::open(directory.path()).unwrap();
        let blocks: Vec<_> = world
            .blocks()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        // The Nether has no regions; only the overworld chunk shows up.
        assert_eq!(blocks.len(), 4096);
    }

    #[test]
    fn test_block_walk_reports_bad_chunk_and_continues() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        // A second region whose single chunk has an unsupported
        // compression byte.
        let region_path = directory.path().join("region").join("r.1.0.mca");
        let mut bytes = vec![0u8; 3 * 4096];
        bytes[0..4].copy_from_slice(&((2u32 << 8) | 1).to_be_bytes());
        bytes[8192..8196].copy_from_slice(&2u32.to_be_bytes());
        bytes[8196] = 9;
        fs::write(&region_path, bytes).unwrap();

        let world = World::open(directory.path()).unwrap();
        let overworld = world.dimension(DimensionId::Overworld).unwrap();

        let mut good = 0;
        let mut bad = 0;
        for item in overworld.blocks().unwrap() {
            match item {
                Ok(_) => good += 1,
                Err(_) => bad += 1,
            }
        }

        assert_eq!(good, 4096);
        assert_eq!(bad, 1);
    }

    #[test]
    fn test_players() {
        let directory = tempfile::tempdir().unwrap();
        build_test_world(directory.path());

        // An ancient name-keyed save next to the modern uuid one.
        fs::create_dir_all(directory.path().join("players")).unwrap();
        let mut ancient = CompoundTag::new();
        ancient.insert_i16("Fire", -20);
        NbtDocument::new("", ancient)
            .write_to_path(directory.path().join("players").join("Notch.dat"))
            .unwrap();

        let world = World::open(directory.path()).unwrap();
        let players = world.players().unwrap();
        assert_eq!(players.len(), 2);

        let by_uuid = players.iter().find(|p| p.uuid().is_some()).unwrap();
        assert_eq!(
            by_uuid.uuid().unwrap(),
            "11111111-2222-3333-4444-555555555555"
        );
        let document = by_uuid.document().unwrap();
        assert_eq!(document.root().get_f32("Health").unwrap(), 20.0);

        let by_name = players.iter().find(|p| p.name().is_some()).unwrap();
        assert_eq!(by_name.name().unwrap(), "Notch");
    }
}
