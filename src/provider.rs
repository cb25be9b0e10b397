use std::fs::{read_dir, File};
use std::io;
use std::path::Path;

use log::debug;

use crate::error::ChunkReadError;
use crate::position::{RegionChunkPosition, RegionFormat, RegionPosition};
use crate::region::Region;
use crate::tree::CompoundTag;

/// Source of regions addressed by region coordinates.
pub trait RegionProvider<S> {
    fn get_region(&self, position: RegionPosition) -> Result<Region<S>, io::Error>;
}

/// Source of chunks addressed by absolute chunk coordinates.
pub trait ChunkProvider {
    fn load_chunk(&mut self, chunk_x: i32, chunk_z: i32) -> Result<CompoundTag, ChunkReadError>;
}

/// Region provider over a dimension's `region/` folder.
pub struct FolderRegionProvider<'a> {
    /// Folder where region files are located.
    folder_path: &'a Path,
}

impl<'a> FolderRegionProvider<'a> {
    pub fn new(folder_path: &'a Path) -> FolderRegionProvider<'a> {
        FolderRegionProvider { folder_path }
    }

    /// Positions and formats of every region file in the folder.
    pub fn iter_positions(
        &self,
    ) -> Result<impl Iterator<Item = (RegionPosition, RegionFormat)>, io::Error> {
        let positions: Vec<_> = read_dir(self.folder_path)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| RegionPosition::from_filename(&entry.path()))
            .collect();

        Ok(positions.into_iter())
    }
}

impl<'a> RegionProvider<File> for FolderRegionProvider<'a> {
    fn get_region(&self, position: RegionPosition) -> Result<Region<File>, io::Error> {
        // Anvil wins when both containers exist for the same coordinates.
        for format in [RegionFormat::Anvil, RegionFormat::McRegion] {
            let region_path = self.folder_path.join(position.filename(format));
            if region_path.is_file() {
                debug!(
                    target: "anvil-nbt",
                    "Opening region {}",
                    region_path.display()
                );
                return Region::open(&region_path);
            }
        }

        Err(io::ErrorKind::NotFound.into())
    }
}

impl ChunkProvider for FolderRegionProvider<'_> {
    fn load_chunk(&mut self, chunk_x: i32, chunk_z: i32) -> Result<CompoundTag, ChunkReadError> {
        let region_position = RegionPosition::from_chunk_position(chunk_x, chunk_z);

        let mut region = self.get_region(region_position).map_err(|io_error| {
            if io_error.kind() == io::ErrorKind::NotFound {
                ChunkReadError::RegionNotFound {
                    region_x: region_position.x,
                    region_z: region_position.z,
                }
            } else {
                ChunkReadError::IoError { io_error }
            }
        })?;

        region.read_chunk(RegionChunkPosition::from_chunk_position(chunk_x, chunk_z))
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkProvider, FolderRegionProvider, RegionProvider};
    use crate::error::ChunkReadError;
    use crate::position::{RegionFormat, RegionPosition};
    use std::fs;

    #[test]
    fn test_iter_positions() {
        let directory = tempfile::tempdir().unwrap();
        fs::write(directory.path().join("r.0.0.mca"), Vec::new()).unwrap();
        fs::write(directory.path().join("r.-1.1.mcr"), Vec::new()).unwrap();
        fs::write(directory.path().join("junk.txt"), Vec::new()).unwrap();

        let provider = FolderRegionProvider::new(directory.path());
        let mut positions: Vec<_> = provider.iter_positions().unwrap().collect();
        positions.sort();

        assert_eq!(
            positions,
            [
                (RegionPosition::new(-1, 1), RegionFormat::McRegion),
                (RegionPosition::new(0, 0), RegionFormat::Anvil),
            ]
        );
    }

    #[test]
    fn test_get_region_missing() {
        let directory = tempfile::tempdir().unwrap();
        let provider = FolderRegionProvider::new(directory.path());

        let result = provider.get_region(RegionPosition::new(5, 5));
        assert_eq!(
            result.err().unwrap().kind(),
            std::io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_get_region_opens_empty_file() {
        let directory = tempfile::tempdir().unwrap();
        fs::write(directory.path().join("r.2.3.mca"), Vec::new()).unwrap();

        let provider = FolderRegionProvider::new(directory.path());
        let region = provider.get_region(RegionPosition::new(2, 3)).unwrap();
        assert!(region.chunk_positions().is_empty());
    }

    #[test]
    fn test_load_chunk_region_not_found() {
        let directory = tempfile::tempdir().unwrap();
        let mut provider = FolderRegionProvider::new(directory.path());

        match provider.load_chunk(40, -3).err().unwrap() {
            ChunkReadError::RegionNotFound { region_x, region_z } => {
                assert_eq!(region_x, 1);
                assert_eq!(region_z, -1);
            }
            e => panic!("Expected `RegionNotFound` but got `{:?}`", e),
        }
    }
}
