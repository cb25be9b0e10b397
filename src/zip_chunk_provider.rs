use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use log::debug;
use zip::ZipArchive;

pub use zip::result::ZipError;

use crate::error::ChunkReadError;
use crate::position::{RegionChunkPosition, RegionFormat, RegionPosition};
use crate::provider::ChunkProvider;
use crate::region::Region;
use crate::tree::CompoundTag;

/// Chunk provider over a zipped world (e.g. a world backup archive).
///
/// Region files are located under the archive's single `region/` folder,
/// decompressed into memory once, and cached, so each region file is only
/// inflated once no matter how many chunks are read from it.
#[derive(Debug)]
pub struct ZipChunkProvider<R: Read + Seek> {
    zip_archive: ZipArchive<R>,
    // Prefix for the region folder. Must end with "/".
    // For example: "region/", "world/region/" or "saves/world/region/"
    region_prefix: String,
    // Cache (region_x, region_z) to uncompressed file, so each region file
    // is only uncompressed once
    cache: HashMap<(i32, i32), Vec<u8>>,
}

#[derive(Debug)]
pub enum ZipProviderError {
    Io(io::Error),
    Zip(ZipError),
    RegionFolderNotFound,
    MoreThanOneRegionFolder,
}

impl From<io::Error> for ZipProviderError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ZipError> for ZipProviderError {
    fn from(e: ZipError) -> Self {
        Self::Zip(e)
    }
}

// Find the path of the region folder inside the zip archive.
// For example: "region/", "world/region/" or "saves/world/region/"
fn find_region_folder_path<R: Read + Seek>(
    zip_archive: &mut ZipArchive<R>,
) -> Result<String, ZipProviderError> {
    let mut region_prefix = String::from("/");
    let mut found_region_count = 0;

    for i in 0..zip_archive.len() {
        // This unwrap is safe because we are iterating from 0 to len
        let file = zip_archive.by_index(i).unwrap();
        let full_path = match file.enclosed_name() {
            Some(path) => path,
            None => continue,
        };
        // file_name() returns None when the path ends with "/.."
        // we handle that case as an empty string
        let folder_name = full_path.file_name().unwrap_or_default();
        if folder_name == "region" {
            found_region_count += 1;
            region_prefix = file.name().to_string();
            // Keep searching after finding the first folder, to make sure
            // there is only one region/ folder
        }
    }

    if found_region_count == 0 {
        return Err(ZipProviderError::RegionFolderNotFound);
    }
    if found_region_count > 1 {
        return Err(ZipProviderError::MoreThanOneRegionFolder);
    }

    Ok(region_prefix)
}

impl<R: Read + Seek> ZipChunkProvider<R> {
    pub fn new(reader: R) -> Result<Self, ZipProviderError> {
        let mut zip_archive = ZipArchive::new(reader)?;
        let region_prefix = find_region_folder_path(&mut zip_archive)?;
        let cache = HashMap::new();

        Ok(ZipChunkProvider {
            zip_archive,
            region_prefix,
            cache,
        })
    }

    fn region_path(&self, position: RegionPosition, format: RegionFormat) -> String {
        format!("{}{}", self.region_prefix, position.filename(format))
    }

    /// Reads a region file out of the archive into memory, or returns the
    /// cached copy.
    fn region_bytes(&mut self, position: RegionPosition) -> Result<&Vec<u8>, ChunkReadError> {
        if !self.cache.contains_key(&(position.x, position.z)) {
            let mut found = None;

            for format in [RegionFormat::Anvil, RegionFormat::McRegion] {
                let region_path = self.region_path(position, format);

                match self.zip_archive.by_name(&region_path) {
                    Ok(mut region_file) => {
                        let uncompressed_size = region_file.size();
                        let mut buf = Vec::with_capacity(uncompressed_size as usize);
                        region_file.read_to_end(&mut buf)?;

                        debug!(
                            target: "anvil-nbt",
                            "Inflated {} ({} bytes) from zip archive",
                            region_path, buf.len()
                        );

                        found = Some(buf);
                        break;
                    }
                    Err(ZipError::FileNotFound) => continue,
                    Err(ZipError::Io(io_error)) => {
                        return Err(ChunkReadError::IoError { io_error })
                    }
                    Err(e) => {
                        return Err(ChunkReadError::IoError {
                            io_error: io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
                        })
                    }
                }
            }

            match found {
                Some(buf) => {
                    self.cache.insert((position.x, position.z), buf);
                }
                None => {
                    return Err(ChunkReadError::RegionNotFound {
                        region_x: position.x,
                        region_z: position.z,
                    })
                }
            }
        }

        Ok(&self.cache[&(position.x, position.z)])
    }

    pub fn load_chunk(
        &mut self,
        chunk_x: i32,
        chunk_z: i32,
    ) -> Result<CompoundTag, ChunkReadError> {
        let region_position = RegionPosition::from_chunk_position(chunk_x, chunk_z);
        let chunk_position = RegionChunkPosition::from_chunk_position(chunk_x, chunk_z);

        let buf = self.region_bytes(region_position)?;

        // Oversized-chunk sidecar files are not reachable inside an
        // archive; Region reports that case per chunk.
        let mut region = Region::load(region_position, Cursor::new(buf))?;

        region.read_chunk(chunk_position)
    }
}

impl ZipChunkProvider<File> {
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self, ZipProviderError> {
        let file = OpenOptions::new()
            .write(false)
            .read(true)
            .create(false)
            .open(path)?;

        Self::new(file)
    }
}

impl<R: Read + Seek> ChunkProvider for ZipChunkProvider<R> {
    fn load_chunk(&mut self, chunk_x: i32, chunk_z: i32) -> Result<CompoundTag, ChunkReadError> {
        self.load_chunk(chunk_x, chunk_z)
    }
}
