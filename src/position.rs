use std::path::Path;

/// On-disk region container flavor.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash)]
pub enum RegionFormat {
    /// Modern Anvil container (`.mca`), Minecraft 1.2.1+.
    Anvil,
    /// Legacy McRegion container (`.mcr`), Minecraft Beta 1.3 - 1.1.
    McRegion,
}

impl RegionFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RegionFormat::Anvil => "mca",
            RegionFormat::McRegion => "mcr",
        }
    }

    fn from_extension(extension: &str) -> Option<RegionFormat> {
        if extension.eq_ignore_ascii_case("mca") {
            Some(RegionFormat::Anvil)
        } else if extension.eq_ignore_ascii_case("mcr") {
            Some(RegionFormat::McRegion)
        } else {
            None
        }
    }
}

/// Region coordinates within a dimension.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash)]
pub struct RegionPosition {
    pub x: i32,
    pub z: i32,
}

impl RegionPosition {
    pub fn new(x: i32, z: i32) -> RegionPosition {
        RegionPosition { x, z }
    }

    /// Region holding the chunk with the given absolute chunk coordinates.
    ///
    /// Euclidean division, so negative coordinates land in the right
    /// region: chunk (-1, -1) is in region (-1, -1).
    pub fn from_chunk_position(chunk_x: i32, chunk_z: i32) -> RegionPosition {
        let x = chunk_x.div_euclid(32);
        let z = chunk_z.div_euclid(32);

        RegionPosition::new(x, z)
    }

    /// Parses region coordinates and format from a filename of the form
    /// `r.<x>.<z>.mca` or `r.<x>.<z>.mcr`.
    pub fn from_filename(path: &Path) -> Option<(RegionPosition, RegionFormat)> {
        // Lossy is fine: a mangled filename fails the format check below.
        let filename = path.file_name()?.to_string_lossy();
        let parts: Vec<_> = filename.split('.').collect();

        if parts.len() != 4 || parts[0] != "r" {
            return None;
        }

        let format = RegionFormat::from_extension(parts[3])?;
        let x = parts[1].parse().ok()?;
        let z = parts[2].parse().ok()?;

        Some((RegionPosition::new(x, z), format))
    }

    pub fn filename(self, format: RegionFormat) -> String {
        format!("r.{}.{}.{}", self.x, self.z, format.extension())
    }
}

/// Chunk coordinates relative to a region, each in `0..32`.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash)]
pub struct RegionChunkPosition {
    pub x: u8,
    pub z: u8,
}

impl RegionChunkPosition {
    pub fn new(x: u8, z: u8) -> RegionChunkPosition {
        debug_assert!(32 > x, "Region chunk x coordinate out of bounds");
        debug_assert!(32 > z, "Region chunk z coordinate out of bounds");

        RegionChunkPosition { x, z }
    }

    /// Position within its region of the chunk with the given absolute
    /// chunk coordinates.
    pub fn from_chunk_position(chunk_x: i32, chunk_z: i32) -> RegionChunkPosition {
        let x = chunk_x.rem_euclid(32) as u8;
        let z = chunk_z.rem_euclid(32) as u8;

        RegionChunkPosition::new(x, z)
    }

    /// Index of this chunk's entry in the region header tables.
    pub(crate) fn metadata_index(&self) -> usize {
        self.x as usize + self.z as usize * 32
    }
}
