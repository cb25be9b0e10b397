use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::NbtError;
use crate::io::{compress, decompress, Compression};
use crate::parse::parse;
use crate::tag::TagKind;
use crate::tree::{CompoundTag, Tag, TreeBuilder};
use crate::writer::write_named_compound_tag;

/// A complete NBT document: the root compound, its name, and where and
/// how it is stored.
///
/// Reading remembers the source path and detected compression, so a
/// modified document can be written straight back with
/// [`write`](NbtDocument::write). Fresh documents default to gzip, the
/// compression Minecraft itself uses for nearly every `.dat` file.
#[derive(Debug, Clone, PartialEq)]
pub struct NbtDocument {
    root_name: String,
    root: CompoundTag,
    source: Option<PathBuf>,
    compression: Compression,
}

impl NbtDocument {
    pub fn new(root_name: impl Into<String>, root: CompoundTag) -> NbtDocument {
        NbtDocument {
            root_name: root_name.into(),
            root,
            source: None,
            compression: Compression::Gzip,
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn root(&self) -> &CompoundTag {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut CompoundTag {
        &mut self.root
    }

    pub fn into_root(self) -> CompoundTag {
        self.root
    }

    /// Path this document was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    /// Parses a document from a byte buffer, auto-detecting gzip and zlib
    /// compression from the magic bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<NbtDocument, NbtError> {
        let compression = Compression::detect(bytes);
        let payload = decompress(bytes, compression)?;

        let mut builder = TreeBuilder::new();
        parse(&payload[..], &mut builder)?;
        let (root_name, root) = builder.finish()?;

        Ok(NbtDocument {
            root_name,
            root,
            source: None,
            compression,
        })
    }

    /// Reads a document from a file, remembering the path and detected
    /// compression for [`write`](NbtDocument::write).
    pub fn read_from_path(path: impl AsRef<Path>) -> Result<NbtDocument, NbtError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mut document = NbtDocument::from_bytes(&bytes)?;
        document.source = Some(path.to_path_buf());
        Ok(document)
    }

    /// Serializes the document with its current compression.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NbtError> {
        let mut raw = Vec::new();
        write_named_compound_tag(&mut raw, &self.root_name, &self.root)?;
        Ok(compress(&raw, self.compression)?)
    }

    /// Writes the document to the given path.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), NbtError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Writes the document back to the path it was read from.
    pub fn write(&self) -> Result<(), NbtError> {
        match &self.source {
            Some(path) => {
                fs::write(path, self.to_bytes()?)?;
                Ok(())
            }
            None => Err(NbtError::Structure {
                reason: "document has no remembered source path".to_string(),
            }),
        }
    }
}

fn list_summary(length: usize, element_kind: TagKind) -> String {
    if length == 0 {
        "0 entries".to_string()
    } else {
        format!(
            "{} {}{}",
            length,
            element_kind.name(),
            if length == 1 { "" } else { "s" }
        )
    }
}

fn fmt_tag(
    f: &mut fmt::Formatter,
    name: Option<&str>,
    tag: &Tag,
    indent: usize,
) -> fmt::Result {
    let pad = "    ".repeat(indent);
    let label = match name {
        Some(name) => format!("(\"{}\")", name),
        None => String::new(),
    };

    match tag {
        Tag::Byte(v) => writeln!(f, "{}{}{}: {}", pad, TagKind::Byte.name(), label, v),
        Tag::Short(v) => writeln!(f, "{}{}{}: {}", pad, TagKind::Short.name(), label, v),
        Tag::Int(v) => writeln!(f, "{}{}{}: {}", pad, TagKind::Int.name(), label, v),
        Tag::Long(v) => writeln!(f, "{}{}{}: {}", pad, TagKind::Long.name(), label, v),
        Tag::Float(v) => writeln!(f, "{}{}{}: {}", pad, TagKind::Float.name(), label, v),
        Tag::Double(v) => writeln!(f, "{}{}{}: {}", pad, TagKind::Double.name(), label, v),
        Tag::String(v) => writeln!(f, "{}{}{}: {}", pad, TagKind::String.name(), label, v),
        Tag::ByteArray(v) => writeln!(
            f,
            "{}{}{}: [{} bytes]",
            pad,
            TagKind::ByteArray.name(),
            label,
            v.len()
        ),
        Tag::IntArray(v) => writeln!(
            f,
            "{}{}{}: [{} ints]",
            pad,
            TagKind::IntArray.name(),
            label,
            v.len()
        ),
        Tag::LongArray(v) => writeln!(
            f,
            "{}{}{}: [{} longs]",
            pad,
            TagKind::LongArray.name(),
            label,
            v.len()
        ),
        Tag::List(list) => {
            writeln!(
                f,
                "{}{}{}: {} [",
                pad,
                TagKind::List.name(),
                label,
                list_summary(list.len(), list.element_kind())
            )?;
            for element in list {
                fmt_tag(f, None, element, indent + 1)?;
            }
            writeln!(f, "{}]", pad)
        }
        Tag::Compound(compound) => {
            writeln!(f, "{}{}{}: {{", pad, TagKind::Compound.name(), label)?;
            for (child_name, child) in compound.iter() {
                fmt_tag(f, Some(child_name), child, indent + 1)?;
            }
            writeln!(f, "{}}}", pad)
        }
    }
}

impl fmt::Display for NbtDocument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{}(\"{}\"): {{",
            TagKind::Compound.name(),
            self.root_name
        )?;
        for (name, tag) in self.root.iter() {
            fmt_tag(f, Some(name), tag, 1)?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::NbtDocument;
    use crate::io::Compression;
    use crate::tree::CompoundTag;

    #[test]
    fn test_minimal_document_round_trip() {
        let bytes = b"\x0A\x00\x05hello\x00";

        let mut document = NbtDocument::from_bytes(bytes).unwrap();
        assert_eq!(document.root_name(), "hello");
        assert!(document.root().is_empty());
        assert_eq!(document.compression(), Compression::None);

        document.set_compression(Compression::None);
        assert_eq!(document.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_gzip_auto_detection_round_trip() {
        let mut root = CompoundTag::new();
        root.insert_str("name", "value");
        root.insert_i32("number", 42);

        let document = NbtDocument::new("data", root);
        let bytes = document.to_bytes().unwrap();
        // Gzip magic.
        assert_eq!(&bytes[..2], &[0x1F, 0x8B]);

        let reread = NbtDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reread.compression(), Compression::Gzip);
        assert_eq!(reread.root_name(), "data");
        assert_eq!(reread.root().get_str("name").unwrap(), "value");
        assert_eq!(reread.root().get_i32("number").unwrap(), 42);
    }

    #[test]
    fn test_zlib_detection() {
        let mut root = CompoundTag::new();
        root.insert_i8("b", 3);

        let mut document = NbtDocument::new("d", root);
        document.set_compression(Compression::Zlib);
        let bytes = document.to_bytes().unwrap();
        assert_eq!(bytes[0], 0x78);

        let reread = NbtDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reread.compression(), Compression::Zlib);
        assert_eq!(reread.root().get_i8("b").unwrap(), 3);
    }

    #[test]
    fn test_modified_utf8_code_points_survive() {
        let mut root = CompoundTag::new();
        root.insert_str("s", "nul:\u{0} emoji:\u{1F600}");

        let mut document = NbtDocument::new("root", root);
        document.set_compression(Compression::None);

        let bytes = document.to_bytes().unwrap();
        // The embedded NUL is written as C0 80, never as a bare zero
        // byte that would look like TAG_End.
        let payload_start = bytes.iter().position(|&b| b == b':').unwrap() + 1;
        assert_eq!(&bytes[payload_start..payload_start + 2], &[0xC0, 0x80]);

        let reread = NbtDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reread.root().get_str("s").unwrap(), "nul:\u{0} emoji:\u{1F600}");
    }

    #[test]
    fn test_write_and_read_from_path() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("test.dat");

        let mut root = CompoundTag::new();
        root.insert_str("owner", "somebody");
        NbtDocument::new("saved", root).write_to_path(&path).unwrap();

        let mut document = NbtDocument::read_from_path(&path).unwrap();
        assert_eq!(document.source().unwrap(), path);
        assert_eq!(document.root().get_str("owner").unwrap(), "somebody");

        document.root_mut().insert_str("owner", "somebody else");
        document.write().unwrap();

        let reread = NbtDocument::read_from_path(&path).unwrap();
        assert_eq!(reread.root().get_str("owner").unwrap(), "somebody else");
    }

    #[test]
    fn test_display_pretty_print() {
        let mut inner = CompoundTag::new();
        inner.insert_i32("x", 7);

        let mut root = CompoundTag::new();
        root.insert_compound_tag("pos", inner);
        root.insert_str_vec("tags", ["a", "b"]);

        let document = NbtDocument::new("hello", root);
        let printed = document.to_string();

        assert!(printed.starts_with("TAG_Compound(\"hello\"): {\n"));
        assert!(printed.contains("    TAG_Compound(\"pos\"): {\n"));
        assert!(printed.contains("        TAG_Int(\"x\"): 7\n"));
        assert!(printed.contains("    TAG_List(\"tags\"): 2 TAG_Strings [\n"));
        assert!(printed.contains("        TAG_String: a\n"));
    }
}
