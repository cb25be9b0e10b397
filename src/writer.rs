//! Event-driven NBT writing.
//!
//! [`NbtWriter`] is the producer-facing mirror of the parser: callers push
//! the same events the parser reports, and the writer validates structure
//! as it goes, emitting bytes as soon as they are fully determined. The
//! tree serializers at the bottom drive a tree through the same state
//! machine, so there is exactly one encoder in the crate.

use std::collections::HashSet;
use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use flate2::write::{GzEncoder, ZlibEncoder};

use crate::error::NbtError;
use crate::mutf8;
use crate::tag::TagKind;
use crate::tree::{CompoundTag, ListTag, Tag};

/// Validating event-driven NBT emitter.
///
/// The expected call sequence mirrors the document structure:
/// [`start`](NbtWriter::start), tags and containers, then
/// [`end`](NbtWriter::end). Tag methods take a name at compound scope and
/// `None` at list scope. Any structural violation fails immediately and
/// is a programmer error; the writer never retries.
pub struct NbtWriter<W: Write> {
    output: W,
    stack: Vec<Frame>,
    started: bool,
}

enum Frame {
    Compound {
        written_names: HashSet<String>,
    },
    List {
        element_kind: TagKind,
        remaining: i32,
    },
}

fn write_string<W: Write>(output: &mut W, value: &str) -> Result<(), NbtError> {
    let encoded = mutf8::encode(value);
    if encoded.len() > u16::MAX as usize {
        return Err(NbtError::Structure {
            reason: format!("string of {} bytes does not fit in 65535", encoded.len()),
        });
    }
    output.write_u16::<BigEndian>(encoded.len() as u16)?;
    output.write_all(&encoded)?;
    Ok(())
}

fn check_array_length(kind: TagKind, length: usize) -> Result<i32, NbtError> {
    if length > i32::MAX as usize {
        return Err(NbtError::Structure {
            reason: format!("{} of {} elements does not fit in an i32 length", kind, length),
        });
    }
    Ok(length as i32)
}

impl<W: Write> NbtWriter<W> {
    pub fn new(output: W) -> NbtWriter<W> {
        NbtWriter {
            output,
            stack: Vec::new(),
            started: false,
        }
    }

    /// Returns the underlying output.
    pub fn into_inner(self) -> W {
        self.output
    }

    /// Begins the root TAG_Compound.
    pub fn start(&mut self, root_name: &str) -> Result<(), NbtError> {
        if self.started {
            return Err(NbtError::Structure {
                reason: "the root compound has already been started".to_string(),
            });
        }
        self.started = true;

        self.output.write_u8(TagKind::Compound.id())?;
        write_string(&mut self.output, root_name)?;
        self.stack.push(Frame::Compound {
            written_names: HashSet::new(),
        });
        Ok(())
    }

    /// Finishes the root TAG_Compound. Every other container must have
    /// been closed.
    pub fn end(&mut self) -> Result<(), NbtError> {
        match self.stack.len() {
            0 => Err(NbtError::Structure {
                reason: if self.started {
                    "the document has already ended".to_string()
                } else {
                    "end() without start()".to_string()
                },
            }),
            1 => {
                self.output.write_u8(TagKind::End.id())?;
                self.stack.pop();
                Ok(())
            }
            depth => Err(NbtError::Structure {
                reason: format!("end() with {} containers still open", depth - 1),
            }),
        }
    }

    /// Validates scope and, at compound scope, emits the named tag header.
    fn begin_tag(&mut self, kind: TagKind, name: Option<&str>) -> Result<(), NbtError> {
        match self.stack.last_mut() {
            Some(Frame::Compound { written_names }) => {
                let name = name.ok_or_else(|| NbtError::Structure {
                    reason: format!("a {} at compound scope requires a name", kind),
                })?;
                if !written_names.insert(name.to_string()) {
                    return Err(NbtError::DuplicateName {
                        name: name.to_string(),
                    });
                }
                self.output.write_u8(kind.id())?;
                write_string(&mut self.output, name)
            }
            Some(Frame::List {
                element_kind,
                remaining,
            }) => {
                if name.is_some() {
                    return Err(NbtError::Structure {
                        reason: "list elements are nameless".to_string(),
                    });
                }
                if kind != *element_kind {
                    return Err(NbtError::WrongKind {
                        expected: *element_kind,
                        actual: kind,
                    });
                }
                if *remaining == 0 {
                    return Err(NbtError::Structure {
                        reason: "more elements pushed than the list declared".to_string(),
                    });
                }
                *remaining -= 1;
                Ok(())
            }
            None => Err(NbtError::Structure {
                reason: if self.started {
                    "the document has already ended".to_string()
                } else {
                    "no open container; call start() first".to_string()
                },
            }),
        }
    }

    pub fn byte(&mut self, name: Option<&str>, value: i8) -> Result<(), NbtError> {
        self.begin_tag(TagKind::Byte, name)?;
        self.output.write_i8(value)?;
        Ok(())
    }

    pub fn short(&mut self, name: Option<&str>, value: i16) -> Result<(), NbtError> {
        self.begin_tag(TagKind::Short, name)?;
        self.output.write_i16::<BigEndian>(value)?;
        Ok(())
    }

    pub fn int(&mut self, name: Option<&str>, value: i32) -> Result<(), NbtError> {
        self.begin_tag(TagKind::Int, name)?;
        self.output.write_i32::<BigEndian>(value)?;
        Ok(())
    }

    pub fn long(&mut self, name: Option<&str>, value: i64) -> Result<(), NbtError> {
        self.begin_tag(TagKind::Long, name)?;
        self.output.write_i64::<BigEndian>(value)?;
        Ok(())
    }

    pub fn float(&mut self, name: Option<&str>, value: f32) -> Result<(), NbtError> {
        self.begin_tag(TagKind::Float, name)?;
        self.output.write_f32::<BigEndian>(value)?;
        Ok(())
    }

    pub fn double(&mut self, name: Option<&str>, value: f64) -> Result<(), NbtError> {
        self.begin_tag(TagKind::Double, name)?;
        self.output.write_f64::<BigEndian>(value)?;
        Ok(())
    }

    pub fn string(&mut self, name: Option<&str>, value: &str) -> Result<(), NbtError> {
        self.begin_tag(TagKind::String, name)?;
        write_string(&mut self.output, value)
    }

    pub fn byte_array(&mut self, name: Option<&str>, values: &[i8]) -> Result<(), NbtError> {
        let length = check_array_length(TagKind::ByteArray, values.len())?;
        self.begin_tag(TagKind::ByteArray, name)?;
        self.output.write_i32::<BigEndian>(length)?;
        for value in values {
            self.output.write_i8(*value)?;
        }
        Ok(())
    }

    pub fn int_array(&mut self, name: Option<&str>, values: &[i32]) -> Result<(), NbtError> {
        let length = check_array_length(TagKind::IntArray, values.len())?;
        self.begin_tag(TagKind::IntArray, name)?;
        self.output.write_i32::<BigEndian>(length)?;
        for value in values {
            self.output.write_i32::<BigEndian>(*value)?;
        }
        Ok(())
    }

    pub fn long_array(&mut self, name: Option<&str>, values: &[i64]) -> Result<(), NbtError> {
        let length = check_array_length(TagKind::LongArray, values.len())?;
        self.begin_tag(TagKind::LongArray, name)?;
        self.output.write_i32::<BigEndian>(length)?;
        for value in values {
            self.output.write_i64::<BigEndian>(*value)?;
        }
        Ok(())
    }

    /// Opens a list. Exactly `length` elements of `element_kind` must be
    /// pushed before [`end_list`](NbtWriter::end_list).
    pub fn start_list(
        &mut self,
        name: Option<&str>,
        element_kind: TagKind,
        length: i32,
    ) -> Result<(), NbtError> {
        if length < 0 {
            return Err(NbtError::Structure {
                reason: format!("list declares negative length {}", length),
            });
        }
        if element_kind == TagKind::End && length > 0 {
            return Err(NbtError::Structure {
                reason: format!("list of {} declares length {}", TagKind::End, length),
            });
        }

        self.begin_tag(TagKind::List, name)?;
        self.output.write_u8(element_kind.id())?;
        self.output.write_i32::<BigEndian>(length)?;
        self.stack.push(Frame::List {
            element_kind,
            remaining: length,
        });
        Ok(())
    }

    pub fn end_list(&mut self) -> Result<(), NbtError> {
        match self.stack.last() {
            Some(Frame::List { remaining: 0, .. }) => {
                self.stack.pop();
                Ok(())
            }
            Some(Frame::List { remaining, .. }) => Err(NbtError::Structure {
                reason: format!("list is still missing {} elements", remaining),
            }),
            _ => Err(NbtError::Structure {
                reason: "end of list without a matching start".to_string(),
            }),
        }
    }

    pub fn start_compound(&mut self, name: Option<&str>) -> Result<(), NbtError> {
        self.begin_tag(TagKind::Compound, name)?;
        self.stack.push(Frame::Compound {
            written_names: HashSet::new(),
        });
        Ok(())
    }

    pub fn end_compound(&mut self) -> Result<(), NbtError> {
        if self.stack.len() == 1 {
            return Err(NbtError::Structure {
                reason: "the root compound is closed with end(), not end_compound()".to_string(),
            });
        }
        match self.stack.last() {
            Some(Frame::Compound { .. }) => {
                self.output.write_u8(TagKind::End.id())?;
                self.stack.pop();
                Ok(())
            }
            _ => Err(NbtError::Structure {
                reason: "end of compound without a matching start".to_string(),
            }),
        }
    }
}

/// Writes a tree with the given root name through the event writer.
pub(crate) fn write_named_compound_tag<W: Write>(
    writer: &mut W,
    root_name: &str,
    compound_tag: &CompoundTag,
) -> Result<(), NbtError> {
    let mut nbt_writer = NbtWriter::new(writer);
    nbt_writer.start(root_name)?;
    emit_compound(&mut nbt_writer, compound_tag)?;
    nbt_writer.end()
}

/// Writes an uncompressed NBT document with a nameless root.
pub fn write_compound_tag<W: Write>(
    writer: &mut W,
    compound_tag: &CompoundTag,
) -> Result<(), NbtError> {
    write_named_compound_tag(writer, "", compound_tag)
}

/// Writes a gzip-compressed NBT document with a nameless root.
pub fn write_gzip_compound_tag<W: Write>(
    writer: &mut W,
    compound_tag: &CompoundTag,
) -> Result<(), NbtError> {
    let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
    write_compound_tag(&mut encoder, compound_tag)?;
    encoder.finish()?;
    Ok(())
}

/// Writes a zlib-compressed NBT document with a nameless root.
pub fn write_zlib_compound_tag<W: Write>(
    writer: &mut W,
    compound_tag: &CompoundTag,
) -> Result<(), NbtError> {
    let mut encoder = ZlibEncoder::new(writer, flate2::Compression::default());
    write_compound_tag(&mut encoder, compound_tag)?;
    encoder.finish()?;
    Ok(())
}

fn emit_compound<W: Write>(
    writer: &mut NbtWriter<W>,
    compound_tag: &CompoundTag,
) -> Result<(), NbtError> {
    for (name, tag) in compound_tag.iter() {
        emit_tag(writer, Some(name), tag)?;
    }
    Ok(())
}

fn emit_list<W: Write>(writer: &mut NbtWriter<W>, list: &ListTag) -> Result<(), NbtError> {
    for tag in list {
        emit_tag(writer, None, tag)?;
    }
    Ok(())
}

fn emit_tag<W: Write>(
    writer: &mut NbtWriter<W>,
    name: Option<&str>,
    tag: &Tag,
) -> Result<(), NbtError> {
    match tag {
        Tag::Byte(value) => writer.byte(name, *value),
        Tag::Short(value) => writer.short(name, *value),
        Tag::Int(value) => writer.int(name, *value),
        Tag::Long(value) => writer.long(name, *value),
        Tag::Float(value) => writer.float(name, *value),
        Tag::Double(value) => writer.double(name, *value),
        Tag::String(value) => writer.string(name, value),
        Tag::ByteArray(values) => writer.byte_array(name, values),
        Tag::IntArray(values) => writer.int_array(name, values),
        Tag::LongArray(values) => writer.long_array(name, values),
        Tag::List(list) => {
            let length = check_array_length(TagKind::List, list.len())?;
            writer.start_list(name, list.element_kind(), length)?;
            emit_list(writer, list)?;
            writer.end_list()
        }
        Tag::Compound(compound_tag) => {
            writer.start_compound(name)?;
            emit_compound(writer, compound_tag)?;
            writer.end_compound()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{write_named_compound_tag, NbtWriter};
    use crate::error::NbtError;
    use crate::tag::TagKind;
    use crate::tree::{read_compound_tag, TreeBuilder};

    #[test]
    fn test_list_of_strings_wire_bytes() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("doc").unwrap();
        writer.start_list(Some("xs"), TagKind::String, 2).unwrap();
        writer.string(None, "ab").unwrap();
        writer.string(None, "cd").unwrap();
        writer.end_list().unwrap();
        writer.end().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"\x0A\x00\x03doc");
        expected.extend_from_slice(b"\x09\x00\x02xs\x08\x00\x00\x00\x02");
        expected.extend_from_slice(b"\x00\x02ab\x00\x02cd");
        expected.push(0x00);

        assert_eq!(writer.into_inner(), expected);
    }

    #[test]
    fn test_minimal_document_bytes() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("hello").unwrap();
        writer.end().unwrap();

        assert_eq!(writer.into_inner(), b"\x0A\x00\x05hello\x00");
    }

    #[test]
    fn test_primitive_document_length() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("root").unwrap();
        writer.byte(Some("b"), -1).unwrap();
        writer.short(Some("s"), 258).unwrap();
        writer.int(Some("i"), 65538).unwrap();
        writer.long(Some("l"), 1).unwrap();
        writer.float(Some("f"), 1.0).unwrap();
        writer.double(Some("d"), 2.0).unwrap();
        writer.end().unwrap();

        let bytes = writer.into_inner();
        // Root header (7) + byte (5) + short (6) + int (8) + long (12)
        // + float (8) + double (12) + terminator (1).
        assert_eq!(bytes.len(), 59);

        let root = read_compound_tag(&mut &bytes[..]).unwrap();
        assert_eq!(root.get_i8("b").unwrap(), -1);
        assert_eq!(root.get_i16("s").unwrap(), 258);
        assert_eq!(root.get_i32("i").unwrap(), 65538);
        assert_eq!(root.get_i64("l").unwrap(), 1);
        assert_eq!(root.get_f32("f").unwrap(), 1.0);
        assert_eq!(root.get_f64("d").unwrap(), 2.0);
    }

    #[test]
    fn test_parse_then_write_reproduces_bytes() {
        let mut original = Vec::new();
        original.extend_from_slice(b"\x0A\x00\x04root");
        original.extend_from_slice(b"\x01\x00\x01a\x7F");
        original.extend_from_slice(b"\x09\x00\x02xs\x08\x00\x00\x00\x02");
        original.extend_from_slice(b"\x00\x02ab\x00\x02cd");
        original.extend_from_slice(b"\x0A\x00\x01c\x03\x00\x01i\x00\x00\x01\x00\x00");
        original.extend_from_slice(b"\x07\x00\x02ba\x00\x00\x00\x03\x01\x02\x03");
        original.push(0x00);

        let mut builder = TreeBuilder::new();
        crate::parse::parse(&original[..], &mut builder).unwrap();
        let (root_name, root) = builder.finish().unwrap();

        let mut rewritten = Vec::new();
        write_named_compound_tag(&mut rewritten, &root_name, &root).unwrap();
        assert_eq!(rewritten, original);
    }

    #[test]
    fn test_value_without_start() {
        let mut writer = NbtWriter::new(Vec::new());
        let err = writer.byte(Some("a"), 1).unwrap_err();
        assert!(matches!(err, NbtError::Structure { .. }));
    }

    #[test]
    fn test_duplicate_name_in_compound() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("root").unwrap();
        writer.byte(Some("a"), 1).unwrap();

        match writer.byte(Some("a"), 2).unwrap_err() {
            NbtError::DuplicateName { name } => assert_eq!(name, "a"),
            e => panic!("Expected `DuplicateName` but got `{:?}`", e),
        }
    }

    #[test]
    fn test_wrong_kind_pushed_into_list() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("root").unwrap();
        writer.start_list(Some("xs"), TagKind::Int, 1).unwrap();

        match writer.byte(None, 1).unwrap_err() {
            NbtError::WrongKind { expected, actual } => {
                assert_eq!(expected, TagKind::Int);
                assert_eq!(actual, TagKind::Byte);
            }
            e => panic!("Expected `WrongKind` but got `{:?}`", e),
        }
    }

    #[test]
    fn test_named_element_in_list() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("root").unwrap();
        writer.start_list(Some("xs"), TagKind::Int, 1).unwrap();
        assert!(writer.int(Some("oops"), 1).is_err());
    }

    #[test]
    fn test_list_element_count_enforced() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("root").unwrap();
        writer.start_list(Some("xs"), TagKind::Int, 2).unwrap();
        writer.int(None, 1).unwrap();

        // Closing early fails and reports the shortfall.
        assert!(writer.end_list().is_err());

        writer.int(None, 2).unwrap();
        // A third element exceeds the declared length.
        assert!(writer.int(None, 3).is_err());
    }

    #[test]
    fn test_end_with_open_containers() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("root").unwrap();
        writer.start_compound(Some("inner")).unwrap();
        assert!(writer.end().is_err());
    }

    #[test]
    fn test_root_compound_needs_end() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("root").unwrap();
        assert!(writer.end_compound().is_err());
        writer.end().unwrap();
    }

    #[test]
    fn test_list_of_end_with_elements_rejected() {
        let mut writer = NbtWriter::new(Vec::new());
        writer.start("root").unwrap();
        assert!(writer.start_list(Some("xs"), TagKind::End, 1).is_err());
        assert!(writer.start_list(Some("xs"), TagKind::End, 0).is_ok());
        writer.end_list().unwrap();
        writer.end().unwrap();
    }
}
