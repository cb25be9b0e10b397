//! In-memory NBT tree model.
//!
//! Trees are produced by registering a [`TreeBuilder`] with the streaming
//! parser (there is only one parser in the crate) or built directly with
//! the mutators here, and are turned back into bytes by the writer.

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use linked_hash_map::LinkedHashMap;

use crate::error::{CompoundTagError, NbtError};
use crate::parse::{parse, Control, NbtHandler};
use crate::tag::TagKind;

/// A single NBT value.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(ListTag),
    Compound(CompoundTag),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    /// The default empty value of a kind: zero for primitives, empty for
    /// strings, arrays and containers. `None` for TAG_End, which has no
    /// value form.
    pub fn empty(kind: TagKind) -> Option<Tag> {
        match kind {
            TagKind::End => None,
            TagKind::Byte => Some(Tag::Byte(0)),
            TagKind::Short => Some(Tag::Short(0)),
            TagKind::Int => Some(Tag::Int(0)),
            TagKind::Long => Some(Tag::Long(0)),
            TagKind::Float => Some(Tag::Float(0.0)),
            TagKind::Double => Some(Tag::Double(0.0)),
            TagKind::ByteArray => Some(Tag::ByteArray(Vec::new())),
            TagKind::String => Some(Tag::String(String::new())),
            TagKind::List => Some(Tag::List(ListTag::new())),
            TagKind::Compound => Some(Tag::Compound(CompoundTag::new())),
            TagKind::IntArray => Some(Tag::IntArray(Vec::new())),
            TagKind::LongArray => Some(Tag::LongArray(Vec::new())),
        }
    }

    /// The wire kind of this value. TAG_End never appears as a value.
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::Byte(_) => TagKind::Byte,
            Tag::Short(_) => TagKind::Short,
            Tag::Int(_) => TagKind::Int,
            Tag::Long(_) => TagKind::Long,
            Tag::Float(_) => TagKind::Float,
            Tag::Double(_) => TagKind::Double,
            Tag::ByteArray(_) => TagKind::ByteArray,
            Tag::String(_) => TagKind::String,
            Tag::List(_) => TagKind::List,
            Tag::Compound(_) => TagKind::Compound,
            Tag::IntArray(_) => TagKind::IntArray,
            Tag::LongArray(_) => TagKind::LongArray,
        }
    }
}

/// A homogeneous sequence of tags.
///
/// The declared element kind travels with the list so an empty list can be
/// written back with the kind it was read with. A list created empty
/// carries TAG_End as an "uninitialized" sentinel; the first push binds
/// the real kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ListTag {
    element_kind: TagKind,
    tags: Vec<Tag>,
}

impl Default for ListTag {
    fn default() -> Self {
        ListTag::new()
    }
}

impl ListTag {
    /// An empty, uninitialized list.
    pub fn new() -> ListTag {
        ListTag {
            element_kind: TagKind::End,
            tags: Vec::new(),
        }
    }

    /// An empty list bound to the given element kind.
    pub fn of(element_kind: TagKind) -> ListTag {
        ListTag {
            element_kind,
            tags: Vec::new(),
        }
    }

    pub fn element_kind(&self) -> TagKind {
        self.element_kind
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.tags.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    /// Appends a tag, binding the element kind on the first push into an
    /// uninitialized list and rejecting mismatched kinds afterwards.
    pub fn push(&mut self, tag: Tag) -> Result<(), NbtError> {
        if self.element_kind == TagKind::End {
            self.element_kind = tag.kind();
        } else if tag.kind() != self.element_kind {
            return Err(NbtError::WrongKind {
                expected: self.element_kind,
                actual: tag.kind(),
            });
        }
        self.tags.push(tag);
        Ok(())
    }

    /// Replaces the tag at `index`, which must exist and match the
    /// element kind.
    pub fn set(&mut self, index: usize, tag: Tag) -> Result<(), NbtError> {
        if tag.kind() != self.element_kind {
            return Err(NbtError::WrongKind {
                expected: self.element_kind,
                actual: tag.kind(),
            });
        }
        match self.tags.get_mut(index) {
            Some(slot) => {
                *slot = tag;
                Ok(())
            }
            None => Err(NbtError::Structure {
                reason: format!("list index {} out of bounds ({})", index, self.tags.len()),
            }),
        }
    }

    /// Removes and returns the tag at `index`. The bound element kind is
    /// retained even when the list becomes empty.
    pub fn remove(&mut self, index: usize) -> Option<Tag> {
        if index < self.tags.len() {
            Some(self.tags.remove(index))
        } else {
            None
        }
    }
}

impl<'a> IntoIterator for &'a ListTag {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// An ordered, name-keyed collection of tags.
///
/// Insertion order is preserved for stable round-tripping; each name
/// occurs at most once, and inserting an existing name replaces the value
/// in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundTag {
    tags: LinkedHashMap<String, Tag>,
}

impl CompoundTag {
    pub fn new() -> CompoundTag {
        CompoundTag {
            tags: LinkedHashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.tags.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.tags.get_mut(name)
    }

    /// Inserts or replaces a tag. A replaced tag keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) {
        let name = name.into();
        match self.tags.get_mut(&name) {
            Some(slot) => *slot = tag,
            None => {
                self.tags.insert(name, tag);
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        self.tags.remove(name)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.tags.iter().map(|(name, tag)| (name.as_str(), tag))
    }

    pub fn insert_i8(&mut self, name: impl Into<String>, value: i8) {
        self.insert(name, Tag::Byte(value));
    }

    pub fn insert_bool(&mut self, name: impl Into<String>, value: bool) {
        self.insert_i8(name, value as i8);
    }

    pub fn insert_i16(&mut self, name: impl Into<String>, value: i16) {
        self.insert(name, Tag::Short(value));
    }

    pub fn insert_i32(&mut self, name: impl Into<String>, value: i32) {
        self.insert(name, Tag::Int(value));
    }

    pub fn insert_i64(&mut self, name: impl Into<String>, value: i64) {
        self.insert(name, Tag::Long(value));
    }

    pub fn insert_f32(&mut self, name: impl Into<String>, value: f32) {
        self.insert(name, Tag::Float(value));
    }

    pub fn insert_f64(&mut self, name: impl Into<String>, value: f64) {
        self.insert(name, Tag::Double(value));
    }

    pub fn insert_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(name, Tag::String(value.into()));
    }

    pub fn insert_i8_vec(&mut self, name: impl Into<String>, values: impl Into<Vec<i8>>) {
        self.insert(name, Tag::ByteArray(values.into()));
    }

    pub fn insert_i32_vec(&mut self, name: impl Into<String>, values: impl Into<Vec<i32>>) {
        self.insert(name, Tag::IntArray(values.into()));
    }

    pub fn insert_i64_vec(&mut self, name: impl Into<String>, values: impl Into<Vec<i64>>) {
        self.insert(name, Tag::LongArray(values.into()));
    }

    /// Inserts a list of strings.
    pub fn insert_str_vec<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = ListTag::of(TagKind::String);
        for value in values {
            // Cannot fail: every element is a string.
            let _ = list.push(Tag::String(value.into()));
        }
        self.insert(name, Tag::List(list));
    }

    pub fn insert_list(&mut self, name: impl Into<String>, list: ListTag) {
        self.insert(name, Tag::List(list));
    }

    pub fn insert_compound_tag(&mut self, name: impl Into<String>, tag: CompoundTag) {
        self.insert(name, Tag::Compound(tag));
    }

    /// Descends through nested compounds by name and returns the tag at
    /// the end of the path, or `None` when any step is missing or not a
    /// compound.
    pub fn rget(&self, path: &[&str]) -> Option<&Tag> {
        let (first, rest) = path.split_first()?;
        let mut tag = self.get(first)?;

        for name in rest {
            match tag {
                Tag::Compound(compound) => tag = compound.get(name)?,
                _ => return None,
            }
        }

        Some(tag)
    }

    fn get_checked(&self, name: &str, expected: TagKind) -> Result<&Tag, CompoundTagError> {
        match self.tags.get(name) {
            None => Err(CompoundTagError::NotFound {
                name: name.to_string(),
            }),
            Some(tag) if tag.kind() == expected => Ok(tag),
            Some(tag) => Err(CompoundTagError::WrongKind {
                name: name.to_string(),
                expected,
                actual: tag.kind(),
            }),
        }
    }

    pub fn get_i8(&self, name: &str) -> Result<i8, CompoundTagError> {
        match self.get_checked(name, TagKind::Byte)? {
            Tag::Byte(value) => Ok(*value),
            _ => unreachable!(),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, CompoundTagError> {
        Ok(self.get_i8(name)? != 0)
    }

    pub fn get_i16(&self, name: &str) -> Result<i16, CompoundTagError> {
        match self.get_checked(name, TagKind::Short)? {
            Tag::Short(value) => Ok(*value),
            _ => unreachable!(),
        }
    }

    pub fn get_i32(&self, name: &str) -> Result<i32, CompoundTagError> {
        match self.get_checked(name, TagKind::Int)? {
            Tag::Int(value) => Ok(*value),
            _ => unreachable!(),
        }
    }

    pub fn get_i64(&self, name: &str) -> Result<i64, CompoundTagError> {
        match self.get_checked(name, TagKind::Long)? {
            Tag::Long(value) => Ok(*value),
            _ => unreachable!(),
        }
    }

    pub fn get_f32(&self, name: &str) -> Result<f32, CompoundTagError> {
        match self.get_checked(name, TagKind::Float)? {
            Tag::Float(value) => Ok(*value),
            _ => unreachable!(),
        }
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, CompoundTagError> {
        match self.get_checked(name, TagKind::Double)? {
            Tag::Double(value) => Ok(*value),
            _ => unreachable!(),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str, CompoundTagError> {
        match self.get_checked(name, TagKind::String)? {
            Tag::String(value) => Ok(value),
            _ => unreachable!(),
        }
    }

    pub fn get_i8_vec(&self, name: &str) -> Result<&[i8], CompoundTagError> {
        match self.get_checked(name, TagKind::ByteArray)? {
            Tag::ByteArray(values) => Ok(values),
            _ => unreachable!(),
        }
    }

    pub fn get_i32_vec(&self, name: &str) -> Result<&[i32], CompoundTagError> {
        match self.get_checked(name, TagKind::IntArray)? {
            Tag::IntArray(values) => Ok(values),
            _ => unreachable!(),
        }
    }

    pub fn get_i64_vec(&self, name: &str) -> Result<&[i64], CompoundTagError> {
        match self.get_checked(name, TagKind::LongArray)? {
            Tag::LongArray(values) => Ok(values),
            _ => unreachable!(),
        }
    }

    pub fn get_list(&self, name: &str) -> Result<&ListTag, CompoundTagError> {
        match self.get_checked(name, TagKind::List)? {
            Tag::List(list) => Ok(list),
            _ => unreachable!(),
        }
    }

    pub fn get_compound_tag(&self, name: &str) -> Result<&CompoundTag, CompoundTagError> {
        match self.get_checked(name, TagKind::Compound)? {
            Tag::Compound(tag) => Ok(tag),
            _ => unreachable!(),
        }
    }
}

/// Parse handler that materializes the event stream into a tree.
pub struct TreeBuilder {
    root_name: Option<String>,
    root: Option<CompoundTag>,
    stack: Vec<Frame>,
}

enum Frame {
    Compound {
        name: Option<String>,
        tag: CompoundTag,
    },
    List {
        name: Option<String>,
        tag: ListTag,
    },
}

impl TreeBuilder {
    pub fn new() -> TreeBuilder {
        TreeBuilder {
            root_name: None,
            root: None,
            stack: Vec::new(),
        }
    }

    /// Consumes the builder and returns the root name and compound.
    ///
    /// Fails if no complete document was parsed into the builder.
    pub fn finish(self) -> Result<(String, CompoundTag), NbtError> {
        match (self.root_name, self.root, self.stack.is_empty()) {
            (Some(name), Some(root), true) => Ok((name, root)),
            _ => Err(NbtError::Structure {
                reason: "tree builder did not receive a complete document".to_string(),
            }),
        }
    }

    fn attach(&mut self, name: Option<&str>, tag: Tag) -> Result<Control, NbtError> {
        match self.stack.last_mut() {
            Some(Frame::Compound { tag: compound, .. }) => {
                let name = name.ok_or_else(|| NbtError::Structure {
                    reason: "nameless tag at compound scope".to_string(),
                })?;
                if compound.contains_key(name) {
                    return Err(NbtError::DuplicateName {
                        name: name.to_string(),
                    });
                }
                compound.insert(name, tag);
            }
            Some(Frame::List { tag: list, .. }) => list.push(tag)?,
            None => {
                return Err(NbtError::Structure {
                    reason: "value outside any container".to_string(),
                })
            }
        }
        Ok(Control::Continue)
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        TreeBuilder::new()
    }
}

impl NbtHandler for TreeBuilder {
    fn start(&mut self, root_name: &str) -> Result<Control, NbtError> {
        self.root_name = Some(root_name.to_string());
        Ok(Control::Continue)
    }

    fn byte(&mut self, name: Option<&str>, value: i8) -> Result<Control, NbtError> {
        self.attach(name, Tag::Byte(value))
    }

    fn short(&mut self, name: Option<&str>, value: i16) -> Result<Control, NbtError> {
        self.attach(name, Tag::Short(value))
    }

    fn int(&mut self, name: Option<&str>, value: i32) -> Result<Control, NbtError> {
        self.attach(name, Tag::Int(value))
    }

    fn long(&mut self, name: Option<&str>, value: i64) -> Result<Control, NbtError> {
        self.attach(name, Tag::Long(value))
    }

    fn float(&mut self, name: Option<&str>, value: f32) -> Result<Control, NbtError> {
        self.attach(name, Tag::Float(value))
    }

    fn double(&mut self, name: Option<&str>, value: f64) -> Result<Control, NbtError> {
        self.attach(name, Tag::Double(value))
    }

    fn string(&mut self, name: Option<&str>, value: &str) -> Result<Control, NbtError> {
        self.attach(name, Tag::String(value.to_string()))
    }

    fn byte_array(&mut self, name: Option<&str>, values: &[i8]) -> Result<Control, NbtError> {
        self.attach(name, Tag::ByteArray(values.to_vec()))
    }

    fn int_array(&mut self, name: Option<&str>, values: &[i32]) -> Result<Control, NbtError> {
        self.attach(name, Tag::IntArray(values.to_vec()))
    }

    fn long_array(&mut self, name: Option<&str>, values: &[i64]) -> Result<Control, NbtError> {
        self.attach(name, Tag::LongArray(values.to_vec()))
    }

    fn start_list(
        &mut self,
        name: Option<&str>,
        element_kind: TagKind,
        length: i32,
    ) -> Result<Control, NbtError> {
        if element_kind == TagKind::End && length > 0 {
            return Err(NbtError::ListOfEnd { length });
        }
        self.stack.push(Frame::List {
            name: name.map(str::to_string),
            tag: ListTag::of(element_kind),
        });
        Ok(Control::Continue)
    }

    fn end_list(&mut self) -> Result<Control, NbtError> {
        match self.stack.pop() {
            Some(Frame::List { name, tag }) => self.attach(name.as_deref(), Tag::List(tag)),
            _ => Err(NbtError::Structure {
                reason: "end of list without a matching start".to_string(),
            }),
        }
    }

    fn start_compound(&mut self, name: Option<&str>) -> Result<Control, NbtError> {
        self.stack.push(Frame::Compound {
            name: name.map(str::to_string),
            tag: CompoundTag::new(),
        });
        Ok(Control::Continue)
    }

    fn end_compound(&mut self) -> Result<Control, NbtError> {
        match self.stack.pop() {
            Some(Frame::Compound { name, tag }) => {
                if self.stack.is_empty() {
                    self.root = Some(tag);
                    Ok(Control::Continue)
                } else {
                    self.attach(name.as_deref(), Tag::Compound(tag))
                }
            }
            _ => Err(NbtError::Structure {
                reason: "end of compound without a matching start".to_string(),
            }),
        }
    }
}

/// Reads one uncompressed NBT document and returns its root compound.
///
/// The root name is discarded; use [`NbtDocument`](crate::NbtDocument)
/// when it matters.
pub fn read_compound_tag<R: Read>(reader: &mut R) -> Result<CompoundTag, NbtError> {
    let mut builder = TreeBuilder::new();
    parse(reader, &mut builder)?;
    let (_, root) = builder.finish()?;
    Ok(root)
}

/// Reads a gzip-compressed NBT document and returns its root compound.
pub fn read_gzip_compound_tag<R: Read>(reader: &mut R) -> Result<CompoundTag, NbtError> {
    read_compound_tag(&mut GzDecoder::new(reader))
}

/// Reads a zlib-compressed NBT document and returns its root compound.
pub fn read_zlib_compound_tag<R: Read>(reader: &mut R) -> Result<CompoundTag, NbtError> {
    read_compound_tag(&mut ZlibDecoder::new(reader))
}

#[cfg(test)]
mod tests {
    use super::{read_compound_tag, CompoundTag, ListTag, Tag, TreeBuilder};
    use crate::error::{CompoundTagError, NbtError};
    use crate::parse::parse;
    use crate::tag::TagKind;

    #[test]
    fn test_materialize_nested_document() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x01\x00\x01a\xFF");
        bytes.extend_from_slice(b"\x0A\x00\x05inner");
        bytes.extend_from_slice(b"\x08\x00\x01s\x00\x02hi");
        bytes.push(0x00);
        bytes.extend_from_slice(b"\x09\x00\x02xs\x08\x00\x00\x00\x02");
        bytes.extend_from_slice(b"\x00\x02ab\x00\x02cd");
        bytes.extend_from_slice(b"\x0C\x00\x02ls\x00\x00\x00\x01");
        bytes.extend_from_slice(&7i64.to_be_bytes());
        bytes.push(0x00);

        let root = read_compound_tag(&mut &bytes[..]).unwrap();

        assert_eq!(root.get_i8("a").unwrap(), -1);
        assert_eq!(root.get_compound_tag("inner").unwrap().get_str("s").unwrap(), "hi");

        let xs = root.get_list("xs").unwrap();
        assert_eq!(xs.element_kind(), TagKind::String);
        assert_eq!(xs.len(), 2);
        assert_eq!(xs.get(0), Some(&Tag::String("ab".to_string())));

        assert_eq!(root.get_i64_vec("ls").unwrap(), [7]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x01\x00\x01a\x01");
        bytes.extend_from_slice(b"\x01\x00\x01a\x02");
        bytes.push(0x00);

        let err = read_compound_tag(&mut &bytes[..]).unwrap_err();
        match err {
            NbtError::DuplicateName { name } => assert_eq!(name, "a"),
            e => panic!("Expected `DuplicateName` but got `{:?}`", e),
        }
    }

    #[test]
    fn test_list_of_end_with_length_rejected_by_builder() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x09\x00\x02xs\x00\x00\x00\x00\x03");
        bytes.push(0x00);

        let mut builder = TreeBuilder::new();
        let err = parse(&bytes[..], &mut builder).unwrap_err();
        assert!(matches!(err, NbtError::ListOfEnd { length: 3 }));
    }

    #[test]
    fn test_empty_list_of_end_is_fine() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x09\x00\x02xs\x00\x00\x00\x00\x00");
        bytes.push(0x00);

        let root = read_compound_tag(&mut &bytes[..]).unwrap();
        let xs = root.get_list("xs").unwrap();
        assert_eq!(xs.element_kind(), TagKind::End);
        assert!(xs.is_empty());
    }

    #[test]
    fn test_list_binds_kind_on_first_push() {
        let mut list = ListTag::new();
        assert_eq!(list.element_kind(), TagKind::End);

        list.push(Tag::Int(1)).unwrap();
        assert_eq!(list.element_kind(), TagKind::Int);

        let err = list.push(Tag::String("no".to_string())).unwrap_err();
        match err {
            NbtError::WrongKind { expected, actual } => {
                assert_eq!(expected, TagKind::Int);
                assert_eq!(actual, TagKind::String);
            }
            e => panic!("Expected `WrongKind` but got `{:?}`", e),
        }
    }

    #[test]
    fn test_emptied_list_retains_kind() {
        let mut list = ListTag::new();
        list.push(Tag::Short(2)).unwrap();
        list.remove(0).unwrap();

        assert!(list.is_empty());
        assert_eq!(list.element_kind(), TagKind::Short);
        assert!(list.push(Tag::Int(1)).is_err());
    }

    #[test]
    fn test_list_set_checks_kind_and_bounds() {
        let mut list = ListTag::of(TagKind::Int);
        list.push(Tag::Int(1)).unwrap();

        assert!(list.set(0, Tag::Int(9)).is_ok());
        assert_eq!(list.get(0), Some(&Tag::Int(9)));
        assert!(list.set(0, Tag::Byte(1)).is_err());
        assert!(list.set(5, Tag::Int(1)).is_err());
    }

    #[test]
    fn test_compound_accessors() {
        let mut tag = CompoundTag::new();
        tag.insert_bool("flag", true);
        tag.insert_str("name", "zombie");
        tag.insert_i32("count", 12);

        assert!(tag.get_bool("flag").unwrap());
        assert_eq!(tag.get_str("name").unwrap(), "zombie");
        assert_eq!(tag.get_i32("count").unwrap(), 12);

        match tag.get_i64("count").unwrap_err() {
            CompoundTagError::WrongKind {
                expected, actual, ..
            } => {
                assert_eq!(expected, TagKind::Long);
                assert_eq!(actual, TagKind::Int);
            }
            e => panic!("Expected `WrongKind` but got `{:?}`", e),
        }

        assert!(matches!(
            tag.get_i32("missing").unwrap_err(),
            CompoundTagError::NotFound { .. }
        ));
    }

    #[test]
    fn test_rget_descends_nested_compounds() {
        let mut inner = CompoundTag::new();
        inner.insert_i32("DataVersion", 2566);

        let mut root = CompoundTag::new();
        root.insert_compound_tag("Data", inner);

        assert_eq!(
            root.rget(&["Data", "DataVersion"]),
            Some(&Tag::Int(2566))
        );
        assert!(root.rget(&["Data", "missing"]).is_none());
        assert!(root.rget(&["Data", "DataVersion", "deeper"]).is_none());
        assert!(root.rget(&[]).is_none());
    }

    #[test]
    fn test_empty_tag_for_every_kind() {
        assert_eq!(Tag::empty(TagKind::End), None);

        for id in 1u8..=12 {
            let kind = TagKind::from_u8(id).unwrap();
            let tag = Tag::empty(kind).unwrap();
            assert_eq!(tag.kind(), kind);
        }
    }

    #[test]
    fn test_compound_preserves_insertion_order() {
        let mut tag = CompoundTag::new();
        tag.insert_i32("z", 1);
        tag.insert_i32("a", 2);
        tag.insert_i32("m", 3);
        // Replacing keeps position.
        tag.insert_i32("a", 4);

        let names: Vec<&str> = tag.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["z", "a", "m"]);
        assert_eq!(tag.get_i32("a").unwrap(), 4);
    }
}
