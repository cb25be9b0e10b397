//! Event-driven NBT parsing.
//!
//! [`parse`] walks an NBT byte stream top-down and reports everything it
//! reads to an [`NbtHandler`]. Handlers can follow along
//! ([`Control::Continue`]), fast-forward past the rest of the container
//! they are in ([`Control::Skip`]), or stop the walk entirely
//! ([`Control::Abort`]). The tree materializer in [`crate::tree`] is just
//! another handler, so there is exactly one parser in the crate.

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::NbtError;
use crate::io::{read_i32_array, read_i64_array, TrackedReader};
use crate::tag::TagKind;

/// What the parser should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Keep going.
    Continue,
    /// Stop reporting events for the remainder of the current container.
    /// The parser still consumes its bytes to keep the stream aligned,
    /// and the container's end event is still delivered.
    Skip,
    /// Unwind cleanly; no further events are delivered.
    Abort,
}

/// Receiver for parse events.
///
/// Every method has a no-op default, so a handler only implements the
/// callbacks it cares about. `name` is present when the tag appears at
/// compound scope and absent for list elements and for the root compound
/// (whose name arrives through [`NbtHandler::start`]).
#[allow(unused_variables)]
pub trait NbtHandler {
    /// Called once the root tag's name has been read, before its payload.
    fn start(&mut self, root_name: &str) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    /// Called after the root compound has been fully parsed or skipped.
    fn end(&mut self) -> Result<(), NbtError> {
        Ok(())
    }

    fn byte(&mut self, name: Option<&str>, value: i8) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn short(&mut self, name: Option<&str>, value: i16) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn int(&mut self, name: Option<&str>, value: i32) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn long(&mut self, name: Option<&str>, value: i64) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn float(&mut self, name: Option<&str>, value: f32) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn double(&mut self, name: Option<&str>, value: f64) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn string(&mut self, name: Option<&str>, value: &str) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn byte_array(&mut self, name: Option<&str>, values: &[i8]) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn int_array(&mut self, name: Option<&str>, values: &[i32]) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn long_array(&mut self, name: Option<&str>, values: &[i64]) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn start_list(
        &mut self,
        name: Option<&str>,
        element_kind: TagKind,
        length: i32,
    ) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn end_list(&mut self) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn start_compound(&mut self, name: Option<&str>) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }

    fn end_compound(&mut self) -> Result<Control, NbtError> {
        Ok(Control::Continue)
    }
}

/// Parses one uncompressed NBT document from `source`, reporting events
/// to `handler`.
///
/// The document must be exactly one named TAG_Compound; anything else at
/// the root fails with [`NbtError::InvalidRoot`].
pub fn parse<R: Read, H: NbtHandler>(source: R, handler: &mut H) -> Result<(), NbtError> {
    Parser {
        reader: TrackedReader::new(source),
    }
    .parse_document(handler)
}

/// Parses a gzip-compressed NBT document.
pub fn parse_gzip<R: Read, H: NbtHandler>(source: R, handler: &mut H) -> Result<(), NbtError> {
    parse(GzDecoder::new(source), handler)
}

/// Parses a zlib-compressed NBT document.
pub fn parse_zlib<R: Read, H: NbtHandler>(source: R, handler: &mut H) -> Result<(), NbtError> {
    parse(ZlibDecoder::new(source), handler)
}

struct Parser<R> {
    reader: TrackedReader<R>,
}

impl<R: Read> Parser<R> {
    fn parse_document<H: NbtHandler>(&mut self, handler: &mut H) -> Result<(), NbtError> {
        let kind = match self.reader.read_u8() {
            Ok(kind) => kind,
            // An empty file has no root at all.
            Err(NbtError::UnexpectedEnd { offset: 0 }) => {
                return Err(NbtError::InvalidRoot {
                    kind: TagKind::End.id(),
                })
            }
            Err(e) => return Err(e),
        };

        if kind != TagKind::Compound.id() {
            return Err(NbtError::InvalidRoot { kind });
        }

        let root_name = self.reader.read_string()?;

        match handler.start(&root_name)? {
            Control::Abort => return Ok(()),
            Control::Skip => self.skip_compound_body()?,
            Control::Continue => {
                if self.parse_compound(None, handler)? == Control::Abort {
                    return Ok(());
                }
            }
        }

        handler.end()
    }

    /// Parses a compound payload. The returned control is the one the
    /// handler gave for `end_compound`, addressed to the parent scope.
    fn parse_compound<H: NbtHandler>(
        &mut self,
        name: Option<&str>,
        handler: &mut H,
    ) -> Result<Control, NbtError> {
        match handler.start_compound(name)? {
            Control::Abort => return Ok(Control::Abort),
            Control::Skip => {
                self.skip_compound_body()?;
                return handler.end_compound();
            }
            Control::Continue => {}
        }

        loop {
            let at = self.reader.offset();
            let kind_byte = self.reader.read_u8()?;

            if kind_byte == TagKind::End.id() {
                return handler.end_compound();
            }

            let kind = TagKind::from_u8(kind_byte).ok_or(NbtError::InvalidKind {
                kind: kind_byte,
                offset: at,
            })?;
            let child_name = self.reader.read_string()?;

            match self.parse_payload(kind, Some(&child_name), handler)? {
                Control::Continue => {}
                Control::Skip => {
                    self.skip_compound_body()?;
                    return handler.end_compound();
                }
                Control::Abort => return Ok(Control::Abort),
            }
        }
    }

    fn parse_list<H: NbtHandler>(
        &mut self,
        name: Option<&str>,
        handler: &mut H,
    ) -> Result<Control, NbtError> {
        let at = self.reader.offset();
        let kind_byte = self.reader.read_u8()?;
        let element_kind = TagKind::from_u8(kind_byte).ok_or(NbtError::InvalidKind {
            kind: kind_byte,
            offset: at,
        })?;

        let length_at = self.reader.offset();
        let length = self.reader.read_i32()?;
        if length < 0 {
            return Err(NbtError::NegativeLength {
                kind: TagKind::List,
                length,
                offset: length_at,
            });
        }

        match handler.start_list(name, element_kind, length)? {
            Control::Abort => return Ok(Control::Abort),
            Control::Skip => {
                self.skip_list_elements(element_kind, length as u64)?;
                return handler.end_list();
            }
            Control::Continue => {}
        }

        for remaining in (0..length).rev() {
            match self.parse_payload(element_kind, None, handler)? {
                Control::Continue => {}
                Control::Skip => {
                    self.skip_list_elements(element_kind, remaining as u64)?;
                    return handler.end_list();
                }
                Control::Abort => return Ok(Control::Abort),
            }
        }

        handler.end_list()
    }

    fn parse_payload<H: NbtHandler>(
        &mut self,
        kind: TagKind,
        name: Option<&str>,
        handler: &mut H,
    ) -> Result<Control, NbtError> {
        match kind {
            // Only reachable as the element of a malformed list of END;
            // there is nothing to read and nothing to report.
            TagKind::End => Ok(Control::Continue),
            TagKind::Byte => {
                let value = self.reader.read_i8()?;
                handler.byte(name, value)
            }
            TagKind::Short => {
                let value = self.reader.read_i16()?;
                handler.short(name, value)
            }
            TagKind::Int => {
                let value = self.reader.read_i32()?;
                handler.int(name, value)
            }
            TagKind::Long => {
                let value = self.reader.read_i64()?;
                handler.long(name, value)
            }
            TagKind::Float => {
                let value = self.reader.read_f32()?;
                handler.float(name, value)
            }
            TagKind::Double => {
                let value = self.reader.read_f64()?;
                handler.double(name, value)
            }
            TagKind::String => {
                let value = self.reader.read_string()?;
                handler.string(name, &value)
            }
            TagKind::ByteArray => {
                let length = self.reader.read_array_length(TagKind::ByteArray)?;
                let bytes = self.reader.read_bytes(length)?;
                let values: Vec<i8> = bytes.into_iter().map(|b| b as i8).collect();
                handler.byte_array(name, &values)
            }
            TagKind::IntArray => {
                let length = self.reader.read_array_length(TagKind::IntArray)?;
                let values = read_i32_array(&mut self.reader, length)?;
                handler.int_array(name, &values)
            }
            TagKind::LongArray => {
                let length = self.reader.read_array_length(TagKind::LongArray)?;
                let values = read_i64_array(&mut self.reader, length)?;
                handler.long_array(name, &values)
            }
            TagKind::List => self.parse_list(name, handler),
            TagKind::Compound => self.parse_compound(name, handler),
        }
    }

    /// Consumes a payload without reporting events. Used to realign the
    /// stream after a handler asked to skip.
    fn skip_payload(&mut self, kind: TagKind) -> Result<(), NbtError> {
        match kind {
            TagKind::End => Ok(()),
            TagKind::Byte => self.reader.skip_bytes(1),
            TagKind::Short => self.reader.skip_bytes(2),
            TagKind::Int | TagKind::Float => self.reader.skip_bytes(4),
            TagKind::Long | TagKind::Double => self.reader.skip_bytes(8),
            TagKind::String => {
                let length = self.reader.read_u16()? as u64;
                self.reader.skip_bytes(length)
            }
            TagKind::ByteArray => {
                let length = self.reader.read_array_length(TagKind::ByteArray)?;
                self.reader.skip_bytes(length as u64)
            }
            TagKind::IntArray => {
                let length = self.reader.read_array_length(TagKind::IntArray)?;
                self.reader.skip_bytes(length as u64 * 4)
            }
            TagKind::LongArray => {
                let length = self.reader.read_array_length(TagKind::LongArray)?;
                self.reader.skip_bytes(length as u64 * 8)
            }
            TagKind::List => {
                let at = self.reader.offset();
                let kind_byte = self.reader.read_u8()?;
                let element_kind = TagKind::from_u8(kind_byte).ok_or(NbtError::InvalidKind {
                    kind: kind_byte,
                    offset: at,
                })?;
                let length_at = self.reader.offset();
                let length = self.reader.read_i32()?;
                if length < 0 {
                    return Err(NbtError::NegativeLength {
                        kind: TagKind::List,
                        length,
                        offset: length_at,
                    });
                }
                self.skip_list_elements(element_kind, length as u64)
            }
            TagKind::Compound => self.skip_compound_body(),
        }
    }

    fn skip_compound_body(&mut self) -> Result<(), NbtError> {
        loop {
            let at = self.reader.offset();
            let kind_byte = self.reader.read_u8()?;

            if kind_byte == TagKind::End.id() {
                return Ok(());
            }

            let kind = TagKind::from_u8(kind_byte).ok_or(NbtError::InvalidKind {
                kind: kind_byte,
                offset: at,
            })?;
            let name_length = self.reader.read_u16()? as u64;
            self.reader.skip_bytes(name_length)?;
            self.skip_payload(kind)?;
        }
    }

    fn skip_list_elements(&mut self, kind: TagKind, count: u64) -> Result<(), NbtError> {
        for _ in 0..count {
            self.skip_payload(kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, Control, NbtHandler};
    use crate::error::NbtError;
    use crate::tag::TagKind;

    /// Records every event as a line of text.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        /// Event name after which to return the override control, if any.
        trigger: Option<(&'static str, Control)>,
    }

    impl Recorder {
        fn control(&self, event: &str) -> Control {
            match self.trigger {
                Some((on, control)) if on == event => control,
                _ => Control::Continue,
            }
        }
    }

    impl NbtHandler for Recorder {
        fn start(&mut self, root_name: &str) -> Result<Control, NbtError> {
            self.events.push(format!("start {}", root_name));
            Ok(self.control("start"))
        }

        fn end(&mut self) -> Result<(), NbtError> {
            self.events.push("end".to_string());
            Ok(())
        }

        fn byte(&mut self, name: Option<&str>, value: i8) -> Result<Control, NbtError> {
            self.events
                .push(format!("byte {} {}", name.unwrap_or("-"), value));
            Ok(self.control("byte"))
        }

        fn int(&mut self, name: Option<&str>, value: i32) -> Result<Control, NbtError> {
            self.events
                .push(format!("int {} {}", name.unwrap_or("-"), value));
            Ok(self.control("int"))
        }

        fn string(&mut self, name: Option<&str>, value: &str) -> Result<Control, NbtError> {
            self.events
                .push(format!("string {} {}", name.unwrap_or("-"), value));
            Ok(self.control("string"))
        }

        fn start_list(
            &mut self,
            name: Option<&str>,
            element_kind: TagKind,
            length: i32,
        ) -> Result<Control, NbtError> {
            self.events.push(format!(
                "start_list {} {} {}",
                name.unwrap_or("-"),
                element_kind.id(),
                length
            ));
            Ok(self.control("start_list"))
        }

        fn end_list(&mut self) -> Result<Control, NbtError> {
            self.events.push("end_list".to_string());
            Ok(Control::Continue)
        }

        fn start_compound(&mut self, name: Option<&str>) -> Result<Control, NbtError> {
            self.events
                .push(format!("start_compound {}", name.unwrap_or("-")));
            Ok(self.control("start_compound"))
        }

        fn end_compound(&mut self) -> Result<Control, NbtError> {
            self.events.push("end_compound".to_string());
            Ok(Control::Continue)
        }
    }

    #[test]
    fn test_minimal_document() {
        let bytes = b"\x0A\x00\x05hello\x00";

        let mut recorder = Recorder::default();
        parse(&bytes[..], &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            ["start hello", "start_compound -", "end_compound", "end"]
        );
    }

    #[test]
    fn test_nested_events_in_document_order() {
        // root { a: 1b, inner { s: "hi" }, xs: [int 3, int 4] }
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x01\x00\x01a\x01");
        bytes.extend_from_slice(b"\x0A\x00\x05inner");
        bytes.extend_from_slice(b"\x08\x00\x01s\x00\x02hi");
        bytes.push(0x00);
        bytes.extend_from_slice(b"\x09\x00\x02xs\x03\x00\x00\x00\x02");
        bytes.extend_from_slice(&3i32.to_be_bytes());
        bytes.extend_from_slice(&4i32.to_be_bytes());
        bytes.push(0x00);

        let mut recorder = Recorder::default();
        parse(&bytes[..], &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            [
                "start root",
                "start_compound -",
                "byte a 1",
                "start_compound inner",
                "string s hi",
                "end_compound",
                "start_list xs 3 2",
                "int - 3",
                "int - 4",
                "end_list",
                "end_compound",
                "end"
            ]
        );
    }

    #[test]
    fn test_invalid_root() {
        let bytes = b"\x01\x00\x01a\x01";
        let err = parse(&bytes[..], &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, NbtError::InvalidRoot { kind: 1 }));
    }

    #[test]
    fn test_empty_input_is_invalid_root() {
        let err = parse(&b""[..], &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, NbtError::InvalidRoot { .. }));
    }

    #[test]
    fn test_invalid_kind_inside_compound() {
        let bytes = b"\x0A\x00\x01r\x0D\x00\x01x";
        let err = parse(&bytes[..], &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, NbtError::InvalidKind { kind: 0x0D, .. }));
    }

    #[test]
    fn test_truncated_stream() {
        let bytes = b"\x0A\x00\x04root\x03\x00\x01x\x00\x00";
        let err = parse(&bytes[..], &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, NbtError::UnexpectedEnd { .. }));
    }

    #[test]
    fn test_skip_from_value_consumes_rest_of_compound() {
        // root { a: 1b, b: 2b, after: 3b }, skip triggered on first byte.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x01\x00\x01a\x01");
        bytes.extend_from_slice(b"\x01\x00\x01b\x02");
        bytes.extend_from_slice(b"\x01\x00\x05after\x03");
        bytes.push(0x00);

        let mut recorder = Recorder {
            trigger: Some(("byte", Control::Skip)),
            ..Default::default()
        };
        parse(&bytes[..], &mut recorder).unwrap();

        // The later bytes are consumed but never reported; the compound
        // still closes and the document still ends.
        assert_eq!(
            recorder.events,
            [
                "start root",
                "start_compound -",
                "byte a 1",
                "end_compound",
                "end"
            ]
        );
    }

    #[test]
    fn test_skip_on_start_list_consumes_elements() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x09\x00\x02xs\x03\x00\x00\x00\x02");
        bytes.extend_from_slice(&1i32.to_be_bytes());
        bytes.extend_from_slice(&2i32.to_be_bytes());
        bytes.extend_from_slice(b"\x01\x00\x01a\x07");
        bytes.push(0x00);

        let mut recorder = Recorder {
            trigger: Some(("start_list", Control::Skip)),
            ..Default::default()
        };
        parse(&bytes[..], &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            [
                "start root",
                "start_compound -",
                "start_list xs 3 2",
                "end_list",
                "byte a 7",
                "end_compound",
                "end"
            ]
        );
    }

    #[test]
    fn test_abort_unwinds_without_end() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x01\x00\x01a\x01");
        bytes.extend_from_slice(b"\x01\x00\x01b\x02");
        bytes.push(0x00);

        let mut recorder = Recorder {
            trigger: Some(("byte", Control::Abort)),
            ..Default::default()
        };
        parse(&bytes[..], &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            ["start root", "start_compound -", "byte a 1"]
        );
    }

    #[test]
    fn test_list_of_end_is_tolerated_by_pure_streaming() {
        // Element kind END with length 2: nothing to read per element.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x0A\x00\x04root");
        bytes.extend_from_slice(b"\x09\x00\x02xs\x00\x00\x00\x00\x02");
        bytes.push(0x00);

        let mut recorder = Recorder::default();
        parse(&bytes[..], &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            [
                "start root",
                "start_compound -",
                "start_list xs 0 2",
                "end_list",
                "end_compound",
                "end"
            ]
        );
    }
}
