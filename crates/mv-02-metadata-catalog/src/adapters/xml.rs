//! # XML Document Codec
//!
//! On-disk form of one logical file.
//!
//! ```text
//! <XFile name="report1.bin" version="3" ts="1700000000000">
//!   <XBlock id="b1" length="4096" parent="report1.bin" version="1"/>
//!   <XBlock id="b2" length="512" parent="report1.bin" version="0" rows="40" min="a" max="k" dict="2">
//!     <XDict value="a"/>
//!     <XDict value="k"/>
//!   </XBlock>
//! </XFile>
//! ```
//!
//! `rows`, `min`, `max`, `dict` and `<XDict>` children are optional. `dict`
//! holds the dictionary size and is what distinguishes an empty dictionary
//! from none. A block without `parent` takes the file's name; a block without
//! `version` is version 0.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use shared_types::{BlockRecord, BlockStats, CodecError, ValueRange};
use std::collections::HashMap;
use std::io::Cursor;
use std::str::FromStr;

use crate::domain::document::{BlockDocument, FileDocument};

const FILE_TAG: &[u8] = b"XFile";
const BLOCK_TAG: &[u8] = b"XBlock";
const DICT_TAG: &[u8] = b"XDict";

fn xml_err(err: impl std::fmt::Display) -> CodecError {
    CodecError::Xml(err.to_string())
}

// =============================================================================
// ENCODING
// =============================================================================

/// Render a document as indented XML.
pub fn encode(doc: &FileDocument) -> Result<String, CodecError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let version = doc.version.to_string();
    let ts = doc.last_modified.to_string();
    let file = BytesStart::new("XFile").with_attributes([
        ("name", doc.name.as_str()),
        ("version", version.as_str()),
        ("ts", ts.as_str()),
    ]);
    writer.write_event(Event::Start(file)).map_err(xml_err)?;

    for block in &doc.blocks {
        write_block(&mut writer, block)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("XFile")))
        .map_err(xml_err)?;
    String::from_utf8(writer.into_inner().into_inner()).map_err(|_| CodecError::InvalidUtf8)
}

fn write_block(writer: &mut Writer<Cursor<Vec<u8>>>, block: &BlockDocument) -> Result<(), CodecError> {
    let record = &block.record;
    let stats = &block.stats;
    let length = record.logical_length().to_string();
    let version = record.version().to_string();
    let rows = stats.rows.to_string();
    let dict_len = stats.dictionary.as_ref().map(|d| d.len().to_string());

    let mut element = BytesStart::new("XBlock").with_attributes([
        ("id", record.block_id().as_str()),
        ("length", length.as_str()),
        ("parent", record.parent_file_name()),
        ("version", version.as_str()),
    ]);
    if stats.rows > 0 {
        element.push_attribute(("rows", rows.as_str()));
    }
    if let Some(range) = &stats.range {
        element.push_attribute(("min", range.min.as_str()));
        element.push_attribute(("max", range.max.as_str()));
    }
    if let Some(len) = &dict_len {
        element.push_attribute(("dict", len.as_str()));
    }

    match &stats.dictionary {
        None => writer.write_event(Event::Empty(element)).map_err(xml_err),
        Some(values) => {
            writer.write_event(Event::Start(element)).map_err(xml_err)?;
            for value in values {
                let entry = BytesStart::new("XDict").with_attributes([("value", value.as_str())]);
                writer.write_event(Event::Empty(entry)).map_err(xml_err)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("XBlock")))
                .map_err(xml_err)
        }
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Parse a document produced by `encode` (or an older writer that omits the
/// optional attributes).
pub fn decode(xml: &str) -> Result<FileDocument, CodecError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut file: Option<FileDocument> = None;
    let mut open_block: Option<BlockDocument> = None;
    let mut blocks = Vec::new();

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => match e.name().as_ref() {
                FILE_TAG => file = Some(parse_file(&e)?),
                BLOCK_TAG => open_block = Some(parse_block(&e, file.as_ref())?),
                DICT_TAG => push_dict_value(&e, open_block.as_mut())?,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                FILE_TAG => file = Some(parse_file(&e)?),
                BLOCK_TAG => blocks.push(parse_block(&e, file.as_ref())?),
                DICT_TAG => push_dict_value(&e, open_block.as_mut())?,
                _ => {}
            },
            Event::End(e) => {
                if e.name().as_ref() == BLOCK_TAG {
                    if let Some(block) = open_block.take() {
                        blocks.push(block);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut file = file.ok_or_else(|| CodecError::Xml("missing <XFile> element".into()))?;
    file.blocks = blocks;
    Ok(file)
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>, CodecError> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|_| CodecError::InvalidUtf8)?;
        let value = attr.unescape_value().map_err(xml_err)?;
        map.insert(key.to_string(), value.into_owned());
    }
    Ok(map)
}

fn required<'a>(attrs: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, CodecError> {
    attrs
        .get(key)
        .map(String::as_str)
        .ok_or(CodecError::MissingAttribute(key))
}

fn number<T: FromStr>(attrs: &HashMap<String, String>, key: &'static str) -> Result<Option<T>, CodecError> {
    match attrs.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CodecError::InvalidNumber {
                attribute: key,
                value: raw.clone(),
            }),
    }
}

fn parse_file(e: &BytesStart<'_>) -> Result<FileDocument, CodecError> {
    let attrs = attributes(e)?;
    Ok(FileDocument {
        name: required(&attrs, "name")?.to_string(),
        version: number(&attrs, "version")?.unwrap_or(0),
        last_modified: number(&attrs, "ts")?.unwrap_or(0),
        blocks: Vec::new(),
    })
}

fn parse_block(e: &BytesStart<'_>, file: Option<&FileDocument>) -> Result<BlockDocument, CodecError> {
    let attrs = attributes(e)?;
    let id = required(&attrs, "id")?;
    let length: i64 = number(&attrs, "length")?.ok_or(CodecError::MissingAttribute("length"))?;
    let parent = match attrs.get("parent") {
        Some(parent) => parent.clone(),
        None => file.map(|f| f.name.clone()).unwrap_or_default(),
    };
    let version = number(&attrs, "version")?.unwrap_or(0);

    let range = match (attrs.get("min"), attrs.get("max")) {
        (Some(min), Some(max)) => Some(ValueRange::new(min.as_str(), max.as_str())),
        _ => None,
    };

    Ok(BlockDocument {
        record: BlockRecord::new(parent, id, length).with_version(version),
        stats: BlockStats {
            rows: number(&attrs, "rows")?.unwrap_or(0),
            dictionary: attrs.contains_key("dict").then(Vec::new),
            range,
        },
    })
}

fn push_dict_value(e: &BytesStart<'_>, block: Option<&mut BlockDocument>) -> Result<(), CodecError> {
    let Some(block) = block else {
        return Err(CodecError::Xml("<XDict> outside <XBlock>".into()));
    };
    let attrs = attributes(e)?;
    let value = required(&attrs, "value")?.to_string();
    block
        .stats
        .dictionary
        .get_or_insert_with(Vec::new)
        .push(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileDocument {
        FileDocument {
            name: "sales & returns <2024>.bin".to_string(),
            version: 3,
            last_modified: 1_700_000_000_000,
            blocks: vec![
                BlockDocument {
                    record: BlockRecord::new("sales & returns <2024>.bin", "b1", 4096).with_version(1),
                    stats: BlockStats::default(),
                },
                BlockDocument {
                    record: BlockRecord::new("sales & returns <2024>.bin", "b2", 512),
                    stats: BlockStats {
                        rows: 40,
                        dictionary: Some(vec!["a\"q".to_string(), "k".to_string()]),
                        range: Some(ValueRange::new("a", "k")),
                    },
                },
            ],
        }
    }

    fn fields(doc: &FileDocument) -> Vec<(String, String, i64, u64, BlockStats)> {
        doc.blocks
            .iter()
            .map(|b| {
                (
                    b.record.parent_file_name().to_string(),
                    b.record.block_id().to_string(),
                    b.record.logical_length(),
                    b.record.version(),
                    b.stats.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_document_survives_encoding() {
        let doc = sample();
        let xml = encode(&doc).unwrap();
        assert!(xml.contains("<XFile"));
        assert!(xml.contains("<XBlock"));

        let decoded = decode(&xml).unwrap();
        assert_eq!(decoded.name, doc.name);
        assert_eq!(decoded.version, 3);
        assert_eq!(decoded.last_modified, doc.last_modified);
        assert_eq!(fields(&decoded), fields(&doc));
    }

    #[test]
    fn test_empty_dictionary_is_kept() {
        let mut doc = sample();
        doc.blocks[0].stats.dictionary = Some(Vec::new());

        let decoded = decode(&encode(&doc).unwrap()).unwrap();
        assert_eq!(decoded.blocks[0].stats.dictionary, Some(Vec::new()));
        assert_eq!(decoded.blocks[1].stats.dictionary, doc.blocks[1].stats.dictionary);
    }

    #[test]
    fn test_minimal_legacy_document() {
        let xml = r#"<XFile name="old.bin" version="2" ts="5">
            <XBlock id="x1" length="10"/>
        </XFile>"#;
        let doc = decode(xml).unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].record.parent_file_name(), "old.bin");
        assert_eq!(doc.blocks[0].record.version(), 0);
        assert_eq!(doc.blocks[0].stats, BlockStats::default());
    }

    #[test]
    fn test_missing_block_id_is_rejected() {
        let xml = r#"<XFile name="f" version="1" ts="0"><XBlock length="1"/></XFile>"#;
        assert_eq!(decode(xml).unwrap_err(), CodecError::MissingAttribute("id"));
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let xml = r#"<XFile name="f" version="one" ts="0"/>"#;
        assert!(matches!(
            decode(xml),
            Err(CodecError::InvalidNumber { attribute: "version", .. })
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode("not xml at all").is_err());
        assert!(decode("<XFile name=\"f\"><XBlock id=\"a\" length=\"1\"></XFile>").is_err());
    }
}
