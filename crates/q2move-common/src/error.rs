// error.rs — fatal map load errors

use thiserror::Error;

/// Why a map could not be loaded. A load either succeeds completely or
/// returns one of these; no partial geometry is ever exposed.
#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("map {0} not found")]
    NotFound(String),

    #[error("file is {len} bytes, too short for a BSP header")]
    TruncatedHeader { len: usize },

    #[error("invalid map file format (ident {0:#010x})")]
    BadMagic(u32),

    #[error("unsupported BSP file version {0}")]
    BadVersion(u32),

    #[error("incorrect lump size ({lump}): offset {offset} + length {length} exceeds file size {size}")]
    LumpOutOfBounds {
        lump: &'static str,
        offset: u32,
        length: u32,
        size: usize,
    },

    #[error("funny lump size ({lump}): {length} is not a multiple of {stride}")]
    FunnyLumpSize {
        lump: &'static str,
        length: u32,
        stride: usize,
    },

    #[error("bad {field} in {lump} record {index}: {value} (limit {limit})")]
    BadIndex {
        lump: &'static str,
        index: usize,
        field: &'static str,
        value: i64,
        limit: usize,
    },

    #[error("bad edge count for face {index}: {count}")]
    BadEdgeCount { index: usize, count: u16 },

    #[error("map has no models")]
    NoModels,

    #[error("BSP tree loops back to node {node}")]
    CyclicTree { node: usize },

    #[error("entity text: {0}")]
    Entities(#[from] EntityParseError),
}

/// Malformed entity text. Any of these rejects the whole entity list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityParseError {
    #[error("expected '{{' on line {line}, found {found:?}")]
    ExpectedOpenBrace { line: usize, found: String },

    #[error("unexpected end of text in entity starting on line {line}")]
    UnexpectedEof { line: usize },

    #[error("unterminated quoted string on line {line}")]
    UnterminatedQuote { line: usize },

    #[error("key {key:?} on line {line} has no value")]
    MissingValue { key: String, line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failed_check() {
        let e = MapLoadError::BadIndex {
            lump: "faces",
            index: 7,
            field: "texinfo",
            value: 12,
            limit: 4,
        };
        assert_eq!(e.to_string(), "bad texinfo in faces record 7: 12 (limit 4)");

        let e = MapLoadError::BadMagic(0x12345678);
        assert_eq!(e.to_string(), "invalid map file format (ident 0x12345678)");
    }

    #[test]
    fn test_entity_error_converts() {
        let e: MapLoadError = EntityParseError::UnterminatedQuote { line: 3 }.into();
        assert!(matches!(e, MapLoadError::Entities(EntityParseError::UnterminatedQuote { line: 3 })));
        assert_eq!(e.to_string(), "entity text: unterminated quoted string on line 3");
    }
}
