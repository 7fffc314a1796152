//! I/O utilities for delimited-file reading, decoding, and delimiter handling.
//!
//! All source file access in csv-seeder flows through this module:
//!
//! - **Reader construction**: `open_csv_reader` and `open_csv_reader_from_path`
//!   build headerless, flexible readers so the header is handled like any other
//!   record and ragged rows survive.
//! - **Decoding**: fields arrive as bytes and become UTF-8 text here, either
//!   strictly with a fallback encoding or lossily, depending on [`EncodingPolicy`].
//! - **BOM handling**: a leading UTF-8 byte-order mark is removed from the first
//!   field of the first record only.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::error::{SeedError, SeedResult};

pub const DEFAULT_DELIMITER: u8 = b';';
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// How source bytes become UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingPolicy {
    /// Valid UTF-8 is kept; anything else is transcoded from `fallback`.
    ForceUtf8 { fallback: &'static Encoding },
    /// Bytes are read as UTF-8 and invalid sequences are replaced.
    AsIs,
}

impl Default for EncodingPolicy {
    fn default() -> Self {
        EncodingPolicy::ForceUtf8 {
            fallback: WINDOWS_1252,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> SeedResult<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| SeedError::config(format!("Unknown encoding '{value}'"))),
        None => Ok(WINDOWS_1252),
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> SeedResult<csv::Reader<Box<dyn Read>>> {
    let file = File::open(path).map_err(|source| SeedError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn Read> = Box::new(BufReader::new(file));
    Ok(open_csv_reader(reader, delimiter))
}

pub fn decode_field(bytes: &[u8], policy: EncodingPolicy) -> String {
    match policy {
        EncodingPolicy::ForceUtf8 { fallback } => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                let (text, _, _) = fallback.decode(bytes);
                text.into_owned()
            }
        },
        EncodingPolicy::AsIs => {
            let (text, _) = UTF_8.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

pub fn strip_utf8_bom(field: &[u8]) -> &[u8] {
    field.strip_prefix(UTF8_BOM).unwrap_or(field)
}

/// Derives the destination table name from a source path: the file name without
/// its final extension.
pub fn table_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
        .filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn decode_field_transcodes_latin1_when_forced() {
        let policy = EncodingPolicy::default();
        assert_eq!(decode_field(b"caf\xE9", policy), "café");
        assert_eq!(decode_field("café".as_bytes(), policy), "café");
    }

    #[test]
    fn decode_field_replaces_invalid_bytes_when_left_as_is() {
        assert_eq!(decode_field(b"caf\xE9", EncodingPolicy::AsIs), "caf\u{FFFD}");
    }

    #[test]
    fn strip_utf8_bom_only_removes_leading_mark() {
        assert_eq!(strip_utf8_bom(b"\xEF\xBB\xBFid"), b"id");
        assert_eq!(strip_utf8_bom(b"id"), b"id");
    }

    #[test]
    fn table_name_uses_file_stem() {
        assert_eq!(
            table_name_from_path(&PathBuf::from("database/seeds/users.csv")).as_deref(),
            Some("users")
        );
        assert_eq!(
            table_name_from_path(&PathBuf::from("archive.tar.csv")).as_deref(),
            Some("archive.tar")
        );
    }

    #[test]
    fn resolve_encoding_rejects_unknown_labels() {
        assert!(resolve_encoding(Some("latin1")).is_ok());
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
