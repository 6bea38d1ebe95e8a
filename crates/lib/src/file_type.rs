//! File type classification for configuration artifacts.
//!
//! Every artifact carries a [`FileType`]. The object backend persists whatever
//! the caller supplied; the filesystem backend keeps no metadata and instead
//! derives the type from the filename on every read via
//! [`FileType::from_filename`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of artifact file types.
///
/// The discriminants are the codes used on the wire and in the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
#[repr(i64)]
pub enum FileType {
    /// Unclassified content. Only ever supplied by a caller; the classifier
    /// never produces it.
    #[default]
    Unknown = 0,
    Text = 1,
    Csv = 2,
    Json = 3,
    Xml = 4,
    Yaml = 5,
}

impl FileType {
    /// Classify an extension, given without the leading dot.
    ///
    /// Matching is exact. Anything unrecognized, including the empty string,
    /// maps to [`FileType::Text`].
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "txt" => FileType::Text,
            "csv" => FileType::Csv,
            "json" => FileType::Json,
            "xml" => FileType::Xml,
            "yaml" | "yml" => FileType::Yaml,
            _ => FileType::Text,
        }
    }

    /// Classify a filename by its last extension.
    ///
    /// The extension is everything after the last `.` of the final path
    /// component, so `settings.tar.json` and `.yaml` are classified by it,
    /// while `Makefile` and `trailing.` have none and fall back to text.
    pub fn from_filename(filename: &str) -> Self {
        let name = filename
            .rsplit_once('/')
            .map_or(filename, |(_, name)| name);
        name.rsplit_once('.')
            .map_or(FileType::Text, |(_, ext)| Self::from_extension(ext))
    }

    /// Map a stored or wire code back to a type. Unrecognized codes are `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => FileType::Text,
            2 => FileType::Csv,
            3 => FileType::Json,
            4 => FileType::Xml,
            5 => FileType::Yaml,
            _ => FileType::Unknown,
        }
    }

    /// The numeric code of this type.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Lowercase display name.
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Unknown => "unknown",
            FileType::Text => "text",
            FileType::Csv => "csv",
            FileType::Json => "json",
            FileType::Xml => "xml",
            FileType::Yaml => "yaml",
        }
    }
}

impl From<FileType> for i64 {
    fn from(file_type: FileType) -> Self {
        file_type.code()
    }
}

/// A wire code outside the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown file type code {0}, expected 0 to 5")]
pub struct UnknownFileType(pub i64);

/// Strict conversion used when deserializing; unlike [`FileType::from_code`]
/// it rejects codes outside the known set.
impl TryFrom<i64> for FileType {
    type Error = UnknownFileType;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        match FileType::from_code(code) {
            FileType::Unknown if code != 0 => Err(UnknownFileType(code)),
            file_type => Ok(file_type),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
