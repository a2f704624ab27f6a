//! File Attachments and Accepted-Type Matching
//!
//! A plugin that handles files declares a list of accepted types. Each entry is
//! either a dot-prefixed extension (`.wav`) compared against the filename, or a
//! media type (`audio/wav`) compared against the attachment's declared type.
//! Both comparisons are case-insensitive and either one is enough.
//!
//! An empty accepted list rejects every file.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Audio
pub const MIME_WAV: &str = "audio/wav";
pub const MIME_MP3: &str = "audio/mpeg";
pub const MIME_AIFF: &str = "audio/aiff";
pub const MIME_FLAC: &str = "audio/flac";
pub const MIME_OGG: &str = "audio/ogg";
pub const MIME_MIDI: &str = "audio/midi";
// Archives and documents
pub const MIME_ZIP: &str = "application/zip";
pub const MIME_PDF: &str = "application/pdf";

pub const EXT_WAV: &str = ".wav";
pub const EXT_MP3: &str = ".mp3";
pub const EXT_AIFF: &str = ".aiff";
pub const EXT_AIF: &str = ".aif";
pub const EXT_FLAC: &str = ".flac";
pub const EXT_OGG: &str = ".ogg";
pub const EXT_MID: &str = ".mid";
pub const EXT_MIDI: &str = ".midi";
pub const EXT_ZIP: &str = ".zip";
pub const EXT_PDF: &str = ".pdf";

/// A file passed alongside a call
///
/// On the wire `content` travels as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    /// Original filename, e.g. `drums.wav`
    pub name: String,

    /// Declared media type, e.g. `audio/wav`
    #[serde(rename = "type", default)]
    pub media_type: String,

    pub size: u64,

    #[serde(with = "content_base64")]
    pub content: Vec<u8>,
}

impl FileAttachment {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: content.len() as u64,
            content,
        }
    }

    /// Lowercased extension including the leading dot, if the name has one
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

fn extension_of(filename: &str) -> Option<String> {
    filename.rfind('.').map(|idx| filename[idx..].to_lowercase())
}

/// Media type for a known extension, `application/octet-stream` otherwise
pub fn media_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some(EXT_WAV) => MIME_WAV,
        Some(EXT_MP3) => MIME_MP3,
        Some(EXT_AIFF) | Some(EXT_AIF) => MIME_AIFF,
        Some(EXT_FLAC) => MIME_FLAC,
        Some(EXT_OGG) => MIME_OGG,
        Some(EXT_MID) | Some(EXT_MIDI) => MIME_MIDI,
        Some(EXT_ZIP) => MIME_ZIP,
        Some(EXT_PDF) => MIME_PDF,
        _ => "application/octet-stream",
    }
}

/// Does a file match any of the accepted types?
///
/// Example:
///     assert!(is_file_type_accepted(&[".wav"], "Kick.WAV", ""));
///     assert!(is_file_type_accepted(&["audio/wav"], "noext", "AUDIO/WAV"));
///     assert!(!is_file_type_accepted(&[], "kick.wav", "audio/wav"));
pub fn is_file_type_accepted<S: AsRef<str>>(accepted: &[S], filename: &str, media_type: &str) -> bool {
    if accepted.is_empty() {
        return false;
    }

    let ext = extension_of(filename);
    let media_type = media_type.to_lowercase();

    accepted.iter().any(|entry| {
        let entry = entry.as_ref().to_lowercase();
        if entry.starts_with('.') {
            ext.as_deref() == Some(entry.as_str())
        } else {
            media_type == entry
        }
    })
}

/// Keep only the attachments that match the accepted types
pub fn filter_files_by_accepted_types<S: AsRef<str>>(
    files: &[FileAttachment],
    accepted: &[S],
) -> Vec<FileAttachment> {
    if accepted.is_empty() {
        return Vec::new();
    }
    files
        .iter()
        .filter(|f| is_file_type_accepted(accepted, &f.name, &f.media_type))
        .cloned()
        .collect()
}

mod content_base64 {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
