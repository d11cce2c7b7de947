use crate::error::{AudioloopError, Result};

/// Declared media types accepted without looking at the file name.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/ogg",
    "audio/m4a",
];

/// File extensions accepted when no (or an unrecognized) media type is given.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a"];

/// A loaded audio file: raw encoded bytes plus decode metadata.
///
/// Immutable once constructed; a session replaces it wholesale when a new
/// file is selected. Construction is the input-acceptance gate: anything
/// outside the recognized audio set is rejected here, before a single
/// pipeline step runs.
#[derive(Debug, Clone)]
pub struct AudioSource {
    bytes: Vec<u8>,
    total_duration: f64,
    display_name: String,
}

impl AudioSource {
    pub fn new(
        display_name: impl Into<String>,
        media_type: Option<&str>,
        bytes: Vec<u8>,
        total_duration: f64,
    ) -> Result<Self> {
        let display_name = display_name.into();
        if !is_supported(&display_name, media_type) {
            return Err(AudioloopError::UnsupportedFormat(format!(
                "'{display_name}' is not a recognized audio file (expected mp3, wav, ogg or m4a)"
            )));
        }
        if bytes.is_empty() {
            return Err(AudioloopError::UnsupportedFormat(format!(
                "'{display_name}' is empty"
            )));
        }
        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Err(AudioloopError::UnsupportedFormat(format!(
                "'{display_name}' has no playable duration"
            )));
        }
        Ok(Self {
            bytes,
            total_duration,
            display_name,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Extension used for the engine's working files. FFmpeg infers the
    /// container from it, so it must match the actual encoding; falls back to
    /// mp3 when the display name carries no recognized extension.
    pub fn extension(&self) -> &str {
        extension_of(&self.display_name).unwrap_or("mp3")
    }

    /// MIME type reported on artifacts produced from this source.
    pub fn mime_type(&self) -> &'static str {
        match self.extension() {
            "wav" => "audio/wav",
            "ogg" => "audio/ogg",
            "m4a" => "audio/m4a",
            _ => "audio/mpeg",
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0 / 1024.0
    }
}

/// Input acceptance check: either the declared media type is in the
/// recognized audio set, or the file name ends in a recognized extension.
pub fn is_supported(display_name: &str, media_type: Option<&str>) -> bool {
    if let Some(mime) = media_type {
        if SUPPORTED_MIME_TYPES.contains(&mime.to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    extension_of(display_name).is_some()
}

fn extension_of(display_name: &str) -> Option<&'static str> {
    let (_, ext) = display_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS
        .iter()
        .find(|candidate| **candidate == ext)
        .copied()
}
