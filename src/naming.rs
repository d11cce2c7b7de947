//! Deterministic output file names for produced artifacts.

/// Name for a looped artifact: `loop_<source name>`.
pub fn loop_name(source_name: &str) -> String {
    format!("loop_{source_name}")
}

/// Name for an extracted artifact: `extracted_<m:ss>_<source name>`.
///
/// The duration is embedded so repeated extractions from the same source do
/// not silently overwrite one another when the regions differ.
pub fn extract_name(source_name: &str, duration_seconds: f64) -> String {
    format!("extracted_{}_{source_name}", format_time(duration_seconds))
}

/// `m:ss` with zero-padded seconds, e.g. `65.0` -> `1:05`.
pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{mins}:{secs:02}")
}
