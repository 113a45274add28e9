//! Result types returned by [`crate::Illustrator::illustrate`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A completed illustration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IllustrationOutput {
    /// Relative URL of the saved PNG, e.g. `/static/output/<hex>.png`.
    pub image_url: String,
    /// Where the PNG was written on disk.
    pub image_path: PathBuf,
    /// The exact prompt sent to the provider.
    pub prompt: String,
    pub stats: IllustrationStats,
}

/// Per-request measurements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IllustrationStats {
    /// Characters of chapter text kept after truncation.
    pub extracted_chars: usize,
    pub prompt_chars: usize,
    /// Provider calls made, including the successful one.
    pub attempts: u32,
    pub extract_ms: u64,
    pub generate_ms: u64,
    pub total_ms: u64,
}
