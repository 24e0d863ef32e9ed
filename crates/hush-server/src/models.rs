//! API request and response models.

use hush_core::{ClassifierStatus, FilterResult};
use serde::{Deserialize, Serialize};

/// Request body for the filter and highlight endpoints.
#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    /// The text to filter.
    pub text: String,
}

/// Response body for POST /api/filter/enhanced.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedFilterResponse {
    #[serde(flatten)]
    pub result: FilterResult,
    /// Classifier availability after the call.
    pub classifier_status: Option<ClassifierStatus>,
    /// True if the classifier missed its deadline and the result is
    /// dictionary-only.
    pub timed_out: bool,
}

/// Response body for GET /api/status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Crate version.
    pub version: String,
    /// Number of lexicon entries.
    pub lexicon_size: usize,
    /// Mask character in use.
    pub mask_char: char,
    /// Classifier availability, absent if enhanced filtering is off.
    pub classifier_status: Option<ClassifierStatus>,
    /// Classifier threshold, absent if enhanced filtering is off.
    pub threshold: Option<f32>,
    /// Longest accepted text, in characters.
    pub max_text_len: usize,
}
