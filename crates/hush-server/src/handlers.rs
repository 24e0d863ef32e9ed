//! API route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::{debug, warn};

use hush_core::{FilterResult, HighlightResult};

use crate::error::{ApiError, Result};
use crate::models::{EnhancedFilterResponse, FilterRequest, StatusResponse};
use crate::state::AppState;

fn check_len(state: &AppState, text: &str) -> Result<()> {
    let len = text.chars().count();
    if len > state.max_text_len {
        return Err(ApiError::PayloadTooLarge {
            len,
            limit: state.max_text_len,
        });
    }
    Ok(())
}

/// POST /api/filter - Dictionary-only filtering.
pub async fn filter_text(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FilterRequest>, JsonRejection>,
) -> Result<Json<FilterResult>> {
    let Json(req) = payload?;
    check_len(&state, &req.text)?;
    debug!(text_len = req.text.len(), "Filtering text");

    Ok(Json(state.engine.filter(&req.text)))
}

/// POST /api/filter/enhanced - Dictionary plus classifier filtering.
pub async fn enhanced_filter_text(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FilterRequest>, JsonRejection>,
) -> Result<Json<EnhancedFilterResponse>> {
    let Json(req) = payload?;
    check_len(&state, &req.text)?;
    debug!(text_len = req.text.len(), "Enhanced filtering text");

    let engine = &state.engine;
    let (result, timed_out) = match state.classifier_timeout {
        Some(deadline) => {
            match tokio::time::timeout(deadline, engine.enhanced_filter(&req.text)).await {
                Ok(result) => (result, false),
                Err(_) => {
                    warn!(
                        timeout_ms = deadline.as_millis() as u64,
                        "Classifier timed out, returning dictionary result"
                    );
                    (engine.filter(&req.text), true)
                }
            }
        }
        None => (engine.enhanced_filter(&req.text).await, false),
    };

    Ok(Json(EnhancedFilterResponse {
        result,
        classifier_status: engine.classifier_status(),
        timed_out,
    }))
}

/// POST /api/highlight - Report lexicon occurrences without masking.
pub async fn highlight_text(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FilterRequest>, JsonRejection>,
) -> Result<Json<HighlightResult>> {
    let Json(req) = payload?;
    check_len(&state, &req.text)?;

    Ok(Json(state.engine.highlight(&req.text)))
}

/// GET /api/status - Lexicon and classifier status.
pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    let engine = &state.engine;
    let matcher = engine.matcher();

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        lexicon_size: matcher.lexicon().len(),
        mask_char: matcher.mask_char(),
        classifier_status: engine.classifier_status(),
        threshold: engine.classifier().map(|c| c.threshold()),
        max_text_len: state.max_text_len,
    }))
}
