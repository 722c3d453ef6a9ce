//! Analysis handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    Json,
};
use tracing::debug;

use pulse_core::{ActivityRecord, AnalysisResult, Error, ScoreResult};

use crate::{AppError, AppState, CACHE_HEADER, INSIGHT_SOURCE_HEADER};

/// Unwrap a JSON body, reporting shape errors as JSON error responses
///
/// Malformed JSON is a 400; well-formed JSON of the wrong shape (missing or
/// unknown fields, wrong types) is a 422.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Rejected request body");
            Err(AppError::new(rejection.status(), &rejection.body_text()))
        }
    }
}

/// Map validation failures to 400 and anything else to 500
fn validation_error(err: Error) -> AppError {
    match err {
        Error::InvalidData(msg) => AppError::bad_request(&msg),
        other => AppError::from(other),
    }
}

/// POST /api/v1/analyze - Score a day and attach an insight
///
/// Sets `x-cache: HIT|MISS` and `x-insight-source`. Generator and cache
/// outages degrade the insight; they never fail the request.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ActivityRecord>, JsonRejection>,
) -> Result<(HeaderMap, Json<AnalysisResult>), AppError> {
    let record = json_body(payload)?;

    let analysis = state
        .analyzer
        .analyze(&record)
        .await
        .map_err(validation_error)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(CACHE_HEADER),
        HeaderValue::from_static(if analysis.cache_hit() { "HIT" } else { "MISS" }),
    );
    headers.insert(
        HeaderName::from_static(INSIGHT_SOURCE_HEADER),
        HeaderValue::from_static(analysis.source.as_str()),
    );

    Ok((headers, Json(analysis.result)))
}

/// POST /api/v1/score - Score a day without generating an insight
pub async fn score(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ActivityRecord>, JsonRejection>,
) -> Result<Json<ScoreResult>, AppError> {
    let record = json_body(payload)?;
    let result = state.analyzer.score(&record).map_err(validation_error)?;
    Ok(Json(result))
}
