//! Vision endpoint routes.

use axum::{routing::post, Json, Router};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::handlers::{
    handle_calibration, handle_pen_count, handle_weight, CalibrationRequest, CalibrationResponse,
    PenCountRequest, PenCountResponse, WeightRequest, WeightResponse,
};
use crate::AppState;

/// Create vision routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vision/pen-count", post(pen_count_handler))
        .route("/vision/calibration", post(calibration_handler))
        .route("/vision/weight", post(weight_handler))
}

/// POST /vision/pen-count - Aggregate camera counts for one pen.
async fn pen_count_handler(
    _auth: AuthUser,
    Json(request): Json<PenCountRequest>,
) -> AppResult<Json<PenCountResponse>> {
    Ok(Json(handle_pen_count(request)?))
}

/// POST /vision/calibration - Fit a weight calibration model.
async fn calibration_handler(
    _auth: AuthUser,
    Json(request): Json<CalibrationRequest>,
) -> AppResult<Json<CalibrationResponse>> {
    Ok(Json(handle_calibration(request)?))
}

/// POST /vision/weight - Estimate weight from a bounding box.
async fn weight_handler(
    _auth: AuthUser,
    Json(request): Json<WeightRequest>,
) -> AppResult<Json<WeightResponse>> {
    Ok(Json(handle_weight(request)?))
}
