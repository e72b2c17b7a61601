//! Vision handlers - pen counts, calibration and weight estimates.

use fazenda_engine::{
    calculate_calibration, estimate_weight_from_bbox, kg_to_arrobas, smooth_count, summarize_pen,
    weighted_count, AggregationRule, BboxCoefficients, CalibrationModel, CalibrationSample,
    CameraCountSample, CameraId, Error as EngineError, PenCountSummary, DEFAULT_CARCASS_YIELD,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Default trailing window for count smoothing.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Request body for a pen count.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenCountRequest {
    /// Concurrent readings, one per camera
    pub samples: Vec<CameraCountSample>,
    #[serde(default)]
    pub rule: AggregationRule,
    /// Camera whose reading wins under the `principal` rule
    #[serde(default)]
    pub primary_camera: Option<CameraId>,
    /// Earlier aggregated counts for this pen, oldest first
    #[serde(default)]
    pub history: Vec<u32>,
    /// Smoothing window over `history` plus the new count
    #[serde(default)]
    pub window: Option<usize>,
}

/// Response for a pen count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenCountResponse {
    #[serde(flatten)]
    pub summary: PenCountSummary,
    /// Detector-confidence weighted mean of the readings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_count: Option<f64>,
    /// Moving average including this count, when history was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothed_count: Option<u32>,
}

/// Aggregate one pen's camera readings.
pub fn handle_pen_count(request: PenCountRequest) -> AppResult<PenCountResponse> {
    if let Some(sample) = request
        .samples
        .iter()
        .find(|s| s.confidence.is_some_and(|c| !(0.0..=1.0).contains(&c)))
    {
        return Err(AppError::BadRequest(format!(
            "confidence of camera {} must be between 0 and 1",
            sample.camera_id
        )));
    }

    let summary = summarize_pen(&request.samples, request.rule, request.primary_camera);

    let smoothed_count = if request.history.is_empty() {
        None
    } else {
        let mut series = request.history;
        series.push(summary.count);
        Some(smooth_count(
            &series,
            request.window.unwrap_or(DEFAULT_SMOOTHING_WINDOW),
        ))
    };

    Ok(PenCountResponse {
        weighted_count: weighted_count(&request.samples),
        smoothed_count,
        summary,
    })
}

/// Request body for fitting a calibration.
#[derive(Debug, Deserialize)]
pub struct CalibrationRequest {
    pub samples: Vec<CalibrationSample>,
}

/// Fitted calibration model.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationResponse {
    #[serde(flatten)]
    pub model: CalibrationModel,
    /// Number of samples the model was fitted on
    pub sample_count: usize,
}

/// Fit `actual ≈ a * estimated + b` over the supplied samples.
pub fn handle_calibration(request: CalibrationRequest) -> AppResult<CalibrationResponse> {
    let model = calculate_calibration(&request.samples);
    if !model.is_finite() {
        return Err(AppError::BadRequest(
            "calibration samples produce a non-finite model".to_string(),
        ));
    }

    tracing::debug!(
        a = model.a,
        b = model.b,
        rmse = model.rmse,
        samples = request.samples.len(),
        "Calibration fitted"
    );

    Ok(CalibrationResponse {
        model,
        sample_count: request.samples.len(),
    })
}

/// Request body for a weight estimate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRequest {
    /// Bounding box width in pixels
    pub width: f64,
    /// Bounding box height in pixels
    pub height: f64,
    pub coefficients: BboxCoefficients,
    /// Correction applied to the raw estimate
    #[serde(default)]
    pub calibration: Option<CalibrationModel>,
    #[serde(default)]
    pub carcass_yield: Option<f64>,
}

/// Weight estimate for one animal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightResponse {
    /// Raw estimate from the bounding box
    pub estimated_kg: f64,
    /// Estimate after calibration, when a model was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibrated_kg: Option<f64>,
    /// Carcass arrobas of the best available estimate
    pub arrobas: f64,
}

/// Estimate live weight from a bounding box.
pub fn handle_weight(request: WeightRequest) -> AppResult<WeightResponse> {
    if request.width < 0.0 || request.height < 0.0 {
        return Err(EngineError::InvalidInput {
            field: "bbox",
            reason: "width and height must be non-negative".into(),
        }
        .into());
    }

    let carcass_yield = request.carcass_yield.unwrap_or(DEFAULT_CARCASS_YIELD);
    if !(0.0..=1.0).contains(&carcass_yield) {
        return Err(EngineError::InvalidInput {
            field: "carcassYield",
            reason: "must be between 0 and 1".into(),
        }
        .into());
    }

    let estimated_kg = estimate_weight_from_bbox(request.width, request.height, request.coefficients);

    let calibrated_kg = match request.calibration {
        Some(model) if model.is_finite() => Some(model.predict(estimated_kg)),
        Some(_) => {
            return Err(AppError::BadRequest(
                "calibration model is not finite".to_string(),
            ))
        }
        None => None,
    };

    Ok(WeightResponse {
        estimated_kg,
        calibrated_kg,
        arrobas: kg_to_arrobas(calibrated_kg.unwrap_or(estimated_kg), carcass_yield),
    })
}
