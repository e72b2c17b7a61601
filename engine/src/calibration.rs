//! Camera weight estimation and its linear calibration.
//!
//! A weighing station turns a bounding box into a raw weight estimate, then
//! corrects it with a calibration model `actual ≈ a * estimated + b` fitted by
//! ordinary least squares over scale-confirmed samples.

use serde::{Deserialize, Serialize};

/// Spread of the estimates (standard deviation over root mean square) below
/// which the slope is treated as undefined.
pub const DEGENERATE_EPSILON: f64 = 1e-9;

/// Coefficients of the bounding-box area model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BboxCoefficients {
    pub a: f64,
    pub b: f64,
}

/// Raw weight estimate from a bounding box: `a * (width * height) + b`.
pub fn estimate_weight_from_bbox(width: f64, height: f64, coefficients: BboxCoefficients) -> f64 {
    coefficients.a * (width * height) + coefficients.b
}

/// One paired observation of estimated and scale weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub estimated: f64,
    pub actual: f64,
}

impl CalibrationSample {
    pub fn new(estimated: f64, actual: f64) -> Self {
        Self { estimated, actual }
    }
}

/// Fitted linear correction `actual ≈ a * estimated + b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    /// Slope
    pub a: f64,
    /// Intercept
    pub b: f64,
    /// In-sample root-mean-square residual
    pub rmse: f64,
}

impl CalibrationModel {
    /// The do-nothing model.
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            rmse: 0.0,
        }
    }

    /// Apply the correction to a raw estimate.
    pub fn predict(&self, estimated: f64) -> f64 {
        self.a * estimated + self.b
    }

    /// Whether every coefficient is a finite number.
    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.rmse.is_finite()
    }

    /// Root-mean-square residual of this model over `samples`.
    pub fn rmse_over(&self, samples: &[CalibrationSample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_squared: f64 = samples
            .iter()
            .map(|s| (self.predict(s.estimated) - s.actual).powi(2))
            .sum();
        (sum_squared / samples.len() as f64).sqrt()
    }
}

impl Default for CalibrationModel {
    fn default() -> Self {
        Self::identity()
    }
}

/// Fit a calibration model by closed-form least squares.
///
/// Fewer than two samples return the identity model with zero error. When all
/// estimates are (nearly) equal the slope is undefined; the identity model is
/// returned with its error over the samples instead of non-finite values.
pub fn calculate_calibration(samples: &[CalibrationSample]) -> CalibrationModel {
    if samples.len() < 2 {
        return CalibrationModel::identity();
    }

    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|s| s.estimated).sum::<f64>() / n;
    let mean_y = samples.iter().map(|s| s.actual).sum::<f64>() / n;

    // Centred sums; the raw `n·Σx² − (Σx)²` form cancels badly when the
    // estimates are all equal but not exactly representable.
    let (mut sxx, mut sxy, mut sum_x2) = (0.0, 0.0, 0.0);
    for s in samples {
        let dx = s.estimated - mean_x;
        sxx += dx * dx;
        sxy += dx * (s.actual - mean_y);
        sum_x2 += s.estimated * s.estimated;
    }

    let degenerate = sxx <= DEGENERATE_EPSILON * DEGENERATE_EPSILON * sum_x2;
    if !sxx.is_finite() || !sxy.is_finite() || degenerate {
        let identity = CalibrationModel::identity();
        return CalibrationModel {
            rmse: identity.rmse_over(samples),
            ..identity
        };
    }

    let a = sxy / sxx;
    let b = mean_y - a * mean_x;

    let mut model = CalibrationModel { a, b, rmse: 0.0 };
    model.rmse = model.rmse_over(samples);
    model
}
