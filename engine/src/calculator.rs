//! Livestock calculator formulas used by the herd valuation screens.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};

/// Kilograms of carcass in one arroba.
pub const ARROBA_KG: f64 = 15.0;

/// Kilograms of live weight conventionally counted as one arroba.
pub const LIVE_WEIGHT_ARROBA_KG: f64 = 30.0;

/// Typical carcass yield of finished cattle.
pub const DEFAULT_CARCASS_YIELD: f64 = 0.52;

/// Carcass arrobas for a live weight: `(kg * carcass_yield) / 15`.
pub fn kg_to_arrobas(kg: f64, carcass_yield: f64) -> f64 {
    (kg * carcass_yield) / ARROBA_KG
}

/// [`kg_to_arrobas`] with the default 52% carcass yield.
pub fn kg_to_arrobas_default(kg: f64) -> f64 {
    kg_to_arrobas(kg, DEFAULT_CARCASS_YIELD)
}

/// Live-weight arrobas (`kg / 30`).
pub fn live_weight_arrobas(kg: f64) -> f64 {
    kg / LIVE_WEIGHT_ARROBA_KG
}

/// Value of an animal priced per carcass arroba.
pub fn carcass_value(kg: f64, price_per_arroba: f64, carcass_yield: f64) -> f64 {
    kg_to_arrobas(kg, carcass_yield) * price_per_arroba
}

/// Average daily gain (GMD) in kg/day. Negative when the animal lost weight.
pub fn average_daily_gain(initial_kg: f64, final_kg: f64, days: u32) -> Result<f64> {
    if days == 0 {
        return Err(Error::InvalidInput {
            field: "days",
            reason: "must be greater than zero".into(),
        });
    }
    Ok((final_kg - initial_kg) / f64::from(days))
}

/// Projected weight after `days` at a constant daily gain.
pub fn project_weight(current_kg: f64, daily_gain_kg: f64, days: u32) -> f64 {
    current_kg + daily_gain_kg * f64::from(days)
}

/// Feed conversion ratio: kg of feed per kg gained.
pub fn feed_conversion(feed_kg: f64, gain_kg: f64) -> Result<f64> {
    if gain_kg == 0.0 {
        return Err(Error::InvalidInput {
            field: "gain_kg",
            reason: "weight gain must be non-zero".into(),
        });
    }
    Ok(feed_kg / gain_kg)
}

/// Feed efficiency in percent: kg gained per kg of feed.
pub fn feed_efficiency(feed_kg: f64, gain_kg: f64) -> Result<f64> {
    if feed_kg == 0.0 {
        return Err(Error::InvalidInput {
            field: "feed_kg",
            reason: "feed consumed must be non-zero".into(),
        });
    }
    Ok(gain_kg / feed_kg * 100.0)
}

/// Quality band of a feed conversion ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedConversionGrade {
    Excellent,
    Good,
    Regular,
    Poor,
}

impl FeedConversionGrade {
    /// ≤5 excellent, ≤6 good, ≤7 regular, otherwise poor.
    pub fn classify(ratio: f64) -> Self {
        if ratio <= 5.0 {
            FeedConversionGrade::Excellent
        } else if ratio <= 6.0 {
            FeedConversionGrade::Good
        } else if ratio <= 7.0 {
            FeedConversionGrade::Regular
        } else {
            FeedConversionGrade::Poor
        }
    }
}
