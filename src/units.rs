//! Body measurement units and form field parsing
//!
//! Heights are entered in centimetres or inches and weights in kilograms or
//! pounds. Everything downstream works in metres and kilograms, so conversion
//! happens once, here, before any formula runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiabRiskError;

const METRES_PER_INCH: f64 = 0.0254;
const CM_PER_METRE: f64 = 100.0;
const KG_PER_POUND: f64 = 0.453592;

/// Unit a height was entered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeightUnit {
    #[serde(rename = "cm")]
    #[default]
    Cm,
    #[serde(rename = "in")]
    In,
}

/// Unit a weight was entered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightUnit {
    #[serde(rename = "kg")]
    #[default]
    Kg,
    #[serde(rename = "lb")]
    Lb,
}

impl HeightUnit {
    /// Get the unit label
    pub fn label(self) -> &'static str {
        match self {
            HeightUnit::Cm => "cm",
            HeightUnit::In => "in",
        }
    }
}

impl WeightUnit {
    /// Get the unit label
    pub fn label(self) -> &'static str {
        match self {
            WeightUnit::Kg => "kg",
            WeightUnit::Lb => "lb",
        }
    }
}

impl fmt::Display for HeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for HeightUnit {
    type Err = DiabRiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cm" => Ok(HeightUnit::Cm),
            "in" => Ok(HeightUnit::In),
            other => Err(DiabRiskError::InvalidInput(format!(
                "Unknown height unit '{}' (expected cm or in)",
                other
            ))),
        }
    }
}

impl FromStr for WeightUnit {
    type Err = DiabRiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kg" => Ok(WeightUnit::Kg),
            "lb" => Ok(WeightUnit::Lb),
            other => Err(DiabRiskError::InvalidInput(format!(
                "Unknown weight unit '{}' (expected kg or lb)",
                other
            ))),
        }
    }
}

/// Convert a height to metres
pub fn convert_height(value: f64, unit: HeightUnit) -> f64 {
    match unit {
        HeightUnit::In => value * METRES_PER_INCH,
        HeightUnit::Cm => value / CM_PER_METRE,
    }
}

/// Convert a weight to kilograms
pub fn convert_weight(value: f64, unit: WeightUnit) -> f64 {
    match unit {
        WeightUnit::Lb => value * KG_PER_POUND,
        WeightUnit::Kg => value,
    }
}

/// Blood glucose value in mg/dL
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MgDl(pub f64);

impl MgDl {
    /// Format the value with unit suffix
    pub fn format(self) -> String {
        format!("{} mg/dL", format_number(self.0))
    }
}

/// Parse a form field into a positive, finite number.
///
/// `field` is the human name used in the error message.
pub fn parse_measurement(raw: &str, field: &str) -> Result<f64, DiabRiskError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DiabRiskError::InvalidInput(format!("Please enter a value for {}.", field)));
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(DiabRiskError::InvalidInput(format!(
            "Please enter a valid {} value.",
            field
        ))),
    }
}

/// Render a number without a trailing ".0" for whole values
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
