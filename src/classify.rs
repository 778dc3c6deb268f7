//! Threshold bands for BMI, HbA1c and blood glucose
//!
//! Each boundary value belongs to the upper band: 25.0 is Overweight, 6.5 is
//! Diabetes, 126 mg/dL is Diabetic.

use serde::{Deserialize, Serialize};

/// BMI category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

/// HbA1c category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hba1cCategory {
    Normal,
    Prediabetes,
    Diabetes,
}

/// Fasting blood glucose band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlucoseBand {
    Normal,      // < 100 mg/dL
    Prediabetic, // 100 to 125
    Diabetic,    // >= 126
}

/// How alarming a category is, for colouring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Good,
    Warning,
    Danger,
}

pub const BMI_NORMAL_MIN: f64 = 18.5;
pub const BMI_OVERWEIGHT_MIN: f64 = 25.0;
pub const BMI_OBESE_MIN: f64 = 30.0;

pub const HBA1C_PREDIABETES_MIN: f64 = 5.7;
pub const HBA1C_DIABETES_MIN: f64 = 6.5;

pub const GLUCOSE_PREDIABETIC_MIN: f64 = 100.0;
pub const GLUCOSE_DIABETIC_MIN: f64 = 126.0;

pub fn classify_bmi(bmi: f64) -> BmiCategory {
    if bmi < BMI_NORMAL_MIN {
        BmiCategory::Underweight
    } else if bmi < BMI_OVERWEIGHT_MIN {
        BmiCategory::Normal
    } else if bmi < BMI_OBESE_MIN {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    }
}

pub fn classify_hba1c(hba1c: f64) -> Hba1cCategory {
    if hba1c < HBA1C_PREDIABETES_MIN {
        Hba1cCategory::Normal
    } else if hba1c < HBA1C_DIABETES_MIN {
        Hba1cCategory::Prediabetes
    } else {
        Hba1cCategory::Diabetes
    }
}

pub fn classify_glucose(mg_dl: f64) -> GlucoseBand {
    if mg_dl < GLUCOSE_PREDIABETIC_MIN {
        GlucoseBand::Normal
    } else if mg_dl < GLUCOSE_DIABETIC_MIN {
        GlucoseBand::Prediabetic
    } else {
        GlucoseBand::Diabetic
    }
}

impl BmiCategory {
    pub fn label(self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal weight",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obese => "Obese",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            BmiCategory::Normal => Severity::Good,
            BmiCategory::Underweight | BmiCategory::Overweight => Severity::Warning,
            BmiCategory::Obese => Severity::Danger,
        }
    }
}

impl Hba1cCategory {
    pub fn label(self) -> &'static str {
        match self {
            Hba1cCategory::Normal => "Normal",
            Hba1cCategory::Prediabetes => "Prediabetes",
            Hba1cCategory::Diabetes => "Diabetes",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Hba1cCategory::Normal => "Your HbA1c level is within the normal range.",
            Hba1cCategory::Prediabetes => {
                "Your HbA1c level indicates prediabetes. This is a warning sign that you \
                 might develop type 2 diabetes in the future."
            }
            Hba1cCategory::Diabetes => {
                "Your HbA1c level indicates diabetes. Please consult with a healthcare \
                 professional for proper evaluation."
            }
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Hba1cCategory::Normal => Severity::Good,
            Hba1cCategory::Prediabetes => Severity::Warning,
            Hba1cCategory::Diabetes => Severity::Danger,
        }
    }
}

impl GlucoseBand {
    pub fn label(self) -> &'static str {
        match self {
            GlucoseBand::Normal => "Normal (< 100 mg/dL)",
            GlucoseBand::Prediabetic => "Prediabetic (100-125 mg/dL)",
            GlucoseBand::Diabetic => "Diabetic (>= 126 mg/dL)",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            GlucoseBand::Normal => Severity::Good,
            GlucoseBand::Prediabetic => Severity::Warning,
            GlucoseBand::Diabetic => Severity::Danger,
        }
    }
}

/// Position (0-100 %) of a glucose value on the three-band indicator bar.
///
/// 70-99 maps to 0-40 %, 100-125 to 40-70 %, 126-300 to 70-100 %; values
/// outside 70-300 are pinned to the ends.
pub fn glucose_indicator_position(mg_dl: f64) -> f64 {
    if mg_dl.is_nan() || mg_dl < 70.0 {
        0.0
    } else if mg_dl > 300.0 {
        100.0
    } else if mg_dl < GLUCOSE_PREDIABETIC_MIN {
        (mg_dl - 70.0) / 30.0 * 40.0
    } else if mg_dl < GLUCOSE_DIABETIC_MIN {
        40.0 + (mg_dl - 100.0) / 26.0 * 30.0
    } else {
        70.0 + (mg_dl - 126.0) / 174.0 * 30.0
    }
}

/// Normal range used as a reference in the result chart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceRange {
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
}

pub const BMI_REFERENCE: ReferenceRange = ReferenceRange { label: "BMI", min: 18.5, max: 24.9 };
pub const HBA1C_REFERENCE: ReferenceRange = ReferenceRange { label: "HbA1c", min: 4.0, max: 5.6 };
pub const GLUCOSE_REFERENCE: ReferenceRange =
    ReferenceRange { label: "Blood Glucose", min: 70.0, max: 99.0 };

impl ReferenceRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}
