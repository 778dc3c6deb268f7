//! BMI and HbA1c formulas
//!
//! HbA1c uses the DCCT linear regression `(glucose + 46.7) / 28.7`. The
//! adjusted estimate layers small corrections for age, BMI, gender and
//! smoking on top and clamps to the clinically plausible 4-14 % range.

use serde::{Deserialize, Serialize};

use crate::classify::{classify_bmi, classify_hba1c, BmiCategory, Hba1cCategory};
use crate::error::DiabRiskError;
use crate::model::{Gender, Smoking};
use crate::units::{convert_height, convert_weight, HeightUnit, WeightUnit};

const DCCT_INTERCEPT: f64 = 46.7;
const DCCT_SLOPE: f64 = 28.7;

const AGE_THRESHOLD: f64 = 50.0;
const AGE_FACTOR: f64 = 0.01;
const BMI_THRESHOLD: f64 = 25.0;
const BMI_FACTOR: f64 = 0.05;
const MALE_ADJUSTMENT: f64 = 0.1;
const SMOKER_ADJUSTMENT: f64 = 0.2;

pub const HBA1C_MIN: f64 = 4.0;
pub const HBA1C_MAX: f64 = 14.0;

/// Result of the BMI calculator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BmiCalculation {
    pub bmi: f64,
    pub category: BmiCategory,
}

/// Result of the HbA1c calculator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hba1cCalculation {
    pub hba1c: f64,
    pub category: Hba1cCategory,
}

/// Round to one decimal place, halves away from zero
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn require_positive(value: f64, what: &str) -> Result<f64, DiabRiskError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(DiabRiskError::InvalidInput(format!("Please enter a valid {} value.", what)))
    }
}

/// `weight / height²`, rounded to one decimal
pub fn compute_bmi(weight_kg: f64, height_m: f64) -> Result<f64, DiabRiskError> {
    let weight = require_positive(weight_kg, "weight")?;
    let height = require_positive(height_m, "height")?;
    Ok(round1(weight / (height * height)))
}

/// Full BMI calculator: convert units, compute and classify
pub fn calculate_bmi(
    height: f64,
    height_unit: HeightUnit,
    weight: f64,
    weight_unit: WeightUnit,
) -> Result<BmiCalculation, DiabRiskError> {
    require_positive(height, "height")?;
    require_positive(weight, "weight")?;
    let bmi = compute_bmi(convert_weight(weight, weight_unit), convert_height(height, height_unit))?;
    Ok(BmiCalculation { bmi, category: classify_bmi(bmi) })
}

/// Plain DCCT conversion from average glucose, rounded to one decimal
pub fn dcct_hba1c(blood_glucose: f64) -> Result<f64, DiabRiskError> {
    let glucose = require_positive(blood_glucose, "blood glucose")?;
    Ok(round1((glucose + DCCT_INTERCEPT) / DCCT_SLOPE))
}

/// HbA1c calculator: DCCT value and its category
pub fn calculate_hba1c(blood_glucose: f64) -> Result<Hba1cCalculation, DiabRiskError> {
    let hba1c = dcct_hba1c(blood_glucose)?;
    Ok(Hba1cCalculation { hba1c, category: classify_hba1c(hba1c) })
}

/// Adjusted HbA1c estimate, always within [4.0, 14.0]
pub fn estimate_hba1c(
    blood_glucose: f64,
    age: f64,
    bmi: f64,
    gender: Gender,
    smoking: Smoking,
) -> Result<f64, DiabRiskError> {
    let glucose = require_positive(blood_glucose, "blood glucose")?;
    let age = require_positive(age, "age")?;
    let bmi = require_positive(bmi, "BMI")?;

    let mut estimate = (glucose + DCCT_INTERCEPT) / DCCT_SLOPE;
    if age > AGE_THRESHOLD {
        estimate += (age - AGE_THRESHOLD) * AGE_FACTOR;
    }
    if bmi > BMI_THRESHOLD {
        estimate += (bmi - BMI_THRESHOLD) * BMI_FACTOR;
    }
    if gender == Gender::Male {
        estimate += MALE_ADJUSTMENT;
    }
    if smoking == Smoking::Yes {
        estimate += SMOKER_ADJUSTMENT;
    }

    Ok(round1(estimate.clamp(HBA1C_MIN, HBA1C_MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi_basic() {
        assert_eq!(compute_bmi(70.0, 1.75).unwrap(), 22.9);
        assert!(compute_bmi(0.0, 1.75).is_err());
        assert!(compute_bmi(70.0, -1.0).is_err());
        assert!(compute_bmi(f64::NAN, 1.75).is_err());
    }

    #[test]
    fn test_bmi_unit_invariance() {
        let cases = [(150.0, 45.0), (170.0, 70.0), (182.0, 95.5), (201.0, 130.0)];
        for (cm, kg) in cases {
            let metric = calculate_bmi(cm, HeightUnit::Cm, kg, WeightUnit::Kg).unwrap();
            let inches = cm / 2.54;
            let pounds = kg / 0.453592;
            let imperial = calculate_bmi(inches, HeightUnit::In, pounds, WeightUnit::Lb).unwrap();
            assert!(
                (metric.bmi - imperial.bmi).abs() <= 0.1 + 1e-9,
                "{} vs {}",
                metric.bmi,
                imperial.bmi
            );
        }
    }

    #[test]
    fn test_bmi_calculator_category() {
        let calc = calculate_bmi(170.0, HeightUnit::Cm, 80.0, WeightUnit::Kg).unwrap();
        assert_eq!(calc.bmi, 27.7);
        assert_eq!(calc.category, BmiCategory::Overweight);
        assert!(calculate_bmi(0.0, HeightUnit::Cm, 80.0, WeightUnit::Kg).is_err());
    }

    #[test]
    fn test_dcct() {
        // (154 + 46.7) / 28.7 = 6.99
        assert_eq!(dcct_hba1c(154.0).unwrap(), 7.0);
        assert!(dcct_hba1c(0.0).is_err());
        let calc = calculate_hba1c(100.0).unwrap();
        assert_eq!(calc.hba1c, 5.1);
        assert_eq!(calc.category, Hba1cCategory::Normal);
    }

    #[test]
    fn test_estimate_reference_case() {
        // base 6.1568 + 0.05 (age) + 0.1 (bmi) + 0.1 (male) + 0.2 (smoker) = 6.6068
        let v = estimate_hba1c(130.0, 55.0, 27.0, Gender::Male, Smoking::Yes).unwrap();
        assert_eq!(v, 6.6);
        let v = estimate_hba1c(130.0, 40.0, 22.0, Gender::Female, Smoking::No).unwrap();
        assert_eq!(v, 6.2);
    }

    #[test]
    fn test_estimate_is_clamped() {
        assert_eq!(estimate_hba1c(20.0, 30.0, 20.0, Gender::Female, Smoking::No).unwrap(), 4.0);
        assert_eq!(estimate_hba1c(600.0, 90.0, 45.0, Gender::Male, Smoking::Yes).unwrap(), 14.0);
    }

    #[test]
    fn test_estimate_monotonic() {
        let mut last = 0.0;
        for g in (40..=500).step_by(5) {
            let v = estimate_hba1c(g as f64, 60.0, 28.0, Gender::Male, Smoking::No).unwrap();
            assert!(v >= last);
            assert!((HBA1C_MIN..=HBA1C_MAX).contains(&v));
            last = v;
        }

        let mut last = 0.0;
        for age in 51..=100 {
            let v = estimate_hba1c(140.0, age as f64, 24.0, Gender::Female, Smoking::No).unwrap();
            assert!(v >= last);
            last = v;
        }

        let mut last = 0.0;
        for tenth in 251..=450 {
            let bmi = tenth as f64 / 10.0;
            let v = estimate_hba1c(140.0, 40.0, bmi, Gender::Female, Smoking::Yes).unwrap();
            assert!(v >= last);
            last = v;
        }
    }

    #[test]
    fn test_estimate_rejects_bad_primary_inputs() {
        assert!(estimate_hba1c(-1.0, 55.0, 27.0, Gender::Male, Smoking::No).is_err());
        assert!(estimate_hba1c(120.0, 0.0, 27.0, Gender::Male, Smoking::No).is_err());
        assert!(estimate_hba1c(120.0, 55.0, f64::INFINITY, Gender::Male, Smoking::No).is_err());
    }

    #[test]
    fn test_bmi_category_matches_displayed_value() {
        let calc = calculate_bmi(100.0, HeightUnit::Cm, 24.96, WeightUnit::Kg).unwrap();
        assert_eq!(calc.bmi, 25.0);
        assert_eq!(calc.category, BmiCategory::Overweight);
    }
}
