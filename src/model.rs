//! Prediction input record and the raw form it is parsed from

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiabRiskError;
use crate::units::{format_number, parse_measurement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Smoking {
    Yes,
    #[default]
    No,
}

/// Outcome reported by the prediction service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    Diabetic,
    #[serde(rename = "Non-Diabetic")]
    NonDiabetic,
}

impl Gender {
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl Smoking {
    pub fn label(self) -> &'static str {
        match self {
            Smoking::Yes => "Yes",
            Smoking::No => "No",
        }
    }
}

impl Prediction {
    pub fn label(self) -> &'static str {
        match self {
            Prediction::Diabetic => "Diabetic",
            Prediction::NonDiabetic => "Non-Diabetic",
        }
    }

    /// Explanation shown beneath a result
    pub fn explanation(self) -> &'static str {
        match self {
            Prediction::Diabetic => {
                "Based on your parameters, the model predicts you may have diabetes. \
                 This is not a diagnosis. Please consult with a healthcare professional \
                 for proper evaluation."
            }
            Prediction::NonDiabetic => {
                "Based on your parameters, the model predicts you are not likely to have \
                 diabetes. Continue maintaining a healthy lifestyle and regular check-ups."
            }
        }
    }

    /// Heading and suggestions shown under the explanation
    pub fn guidance(self) -> (&'static str, [&'static str; 3]) {
        match self {
            Prediction::Diabetic => (
                "Next Steps",
                [
                    "Schedule an appointment with your doctor",
                    "Consider dietary changes",
                    "Increase physical activity",
                ],
            ),
            Prediction::NonDiabetic => (
                "Healthy Habits",
                ["Maintain a balanced diet", "Regular exercise", "Adequate sleep"],
            ),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Smoking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gender {
    type Err = DiabRiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            _ => Err(DiabRiskError::InvalidInput("Please select a gender.".to_string())),
        }
    }
}

impl FromStr for Smoking {
    type Err = DiabRiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Smoking::Yes),
            "no" | "n" => Ok(Smoking::No),
            _ => Err(DiabRiskError::InvalidInput(
                "Please select your smoking history.".to_string(),
            )),
        }
    }
}

/// The record submitted for prediction.
///
/// Serializes to the wire body expected by the `/predict` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub age: u32,
    pub bmi: f64,
    pub hba1c: f64,
    pub blood_glucose: f64,
    pub gender: Gender,
    pub smoking: Smoking,
}

/// Form fields exactly as typed by the user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormInput {
    pub age: String,
    pub bmi: String,
    pub hba1c: String,
    pub blood_glucose: String,
    pub gender: Gender,
    /// `None` until a smoking radio button has been chosen
    pub smoking: Option<Smoking>,
}

impl FormInput {
    /// Validate and convert the form into a prediction input
    pub fn parse(&self) -> Result<PredictionInput, DiabRiskError> {
        let age = parse_age(&self.age)?;
        let bmi = parse_measurement(&self.bmi, "BMI")?;
        let hba1c = parse_measurement(&self.hba1c, "HbA1c")?;
        let blood_glucose = parse_measurement(&self.blood_glucose, "blood glucose")?;
        let smoking = self.smoking.ok_or_else(|| {
            DiabRiskError::InvalidInput("Please select your smoking history.".to_string())
        })?;

        Ok(PredictionInput {
            age,
            bmi,
            hba1c,
            blood_glucose,
            gender: self.gender,
            smoking,
        })
    }

    /// Refill the form from an already-validated input
    pub fn fill_from(&mut self, input: &PredictionInput) {
        self.age = input.age.to_string();
        self.bmi = format_number(input.bmi);
        self.hba1c = format_number(input.hba1c);
        self.blood_glucose = format_number(input.blood_glucose);
        self.gender = input.gender;
        self.smoking = Some(input.smoking);
    }
}

fn parse_age(raw: &str) -> Result<u32, DiabRiskError> {
    let value = parse_measurement(raw, "age")?;
    if value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(DiabRiskError::InvalidInput(
            "Please enter your age in whole years.".to_string(),
        ));
    }
    Ok(value as u32)
}
