//! Form session: the state a user builds up between submissions
//!
//! Calculator results, the form fields and the last accepted prediction are
//! held here and passed around explicitly. Submissions are split into
//! `begin_submission` (on the UI thread) and `complete_submission` (when the
//! response arrives) so a worker thread can run the request in between.

use chrono::{DateTime, Utc};
use log::debug;

use crate::client::{PredictionClient, PredictionOutcome, RequestGate, RequestTicket, Transport};
use crate::error::{DiabRiskError, PredictionError};
use crate::formulas::{self, BmiCalculation, Hba1cCalculation};
use crate::history::{HistoryRecord, HistoryStore};
use crate::model::{FormInput, PredictionInput};
use crate::storage::KeyValueStore;
use crate::units::{format_number, parse_measurement, HeightUnit, WeightUnit};

/// What happened to a finished request
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied(PredictionOutcome),
    /// A newer submission (or a cancel) superseded this one; result dropped
    Stale,
}

#[derive(Debug, Default)]
pub struct Session {
    pub form: FormInput,
    bmi_calculation: Option<BmiCalculation>,
    hba1c_calculation: Option<Hba1cCalculation>,
    gate: RequestGate,
    last_result: Option<(PredictionInput, PredictionOutcome)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bmi_calculation(&self) -> Option<BmiCalculation> {
        self.bmi_calculation
    }

    pub fn hba1c_calculation(&self) -> Option<Hba1cCalculation> {
        self.hba1c_calculation
    }

    pub fn last_result(&self) -> Option<&(PredictionInput, PredictionOutcome)> {
        self.last_result.as_ref()
    }

    /// Run the BMI calculator on raw height/weight fields
    pub fn calculate_bmi(
        &mut self,
        height: &str,
        height_unit: HeightUnit,
        weight: &str,
        weight_unit: WeightUnit,
    ) -> Result<BmiCalculation, DiabRiskError> {
        self.bmi_calculation = None;
        let parsed = parse_measurement(height, "height")
            .and_then(|h| parse_measurement(weight, "weight").map(|w| (h, w)))
            .map_err(|_| {
                DiabRiskError::InvalidInput("Please enter valid height and weight values.".to_string())
            })?;
        let calc = formulas::calculate_bmi(parsed.0, height_unit, parsed.1, weight_unit)?;
        self.bmi_calculation = Some(calc);
        Ok(calc)
    }

    /// Copy the calculated BMI into the form. Returns `false` if there is none.
    pub fn use_calculated_bmi(&mut self) -> bool {
        match self.bmi_calculation {
            Some(calc) => {
                self.form.bmi = format_number(calc.bmi);
                true
            }
            None => false,
        }
    }

    /// Run the plain DCCT calculator on an average glucose field
    pub fn calculate_hba1c(&mut self, avg_glucose: &str) -> Result<Hba1cCalculation, DiabRiskError> {
        self.hba1c_calculation = None;
        let glucose = parse_measurement(avg_glucose, "blood glucose").map_err(|_| {
            DiabRiskError::InvalidInput("Please enter a valid blood glucose value.".to_string())
        })?;
        let calc = formulas::calculate_hba1c(glucose)?;
        self.hba1c_calculation = Some(calc);
        Ok(calc)
    }

    /// Adjusted HbA1c estimate from the glucose, age, BMI, gender and smoking fields
    pub fn estimate_hba1c_from_form(&mut self) -> Result<Hba1cCalculation, DiabRiskError> {
        self.hba1c_calculation = None;
        let glucose = parse_measurement(&self.form.blood_glucose, "blood glucose")?;
        let age = parse_measurement(&self.form.age, "age")?;
        let bmi = parse_measurement(&self.form.bmi, "BMI")?;
        let smoking = self.form.smoking.unwrap_or_default();
        let hba1c = formulas::estimate_hba1c(glucose, age, bmi, self.form.gender, smoking)?;
        let calc = Hba1cCalculation { hba1c, category: crate::classify::classify_hba1c(hba1c) };
        self.hba1c_calculation = Some(calc);
        Ok(calc)
    }

    /// Copy the calculated HbA1c into the form. Returns `false` if there is none.
    pub fn use_calculated_hba1c(&mut self) -> bool {
        match self.hba1c_calculation {
            Some(calc) => {
                self.form.hba1c = format_number(calc.hba1c);
                true
            }
            None => false,
        }
    }

    /// Validate the form and take a ticket for a new request
    pub fn begin_submission(&mut self) -> Result<(RequestTicket, PredictionInput), DiabRiskError> {
        let input = self.form.parse()?;
        let ticket = self.gate.begin();
        debug!("Submission #{} started", ticket.sequence());
        Ok((ticket, input))
    }

    /// Apply a finished request if it is still the newest one
    pub fn complete_submission(
        &mut self,
        ticket: RequestTicket,
        input: PredictionInput,
        result: Result<PredictionOutcome, PredictionError>,
    ) -> Result<Completion, DiabRiskError> {
        if !self.gate.is_current(ticket) {
            debug!("Discarding stale response for submission #{}", ticket.sequence());
            return Ok(Completion::Stale);
        }
        match result {
            Ok(outcome) => {
                self.last_result = Some((input, outcome.clone()));
                Ok(Completion::Applied(outcome))
            }
            Err(e) => {
                self.last_result = None;
                Err(e.into())
            }
        }
    }

    /// Drop whatever request is in flight
    pub fn cancel_submission(&self) {
        self.gate.cancel();
    }

    /// Validate, predict and apply in one synchronous step
    pub fn submit<T: Transport>(
        &mut self,
        client: &PredictionClient<T>,
    ) -> Result<Completion, DiabRiskError> {
        let (ticket, input) = self.begin_submission()?;
        let result = client.predict(&input);
        self.complete_submission(ticket, input, result)
    }

    /// Persist the last accepted prediction
    pub fn save_result<S: KeyValueStore>(
        &self,
        history: &mut HistoryStore<S>,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, DiabRiskError> {
        let (input, outcome) = self.last_result.as_ref().ok_or_else(|| {
            DiabRiskError::InvalidInput("There is no prediction to save yet.".to_string())
        })?;
        history.record(input, outcome, now)
    }

    /// Refill the form from a saved record
    pub fn load_history_item<S: KeyValueStore>(
        &mut self,
        history: &HistoryStore<S>,
        id: &str,
    ) -> Result<(), DiabRiskError> {
        let record = history
            .find_by_id(id)
            .ok_or_else(|| DiabRiskError::NotFound(format!("History item {}", id)))?;
        self.form.fill_from(&record.input());
        Ok(())
    }
}
