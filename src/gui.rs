//! GUI for the diabetes risk predictor using egui

use std::fs;
use std::io::Write;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use chrono::Utc;
use eframe::egui;
use egui_plot::{Bar, BarChart, Legend, Plot};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::classify::{
    classify_bmi, classify_glucose, classify_hba1c, glucose_indicator_position, ReferenceRange,
    Severity, BMI_REFERENCE, GLUCOSE_REFERENCE, HBA1C_REFERENCE,
};
use crate::client::{PredictionClient, PredictionOutcome, RequestTicket};
use crate::config::Config;
use crate::error::{DiabRiskError, PredictionError};
use crate::history::{HistoryRecord, HistoryStore};
use crate::model::{Gender, Prediction, PredictionInput, Smoking};
use crate::session::{Completion, Session};
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};
use crate::units::{format_number, parse_measurement, HeightUnit, MgDl, WeightUnit};

/// Persistent user settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    pub height_unit: HeightUnit,
    pub weight_unit: WeightUnit,
    /// Unset until the user picks a theme; the system theme applies meanwhile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_mode: Option<bool>,
}

impl AppSettings {
    /// Load settings from the settings file
    pub fn load() -> Self {
        let path = crate::config::settings_file_path();
        if path.exists() {
            if let Ok(contents) = fs::read_to_string(&path) {
                if let Ok(settings) = serde_json::from_str(&contents) {
                    return settings;
                }
            }
        }
        Self::default()
    }

    /// Save settings to the settings file
    pub fn save(&self) {
        let path = crate::config::settings_file_path();
        if let Ok(json) = serde_json::to_string_pretty(self) {
            if let Ok(mut file) = fs::File::create(&path) {
                let _ = file.write_all(json.as_bytes());
            }
        }
    }

    /// Dark unless the user chose light, or the system prefers light and nothing was chosen
    pub fn is_dark(&self, system: Option<egui::Theme>) -> bool {
        self.dark_mode.unwrap_or(system != Some(egui::Theme::Light))
    }
}

fn visuals_for(dark: bool) -> egui::Visuals {
    if dark {
        let mut visuals = egui::Visuals::dark();
        visuals.override_text_color = Some(egui::Color32::from_gray(220));
        visuals
    } else {
        egui::Visuals::light()
    }
}

/// Message from a prediction worker to the UI
struct PredictMessage {
    ticket: RequestTicket,
    input: PredictionInput,
    result: Result<PredictionOutcome, PredictionError>,
}

#[derive(PartialEq, Clone, Copy)]
enum PredictStatus {
    Idle,
    Predicting,
    Done,
    Error,
}

enum HistoryAction {
    Use(String),
    Delete(String),
}

/// Main application state
pub struct DiabRiskApp {
    config: Config,
    session: Session,
    history: HistoryStore<Box<dyn KeyValueStore>>,
    records: Vec<HistoryRecord>,

    // Prediction state
    predict_sender: Sender<PredictMessage>,
    predict_receiver: Receiver<PredictMessage>,
    predict_status: PredictStatus,
    status_message: String,
    save_message: String,

    // BMI calculator
    show_bmi_calculator: bool,
    height_input: String,
    weight_input: String,
    settings: AppSettings,
    bmi_message: String,

    // HbA1c calculator
    show_hba1c_calculator: bool,
    avg_glucose_input: String,
    hba1c_message: String,
}

fn severity_color(severity: Severity) -> egui::Color32 {
    match severity {
        Severity::Good => egui::Color32::from_rgb(100, 200, 100),
        Severity::Warning => egui::Color32::from_rgb(255, 180, 100),
        Severity::Danger => egui::Color32::from_rgb(255, 100, 100),
    }
}

fn prediction_color(prediction: Prediction) -> egui::Color32 {
    match prediction {
        Prediction::Diabetic => severity_color(Severity::Danger),
        Prediction::NonDiabetic => severity_color(Severity::Good),
    }
}

/// Marks whether a value sits inside its normal range
fn reference_label(ui: &mut egui::Ui, range: &ReferenceRange, value: f64) {
    if range.contains(value) {
        ui.colored_label(severity_color(Severity::Good), "within normal range");
    } else {
        ui.label(format!(
            "normal {}–{}",
            format_number(range.min),
            format_number(range.max)
        ));
    }
}

impl DiabRiskApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config) -> Self {
        let settings = AppSettings::load();
        cc.egui_ctx
            .set_visuals(visuals_for(settings.is_dark(cc.egui_ctx.system_theme())));

        let db_path = config.database_path();
        let slot: Box<dyn KeyValueStore> = match SqliteStore::new(&db_path) {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!("Could not open {}: {}. History will not be kept.", db_path.display(), e);
                Box::new(MemoryStore::new())
            }
        };

        let (tx, rx) = channel();
        let mut app = Self {
            config,
            session: Session::new(),
            history: HistoryStore::new(slot),
            records: Vec::new(),
            predict_sender: tx,
            predict_receiver: rx,
            predict_status: PredictStatus::Idle,
            status_message: String::new(),
            save_message: String::new(),
            show_bmi_calculator: false,
            height_input: String::new(),
            weight_input: String::new(),
            settings,
            bmi_message: String::new(),
            show_hba1c_calculator: false,
            avg_glucose_input: String::new(),
            hba1c_message: String::new(),
        };
        app.refresh_history();
        app
    }

    fn refresh_history(&mut self) {
        self.records = self.history.list();
    }

    fn start_prediction(&mut self) {
        let (ticket, input) = match self.session.begin_submission() {
            Ok(submission) => submission,
            Err(e) => {
                self.predict_status = PredictStatus::Error;
                self.status_message = e.user_message();
                return;
            }
        };

        self.predict_status = PredictStatus::Predicting;
        self.status_message = "Predicting...".to_string();
        self.save_message.clear();

        let tx = self.predict_sender.clone();
        let endpoint = self.config.endpoint.clone();
        let timeout = self.config.timeout;

        thread::spawn(move || {
            let result = PredictionClient::http(endpoint, timeout).and_then(|c| c.predict(&input));
            let _ = tx.send(PredictMessage { ticket, input, result });
        });
    }

    fn check_predictions(&mut self) {
        while let Ok(msg) = self.predict_receiver.try_recv() {
            match self.session.complete_submission(msg.ticket, msg.input, msg.result) {
                Ok(Completion::Applied(_)) => {
                    self.predict_status = PredictStatus::Done;
                    self.status_message.clear();
                }
                Ok(Completion::Stale) => {}
                Err(e) => {
                    self.predict_status = PredictStatus::Error;
                    self.status_message = e.user_message();
                }
            }
        }
    }

    fn save_result(&mut self) {
        match self.session.save_result(&mut self.history, Utc::now()) {
            Ok(_) => self.save_message = "Saved!".to_string(),
            Err(e) => self.save_message = format!("Failed to save your result: {}", e.user_message()),
        }
        self.refresh_history();
    }

    fn apply_history_action(&mut self, action: HistoryAction) {
        match action {
            HistoryAction::Use(id) => {
                if let Err(e) = self.session.load_history_item(&self.history, &id) {
                    self.status_message = e.user_message();
                }
            }
            HistoryAction::Delete(id) => {
                if let Err(e) = self.history.delete_by_id(&id) {
                    self.status_message = format!("Failed to delete history item: {}", e);
                }
            }
        }
        self.refresh_history();
    }
}

impl eframe::App for DiabRiskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_predictions();

        if self.predict_status == PredictStatus::Predicting {
            ctx.request_repaint();
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Diabetes Risk Predictor");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("HbA1c Calculator").clicked() {
                        self.show_hba1c_calculator = !self.show_hba1c_calculator;
                    }
                    if ui.button("BMI Calculator").clicked() {
                        self.show_bmi_calculator = !self.show_bmi_calculator;
                    }
                    let mut dark = ui.visuals().dark_mode;
                    if ui.checkbox(&mut dark, "Dark mode").changed() {
                        ctx.set_visuals(visuals_for(dark));
                        self.settings.dark_mode = Some(dark);
                        self.settings.save();
                    }
                    ui.monospace(&self.config.endpoint);
                });
            });
        });

        if self.show_bmi_calculator {
            self.show_bmi_window(ctx);
        }
        if self.show_hba1c_calculator {
            self.show_hba1c_window(ctx);
        }

        let mut action = None;
        egui::SidePanel::right("history_panel")
            .min_width(280.0)
            .show(ctx, |ui| {
                action = self.show_history(ui);
            });
        if let Some(action) = action {
            self.apply_history_action(action);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.show_form(ui);
                ui.add_space(15.0);
                ui.separator();
                self.show_result(ui);
            });
        });
    }
}

impl DiabRiskApp {
    fn show_form(&mut self, ui: &mut egui::Ui) {
        ui.heading("Your Health Parameters");
        ui.add_space(5.0);

        egui::Grid::new("form_grid")
            .num_columns(2)
            .spacing([10.0, 8.0])
            .show(ui, |ui| {
                ui.label("Age (years):");
                ui.text_edit_singleline(&mut self.session.form.age);
                ui.end_row();

                ui.label("BMI:");
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.session.form.bmi);
                    if ui.small_button("Calculate").clicked() {
                        self.show_bmi_calculator = true;
                    }
                });
                ui.end_row();

                ui.label("HbA1c (%):");
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.session.form.hba1c);
                    if ui.small_button("Estimate").clicked() {
                        self.show_hba1c_calculator = true;
                    }
                });
                ui.end_row();

                ui.label("Blood glucose (mg/dL):");
                ui.text_edit_singleline(&mut self.session.form.blood_glucose);
                ui.end_row();

                ui.label("Gender:");
                egui::ComboBox::from_id_salt("gender")
                    .selected_text(self.session.form.gender.label())
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.session.form.gender, Gender::Male, "Male");
                        ui.selectable_value(&mut self.session.form.gender, Gender::Female, "Female");
                    });
                ui.end_row();

                ui.label("Smoking history:");
                ui.horizontal(|ui| {
                    ui.radio_value(&mut self.session.form.smoking, Some(Smoking::Yes), "Yes");
                    ui.radio_value(&mut self.session.form.smoking, Some(Smoking::No), "No");
                });
                ui.end_row();
            });

        // Live glucose band indicator
        if let Ok(glucose) = parse_measurement(&self.session.form.blood_glucose, "blood glucose") {
            let band = classify_glucose(glucose);
            let position = glucose_indicator_position(glucose) as f32 / 100.0;
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                ui.colored_label(severity_color(band.severity()), band.label());
                let bar = egui::ProgressBar::new(position)
                    .text(MgDl(glucose).format())
                    .fill(severity_color(band.severity()));
                ui.add(bar);
            });
        }

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            let enabled = self.predict_status != PredictStatus::Predicting;
            if ui.add_enabled(enabled, egui::Button::new("Predict Risk")).clicked() {
                self.start_prediction();
            }
            if self.predict_status == PredictStatus::Predicting {
                ui.spinner();
                if ui.button("Cancel").clicked() {
                    self.session.cancel_submission();
                    self.predict_status = PredictStatus::Idle;
                    self.status_message.clear();
                }
            }
            if !self.status_message.is_empty() {
                let color = match self.predict_status {
                    PredictStatus::Error => severity_color(Severity::Danger),
                    _ => egui::Color32::GRAY,
                };
                ui.colored_label(color, &self.status_message);
            }
        });
    }

    fn show_result(&mut self, ui: &mut egui::Ui) {
        let Some((input, outcome)) = self.session.last_result().cloned() else {
            ui.vertical_centered(|ui| {
                ui.add_space(30.0);
                ui.label("Fill in your parameters and click 'Predict Risk'.");
            });
            return;
        };

        ui.heading("Result");
        ui.label(
            egui::RichText::new(outcome.prediction.label())
                .size(24.0)
                .color(prediction_color(outcome.prediction)),
        );
        if let Some(confidence) = &outcome.confidence {
            ui.label(format!("Confidence: {}", confidence));
        }
        ui.add_space(5.0);
        ui.label(outcome.prediction.explanation());
        let (heading, steps) = outcome.prediction.guidance();
        ui.add_space(5.0);
        ui.strong(heading);
        for step in steps {
            ui.label(format!("• {}", step));
        }

        ui.add_space(10.0);
        egui::Grid::new("factor_grid")
            .num_columns(4)
            .spacing([20.0, 4.0])
            .striped(true)
            .show(ui, |ui| {
                let bmi = classify_bmi(input.bmi);
                ui.label("BMI");
                ui.label(format!("{:.1}", input.bmi));
                ui.colored_label(severity_color(bmi.severity()), bmi.label());
                reference_label(ui, &BMI_REFERENCE, input.bmi);
                ui.end_row();

                let hba1c = classify_hba1c(input.hba1c);
                ui.label("HbA1c");
                ui.label(format!("{:.1}%", input.hba1c));
                ui.colored_label(severity_color(hba1c.severity()), hba1c.label());
                reference_label(ui, &HBA1C_REFERENCE, input.hba1c);
                ui.end_row();

                let glucose = classify_glucose(input.blood_glucose);
                ui.label("Blood Glucose");
                ui.label(MgDl(input.blood_glucose).format());
                ui.colored_label(severity_color(glucose.severity()), glucose.label());
                reference_label(ui, &GLUCOSE_REFERENCE, input.blood_glucose);
                ui.end_row();
            });

        ui.add_space(10.0);
        self.show_risk_chart(ui, &input);

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            if ui.button("Save Result").clicked() {
                self.save_result();
            }
            if !self.save_message.is_empty() {
                ui.label(&self.save_message);
            }
        });
    }

    /// User values next to the normal reference range for each factor
    fn show_risk_chart(&self, ui: &mut egui::Ui, input: &PredictionInput) {
        let factors: [(ReferenceRange, f64); 3] = [
            (BMI_REFERENCE, input.bmi),
            (HBA1C_REFERENCE, input.hba1c),
            (GLUCOSE_REFERENCE, input.blood_glucose),
        ];

        let mut yours = Vec::new();
        let mut mins = Vec::new();
        let mut maxs = Vec::new();
        for (i, (range, value)) in factors.iter().enumerate() {
            let x = i as f64;
            yours.push(Bar::new(x - 0.25, *value).width(0.22).name(range.label));
            mins.push(Bar::new(x, range.min).width(0.22).name(range.label));
            maxs.push(Bar::new(x + 0.25, range.max).width(0.22).name(range.label));
        }

        let yours = BarChart::new("Your Value", yours).color(egui::Color32::from_rgb(94, 96, 206));
        let mins = BarChart::new("Minimum Normal", mins).color(egui::Color32::from_rgb(100, 200, 100));
        let maxs = BarChart::new("Maximum Normal", maxs).color(egui::Color32::from_rgb(255, 180, 100));

        ui.label("0 = BMI, 1 = HbA1c, 2 = Blood Glucose");
        Plot::new("risk_chart")
            .height(220.0)
            .legend(Legend::default())
            .allow_drag(false)
            .allow_zoom(false)
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(yours);
                plot_ui.bar_chart(mins);
                plot_ui.bar_chart(maxs);
            });
    }

    fn show_history(&self, ui: &mut egui::Ui) -> Option<HistoryAction> {
        ui.heading("History");
        ui.separator();

        if self.records.is_empty() {
            ui.label("No saved predictions yet.");
            return None;
        }

        let mut action = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for record in &self.records {
                ui.group(|ui| {
                    ui.horizontal(|ui| {
                        ui.colored_label(prediction_color(record.result), record.result.label());
                        ui.label(egui::RichText::new(record.display_time()).small());
                    });
                    ui.label(format!(
                        "Age {} | BMI {:.1} | HbA1c {:.1}% | {}",
                        record.age,
                        record.bmi,
                        record.hba1c,
                        MgDl(record.blood_glucose).format()
                    ));
                    ui.horizontal(|ui| {
                        if ui.small_button("Use").clicked() {
                            action = Some(HistoryAction::Use(record.id.clone()));
                        }
                        if ui.small_button("Delete").clicked() {
                            action = Some(HistoryAction::Delete(record.id.clone()));
                        }
                    });
                });
            }
        });
        action
    }

    fn show_bmi_window(&mut self, ctx: &egui::Context) {
        let mut save_settings = false;

        egui::Window::new("BMI Calculator")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Height:");
                    ui.text_edit_singleline(&mut self.height_input);
                    egui::ComboBox::from_id_salt("height_unit")
                        .selected_text(self.settings.height_unit.label())
                        .show_ui(ui, |ui| {
                            for unit in [HeightUnit::Cm, HeightUnit::In] {
                                if ui.selectable_value(&mut self.settings.height_unit, unit, unit.label()).changed() {
                                    save_settings = true;
                                }
                            }
                        });
                });
                ui.horizontal(|ui| {
                    ui.label("Weight:");
                    ui.text_edit_singleline(&mut self.weight_input);
                    egui::ComboBox::from_id_salt("weight_unit")
                        .selected_text(self.settings.weight_unit.label())
                        .show_ui(ui, |ui| {
                            for unit in [WeightUnit::Kg, WeightUnit::Lb] {
                                if ui.selectable_value(&mut self.settings.weight_unit, unit, unit.label()).changed() {
                                    save_settings = true;
                                }
                            }
                        });
                });

                if ui.button("Calculate").clicked() {
                    self.bmi_message = match self.session.calculate_bmi(
                        &self.height_input,
                        self.settings.height_unit,
                        &self.weight_input,
                        self.settings.weight_unit,
                    ) {
                        Ok(calc) => format!("Your BMI: {} ({})", calc.bmi, calc.category.label()),
                        Err(e) => e.user_message(),
                    };
                }

                if let Some(calc) = self.session.bmi_calculation() {
                    ui.colored_label(severity_color(calc.category.severity()), &self.bmi_message);
                } else if !self.bmi_message.is_empty() {
                    ui.colored_label(severity_color(Severity::Danger), &self.bmi_message);
                }

                ui.horizontal(|ui| {
                    if self.session.bmi_calculation().is_some() && ui.button("Use This Value").clicked() {
                        self.session.use_calculated_bmi();
                        self.show_bmi_calculator = false;
                    }
                    if ui.button("Close").clicked() {
                        self.show_bmi_calculator = false;
                    }
                });
            });

        if save_settings {
            self.settings.save();
        }
    }

    fn show_hba1c_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("HbA1c Calculator")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Average blood glucose (mg/dL):");
                    ui.text_edit_singleline(&mut self.avg_glucose_input);
                });

                ui.horizontal(|ui| {
                    if ui.button("Calculate").clicked() {
                        self.hba1c_message = match self.session.calculate_hba1c(&self.avg_glucose_input) {
                            Ok(calc) => format!("Estimated HbA1c: {}% ({})", calc.hba1c, calc.category.label()),
                            Err(e) => e.user_message(),
                        };
                    }
                    if ui.button("Estimate From Form").clicked() {
                        self.hba1c_message = match self.session.estimate_hba1c_from_form() {
                            Ok(calc) => format!("Estimated HbA1c: {}% ({})", calc.hba1c, calc.category.label()),
                            Err(e) => e.user_message(),
                        };
                    }
                });

                match self.session.hba1c_calculation() {
                    Some(calc) => {
                        ui.colored_label(severity_color(calc.category.severity()), &self.hba1c_message);
                        ui.label(calc.category.description());
                    }
                    None if !self.hba1c_message.is_empty() => {
                        ui.colored_label(severity_color(Severity::Danger), &self.hba1c_message);
                    }
                    None => {}
                }

                ui.horizontal(|ui| {
                    if self.session.hba1c_calculation().is_some() && ui.button("Use This Value").clicked() {
                        self.session.use_calculated_hba1c();
                        self.show_hba1c_calculator = false;
                    }
                    if ui.button("Close").clicked() {
                        self.show_hba1c_calculator = false;
                    }
                });
            });
    }
}

/// Run the GUI application
pub fn run_gui(config: Config) -> Result<(), DiabRiskError> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([800.0, 600.0]),
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "Diabetes Risk Predictor",
        options,
        Box::new(|cc| Ok(Box::new(DiabRiskApp::new(cc, config)))),
    )
    .map_err(|e| DiabRiskError::Gui(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_json_shape() {
        let settings = AppSettings {
            height_unit: HeightUnit::In,
            weight_unit: WeightUnit::Lb,
            dark_mode: None,
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"height_unit":"in","weight_unit":"lb"}"#);
        let back: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.height_unit, HeightUnit::In);
        assert_eq!(back.dark_mode, None);
    }

    #[test]
    fn test_theme_choice_overrides_system() {
        let mut settings = AppSettings::default();
        assert!(settings.is_dark(None));
        assert!(settings.is_dark(Some(egui::Theme::Dark)));
        assert!(!settings.is_dark(Some(egui::Theme::Light)));

        settings.dark_mode = Some(true);
        assert!(settings.is_dark(Some(egui::Theme::Light)));
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains(r#""dark_mode":true"#));

        settings.dark_mode = Some(false);
        assert!(!settings.is_dark(Some(egui::Theme::Dark)));
    }

    #[test]
    fn test_prediction_colors_differ() {
        assert_ne!(prediction_color(Prediction::Diabetic), prediction_color(Prediction::NonDiabetic));
    }
}
