//! Diabetes Risk Predictor
//!
//! Collects health parameters, estimates BMI and HbA1c, asks an external
//! prediction service for a diabetes risk result and keeps a short local
//! history of saved predictions.
//!
//! Usage:
//!   diabrisk              - Launch GUI
//!   diabrisk predict ...  - Predict from the command line
//!   diabrisk --help       - Show help
//!   DIABRISK_DBG=1 diabrisk predict ... - Enable debug output

mod classify;
mod client;
mod config;
mod error;
mod formulas;
mod gui;
mod history;
mod model;
mod session;
mod storage;
mod units;

use std::env;

use chrono::Utc;
use log::{info, warn};

use crate::client::PredictionClient;
use crate::config::{config_file_path, default_database_path, ensure_data_dir, get_data_dir, Config};
use crate::error::DiabRiskError;
use crate::history::HistoryStore;
use crate::model::FormInput;
use crate::session::{Completion, Session};
use crate::storage::SqliteStore;
use crate::units::{HeightUnit, WeightUnit};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), DiabRiskError> {
    let args: Vec<String> = env::args().collect();

    // Check for debug mode
    let debug_mode = env::var("DIABRISK_DBG").is_ok();

    // Initialize logger
    if debug_mode {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp(None)
            .init();
    }

    // Ensure data directory exists
    if let Err(e) = ensure_data_dir() {
        eprintln!("Warning: Could not create data directory: {}", e);
    }

    // Create default config if it doesn't exist
    let cfg_path = config_file_path();
    if !cfg_path.exists() {
        if let Err(e) = Config::create_default(&cfg_path) {
            warn!("Could not create default config: {}", e);
        }
    }

    // Try loading config from data directory first, then current directory
    let config = Config::load(config_file_path())
        .or_else(|_| Config::load("config.txt"))
        .unwrap_or_else(|e| {
            warn!("Could not load config: {}. Using defaults.", e);
            Config::default()
        });

    let rest: Vec<&str> = args.iter().skip(2).map(|s| s.as_str()).collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("predict") => cmd_predict(&config, &rest)?,
        Some("bmi") => cmd_bmi(&rest)?,
        Some("hba1c") => cmd_hba1c(&rest)?,
        Some("history") => cmd_history(&config, &rest)?,
        Some("--help") | Some("-h") | Some("help") => print_help(),
        Some("--version") | Some("-V") => {
            println!("diabrisk {}", env!("CARGO_PKG_VERSION"));
        }
        Some("path") | Some("paths") => cmd_show_paths(&config),
        Some(other) => {
            print_help();
            return Err(DiabRiskError::InvalidInput(format!("Unknown command '{}'", other)));
        }
        None => gui::run_gui(config)?,
    }

    Ok(())
}

fn open_history(config: &Config) -> Result<HistoryStore<SqliteStore>, DiabRiskError> {
    Ok(HistoryStore::new(SqliteStore::new(config.database_path())?))
}

fn usage(msg: &str) -> DiabRiskError {
    DiabRiskError::InvalidInput(format!("usage: {}", msg))
}

/// Predict from the command line, optionally saving the result
fn cmd_predict(config: &Config, args: &[&str]) -> Result<(), DiabRiskError> {
    let save = args.contains(&"--save");
    let fields: Vec<&str> = args.iter().copied().filter(|a| *a != "--save").collect();
    let [age, bmi, hba1c, glucose, gender, smoking] = fields.as_slice() else {
        return Err(usage("diabrisk predict <age> <bmi> <hba1c> <glucose> <Male|Female> <Yes|No> [--save]"));
    };

    let mut session = Session::new();
    session.form = FormInput {
        age: age.to_string(),
        bmi: bmi.to_string(),
        hba1c: hba1c.to_string(),
        blood_glucose: glucose.to_string(),
        gender: gender.parse()?,
        smoking: Some(smoking.parse()?),
    };

    info!("Requesting prediction from {}", config.endpoint);
    let client = PredictionClient::http(config.endpoint.clone(), config.timeout)?;
    let outcome = match session.submit(&client)? {
        Completion::Applied(outcome) => outcome,
        Completion::Stale => return Ok(()),
    };

    eprintln!("Prediction: {}", outcome.prediction);
    if let Some(confidence) = &outcome.confidence {
        eprintln!("Confidence: {}", confidence);
    }
    eprintln!("{}", outcome.prediction.explanation());

    if save {
        let mut history = open_history(config)?;
        let record = session.save_result(&mut history, Utc::now())?;
        eprintln!("Saved as {}", record.id);
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn cmd_bmi(args: &[&str]) -> Result<(), DiabRiskError> {
    let [height, height_unit, weight, weight_unit] = args else {
        return Err(usage("diabrisk bmi <height> <cm|in> <weight> <kg|lb>"));
    };
    let height_unit: HeightUnit = height_unit.parse()?;
    let weight_unit: WeightUnit = weight_unit.parse()?;

    let mut session = Session::new();
    let calc = session.calculate_bmi(height, height_unit, weight, weight_unit)?;
    println!("BMI: {} ({})", calc.bmi, calc.category.label());
    Ok(())
}

fn cmd_hba1c(args: &[&str]) -> Result<(), DiabRiskError> {
    let mut session = Session::new();
    let calc = match args {
        [glucose] => session.calculate_hba1c(glucose)?,
        [glucose, age, bmi, gender, smoking] => {
            session.form.blood_glucose = glucose.to_string();
            session.form.age = age.to_string();
            session.form.bmi = bmi.to_string();
            session.form.gender = gender.parse()?;
            session.form.smoking = Some(smoking.parse()?);
            session.estimate_hba1c_from_form()?
        }
        _ => {
            return Err(usage(
                "diabrisk hba1c <glucose> [<age> <bmi> <Male|Female> <Yes|No>]",
            ))
        }
    };
    println!("Estimated HbA1c: {}% ({})", calc.hba1c, calc.category.label());
    println!("{}", calc.category.description());
    Ok(())
}

fn cmd_history(config: &Config, args: &[&str]) -> Result<(), DiabRiskError> {
    let history = open_history(config)?;
    match args {
        [] | ["list"] => {
            let records = history.list();
            eprintln!("{} of {} saved predictions", records.len(), history.capacity());
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        ["show", id] => {
            let record = history
                .find_by_id(id)
                .ok_or_else(|| DiabRiskError::NotFound(format!("History item {}", id)))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        ["delete", id] => {
            if history.delete_by_id(id)? {
                eprintln!("Deleted {}", id);
            } else {
                eprintln!("No history item {}", id);
            }
        }
        _ => return Err(usage("diabrisk history [list | show <id> | delete <id>]")),
    }
    Ok(())
}

/// Show data paths
fn cmd_show_paths(config: &Config) {
    println!("Diabetes Risk Predictor Data Paths:");
    println!("  Data directory:  {}", get_data_dir().display());
    println!("  Database:        {}", config.database_path().display());
    println!("  Config file:     {}", config_file_path().display());
    println!("  Endpoint:        {}", config.endpoint);
}

fn print_help() {
    eprintln!("Diabetes Risk Predictor v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  diabrisk                                   Launch GUI application");
    eprintln!("  diabrisk predict <age> <bmi> <hba1c> <glucose> <gender> <smoking> [--save]");
    eprintln!("                                             Predict diabetes risk");
    eprintln!("  diabrisk bmi <height> <cm|in> <weight> <kg|lb>");
    eprintln!("                                             BMI calculator");
    eprintln!("  diabrisk hba1c <glucose> [<age> <bmi> <gender> <smoking>]");
    eprintln!("                                             HbA1c calculator");
    eprintln!("  diabrisk history [list|show <id>|delete <id>]");
    eprintln!("                                             Saved predictions");
    eprintln!("  diabrisk path                              Show data file locations");
    eprintln!("  diabrisk help                              Show this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("  DIABRISK_DBG=1              Enable debug output");
    eprintln!();
    eprintln!("DATA LOCATIONS:");
    eprintln!("  Database:  {}", default_database_path().display());
    eprintln!("  Config:    {}", config_file_path().display());
}
