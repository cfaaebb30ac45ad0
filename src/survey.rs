use log::{debug, info, warn};

use emotion_survey::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::survey::config_reader::*;
use crate::survey::gemini::GeminiCollaborator;

pub mod config_reader;
pub mod gemini;
pub mod io_report;
pub mod io_xlsx;

pub const LABELS_FILE: &str = "emociones_resultado.xlsx";
pub const DOMINANT_FILE: &str = "emocion_global.txt";
pub const HISTORY_FILE: &str = "historial_emociones.json";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("The workbook {path} has no worksheet named {name}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("The survey cannot be analyzed: {source}"))]
    InvalidSurvey { source: GridError },
    #[snafu(display("Error writing the workbook {path}: {source}"))]
    WritingReport {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Error accessing {}: {source}", path.display()))]
    ResultsFile {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("archivos necesarios no encontrados"))]
    MissingResults {},
    #[snafu(display("The environment variable {variable} holding the API key is not set"))]
    MissingApiKey { variable: String },
    #[snafu(display("Cannot set up the classifier client: {source}"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Error updating the history: {source}"))]
    History { source: LedgerError },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

/// Where the files of a run are read and written.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResultsDir {
    pub root: PathBuf,
}

impl ResultsDir {
    /// Opens the directory, creating it when missing.
    pub fn open(root: &Path) -> SurveyResult<ResultsDir> {
        fs::create_dir_all(root).context(ResultsFileSnafu { path: root })?;
        Ok(ResultsDir {
            root: root.to_path_buf(),
        })
    }

    pub fn labels_path(&self) -> PathBuf {
        self.root.join(LABELS_FILE)
    }

    pub fn dominant_path(&self) -> PathBuf {
        self.root.join(DOMINANT_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }
}

/// The deterministic part of an analysis, suitable for comparison with a reference.
pub fn build_summary_js(labels: &LabelGrid, result: &AggregationResult) -> JSValue {
    let mut columns: Vec<JSValue> = Vec::new();
    for (name, counts) in column_counts(labels) {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (label, count) in counts {
            tally.insert(label.to_string(), json!(count));
        }
        columns.push(json!({"name": name, "counts": tally}));
    }
    let errors = labels.cells().filter(|l| **l == Label::Error).count();
    let no_response = labels.cells().filter(|l| **l == Label::NoResponse).count();
    json!({
        "rows": labels.row_count(),
        "columns": columns,
        "errors": errors,
        "noResponse": no_response,
        "dominantEmotion": result.dominant_label,
        "satisfactionPercentage": result.satisfaction_percentage,
        "generalState": result.qualitative_state,
    })
}

/// Classifies a survey and writes the labelled workbook and the dominant emotion.
///
/// The workbook always goes to the results directory, next to the dominant
/// emotion it was computed with. `extra_copy` receives the same workbook.
///
/// Returns the summary of the analysis.
pub fn analyze_grid<C: Collaborator, P: Pause>(
    grid: &ResponseGrid,
    client: &ClassifierClient<C, P>,
    rules: &SurveyRules,
    results: &ResultsDir,
    extra_copy: Option<&Path>,
) -> SurveyResult<JSValue> {
    let labels = classify_grid(grid, client, rules);
    let labels_p = results.labels_path();
    io_report::write_report(&labels, &labels_p)?;
    info!("Labelled workbook written to {:?}", labels_p);
    if let Some(p) = extra_copy.filter(|p| *p != labels_p.as_path()) {
        io_report::write_report(&labels, p)?;
        info!("Labelled workbook copied to {:?}", p);
    }

    let result = aggregate(&labels, Local::now().naive_local());
    if !result.dominant_label.is_sentinel() {
        let p = results.dominant_path();
        fs::write(&p, result.dominant_label.as_str()).context(ResultsFileSnafu { path: p.clone() })?;
    } else {
        warn!("No answer could be labelled, the dominant emotion is left unchanged");
    }
    Ok(build_summary_js(&labels, &result))
}

fn check_reference(summary: &JSValue, reference_path: &str) -> SurveyResult<()> {
    let contents = fs::read_to_string(reference_path).context(OpeningJsonSnafu {
        path: reference_path,
    })?;
    let summary_ref: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    info!("summary: {:?}", summary_ref);
    let pretty_ref = serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    let pretty_stats = serde_json::to_string_pretty(summary).context(ParsingJsonSnafu {})?;
    if pretty_ref != pretty_stats {
        warn!("Found differences with the reference string");
        print_diff(pretty_ref.as_str(), pretty_stats.as_str(), "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    Ok(())
}

fn api_key(settings: &Settings) -> SurveyResult<String> {
    let variable = settings.gemini.api_key_variable.clone();
    match std::env::var(&variable) {
        Ok(k) if !k.trim().is_empty() => Ok(k),
        _ => MissingApiKeySnafu { variable }.fail(),
    }
}

pub fn run_analysis(
    settings: &Settings,
    input: &str,
    worksheet: Option<&str>,
    out: Option<&str>,
    reference: Option<&str>,
) -> SurveyResult<JSValue> {
    let results = ResultsDir::open(&settings.results_dir)?;
    info!("Attempting to read survey {:?}", input);
    let grid = io_xlsx::read_survey(input, worksheet)?;
    info!(
        "Survey {:?}: {} rows, columns {:?}",
        input,
        grid.row_count(),
        grid.columns()
    );

    let collaborator = GeminiCollaborator::new(&settings.gemini, api_key(settings)?)?;
    let client = ClassifierClient::new(
        collaborator,
        settings.policy.clone(),
        settings.rules.normalization,
    );
    let out_path = out.map(PathBuf::from);
    let summary = analyze_grid(&grid, &client, &settings.rules, &results, out_path.as_deref())?;

    if let Some(reference_path) = reference {
        check_reference(&summary, reference_path)?;
    }
    Ok(summary)
}

/// Reads the results of the last analysis and reports them, recording them in the history.
pub fn run_emotion_report(settings: &Settings) -> SurveyResult<JSValue> {
    let results = ResultsDir::open(&settings.results_dir)?;
    let (dominant_p, labels_p) = (results.dominant_path(), results.labels_path());
    if !dominant_p.exists() || !labels_p.exists() {
        return MissingResultsSnafu {}.fail();
    }

    let text = fs::read_to_string(&dominant_p).context(ResultsFileSnafu {
        path: dominant_p.clone(),
    })?;
    let dominant = normalize(&text, NormalizationMode::Strict);
    debug!("run_emotion_report: dominant emotion {:?} -> {:?}", text, dominant);

    let labels = io_xlsx::read_label_grid(&labels_p.display().to_string())?;
    let pct = satisfaction_percentage(&labels);
    let current = build_result(dominant, pct, Local::now().naive_local());
    info!(
        "Current state: {} {} ({}%)",
        current.dominant_label,
        current.qualitative_state.glyph(),
        current.satisfaction_percentage
    );

    let ledger = HistoryLedger::new(&results.history_path(), settings.rules.history_size);
    debug!("run_emotion_report: history at {:?}", ledger.path());
    let reported = publish(current, settings.rules.aggregation_mode, &ledger).context(HistorySnafu {})?;
    serde_json::to_value(reported).context(ParsingJsonSnafu {})
}

/// Merges the configuration file with the command line.
pub fn settings_from_args(args: &Args) -> SurveyResult<Settings> {
    let config = match &args.config {
        Some(p) => read_config(p)?,
        None => SurveyConfig::default(),
    };
    debug!("config: {:?}", config);
    let mut settings = validate_config(&config)?;
    if let Some(dir) = &args.results_dir {
        settings.results_dir = PathBuf::from(dir);
    }
    match &args.command {
        Command::Analyze {
            batch_size, lenient, ..
        } => {
            if let Some(b) = batch_size {
                if !(1..=MAX_BATCH_SIZE).contains(b) {
                    whatever!("--batch-size must be between 1 and {}, got {}", MAX_BATCH_SIZE, b)
                }
                settings.rules.batch_size = *b;
            }
            if *lenient {
                settings.rules.normalization = NormalizationMode::Lenient;
            }
        }
        Command::Emotion { snapshot } => {
            if *snapshot {
                settings.rules.aggregation_mode = AggregationMode::Snapshot;
            }
        }
    }
    Ok(settings)
}

pub fn run(args: &Args) -> SurveyResult<JSValue> {
    let settings = settings_from_args(args)?;
    info!("settings: {:?}", settings);
    match &args.command {
        Command::Analyze {
            input,
            worksheet,
            out,
            reference,
            ..
        } => run_analysis(
            &settings,
            input,
            worksheet.as_deref(),
            out.as_deref(),
            reference.as_deref(),
        ),
        Command::Emotion { .. } => run_emotion_report(&settings),
    }
}
