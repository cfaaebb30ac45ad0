use crate::survey::*;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "resultsDirectory")]
    pub results_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassifierSettings {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    #[serde(rename = "apiKeyVariable")]
    pub api_key_variable: Option<String>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
    #[serde(rename = "batchSize")]
    pub batch_size: Option<usize>,
    #[serde(rename = "maxAttempts")]
    pub max_attempts: Option<u32>,
    #[serde(rename = "baseDelayMillis")]
    pub base_delay_millis: Option<u64>,
    #[serde(rename = "delayStepMillis")]
    pub delay_step_millis: Option<u64>,
    #[serde(rename = "pacingMinMillis")]
    pub pacing_min_millis: Option<u64>,
    #[serde(rename = "pacingMaxMillis")]
    pub pacing_max_millis: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurveyRulesConfig {
    #[serde(rename = "labelMatching")]
    pub label_matching: Option<String>,
    #[serde(rename = "aggregationMode")]
    pub aggregation_mode: Option<String>,
    #[serde(rename = "historySize")]
    pub history_size: Option<usize>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurveyConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub rules: SurveyRulesConfig,
}

/// Everything needed to reach the classifier.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GeminiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_variable: String,
    pub timeout: Duration,
}

/// The validated configuration of a run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Settings {
    pub results_dir: PathBuf,
    pub gemini: GeminiSettings,
    pub policy: RetryPolicy,
    pub rules: SurveyRules,
}

pub const DEFAULT_RESULTS_DIR: &str = "resultados";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_API_KEY_VARIABLE: &str = "GEMINI_API_KEY";

pub fn read_config(path: &str) -> SurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: {:?}", contents);
    let config: SurveyConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    Ok(config)
}

fn millis(x: Option<u64>, default: Duration) -> Duration {
    x.map(Duration::from_millis).unwrap_or(default)
}

pub fn validate_config(config: &SurveyConfig) -> SurveyResult<Settings> {
    let c = &config.classifier;
    let default_policy = RetryPolicy::default_policy();
    let policy = RetryPolicy {
        max_attempts: match c.max_attempts {
            None => default_policy.max_attempts,
            Some(x) if x >= 1 => x,
            x => whatever!("maxAttempts must be at least 1, got {:?}", x),
        },
        base_delay: millis(c.base_delay_millis, default_policy.base_delay),
        delay_step: millis(c.delay_step_millis, default_policy.delay_step),
        pacing: millis(c.pacing_min_millis, *default_policy.pacing.start())
            ..=millis(c.pacing_max_millis, *default_policy.pacing.end()),
    };
    if policy.pacing.start() > policy.pacing.end() {
        whatever!("pacingMinMillis must not exceed pacingMaxMillis")
    }

    let rules = SurveyRules {
        batch_size: match c.batch_size {
            None => MAX_BATCH_SIZE,
            Some(x) if (1..=MAX_BATCH_SIZE).contains(&x) => x,
            x => whatever!(
                "batchSize must be between 1 and {}, got {:?}",
                MAX_BATCH_SIZE,
                x
            ),
        },
        normalization: match config.rules.label_matching.as_deref() {
            None | Some("strict") => NormalizationMode::Strict,
            Some("lenient") => NormalizationMode::Lenient,
            Some(x) => whatever!("Cannot use label matching mode {:?}", x),
        },
        aggregation_mode: match config.rules.aggregation_mode.as_deref() {
            None | Some("history") => AggregationMode::History,
            Some("snapshot") => AggregationMode::Snapshot,
            Some(x) => whatever!("Cannot use aggregation mode {:?}", x),
        },
        history_size: match config.rules.history_size {
            None => SurveyRules::DEFAULT_RULES.history_size,
            Some(x) if x >= 1 => x,
            x => whatever!("historySize must be at least 1, got {:?}", x),
        },
    };

    let gemini = GeminiSettings {
        endpoint: c
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        model: c.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        api_key_variable: c
            .api_key_variable
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY_VARIABLE.to_string()),
        timeout: Duration::from_secs(c.timeout_seconds.unwrap_or(60)),
    };

    Ok(Settings {
        results_dir: PathBuf::from(
            config
                .output_settings
                .results_directory
                .clone()
                .unwrap_or_else(|| DEFAULT_RESULTS_DIR.to_string()),
        ),
        gemini,
        policy,
        rules,
    })
}
