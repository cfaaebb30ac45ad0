// ********* Input data structures ***********

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};

use crate::vocabulary::{Label, NormalizationMode};

/// Errors raised when a grid of answers cannot be processed at all.
#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum GridError {
    #[snafu(display("The survey contains no rows"))]
    EmptyGrid,
    #[snafu(display("The survey contains no column with answers"))]
    NoColumns,
    #[snafu(display("Row {row} has {found} cells, expected {expected}"))]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// The free-text answers of a survey: rows of cells, one cell per column.
///
/// Invariant: every row has exactly one cell per column identifier.
/// Blank cells are expected to hold the `NoResponse` placeholder already.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResponseGrid {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResponseGrid {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<ResponseGrid, GridError> {
        ensure!(!columns.is_empty(), NoColumnsSnafu);
        for (idx, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == columns.len(),
                RaggedRowSnafu {
                    row: idx,
                    expected: columns.len(),
                    found: row.len(),
                }
            );
        }
        Ok(ResponseGrid { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// All the cells, row after row.
    pub fn cells(&self) -> impl Iterator<Item = &String> {
        self.rows.iter().flatten()
    }
}

// ******** Output data structures *********

/// The labels of a survey, shaped like the grid they were computed from.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LabelGrid {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Label>>,
}

impl LabelGrid {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Label> {
        self.rows.iter().flatten()
    }

    /// The labels of one column, top to bottom.
    pub fn column(&self, idx: usize) -> Vec<Label> {
        self.rows.iter().filter_map(|r| r.get(idx).cloned()).collect()
    }
}

/// Ordinal reading of the satisfaction percentage.
///
/// Serialized as the glyph shown to users.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualitativeState {
    #[serde(rename = "😠")]
    VeryDissatisfied,
    #[serde(rename = "😕")]
    Dissatisfied,
    #[serde(rename = "😐")]
    Neutral,
    #[serde(rename = "🙂")]
    Satisfied,
    #[serde(rename = "😄")]
    VerySatisfied,
}

impl QualitativeState {
    /// Buckets a 0-100 score. A score equal to a threshold falls in the lower bucket.
    pub fn from_score(score: f64) -> QualitativeState {
        if score <= 20.0 {
            QualitativeState::VeryDissatisfied
        } else if score <= 40.0 {
            QualitativeState::Dissatisfied
        } else if score <= 60.0 {
            QualitativeState::Neutral
        } else if score <= 80.0 {
            QualitativeState::Satisfied
        } else {
            QualitativeState::VerySatisfied
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            QualitativeState::VeryDissatisfied => "😠",
            QualitativeState::Dissatisfied => "😕",
            QualitativeState::Neutral => "😐",
            QualitativeState::Satisfied => "🙂",
            QualitativeState::VerySatisfied => "😄",
        }
    }
}

/// The outcome of one analysis, as stored in the history.
///
/// The field names follow the history files written by earlier versions of the tool.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    #[serde(rename = "fecha", with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "emocion")]
    pub dominant_label: Label,
    #[serde(rename = "emoji", default)]
    pub label_glyph: String,
    #[serde(rename = "porcentaje_satisfaccion")]
    pub satisfaction_percentage: f64,
    #[serde(rename = "estado_general")]
    pub qualitative_state: QualitativeState,
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

// ********* Configuration **********

/// Which view of the aggregation is reported.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AggregationMode {
    /// Append the current result to the history and report the history.
    History,
    /// Report the current result only. The history is left untouched.
    Snapshot,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyRules {
    /// Number of answers sent to the classifier in one call (1 to 10).
    pub batch_size: usize,
    pub normalization: NormalizationMode,
    pub aggregation_mode: AggregationMode,
    /// Number of entries kept in the history.
    pub history_size: usize,
}

pub const MAX_BATCH_SIZE: usize = 10;

impl SurveyRules {
    pub const DEFAULT_RULES: SurveyRules = SurveyRules {
        batch_size: MAX_BATCH_SIZE,
        normalization: NormalizationMode::Strict,
        aggregation_mode: AggregationMode::History,
        history_size: 2,
    };
}
