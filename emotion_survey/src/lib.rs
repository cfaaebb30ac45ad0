pub mod builder;
mod classifier;
mod config;
mod ledger;
pub mod manual;
mod vocabulary;

use chrono::NaiveDateTime;
use log::{debug, info, warn};

pub use crate::classifier::*;
pub use crate::config::*;
pub use crate::ledger::*;
pub use crate::vocabulary::*;

/// Labels every answer of a survey.
///
/// The answers are read row after row and sent to the classifier in
/// consecutive batches of `rules.batch_size` (the last batch holds the
/// remainder). Batches may straddle rows. The labels are then cut back into
/// rows of `column_count` labels, so the result has the shape of the input.
///
/// Batches are sent one at a time, in order. Classifier failures never
/// surface here: they become `Error` labels.
pub fn classify_grid<C: Collaborator, P: Pause>(
    grid: &ResponseGrid,
    client: &ClassifierClient<C, P>,
    rules: &SurveyRules,
) -> LabelGrid {
    let batch_size = rules.batch_size.clamp(1, MAX_BATCH_SIZE);
    let cells: Vec<String> = grid.cells().cloned().collect();
    info!(
        "Classifying {} answers ({} rows, {} columns) in batches of {}",
        cells.len(),
        grid.row_count(),
        grid.column_count(),
        batch_size
    );

    let mut labels: Vec<Label> = Vec::with_capacity(cells.len());
    for (idx, batch) in cells.chunks(batch_size).enumerate() {
        let batch_labels = if batch_size == 1 {
            vec![client.classify_item(&batch[0])]
        } else {
            client.classify_batch(batch)
        };
        debug!("classify_grid: batch {}: {:?}", idx, batch_labels);
        labels.extend(batch_labels);
    }
    fit_labels(&mut labels, cells.len());

    // Blank answers are never labelled by the classifier.
    for (label, cell) in labels.iter_mut().zip(cells.iter()) {
        if *cell == NO_RESPONSE_TEXT {
            *label = Label::NoResponse;
        }
    }

    LabelGrid {
        columns: grid.columns().to_vec(),
        rows: reshape(labels, grid.column_count()),
    }
}

/// Makes sure there is exactly one label per answer; missing labels are `Error`.
fn fit_labels(labels: &mut Vec<Label>, answers: usize) {
    if labels.len() != answers {
        warn!("fit_labels: {} labels for {} answers", labels.len(), answers);
        labels.resize(answers, Label::Error);
    }
}

/// Cuts a flat list of labels into rows. A trailing partial row is dropped.
fn reshape(labels: Vec<Label>, column_count: usize) -> Vec<Vec<Label>> {
    if column_count == 0 {
        return Vec::new();
    }
    let chunks = labels.chunks_exact(column_count);
    if !chunks.remainder().is_empty() {
        warn!(
            "reshape: dropping {} labels that do not fill a row of {}",
            chunks.remainder().len(),
            column_count
        );
    }
    chunks.map(|c| c.to_vec()).collect()
}

/// The labels that carry a signal, in reading order.
fn signal_labels(grid: &LabelGrid) -> Vec<Label> {
    grid.cells().filter(|l| !l.is_sentinel()).cloned().collect()
}

/// The most frequent label that is not a sentinel.
///
/// Among equally frequent labels, the one read first wins.
/// `Error` when the grid carries no signal at all.
pub fn dominant_label(grid: &LabelGrid) -> Label {
    // (label, count) in order of first appearance
    let mut tally: Vec<(Label, usize)> = Vec::new();
    for l in signal_labels(grid) {
        match tally.iter_mut().find(|(t, _)| *t == l) {
            Some(e) => e.1 += 1,
            None => tally.push((l, 1)),
        }
    }
    let mut best: Option<(Label, usize)> = None;
    for (l, c) in tally {
        if best.map_or(true, |(_, bc)| c > bc) {
            best = Some((l, c));
        }
    }
    best.map(|(l, _)| l).unwrap_or(Label::Error)
}

/// The mean label weight mapped from [-1, 1] to [0, 100], with two decimals.
///
/// 0 when the grid carries no signal.
pub fn satisfaction_percentage(grid: &LabelGrid) -> f64 {
    let weights: Vec<f64> = signal_labels(grid).iter().filter_map(|l| l.weight()).collect();
    if weights.is_empty() {
        return 0.0;
    }
    let mean = weights.iter().sum::<f64>() / weights.len() as f64;
    let pct = (mean + 1.0) / 2.0 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Summarizes a labelled survey.
pub fn aggregate(grid: &LabelGrid, timestamp: NaiveDateTime) -> AggregationResult {
    let dominant = dominant_label(grid);
    let pct = satisfaction_percentage(grid);
    build_result(dominant, pct, timestamp)
}

/// Assembles a result from its parts, deriving the glyph and the qualitative state.
pub fn build_result(dominant: Label, pct: f64, timestamp: NaiveDateTime) -> AggregationResult {
    AggregationResult {
        timestamp,
        dominant_label: dominant,
        label_glyph: dominant.glyph().to_string(),
        satisfaction_percentage: pct,
        qualitative_state: QualitativeState::from_score(pct),
    }
}

/// For every column, the number of occurrences of each valid label, in canonical order.
pub fn column_counts(grid: &LabelGrid) -> Vec<(String, Vec<(Label, u64)>)> {
    grid.columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let col = grid.column(idx);
            let counts = LABELS
                .iter()
                .map(|l| (*l, col.iter().filter(|c| *c == l).count() as u64))
                .collect();
            (name.clone(), counts)
        })
        .collect()
}

/// Reports a result according to the aggregation mode.
///
/// In history mode the result is recorded and the whole history returned.
pub fn publish(
    result: AggregationResult,
    mode: AggregationMode,
    ledger: &HistoryLedger,
) -> Result<Vec<AggregationResult>, LedgerError> {
    match mode {
        AggregationMode::History => ledger.record(result),
        AggregationMode::Snapshot => Ok(vec![result]),
    }
}

#[cfg(test)]
mod tests {
    use super::classifier::testing::*;
    use super::*;
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn grid(rows: usize, cols: usize) -> ResponseGrid {
        let columns = (0..cols).map(|c| format!("P{}", c + 1)).collect();
        let cells = (0..rows)
            .map(|r| (0..cols).map(|c| format!("r{}c{}", r, c)).collect())
            .collect();
        ResponseGrid::new(columns, cells).unwrap()
    }

    fn label_grid(rows: Vec<Vec<Label>>) -> LabelGrid {
        let n = rows.first().map_or(1, |r| r.len());
        LabelGrid {
            columns: (0..n).map(|c| c.to_string()).collect(),
            rows,
        }
    }

    fn client<F: Fn(&str) -> Label>(pick: F) -> ClassifierClient<ScriptedCollaborator<F>, RecordingPause> {
        ClassifierClient::with_pause(
            ScriptedCollaborator::new(pick),
            quiet_policy(),
            NormalizationMode::Strict,
            RecordingPause::default(),
        )
    }

    #[test]
    fn shape_is_preserved_for_any_grid() {
        let c = client(|_| Label::Engagement);
        for rows in 0..7 {
            for cols in 1..6 {
                let g = grid(rows, cols);
                let labels = classify_grid(&g, &c, &SurveyRules::DEFAULT_RULES);
                assert_eq!(labels.row_count(), rows);
                assert!(labels.rows.iter().all(|r| r.len() == cols));
                assert_eq!(labels.cells().count(), rows * cols);
            }
        }
    }

    #[test]
    fn batches_are_cut_every_ten_answers() {
        let c = client(|_| Label::Hope);
        classify_grid(&grid(7, 3), &c, &SurveyRules::DEFAULT_RULES);
        // 21 answers: 10 + 10 + 1
        assert_eq!(c.collaborator().calls.get(), 3);
    }

    #[test]
    fn labels_follow_their_cells_across_batches() {
        // Each answer is labelled from its column: the label must land back in that column.
        let c = client(|text| match text.chars().last() {
            Some('0') => Label::Satisfaction,
            Some('1') => Label::Stress,
            _ => Label::Hope,
        });
        let labels = classify_grid(&grid(4, 3), &c, &SurveyRules::DEFAULT_RULES);
        assert_eq!(labels.row_count(), 4);
        assert_eq!(labels.column_count(), 3);
        for row in labels.rows.iter() {
            assert_eq!(row, &vec![Label::Satisfaction, Label::Stress, Label::Hope]);
        }
        let result = aggregate(&labels, now());
        // Four of each: the first read wins the tie.
        assert_eq!(result.dominant_label, Label::Satisfaction);
        // mean = (1 - 1 + 0.8) / 3 = 0.2666.. -> 63.33
        assert_eq!(result.satisfaction_percentage, 63.33);
        assert_eq!(result.qualitative_state, QualitativeState::Satisfied);
        assert_eq!(result.label_glyph, "😊");
    }

    #[test]
    fn single_answer_batches_use_the_item_prompt() {
        let c = client(|_| Label::Indifference);
        let rules = SurveyRules {
            batch_size: 1,
            ..SurveyRules::DEFAULT_RULES
        };
        let labels = classify_grid(&grid(2, 2), &c, &rules);
        assert_eq!(labels.rows, vec![vec![Label::Indifference; 2]; 2]);
        assert_eq!(c.collaborator().calls.get(), 4);
    }

    #[test]
    fn broken_classifier_gives_an_all_error_grid() {
        let c = ClassifierClient::with_pause(
            BrokenCollaborator { calls: Cell::new(0) },
            quiet_policy(),
            NormalizationMode::Strict,
            RecordingPause::default(),
        );
        let labels = classify_grid(&grid(4, 3), &c, &SurveyRules::DEFAULT_RULES);
        assert_eq!(labels.rows, vec![vec![Label::Error; 3]; 4]);
        let result = aggregate(&labels, now());
        assert_eq!(result.satisfaction_percentage, 0.0);
        assert_eq!(result.dominant_label, Label::Error);
        assert_eq!(result.qualitative_state, QualitativeState::VeryDissatisfied);
    }

    #[test]
    fn blank_answers_are_marked_as_no_response() {
        let g = ResponseGrid::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["bien".to_string(), NO_RESPONSE_TEXT.to_string()]],
        )
        .unwrap();
        let labels = classify_grid(&g, &client(|_| Label::Appreciation), &SurveyRules::DEFAULT_RULES);
        assert_eq!(labels.rows, vec![vec![Label::Appreciation, Label::NoResponse]]);
    }

    #[test]
    fn label_count_always_matches_the_answers() {
        let mut short = vec![Label::Hope];
        fit_labels(&mut short, 3);
        assert_eq!(short, vec![Label::Hope, Label::Error, Label::Error]);
        let mut long = vec![Label::Hope; 4];
        fit_labels(&mut long, 2);
        assert_eq!(long, vec![Label::Hope; 2]);
    }

    #[test]
    fn reshape_drops_a_trailing_partial_row() {
        let rows = reshape(vec![Label::Hope; 7], 3);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn sentinels_carry_no_signal() {
        let g = label_grid(vec![
            vec![Label::Error, Label::NoResponse],
            vec![Label::NoResponse, Label::Error],
        ]);
        assert_eq!(satisfaction_percentage(&g), 0.0);
        assert_eq!(dominant_label(&g), Label::Error);

        let g = label_grid(vec![
            vec![Label::Error, Label::Stress],
            vec![Label::Error, Label::Stress],
            vec![Label::Error, Label::Appreciation],
        ]);
        assert_eq!(dominant_label(&g), Label::Stress);
        // mean = (-1 - 1 + 1) / 3 -> 33.33
        assert_eq!(satisfaction_percentage(&g), 33.33);
    }

    #[test]
    fn qualitative_thresholds_are_inclusive_below() {
        assert_eq!(QualitativeState::from_score(0.0), QualitativeState::VeryDissatisfied);
        assert_eq!(QualitativeState::from_score(20.0), QualitativeState::VeryDissatisfied);
        assert_eq!(QualitativeState::from_score(20.01), QualitativeState::Dissatisfied);
        assert_eq!(QualitativeState::from_score(40.0), QualitativeState::Dissatisfied);
        assert_eq!(QualitativeState::from_score(60.0), QualitativeState::Neutral);
        assert_eq!(QualitativeState::from_score(80.0), QualitativeState::Satisfied);
        assert_eq!(QualitativeState::from_score(80.5), QualitativeState::VerySatisfied);
        assert_eq!(QualitativeState::from_score(100.0), QualitativeState::VerySatisfied);
    }

    #[test]
    fn column_counts_follow_the_canonical_order() {
        let g = label_grid(vec![
            vec![Label::Stress, Label::Hope],
            vec![Label::Satisfaction, Label::Error],
            vec![Label::Stress, Label::NoResponse],
        ]);
        let counts = column_counts(&g);
        assert_eq!(counts.len(), 2);
        let first: Vec<(Label, u64)> = counts[0].1.iter().filter(|(_, c)| *c > 0).cloned().collect();
        assert_eq!(first, vec![(Label::Satisfaction, 1), (Label::Stress, 2)]);
        assert_eq!(counts[1].1.iter().map(|(_, c)| c).sum::<u64>(), 1);
    }

    #[test]
    fn snapshot_mode_leaves_the_history_alone() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = HistoryLedger::new(&dir.path().join("historial.json"), 2);
        let r = build_result(Label::Hope, 90.0, now());
        let out = publish(r.clone(), AggregationMode::Snapshot, &ledger).unwrap();
        assert_eq!(out, vec![r.clone()]);
        assert!(ledger.load().entries.is_empty());
        let out = publish(r.clone(), AggregationMode::History, &ledger).unwrap();
        assert_eq!(out, vec![r]);
    }
}
