// Primitives for reading Excel workbooks.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::survey::io_report::LABELS_SHEET;
use crate::survey::*;
use emotion_survey::builder::GridBuilder;

/// The text of a cell, `None` when the cell is empty.
fn cell_text(cell: &DataType) -> Option<String> {
    match cell {
        DataType::Empty => None,
        DataType::String(s) => Some(s.clone()),
        DataType::Float(f) => Some(f.to_string()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Bool(b) => Some(b.to_string()),
        other => {
            debug!("cell_text: reading {:?} as text", other);
            Some(format!("{:?}", other))
        }
    }
}

fn header_names(header: &[DataType]) -> Vec<String> {
    header
        .iter()
        .enumerate()
        .map(|(idx, c)| match cell_text(c) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => format!("Columna {}", idx + 1),
        })
        .collect()
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> SurveyResult<Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet_name);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        let wrange = workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let wrange = workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    }
}

/// Reads the answers of a survey: the first row holds the questions.
///
/// Rows without any answer are skipped, as are the columns without any answer.
pub fn read_survey(path: &str, worksheet_name: Option<&str>) -> SurveyResult<ResponseGrid> {
    let wrange = get_range(path, worksheet_name)?;
    let mut iter = wrange.rows();
    let header = match iter.next() {
        Some(h) => h,
        None => {
            return Err(SurveyError::InvalidSurvey {
                source: GridError::EmptyGrid,
            })
        }
    };
    let columns = header_names(header);
    debug!("read_survey: header: {:?}", columns);

    let mut builder = GridBuilder::new(&columns);
    for (idx, row) in iter.enumerate() {
        let cells: Vec<Option<String>> = row.iter().map(cell_text).collect();
        if cells.iter().all(|c| c.as_deref().map_or(true, |s| s.trim().is_empty())) {
            debug!("read_survey: skipping empty row {}", idx + 2);
            continue;
        }
        builder.add_row(&cells).context(InvalidSurveySnafu {})?;
    }
    builder.drop_empty_columns().build().context(InvalidSurveySnafu {})
}

/// Reads back a workbook written by `io_report::write_report`.
///
/// Cells outside of the vocabulary are read as `Error`, empty cells as `NoResponse`.
pub fn read_label_grid(path: &str) -> SurveyResult<LabelGrid> {
    let wrange = match get_range(path, Some(LABELS_SHEET)) {
        Ok(r) => r,
        Err(SurveyError::MissingWorksheet { .. }) => get_range(path, None)?,
        Err(e) => return Err(e),
    };
    let mut iter = wrange.rows();
    let columns = iter.next().map(header_names).unwrap_or_default();
    let rows: Vec<Vec<Label>> = iter
        .map(|row| {
            row.iter()
                .map(|c| match cell_text(c) {
                    Some(s) => normalize(&s, NormalizationMode::Strict),
                    None => Label::NoResponse,
                })
                .collect()
        })
        .collect();
    debug!("read_label_grid: {} rows, columns {:?}", rows.len(), columns);
    Ok(LabelGrid { columns, rows })
}
