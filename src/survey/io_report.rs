// Writes the labelled workbook and its charts.

use rust_xlsxwriter::{Chart, ChartFont, ChartType, Format, Workbook, Worksheet, XlsxError};

use crate::survey::*;

pub const LABELS_SHEET: &str = "Emociones";
pub const COUNTS_SHEET: &str = "Distribución";

// Chart size in pixels and vertical distance between two charts, in rows.
const CHART_WIDTH: u32 = 10 * 96;
const CHART_HEIGHT: u32 = 8 * 96;
const CHART_STEP: u32 = 40;

fn col_num(idx: usize) -> SurveyResult<u16> {
    match u16::try_from(idx) {
        Ok(c) => Ok(c),
        Err(_) => whatever!("Too many columns to write: {}", idx + 1),
    }
}

fn row_num(idx: usize) -> SurveyResult<u32> {
    match u32::try_from(idx) {
        Ok(r) => Ok(r),
        Err(_) => whatever!("Too many rows to write: {}", idx + 1),
    }
}

/// The count table the charts refer to: one row per label, one column per question.
fn build_counts_sheet(labels: &LabelGrid, header: &Format) -> SurveyResult<Worksheet> {
    let mut ws = Worksheet::new();
    fill_counts_sheet(&mut ws, labels, header).context(WritingReportSnafu { path: COUNTS_SHEET })?;
    Ok(ws)
}

fn fill_counts_sheet(ws: &mut Worksheet, labels: &LabelGrid, header: &Format) -> Result<(), XlsxError> {
    ws.set_name(COUNTS_SHEET)?;
    ws.write_string_with_format(0, 0, "emoción", header)?;
    for (idx, label) in LABELS.iter().enumerate() {
        ws.write_string(idx as u32 + 1, 0, label.as_str())?;
    }
    for (col_idx, (name, counts)) in column_counts(labels).iter().enumerate() {
        let col = col_idx as u16 + 1;
        ws.write_string_with_format(0, col, name, header)?;
        for (idx, (_, count)) in counts.iter().enumerate() {
            ws.write_number(idx as u32 + 1, col, *count as f64)?;
        }
    }
    Ok(())
}

fn column_chart(name: &str, col: u16) -> Chart {
    let last_row = LABELS.len() as u32;
    let mut chart = Chart::new(ChartType::Column);
    chart
        .add_series()
        .set_categories((COUNTS_SHEET, 1, 0, last_row, 0))
        .set_values((COUNTS_SHEET, 1, col, last_row, col));
    chart.title().set_name(&format!("Distribución: {}", name));
    chart.legend().set_hidden();
    chart.x_axis().set_font(&ChartFont::new().set_rotation(-45));
    chart.set_width(CHART_WIDTH).set_height(CHART_HEIGHT);
    chart
}

fn fill_labels_sheet(ws: &mut Worksheet, labels: &LabelGrid, header: &Format) -> SurveyResult<()> {
    let path = LABELS_SHEET;
    ws.set_name(LABELS_SHEET).context(WritingReportSnafu { path })?;
    for (col_idx, name) in labels.columns.iter().enumerate() {
        ws.write_string_with_format(0, col_num(col_idx)?, name, header)
            .context(WritingReportSnafu { path })?;
    }
    for (row_idx, row) in labels.rows.iter().enumerate() {
        for (col_idx, label) in row.iter().enumerate() {
            ws.write_string(row_num(row_idx + 1)?, col_num(col_idx)?, label.as_str())
                .context(WritingReportSnafu { path })?;
        }
    }

    // Charts go below the data, one per question.
    let first_anchor = row_num(labels.row_count() + 2)?;
    for (idx, name) in labels.columns.iter().enumerate() {
        let chart = column_chart(name, col_num(idx + 1)?);
        let anchor = first_anchor + row_num(idx)? * CHART_STEP;
        ws.insert_chart(anchor, 0, &chart)
            .context(WritingReportSnafu { path })?;
    }
    Ok(())
}

/// Writes the labels, one column per question, with a column chart of the label
/// frequencies of every question.
pub fn write_report(labels: &LabelGrid, path: &Path) -> SurveyResult<()> {
    let path_s = path.display().to_string();
    debug!("write_report: {} rows to {:?}", labels.row_count(), path_s);
    let header = Format::new().set_bold();

    let mut labels_ws = Worksheet::new();
    fill_labels_sheet(&mut labels_ws, labels, &header)?;
    let counts_ws = build_counts_sheet(labels, &header)?;

    let mut workbook = Workbook::new();
    workbook.push_worksheet(labels_ws);
    workbook.push_worksheet(counts_ws);
    workbook
        .save(path)
        .context(WritingReportSnafu { path: path_s })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::io_xlsx::read_label_grid;
    use calamine::{open_workbook, DataType, Reader, Xlsx};
    use tempfile::tempdir;

    fn labels() -> LabelGrid {
        LabelGrid {
            columns: vec!["P1".to_string(), "P2".to_string()],
            rows: vec![
                vec![Label::Stress, Label::NoResponse],
                vec![Label::Hope, Label::Error],
                vec![Label::Stress, Label::Appreciation],
            ],
        }
    }

    #[test]
    fn labels_survive_a_round_trip() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("emociones_resultado.xlsx");
        write_report(&labels(), &p).unwrap();
        let back = read_label_grid(&p.display().to_string()).unwrap();
        assert_eq!(back, labels());
    }

    #[test]
    fn counts_sheet_follows_the_canonical_order() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("emociones_resultado.xlsx");
        write_report(&labels(), &p).unwrap();
        let mut workbook: Xlsx<_> = open_workbook(&p).unwrap();
        let range = workbook.worksheet_range(COUNTS_SHEET).unwrap().unwrap();
        assert_eq!(range.get_value((0, 1)), Some(&DataType::String("P1".to_string())));
        // Row 5 is "estrés", the fifth label.
        assert_eq!(range.get_value((5, 0)), Some(&DataType::String("estrés".to_string())));
        assert_eq!(range.get_value((5, 1)), Some(&DataType::Float(2.0)));
        assert_eq!(range.get_value((6, 1)), Some(&DataType::Float(1.0)));
        // Sentinels are not charted.
        assert_eq!(range.height(), LABELS.len() + 1);
    }
}
