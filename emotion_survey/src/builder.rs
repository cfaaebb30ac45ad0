pub use crate::config::*;
use crate::vocabulary::NO_RESPONSE_TEXT;

/// A builder for assembling the answers of a survey.
///
/// Readers push rows as they come; blank cells are filled with the
/// placeholder text when the grid is built.
///
/// ```
/// use emotion_survey::builder::GridBuilder;
/// # use emotion_survey::GridError;
///
/// let mut builder = GridBuilder::new(&["¿Cómo te sientes?".to_string(), "Comentarios".to_string()]);
/// builder.add_row(&[Some("Muy bien".to_string()), None])?;
///
/// let grid = builder.drop_empty_columns().build()?;
/// assert_eq!(grid.column_count(), 1);
///
/// # Ok::<(), GridError>(())
/// ```
pub struct GridBuilder {
    pub(crate) _columns: Vec<String>,
    pub(crate) _rows: Vec<Vec<Option<String>>>,
}

fn is_blank(cell: &Option<String>) -> bool {
    cell.as_deref().map_or(true, |s| s.trim().is_empty())
}

impl GridBuilder {
    pub fn new(columns: &[String]) -> GridBuilder {
        GridBuilder {
            _columns: columns.to_vec(),
            _rows: Vec::new(),
        }
    }

    /// Adds a row of answers. `None` or whitespace marks a missing answer.
    ///
    /// Short rows are padded with missing answers; longer rows are rejected.
    pub fn add_row(&mut self, cells: &[Option<String>]) -> Result<(), GridError> {
        if cells.len() > self._columns.len() {
            return Err(GridError::RaggedRow {
                row: self._rows.len(),
                expected: self._columns.len(),
                found: cells.len(),
            });
        }
        let mut row = cells.to_vec();
        row.resize(self._columns.len(), None);
        self._rows.push(row);
        Ok(())
    }

    /// Removes the columns in which every answer is missing.
    pub fn drop_empty_columns(self) -> GridBuilder {
        let keep: Vec<usize> = (0..self._columns.len())
            .filter(|idx| self._rows.iter().any(|r| !is_blank(&r[*idx])))
            .collect();
        GridBuilder {
            _columns: keep.iter().map(|idx| self._columns[*idx].clone()).collect(),
            _rows: self
                ._rows
                .iter()
                .map(|r| keep.iter().map(|idx| r[*idx].clone()).collect())
                .collect(),
        }
    }

    pub fn build(self) -> Result<ResponseGrid, GridError> {
        if self._rows.is_empty() {
            return Err(GridError::EmptyGrid);
        }
        let rows: Vec<Vec<String>> = self
            ._rows
            .into_iter()
            .map(|r| {
                r.into_iter()
                    .map(|c| match c {
                        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
                        _ => NO_RESPONSE_TEXT.to_string(),
                    })
                    .collect()
            })
            .collect();
        ResponseGrid::new(self._columns, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn blank_cells_become_the_placeholder() {
        let mut b = GridBuilder::new(&cols(&["a", "b"]));
        b.add_row(&[Some("  hola ".to_string()), Some("   ".to_string())]).unwrap();
        b.add_row(&[None]).unwrap();
        let g = b.build().unwrap();
        assert_eq!(
            g.rows(),
            &[
                vec!["hola".to_string(), NO_RESPONSE_TEXT.to_string()],
                vec![NO_RESPONSE_TEXT.to_string(), NO_RESPONSE_TEXT.to_string()],
            ]
        );
    }

    #[test]
    fn empty_columns_are_dropped() {
        let mut b = GridBuilder::new(&cols(&["id", "vacía", "texto"]));
        b.add_row(&[Some("1".to_string()), None, Some("bien".to_string())]).unwrap();
        b.add_row(&[Some("2".to_string()), Some(" ".to_string()), None]).unwrap();
        let g = b.drop_empty_columns().build().unwrap();
        assert_eq!(g.columns(), &cols(&["id", "texto"]));
        assert_eq!(g.row_count(), 2);
    }

    #[test]
    fn rejects_invalid_shapes() {
        let mut b = GridBuilder::new(&cols(&["a"]));
        assert!(matches!(
            b.add_row(&[None, None]),
            Err(GridError::RaggedRow { expected: 1, found: 2, .. })
        ));
        assert_eq!(b.build().unwrap_err(), GridError::EmptyGrid);

        let mut b = GridBuilder::new(&cols(&["a"]));
        b.add_row(&[None]).unwrap();
        assert_eq!(b.drop_empty_columns().build().unwrap_err(), GridError::NoColumns);
    }
}
