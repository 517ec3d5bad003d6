use std::collections::HashSet;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;

use super::open_text;
use crate::runtime::Error;

///////////////////////////////
/// Whitelist of accepted cell barcodes
#[derive(Clone, Debug, Default)]
pub struct CellList {
    cells: HashSet<String>,
}
impl CellList {
    pub fn new<I, S>(cells: I) -> CellList
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CellList {
            cells: cells.into_iter().map(|c| c.into()).collect(),
        }
    }

    /// One barcode per line; only the first comma or tab separated field is used
    pub fn from_file(path: &Path) -> anyhow::Result<CellList> {
        let reader = BufReader::new(open_text(path)?);
        let mut cells = HashSet::new();
        for line in reader.lines() {
            let line =
                line.with_context(|| format!("Failed to read cell list {}", path.display()))?;
            if let Some(cell) = parse_cell_field(&line) {
                cells.insert(cell.to_string());
            }
        }

        if cells.is_empty() {
            return Err(Error::file_not_valid(path, Some("no cell barcodes found")).into());
        }
        Ok(CellList { cells })
    }

    pub fn contains(&self, cell: &str) -> bool {
        self.cells.contains(cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

fn parse_cell_field(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let field = line
        .split(|c| c == ',' || c == '\t')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"');
    if field.is_empty() {
        None
    } else {
        Some(field)
    }
}
