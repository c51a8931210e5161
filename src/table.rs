//! Flat tables and delimited-text persistence
//!
//! A [`Table`] is a list of [`Record`]s plus the union of their column names in
//! first-seen order. Cells are written as text: strings verbatim, `null` or
//! absent as an empty cell, nested objects and arrays as compact JSON.

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::mem::take;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::flatten::{self, Record, cell_text};

/// Column holding the `season_round` composite key
pub const RACE_ID: &str = "race_id";

/// Suffix given to a right-hand column whose name already exists on the left of a join
pub const JOIN_SUFFIX: &str = "_right";

/// Ordered rows with a stable column set
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    /// Build a table; columns are collected in first-seen order across all rows
    pub fn from_records(rows: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    /// Column names in output order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in insertion order
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Take the rows back out
    pub fn into_records(self) -> Vec<Record> {
        self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write header and rows to `path`, creating parent directories
    pub fn write_delimited(&self, path: &Path, sep: char) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::File::create(path)?;
        let mut w = BufWriter::new(file);
        self.write_to(&mut w, sep)?;
        w.flush()?;

        tracing::info!(path = %path.display(), rows = self.len(), "Wrote table");
        Ok(())
    }

    /// Render the table as delimited text
    pub fn to_delimited_string(&self, sep: char) -> String {
        let mut buf: Vec<u8> = Vec::new();
        if let Err(e) = self.write_to(&mut buf, sep) {
            tracing::warn!(error = %e, "Rendering table stopped early");
        }
        match String::from_utf8(buf) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
        }
    }

    /// Read a delimited file written by [`Table::write_delimited`] (or any header-first CSV)
    pub fn read_delimited(path: &Path, sep: char) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse_delimited(&text, sep))
    }

    /// Parse header-first delimited text; every cell becomes a string
    ///
    /// Short rows leave the trailing columns empty; extra cells are ignored.
    pub fn parse_delimited(text: &str, sep: char) -> Self {
        let mut rows = parse_rows(text, sep).into_iter();
        let Some(header) = rows.next() else {
            return Self::default();
        };

        let records = rows
            .map(|cells| {
                let mut cells = cells.into_iter();
                header
                    .iter()
                    .map(|column| {
                        let cell = cells.next().unwrap_or_default();
                        (column.clone(), Value::String(cell))
                    })
                    .collect::<Record>()
            })
            .collect();

        Self {
            columns: header,
            rows: records,
        }
    }

    /// Left join on equal text values of `keys`
    ///
    /// Every left row is kept. A left row with several matches is repeated once
    /// per match, in right-table order. Unmatched rows get `null` for the right
    /// columns. A right column that already exists on the left (other than a
    /// key) is renamed with [`JOIN_SUFFIX`].
    pub fn left_join(self, other: &Table, keys: &[&str]) -> Table {
        let mut index: HashMap<Vec<String>, Vec<&Record>> = HashMap::new();
        for row in &other.rows {
            index.entry(join_key(row, keys)).or_default().push(row);
        }

        let right_columns: Vec<(&String, String)> = other
            .columns
            .iter()
            .filter(|c| !keys.contains(&c.as_str()))
            .map(|c| {
                let target = if self.columns.contains(c) {
                    format!("{c}{JOIN_SUFFIX}")
                } else {
                    c.clone()
                };
                (c, target)
            })
            .collect();

        let mut columns = self.columns.clone();
        columns.extend(right_columns.iter().map(|(_, target)| target.clone()));

        let mut rows = Vec::with_capacity(self.rows.len());
        for left in self.rows {
            let matches = index.get(&join_key(&left, keys));
            match matches {
                Some(matches) => {
                    for right in matches {
                        let mut row = left.clone();
                        for (source, target) in &right_columns {
                            let value = right.get(*source).cloned().unwrap_or(Value::Null);
                            row.insert(target.clone(), value);
                        }
                        rows.push(row);
                    }
                }
                None => {
                    let mut row = left;
                    for (_, target) in &right_columns {
                        row.insert(target.clone(), Value::Null);
                    }
                    rows.push(row);
                }
            }
        }

        Table { columns, rows }
    }

    /// Rename columns; pairs are `(from, to)` and unknown names are ignored
    pub fn rename_columns(self, renames: &[(&str, &str)]) -> Table {
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(key, value)| {
                        let key = renames
                            .iter()
                            .find(|(from, _)| *from == key)
                            .map(|(_, to)| (*to).to_string())
                            .unwrap_or(key);
                        (key, value)
                    })
                    .collect::<Record>()
            })
            .collect();
        let columns = self
            .columns
            .into_iter()
            .map(|c| {
                renames
                    .iter()
                    .find(|(from, _)| *from == c)
                    .map(|(_, to)| (*to).to_string())
                    .unwrap_or(c)
            })
            .collect();
        Table { columns, rows }
    }

    /// Replace `null` and absent cells with `value`
    pub fn fill_missing(self, value: &str) -> Table {
        let columns = self.columns;
        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                for column in &columns {
                    match row.get_mut(column) {
                        Some(cell) if cell.is_null() => *cell = Value::String(value.to_string()),
                        Some(_) => {}
                        None => {
                            row.insert(column.clone(), Value::String(value.to_string()));
                        }
                    }
                }
                row
            })
            .collect();
        Table { columns, rows }
    }

    /// Drop index columns left behind by spreadsheet tooling (`Unnamed: 0`, ...)
    pub fn remove_unnamed_columns(self) -> Table {
        let unnamed: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.starts_with("Unnamed"))
            .cloned()
            .collect();
        if unnamed.is_empty() {
            return self;
        }
        let names: Vec<&str> = unnamed.iter().map(String::as_str).collect();
        let rows = flatten::drop_columns(self.rows, &names);
        let columns = self
            .columns
            .into_iter()
            .filter(|c| !unnamed.contains(c))
            .collect();
        Table { columns, rows }
    }

    /// Add [`RACE_ID`] = `season_round` to every row
    pub fn with_race_id(self) -> Table {
        let rows = flatten::build_composite_key(self.rows, &["season", "round"], RACE_ID);
        let mut columns = self.columns;
        if !columns.iter().any(|c| c == RACE_ID) {
            columns.push(RACE_ID.to_string());
        }
        Table { columns, rows }
    }

    fn write_to<W: Write>(&self, mut w: W, sep: char) -> io::Result<()> {
        write_row(&mut w, &self.columns, sep)?;
        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| row.get(c).map(cell_text).unwrap_or_default())
                .collect();
            write_row(&mut w, &cells, sep)?;
        }
        Ok(())
    }
}

fn join_key(row: &Record, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .map(|k| row.get(*k).map(cell_text).unwrap_or_default())
        .collect()
}

/// Quote-aware delimited parser (CRLF tolerant)
fn parse_rows(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == sep && !in_quotes => {
                row.push(take(&mut field));
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    // Last line without a trailing newline
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(mut w: W, row: &[String], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{sep}")?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}
