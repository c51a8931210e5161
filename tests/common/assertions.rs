//! Table assertions shared by the integration tests

use ergast_dl::Table;

/// Assert that every row carries a non-empty value for each column
pub fn assert_columns_filled(table: &Table, columns: &[&str]) {
    for (i, row) in table.rows().iter().enumerate() {
        for column in columns {
            let filled = row
                .get(*column)
                .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
            assert!(filled, "row {i} has no value for '{column}': {row:?}");
        }
    }
}

/// Assert that none of `columns` survived flattening
pub fn assert_no_columns(table: &Table, columns: &[&str]) {
    for column in columns {
        assert!(
            !table.columns().iter().any(|c| c == column),
            "column '{column}' should have been flattened away: {:?}",
            table.columns()
        );
    }
}

/// Distinct `season_round` ids in row order
pub fn race_ids(table: &Table) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for row in table.rows() {
        if let Some(id) = row.get("race_id").and_then(|v| v.as_str()) {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}
