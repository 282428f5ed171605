//! Tabular export: a fixed-column CSV projection of the dataset.

use std::path::Path;

use crate::domain::record::JobRecord;
use crate::infrastructure::storage::StorageError;

/// Column set of the export, in order.
pub const CSV_COLUMNS: [&str; 9] = [
    "id",
    "source",
    "title",
    "company",
    "location",
    "posting_date",
    "deadline_date",
    "url",
    "description",
];

/// Derive the export path from the dataset path: `professions.json` becomes
/// `professions.csv`; anything without a `.json` suffix gets `.csv` appended.
pub fn csv_path_for(dataset_path: &Path) -> std::path::PathBuf {
    match dataset_path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => dataset_path.with_extension("csv"),
        _ => {
            let mut name = dataset_path.as_os_str().to_os_string();
            name.push(".csv");
            std::path::PathBuf::from(name)
        }
    }
}

/// Render records as CSV text with RFC-4180 quoting.
pub fn to_csv_string(records: &[JobRecord]) -> String {
    let mut out = String::new();
    write_row(&mut out, CSV_COLUMNS.iter().map(|c| c.to_string()));
    for record in records {
        write_row(&mut out, row_values(record).into_iter());
    }
    out
}

/// Write the CSV projection next to the dataset.
pub async fn write_csv(path: &Path, records: &[JobRecord]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Write {
                    path: parent.display().to_string(),
                    source,
                })?;
        }
    }
    tokio::fs::write(path, to_csv_string(records))
        .await
        .map_err(|source| StorageError::Write {
            path: path.display().to_string(),
            source,
        })
}

fn row_values(record: &JobRecord) -> Vec<String> {
    let date = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
    };
    vec![
        record.id.map(|id| id.to_string()).unwrap_or_default(),
        record.source.clone(),
        record.title.clone().unwrap_or_default(),
        record.company.clone().unwrap_or_default(),
        record.location.clone().unwrap_or_default(),
        date(record.posting_date),
        date(record.deadline_date),
        record.url.clone(),
        record.description.clone().unwrap_or_default(),
    ]
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row(out: &mut String, cells: impl Iterator<Item = String>) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(',');
        }
        first = false;
        if needs_quotes(&cell) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(&cell);
        }
    }
    out.push('\n');
}
