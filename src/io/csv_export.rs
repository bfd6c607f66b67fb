use anyhow::{Context, Result};
use std::path::Path;

use crate::model::meta::MetaData;
use crate::model::record::Record;

/// Export the loaded records to a semicolon-delimited CSV file.
///
/// Columns: Name ; Start ; Stop ; group-by fields ; Progress.
/// Returns the number of records written.
pub fn export_csv(records: &[Record], meta: &MetaData, path: &Path) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_path(path)
        .context("Failed to create CSV file")?;

    let mut header = vec!["Name".to_string(), "Start".to_string(), "Stop".to_string()];
    header.extend(meta.grouped_by.iter().cloned());
    header.push("Progress".to_string());
    writer.write_record(&header).context("Failed to write header")?;

    for record in records {
        let mut row = vec![
            record.text(&meta.name_field).unwrap_or_default().to_string(),
            record
                .datetime(&meta.date_start_field)
                .map(|d| d.format("%d/%m/%Y %H:%M").to_string())
                .unwrap_or_default(),
            record
                .datetime(&meta.date_stop_field)
                .map(|d| d.format("%d/%m/%Y %H:%M").to_string())
                .unwrap_or_default(),
        ];
        for field in &meta.grouped_by {
            row.push(record.text(field).unwrap_or_default().to_string());
        }
        let progress = meta
            .progress_field
            .as_deref()
            .and_then(|f| record.number(f))
            .unwrap_or(0.0);
        row.push(format!("{}%", (progress * 100.0).round() as i64));
        writer
            .write_record(&row)
            .with_context(|| format!("Failed to write record {}", record.id))?;
    }

    writer.flush().context("Failed to flush CSV")?;
    Ok(records.len())
}
