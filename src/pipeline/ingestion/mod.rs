// Reading raw listing files into batches and writing clean tables back out

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

use crate::constants::{FEATURE_COUNT, FEATURE_ORDER, PRICE};
use crate::domain::{CleanRow, CleanTable, FeatureFrame};
use crate::error::{PricerError, Result, SchemaError};
use crate::types::{RawBatch, RawRecord, RawValue};

/// Read a delimited listings file. Missing trailing fields and null markers
/// become nulls; every other field is kept as text.
pub fn read_csv(path: &Path) -> Result<RawBatch> {
    let file = File::open(path).map_err(|e| {
        PricerError::Config(format!("Failed to open CSV '{}': {e}", path.display()))
    })?;
    let batch = read_csv_from(file)?;
    info!(
        "📥 Loaded {} rows x {} columns from {}",
        batch.len(),
        batch.columns.len(),
        path.display()
    );
    Ok(batch)
}

pub fn read_csv_from<R: Read>(reader: R) -> Result<RawBatch> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut batch = RawBatch::new(columns);

    for result in reader.records() {
        let record = result?;
        let row: RawRecord = batch
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = record.get(i).map(RawValue::from_field).unwrap_or(RawValue::Null);
                (name.clone(), value)
            })
            .collect();
        batch.rows.push(row);
    }

    Ok(batch)
}

/// Read a JSON array of listing objects. The header is the union of keys,
/// each object contributing its keys in map order.
pub fn read_json_records(bytes: &[u8]) -> Result<RawBatch> {
    let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_slice(bytes)?;
    let mut batch = RawBatch::default();

    for object in &records {
        for key in object.keys() {
            if !batch.has_column(key) {
                batch.columns.push(key.clone());
            }
        }
    }
    for object in records {
        let row: RawRecord = object
            .iter()
            .map(|(k, v)| (k.clone(), RawValue::from(v)))
            .collect();
        batch.rows.push(row);
    }

    Ok(batch)
}

/// Write a clean table with a header row in output column order.
pub fn write_clean_csv(table: &CleanTable, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let file = File::create(path)?;
    write_clean_csv_to(table, file)?;
    info!("💾 Wrote {} clean rows to {}", table.len(), path.display());
    Ok(())
}

pub fn write_clean_csv_to<W: Write>(table: &CleanTable, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(table.columns())?;
    for record in table.records() {
        writer.write_record(record.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a file written by [`write_clean_csv`] back into a table.
pub fn read_clean_csv(path: &Path) -> Result<CleanTable> {
    let file = File::open(path).map_err(|e| {
        PricerError::Config(format!("Failed to open CSV '{}': {e}", path.display()))
    })?;
    read_clean_csv_from(file)
}

pub fn read_clean_csv_from<R: Read>(reader: R) -> Result<CleanTable> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let price_idx = position(PRICE);
    let mut missing = Vec::new();
    let mut feature_idx = [0usize; FEATURE_COUNT];
    for (slot, name) in feature_idx.iter_mut().zip(FEATURE_ORDER) {
        match position(name) {
            Some(i) => *slot = i,
            None => missing.push(name.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns(missing).into());
    }

    let cell = |record: &csv::StringRecord, idx: usize, line: usize| -> Result<f64> {
        let text = record.get(idx).unwrap_or("");
        text.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                PricerError::Config(format!(
                    "clean table row {line} column '{}' is not a number: '{text}'",
                    headers.get(idx).unwrap_or("?")
                ))
            })
    };

    let mut table = CleanTable {
        rows: Vec::new(),
        has_price: price_idx.is_some(),
    };
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let mut features = [0.0; FEATURE_COUNT];
        for (value, idx) in features.iter_mut().zip(feature_idx) {
            *value = cell(&record, idx, line)?;
        }
        let price = match price_idx {
            Some(idx) => Some(cell(&record, idx, line)?),
            None => None,
        };
        table.rows.push(CleanRow { features, price });
    }
    Ok(table)
}

/// Write a feature frame with its targets as the first column.
pub fn write_training_csv(
    frame: &FeatureFrame,
    targets: &[f64],
    target_column: &str,
    path: &Path,
) -> Result<()> {
    if frame.len() != targets.len() {
        return Err(PricerError::Config(format!(
            "{} targets for {} feature rows",
            targets.len(),
            frame.len()
        )));
    }
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(std::iter::once(target_column).chain(frame.columns.iter().map(String::as_str)))?;
    for (row, target) in frame.rows.iter().zip(targets) {
        writer.write_record(std::iter::once(target).chain(row).map(|v| v.to_string()))?;
    }
    writer.flush()?;
    info!("💾 Wrote {} rows to {}", frame.len(), path.display());
    Ok(())
}
