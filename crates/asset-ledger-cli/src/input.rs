//! Loading discovered records from discovery-tool exports.
//!
//! JSON files hold an array of records in their serialized form. CSV files
//! use the columns below; any other column is kept as passthrough metadata.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use asset_ledger_core::model::{DiscoveredRecord, DiscoverySource, Passthrough};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

const KNOWN_COLUMNS: [&str; 9] = [
    "source_id",
    "source_type",
    "source_detail",
    "external_id",
    "name",
    "serial_number",
    "manufacturer",
    "model",
    "last_seen",
];

pub fn load_discovered(path: &Path, passthrough_limit: usize) -> Result<Vec<DiscoveredRecord>> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let reader = BufReader::new(file);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    let records = match extension.as_deref() {
        Some("json") => read_json(reader, passthrough_limit)?,
        Some("csv") => read_csv(reader, passthrough_limit)?,
        _ => bail!("Unsupported input {}: expected a .csv or .json file", path.display()),
    };
    info!("Loaded {} discovered records from {}", records.len(), path.display());
    Ok(records)
}

fn read_json<R: Read>(reader: R, passthrough_limit: usize) -> Result<Vec<DiscoveredRecord>> {
    let mut records: Vec<DiscoveredRecord> =
        serde_json::from_reader(reader).context("Invalid discovered-record JSON")?;
    for record in &mut records {
        let dropped = record.metadata.enforce_limit(passthrough_limit);
        if dropped > 0 {
            warn!(
                "Dropped {} metadata entries from {} (limit {})",
                dropped, record.external_id, passthrough_limit
            );
        }
    }
    Ok(records)
}

fn read_csv<R: Read>(reader: R, passthrough_limit: usize) -> Result<Vec<DiscoveredRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut records = Vec::new();
    for (index, row) in csv_reader.records().enumerate() {
        let row = row?;
        let line = index + 2;
        let field = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .and_then(|i| row.get(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let Some(external_id) = field("external_id") else {
            bail!("Line {}: external_id is required", line);
        };
        let source = source_from(
            field("source_type").as_deref().unwrap_or("manual"),
            field("source_detail"),
        )
        .with_context(|| format!("Line {}", line))?;
        let last_seen = match field("last_seen") {
            Some(value) => DateTime::parse_from_rfc3339(&value)
                .with_context(|| format!("Line {}: invalid last_seen '{}'", line, value))?
                .with_timezone(&Utc),
            None => bail!("Line {}: last_seen is required", line),
        };

        let mut metadata = Passthrough::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            if KNOWN_COLUMNS.contains(&header) || value.is_empty() {
                continue;
            }
            if !metadata.insert(header, value, passthrough_limit) {
                warn!("Line {}: metadata limit reached, ignoring column {}", line, header);
            }
        }

        records.push(DiscoveredRecord {
            source_id: field("source_id").unwrap_or_else(|| "import".to_string()),
            source,
            name: field("name").unwrap_or_else(|| external_id.clone()),
            external_id,
            serial_number: field("serial_number"),
            manufacturer: field("manufacturer"),
            model: field("model"),
            last_seen,
            metadata,
        });
    }
    Ok(records)
}

fn source_from(kind: &str, detail: Option<String>) -> Result<DiscoverySource> {
    let source = match kind.to_lowercase().as_str() {
        "mdm" => DiscoverySource::Mdm {
            provider: detail.unwrap_or_default(),
        },
        "network_scan" => DiscoverySource::NetworkScan {
            scanner: detail.unwrap_or_default(),
        },
        "agent" => DiscoverySource::Agent {
            agent_version: detail,
        },
        "manual" => DiscoverySource::Manual,
        other => bail!("Unknown source_type '{}'", other),
    };
    Ok(source)
}
