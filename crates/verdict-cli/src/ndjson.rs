use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use verdict_types::Measurement;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedMeasurement {
    round_index: u64,
    measurement: Measurement,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotatedMeasurement<'a> {
    round_index: u64,
    measurement: &'a Measurement,
}

/// Measurements grouped by round, rounds in order of first appearance.
pub fn read_rounds(path: &Path) -> Result<Vec<(u64, Vec<Measurement>)>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open measurements: {}", path.display()))?;
    parse_rounds(BufReader::new(file))
        .with_context(|| format!("Failed to read measurements: {}", path.display()))
}

pub fn parse_rounds(reader: impl BufRead) -> Result<Vec<(u64, Vec<Measurement>)>> {
    let mut rounds: Vec<(u64, Vec<Measurement>)> = Vec::new();
    let mut position: HashMap<u64, usize> = HashMap::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RecordedMeasurement =
            serde_json::from_str(&line).with_context(|| format!("Invalid record on line {}", n + 1))?;
        let slot = *position.entry(record.round_index).or_insert_with(|| {
            rounds.push((record.round_index, Vec::new()));
            rounds.len() - 1
        });
        rounds[slot].1.push(record.measurement);
    }

    Ok(rounds)
}

/// Write one annotated measurement as an NDJSON line.
pub fn write_measurement(mut writer: impl Write, round_index: u64, measurement: &Measurement) -> Result<()> {
    serde_json::to_writer(
        &mut writer,
        &AnnotatedMeasurement {
            round_index,
            measurement,
        },
    )?;
    writeln!(writer)?;
    Ok(())
}
