use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use verdict_evaluator::{Evaluator, FraudDetection, RoundInput};
use verdict_ledger::{AuditLedger, InMemoryAuditLedger};
use verdict_types::Randomness;

use crate::cli::EvaluateArgs;
use crate::report::{ResultCounts, format_header, format_measurement};
use crate::sources::{DryRunSubmitter, FileRoundDetails, FixedRandomness, LogTelemetry};
use crate::{config, ndjson};

pub async fn handle(args: EvaluateArgs) -> Result<()> {
    let mut config = config::load(args.config.as_deref())?;
    config::apply_overrides(&mut config, args.required_committee_size, args.no_fraud_detection);

    let randomness = args
        .randomness
        .as_deref()
        .map(Randomness::from_hex)
        .transpose()
        .context("Invalid --randomness")?;
    if randomness.is_none() && config.fraud_detection == FraudDetection::Full {
        bail!("--randomness is required unless fraud detection is disabled");
    }

    let details = FileRoundDetails::load(&args.round_details)?;
    let rounds = ndjson::read_rounds(&args.measurements)?;

    let ledger = Arc::new(InMemoryAuditLedger::new());
    let evaluator = Evaluator::new(
        config,
        Arc::new(details),
        Arc::new(FixedRandomness(randomness)),
        Arc::new(DryRunSubmitter),
        Arc::new(LogTelemetry),
    )
    .with_ledger(ledger.clone());

    // Outputs are buffered so a failed round leaves no partial files behind.
    let mut txt: Vec<u8> = Vec::new();
    let mut annotated: Vec<u8> = Vec::new();
    writeln!(txt, "{}", format_header(args.keep_rejected))?;

    let mut counts = ResultCounts::default();
    for (round_index, measurements) in rounds {
        eprintln!(" → evaluating round {round_index}");
        let evaluation = evaluator
            .evaluate_round(RoundInput {
                contract_address: args.contract.clone(),
                round_index,
                measurements,
            })
            .await
            .with_context(|| format!("Failed to evaluate round {round_index}"))?;

        for e in &evaluation.ignored_errors {
            warn!(round_index, error = %e, "Ignored error");
        }

        let mut written = 0;
        for m in evaluation
            .measurements
            .iter()
            .filter(|m| args.keep_rejected || m.is_tasking_ok())
        {
            counts.record(m);
            writeln!(txt, "{}", format_measurement(m, args.keep_rejected))?;
            ndjson::write_measurement(&mut annotated, round_index, m)?;
            written += 1;
        }
        eprintln!(" → added {written} measurements from this round");
    }

    let (txt_path, ndjson_path) = output_paths(&args.measurements, &args.output_dir);
    write_output(&txt_path, &txt)?;
    write_output(&ndjson_path, &annotated)?;

    println!("Found {} accepted measurements.", counts.total());
    for line in counts.lines() {
        println!("{line}");
    }

    let entries = ledger.all_entries().await?.len();
    let intact = ledger.verify_integrity().await?;
    info!(entries, intact, "Audit ledger");

    eprintln!("Wrote   human-readable evaluation to {}", txt_path.display());
    eprintln!("Wrote machine-readable evaluation to {}", ndjson_path.display());
    Ok(())
}

/// Write `contents` next to `path` first and rename it into place, so the
/// output is either complete or absent.
fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(())
}

/// `<dir>/<stem>.evaluation.txt` and `<dir>/<stem>.evaluation.ndjson`, where
/// the stem drops a trailing `.ndjson`.
fn output_paths(measurements: &Path, output_dir: &Path) -> (PathBuf, PathBuf) {
    let name = measurements
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "measurements".to_string());
    let stem = name.strip_suffix(".ndjson").unwrap_or(&name);
    (
        output_dir.join(format!("{stem}.evaluation.txt")),
        output_dir.join(format!("{stem}.evaluation.ndjson")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ROUND_DETAILS: &str = r#"{
        "roundId": 1,
        "startEpoch": 10,
        "maxTasksPerNode": 15,
        "retrievalTasks": [{"cid": "bafy1", "minerId": "f01"}]
    }"#;

    fn line(round: u64, station: &str, inet_group: &str, result: &str, finished_at: u64) -> String {
        format!(
            r#"{{"roundIndex": {round}, "measurement": {{"stationId": "{station}", "inet_group": "{inet_group}", "participantAddress": "0x{station}", "cid": "bafy1", "minerId": "f01", "protocol": "http", "retrievalResult": "{result}", "finished_at": {finished_at}}}}}"#
        )
    }

    fn args(dir: &TempDir, keep_rejected: bool) -> EvaluateArgs {
        EvaluateArgs {
            measurements: dir.path().join("sample.ndjson"),
            round_details: dir.path().join("round.json"),
            randomness: None,
            config: None,
            required_committee_size: Some(2),
            no_fraud_detection: true,
            keep_rejected,
            contract: String::new(),
            output_dir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn test_output_paths() {
        let (txt, ndjson) = output_paths(Path::new("/data/round-42.ndjson"), Path::new("out"));
        assert_eq!(txt, Path::new("out/round-42.evaluation.txt"));
        assert_eq!(ndjson, Path::new("out/round-42.evaluation.ndjson"));

        let (txt, _) = output_paths(Path::new("dump.json"), Path::new("."));
        assert_eq!(txt, Path::new("./dump.json.evaluation.txt"));
    }

    #[tokio::test]
    async fn test_evaluates_file_without_fraud_detection() {
        let dir = TempDir::new().unwrap();
        let input = [
            line(5, "s1", "ig1", "OK", 1714564800000),
            line(5, "s2", "ig2", "OK", 1714564801000),
            line(5, "s3", "ig3", "TIMEOUT", 1714564802000),
        ]
        .join("\n");
        std::fs::write(dir.path().join("sample.ndjson"), input).unwrap();
        std::fs::write(dir.path().join("round.json"), ROUND_DETAILS).unwrap();

        handle(args(&dir, false)).await.unwrap();

        let txt = std::fs::read_to_string(dir.path().join("sample.evaluation.txt")).unwrap();
        let rows: Vec<&str> = txt.lines().collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].starts_with("Timestamp"));
        assert!(rows[3].ends_with("TIMEOUT"));

        let annotated = ndjson::read_rounds(&dir.path().join("sample.evaluation.ndjson")).unwrap();
        assert_eq!(annotated.len(), 1);
        assert_eq!(annotated[0].0, 5);
        let measurements = &annotated[0].1;
        assert_eq!(measurements.len(), 3);
        assert!(measurements.iter().all(|m| m.is_tasking_ok()));
        assert_eq!(measurements.iter().filter(|m| m.is_majority_result()).count(), 2);
    }

    #[tokio::test]
    async fn test_failed_round_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = [
            line(5, "s1", "ig1", "OK", 1714564800000),
            line(6, "s2", "ig2", "OK", 1714564801000),
        ]
        .join("\n");
        std::fs::write(dir.path().join("sample.ndjson"), input).unwrap();
        // round 6 is not in the file
        std::fs::write(dir.path().join("round.json"), format!(r#"{{"5": {ROUND_DETAILS}}}"#)).unwrap();

        let err = handle(args(&dir, false)).await.unwrap_err();
        assert!(err.to_string().contains("Failed to evaluate round 6"));

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, ["round.json", "sample.ndjson"]);
    }

    #[tokio::test]
    async fn test_requires_randomness_with_fraud_detection() {
        let dir = TempDir::new().unwrap();
        let mut args = args(&dir, false);
        args.no_fraud_detection = false;

        let err = handle(args).await.unwrap_err();
        assert!(err.to_string().contains("--randomness is required"));
    }
}
