//! Result Files
//!
//! JSON writers for run summaries and sweep aggregates, plus the readers used
//! to load sweep logs and imported adjacency matrices back.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use opinion_events::{RunSummary, SweepAggregate, SweepRecord};

/// File name of a run summary: parameter stem, perception pair and seed.
pub fn summary_file_name(summary: &RunSummary) -> String {
    let p = &summary.parameters;
    format!(
        "{}_ain-{}_aout-{}_seed-{}.json",
        p.file_stem(),
        p.alpha_in,
        p.alpha_out,
        summary.seed
    )
}

pub fn write_summary(summary: &RunSummary, path: impl AsRef<Path>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write a summary into `dir` under its standard file name.
pub fn write_summary_to_dir(
    summary: &RunSummary,
    dir: impl AsRef<Path>,
) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir.as_ref())?;
    let path = dir.as_ref().join(summary_file_name(summary));
    write_summary(summary, &path)?;
    Ok(path)
}

pub fn write_aggregates(
    aggregates: &[SweepAggregate],
    path: impl AsRef<Path>,
) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(aggregates)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a sweep JSONL log, skipping blank lines.
pub fn read_sweep(path: impl AsRef<Path>) -> std::io::Result<Vec<SweepRecord>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(SweepRecord::from_jsonl(&line)?);
    }
    Ok(records)
}

/// Read a square 0/1 adjacency matrix stored as a JSON array of rows.
pub fn read_adjacency(path: impl AsRef<Path>) -> std::io::Result<Vec<Vec<u8>>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opinion_events::fixtures::{sample_summaries, sample_sweep};

    use crate::experiment::aggregate_records;

    #[test]
    fn test_summary_file_name() {
        let summary = &sample_summaries()[0];
        let name = summary_file_name(summary);
        assert!(name.starts_with("ws0_n100_k-10_kin-8_kout-2"));
        assert!(name.ends_with("_ain-0.25_aout-0.25_seed-1.json"));
    }

    #[test]
    fn test_write_summary_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let summary = &sample_summaries()[2];

        let path = write_summary_to_dir(summary, dir.path().join("runs")).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let parsed: RunSummary = serde_json::from_str(&content).unwrap();
        assert_eq!(&parsed, summary);
        assert!(content.contains("\"consensus_time\": null"));
    }

    #[test]
    fn test_sweep_log_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.jsonl");
        let lines: Vec<String> = sample_sweep().iter().map(|r| r.to_jsonl().unwrap()).collect();
        fs::write(&path, lines.join("\n\n")).unwrap();

        assert_eq!(read_sweep(&path).unwrap(), sample_sweep());
    }

    #[test]
    fn test_write_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregates.json");
        let aggregates = aggregate_records(&sample_sweep());

        write_aggregates(&aggregates, &path).unwrap();
        let parsed: Vec<SweepAggregate> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, aggregates);
    }

    #[test]
    fn test_read_adjacency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.json");
        fs::write(&path, "[[0,1],[1,0]]").unwrap();
        assert_eq!(read_adjacency(&path).unwrap(), vec![vec![0, 1], vec![1, 0]]);

        fs::write(&path, "not json").unwrap();
        assert!(read_adjacency(&path).is_err());
    }
}
