//! CSV export for ranked leaderboard records.

use std::io::Write;
use std::path::Path;

use crate::BenchError;
use crate::core::schema::LeaderboardRecord;
use crate::score::{CURRENT_SCHEME, ScoringScheme};

/// CSV column headers in deterministic order.
pub const CSV_HEADERS: &[&str] = &[
    "rank",
    "id",
    "uuid",
    "config_name",
    "reference_index",
    "declared_index",
    "scoring_version",
    "timestamp",
    "received_at",
    "os",
    "cpu_model",
    "cpu_time_s",
    "gpu_time_s",
    "memory_time_s",
];

/// CSV exporter for leaderboard records.
///
/// Rows are written in the order given, so callers pass ranked query output
/// and the `rank` column is the 1-based position.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        CsvExporter
    }

    /// Export records to a CSV file.
    ///
    /// # Errors
    /// Returns an error if file operations or CSV writing fails.
    pub fn export(&self, records: &[LeaderboardRecord], output: &Path) -> Result<(), BenchError> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BenchError::Message(format!("failed to create directory: {e}")))?;
            }
        }

        let file = std::fs::File::create(output)
            .map_err(|e| BenchError::Message(format!("failed to create file: {e}")))?;

        self.export_to_writer(records, file)
    }

    /// Export records to any writer implementing Write.
    pub fn export_to_writer<W: Write>(
        &self,
        records: &[LeaderboardRecord],
        writer: W,
    ) -> Result<(), BenchError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record(CSV_HEADERS)
            .map_err(|e| BenchError::Message(format!("failed to write CSV headers: {e}")))?;

        for (i, record) in records.iter().enumerate() {
            let row = self.record_to_row(i + 1, record);
            csv_writer
                .write_record(&row)
                .map_err(|e| BenchError::Message(format!("failed to write CSV row: {e}")))?;
        }

        csv_writer
            .flush()
            .map_err(|e| BenchError::Message(format!("failed to flush CSV writer: {e}")))?;

        Ok(())
    }

    fn record_to_row(&self, rank: usize, record: &LeaderboardRecord) -> Vec<String> {
        let info = |key: &str| {
            record
                .system_info
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let timing = |v: Option<f64>| v.map(|t| format!("{t:.6}")).unwrap_or_default();
        let results = &record.results;

        vec![
            rank.to_string(),
            record.id.to_string(),
            record.uuid.clone(),
            record.config_name.to_string(),
            format!("{:.2}", record.reference_index),
            format!("{:.2}", record.declared_index),
            record.scoring_version.to_string(),
            record.timestamp.clone(),
            record.received_at.clone(),
            info("os"),
            info("cpu_model"),
            timing(ScoringScheme::canonical(&results.cpu, CURRENT_SCHEME.cpu_aliases)),
            timing(ScoringScheme::canonical(&results.gpu, CURRENT_SCHEME.gpu_aliases)),
            timing(ScoringScheme::canonical(&results.memory, CURRENT_SCHEME.memory_aliases)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AcceptedSubmission, BenchmarkResults, ProfileName, SubmissionEnvelope};
    use serde_json::json;

    fn make_test_record(id: u64, score: f64) -> LeaderboardRecord {
        let results = BenchmarkResults {
            cpu: [("calculate_primes", 0.5)].into_iter().collect(),
            ..Default::default()
        };
        AcceptedSubmission {
            envelope: SubmissionEnvelope::new(
                json!({"os": "Linux", "cpu_model": "Test CPU"}),
                results,
                score,
                ProfileName::Heavy,
            ),
            server_score: score,
            scoring_version: 2,
        }
        .into_record(id)
    }

    #[test]
    fn test_record_to_row_length() {
        let exporter = CsvExporter::new();
        let row = exporter.record_to_row(1, &make_test_record(1, 800.0));
        assert_eq!(row.len(), CSV_HEADERS.len());
    }

    #[test]
    fn test_export_to_writer() {
        let exporter = CsvExporter::new();
        let records = vec![make_test_record(4, 900.0), make_test_record(2, 800.0)];

        let mut buffer = Vec::new();
        exporter.export_to_writer(&records, &mut buffer).unwrap();

        let csv_str = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = csv_str.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("rank,id,uuid,config_name"));
        assert!(lines[1].starts_with("1,4,"));
        assert!(lines[1].contains("heavy"));
        assert!(lines[1].contains("900.00"));
        assert!(lines[1].contains("Test CPU"));
        assert!(lines[1].contains("0.500000"));
        assert!(lines[2].starts_with("2,2,"));
    }

    #[test]
    fn test_export_to_file() {
        let exporter = CsvExporter::new();
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("out").join("leaderboard.csv");

        exporter
            .export(&[make_test_record(1, 10.0)], &output_path)
            .unwrap();

        let contents = std::fs::read_to_string(&output_path).unwrap();
        assert!(contents.contains("reference_index"));
    }

    #[test]
    fn test_missing_metrics_default_to_empty() {
        let exporter = CsvExporter::new();
        let row = exporter.record_to_row(1, &make_test_record(1, 10.0));
        // gpu_time_s and memory_time_s
        assert_eq!(row[12], "");
        assert_eq!(row[13], "");
    }
}
