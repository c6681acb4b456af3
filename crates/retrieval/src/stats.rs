//! Aggregate counts over the incident records file.

use crate::record::{load_records, IncidentRecord};
use incidex_core::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Bucket for records missing the counted field.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStats {
    pub total_incidents: usize,
    pub incident_types: BTreeMap<String, usize>,
    pub statuses: BTreeMap<String, usize>,
    pub locations: BTreeMap<String, usize>,
}

impl RecordStats {
    pub fn from_records(records: &[IncidentRecord]) -> Self {
        let mut stats = Self {
            total_incidents: records.len(),
            ..Default::default()
        };

        for record in records {
            bump(&mut stats.incident_types, record.text("incident_type"));
            bump(&mut stats.statuses, record.text("status"));
            bump(&mut stats.locations, record.text("location"));
        }

        stats
    }

    /// The `n` largest buckets of `counts`, largest first, ties by name.
    pub fn top(counts: &BTreeMap<String, usize>, n: usize) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> =
            counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        entries.truncate(n);
        entries
    }
}

/// Read the records file and aggregate it.
pub fn record_stats(path: &Path) -> AppResult<RecordStats> {
    let records = load_records(path)?;
    Ok(RecordStats::from_records(&records))
}

fn bump(counts: &mut BTreeMap<String, usize>, value: Option<String>) {
    let key = value.unwrap_or_else(|| UNKNOWN.to_string());
    *counts.entry(key).or_insert(0) += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn records() -> Vec<IncidentRecord> {
        vec![
            IncidentRecord::new(1)
                .with_field("incident_type", "Flood")
                .with_field("status", "Closed")
                .with_field("location", "Kottara"),
            IncidentRecord::new(2)
                .with_field("incident_type", "Flood")
                .with_field("status", "Open"),
            IncidentRecord::new(3)
                .with_field("incident_type", "Tree Fall")
                .with_field("status", "Closed")
                .with_field("location", "Kadri"),
        ]
    }

    #[test]
    fn test_counts_with_unknown_bucket() {
        let stats = RecordStats::from_records(&records());
        assert_eq!(stats.total_incidents, 3);
        assert_eq!(stats.incident_types["Flood"], 2);
        assert_eq!(stats.statuses["Closed"], 2);
        assert_eq!(stats.locations[UNKNOWN], 1);
        assert_eq!(stats.locations["Kadri"], 1);
    }

    #[test]
    fn test_top_orders_by_count_then_name() {
        let stats = RecordStats::from_records(&records());
        let top = RecordStats::top(&stats.locations, 2);
        assert_eq!(top, vec![("Kadri", 1), ("Kottara", 1)]);
        assert_eq!(RecordStats::top(&stats.incident_types, 1), vec![("Flood", 2)]);
    }

    #[test]
    fn test_record_stats_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("processed_incidents.json");
        let data = json!([
            {"sl_no": 1, "incident_type": "Landslide", "status": "Closed", "location": "Pachanady"},
            {"sl_no": 2, "incident_type": "Landslide", "status": null, "location": "Pachanady"}
        ]);
        std::fs::write(&path, data.to_string()).unwrap();

        let stats = record_stats(&path).unwrap();
        assert_eq!(stats.total_incidents, 2);
        assert_eq!(stats.incident_types["Landslide"], 2);
        assert_eq!(stats.statuses[UNKNOWN], 1);
        assert_eq!(stats.locations["Pachanady"], 2);
    }
}
