use crate::models::PricePoint;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const SNAPSHOT_VERSION: u32 = 1;

/// Pre-fetched, symbol-keyed price history. The core never fetches or
/// blocks on I/O itself; the data-retrieval collaborator produces a
/// snapshot file and this type only deserializes it.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    series: BTreeMap<String, Vec<PricePoint>>,
}

#[derive(Serialize, Deserialize)]
struct MarketDataSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    series: BTreeMap<String, Vec<PricePoint>>,
}

impl MarketData {
    pub fn from_series(series: BTreeMap<String, Vec<PricePoint>>) -> Self {
        let mut data = Self { series };
        data.normalize();
        data
    }

    /// Loads a snapshot, selecting JSON or the compact bincode form by
    /// file extension (`.json` vs anything else).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open market data snapshot at {}", path.display()))?;
        let reader = BufReader::new(file);

        let series = if is_json_path(path) {
            serde_json::from_reader(reader)
                .with_context(|| format!("Invalid JSON market data in {}", path.display()))?
        } else {
            let snapshot: MarketDataSnapshot =
                bincode::deserialize_from(reader).context("Snapshot decode failed")?;
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(anyhow!(
                    "Market data snapshot version mismatch (found {}, expected {})",
                    snapshot.version,
                    SNAPSHOT_VERSION
                ));
            }
            snapshot.series
        };

        let mut data = Self { series };
        data.normalize();
        info!(
            "Loaded price history for {} symbols from {}",
            data.series.len(),
            path.display()
        );
        Ok(data)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let file = File::create(path).with_context(|| {
            format!("Unable to create market data snapshot at {}", path.display())
        })?;
        let mut writer = BufWriter::new(file);
        if is_json_path(path) {
            serde_json::to_writer_pretty(&mut writer, &self.series)
                .context("Failed to serialize market data snapshot")?;
        } else {
            let snapshot = MarketDataSnapshot {
                version: SNAPSHOT_VERSION,
                generated_at: Utc::now(),
                series: self.series.clone(),
            };
            bincode::serialize_into(&mut writer, &snapshot)
                .context("Failed to serialize market data snapshot")?;
        }
        writer
            .flush()
            .context("Failed to flush market data snapshot to disk")?;
        Ok(())
    }

    /// Sorts every series chronologically and drops duplicate dates so the
    /// rest of the engine can assume ordered input.
    fn normalize(&mut self) {
        for points in self.series.values_mut() {
            points.sort_by(|a, b| a.date.cmp(&b.date));
            points.dedup_by(|a, b| a.date == b.date);
        }
        self.series.retain(|_, points| !points.is_empty());
    }

    pub fn has_data(&self) -> bool {
        !self.series.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.series.keys()
    }

    pub fn series(&self, symbol: &str) -> Option<&[PricePoint]> {
        self.series.get(symbol).map(|v| v.as_slice())
    }

    pub fn closes(&self, symbol: &str) -> Option<Vec<f64>> {
        self.series
            .get(symbol)
            .map(|points| points.iter().map(|p| p.close).collect())
    }

    pub fn last_close(&self, symbol: &str) -> Option<f64> {
        self.series
            .get(symbol)
            .and_then(|points| points.last())
            .map(|p| p.close)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.series
            .values()
            .filter_map(|points| points.last())
            .map(|p| p.date)
            .max()
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(day: u32, close: f64) -> PricePoint {
        PricePoint {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close,
            high: close + 1.0,
            low: close - 1.0,
        }
    }

    #[test]
    fn series_are_sorted_and_deduplicated_on_load() {
        let mut series = BTreeMap::new();
        series.insert(
            "AAA".to_string(),
            vec![point(3, 12.0), point(2, 11.0), point(2, 99.0)],
        );
        let data = MarketData::from_series(series);

        let aaa = data.series("AAA").unwrap();
        assert_eq!(aaa.len(), 2);
        assert!(aaa[0].date < aaa[1].date);
        assert_eq!(data.last_close("AAA"), Some(12.0));
    }

    #[test]
    fn snapshot_round_trips_in_both_formats() {
        let mut series = BTreeMap::new();
        series.insert("AAA".to_string(), vec![point(2, 10.0), point(3, 11.0)]);
        let data = MarketData::from_series(series);

        let dir = tempfile::tempdir().unwrap();
        for name in ["snap.json", "snap.bin"] {
            let path = dir.path().join(name);
            data.save_to_file(&path).unwrap();
            let back = MarketData::load_from_file(&path).unwrap();
            assert_eq!(back.series("AAA").unwrap(), data.series("AAA").unwrap());
        }
    }

    #[test]
    fn missing_symbol_yields_none() {
        let data = MarketData::default();
        assert!(data.series("ZZZ").is_none());
        assert!(data.last_close("ZZZ").is_none());
    }
}
