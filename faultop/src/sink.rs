//! Snapshot persistence seam. The orchestrator hands every snapshot to a
//! sink; the CSV sink writes the header once from the first snapshot's keys
//! and appends one row per snapshot.

use std::fs::File;
use std::path::Path;

use crate::error::Error;
use crate::types::Snapshot;

pub trait SnapshotSink {
    fn write(&mut self, snapshot: &Snapshot) -> Result<(), Error>;
}

pub struct CsvSink {
    writer: csv::Writer<File>,
    header_written: bool,
}

impl CsvSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path.as_ref())?;
        Ok(Self { writer, header_written: false })
    }
}

impl SnapshotSink for CsvSink {
    fn write(&mut self, snapshot: &Snapshot) -> Result<(), Error> {
        let rows = snapshot.rows();
        if !self.header_written {
            self.writer.write_record(rows.iter().map(|(k, _)| k.as_str()))?;
            self.header_written = true;
        }
        self.writer.write_record(rows.iter().map(|(_, v)| v.as_str()))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Retains every snapshot in memory; used by tests.
#[derive(Default)]
pub struct VecSink {
    pub snapshots: Vec<Snapshot>,
}

impl SnapshotSink for VecSink {
    fn write(&mut self, snapshot: &Snapshot) -> Result<(), Error> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CoreUsage, MemoryUsage};

    fn snapshot(injector: &str) -> Snapshot {
        Snapshot {
            time_ms: 1,
            datetime: "2026-08-26 12:00:00".into(),
            core_times: Vec::new(),
            cores: vec![CoreUsage { usage_pct: 5.0, freq_mhz: 2000 }],
            cpu_pct: 5.0,
            core_temps: Vec::new(),
            memory: MemoryUsage::default(),
            injector: injector.into(),
        }
    }

    #[test]
    fn csv_sink_writes_header_once_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.write(&snapshot("None")).unwrap();
        sink.write(&snapshot("[mem]MemoryStressInjector(d1-i8)")).unwrap();
        drop(sink);

        let data = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = data.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("time_ms,datetime"));
        assert!(lines[0].ends_with("injector"));
        assert!(lines[1].ends_with("None"));
        assert!(lines[2].contains("MemoryStressInjector"));
    }
}
