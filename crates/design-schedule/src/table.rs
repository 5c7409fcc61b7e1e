//! Plain-text schedule tables
//!
//! One row per line, entries separated by whitespace. Loading also accepts
//! integral float literals such as `3.0` or `1.500000000000000000e+01`, the
//! shape numeric toolkits write integer matrices in.

use crate::{DesignSchedule, Result, ScheduleError};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

impl DesignSchedule {
    /// Write the table as space-separated integers
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut out = BufWriter::new(fs::File::create(path)?);
        for row in self.iter_rows() {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}", line.join(" "))?;
        }
        out.flush()?;
        info!(path = %path.display(), rows = self.rows(), "Saved schedule");
        Ok(())
    }

    /// Read a table written by [`DesignSchedule::save`] or any tool that
    /// emits one whitespace-separated row per line
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let schedule = Self::parse(&text)?;
        info!(
            path = %path.display(),
            rows = schedule.rows(),
            width = schedule.width(),
            "Loaded schedule"
        );
        Ok(schedule)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|token| parse_entry(token, i + 1))
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }
}

fn parse_entry(token: &str, line: usize) -> Result<usize> {
    if let Ok(v) = token.parse::<usize>() {
        return Ok(v);
    }
    match token.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(f as usize),
        _ => Err(ScheduleError::Parse {
            line,
            token: token.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.txt");

        let schedule = DesignSchedule::from_rows(vec![vec![0, 2, 1], vec![1, 0, 2]]).unwrap();
        schedule.save(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "0 2 1\n1 0 2\n");
        assert_eq!(DesignSchedule::load(&path).unwrap(), schedule);
    }

    #[test]
    fn test_parse_float_literals() {
        let text = "0.000000000000000000e+00 1.000000000000000000e+00\n1.0 0\n\n";
        let schedule = DesignSchedule::parse(text).unwrap();
        assert_eq!(schedule.row(0), &[0, 1]);
        assert_eq!(schedule.row(1), &[1, 0]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            DesignSchedule::parse("0 1\n1 x\n"),
            Err(ScheduleError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            DesignSchedule::parse("0 1.5\n"),
            Err(ScheduleError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            DesignSchedule::parse("0 1\n1\n"),
            Err(ScheduleError::RaggedRow { row: 1, .. })
        ));
        assert!(matches!(
            DesignSchedule::parse("-1 0\n"),
            Err(ScheduleError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            DesignSchedule::load(dir.path().join("absent.txt")),
            Err(ScheduleError::Io(_))
        ));
    }
}
