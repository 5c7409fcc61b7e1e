//! Traffic matrices over access nodes
//!
//! `weight(i, j)` is the demand from access node `i` to access node `j`.
//! Demands at or below [`MIN_DEMAND`] and the diagonal are never routed.

use crate::{Result, SimError};
use clos_fabric::FabricError;
use std::fs;
use std::path::Path;
use tracing::info;

/// Smallest demand that is routed
pub const MIN_DEMAND: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficMatrix {
    size: usize,
    weights: Vec<f64>,
}

impl TrafficMatrix {
    /// Square matrix from rows; entries must be finite and non-negative
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let size = rows.len();
        let mut weights = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(SimError::RaggedTraffic {
                    row: i,
                    expected: size,
                    found: row.len(),
                });
            }
            if let Some(bad) = row.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
                return Err(SimError::TrafficParse {
                    line: i + 1,
                    token: bad.to_string(),
                });
            }
            weights.extend(row);
        }
        Ok(Self { size, weights })
    }

    /// Every access node sends weight 1 to `destination`
    pub fn all_to_one(size: usize, destination: usize) -> Result<Self> {
        if destination >= size {
            return Err(FabricError::TargetOutOfRange {
                target: destination,
                access_count: size,
            }
            .into());
        }
        let mut weights = vec![0.0; size * size];
        for s in 0..size {
            weights[s * size + destination] = 1.0;
        }
        Ok(Self { size, weights })
    }

    /// Weight 1 between every ordered pair of distinct nodes
    pub fn uniform(size: usize) -> Self {
        let mut weights = vec![1.0; size * size];
        for i in 0..size {
            weights[i * size + i] = 0.0;
        }
        Self { size, weights }
    }

    /// Whitespace-separated rows, one per line
    pub fn parse(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|t| {
                    t.parse::<f64>().map_err(|_| SimError::TrafficParse {
                        line: i + 1,
                        token: t.to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let matrix = Self::parse(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), size = matrix.size(), "Loaded traffic matrix");
        Ok(matrix)
    }

    /// `uniform`, `all-to-one:<dest>`, or a path to a matrix file
    pub fn from_spec(spec: &str, size: usize) -> Result<Self> {
        let spec = spec.trim();
        if spec == "uniform" {
            return Ok(Self::uniform(size));
        }
        if let Some(dest) = spec.strip_prefix("all-to-one:") {
            let dest = dest
                .trim()
                .trim_start_matches("acc")
                .parse::<usize>()
                .map_err(|_| SimError::UnknownTraffic(spec.to_string()))?;
            return Self::all_to_one(size, dest);
        }
        let path = Path::new(spec);
        if path.is_file() {
            return Self::load(path);
        }
        Err(SimError::UnknownTraffic(spec.to_string()))
    }

    /// Number of access nodes covered
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn weight(&self, source: usize, destination: usize) -> f64 {
        self.weights[source * self.size + destination]
    }

    /// Routable demands toward one destination as `(source, weight)`
    pub fn demands_to(&self, destination: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..self.size)
            .filter(move |&s| s != destination)
            .map(move |s| (s, self.weight(s, destination)))
            .filter(|&(_, w)| w > MIN_DEMAND)
    }

    /// All routable demands as `(source, destination, weight)`, grouped by
    /// destination
    pub fn demands(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.size).flat_map(move |d| self.demands_to(d).map(move |(s, w)| (s, d, w)))
    }

    /// Sum of routable demand
    pub fn total(&self) -> f64 {
        self.demands().map(|(_, _, w)| w).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_all_to_one() {
        let matrix = TrafficMatrix::all_to_one(8, 3).unwrap();
        let demands: Vec<_> = matrix.demands().collect();
        assert_eq!(demands.len(), 7);
        assert!(demands.iter().all(|&(s, d, w)| d == 3 && s != 3 && w == 1.0));
        assert!(TrafficMatrix::all_to_one(8, 8).is_err());
    }

    #[test]
    fn test_uniform_skips_diagonal() {
        let matrix = TrafficMatrix::uniform(4);
        assert_eq!(matrix.demands().count(), 12);
        assert_eq!(matrix.total(), 12.0);
        assert_eq!(matrix.weight(2, 2), 0.0);
    }

    #[test]
    fn test_tiny_demands_ignored() {
        let matrix = TrafficMatrix::parse("0 1e-8\n2.5 0\n").unwrap();
        let demands: Vec<_> = matrix.demands().collect();
        assert_eq!(demands, vec![(1, 0, 2.5)]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            TrafficMatrix::parse("0 1\n1\n"),
            Err(SimError::RaggedTraffic { row: 1, .. })
        ));
        assert!(matches!(
            TrafficMatrix::parse("0 x\n1 0\n"),
            Err(SimError::TrafficParse { line: 1, .. })
        ));
        assert!(TrafficMatrix::parse("0 -1\n1 0\n").is_err());
    }

    #[test]
    fn test_from_spec() {
        assert_eq!(TrafficMatrix::from_spec("uniform", 4).unwrap(), TrafficMatrix::uniform(4));
        assert_eq!(
            TrafficMatrix::from_spec("all-to-one:acc2", 8).unwrap(),
            TrafficMatrix::all_to_one(8, 2).unwrap()
        );

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0 1\n1 0\n").unwrap();
        let spec = file.path().to_string_lossy().to_string();
        assert_eq!(TrafficMatrix::from_spec(&spec, 2).unwrap().size(), 2);

        assert!(matches!(
            TrafficMatrix::from_spec("gravity", 4),
            Err(SimError::UnknownTraffic(_))
        ));
    }
}
