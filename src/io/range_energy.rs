//! Range-energy CSV tables.
//!
//! The file starts with a `Range_mm,Energy_MeV` header followed by one row per
//! depth: the depth in mm and the residual proton kinetic energy in MeV there.
//! Extra columns are ignored; blank lines are skipped.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::sim::beam::{RangeEnergyPoint, RangeEnergyTable};

const DEPTH_COLUMN: &str = "Range_mm";
const ENERGY_COLUMN: &str = "Energy_MeV";

/// Reads and validates a range-energy table from a CSV file.
pub fn read_range_energy_csv(path: &Path) -> Result<RangeEnergyTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read range-energy file: {}", path.display()))?;
    parse_range_energy_csv(&content)
        .with_context(|| format!("Invalid range-energy file: {}", path.display()))
}

/// Parses range-energy CSV content.
pub fn parse_range_energy_csv(content: &str) -> Result<RangeEnergyTable> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().context("Range-energy file is empty")?;
    let columns: Vec<&str> = header.split(',').map(|c| c.trim()).collect();
    let depth_col = columns
        .iter()
        .position(|&c| c == DEPTH_COLUMN)
        .with_context(|| format!("Missing '{DEPTH_COLUMN}' column in header"))?;
    let energy_col = columns
        .iter()
        .position(|&c| c == ENERGY_COLUMN)
        .with_context(|| format!("Missing '{ENERGY_COLUMN}' column in header"))?;

    let mut points = Vec::new();
    for (i, line) in lines {
        let fields: Vec<&str> = line.split(',').collect();
        anyhow::ensure!(
            fields.len() == columns.len(),
            "Expected {} fields at line {}, found {}",
            columns.len(),
            i + 1,
            fields.len()
        );
        let depth: f64 = fields[depth_col]
            .trim()
            .parse()
            .with_context(|| format!("Invalid depth at line {}", i + 1))?;
        let energy: f64 = fields[energy_col]
            .trim()
            .parse()
            .with_context(|| format!("Invalid energy at line {}", i + 1))?;
        points.push(RangeEnergyPoint::new(depth, energy));
    }

    Ok(RangeEnergyTable::new(points)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::beam::RangeEnergyProvider;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_table() -> Result<()> {
        let table = parse_range_energy_csv("Range_mm,Energy_MeV\n0,150\n1,149.5\n2,149\n\n")?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.energy_at(1.0)?, 149.5);
        assert_eq!(table.depth_range(), (0.0, 2.0));
        Ok(())
    }

    #[test]
    fn test_columns_in_any_order() -> Result<()> {
        let table = parse_range_energy_csv("Energy_MeV, Range_mm, note\n10, 0, a\n0, 5, b\n")?;
        assert_eq!(table.energy_at(0.0)?, 10.0);
        assert!((table.energy_at(2.5)? - 5.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_files() {
        assert!(parse_range_energy_csv("").is_err());
        assert!(parse_range_energy_csv("depth,energy\n0,1\n1,0\n").is_err());
        assert!(parse_range_energy_csv("Range_mm,Energy_MeV\n0,abc\n1,0\n").is_err());
        assert!(parse_range_energy_csv("Range_mm,Energy_MeV\n0\n1,0\n").is_err());
        // Only one row
        assert!(parse_range_energy_csv("Range_mm,Energy_MeV\n0,10\n").is_err());
        // Energy grows with depth
        let err = parse_range_energy_csv("Range_mm,Energy_MeV\n0,1\n1,2\n").unwrap_err();
        assert!(format!("{err:#}").contains("must not increase"));
    }

    #[test]
    fn test_read_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "Range_mm,Energy_MeV")?;
        for z in 0..=300 {
            let energy = (150.0 - z as f64).max(0.0);
            writeln!(file, "{z},{energy}")?;
        }
        let table = read_range_energy_csv(file.path())?;
        assert_eq!(table.len(), 301);
        assert_eq!(table.energy_at(200.0)?, 0.0);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = read_range_energy_csv(Path::new("/nonexistent/table.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to read range-energy file"));
    }
}
