use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tracing::{debug, warn};
use tracker_core::PricingTable;

use crate::error::{AppError, Result};

/// Pricing from the JSON rule list at `path`, or the built-in table.
pub fn load_pricing(path: Option<&Path>) -> Result<PricingTable> {
    let Some(path) = path else {
        return Ok(PricingTable::default());
    };
    if !path.exists() {
        return Err(AppError::Config(format!(
            "pricing file {} not found",
            path.display()
        )));
    }
    let file = fs::File::open(path)?;
    let table: PricingTable = serde_json::from_reader(BufReader::new(file))?;
    if table.is_empty() {
        warn!(path = %path.display(), "pricing file has no rules, every cost will be 0");
    }
    debug!(path = %path.display(), rules = table.rules().len(), "loaded pricing");
    Ok(table)
}

pub fn write_pricing(path: &Path, table: &PricingTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), table).map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::{PricingRate, PricingRule};

    #[test]
    fn no_path_uses_builtin_table() {
        let table = load_pricing(None).expect("pricing");
        assert_eq!(table, PricingTable::default());
    }

    #[test]
    fn written_table_loads_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pricing.json");
        let table = PricingTable::new(vec![PricingRule::new(
            "*custom*",
            PricingRate::with_standard_cache(2.0, 8.0),
        )]);
        write_pricing(&path, &table).expect("write");
        assert_eq!(load_pricing(Some(&path)).expect("load"), table);
    }

    #[test]
    fn missing_or_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.json");
        assert!(matches!(load_pricing(Some(&missing)), Err(AppError::Config(_))));
        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{not json").expect("write");
        assert!(matches!(load_pricing(Some(&broken)), Err(AppError::Json(_))));
    }
}
