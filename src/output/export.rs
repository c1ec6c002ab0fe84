use crate::Result;
use std::path::Path;
use tracing::info;

/// Writes a list of results to a CSV file
///
/// The file gets an `S/N` column numbering the rows from 1 and one column
/// named `heading` holding the values.
pub fn export_csv<T: AsRef<str>>(path: &Path, heading: &str, results: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["S/N", heading])?;
    for (index, value) in results.iter().enumerate() {
        let serial = (index + 1).to_string();
        writer.write_record([serial.as_str(), value.as_ref()])?;
    }
    writer.flush()?;

    info!("Exported {} rows to {}", results.len(), path.display());
    Ok(())
}
