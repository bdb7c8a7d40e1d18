//! Tabular output of scored rows.

use crate::compute::ScoredRow;
use crate::config::ScoreConfig;
use std::io;

/// Writes `company,year,<metric names in configuration order>`, then one line per
/// row. Values use two decimals; a null metric is an empty cell.
pub fn write_csv<W: io::Write>(writer: W, config: &ScoreConfig, rows: &[ScoredRow]) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec!["company".to_string(), "year".to_string()];
    header.extend(config.metric_names().map(str::to_string));
    out.write_record(&header)?;

    for row in rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.key.entity().to_string());
        record.push(row.key.year().to_string());
        for name in config.metric_names() {
            record.push(row.metric(name).map(|v| format!("{v:.2}")).unwrap_or_default());
        }
        out.write_record(&record)?;
    }
    out.flush()?;
    Ok(())
}
