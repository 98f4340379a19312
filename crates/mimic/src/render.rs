//! CSV rendering.
//!
//! The `.csv` endpoint variants serve the exact dataset their JSON twins
//! serve: the header row is the serde field identifiers, records follow in
//! JSON-array order, timestamps stay RFC 3339 in UTC. Headers come from the
//! csv crate's serde integration, so the row structs are the single source
//! of truth for both formats.

use anyhow::{Context, Result};
use serde::Serialize;

/// Render rows to a CSV document. An empty slice renders to an empty
/// document (there is no instance to derive headers from).
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .context("failed to serialize row to CSV")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush CSV writer: {err}"))?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}
