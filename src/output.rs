//! JSON-lines serialization of harvested records.
use std::io::{self, Write};

use crate::feed::Record;

/// Writes one JSON object per record, each followed by a newline.
///
/// Returns the number of records written. The writer is flushed before
/// returning.
pub fn write_json_lines<W: Write>(records: &[Record], mut writer: W) -> io::Result<usize> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(records.len())
}
