use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::crawler::SubmissionRecord;

/// Writes a submission's metadata record as pretty-printed UTF-8 JSON.
///
/// Keys follow the record's declaration order and non-ASCII text is
/// preserved unescaped.
pub fn write_metadata(path: &Path, record: &SubmissionRecord) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    record.serialize(&mut serializer)?;
    writer.flush()?;

    Ok(())
}
