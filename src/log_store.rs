use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use log::{debug, warn};

use crate::error::{MttrError, Result};
use crate::metric_store::sync_dir;
use crate::models::{BuildRecord, Project};

/// Appends a record to the project's outcome log and syncs it to disk.
///
/// If a previous write was cut short and left the file without a trailing
/// newline, the new record starts on a fresh line so the fragment stays
/// isolated.
pub fn append(project: &Project, record: &BuildRecord) -> Result<()> {
    fs::create_dir_all(project.root_dir())?;
    let created = !project.log_path().exists();

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(project.log_path())?;

    let mut line = String::new();
    if ends_with_fragment(&mut file)? {
        warn!(
            "Outcome log for {} ends with an incomplete entry; starting a new line",
            project.name()
        );
        line.push('\n');
    }
    line.push_str(&serde_json::to_string(record)?);
    line.push('\n');

    file.write_all(line.as_bytes())?;
    file.flush()?;
    file.sync_data()?;
    if created {
        sync_dir(project.root_dir())?;
    }

    debug!(
        "Appended build #{} ({:?}) to {}",
        record.build_number,
        record.result,
        project.log_path().display()
    );

    Ok(())
}

fn ends_with_fragment(file: &mut fs::File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;

    Ok(last[0] != b'\n')
}

/// Reads every record in append order.
///
/// A missing log means no builds have completed yet. Lines that fail to parse
/// (typically a write truncated by a crash) are dropped with a warning and the
/// remaining records are still returned.
pub fn read_all(project: &Project) -> Result<Vec<BuildRecord>> {
    let bytes = match fs::read(project.log_path()) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No outcome log yet for {}", project.name());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
    let last_index = lines.len().saturating_sub(1);

    let mut records = Vec::with_capacity(lines.len());
    for (index, raw) in lines.iter().enumerate() {
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match parse_line(raw, index + 1) {
            Ok(record) => records.push(record),
            Err(e) if index == last_index => {
                warn!(
                    "Discarding trailing fragment of outcome log for {}: {e}",
                    project.name()
                );
            }
            Err(e) => {
                warn!(
                    "Skipping unreadable entry in outcome log for {}: {e}",
                    project.name()
                );
            }
        }
    }

    Ok(records)
}

fn parse_line(raw: &[u8], line: usize) -> Result<BuildRecord> {
    serde_json::from_slice(raw).map_err(|e| MttrError::CorruptRecord {
        line,
        reason: e.to_string(),
    })
}
