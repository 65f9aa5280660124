//! On-disk form of a vector snapshot: one JSON file, replaced by rename.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use docrag_core::types::IndexRecord;
use docrag_core::{Error, Result};

pub const RECORDS_FILE: &str = "records.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct RecordsFileRef<'a> {
    version: u32,
    dimension: Option<usize>,
    records: Vec<&'a IndexRecord>,
}

#[derive(Deserialize)]
struct RecordsFile {
    version: u32,
    dimension: Option<usize>,
    records: Vec<IndexRecord>,
}

/// Reads a snapshot file; `None` when it does not exist yet.
pub fn load(path: &Path) -> Result<Option<(Option<usize>, Vec<IndexRecord>)>> {
    if !path.exists() {
        return Ok(None);
    }
    let file: RecordsFile = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    if file.version != FORMAT_VERSION {
        return Err(Error::index_unavailable(format!(
            "{} has format version {}, expected {FORMAT_VERSION}",
            path.display(),
            file.version
        )));
    }
    Ok(Some((file.dimension, file.records)))
}

/// Writes the snapshot next to `path` without replacing it.
pub fn write_staged<'a, I>(path: &Path, dimension: Option<usize>, records: I) -> Result<NamedTempFile>
where
    I: IntoIterator<Item = &'a IndexRecord>,
{
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let body = RecordsFileRef { version: FORMAT_VERSION, dimension, records: records.into_iter().collect() };
        serde_json::to_writer(&mut writer, &body)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Atomically replaces `path` with a staged file.
pub fn publish(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
