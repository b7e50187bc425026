pub mod solve;
pub mod verify;

use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use timeforge::TfResult;

/// Writes `value` as pretty JSON to `dir/name`, creating `dir` if needed.
pub fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> TfResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(path)
}
