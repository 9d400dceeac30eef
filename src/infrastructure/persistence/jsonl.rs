//! Append-only JSON lines files.

use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::AppError;

/// Appends one JSON object per item with a single write.
///
/// Nothing is written if any item fails to serialize. If the file ends in a
/// torn line, the new lines start after a line break so they stay readable.
pub async fn append<T: Serialize>(path: &Path, items: &[T]) -> Result<(), AppError> {
    if items.is_empty() {
        return Ok(());
    }

    let mut buf = Vec::with_capacity(items.len() * 128 + 1);
    for item in items {
        serde_json::to_writer(&mut buf, item)?;
        buf.push(b'\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await?;

    if ends_torn(&mut file).await? {
        buf.insert(0, b'\n');
    }

    file.write_all(&buf).await?;
    file.flush().await?;

    Ok(())
}

/// Returns true if the file is non-empty and its last byte is not a newline.
async fn ends_torn(file: &mut fs::File) -> Result<bool, AppError> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1)).await?;
    file.read_exact(&mut last).await?;

    Ok(last[0] != b'\n')
}

/// Reads every object in the file. A missing file reads as empty.
///
/// Lines that fail to parse (for example a torn final write) are skipped.
pub async fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AppError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut items = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "Skipping corrupted storage line"
            ),
        }
    }

    Ok(items)
}

/// Creates the parent directory of `path` if it does not exist.
pub async fn ensure_parent(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}
