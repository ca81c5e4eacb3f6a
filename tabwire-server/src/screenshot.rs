//! Screenshot artifacts
//!
//! The agent returns captures as `data:image/png;base64,...` URLs; the bridge
//! writes them out as timestamped PNG files.

use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("not a data URL")]
    NotDataUrl,

    #[error("data URL is not base64 encoded")]
    NotBase64,

    #[error("invalid base64 image data: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("cannot create {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Decode the payload of a base64 data URL
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, ScreenshotError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(ScreenshotError::NotDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(ScreenshotError::NotDataUrl)?;
    if !meta.ends_with(";base64") {
        return Err(ScreenshotError::NotBase64);
    }
    Ok(STANDARD.decode(payload.trim())?)
}

/// Decode `data_url` and write it to `dir` as `screenshot_<timestamp>.png`
///
/// Two captures within the same second get a numeric suffix instead of
/// overwriting each other.
pub async fn save_data_url(
    dir: &Path,
    data_url: &str,
    taken_at: DateTime<Local>,
) -> Result<PathBuf, ScreenshotError> {
    let bytes = decode_data_url(data_url)?;

    fs::create_dir_all(dir)
        .await
        .map_err(|source| ScreenshotError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

    let stamp = taken_at.format("%Y%m%d_%H%M%S");
    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => format!("screenshot_{}.png", stamp),
            n => format!("screenshot_{}_{}.png", stamp, n),
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(mut file) => {
                let written = async {
                    file.write_all(&bytes).await?;
                    file.flush().await
                }
                .await;
                written.map_err(|source| ScreenshotError::Write {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), bytes = bytes.len(), "Screenshot saved");
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(ScreenshotError::Write { path, source }),
        }
    }
}
