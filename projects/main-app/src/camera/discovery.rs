use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::v4l2_backend::V4L2_CLASS_DIR;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraDeviceInfo {
    pub name: String,
    pub path: String,
}

pub async fn probe_cameras() -> Result<Vec<CameraDeviceInfo>> {
    probe_cameras_in(Path::new(V4L2_CLASS_DIR)).await
}

/// Lists `videoN` entries of a V4L2 class directory. A missing directory
/// yields an empty list.
pub async fn probe_cameras_in(class_dir: &Path) -> Result<Vec<CameraDeviceInfo>> {
    let mut dir = match tokio::fs::read_dir(class_dir).await {
        Ok(dir) => dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read {}", class_dir.display()));
        }
    };

    let mut devices = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let node = entry.file_name().to_string_lossy().into_owned();
        if !node.starts_with("video") {
            continue;
        }

        let name = tokio::fs::read_to_string(entry.path().join("name"))
            .await
            .map(|raw| raw.trim().to_owned())
            .ok()
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| node.clone());
        devices.push(CameraDeviceInfo {
            name,
            path: format!("/dev/{node}"),
        });
    }
    devices.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(devices)
}
