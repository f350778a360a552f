//! Unpacking of mirrored month archives into per-hour grid files.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use zip::ZipArchive;

use aorc_common::time::year_month;
use storage::ObjectStorage;

use crate::error::{MirrorError, MirrorResult};
use crate::transfer::TransferRecord;

/// The files unpacked from one mirrored archive.
#[derive(Debug, Clone)]
pub struct ExtractedArchive {
    pub region_alias: String,
    pub mirror_uri: String,
    /// Extracted file paths, sorted.
    pub paths: Vec<PathBuf>,
}

/// Streams mirrored archives back out of blob storage and unpacks them.
pub struct ArchiveExtractor {
    storage: Arc<ObjectStorage>,
    scratch_dir: PathBuf,
}

impl ArchiveExtractor {
    pub fn new(storage: Arc<ObjectStorage>, scratch_dir: PathBuf) -> Self {
        Self {
            storage,
            scratch_dir,
        }
    }

    /// Unpack one mirrored archive into a per-archive scratch subdirectory.
    ///
    /// Format and I/O errors are fatal for this one archive only and are not
    /// retried; format errors are not transient.
    pub async fn extract(&self, record: &TransferRecord) -> MirrorResult<ExtractedArchive> {
        let data = self.storage.get(&record.mirror_key).await?;

        let dest = self.scratch_dir.join(format!(
            "{}_{}",
            record.region_alias,
            year_month(record.ref_month)
        ));
        tokio::fs::create_dir_all(&dest).await?;

        let paths = unpack_zip(data, &dest, &record.mirror_uri)?;

        info!(
            archive = %record.mirror_uri,
            files = paths.len(),
            dest = %dest.display(),
            "archive extracted"
        );

        Ok(ExtractedArchive {
            region_alias: record.region_alias.clone(),
            mirror_uri: record.mirror_uri.clone(),
            paths,
        })
    }
}

fn unpack_zip(data: Bytes, dest: &Path, label: &str) -> MirrorResult<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| MirrorError::Archive(label.to_string(), e.to_string()))?;

    let mut paths = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| MirrorError::Archive(label.to_string(), e.to_string()))?;

        if entry.is_dir() {
            continue;
        }

        let Some(relative) = entry.enclosed_name() else {
            warn!(archive = %label, name = %entry.name(), "skipping unsafe member path");
            continue;
        };

        let out_path = dest.join(relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)
            .map_err(|e| MirrorError::Archive(label.to_string(), e.to_string()))?;

        paths.push(out_path);
    }

    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Bytes {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        Bytes::from(writer.finish().unwrap().into_inner())
    }

    #[test]
    fn test_unpack_zip() {
        let data = zip_bytes(&[
            ("AORC_APCP_4KM_ABRFC_1979020100.nc4", b"grid-00".as_slice()),
            ("AORC_APCP_4KM_ABRFC_1979020101.nc4", b"grid-01".as_slice()),
        ]);

        let dest = tempfile::tempdir().unwrap();
        let paths = unpack_zip(data, dest.path(), "s3://tempest/a.zip").unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("AORC_APCP_4KM_ABRFC_1979020100.nc4"));
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"grid-00");
    }

    #[test]
    fn test_unpack_rejects_non_zip() {
        let dest = tempfile::tempdir().unwrap();
        let result = unpack_zip(
            Bytes::from_static(b"definitely not a zip"),
            dest.path(),
            "s3://tempest/bad.zip",
        );
        assert!(matches!(result, Err(MirrorError::Archive(_, _))));
    }
}
