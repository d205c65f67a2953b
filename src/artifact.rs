//! Zip packaging of generated source for upload.

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::synth::GeneratedSource;

/// Archive entry holding the function module
pub const SOURCE_FILE_NAME: &str = "main.py";
/// Archive entry holding the dependency manifest
pub const MANIFEST_FILE_NAME: &str = "requirements.txt";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to build archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns generated source into a deployable archive
pub trait Packager: Send + Sync {
    fn package(&self, source: &GeneratedSource) -> Result<Vec<u8>, ArtifactError>;
}

/// Deflated zip with `main.py` and `requirements.txt`, nothing else.
///
/// Entry timestamps are pinned so the same input always yields the same bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipPackager;

impl Packager for ZipPackager {
    fn package(&self, source: &GeneratedSource) -> Result<Vec<u8>, ArtifactError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        writer.start_file(SOURCE_FILE_NAME, options)?;
        writer.write_all(source.source_code.as_bytes())?;

        writer.start_file(MANIFEST_FILE_NAME, options)?;
        writer.write_all(source.dependency_manifest.as_bytes())?;

        let bytes = writer.finish()?.into_inner();
        debug!(archive_bytes = bytes.len(), "Packaged function archive");
        Ok(bytes)
    }
}
