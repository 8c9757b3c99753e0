use crate::codec::{BinaryCodec, Codec};
use crate::entity::Document;
use crate::schema::Schema;
use crate::statics;
use anyhow::Context;
use flate2::{Compression, GzBuilder, read::GzDecoder};
use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Binary,
    GzipBinary,
}

impl DocumentFormat {
    /// Format implied by a target path: `.gz` means gzip.
    pub fn for_path(path: &Path) -> Self {
        if path.extension().and_then(|e| e.to_str()) == Some(statics::GZ_EXTENSION) {
            DocumentFormat::GzipBinary
        } else {
            DocumentFormat::Binary
        }
    }
}

/// Where a document came from and the bytes it was read from, kept so an
/// unmodified document saves back byte-for-byte.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub source_path: Option<PathBuf>,
    pub format: DocumentFormat,
    pub original_bytes: Vec<u8>,
}

/// A decoded document together with its file metadata.
#[derive(Debug)]
pub struct LoadedDocument {
    pub file: DocumentFile,
    pub document: Document,
}

impl LoadedDocument {
    pub fn load_path(path: &Path, schema: &Arc<Schema>) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {path:?}"))?;
        let format = detect_format(path, &bytes);
        let mut loaded = Self::from_bytes(bytes, format, schema)
            .with_context(|| format!("loading {path:?}"))?;
        loaded.file.source_path = Some(path.to_path_buf());
        info!(?path, ?format, entities = loaded.document.len(), "loaded document");
        Ok(loaded)
    }

    pub fn from_bytes(
        bytes: Vec<u8>,
        format: DocumentFormat,
        schema: &Arc<Schema>,
    ) -> anyhow::Result<Self> {
        let raw = match format {
            DocumentFormat::Binary => bytes.clone(),
            DocumentFormat::GzipBinary => {
                let mut decoder = GzDecoder::new(&bytes[..]);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out).context("gzip decompress")?;
                out
            }
        };
        let document = BinaryCodec
            .read(schema, &mut &raw[..])
            .context("decoding document")?;
        Ok(Self {
            file: DocumentFile {
                source_path: None,
                format,
                original_bytes: bytes,
            },
            document,
        })
    }
}

impl DocumentFile {
    /// A file record for a document that has never been saved.
    pub fn unsaved(format: DocumentFormat) -> Self {
        Self {
            source_path: None,
            format,
            original_bytes: Vec::new(),
        }
    }

    /// Bytes to write for `format`. An unmodified document in its original
    /// format reuses the bytes it was loaded from.
    pub fn save_bytes_for_format(
        &self,
        document: &Document,
        format: DocumentFormat,
        modified: bool,
    ) -> anyhow::Result<Vec<u8>> {
        if !modified && format == self.format && !self.original_bytes.is_empty() {
            return Ok(self.original_bytes.clone());
        }
        generate_bytes_for_format(document, format)
    }

    pub fn save_to_path(
        &mut self,
        document: &Document,
        path: &Path,
        modified: bool,
    ) -> anyhow::Result<()> {
        let target_format = DocumentFormat::for_path(path);
        let bytes = self.save_bytes_for_format(document, target_format, modified)?;
        fs::write(path, &bytes).with_context(|| format!("writing {path:?}"))?;
        info!(?path, ?target_format, bytes = bytes.len(), "saved document");

        self.source_path = Some(path.to_path_buf());
        self.format = target_format;
        self.original_bytes = bytes;
        Ok(())
    }
}

/// Encode regardless of any cached bytes.
pub fn generate_bytes_for_format(
    document: &Document,
    format: DocumentFormat,
) -> anyhow::Result<Vec<u8>> {
    let mut raw = Vec::new();
    BinaryCodec
        .write(document, &mut raw)
        .context("encoding document")?;

    match format {
        DocumentFormat::Binary => Ok(raw),
        DocumentFormat::GzipBinary => {
            let mut encoder = GzBuilder::new()
                .mtime(0)
                .write(Vec::new(), Compression::default());
            encoder.write_all(&raw).context("gzip compress")?;
            let bytes = encoder.finish().context("gzip finish")?;
            Ok(bytes)
        }
    }
}

fn detect_format(path: &Path, bytes: &[u8]) -> DocumentFormat {
    if DocumentFormat::for_path(path) == DocumentFormat::GzipBinary {
        return DocumentFormat::GzipBinary;
    }
    if bytes.starts_with(&statics::GZIP_MAGIC) {
        return DocumentFormat::GzipBinary;
    }
    DocumentFormat::Binary
}

#[cfg(test)]
mod tests {
    use super::{DocumentFormat, detect_format};
    use std::path::Path;

    #[test]
    fn detect_format_uses_extension_and_magic() {
        let gz_magic = [0x1F_u8, 0x8B_u8, 0x08_u8, 0x00_u8];
        let plain = b"XDOC\x01\x00\x00\x00";

        assert_eq!(
            detect_format(Path::new("ui.xdat.gz"), plain),
            DocumentFormat::GzipBinary
        );
        assert_eq!(
            detect_format(Path::new("ui.xdat"), &gz_magic),
            DocumentFormat::GzipBinary
        );
        assert_eq!(
            detect_format(Path::new("ui.xdat"), plain),
            DocumentFormat::Binary
        );
    }
}
