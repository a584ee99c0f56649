//! The things a user can hand to the upload steps of the wizard, and the checks that are run on
//! them before anything is sent to the backend.

use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::{bail, Context};
use std::fmt::{Debug, Formatter};
use std::io::Cursor;
use std::path::Path;

/// Largest statement file the backend accepts.
pub const MAX_STATEMENT_BYTES: usize = 25 * 1024 * 1024;

/// Largest tag mapping file the backend accepts.
pub const MAX_TAG_MAPPING_BYTES: usize = 10 * 1024 * 1024;

const PRODUCT_HEADER: &str = "product";
const TAG_HEADER: &str = "tag";

/// A CSV file held in memory, ready to be sent as a multipart upload.
#[derive(Clone, Eq, PartialEq)]
pub struct UploadFile {
    file_name: String,
    contents: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }

    /// Reads `path` into memory. The file name sent to the backend is the last path component.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = utils::read_bytes(path).await.pub_result(ErrorType::Io)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self::new(file_name, contents))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Checks that this looks like a statement the backend can take.
    pub fn validate_statement(&self) -> Result<()> {
        self.validate_common(MAX_STATEMENT_BYTES)
            .pub_result(ErrorType::Validation)
    }

    /// Checks that this looks like a tag mapping: a CSV with `product` and `tag` columns.
    pub fn validate_tag_mapping(&self) -> Result<()> {
        self.validate_common(MAX_TAG_MAPPING_BYTES)
            .and_then(|_| self.validate_tag_mapping_headers())
            .pub_result(ErrorType::Validation)
    }

    fn validate_common(&self, max_bytes: usize) -> Res<()> {
        if !is_csv_name(&self.file_name) {
            bail!("File '{}' is not in CSV format", self.file_name);
        }
        if self.is_empty() {
            bail!("File '{}' is empty", self.file_name);
        }
        if self.len() > max_bytes {
            bail!(
                "File size exceeds the maximum limit of {} MB",
                max_bytes / (1024 * 1024)
            );
        }
        Ok(())
    }

    fn validate_tag_mapping_headers(&self) -> Res<()> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(Cursor::new(&self.contents));
        let headers = reader
            .headers()
            .with_context(|| format!("Unable to read the header row of '{}'", self.file_name))?;
        let has = |name: &str| headers.iter().any(|h| h.eq_ignore_ascii_case(name));
        if !has(PRODUCT_HEADER) || !has(TAG_HEADER) {
            bail!(
                "Tag mapping '{}' must have '{PRODUCT_HEADER}' and '{TAG_HEADER}' columns, found: {}",
                self.file_name,
                headers.iter().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(())
    }
}

impl Debug for UploadFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UploadFile({}, {} bytes)", self.file_name, self.contents.len())
    }
}

fn is_csv_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// What the user submits on the first wizard step. Exactly one of a real file or the sample data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StatementSource {
    File(UploadFile),
    Sample,
}

impl StatementSource {
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            StatementSource::File(file) => file.validate_statement(),
            StatementSource::Sample => Ok(()),
        }
    }

    pub(crate) fn success_notice(&self) -> &'static str {
        match self {
            StatementSource::File(_) => "File uploaded successfully!",
            StatementSource::Sample => "Sample data loaded successfully!",
        }
    }
}

/// What the user submits on the second wizard step. Skipping the step is not a source, it never
/// reaches the backend.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TagMappingSource {
    File(UploadFile),
    Sample,
}

impl TagMappingSource {
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            TagMappingSource::File(file) => file.validate_tag_mapping(),
            TagMappingSource::Sample => Ok(()),
        }
    }

    pub(crate) fn success_notice(&self) -> &'static str {
        match self {
            TagMappingSource::File(_) => "Tag mapping uploaded successfully!",
            TagMappingSource::Sample => "Sample tag mapping loaded!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_statement_must_be_csv() {
        let file = UploadFile::new("statement.xlsx", b"a,b\n1,2\n".to_vec());
        let err = file.validate_statement().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(err.to_string().contains("not in CSV format"));

        let file = UploadFile::new("STATEMENT.CSV", b"a,b\n1,2\n".to_vec());
        file.validate_statement().unwrap();
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let file = UploadFile::new("statement.csv", Vec::new());
        assert!(file.validate_statement().is_err());
    }

    #[test]
    fn test_tag_mapping_size_limit() {
        let mut contents = b"product,tag\n".to_vec();
        contents.resize(MAX_TAG_MAPPING_BYTES + 1, b'x');
        let err = UploadFile::new("tags.csv", contents)
            .validate_tag_mapping()
            .unwrap_err();
        assert!(err.to_string().contains("10 MB"));
    }

    #[test]
    fn test_tag_mapping_headers() {
        let good = UploadFile::new("tags.csv", b" Product , TAG \nAmazon Prime,Subscription\n".to_vec());
        good.validate_tag_mapping().unwrap();

        let bad = UploadFile::new("tags.csv", b"merchant,category\nAmazon,Shopping\n".to_vec());
        let err = bad.validate_tag_mapping().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(err.to_string().contains("merchant, category"));
    }

    #[tokio::test]
    async fn test_load_uses_file_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("march.csv");
        utils::write(&path, "Date,Narration\n").await.unwrap();
        let file = UploadFile::load(&path).await.unwrap();
        assert_eq!(file.file_name(), "march.csv");
        assert_eq!(file.len(), 15);

        let err = UploadFile::load(&dir.path().join("missing.csv"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Io);
    }
}
