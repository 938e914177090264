use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use huddle_types::models::{FileId, FileRecord, Identity};

use crate::error::GatewayError;

/// 10 MB decoded upload limit
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

const MAX_NAME_BYTES: usize = 255;

/// An upload accepted by the coordinator and waiting to be written.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub id: FileId,
    /// Already sanitized.
    pub name: String,
    pub mime: String,
    /// Data URL or bare base64.
    pub payload: String,
    pub uploader: Identity,
}

/// Writes uploads to disk and publishes them.
///
/// Bytes go to `{root}/.staging/{id}` first and are renamed into
/// `{root}/public/` only once fully written and synced. Only `public/` is
/// served, so a half-written file is never reachable.
#[derive(Debug)]
pub struct UploadStore {
    staging: PathBuf,
    public: PathBuf,
    url_prefix: String,
    max_size: usize,
}

impl UploadStore {
    pub async fn new(
        root: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
        max_size: usize,
    ) -> anyhow::Result<Self> {
        let root = root.into();
        let staging = root.join(".staging");
        let public = root.join("public");
        fs::create_dir_all(&staging).await?;
        fs::create_dir_all(&public).await?;
        info!("Upload directory: {}", public.display());

        Ok(Self {
            staging,
            public,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            max_size,
        })
    }

    pub fn public_dir(&self) -> &Path {
        &self.public
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Upper bound on the base64 text length for `max_size` bytes, plus room
    /// for a data-URL prefix.
    pub fn max_payload_len(&self) -> usize {
        self.max_size.div_ceil(3) * 4 + 256
    }

    /// Decode, write, and publish. Nothing is left behind on failure.
    pub async fn store(&self, upload: PendingUpload) -> Result<FileRecord, GatewayError> {
        let bytes = decode_payload(&upload.payload)?;
        if bytes.is_empty() {
            return Err(GatewayError::validation("empty file"));
        }
        if bytes.len() > self.max_size {
            return Err(GatewayError::validation(format!(
                "file exceeds {} bytes",
                self.max_size
            )));
        }

        let staged = self.staging.join(upload.id.to_string());
        let digest = match write_staged(&staged, &bytes).await {
            Ok(digest) => digest,
            Err(e) => {
                discard(&staged).await;
                return Err(e.into());
            }
        };

        let file_name = format!("{}-{}", upload.id, upload.name);
        let published = self.public.join(&file_name);
        if let Err(e) = fs::rename(&staged, &published).await {
            discard(&staged).await;
            return Err(e.into());
        }

        info!(
            "Published upload {} ({} bytes) for {}",
            file_name,
            bytes.len(),
            upload.uploader
        );

        Ok(FileRecord {
            id: upload.id,
            name: upload.name,
            url: format!("{}/{}", self.url_prefix, file_name),
            storage_path: file_name,
            size: bytes.len() as u64,
            mime: if upload.mime.is_empty() {
                "application/octet-stream".to_string()
            } else {
                upload.mime
            },
            uploader: upload.uploader,
            sha256: digest,
            created_at: Utc::now(),
        })
    }
}

async fn write_staged(path: &Path, bytes: &[u8]) -> std::io::Result<String> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(hex::encode(hasher.finalize()))
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged upload {}: {}", path.display(), e),
    }
}

/// Accepts `data:<mime>;base64,<data>` or bare base64. Undecodable input is
/// reported as `InvalidData`.
fn decode_payload(payload: &str) -> Result<Vec<u8>, GatewayError> {
    let data = match payload.split_once(";base64,") {
        Some((_, data)) => data,
        None => payload,
    };
    B64.decode(data.trim()).map_err(|e| {
        GatewayError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("file is not valid base64: {e}"),
        ))
    })
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._ -]` becomes
/// `_`. Returns `None` if nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let mut clean = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
            c
        } else {
            '_'
        };
        if clean.len() + c.len_utf8() > MAX_NAME_BYTES {
            break;
        }
        clean.push(c);
    }

    let clean = clean.trim().trim_start_matches('.').to_string();
    if clean.is_empty() { None } else { Some(clean) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pending(payload: &str) -> PendingUpload {
        PendingUpload {
            id: Uuid::new_v4(),
            name: "notes.txt".into(),
            mime: "text/plain".into(),
            payload: payload.into(),
            uploader: Identity::guest("ann"),
        }
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("C:\\temp\\a b.png").as_deref(), Some("a b.png"));
        assert_eq!(sanitize_file_name("héllo?.txt").as_deref(), Some("h_llo_.txt"));
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(&"x".repeat(400)).map(|n| n.len()), Some(255));
    }

    #[test]
    fn decodes_data_urls_and_bare_base64() {
        assert_eq!(decode_payload("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert_eq!(decode_payload("aGk=").unwrap(), b"hi");
        assert!(decode_payload("data:text/plain;base64,@@@").is_err());
    }

    #[tokio::test]
    async fn publishes_only_complete_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), "/uploads", MAX_UPLOAD_SIZE)
            .await
            .unwrap();

        let upload = pending("data:text/plain;base64,aGVsbG8=");
        let id = upload.id;
        let record = store.store(upload).await.unwrap();

        assert_eq!(record.size, 5);
        assert_eq!(record.url, format!("/uploads/{id}-notes.txt"));
        assert_eq!(
            record.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        let stored = std::fs::read(store.public_dir().join(&record.storage_path)).unwrap();
        assert_eq!(stored, b"hello");
        assert_eq!(std::fs::read_dir(dir.path().join(".staging")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rejects_bad_payloads_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), "/uploads", 4).await.unwrap();

        assert!(matches!(
            store.store(pending("not base64!")).await,
            Err(GatewayError::Io(_))
        ));
        assert!(matches!(
            store.store(pending("aGVsbG8=")).await,
            Err(GatewayError::Validation(_))
        ));
        assert!(matches!(
            store.store(pending("")).await,
            Err(GatewayError::Validation(_))
        ));

        assert_eq!(std::fs::read_dir(store.public_dir()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join(".staging")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_publish_discards_staged_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), "/uploads", MAX_UPLOAD_SIZE)
            .await
            .unwrap();
        std::fs::remove_dir_all(store.public_dir()).unwrap();

        assert!(matches!(
            store.store(pending("aGVsbG8=")).await,
            Err(GatewayError::Io(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path().join(".staging")).unwrap().count(), 0);
    }
}
