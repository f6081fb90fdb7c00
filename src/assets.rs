use crate::config::Settings;
use crate::errors::{AppError, AppResult, ValidationErrors};
use crate::models::{AssetKind, AssetRef, DocumentMeta, IdentityRecord, TenantId};
use crate::validation::is_valid_email;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const LOGO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "svg"];

pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "png", "jpg", "jpeg", "webp", "svg", "txt", "csv", "doc", "docx", "xls", "xlsx", "odt", "ods",
];

const LOGO_DIR: &str = "logo";
const DOCUMENTS_DIR: &str = "documents";
const IDENTITY_FILE: &str = "identity.json";
const TEMP_PREFIX: &str = ".upload-";
const MAX_DOCUMENT_STEM: usize = 100;

pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "xls" => Some("application/vnd.ms-excel"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "odt" => Some("application/vnd.oasis.opendocument.text"),
        "ods" => Some("application/vnd.oasis.opendocument.spreadsheet"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    public_prefix: String,
    max_logo_bytes: u64,
    max_document_bytes: u64,
}

impl AssetStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            root: settings.asset_root.clone(),
            public_prefix: settings.public_asset_prefix.clone(),
            max_logo_bytes: settings.max_logo_bytes,
            max_document_bytes: settings.max_document_bytes,
        }
    }

    pub fn tenant_dir(&self, tenant: TenantId) -> PathBuf {
        self.root.join(tenant.dir_name())
    }

    pub fn logo_dir(&self, tenant: TenantId) -> PathBuf {
        self.tenant_dir(tenant).join(LOGO_DIR)
    }

    pub fn documents_dir(&self, tenant: TenantId) -> PathBuf {
        self.tenant_dir(tenant).join(DOCUMENTS_DIR)
    }

    pub fn identity_path(&self, tenant: TenantId) -> PathBuf {
        self.tenant_dir(tenant).join(IDENTITY_FILE)
    }

    pub fn resolve_logo(&self, tenant: TenantId) -> AppResult<AssetRef> {
        let directory = self.logo_dir(tenant);
        ensure_dir(&directory)?;
        let path = LOGO_EXTENSIONS
            .iter()
            .map(|extension| directory.join(format!("logo.{extension}")))
            .find(|candidate| candidate.is_file());
        Ok(AssetRef {
            tenant,
            kind: AssetKind::Logo,
            directory,
            path,
        })
    }

    // Replaces the tenant's logo. The new file is renamed into place before
    // the other candidates are removed, so some logo stays resolvable
    // throughout and exactly one remains afterwards.
    pub fn save_logo(&self, tenant: TenantId, bytes: &[u8], declared_extension: &str) -> AppResult<AssetRef> {
        let extension = normalize_extension(declared_extension);
        let mut errors = ValidationErrors::new(serde_json::json!({
            "extension": declared_extension,
            "sizeBytes": bytes.len(),
        }));
        if !LOGO_EXTENSIONS.contains(&extension.as_str()) {
            errors.add("logo", format!("Logo must be one of: {}", LOGO_EXTENSIONS.join(", ")));
        }
        if bytes.is_empty() {
            errors.add("logo", "The uploaded file is empty");
        } else if bytes.len() as u64 > self.max_logo_bytes {
            errors.add("logo", format!("Logo must be at most {} bytes", self.max_logo_bytes));
        }
        errors.into_result()?;

        let directory = self.logo_dir(tenant);
        let target = directory.join(format!("logo.{extension}"));
        write_atomic(&target, bytes)?;

        for other in LOGO_EXTENSIONS.iter().filter(|candidate| **candidate != extension) {
            let stale = directory.join(format!("logo.{other}"));
            match fs::remove_file(&stale) {
                Ok(()) => {
                    tracing::debug!(tenant = %tenant, path = %stale.to_string_lossy(), "removed superseded logo");
                }
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(AppError::Io(error.to_string())),
            }
        }

        tracing::info!(tenant = %tenant, extension = %extension, size = bytes.len(), "logo saved");
        Ok(AssetRef {
            tenant,
            kind: AssetKind::Logo,
            directory,
            path: Some(target),
        })
    }

    pub fn logo_url(&self, tenant: TenantId) -> AppResult<Option<String>> {
        Ok(self.resolve_logo(tenant)?.url(&self.public_prefix))
    }

    pub fn logo_data_uri(&self, tenant: TenantId) -> AppResult<Option<String>> {
        let asset = self.resolve_logo(tenant)?;
        let Some(path) = asset.path else {
            return Ok(None);
        };
        let extension = path
            .extension()
            .and_then(|value| value.to_str())
            .unwrap_or_default();
        let media_type = media_type_for_extension(extension)
            .ok_or_else(|| AppError::Internal(format!("no media type for logo extension {extension}")))?;
        let bytes = fs::read(&path).map_err(|error| AppError::Io(error.to_string()))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(Some(format!("data:{media_type};base64,{encoded}")))
    }

    pub fn load_identity(&self, tenant: TenantId, fallback: &IdentityRecord) -> AppResult<IdentityRecord> {
        ensure_dir(&self.tenant_dir(tenant))?;
        let path = self.identity_path(tenant);
        if !path.is_file() {
            return Ok(fallback.clone());
        }
        let bytes = fs::read(&path).map_err(|error| AppError::Io(error.to_string()))?;
        match serde_json::from_slice::<IdentityRecord>(&bytes) {
            Ok(stored) => Ok(stored.merged_over(fallback)),
            Err(error) => {
                tracing::warn!(
                    tenant = %tenant,
                    path = %path.to_string_lossy(),
                    error = %error,
                    "skipping malformed identity file"
                );
                Ok(fallback.clone())
            }
        }
    }

    pub fn save_identity(&self, tenant: TenantId, fields: &IdentityRecord) -> AppResult<IdentityRecord> {
        let record = fields.trimmed();
        let mut errors = ValidationErrors::new(serde_json::to_value(fields)?);
        if !record.email.is_empty() && !is_valid_email(&record.email) {
            errors.add("email", "Enter a valid email address");
        }
        errors.into_result()?;

        let bytes = serde_json::to_vec_pretty(&record)?;
        write_atomic(&self.identity_path(tenant), &bytes)?;
        tracing::info!(tenant = %tenant, "identity saved");
        Ok(record)
    }

    pub fn list_documents(&self, tenant: TenantId) -> AppResult<Vec<DocumentMeta>> {
        let directory = self.documents_dir(tenant);
        ensure_dir(&directory)?;

        let mut documents = Vec::new();
        for entry in fs::read_dir(&directory).map_err(|error| AppError::Io(error.to_string()))? {
            let entry = entry.map_err(|error| AppError::Io(error.to_string()))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().map_err(|error| AppError::Io(error.to_string()))?;
            if !metadata.is_file() {
                continue;
            }
            documents.push(self.document_meta(tenant, name, &metadata));
        }
        documents.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then_with(|| a.name.cmp(&b.name)));
        Ok(documents)
    }

    pub fn save_document(&self, tenant: TenantId, bytes: &[u8], original_name: &str) -> AppResult<DocumentMeta> {
        let mut errors = ValidationErrors::new(serde_json::json!({
            "name": original_name,
            "sizeBytes": bytes.len(),
        }));
        let file_name = document_file_name(tenant, original_name, Utc::now());
        if file_name.is_none() {
            errors.add(
                "document",
                format!("Allowed file types: {}", DOCUMENT_EXTENSIONS.join(", ")),
            );
        }
        if bytes.len() as u64 > self.max_document_bytes {
            errors.add("document", format!("Document must be at most {} bytes", self.max_document_bytes));
        }
        errors.into_result()?;
        let Some(file_name) = file_name else {
            return Err(AppError::Internal("document name missing after validation".to_string()));
        };

        let path = self.documents_dir(tenant).join(&file_name);
        write_atomic(&path, bytes)?;
        tracing::info!(tenant = %tenant, name = %file_name, size = bytes.len(), "document saved");

        let metadata = fs::metadata(&path).map_err(|error| AppError::Io(error.to_string()))?;
        Ok(self.document_meta(tenant, file_name, &metadata))
    }

    fn document_meta(&self, tenant: TenantId, name: String, metadata: &fs::Metadata) -> DocumentMeta {
        let extension = Path::new(&name)
            .extension()
            .and_then(|value| value.to_str())
            .unwrap_or_default()
            .to_string();
        let url = AssetRef {
            tenant,
            kind: AssetKind::Document,
            directory: self.documents_dir(tenant),
            path: Some(self.documents_dir(tenant).join(&name)),
        }
        .url(&self.public_prefix)
        .unwrap_or_default();
        DocumentMeta {
            size_bytes: metadata.len(),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            media_type: media_type_for_extension(&extension).unwrap_or("application/octet-stream"),
            url,
            name,
        }
    }
}

fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|error| AppError::Io(error.to_string()))?;
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| AppError::Internal(format!("{} has no parent directory", path.to_string_lossy())))?;
    ensure_dir(parent)?;
    let temp = parent.join(format!("{TEMP_PREFIX}{}.tmp", Uuid::new_v4().simple()));
    let written = File::create(&temp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp, path));
    if let Err(error) = written {
        let _ = fs::remove_file(&temp);
        return Err(AppError::Io(error.to_string()));
    }
    Ok(())
}

fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}

// Restricts a client-supplied name to `[A-Za-z0-9._-]`. `None` when the
// extension is not allow-listed. An empty stem is replaced with
// `tenant_<id>_<timestamp>`.
fn document_file_name(tenant: TenantId, original_name: &str, now: DateTime<Utc>) -> Option<String> {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let (stem, extension) = base.rsplit_once('.')?;
    let extension = normalize_extension(extension);
    if !DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }

    let mut cleaned = String::with_capacity(stem.len());
    for ch in stem.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
            ch
        } else {
            '_'
        };
        if mapped == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(mapped);
    }
    let cleaned: String = cleaned
        .trim_matches(|ch| matches!(ch, '_' | '.' | '-'))
        .chars()
        .take(MAX_DOCUMENT_STEM)
        .collect();

    let stem = if cleaned.is_empty() {
        format!("{}_{}", tenant.dir_name(), now.format("%Y%m%d%H%M%S"))
    } else {
        cleaned
    };
    Some(format!("{stem}.{extension}"))
}
