//! Product and slide images, stored on Cloudinary when configured, on local disk otherwise
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use failure::Fail;
use futures_cpupool::CpuPool;
use serde_json::Value;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use super::error::{fail, invalid, Error, ErrorKind, ErrorSource};
use super::types::{ServiceFuture, ServiceResult};
use super::Service;
use crate::config::Cloudinary;
use crate::repos::repo_factory::ReposFactory;

pub const UPLOADS_DIR: &str = "Imagenes/uploads";

pub trait ImagesService {
    /// Stores the file and returns the URL it is served from
    fn upload_image(&self, tenant_slug: Option<String>, filename: String, bytes: Vec<u8>) -> ServiceFuture<String>;
    /// Removes a locally stored upload, `path` is relative to the static root
    fn delete_image(&self, path: Option<String>) -> ServiceFuture<()>;
}

/// Keeps ASCII letters, digits, `_`, `-` and `.`; whitespace and separators become `_`
pub fn sanitize_filename(filename: &str) -> String {
    let ascii: String = filename.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace('/', " ").replace('\\', " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || *c == '.')
        .collect();
    let trimmed = kept.trim_matches(|c: char| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Letters, digits, `-` and `_` of the slug
pub fn safe_slug(tenant_slug: &str) -> String {
    tenant_slug.chars().filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_').collect()
}

/// Relative uploads path accepted for deletion
pub fn is_deletable(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    !path.contains("..") && normalized.starts_with(&format!("{}/", UPLOADS_DIR))
}

/// Hex SHA-256 of the `&`-joined sorted params followed by the API secret
pub fn cloudinary_signature(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("&");
    let mut hasher = Sha256::new();
    hasher.input(joined.as_bytes());
    hasher.input(api_secret.as_bytes());
    hex::encode(hasher.result())
}

fn mime_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn upload_to_cloudinary(cloudinary: &Cloudinary, filename: &str, bytes: &[u8]) -> ServiceResult<String> {
    let timestamp = Utc::now().timestamp().to_string();
    let signed = [
        ("crop", "limit".to_string()),
        ("fetch_format", "auto".to_string()),
        ("quality", "auto".to_string()),
        ("timestamp", timestamp),
        ("width", "1200".to_string()),
    ];
    let signature = cloudinary_signature(&signed, &cloudinary.api_secret);
    let url = cloudinary
        .upload_url
        .clone()
        .unwrap_or_else(|| format!("https://api.cloudinary.com/v1_1/{}/image/upload", cloudinary.cloud_name));

    let mut form: Vec<(&str, String)> = signed.to_vec();
    form.push(("api_key", cloudinary.api_key.clone()));
    form.push(("signature", signature));
    form.push(("signature_algorithm", "sha256".to_string()));
    form.push(("file", format!("data:{};base64,{}", mime_type(filename), base64::encode(bytes))));

    let upstream = |e: &dyn std::fmt::Display| ErrorKind::Upstream(format!("Cloudinary upload failed: {}", e));
    let response: Value = reqwest::blocking::Client::new()
        .post(&url)
        .form(&form)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(|e| {
            let kind = upstream(&e);
            ectx!(err e, ErrorSource::Cloudinary, kind)
        })?;
    match response.get("secure_url").and_then(Value::as_str) {
        Some(secure_url) => Ok(secure_url.to_string()),
        None => fail(upstream(&"respuesta sin secure_url")),
    }
}

fn store_locally(static_dir: &str, tenant_slug: Option<&str>, filename: &str, bytes: &[u8]) -> ServiceResult<String> {
    let stored_name = format!("{}_{}", Utc::now().timestamp(), sanitize_filename(filename));
    let url_prefix = match tenant_slug.map(safe_slug).filter(|slug| !slug.is_empty()) {
        Some(slug) => format!("{}/{}", UPLOADS_DIR, slug),
        None => UPLOADS_DIR.to_string(),
    };
    let dir: PathBuf = Path::new(static_dir).join(&url_prefix);
    fs::create_dir_all(&dir).map_err(ectx!(ErrorSource::Io, ErrorKind::Internal => dir))?;
    let target = dir.join(&stored_name);
    fs::write(&target, bytes).map_err(ectx!(ErrorSource::Io, ErrorKind::Internal => target))?;
    Ok(format!("{}/{}", url_prefix, stored_name))
}

fn spawn_blocking<R, Func>(cpu_pool: &CpuPool, f: Func) -> ServiceFuture<R>
where
    Func: FnOnce() -> Result<R, Error> + Send + 'static,
    R: Send + 'static,
{
    Box::new(cpu_pool.spawn_fn(f))
}

impl<F: ReposFactory> ImagesService for Service<F> {
    fn upload_image(&self, tenant_slug: Option<String>, filename: String, bytes: Vec<u8>) -> ServiceFuture<String> {
        debug!("Uploading {} ({} bytes) for {:?}", filename, bytes.len(), tenant_slug);
        let cloudinary = self.static_context.config.cloudinary.clone();
        let static_dir = self.static_context.config.server.static_dir.clone();
        spawn_blocking(&self.static_context.cpu_pool, move || {
            if filename.is_empty() {
                return fail(invalid("file", "No selected file"));
            }
            let url = match cloudinary {
                Some(ref cloudinary) => upload_to_cloudinary(cloudinary, &filename, &bytes)?,
                None => store_locally(&static_dir, tenant_slug.as_ref().map(String::as_str), &filename, &bytes)?,
            };
            info!("Image {} stored at {}", filename, url);
            Ok(url)
        })
    }

    fn delete_image(&self, path: Option<String>) -> ServiceFuture<()> {
        debug!("Deleting uploaded file {:?}", path);
        let static_dir = self.static_context.config.server.static_dir.clone();
        spawn_blocking(&self.static_context.cpu_pool, move || {
            let path = match path.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) {
                Some(path) => path,
                None => return fail(invalid("path", "path requerido")),
            };
            if !is_deletable(&path) {
                return fail(invalid("path", "ruta inválida o prohibida"));
            }
            let full_path = Path::new(&static_dir).join(path.replace('\\', "/"));
            if !full_path.is_file() {
                return fail(ErrorKind::NotFound("archivo no encontrado".to_string()));
            }
            fs::remove_file(&full_path).map_err(ectx!(ErrorSource::Io, ErrorKind::Internal => full_path))?;
            info!("Uploaded file {} deleted", path);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_lose_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("Café con leche.png"), "Cafe_con_leche.png");
        assert_eq!(sanitize_filename("..."), "upload");
    }

    #[test]
    fn slugs_keep_word_characters() {
        assert_eq!(safe_slug("la-casa_1/../x"), "la-casa_1x");
    }

    #[test]
    fn only_uploads_can_be_deleted() {
        assert!(is_deletable("Imagenes/uploads/t/1_a.png"));
        assert!(is_deletable("Imagenes\\uploads\\a.png"));
        assert!(!is_deletable("Imagenes/uploads/../secret"));
        assert!(!is_deletable("static/app.js"));
    }

    #[test]
    fn signature_is_order_independent() {
        let a = cloudinary_signature(&[("width", "1200".to_string()), ("crop", "limit".to_string())], "s");
        let b = cloudinary_signature(&[("crop", "limit".to_string()), ("width", "1200".to_string())], "s");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn local_fallback_writes_under_tenant_dir() {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().to_str().unwrap();
        let url = store_locally(static_dir, Some("mi tienda"), "foto.jpg", b"img").unwrap();
        assert!(url.starts_with("Imagenes/uploads/mitienda/"));
        assert!(url.ends_with("_foto.jpg"));
        assert_eq!(fs::read(dir.path().join(&url)).unwrap(), b"img");
    }
}
