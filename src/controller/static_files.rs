//! Files of the storefront and the admin panel served from `server.static_dir`

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use failure::Error as FailureError;
use futures::Future;
use futures_cpupool::CpuPool;
use hyper::StatusCode;

use crate::http::response_util::{bytes_response, text_response};
use crate::http::ControllerFuture;

pub fn content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "txt" => "text/plain; charset=utf-8",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "webmanifest" => "application/manifest+json",
        _ => "application/octet-stream",
    }
}

/// Path under `static_dir`, `None` for anything escaping it
pub fn resolve(static_dir: &str, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    if relative.split(|c: char| c == '/' || c == '\\').any(|segment| segment == "..") {
        return None;
    }
    let relative = if relative.is_empty() { "index.html" } else { relative };
    Some(Path::new(static_dir).join(relative))
}

/// Reads the file on the cpu pool; missing files answer `404`
pub fn serve(cpu_pool: &CpuPool, static_dir: &str, request_path: &str) -> ControllerFuture {
    let path = match resolve(static_dir, request_path) {
        Some(path) => path,
        None => return Box::new(futures::future::ok(text_response(StatusCode::NotFound, "Not Found"))),
    };
    let mime = content_type(&path.to_string_lossy());
    let read = cpu_pool.spawn_fn(move || match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(ref e) if e.kind() == IoErrorKind::NotFound || path.is_dir() => Ok(None),
        Err(e) => Err(FailureError::from(e)),
    });
    Box::new(read.map(move |bytes| match bytes {
        Some(bytes) => bytes_response(StatusCode::Ok, mime, bytes),
        None => text_response(StatusCode::NotFound, "Not Found"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_segments_are_rejected() {
        assert_eq!(resolve("static", "/../secret"), None);
        assert_eq!(resolve("static", "/img/..\\x"), None);
        assert_eq!(resolve("static", "/"), Some(Path::new("static").join("index.html")));
        assert_eq!(resolve("static", "/css/app.css"), Some(Path::new("static").join("css/app.css")));
    }

    #[test]
    fn types_follow_the_extension() {
        assert_eq!(content_type("a/b/LOGO.PNG"), "image/png");
        assert_eq!(content_type("index.html"), "text/html; charset=utf-8");
        assert_eq!(content_type("blob"), "application/octet-stream");
    }

    #[test]
    fn missing_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hola.txt"), "hola").unwrap();
        let pool = CpuPool::new(1);
        let static_dir = dir.path().to_string_lossy().to_string();

        let response = serve(&pool, &static_dir, "/hola.txt").wait().unwrap();
        assert_eq!(response.status(), StatusCode::Ok);
        let response = serve(&pool, &static_dir, "/nada.txt").wait().unwrap();
        assert_eq!(response.status(), StatusCode::NotFound);
    }
}
