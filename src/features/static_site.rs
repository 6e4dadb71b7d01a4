//! Static site handler.
//!
//! Serves a built site from disk as the application fallback.

use crate::core::gateway::handlers::AppHandler;
use crate::core::gateway::response::{GatewayBody, full, inject_security_headers, plain_text};
use async_trait::async_trait;
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct StaticSite {
    root: PathBuf,
}

impl StaticSite {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a request path to a file under the root.
    ///
    /// Returns `None` for paths that escape the root or contain
    /// undecodable segments.
    #[must_use]
    pub fn resolve_path(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        let mut relative = PathBuf::new();
        for component in Path::new(decoded.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(self.root.join(relative))
    }

    /// Finds the file to serve: the path itself, its `index.html`, or the
    /// clean-URL `<path>.html`.
    ///
    /// The clean-URL form is only tried for a named file without a trailing
    /// slash, and never leaves the directory the request points into.
    pub async fn lookup(&self, request_path: &str) -> Option<PathBuf> {
        let base = self.resolve_path(request_path)?;
        let mut candidates = Vec::with_capacity(3);
        let names_file = !request_path.ends_with('/') && base != self.root;
        if names_file {
            candidates.push(base.clone());
        }
        candidates.push(base.join("index.html"));
        if names_file && let Some(name) = base.file_name() {
            let mut clean = name.to_os_string();
            clean.push(".html");
            candidates.push(base.with_file_name(clean));
        }
        for candidate in candidates {
            if let Ok(meta) = tokio::fs::metadata(&candidate).await
                && meta.is_file()
            {
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl AppHandler for StaticSite {
    async fn handle(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return plain_text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }
        let head_only = req.method() == Method::HEAD;
        let request_path = req.uri().path().to_string();
        drop(req);

        let Some(path) = self.lookup(&request_path).await else {
            return plain_text(StatusCode::NOT_FOUND, "Not Found");
        };

        match tokio::fs::read(&path).await {
            Ok(contents) => {
                let len = contents.len();
                let body = if head_only { full(Vec::new()) } else { full(contents) };
                let mut response = Response::new(body);
                let headers = response.headers_mut();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type(&path)));
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
                inject_security_headers(headers);
                response
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Static file read failed");
                plain_text(StatusCode::NOT_FOUND, "Not Found")
            }
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
