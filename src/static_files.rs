//! Static file resolution and streaming for the document root.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Copy granularity for static responses. Files are never loaded whole.
const CHUNK_SIZE: usize = 8192;

/// Resolver for files under a configured document root.
///
/// Every lookup canonicalizes the candidate path and rejects it unless the
/// canonical root is a strict prefix, so `..` segments and symlinks pointing
/// outside the root can never be served.
pub struct StaticFiles {
    root: PathBuf,
    index: String,
}

impl StaticFiles {
    /// Create a resolver for `root`. The root is canonicalized eagerly;
    /// a missing or unreadable root is an error at startup, not per request.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        Ok(Self {
            root: std::fs::canonicalize(root)?,
            index: "index.html".to_string(),
        })
    }

    /// Override the default document served for directory paths.
    pub fn with_index(mut self, index: &str) -> Self {
        self.index = index.to_string();
        self
    }

    /// Canonical document root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a decoded URL path to a file under the root.
    ///
    /// Returns `None` (caller responds 404) when the path does not exist,
    /// escapes the root after canonicalization, or is a directory without an
    /// index document.
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        let rel = url_path.trim_start_matches('/');
        let mut path = std::fs::canonicalize(self.root.join(rel)).ok()?;
        if !path.starts_with(&self.root) {
            debug!(path = %path.display(), "resolved path escapes document root");
            return None;
        }
        if path.is_dir() {
            path = std::fs::canonicalize(path.join(&self.index)).ok()?;
            if !path.starts_with(&self.root) {
                return None;
            }
        }
        path.is_file().then_some(path)
    }

    /// Content type for a resolved file, derived from its extension.
    pub fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "html" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }

    /// Stream a resolved file to the connection in bounded chunks.
    ///
    /// Writes the status line and headers, then copies the file 8 KiB at a
    /// time. `path` must come from [`StaticFiles::resolve`].
    pub fn stream_to<W: Write>(&self, w: &mut W, path: &Path) -> io::Result<()> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            Self::content_type(path),
            len
        );
        w.write_all(head.as_bytes())?;
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            w.write_all(&buf[..n])?;
        }
        w.flush()
    }
}
