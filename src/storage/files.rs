use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

use super::sink::ContentSink;
use crate::error::SinkError;

/// Name given to a page whose address ends in a directory
const INDEX_FILE: &str = "index.html";

/// Content sink that mirrors pages on disk as `<root>/<host>/<path>[?<query>]`
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `url` is stored, relative to the root
    pub fn relative_path(url: &Url) -> Result<PathBuf, SinkError> {
        let host = url
            .host_str()
            .ok_or_else(|| SinkError::NoHost(url.to_string()))?;

        let mut path = PathBuf::from(host);
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let directory_like = url.path().ends_with('/') || segments.is_empty();
        let mut file_name = if directory_like {
            for segment in &segments {
                path.push(segment);
            }
            INDEX_FILE.to_string()
        } else {
            let (last, dirs) = segments.split_last().map_or(("", &[][..]), |(l, d)| (*l, d));
            for segment in dirs {
                path.push(segment);
            }
            last.to_string()
        };

        if let Some(query) = url.query() {
            file_name.push('?');
            file_name.push_str(&query.replace('/', "_"));
        }
        path.push(file_name);

        Ok(path)
    }

    /// Create every directory between the root and `dir`, moving aside plain files that are in the way
    async fn prepare_dir(&self, dir: &Path) -> Result<(), SinkError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SinkError::io(&self.root, e))?;

        let relative = dir.strip_prefix(&self.root).unwrap_or(dir);
        let mut current = self.root.clone();
        for component in relative.components() {
            current.push(component);

            match fs::metadata(&current).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => move_file_into_dir(&current).await?,
                Err(_) => fs::create_dir(&current)
                    .await
                    .map_err(|e| SinkError::io(&current, e))?,
            }
        }

        Ok(())
    }
}

/// Turn the file at `path` into a directory holding the old content as `index.html`
async fn move_file_into_dir(path: &Path) -> Result<(), SinkError> {
    let backup = with_suffix(path, "bak");
    debug!("Moving {} aside to make room for a directory", path.display());

    fs::rename(path, &backup)
        .await
        .map_err(|e| SinkError::io(path, e))?;
    fs::create_dir(path)
        .await
        .map_err(|e| SinkError::io(path, e))?;
    fs::rename(&backup, path.join(INDEX_FILE))
        .await
        .map_err(|e| SinkError::io(&backup, e))?;

    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// First `<path>.N` that doesn't exist yet
async fn next_free_name(path: &Path) -> PathBuf {
    let mut index = 1;
    loop {
        let candidate = with_suffix(path, &index.to_string());
        if fs::metadata(&candidate).await.is_err() {
            return candidate;
        }
        index += 1;
    }
}

#[async_trait]
impl ContentSink for FileSink {
    async fn handle_content(
        &self,
        url: &Url,
        last_modified: Option<DateTime<Utc>>,
        content: &[u8],
    ) -> Result<(), SinkError> {
        let mut target = self.root.join(Self::relative_path(url)?);
        if let Some(parent) = target.parent() {
            self.prepare_dir(parent).await?;
        }

        // A directory already occupies the page's name
        if fs::metadata(&target).await.map_or(false, |meta| meta.is_dir()) {
            target.push(INDEX_FILE);
        }

        if let Ok(existing) = fs::metadata(&target).await {
            let stored_at = existing.modified().ok().map(DateTime::<Utc>::from);
            if let (Some(stored_at), Some(last_modified)) = (stored_at, last_modified) {
                if stored_at > last_modified {
                    info!("Skipping: {}", target.display());
                    return Ok(());
                }
            }
            target = next_free_name(&target).await;
        }

        fs::write(&target, content)
            .await
            .map_err(|e| SinkError::io(&target, e))?;
        info!("Saved: {}", target.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(
            FileSink::relative_path(&url("http://example.com/docs/page.html")).unwrap(),
            PathBuf::from("example.com/docs/page.html")
        );
        assert_eq!(
            FileSink::relative_path(&url("http://example.com/")).unwrap(),
            PathBuf::from("example.com/index.html")
        );
        assert_eq!(
            FileSink::relative_path(&url("http://example.com/docs/")).unwrap(),
            PathBuf::from("example.com/docs/index.html")
        );
        assert_eq!(
            FileSink::relative_path(&url("http://example.com/search?q=a/b")).unwrap(),
            PathBuf::from("example.com/search?q=a_b")
        );
        assert!(matches!(
            FileSink::relative_path(&url("mailto:me@example.com")),
            Err(SinkError::NoHost(_))
        ));
    }

    #[tokio::test]
    async fn test_saves_page() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        sink.handle_content(&url("http://example.com/a/b.html"), None, b"<p>b</p>")
            .await
            .unwrap();

        let saved = std::fs::read(dir.path().join("example.com/a/b.html")).unwrap();
        assert_eq!(saved, b"<p>b</p>");
    }

    #[tokio::test]
    async fn test_file_in_the_way_becomes_index() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        sink.handle_content(&url("http://example.com/docs"), None, b"docs")
            .await
            .unwrap();
        sink.handle_content(&url("http://example.com/docs/intro.html"), None, b"intro")
            .await
            .unwrap();

        let docs = dir.path().join("example.com/docs");
        assert!(docs.is_dir());
        assert_eq!(std::fs::read(docs.join("index.html")).unwrap(), b"docs");
        assert_eq!(std::fs::read(docs.join("intro.html")).unwrap(), b"intro");
    }

    #[tokio::test]
    async fn test_existing_file_gets_numbered_copy() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let page = url("http://example.com/page.html");

        sink.handle_content(&page, None, b"one").await.unwrap();
        sink.handle_content(&page, None, b"two").await.unwrap();
        sink.handle_content(&page, None, b"three").await.unwrap();

        let base = dir.path().join("example.com");
        assert_eq!(std::fs::read(base.join("page.html")).unwrap(), b"one");
        assert_eq!(std::fs::read(base.join("page.html.1")).unwrap(), b"two");
        assert_eq!(std::fs::read(base.join("page.html.2")).unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_newer_local_copy_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let page = url("http://example.com/page.html");
        let long_ago = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();

        sink.handle_content(&page, None, b"local").await.unwrap();
        sink.handle_content(&page, Some(long_ago), b"remote").await.unwrap();

        let base = dir.path().join("example.com");
        assert_eq!(std::fs::read(base.join("page.html")).unwrap(), b"local");
        assert!(!base.join("page.html.1").exists());
    }

    #[tokio::test]
    async fn test_directory_at_target() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        sink.handle_content(&url("http://example.com/docs/a.html"), None, b"a")
            .await
            .unwrap();
        sink.handle_content(&url("http://example.com/docs"), None, b"docs")
            .await
            .unwrap();

        let docs = dir.path().join("example.com/docs");
        assert_eq!(std::fs::read(docs.join("index.html")).unwrap(), b"docs");
    }
}
