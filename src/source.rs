//! Content Sources
//!
//! Read-only byte-fetch abstraction over a location string. The resolver and
//! applier are transport-agnostic; each variant maps its transport failures
//! onto the shared error taxonomy.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use crate::error::{Result, UpdateError};

/// Read contract shared by all update sources.
///
/// Locations use the directory convention's forward-slash form, relative to
/// the source root (e.g. `MyApp/beta/1/latest.txt`).
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn read(&self, location: &str) -> Result<Vec<u8>>;
}

/// Source backed by a local directory.
pub struct LocalSource {
    base_dir: PathBuf,
}

impl LocalSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        // Convention paths are forward-slash; rebuild with native separators.
        let mut path = self.base_dir.clone();
        for part in normalize(location).split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }
}

#[async_trait]
impl ContentSource for LocalSource {
    async fn read(&self, location: &str) -> Result<Vec<u8>> {
        let path = self.resolve(location);
        tokio::fs::read(&path).await.map_err(|e| io_error(&path, e))
    }
}

fn io_error(path: &Path, e: io::Error) -> UpdateError {
    let location = path.display().to_string();
    match e.kind() {
        io::ErrorKind::NotFound => UpdateError::NotFound(location),
        io::ErrorKind::PermissionDenied => UpdateError::AccessDenied(location),
        _ => UpdateError::SourceUnavailable(format!("{location}: {e}")),
    }
}

/// Source backed by an HTTP(S) endpoint.
///
/// Requests go through the shared client built by
/// [`UpdateConfig`](crate::config::UpdateConfig), which carries the bounded
/// request timeout.
pub struct HttpSource {
    base_url: Url,
    client: Client,
}

impl HttpSource {
    pub fn new(base_url: &str, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| UpdateError::SourceUnavailable(format!("invalid base url {base_url}: {e}")))?;
        Ok(Self { base_url, client })
    }

    fn target_url(&self, location: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        push_location(&mut url, location)?;
        Ok(url)
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn read(&self, location: &str) -> Result<Vec<u8>> {
        fetch_url(&self.client, self.target_url(location)?).await
    }
}

/// Source backed by an authenticated blob store.
///
/// Objects live at `{container}/{updates_root}/{location}` under the account
/// endpoint; the account's SAS token is attached as the query credential.
pub struct BlobSource {
    account_url: Url,
    container: String,
    updates_root: String,
    sas_token: String,
    client: Client,
}

impl BlobSource {
    pub fn new(
        account_url: &str,
        container: impl Into<String>,
        updates_root: impl Into<String>,
        sas_token: impl Into<String>,
        client: Client,
    ) -> Result<Self> {
        let account_url = Url::parse(account_url).map_err(|e| {
            UpdateError::SourceUnavailable(format!("invalid account url {account_url}: {e}"))
        })?;
        let sas_token = sas_token.into();
        Ok(Self {
            account_url,
            container: container.into(),
            updates_root: updates_root.into(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
            client,
        })
    }

    fn blob_url(&self, location: &str) -> Result<Url> {
        let mut url = self.account_url.clone();
        push_location(&mut url, &self.container)?;
        push_location(&mut url, &self.updates_root)?;
        push_location(&mut url, location)?;
        if !self.sas_token.is_empty() {
            url.set_query(Some(&self.sas_token));
        }
        Ok(url)
    }
}

#[async_trait]
impl ContentSource for BlobSource {
    async fn read(&self, location: &str) -> Result<Vec<u8>> {
        fetch_url(&self.client, self.blob_url(location)?).await
    }
}

fn normalize(location: &str) -> String {
    location.replace('\\', "/")
}

/// Append forward-slash location segments to a URL path, percent-encoding
/// each segment.
fn push_location(url: &mut Url, location: &str) -> Result<()> {
    let display = url.to_string();
    let mut segments = url
        .path_segments_mut()
        .map_err(|_| UpdateError::SourceUnavailable(format!("cannot-be-a-base url {display}")))?;
    segments.pop_if_empty();
    for part in normalize(location).split('/').filter(|p| !p.is_empty()) {
        segments.push(part);
    }
    Ok(())
}

async fn fetch_url(client: &Client, url: Url) -> Result<Vec<u8>> {
    let location = url.to_string();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| UpdateError::SourceUnavailable(format!("{location}: {e}")))?;

    match response.status() {
        status if status.is_success() => {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| UpdateError::SourceUnavailable(format!("{location}: {e}")))?;
            Ok(bytes.to_vec())
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(UpdateError::NotFound(location)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(UpdateError::AccessDenied(location)),
        status => Err(UpdateError::SourceUnavailable(format!("{location}: HTTP {status}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_read() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("MyApp/beta")).unwrap();
        fs::write(dir.path().join("MyApp/beta/latest.txt"), b"1").unwrap();

        let source = LocalSource::new(dir.path());
        let data = source.read("MyApp/beta/latest.txt").await.unwrap();
        assert_eq!(data, b"1");
    }

    #[tokio::test]
    async fn test_local_read_backslash_location() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("MyApp/beta")).unwrap();
        fs::write(dir.path().join("MyApp/beta/latest.txt"), b"2").unwrap();

        let source = LocalSource::new(dir.path());
        let data = source.read("MyApp\\beta\\latest.txt").await.unwrap();
        assert_eq!(data, b"2");
    }

    #[tokio::test]
    async fn test_local_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let source = LocalSource::new(dir.path());
        let err = source.read("MyApp/beta/latest.txt").await.unwrap_err();
        assert!(matches!(err, UpdateError::NotFound(_)));
    }

    #[test]
    fn test_http_url_join() {
        let source = HttpSource::new("https://cdn.example.com/updates", Client::new()).unwrap();
        let url = source.target_url("MyApp/beta/1/1.0.1.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdn.example.com/updates/MyApp/beta/1/1.0.1.json"
        );
    }

    #[test]
    fn test_http_url_join_encodes_segments() {
        let source = HttpSource::new("https://cdn.example.com", Client::new()).unwrap();
        let url = source.target_url("My App/beta/latest.txt").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdn.example.com/My%20App/beta/latest.txt"
        );
    }

    #[test]
    fn test_blob_url_layout() {
        let source = BlobSource::new(
            "https://account.blob.example.com",
            "releases",
            "updates",
            "?sv=2024&sig=abc",
            Client::new(),
        )
        .unwrap();
        let url = source.blob_url("MyApp/beta/latest.txt").unwrap();
        assert_eq!(
            url.as_str(),
            "https://account.blob.example.com/releases/updates/MyApp/beta/latest.txt?sv=2024&sig=abc"
        );
    }
}
