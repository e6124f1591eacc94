//! Storage - Locators, Fetching and Sinks
//!
//! Templates, images and finished documents are addressed by locators:
//! `s3://bucket/key` for object storage, `http(s)://` for plain network
//! fetches, anything else is a local path. Clients are shared read-only
//! handles; nothing here holds per-invocation state.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use s3::creds::Credentials;
use s3::{Bucket, Region};
use thiserror::Error;
use tracing::debug;

use crate::request::Destination;

const DEFAULT_REGION: &str = "us-east-1";
const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Malformed locator: {0}")]
    MalformedLocator(String),

    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("S3 request for s3://{bucket}/{key} failed: {reason}")]
    S3 {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("S3 credentials unavailable: {0}")]
    Credentials(String),

    #[error("HTTP client could not be built: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Cannot store to {0}")]
    Unsupported(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Object { bucket: String, key: String },
    Http(String),
    Local(PathBuf),
}

impl Locator {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("s3://") {
            let (bucket, key) = rest
                .split_once('/')
                .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
                .ok_or_else(|| StorageError::MalformedLocator(raw.to_string()))?;
            return Ok(Locator::Object {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Locator::Http(raw.to_string()));
        }
        if raw.is_empty() {
            return Err(StorageError::MalformedLocator(raw.to_string()));
        }
        Ok(Locator::Local(PathBuf::from(raw)))
    }

    /// Last path component, used to name scratch downloads.
    pub fn file_name(&self) -> Option<&str> {
        let tail = match self {
            Locator::Object { key, .. } => key.as_str(),
            Locator::Http(url) => url.split(['?', '#']).next().unwrap_or(url),
            Locator::Local(path) => return path.file_name().and_then(|n| n.to_str()),
        };
        tail.rsplit('/').next().filter(|n| !n.is_empty())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Object { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Locator::Http(url) => f.write_str(url),
            Locator::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Bucket/key object storage.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
    /// URL reported back to the caller for a stored object.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Plain network retrieval.
pub trait HttpFetch: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, StorageError>;
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, StorageError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(StorageError::Client)
}

pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, StorageError> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let wrap = |source| StorageError::Http {
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(wrap)?;
        let bytes = response.bytes().map_err(wrap)?;
        debug!(url, bytes = bytes.len(), "fetched");
        Ok(bytes.to_vec())
    }
}

/// Object store backed by a directory tree: `<root>/<bucket>/<key>`.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key.trim_start_matches('/'))
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => StorageError::io(&path, e),
        })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        write_file(&self.object_path(bucket, key), bytes)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        self.object_path(bucket, key).display().to_string()
    }
}

/// S3 with signed requests. Credentials come from the standard chain
/// (`AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`/`AWS_SESSION_TOKEN`, then the
/// shared profile); the region from `AWS_REGION` or `AWS_DEFAULT_REGION`.
pub struct S3ObjectStore {
    region: Region,
    credentials: Credentials,
    timeout: Duration,
}

impl S3ObjectStore {
    pub fn new(region: Region, credentials: Credentials, timeout: Duration) -> Self {
        Self {
            region,
            credentials,
            timeout,
        }
    }

    pub fn from_env(timeout: Duration) -> Result<Self, StorageError> {
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|_| DEFAULT_REGION.to_string());
        let region = region
            .parse::<Region>()
            .map_err(|e| StorageError::Credentials(format!("region {:?}: {}", region, e)))?;
        let credentials =
            Credentials::default().map_err(|e| StorageError::Credentials(e.to_string()))?;
        Ok(Self::new(region, credentials, timeout))
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, StorageError> {
        let mut bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StorageError::S3 {
                bucket: name.to_string(),
                key: String::new(),
                reason: e.to_string(),
            })?;
        bucket.set_request_timeout(Some(self.timeout));
        Ok(bucket)
    }
}

impl ObjectStore for S3ObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let fail = |reason: String| StorageError::S3 {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };
        let response = self
            .bucket(bucket)?
            .get_object(key)
            .map_err(|e| fail(e.to_string()))?;
        match response.status_code() {
            200..=299 => {
                debug!(bucket, key, bytes = response.bytes().len(), "object fetched");
                Ok(response.bytes().to_vec())
            }
            404 => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            code => Err(fail(format!("GET returned status {}", code))),
        }
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let fail = |reason: String| StorageError::S3 {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };
        let response = self
            .bucket(bucket)?
            .put_object_with_content_type(key, bytes, PDF_CONTENT_TYPE)
            .map_err(|e| fail(e.to_string()))?;
        match response.status_code() {
            200..=299 => Ok(()),
            code => Err(fail(format!("PUT returned status {}", code))),
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", bucket, key)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| StorageError::io(path, e))
}

/// Every I/O collaborator the pipeline talks to, behind one handle.
pub struct Storage {
    objects: Box<dyn ObjectStore>,
    http: Box<dyn HttpFetch>,
}

impl Storage {
    pub fn new(objects: Box<dyn ObjectStore>, http: Box<dyn HttpFetch>) -> Self {
        Self { objects, http }
    }

    /// Read the bytes a locator points at.
    pub fn fetch(&self, locator: &Locator) -> Result<Vec<u8>, StorageError> {
        match locator {
            Locator::Object { bucket, key } => self.objects.get(bucket, key),
            Locator::Http(url) => self.http.get(url),
            Locator::Local(path) => fs::read(path).map_err(|e| StorageError::io(path, e)),
        }
    }

    /// Materialise a locator as a local file. Object-storage and network
    /// locators are copied to `scratch_path`; local files are used in place.
    pub fn download_to(&self, locator: &Locator, scratch_path: &Path) -> Result<PathBuf, StorageError> {
        if let Locator::Local(path) = locator {
            return Ok(path.clone());
        }
        let bytes = self.fetch(locator)?;
        write_file(scratch_path, &bytes)?;
        debug!(%locator, path = %scratch_path.display(), "downloaded");
        Ok(scratch_path.to_path_buf())
    }

    /// Write a finished document and return the URL or path it is reachable at.
    pub fn store(&self, destination: &Destination, bytes: &[u8]) -> Result<String, StorageError> {
        let (bucket, key) = match destination {
            Destination::Object { bucket, key } => (bucket.clone(), key.clone()),
            Destination::Locator(raw) => match Locator::parse(raw)? {
                Locator::Object { bucket, key } => (bucket, key),
                Locator::Local(path) => {
                    write_file(&path, bytes)?;
                    return Ok(path.display().to_string());
                }
                Locator::Http(url) => return Err(StorageError::Unsupported(url)),
            },
        };
        self.objects.put(&bucket, &key, bytes)?;
        Ok(self.objects.public_url(&bucket, &key))
    }
}
