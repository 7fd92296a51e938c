//! WebDAV client for the sequential backup pipeline.
//!

use core::time::Duration;
use std::{fs::File, io, path::Path};

use reqwest::{
    Method, StatusCode,
    blocking::{Body, RequestBuilder, Response},
    header::CONTENT_LENGTH,
    redirect::Policy,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::WebDavConfig;

/// The User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("webdav-backup/", env!("CARGO_PKG_VERSION"));

/// Synthetic status returned when an upload times out client side.
pub const STATUS_TIMEOUT: u16 = 408;

/// Synthetic status returned when an upload fails in transport.
pub const STATUS_TRANSPORT_ERROR: u16 = 500;

fn mkcol() -> Method {
    Method::from_bytes(b"MKCOL").expect("MKCOL is a valid method token")
}

/// The result of an upload attempt. Synthetic statuses stand in for
/// client-side failures, the caller decides what to do with them.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The HTTP status, possibly synthetic.
    pub status: u16,

    /// The URL the upload targeted.
    pub url: String,
}

/// A WebDAV client. One underlying HTTP client is reused for connection
/// pooling across the run's sequential requests.
pub struct Client {
    http: reqwest::blocking::Client,
    base_url: String,
    username: String,
    password: String,
    connect_timeout: Duration,
}

impl Client {
    /// Create a client for the configured endpoint.
    ///
    /// Redirects are not followed, a 3xx response surfaces to the caller.
    pub fn new(config: &WebDavConfig, connect_timeout: Duration) -> Result<Self, WebDavError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(WebDavError::CreateClient)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            connect_timeout,
        })
    }

    /// The URL of a collection, with a trailing slash.
    pub fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}/", self.base_url, collection.trim_matches('/'))
    }

    /// The URL of a file inside a collection.
    pub fn file_url(&self, collection: &str, filename: &str) -> String {
        format!("{}/{}/{filename}", self.base_url, collection.trim_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Create every segment of a remote collection path, parent before
    /// child. 201 and 405 are success, a redirect means the collection is
    /// assumed to already exist. Anything else fails the run.
    pub fn ensure_collection(&self, collection: &str) -> Result<(), WebDavError> {
        let mut current = String::new();

        for segment in collection.split('/').filter(|segment| !segment.is_empty()) {
            if current.is_empty() {
                current = segment.to_string();
            } else {
                current = format!("{current}/{segment}");
            }
            let url = format!("{}/{current}", self.base_url);

            info!("Ensuring WebDAV collection: {url}");

            let response = self
                .request(mkcol(), &url)
                .timeout(self.connect_timeout)
                .send()
                .map_err(|source| WebDavError::Transport { url: url.clone(), source })?;

            let status = response.status();
            if status == StatusCode::CREATED || status == StatusCode::METHOD_NOT_ALLOWED {
                continue;
            }
            if status.is_redirection() {
                warn!("Collection '{url}' answered {status}, assuming it already exists");
                continue;
            }

            return Err(WebDavError::Collection {
                url,
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    /// Stream `local_path` as a PUT body to `url`.
    ///
    /// Transport failures never error: a timeout becomes status
    /// [`STATUS_TIMEOUT`], any other transport failure becomes
    /// [`STATUS_TRANSPORT_ERROR`]. Only failing to open the local file
    /// is an error.
    pub fn upload(
        &self,
        local_path: &Path,
        url: &str,
        timeout: Duration,
    ) -> Result<UploadOutcome, WebDavError> {
        let file =
            File::open(local_path).map_err(|e| WebDavError::Io(e, "open artifact for upload"))?;
        let length = file
            .metadata()
            .map_err(|e| WebDavError::Io(e, "read artifact metadata"))?
            .len();

        let result = self
            .request(Method::PUT, url)
            .timeout(timeout)
            .body(Body::sized(file, length))
            .send();

        let status = match result {
            Ok(response) => response.status().as_u16(),
            Err(error) if error.is_timeout() => {
                warn!("Upload timed out: {error}");
                STATUS_TIMEOUT
            }
            Err(error) => {
                warn!("Upload failed in transport: {error}");
                STATUS_TRANSPORT_ERROR
            }
        };

        Ok(UploadOutcome {
            status,
            url: url.to_string(),
        })
    }

    /// The size of the remote object as reported by a HEAD request, or
    /// `None` when the server does not report one.
    pub fn head_size(&self, url: &str, timeout: Duration) -> Result<Option<u64>, WebDavError> {
        let response = self
            .request(Method::HEAD, url)
            .timeout(timeout)
            .send()
            .map_err(|source| WebDavError::Transport { url: url.to_string(), source })?;

        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());

        Ok(size)
    }

    /// Stream the remote object for checksum comparison. The returned
    /// response implements [`io::Read`].
    pub fn fetch(&self, url: &str, timeout: Duration) -> Result<Response, WebDavError> {
        let response = self
            .request(Method::GET, url)
            .timeout(timeout)
            .send()
            .map_err(|source| WebDavError::Transport { url: url.to_string(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebDavError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    /// Delete a remote object. Failures are logged, never fatal.
    pub fn delete(&self, url: &str) {
        let result = self
            .request(Method::DELETE, url)
            .timeout(self.connect_timeout)
            .send();

        match result {
            Ok(response) if !response.status().is_success() => {
                warn!("Deleting '{url}' answered {}", response.status());
            }
            Ok(_) => {}
            Err(error) => warn!("Could not delete '{url}': {error}"),
        }
    }

    /// Fetch a collection's listing body. No structured format is assumed,
    /// the caller pattern-matches filenames out of the raw text.
    pub fn list_collection(&self, url: &str, timeout: Duration) -> Result<String, WebDavError> {
        let response = self
            .request(Method::GET, url)
            .timeout(timeout)
            .send()
            .map_err(|source| WebDavError::Transport { url: url.to_string(), source })?;

        response
            .text()
            .map_err(|source| WebDavError::Transport { url: url.to_string(), source })
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum WebDavError {
    #[error("Failed to build the HTTP client:\n{0}")]
    CreateClient(#[source] reqwest::Error),

    #[error("Failed to create collection '{url}': HTTP {status}")]
    Collection { url: String, status: u16 },

    #[error("Request to '{url}' failed:\n{source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected status {status} for '{url}'")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Failed to {1}:\n{0}")]
    Io(#[source] io::Error, &'static str),
}
