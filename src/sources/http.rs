//! HTTP transport used by the source adapters and the download cache

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;

use crate::error::{DownloadError, SourceError};

const USER_AGENT: &str = concat!("dfdl/", env!("CARGO_PKG_VERSION"));

/// A buffered response. Non-2xx statuses are returned, not raised, so callers
/// can map specific codes (401, 403) to their own errors.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_encoding: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, gunzipped when the server says so or the bytes carry the gzip magic
    pub fn text(&self) -> std::io::Result<String> {
        let gzipped = self
            .content_encoding
            .as_deref()
            .is_some_and(|enc| enc.eq_ignore_ascii_case("gzip"))
            || self.body.starts_with(&[0x1f, 0x8b]);

        if gzipped {
            let mut out = String::new();
            GzDecoder::new(self.body.as_slice()).read_to_string(&mut out)?;
            Ok(out)
        } else {
            Ok(String::from_utf8_lossy(&self.body).into_owned())
        }
    }
}

pub trait HttpClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, SourceError>;

    /// Stream `url` into `out`, returning the byte count
    fn download(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        out: &mut dyn Write,
    ) -> Result<u64, DownloadError>;
}

// ============================================================================
// Helpers
// ============================================================================

/// GET and deserialize a JSON body, treating any non-2xx status as an error
pub fn get_json<T: DeserializeOwned>(
    client: &dyn HttpClient,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<T, SourceError> {
    let response = client.get(url, headers)?;
    if !response.is_success() {
        return Err(SourceError::Http {
            url: url.to_string(),
            status: response.status,
        });
    }
    parse_json(url, &response.body)
}

pub fn parse_json<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, SourceError> {
    serde_json::from_slice(body).map_err(|e| SourceError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// GET a page as text, transparently decompressing gzip bodies
pub fn get_text(client: &dyn HttpClient, url: &str) -> Result<String, SourceError> {
    let response = client.get(url, &[])?;
    if !response.is_success() {
        return Err(SourceError::Http {
            url: url.to_string(),
            status: response.status,
        });
    }
    response.text().map_err(|e| SourceError::Parse {
        url: url.to_string(),
        reason: format!("invalid gzip body: {}", e),
    })
}

// ============================================================================
// ureq Client
// ============================================================================

/// Production client backed by `ureq`
#[derive(Debug, Default, Clone, Copy)]
pub struct UreqClient;

impl UreqClient {
    pub fn new() -> Self {
        Self
    }

    fn request(url: &str, headers: &[(&str, &str)]) -> ureq::Request {
        let mut request = ureq::get(url).set("User-Agent", USER_AGENT);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        request
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, SourceError> {
        let response = match Self::request(url, headers).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(e)) => {
                return Err(SourceError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let status = response.status();
        let content_encoding = response.header("Content-Encoding").map(str::to_string);
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| SourceError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(HttpResponse {
            status,
            content_encoding,
            body,
        })
    }

    fn download(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        out: &mut dyn Write,
    ) -> Result<u64, DownloadError> {
        let response = match Self::request(url, headers).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(DownloadError::Http {
                    url: url.to_string(),
                    status,
                })
            }
            Err(ureq::Error::Transport(e)) => {
                return Err(DownloadError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        std::io::copy(&mut response.into_reader(), out).map_err(|e| DownloadError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// Fixture Client
// ============================================================================

/// Canned responses keyed by exact URL; unknown URLs answer 404
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FixtureClient {
    routes: std::collections::HashMap<String, HttpResponse>,
    requests: std::cell::RefCell<Vec<(String, Vec<(String, String)>)>>,
}

#[cfg(test)]
impl FixtureClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(
            url.to_string(),
            HttpResponse {
                status,
                content_encoding: None,
                body: body.into(),
            },
        );
        self
    }

    pub fn with_json(self, url: &str, value: serde_json::Value) -> Self {
        self.with(url, 200, value.to_string())
    }

    pub fn with_gzip(mut self, url: &str, text: &str) -> Self {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        let body = encoder.finish().unwrap();
        self.routes.insert(
            url.to_string(),
            HttpResponse {
                status: 200,
                content_encoding: Some("gzip".to_string()),
                body,
            },
        );
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(url, _)| url.clone()).collect()
    }

    /// Value of `header` on the most recent request to `url`
    pub fn header_sent(&self, url: &str, header: &str) -> Option<String> {
        self.requests
            .borrow()
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .and_then(|(_, headers)| {
                headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(header))
                    .map(|(_, value)| value.clone())
            })
    }

    fn record(&self, url: &str, headers: &[(&str, &str)]) {
        self.requests.borrow_mut().push((
            url.to_string(),
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
    }

    fn lookup(&self, url: &str) -> HttpResponse {
        self.routes.get(url).cloned().unwrap_or(HttpResponse {
            status: 404,
            content_encoding: None,
            body: Vec::new(),
        })
    }
}

#[cfg(test)]
impl HttpClient for FixtureClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, SourceError> {
        self.record(url, headers);
        Ok(self.lookup(url))
    }

    fn download(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        out: &mut dyn Write,
    ) -> Result<u64, DownloadError> {
        self.record(url, headers);
        let response = self.lookup(url);
        if !response.is_success() {
            return Err(DownloadError::Http {
                url: url.to_string(),
                status: response.status,
            });
        }
        out.write_all(&response.body)
            .map_err(|e| DownloadError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(response.body.len() as u64)
    }
}
