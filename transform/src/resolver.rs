//! Loading the bytes of schema sources.

use tracing::{debug, info};
use url::Url;
use xt_xsd::SchemaSource;

use crate::error::ResolveError;

/// Fetches schema documents for the URL schemes it supports.
pub trait SchemaResolver: Send + Sync {
    fn supports(&self, url: &Url) -> bool;

    fn fetch(&self, url: &Url) -> Result<Vec<u8>, ResolveError>;
}

/// `file:` URLs
pub struct FileResolver;

impl SchemaResolver for FileResolver {
    fn supports(&self, url: &Url) -> bool {
        url.scheme() == "file"
    }

    fn fetch(&self, url: &Url) -> Result<Vec<u8>, ResolveError> {
        let path = url.to_file_path().map_err(|()| ResolveError::NotAFile {
            url: url.to_string(),
        })?;
        std::fs::read(&path).map_err(|source| ResolveError::Io {
            url: url.to_string(),
            source,
        })
    }
}

/// `http:` and `https:` URLs, fetched with a blocking client.
pub struct HttpResolver {
    client: reqwest::blocking::Client,
}

impl HttpResolver {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpResolver {
    fn default() -> Self {
        Self::new(reqwest::blocking::Client::new())
    }
}

impl SchemaResolver for HttpResolver {
    fn supports(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    fn fetch(&self, url: &Url) -> Result<Vec<u8>, ResolveError> {
        let http_error = |source| ResolveError::Http {
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(http_error)?;
        Ok(response.bytes().map_err(http_error)?.to_vec())
    }
}

pub fn default_resolvers() -> Vec<Box<dyn SchemaResolver>> {
    let resolvers: Vec<Box<dyn SchemaResolver>> =
        vec![Box::new(FileResolver), Box::new(HttpResolver::default())];
    resolvers
}

/// Loads every URL with the first resolver that supports it, keeping the order of `urls`.
pub fn load_sources(
    urls: &[Url],
    resolvers: &[Box<dyn SchemaResolver>],
) -> Result<Vec<SchemaSource>, ResolveError> {
    urls.iter()
        .map(|url| {
            let resolver = resolvers
                .iter()
                .find(|r| r.supports(url))
                .ok_or_else(|| ResolveError::UnsupportedScheme {
                    url: url.to_string(),
                    scheme: url.scheme().to_string(),
                })?;
            debug!(%url, "fetching schema source");
            let content = resolver.fetch(url)?;
            info!(%url, bytes = content.len(), "loaded schema source");
            Ok(SchemaSource::new(url.as_str(), content))
        })
        .collect()
}
