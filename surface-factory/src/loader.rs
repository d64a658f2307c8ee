//! Fetching and decoding image sources.

use async_trait::async_trait;
use url::Url;

use crate::error::{RenderError, RenderResult};
use crate::image::{data_uri_bytes, decode_image, Bitmap};

/// Turns a source URI into a decoded bitmap.
///
/// Implementations may suspend; they are always awaited outside the
/// drawing lock.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Fetch and decode the image at `uri`.
    async fn load(&self, uri: &Url) -> RenderResult<Bitmap>;
}

/// Loader for `data:`, `file:` and (with the `http` feature) `http(s):`
/// URIs.
#[derive(Debug, Clone, Default)]
pub struct DefaultImageLoader {
    #[cfg(feature = "http")]
    http: reqwest::Client,
}

impl DefaultImageLoader {
    /// Create a loader with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader that fetches remote images with `client`.
    #[cfg(feature = "http")]
    #[must_use]
    pub fn with_http_client(client: reqwest::Client) -> Self {
        Self { http: client }
    }

    async fn read_bytes(&self, uri: &Url) -> RenderResult<Vec<u8>> {
        match uri.scheme() {
            "data" => data_uri_bytes(uri.as_str()),
            "file" => {
                let path = uri
                    .to_file_path()
                    .map_err(|()| RenderError::Resource(format!("Invalid file URI: {uri}")))?;
                tokio::fs::read(&path).await.map_err(|e| {
                    RenderError::Resource(format!("Cannot read {}: {e}", path.display()))
                })
            }
            #[cfg(feature = "http")]
            "http" | "https" => self.fetch(uri).await,
            other => Err(RenderError::UnsupportedUri(format!(
                "scheme `{other}` is not supported"
            ))),
        }
    }

    #[cfg(feature = "http")]
    async fn fetch(&self, uri: &Url) -> RenderResult<Vec<u8>> {
        let response = self
            .http
            .get(uri.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| RenderError::Resource(format!("GET {uri} failed: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Resource(format!("Reading {uri} failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageLoader for DefaultImageLoader {
    async fn load(&self, uri: &Url) -> RenderResult<Bitmap> {
        let bytes = self.read_bytes(uri).await?;
        tracing::debug!(scheme = uri.scheme(), "Read {} encoded bytes", bytes.len());

        tokio::task::spawn_blocking(move || decode_image(&bytes))
            .await
            .map_err(|e| RenderError::Decode(format!("Decode task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // 1x1 red pixel
    const RED_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    #[tokio::test]
    async fn test_loads_data_uri() {
        let uri = Url::parse(&format!("data:image/png;base64,{RED_PNG_BASE64}")).unwrap();
        let bitmap = DefaultImageLoader::new().load(&uri).await.unwrap();
        assert_eq!(bitmap.width(), 1);
        assert_eq!(bitmap.height(), 1);
    }

    #[tokio::test]
    async fn test_loads_file_uri() {
        use base64::Engine;
        let png = base64::engine::general_purpose::STANDARD
            .decode(RED_PNG_BASE64)
            .unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&png).unwrap();

        let uri = Url::from_file_path(file.path()).unwrap();
        let bitmap = DefaultImageLoader::new().load(&uri).await.unwrap();
        assert_eq!(bitmap.width(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_resource_error() {
        let uri = Url::parse("file:///definitely/not/here.png").unwrap();
        let err = DefaultImageLoader::new().load(&uri).await.unwrap_err();
        assert!(matches!(err, RenderError::Resource(_)));
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_unsupported() {
        let uri = Url::parse("ftp://example.com/a.png").unwrap();
        let err = DefaultImageLoader::new().load(&uri).await.unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedUri(_)));
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_decode_error() {
        let uri = Url::parse("data:application/octet-stream;base64,AAECAwQF").unwrap();
        let err = DefaultImageLoader::new().load(&uri).await.unwrap_err();
        assert!(matches!(err, RenderError::Decode(_)));
    }
}
