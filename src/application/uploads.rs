//! Post image storage seam.

use std::error::Error as StdError;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

/// Directory, relative to the storage root, that post images are written under.
pub const IMAGE_DIRECTORY: &str = "blog_images";

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file exceeds configured body limit")]
    PayloadTooLarge {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file size exceeds supported range")]
    SizeOverflow,
}

/// Result of storing an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Path relative to the storage root, as persisted on the post.
    pub path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stream a payload to storage under [`IMAGE_DIRECTORY`].
    async fn store_stream<'a>(
        &self,
        original_name: &str,
        stream: BoxStream<'a, Result<Bytes, ImageStoreError>>,
    ) -> Result<StoredImage, ImageStoreError>;

    /// Remove a stored image. Missing files are treated as success.
    async fn delete(&self, path: &str) -> Result<(), ImageStoreError>;

    /// Public URL the stored path is served from.
    fn public_url(&self, path: &str) -> String;

    async fn store(&self, original_name: &str, data: Bytes) -> Result<StoredImage, ImageStoreError> {
        let stream = stream::once(async move { Ok::<_, ImageStoreError>(data) }).boxed();
        self.store_stream(original_name, stream).await
    }
}
