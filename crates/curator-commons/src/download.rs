//! Streaming media download with incremental SHA-1.

use futures::StreamExt;
use sha1::{Digest, Sha1};
use std::io::Write;
use tempfile::NamedTempFile;

use crate::WikiError;

/// Sink that hashes while it writes. The temp file deletes itself on drop,
/// so the media never outlives the job on any exit path.
pub struct StreamingDownload {
    file: NamedTempFile,
    hasher: Sha1,
}

impl StreamingDownload {
    pub fn new() -> Result<Self, WikiError> {
        Ok(Self {
            file: NamedTempFile::new()?,
            hasher: Sha1::new(),
        })
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), WikiError> {
        self.hasher.update(chunk);
        self.file.write_all(chunk)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<(NamedTempFile, String), WikiError> {
        self.file.flush()?;
        Ok((self.file, hex::encode(self.hasher.finalize())))
    }
}

/// Stream a URL into a scoped temp file, returning the file and the hex
/// SHA-1 of its content.
pub async fn download_to_temp(
    client: &reqwest::Client,
    url: &str,
) -> Result<(NamedTempFile, String), WikiError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(WikiError::Upstream {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }

    let mut download = StreamingDownload::new()?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        download.write_chunk(&chunk?)?;
    }
    download.finish()
}
