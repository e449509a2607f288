use super::{cancellable, OperationState, PendingOperation, UploadAdapter};
use crate::loader::{FileLoader, ImageBlob};
use crate::models::{generic_upload_error, RemoteResponse, UploadResult};
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

const CHUNK_SIZE: usize = 16 * 1024;

/// Uploads the file as multipart field `upload` and resolves with the
/// returned `url`.
pub struct SimpleUploadAdapter {
    loader: Arc<FileLoader>,
    client: Client,
    upload_url: String,
    headers: HashMap<String, String>,
    operation: PendingOperation,
}

impl SimpleUploadAdapter {
    pub fn new(
        loader: Arc<FileLoader>,
        client: Client,
        upload_url: String,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            loader,
            client,
            upload_url,
            headers,
            operation: PendingOperation::new(),
        }
    }

    /// Request body that reports each chunk to the loader as it is sent.
    fn progress_body(&self, data: &[u8]) -> Body {
        let loader = Arc::clone(&self.loader);
        let chunks: Vec<Vec<u8>> = data.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        let stream = futures_util::stream::iter(chunks).map(move |chunk| {
            loader.add_uploaded(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        });
        Body::wrap_stream(stream)
    }

    async fn send(&self, blob: &ImageBlob) -> Result<reqwest::Response> {
        let total = blob.len() as u64;
        self.loader.set_upload_total(total);
        self.loader.set_uploaded(0);

        let mut part = Part::stream_with_length(self.progress_body(&blob.data), total)
            .file_name(blob.name.clone());
        if let Some(mime) = &blob.mime {
            part = part.mime_str(mime)?;
        }

        let mut request = self
            .client
            .post(&self.upload_url)
            .multipart(Form::new().part("upload", part));
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        Ok(request.send().await?)
    }

    async fn exchange(&self, blob: &ImageBlob) -> Result<UploadResult> {
        let response = self.send(blob).await.map_err(|e| {
            error!("Failed to send upload request for {}: {}", blob.name, e);
            generic_upload_error(&blob.name)
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("Upload endpoint returned status {} for {}", status, blob.name);
            return Err(generic_upload_error(&blob.name));
        }

        let body = response.text().await.map_err(|e| {
            error!("Failed to read upload response for {}: {}", blob.name, e);
            generic_upload_error(&blob.name)
        })?;
        let parsed: RemoteResponse = serde_json::from_str(&body).map_err(|e| {
            warn!("Failed to parse upload response: {}\nBody: {}", e, body);
            generic_upload_error(&blob.name)
        })?;

        parsed.into_result(&blob.name)
    }

    async fn run(&self, token: &CancellationToken) -> Result<UploadResult> {
        let blob = cancellable(token, self.loader.file()).await?;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.operation.advance(OperationState::Uploading, token, true);
        let result = cancellable(token, self.exchange(&blob)).await?;

        info!("Uploaded {} to {}", blob.name, result.default);
        Ok(result)
    }
}

#[async_trait]
impl UploadAdapter for SimpleUploadAdapter {
    async fn upload(&self) -> Result<UploadResult> {
        let token = self.operation.begin()?;
        let span = info_span!("simple_upload", loader = %self.loader.id());

        let result = self.run(&token).instrument(span).await;
        self.operation.settle(&result);
        result
    }

    fn abort(&self) {
        if self.operation.abort() {
            info!("Aborted upload for loader {}", self.loader.id());
        }
    }

    fn state(&self) -> OperationState {
        self.operation.state()
    }
}
