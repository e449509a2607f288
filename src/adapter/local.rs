use super::{cancellable, OperationState, PendingOperation, UploadAdapter};
use crate::codec::{ImageCodec, JpegCodec};
use crate::data_url::encode_data_url;
use crate::loader::FileLoader;
use crate::mime::resolve_mime;
use crate::models::UploadResult;
use crate::transcoder::{TranscodeRequest, Transcoder};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

/// Resolves an inserted image as an inline, size-bounded JPEG data URL.
///
/// Only the read of the file can be aborted; once transcoding has started
/// the operation runs to completion.
pub struct Base64UploadAdapter<C: ImageCodec = JpegCodec> {
    loader: Arc<FileLoader>,
    transcoder: Transcoder<C>,
    request: TranscodeRequest,
    operation: PendingOperation,
}

impl<C: ImageCodec + 'static> Base64UploadAdapter<C> {
    pub fn new(
        loader: Arc<FileLoader>,
        transcoder: Transcoder<C>,
        request: TranscodeRequest,
    ) -> Self {
        Self {
            loader,
            transcoder,
            request,
            operation: PendingOperation::new(),
        }
    }

    async fn read_as_data_url(&self) -> Result<String> {
        let blob = self.loader.file().await?;
        let mime = resolve_mime(blob.mime.as_deref(), &blob.data);
        Ok(encode_data_url(&mime, &blob.data))
    }

    async fn run(&self, token: &CancellationToken) -> Result<UploadResult> {
        let source = cancellable(token, self.read_as_data_url()).await?;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.operation.advance(OperationState::Transcoding, token, false);
        let transcoded = self
            .transcoder
            .transcode_blocking(source, self.request)
            .await?;

        info!(
            "Inlined image as {}x{} JPEG ({} KB, quality {:.2}, {} encodes)",
            transcoded.width,
            transcoded.height,
            transcoded.data_url.len() / 1024,
            transcoded.quality,
            transcoded.encodes
        );
        Ok(UploadResult::new(transcoded.data_url))
    }
}

#[async_trait]
impl<C: ImageCodec + 'static> UploadAdapter for Base64UploadAdapter<C> {
    async fn upload(&self) -> Result<UploadResult> {
        let token = self.operation.begin()?;
        let span = info_span!("base64_upload", loader = %self.loader.id());

        let result = self.run(&token).instrument(span).await;
        self.operation.settle(&result);
        result
    }

    fn abort(&self) {
        if self.operation.abort() {
            info!("Aborted reading file for loader {}", self.loader.id());
        }
    }

    fn state(&self) -> OperationState {
        self.operation.state()
    }
}
