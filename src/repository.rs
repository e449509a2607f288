//! File repository and adapter plugins
//!
//! The repository owns the adapter factory slot the host calls once per
//! inserted file. Plugins fill that slot during initialization.

use crate::adapter::{Base64UploadAdapter, SimpleUploadAdapter, UploadAdapter};
use crate::codec::{ImageCodec, JpegCodec};
use crate::loader::{FileLoader, ImageBlob};
use crate::models::{Base64UploadConfig, SimpleUploadConfig, UploadResult};
use crate::transcoder::{TranscodeRequest, Transcoder};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub type AdapterFactory = Box<dyn Fn(Arc<FileLoader>) -> Box<dyn UploadAdapter> + Send + Sync>;

#[derive(Default)]
pub struct FileRepository {
    create_upload_adapter: Option<AdapterFactory>,
}

impl FileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_upload_adapter_factory(&mut self, factory: AdapterFactory) {
        self.create_upload_adapter = Some(factory);
    }

    pub fn has_upload_adapter_factory(&self) -> bool {
        self.create_upload_adapter.is_some()
    }

    pub fn create_loader(&self, blob: ImageBlob) -> Arc<FileLoader> {
        Arc::new(FileLoader::new(blob))
    }

    pub fn create_upload_adapter(&self, loader: Arc<FileLoader>) -> Result<Box<dyn UploadAdapter>> {
        let factory = self.create_upload_adapter.as_ref().ok_or_else(|| {
            Error::Config("no upload adapter is registered on the file repository".to_string())
        })?;
        Ok(factory(loader))
    }

    /// Loads `blob` through a fresh adapter and waits for the result.
    pub async fn upload(&self, blob: ImageBlob) -> Result<UploadResult> {
        let adapter = self.create_upload_adapter(self.create_loader(blob))?;
        adapter.upload().await
    }
}

pub trait Plugin {
    fn name(&self) -> &'static str;

    fn init(&self, repository: &mut FileRepository) -> Result<()>;
}

/// Installs [`Base64UploadAdapter`] as the repository's adapter.
pub struct Base64UploadPlugin<C: ImageCodec = JpegCodec> {
    transcoder: Transcoder<C>,
    request: TranscodeRequest,
}

impl Base64UploadPlugin<JpegCodec> {
    pub fn new(config: &Base64UploadConfig) -> Self {
        Self::with_codec(JpegCodec::new(), config)
    }
}

impl<C: ImageCodec + 'static> Base64UploadPlugin<C> {
    pub fn with_codec(codec: C, config: &Base64UploadConfig) -> Self {
        Self {
            transcoder: Transcoder::with_config(codec, config.transcoder_config()),
            request: config.request(),
        }
    }
}

impl<C: ImageCodec + 'static> Plugin for Base64UploadPlugin<C> {
    fn name(&self) -> &'static str {
        "Base64UploadAdapter"
    }

    fn init(&self, repository: &mut FileRepository) -> Result<()> {
        for quality in [Some(self.request.quality), self.transcoder.config().quality_when_unscaled]
            .into_iter()
            .flatten()
        {
            if !(0.0..=1.0).contains(&quality) {
                return Err(Error::InvalidQuality(quality));
            }
        }

        let transcoder = self.transcoder.clone();
        let request = self.request;
        repository.set_upload_adapter_factory(Box::new(
            move |loader: Arc<FileLoader>| -> Box<dyn UploadAdapter> {
                Box::new(Base64UploadAdapter::new(loader, transcoder.clone(), request))
            },
        ));
        info!("{} registered", self.name());
        Ok(())
    }
}

/// Installs [`SimpleUploadAdapter`] when an upload URL is configured.
pub struct SimpleUploadPlugin {
    config: Option<SimpleUploadConfig>,
    client: reqwest::Client,
}

impl SimpleUploadPlugin {
    pub fn new(config: Option<SimpleUploadConfig>) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: Option<SimpleUploadConfig>, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

impl Plugin for SimpleUploadPlugin {
    fn name(&self) -> &'static str {
        "SimpleUploadAdapter"
    }

    /// A missing `uploadUrl` leaves the repository untouched.
    fn init(&self, repository: &mut FileRepository) -> Result<()> {
        let Some((upload_url, headers)) = self.config.as_ref().and_then(|config| {
            config
                .upload_url
                .clone()
                .map(|url| (url, config.headers.clone()))
        }) else {
            warn!(
                "simple-upload-adapter-missing-uploadUrl: \
                 Missing the \"uploadUrl\" property in the \"simpleUpload\" editor configuration."
            );
            return Ok(());
        };

        let client = self.client.clone();
        repository.set_upload_adapter_factory(Box::new(
            move |loader: Arc<FileLoader>| -> Box<dyn UploadAdapter> {
                Box::new(SimpleUploadAdapter::new(
                    loader,
                    client.clone(),
                    upload_url.clone(),
                    headers.clone(),
                ))
            },
        ));
        info!("{} registered", self.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockUploadAdapter;
    use crate::codec::MockCodec;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn init_with_captured_logs(plugin: &dyn Plugin, repository: &mut FileRepository) -> String {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        tracing::subscriber::with_default(subscriber, || plugin.init(repository)).unwrap();
        logs.contents()
    }

    #[test]
    fn test_repository_without_factory() {
        let repository = FileRepository::new();
        let loader = repository.create_loader(ImageBlob::new("a.png", vec![]));

        assert!(!repository.has_upload_adapter_factory());
        assert!(matches!(
            repository.create_upload_adapter(loader),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_uses_factory() {
        let mock = MockUploadAdapter::new().with_response("https://cdn/a.png".to_string());
        let mut repository = FileRepository::new();
        repository.set_upload_adapter_factory(Box::new({
            let mock = mock.clone();
            move |_loader: Arc<FileLoader>| -> Box<dyn UploadAdapter> { Box::new(mock.clone()) }
        }));

        let result = repository
            .upload(ImageBlob::new("a.png", vec![1]))
            .await
            .unwrap();
        assert_eq!(result.default, "https://cdn/a.png");
        assert_eq!(mock.get_upload_count(), 1);
    }

    #[tokio::test]
    async fn test_base64_plugin_registers_adapter() {
        let codec = MockCodec::new();
        let plugin = Base64UploadPlugin::with_codec(codec.clone(), &Base64UploadConfig::default());
        let mut repository = FileRepository::new();

        plugin.init(&mut repository).unwrap();
        assert!(repository.has_upload_adapter_factory());

        let result = repository
            .upload(ImageBlob::new("tiny.png", MockCodec::source_image(10, 10)))
            .await
            .unwrap();
        assert!(result.default.starts_with("data:image/jpeg;base64,"));
        assert_eq!(codec.get_encode_qualities(), vec![0.6]);
    }

    #[test]
    fn test_base64_plugin_rejects_invalid_quality() {
        let config = Base64UploadConfig {
            quality: 1.5,
            ..Base64UploadConfig::default()
        };
        let mut repository = FileRepository::new();

        let err = Base64UploadPlugin::new(&config)
            .init(&mut repository)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuality(_)));
        assert!(!repository.has_upload_adapter_factory());
    }

    #[test]
    fn test_simple_plugin_registers_adapter() {
        let plugin = SimpleUploadPlugin::new(Some(SimpleUploadConfig {
            upload_url: Some("http://example.com".to_string()),
            headers: HashMap::new(),
        }));
        let mut repository = FileRepository::new();

        let logs = init_with_captured_logs(&plugin, &mut repository);

        assert!(repository.has_upload_adapter_factory());
        assert!(logs.is_empty());
    }

    #[test]
    fn test_simple_plugin_missing_upload_url_warns_once() {
        let config: SimpleUploadConfig = serde_json::from_str(r#"{"foo": "bar"}"#).unwrap();
        let plugin = SimpleUploadPlugin::new(Some(config));
        let mut repository = FileRepository::new();

        let logs = init_with_captured_logs(&plugin, &mut repository);

        assert!(!repository.has_upload_adapter_factory());
        assert_eq!(logs.lines().count(), 1);
        assert!(logs.contains("WARN"));
        assert!(logs.contains("simple-upload-adapter-missing-uploadUrl"));
    }

    #[test]
    fn test_simple_plugin_without_namespace_is_not_registered() {
        let mut repository = FileRepository::new();

        let logs = init_with_captured_logs(&SimpleUploadPlugin::new(None), &mut repository);

        assert!(!repository.has_upload_adapter_factory());
        assert_eq!(logs.lines().count(), 1);
    }
}
