use super::{OperationState, UploadAdapter};
use crate::models::UploadResult;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockUploadAdapter {
    response: Arc<Mutex<Option<String>>>,
    failure: Arc<Mutex<Option<String>>>,
    upload_count: Arc<Mutex<usize>>,
    abort_count: Arc<Mutex<usize>>,
    state: Arc<Mutex<OperationState>>,
}

impl MockUploadAdapter {
    pub fn new() -> Self {
        Self {
            response: Arc::new(Mutex::new(None)),
            failure: Arc::new(Mutex::new(None)),
            upload_count: Arc::new(Mutex::new(0)),
            abort_count: Arc::new(Mutex::new(0)),
            state: Arc::new(Mutex::new(OperationState::Idle)),
        }
    }

    pub fn with_response(self, url: String) -> Self {
        *self.response.lock().unwrap() = Some(url);
        self
    }

    pub fn with_failure(self, message: String) -> Self {
        *self.failure.lock().unwrap() = Some(message);
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_abort_count(&self) -> usize {
        *self.abort_count.lock().unwrap()
    }
}

impl Default for MockUploadAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadAdapter for MockUploadAdapter {
    async fn upload(&self) -> Result<UploadResult> {
        *self.upload_count.lock().unwrap() += 1;

        let result = match self.failure.lock().unwrap().clone() {
            Some(message) => Err(Error::Upload(message)),
            None => Ok(UploadResult::new(
                self.response
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| "https://mock-upload.example.com/image.jpeg".to_string()),
            )),
        };

        *self.state.lock().unwrap() = if result.is_ok() {
            OperationState::Resolved
        } else {
            OperationState::Rejected
        };
        result
    }

    fn abort(&self) {
        *self.abort_count.lock().unwrap() += 1;
    }

    fn state(&self) -> OperationState {
        *self.state.lock().unwrap()
    }
}
