//! Shared state handed to every request handler.

use std::sync::Arc;

use fileparse::{IngestionGateway, JobEngine};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    gateway: IngestionGateway,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(engine: Arc<JobEngine>, max_upload_bytes: u64) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                gateway: IngestionGateway::new(engine),
                max_upload_bytes: usize::try_from(max_upload_bytes).unwrap_or(usize::MAX),
            }),
        }
    }

    pub fn gateway(&self) -> &IngestionGateway {
        &self.inner.gateway
    }

    pub fn engine(&self) -> &JobEngine {
        self.inner.gateway.engine()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.inner.max_upload_bytes
    }
}
