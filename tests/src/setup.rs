//! Common test setup functions.

use std::sync::Arc;

use axum::Router;

use admission::{RateLimiter, RuleSet, SingleFlightGate};
use api::{router, AppState, RelayService, ServiceConfig};
use paginate::{PaginationStore, Paginator};
use pipeline::{ImagePipeline, PipelineConfig};
use relay_core::{MemoryHistory, UpstreamCaller};

use crate::mocks::MockUpstream;

/// Test context running the production wiring against a mock upstream.
///
/// Same code paths as the binary: the real router with all middleware,
/// the real admission components, the real pipeline. Only the completion
/// API is scripted.
pub struct TestContext {
    pub mock_upstream: Arc<MockUpstream>,
    pub service: Arc<RelayService>,
    pub router: Router,
}

impl TestContext {
    /// Context with default configuration and admin id 999.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestContextBuilder {
        TestContextBuilder::default()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TestContextBuilder {
    rules: RuleSet,
    pipeline: PipelineConfig,
    service: ServiceConfig,
    max_page_chars: usize,
}

impl Default for TestContextBuilder {
    fn default() -> Self {
        Self {
            rules: RuleSet::default(),
            pipeline: PipelineConfig {
                // Keep retries snappy under test.
                backoff_base_ms: 1,
                ..PipelineConfig::default()
            },
            service: ServiceConfig {
                default_model: "test-model".to_string(),
                admin_ids: vec![999],
                ..ServiceConfig::default()
            },
            max_page_chars: relay_core::limits::DEFAULT_MAX_PAGE_CHARS,
        }
    }
}

impl TestContextBuilder {
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn service(mut self, service: ServiceConfig) -> Self {
        self.service = service;
        self
    }

    pub fn max_page_chars(mut self, max: usize) -> Self {
        self.max_page_chars = max;
        self
    }

    pub fn build(self) -> TestContext {
        let mock_upstream = MockUpstream::new();
        let upstream: Arc<dyn UpstreamCaller> = mock_upstream.clone();

        let limiter = Arc::new(RateLimiter::new(self.rules));
        let gate = SingleFlightGate::default();
        let pipeline = Arc::new(ImagePipeline::new(self.pipeline, upstream.clone()));
        let paginator = Paginator::new(self.max_page_chars, 64);

        let service = Arc::new(RelayService::new(
            limiter,
            gate,
            pipeline,
            upstream,
            paginator,
            Arc::new(PaginationStore::new()),
            Arc::new(MemoryHistory::default()),
            self.service,
        ));

        let router = router(AppState::new(service.clone()));

        TestContext {
            mock_upstream,
            service,
            router,
        }
    }
}
