//! The relay service: admission → upstream → pagination.
//!
//! Both submit paths run the same gauntlet: rate check, single-flight
//! acquisition, then the heavy call. The flight permit is RAII and held
//! across every await, so the slot frees on success, typed failure, and
//! cancellation alike. Acquisition itself never suspends; the busy flag is
//! set before any asynchronous work starts.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use admission::{ActionKind, ActionRule, RateLimiter, SingleFlightGate};
use paginate::{Direction, NavError, PageView, PaginationStore, Paginator};
use pipeline::{ImagePipeline, PipelineStatsSnapshot};
use relay_core::limits::DEFAULT_HISTORY_TURNS;
use relay_core::{
    ChatId, Error, HistoryStore, ImageJob, MessageId, Result, Role, Turn, UpstreamCaller, UserId,
};
use telemetry::{metrics, MetricsSnapshot};

/// Service-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Model used when a request does not name one.
    pub default_model: String,
    /// System prompt for text conversations.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Turns of history included per text request.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Static admin-id allowlist.
    #[serde(default)]
    pub admin_ids: Vec<UserId>,
}

fn default_history_turns() -> usize {
    DEFAULT_HISTORY_TURNS
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".to_string(),
            system_prompt: None,
            history_turns: default_history_turns(),
            admin_ids: Vec::new(),
        }
    }
}

/// A finished answer, already formatted and paginated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub pages: Vec<String>,
}

impl Reply {
    /// The page delivered first.
    pub fn first_page(&self) -> &str {
        self.pages.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_paginated(&self) -> bool {
        self.pages.len() > 1
    }
}

/// Aggregate view for the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub metrics: MetricsSnapshot,
    pub pipeline: PipelineStatsSnapshot,
    pub tracked_jobs: usize,
    pub active_flights: usize,
    pub rate_windows: usize,
    pub pagination_states: usize,
}

/// Core orchestration behind the HTTP surface.
pub struct RelayService {
    limiter: Arc<RateLimiter>,
    gate: SingleFlightGate,
    pipeline: Arc<ImagePipeline>,
    upstream: Arc<dyn UpstreamCaller>,
    paginator: Paginator,
    pages: Arc<PaginationStore>,
    history: Arc<dyn HistoryStore>,
    config: ServiceConfig,
    admin_ids: HashSet<UserId>,
}

impl RelayService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        limiter: Arc<RateLimiter>,
        gate: SingleFlightGate,
        pipeline: Arc<ImagePipeline>,
        upstream: Arc<dyn UpstreamCaller>,
        paginator: Paginator,
        pages: Arc<PaginationStore>,
        history: Arc<dyn HistoryStore>,
        config: ServiceConfig,
    ) -> Self {
        let admin_ids = config.admin_ids.iter().copied().collect();
        Self {
            limiter,
            gate,
            pipeline,
            upstream,
            paginator,
            pages,
            history,
            config,
            admin_ids,
        }
    }

    /// Runs a text completion for one user message.
    pub async fn submit_text(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        text: String,
        model: Option<&str>,
    ) -> Result<Reply> {
        let started = Instant::now();
        metrics().requests_received.inc();

        self.admit(user_id, ActionKind::Text)?;
        let _permit = self.acquire_flight(user_id)?;

        self.history
            .append(user_id, Turn::text(Role::User, text.clone()))
            .await;

        let mut conversation = match self.config.system_prompt.as_deref() {
            Some(prompt) => relay_core::Conversation::with_system(prompt),
            None => relay_core::Conversation::new(),
        };
        for turn in self
            .history
            .recent(user_id, self.config.history_turns)
            .await
        {
            conversation.push(turn);
        }

        let model = model.unwrap_or(&self.config.default_model);
        let answer = self.upstream.complete(&conversation, model).await?;

        self.history
            .append(user_id, Turn::text(Role::Assistant, answer.clone()))
            .await;

        let reply = self.render(&answer);
        metrics()
            .request_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        debug!(
            user_id = user_id,
            chat_id = chat_id,
            pages = reply.pages.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Text request completed"
        );
        Ok(reply)
    }

    /// Runs an image-analysis job through the bounded pool.
    pub async fn submit_image(&self, job: ImageJob, model: Option<&str>) -> Result<Reply> {
        let started = Instant::now();
        metrics().requests_received.inc();

        let user_id = job.user_id;
        self.admit(user_id, ActionKind::Image)?;
        let _permit = self.acquire_flight(user_id)?;

        let model = model.unwrap_or(&self.config.default_model);
        let answer = self.pipeline.submit(job, model).await?;

        let reply = self.render(&answer);
        metrics()
            .request_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        debug!(
            user_id = user_id,
            pages = reply.pages.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Image request completed"
        );
        Ok(reply)
    }

    /// Rate check for light actions the transport performs itself
    /// (settings changes, generic commands).
    pub fn check_action(&self, user_id: UserId, kind: ActionKind) -> Result<()> {
        self.admit(user_id, kind)
    }

    fn admit(&self, user_id: UserId, kind: ActionKind) -> Result<()> {
        let now = Instant::now();
        let decision = self.limiter.check_at(user_id, kind, now);
        match decision.as_error(now) {
            Some(err) => {
                metrics().requests_rate_limited.inc();
                info!(user_id = user_id, kind = %kind, "Request rate limited");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn acquire_flight(&self, user_id: UserId) -> Result<admission::FlightPermit> {
        self.gate.try_acquire(user_id).ok_or_else(|| {
            metrics().requests_rejected_busy.inc();
            info!(user_id = user_id, "Rejected: heavy request already in flight");
            Error::AlreadyBusy
        })
    }

    fn render(&self, answer: &str) -> Reply {
        let clean = self.paginator.format(answer);
        let pages = self.paginator.paginate(&clean);
        if pages.len() > 1 {
            metrics().replies_paginated.inc();
        }
        metrics().pages_served.inc();
        Reply {
            pages: pages.as_ref().clone(),
        }
    }

    // === Pagination surface ===

    /// Registers a delivered multi-page reply for navigation.
    pub fn register_pages(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        pages: Vec<String>,
    ) -> bool {
        self.pages.register(chat_id, message_id, pages)
    }

    pub fn navigate(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        direction: Direction,
    ) -> std::result::Result<PageView, NavError> {
        let view = self.pages.navigate(chat_id, message_id, direction)?;
        metrics().pages_served.inc();
        Ok(view)
    }

    /// Forgets a user's conversation history (transport-side reset).
    pub async fn clear_history(&self, user_id: UserId) {
        self.history.clear(user_id).await;
        debug!(user_id = user_id, "Cleared conversation history");
    }

    /// Forgets one delivered message's pages (message replaced/deleted).
    pub fn drop_pages(&self, chat_id: ChatId, message_id: MessageId) -> bool {
        self.pages.remove(chat_id, message_id)
    }

    /// Bulk-clears a chat's pagination state.
    pub fn clear_chat_pages(&self, chat_id: ChatId) -> usize {
        self.pages.clear_chat(chat_id)
    }

    // === Administrative surface ===

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn add_vip(&self, user_id: UserId) -> bool {
        self.limiter.add_vip(user_id)
    }

    pub fn remove_vip(&self, user_id: UserId) -> bool {
        self.limiter.remove_vip(user_id)
    }

    pub fn reset_limits(&self, user_id: UserId, kind: Option<ActionKind>) -> usize {
        let reset = self.limiter.reset_user(user_id, kind);
        info!(user_id = user_id, kind = ?kind, reset = reset, "Reset rate-limit state");
        reset
    }

    pub fn replace_rule(&self, kind: ActionKind, rule: ActionRule) {
        self.limiter.replace_rule(kind, rule);
    }

    /// Clears a stuck flight slot.
    pub fn release_flight(&self, user_id: UserId) -> bool {
        let released = self.gate.force_release(user_id);
        if released {
            warn!(user_id = user_id, "Force-released flight slot");
        }
        released
    }

    /// Forces the stale-job sweep.
    pub fn sweep_stale_jobs(&self) -> usize {
        self.pipeline.evict_stale()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            metrics: metrics().snapshot(),
            pipeline: self.pipeline.stats(),
            tracked_jobs: self.pipeline.tracked_jobs(),
            active_flights: self.gate.active_count(),
            rate_windows: self.limiter.window_count(),
            pagination_states: self.pages.len(),
        }
    }

    /// Stops the pipeline and waits for outstanding jobs.
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }
}
