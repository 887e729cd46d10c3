// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-query control flow.
//!
//! gate -> cache -> route -> execute (one retry lower) -> ledger, audit,
//! lifetime, cache. The ledger and audit log are written together, with no
//! await between them, once a backend call succeeds; dropping the future
//! earlier leaves nothing behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tollgate_audit::{AuditContext, AuditLog};
use tollgate_cache::{CachedAnswer, ResultCache};
use tollgate_core::{
    CacheOutcome, ClassificationLevel, Decision, HitType, IdGenerator, InferenceAdapter,
    InferenceRequest, InferenceResponse, Tier, TokenCounts, TollgateError, UuidGenerator,
};
use tollgate_cost::{charge, CostLedger};
use tollgate_router::{parse_tier_override, RoutingDecision, TierRouter};
use tollgate_security::{ClassificationGate, PermittedTiers};
use tracing::{debug, info, warn};

use crate::lifetime::LifetimeManager;

/// Per-call switches.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Skip the cache probe and overwrite any existing entry.
    pub bypass_cache: bool,
    /// Cache TTL for this answer. `None` uses the configured default.
    pub ttl: Option<Duration>,
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache(HitType),
    Backend,
}

/// A successfully answered query.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub query_id: String,
    pub text: String,
    /// Tier that produced `text`. [`Tier::Cache`] for cache hits.
    pub tier: Tier,
    pub source: ResponseSource,
    /// Routing decision for backend answers.
    pub routing: Option<RoutingDecision>,
    pub forced_downgrade: bool,
    /// The answer came from the fallback tier after a failure.
    pub retried: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub savings: f64,
    pub duration: Duration,
    pub model: Option<String>,
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    gate: ClassificationGate,
    router: TierRouter,
    cache: Option<Arc<ResultCache>>,
    ledger: Option<Arc<CostLedger>>,
    audit: Option<Arc<AuditLog>>,
    lifetime: Option<Arc<LifetimeManager>>,
    adapters: Vec<Arc<dyn InferenceAdapter>>,
    ids: Arc<dyn IdGenerator>,
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self {
            gate: ClassificationGate::new(false, None),
            router: TierRouter::new(),
            cache: None,
            ledger: None,
            audit: None,
            lifetime: None,
            adapters: Vec::new(),
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn gate(mut self, gate: ClassificationGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ledger(mut self, ledger: Arc<CostLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn lifetime(mut self, lifetime: Arc<LifetimeManager>) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Adds a backend. The first adapter that supports a tier serves it.
    pub fn adapter(mut self, adapter: Arc<dyn InferenceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn adapters(mut self, adapters: impl IntoIterator<Item = Arc<dyn InferenceAdapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    /// Source of per-query identifiers.
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Fails if the cache, ledger or audit log is missing.
    pub fn build(self) -> Result<Dispatcher, TollgateError> {
        let missing = |what: &str| TollgateError::Internal(format!("dispatcher built without {what}"));
        Ok(Dispatcher {
            gate: self.gate,
            router: self.router,
            cache: self.cache.ok_or_else(|| missing("a cache"))?,
            ledger: self.ledger.ok_or_else(|| missing("a cost ledger"))?,
            audit: self.audit.ok_or_else(|| missing("an audit log"))?,
            lifetime: self.lifetime,
            adapters: self.adapters,
            ids: self.ids,
        })
    }
}

/// Answers queries through the tiered pipeline.
pub struct Dispatcher {
    gate: ClassificationGate,
    router: TierRouter,
    cache: Arc<ResultCache>,
    ledger: Arc<CostLedger>,
    audit: Arc<AuditLog>,
    lifetime: Option<Arc<LifetimeManager>>,
    adapters: Vec<Arc<dyn InferenceAdapter>>,
    ids: Arc<dyn IdGenerator>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn gate(&self) -> &ClassificationGate {
        &self.gate
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn lifetime(&self) -> Option<&Arc<LifetimeManager>> {
        self.lifetime.as_ref()
    }

    pub async fn dispatch(
        &self,
        query: &str,
        classification: ClassificationLevel,
    ) -> Result<DispatchOutcome, TollgateError> {
        self.dispatch_with(query, classification, DispatchOptions::default())
            .await
    }

    /// Runs one query. Only [`TollgateError::BackendFailure`] escapes for a
    /// failed backend; every other failure is logged and degraded.
    pub async fn dispatch_with(
        &self,
        query: &str,
        classification: ClassificationLevel,
        options: DispatchOptions,
    ) -> Result<DispatchOutcome, TollgateError> {
        let started = Instant::now();
        let query_id = self.ids.next_id();
        let (_, prompt) = parse_tier_override(query);
        let session_id = self.ledger.session_id();
        let ctx = AuditContext {
            classification,
            session_id: &session_id,
            query: prompt,
        };

        let permitted = self.gate.permitted(classification);

        let cache_outcome = if options.bypass_cache {
            CacheOutcome::Bypass
        } else {
            if let Some(hit) = self.cache.lookup(prompt, classification) {
                return Ok(self.answer_from_cache(query_id, &ctx, hit, started));
            }
            CacheOutcome::Miss
        };

        let routing = match self.router.select(query, classification, &permitted) {
            Ok(routing) => routing,
            Err(e) => return Err(self.route_refused(&ctx, cache_outcome, e)),
        };
        if routing.forced_downgrade {
            warn!(
                query_id = %query_id,
                classification = %classification,
                desired = %routing.desired,
                tier = %routing.tier,
                reason = %routing.reason,
                "policy violation avoided, tier downgraded"
            );
        }

        let decision = |tier| Decision {
            tier,
            cache_outcome,
            forced_downgrade: routing.forced_downgrade,
        };

        let (tier, response, retried) = match self.execute(routing.tier, prompt, classification).await {
            Ok(response) => (routing.tier, response, false),
            Err(first) => {
                let retry_tier = self.router.fallback(routing.tier, permitted.tiers());
                let Some(retry_tier) = retry_tier else {
                    return Err(self.give_up(&ctx, decision(routing.tier), first));
                };
                warn!(
                    query_id = %query_id,
                    failed = %routing.tier,
                    retry = %retry_tier,
                    error = %first,
                    "backend failed, retrying on lower tier"
                );
                self.audit
                    .record_retry(&ctx, decision(routing.tier), retry_tier, &first.to_string());
                match self.execute(retry_tier, prompt, classification).await {
                    Ok(response) => (retry_tier, response, true),
                    Err(second) => {
                        return Err(self.give_up(&ctx, decision(retry_tier), second));
                    }
                }
            }
        };

        let duration = started.elapsed();
        let priced = charge(tier, response.input_tokens, response.output_tokens);
        let tokens = TokenCounts {
            input: response.input_tokens,
            output: response.output_tokens,
        };
        self.ledger
            .record(tier, response.input_tokens, response.output_tokens, duration, prompt);
        self.audit
            .record_decision(&ctx, decision(tier), priced.cost, tokens);
        self.touch_lifetime();

        // Charged and audited above; the write-through may be dropped mid-way.
        self.cache
            .store(
                prompt,
                classification,
                CachedAnswer {
                    payload: response.text.clone(),
                    tier,
                    input_tokens: response.input_tokens,
                    output_tokens: response.output_tokens,
                },
                options.ttl,
            )
            .await;

        info!(
            query_id = %query_id,
            tier = %tier,
            classification = %classification,
            cost = priced.cost,
            retried,
            "query answered"
        );

        Ok(DispatchOutcome {
            query_id,
            text: response.text,
            tier,
            source: ResponseSource::Backend,
            forced_downgrade: routing.forced_downgrade,
            routing: Some(routing),
            retried,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost: priced.cost,
            savings: priced.savings,
            duration,
            model: response.model,
        })
    }

    fn answer_from_cache(
        &self,
        query_id: String,
        ctx: &AuditContext<'_>,
        hit: tollgate_cache::CacheHit,
        started: Instant,
    ) -> DispatchOutcome {
        let answer = hit.answer;
        let tokens = TokenCounts {
            input: answer.input_tokens,
            output: answer.output_tokens,
        };
        let duration = started.elapsed();
        let priced = charge(Tier::Cache, tokens.input, tokens.output);

        self.audit.record_cache_hit(ctx, hit.hit_type, tokens);
        self.ledger
            .record(Tier::Cache, tokens.input, tokens.output, duration, ctx.query);
        self.touch_lifetime();

        debug!(
            query_id = %query_id,
            hit_type = %hit.hit_type,
            original_tier = %answer.tier,
            age = ?hit.age,
            "answered from cache"
        );

        DispatchOutcome {
            query_id,
            text: answer.payload,
            tier: Tier::Cache,
            source: ResponseSource::Cache(hit.hit_type),
            routing: None,
            forced_downgrade: false,
            retried: false,
            input_tokens: tokens.input,
            output_tokens: tokens.output,
            cost: priced.cost,
            savings: priced.savings,
            duration,
            model: None,
        }
    }

    fn adapter_for(&self, tier: Tier) -> Option<&Arc<dyn InferenceAdapter>> {
        self.adapters.iter().find(|a| a.supports(tier))
    }

    async fn execute(
        &self,
        tier: Tier,
        prompt: &str,
        classification: ClassificationLevel,
    ) -> Result<InferenceResponse, TollgateError> {
        let adapter = self
            .adapter_for(tier)
            .ok_or_else(|| TollgateError::backend(tier, "no backend configured for this tier"))?;
        let request = InferenceRequest {
            tier,
            prompt: prompt.to_string(),
            classification,
        };
        match adapter.execute(request).await {
            Ok(response) => Ok(response),
            Err(e @ TollgateError::BackendFailure { .. }) => Err(e),
            Err(other) => Err(TollgateError::backend(tier, other.to_string())),
        }
    }

    fn give_up(
        &self,
        ctx: &AuditContext<'_>,
        decision: Decision,
        error: TollgateError,
    ) -> TollgateError {
        warn!(tier = %decision.tier, error = %error, "backend failed, no retry left");
        self.audit
            .record_backend_failure(ctx, decision, &error.to_string());
        // A failed query is still operator activity, but nothing to save.
        if let Some(lifetime) = &self.lifetime {
            lifetime.record_activity();
        }
        error
    }

    /// The gate always leaves Local open, so the router refusing every tier
    /// means a misconfigured gate. Reported like a failed backend.
    fn route_refused(
        &self,
        ctx: &AuditContext<'_>,
        cache_outcome: CacheOutcome,
        error: TollgateError,
    ) -> TollgateError {
        let tier = match &error {
            TollgateError::PolicyViolation { tier, .. } => *tier,
            _ => Tier::Local,
        };
        let decision = Decision {
            tier,
            cache_outcome,
            forced_downgrade: true,
        };
        self.give_up(ctx, decision, TollgateError::backend(tier, error.to_string()))
    }

    fn touch_lifetime(&self) {
        if let Some(lifetime) = &self.lifetime {
            lifetime.record_activity();
            lifetime.mark_dirty();
        }
    }

    /// Permitted tiers for `classification` under this dispatcher's gate.
    pub fn permitted(&self, classification: ClassificationLevel) -> PermittedTiers {
        self.gate.permitted(classification)
    }
}
