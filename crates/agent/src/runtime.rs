use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use shopwise_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, TracingAuditSink};
use shopwise_core::cart::CartItemId;
use shopwise_core::catalog::demo_sources;
use shopwise_core::completion::{CompletionPolicy, CompletionReason, TurnInput};
use shopwise_core::config::{AppConfig, LlmConfig, LlmProvider, SearchConfig};
use shopwise_core::domain::candidate::Variant;
use shopwise_core::domain::requirement::RequirementSpec;
use shopwise_core::domain::update::{FieldName, UpdateEvent};
use shopwise_core::errors::{ApplicationError, DomainError};
use shopwise_core::flows::{FlowContext, FlowEngine, FlowEvent, SessionStatus, ShoppingSessionFlow};
use shopwise_core::ranking::{RankingEngine, SearchResult};
use shopwise_core::reference::ReferenceDataCache;
use shopwise_core::requirements::IntentUpdateApplier;
use shopwise_core::search::aggregator::DEFAULT_SOURCE_TIMEOUT;
use shopwise_core::search::http::{http_client, HttpReferenceLoader};
use shopwise_core::search::{
    Aggregator, HttpJsonSource, ProductSource, SearchQuery, DEFAULT_LIMIT_PER_SOURCE,
};

use crate::conversation::KeywordExtractor;
use crate::extractor::{IntentExtractor, LlmExtractor};
use crate::llm::OpenAiCompatibleClient;
use crate::sessions::ShoppingSession;

pub const READY_REPLY: &str = "Got it. Your brief is ready for search.";
pub const FALLBACK_QUESTION: &str = "Anything else I should know?";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub reply: String,
    pub requirements: Value,
    pub status: SessionStatus,
    pub turn: u32,
    pub changed: Vec<FieldName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionReason>,
}

/// Drives turns and searches for sessions. Holds no session state itself.
pub struct AgentRuntime {
    extractor: Arc<dyn IntentExtractor>,
    applier: IntentUpdateApplier,
    completion: CompletionPolicy,
    flow: FlowEngine<ShoppingSessionFlow>,
    aggregator: Aggregator,
    ranking: RankingEngine,
    limit_per_source: usize,
    audit: Arc<dyn AuditSink>,
    today: Option<NaiveDate>,
}

impl AgentRuntime {
    pub fn new(extractor: Arc<dyn IntentExtractor>, aggregator: Aggregator) -> Self {
        Self {
            extractor,
            applier: IntentUpdateApplier::new(),
            completion: CompletionPolicy::default(),
            flow: FlowEngine::default(),
            aggregator,
            ranking: RankingEngine::new(),
            limit_per_source: DEFAULT_LIMIT_PER_SOURCE,
            audit: Arc::new(TracingAuditSink),
            today: None,
        }
    }

    /// Rule-based extraction over the demo catalogs.
    pub fn demo() -> Self {
        Self::new(
            Arc::new(KeywordExtractor::new()),
            Aggregator::new(demo_sources(), DEFAULT_SOURCE_TIMEOUT),
        )
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let extractor = build_extractor(&config.llm)?;
        let sources = build_sources(&config.search)?;
        let aggregator = Aggregator::new(sources, config.search.source_timeout());

        Ok(Self::new(extractor, aggregator)
            .with_completion(config.completion.policy())
            .with_ranking(RankingEngine::with_weights(config.ranking))
            .with_limit_per_source(config.search.limit_per_source))
    }

    pub fn with_completion(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_ranking(mut self, ranking: RankingEngine) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_limit_per_source(mut self, limit: usize) -> Self {
        self.limit_per_source = limit;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Pins "today" for delivery scoring.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.aggregator.source_ids()
    }

    pub fn completion(&self) -> &CompletionPolicy {
        &self.completion
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Processes one user message. Nothing in the session changes when the
    /// extractor fails.
    pub async fn handle_turn(
        &self,
        session: &mut ShoppingSession,
        message: &str,
        correlation_id: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        if session.status != SessionStatus::GatheringInfo {
            return Err(DomainError::InvalidSessionTransition {
                from: session.status,
                to: SessionStatus::GatheringInfo,
            }
            .into());
        }

        let audit = AuditContext::new(Some(session.id.clone()), correlation_id, "user");
        let mut transcript = session.transcript.clone();
        transcript.push_user(message);

        let extraction = match self.extractor.extract(&transcript, &session.spec).await {
            Ok(extraction) => extraction,
            Err(error) => {
                self.audit.emit(
                    audit
                        .event(
                            "conversation.extraction_failed",
                            AuditCategory::Conversation,
                            AuditOutcome::Failed,
                        )
                        .with_metadata("extractor", self.extractor.name())
                        .with_metadata("error", error.to_string()),
                );
                return Err(ApplicationError::Integration(error.to_string()));
            }
        };

        session.transcript = transcript;
        session.turns += 1;
        let turn = session.turns;

        let mut changed: Vec<FieldName> = Vec::new();
        let mut combined = UpdateEvent::new();
        for event in &extraction.updates {
            let report = self.applier.apply(&mut session.spec, event);
            for field in report.changed {
                if !changed.contains(&field) {
                    changed.push(field);
                }
            }
            for update in event.updates() {
                combined.push(update.clone());
            }
        }

        let input = TurnInput { event: &combined, explicit_complete: extraction.complete, turn };
        let outcome = self.completion.transition(session.gathering, input, &session.spec);
        session.gathering = outcome.to;

        if outcome.became_ready() {
            session.spec.mark_complete();
            let transition = self
                .flow
                .apply_with_audit(
                    &session.status,
                    &FlowEvent::RequirementsCompleted,
                    &FlowContext::completed(),
                    self.audit.as_ref(),
                    &audit,
                )
                .map_err(DomainError::from)?;
            session.status = transition.to;
        }

        let reply = if session.status == SessionStatus::ReadyForSearch {
            READY_REPLY.to_string()
        } else {
            self.completion
                .clarifying_question(&session.spec)
                .map(str::to_string)
                .or(extraction.reply)
                .unwrap_or_else(|| FALLBACK_QUESTION.to_string())
        };
        session.transcript.push_assistant(reply.clone());

        let changed_names = changed.iter().map(|field| field.as_str()).collect::<Vec<_>>().join(",");
        self.audit.emit(
            audit
                .event(
                    "conversation.turn_processed",
                    AuditCategory::Conversation,
                    AuditOutcome::Success,
                )
                .with_metadata("turn", turn.to_string())
                .with_metadata("changed", changed_names)
                .with_metadata("status", session.status.as_str()),
        );
        tracing::info!(
            event_name = "agent.turn_handled",
            correlation_id = %correlation_id,
            session_id = %session.id,
            turn,
            changed = changed.len(),
            status = session.status.as_str(),
            completion = ?outcome.reason,
            "handled conversation turn"
        );

        Ok(TurnOutcome {
            session_id: session.id.0.clone(),
            reply,
            requirements: session.spec.snapshot(),
            status: session.status,
            turn,
            changed,
            completion: outcome.reason,
        })
    }

    /// Queries every source for the frozen brief and ranks the merged result.
    ///
    /// The session only changes once ranking is done, so dropping the future
    /// mid-search leaves it as it was.
    pub async fn run_search(
        &self,
        session: &mut ShoppingSession,
        correlation_id: &str,
    ) -> Result<SearchResult, ApplicationError> {
        let audit = AuditContext::new(Some(session.id.clone()), correlation_id, "system");
        let context = FlowContext { requirements_complete: session.spec.is_complete() };

        let started = self
            .flow
            .apply_with_audit(
                &session.status,
                &FlowEvent::SearchStarted,
                &context,
                self.audit.as_ref(),
                &audit,
            )
            .map_err(DomainError::from)?;

        let result = self.search_spec(&session.spec).await;

        let ranked = self
            .flow
            .apply_with_audit(
                &started.to,
                &FlowEvent::ResultsRanked,
                &context,
                self.audit.as_ref(),
                &audit,
            )
            .map_err(DomainError::from)?;
        session.status = ranked.to;
        session.last_result = Some(result.clone());

        self.audit.emit(
            audit
                .event("search.completed", AuditCategory::Search, AuditOutcome::Success)
                .with_metadata("products", result.products.len().to_string())
                .with_metadata("sources", result.sources.len().to_string()),
        );
        tracing::info!(
            event_name = "agent.search_completed",
            correlation_id = %correlation_id,
            session_id = %session.id,
            products = result.products.len(),
            "ranked search result"
        );

        Ok(result)
    }

    /// Searches every source for `spec` and ranks the merged candidates. No
    /// session or flow checks.
    pub async fn search_spec(&self, spec: &RequirementSpec) -> SearchResult {
        let query = SearchQuery::from_spec(spec, self.limit_per_source);
        let report = self.aggregator.search_with_report(&query.text, &query.constraints).await;

        let mut result = self.ranking.search_result(&report.candidates, spec, self.today());
        result.sources = report.outcomes;
        tracing::debug!(
            event_name = "agent.spec_searched",
            query = %query.text,
            candidates = report.candidates.len(),
            "searched sources for brief"
        );
        result
    }

    /// Adds a product from the latest result to the session cart.
    pub fn add_to_cart(
        &self,
        session: &mut ShoppingSession,
        source_id: &str,
        external_id: &str,
        quantity: u32,
        variant: Option<Variant>,
        correlation_id: &str,
    ) -> Result<CartItemId, ApplicationError> {
        let candidate =
            session.find_product(source_id, external_id).cloned().ok_or_else(|| {
                DomainError::InvalidCandidate(format!(
                    "product `{source_id}/{external_id}` is not part of the latest results"
                ))
            })?;

        let id = session.cart.add(candidate, quantity, variant)?;
        let audit = AuditContext::new(Some(session.id.clone()), correlation_id, "user");
        self.audit.emit(
            audit
                .event("cart.item_added", AuditCategory::Cart, AuditOutcome::Success)
                .with_metadata("item_id", id.to_string())
                .with_metadata("source_id", source_id)
                .with_metadata("external_id", external_id),
        );
        Ok(id)
    }
}

pub fn build_extractor(config: &LlmConfig) -> anyhow::Result<Arc<dyn IntentExtractor>> {
    match config.provider {
        LlmProvider::Rules => Ok(Arc::new(KeywordExtractor::new())),
        LlmProvider::OpenAi | LlmProvider::Ollama => {
            let client = OpenAiCompatibleClient::from_config(config)?;
            Ok(Arc::new(LlmExtractor::new(client)))
        }
    }
}

/// Demo catalogs (when enabled) followed by the configured HTTP sources, in
/// registration order.
pub fn build_sources(config: &SearchConfig) -> anyhow::Result<Vec<Arc<dyn ProductSource>>> {
    let mut sources = if config.demo_catalog { demo_sources() } else { Vec::new() };
    if config.http_sources.is_empty() {
        return Ok(sources);
    }

    let client = http_client(config.source_timeout())?;
    for source in &config.http_sources {
        let loader = HttpReferenceLoader::new(&source.id, &source.base_url, client.clone());
        let reference = Arc::new(ReferenceDataCache::new(Arc::new(loader)));
        let http = HttpJsonSource::new(&source.id, &source.base_url, client.clone())
            .with_reference(reference);
        sources.push(Arc::new(http));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use shopwise_core::audit::InMemoryAuditSink;
    use shopwise_core::catalog::demo_sources;
    use shopwise_core::completion::{CompletionPolicy, CompletionReason, SufficiencyRule};
    use shopwise_core::config::{HttpSourceConfig, SearchConfig};
    use shopwise_core::domain::requirement::{RequirementSpec, SessionId};
    use shopwise_core::errors::{ApplicationError, DomainError};
    use shopwise_core::flows::SessionStatus;
    use shopwise_core::search::aggregator::DEFAULT_SOURCE_TIMEOUT;
    use shopwise_core::search::{Aggregator, SourceStatus};

    use super::{build_sources, AgentRuntime, FALLBACK_QUESTION, READY_REPLY};
    use crate::conversation::{KeywordExtractor, Transcript};
    use crate::extractor::{Extraction, ExtractionError, IntentExtractor};
    use crate::sessions::ShoppingSession;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).expect("valid date")
    }

    fn runtime(audit: &InMemoryAuditSink) -> AgentRuntime {
        AgentRuntime::new(
            Arc::new(KeywordExtractor::new().with_today(today())),
            Aggregator::new(demo_sources(), DEFAULT_SOURCE_TIMEOUT),
        )
        .with_audit_sink(Arc::new(audit.clone()))
        .with_today(today())
    }

    fn session() -> ShoppingSession {
        ShoppingSession::new(SessionId("s-1".to_string()))
    }

    struct FailingExtractor;

    #[async_trait]
    impl IntentExtractor for FailingExtractor {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn extract(
            &self,
            _transcript: &Transcript,
            _spec: &RequirementSpec,
        ) -> Result<Extraction, ExtractionError> {
            Err(ExtractionError::Llm("model offline".to_string()))
        }
    }

    #[tokio::test]
    async fn conversation_reaches_ready_then_searches() {
        let audit = InMemoryAuditSink::default();
        let runtime = runtime(&audit);
        let mut session = session();

        let first = runtime.handle_turn(&mut session, "I need a ski outfit", "c-1").await;
        let first = first.expect("turn succeeds");
        assert_eq!(first.status, SessionStatus::GatheringInfo);
        assert_eq!(first.reply, "What's your budget?");
        assert_eq!(first.turn, 1);
        assert_eq!(first.completion, None);

        let second = runtime
            .handle_turn(&mut session, "max 400€ and I need it in 5 days", "c-2")
            .await
            .expect("turn succeeds");
        assert_eq!(second.status, SessionStatus::ReadyForSearch);
        assert_eq!(second.completion, Some(CompletionReason::Sufficient));
        assert_eq!(second.reply, READY_REPLY);
        assert!(session.spec().is_complete());
        assert_eq!(session.transcript().len(), 4);

        let result = runtime.run_search(&mut session, "c-3").await.expect("search succeeds");
        assert_eq!(session.status(), SessionStatus::ResultsReady);
        assert!(!result.products.is_empty());
        assert_eq!(result.sources.len(), 4);
        assert!(result.sources.iter().any(|outcome| outcome.source_id == "pantry"
            && outcome.status == SourceStatus::Ok { count: 0 }));
        assert!(result.products.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert!(result.why_first.starts_with("#1: "));

        let again = runtime.run_search(&mut session, "c-4").await;
        assert!(again.is_ok(), "searching again from results is allowed");

        let events = audit.events();
        assert!(events.iter().any(|event| event.event_type == "session.transition_applied"));
        assert!(events.iter().any(|event| event.event_type == "search.completed"));
    }

    #[tokio::test]
    async fn chat_after_completion_is_rejected() {
        let audit = InMemoryAuditSink::default();
        let runtime = runtime(&audit);
        let mut session = session();

        runtime
            .handle_turn(&mut session, "party outfit, that's all", "c-1")
            .await
            .expect("turn succeeds");
        assert_eq!(session.status(), SessionStatus::ReadyForSearch);

        let result = runtime.handle_turn(&mut session, "also red", "c-2").await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::InvalidSessionTransition { .. }))
        ));
        assert!(session.spec().preferences().is_empty());
    }

    #[tokio::test]
    async fn search_before_ready_is_rejected() {
        let audit = InMemoryAuditSink::default();
        let runtime = runtime(&audit);
        let mut session = session();

        let result = runtime.run_search(&mut session, "c-1").await;
        assert!(matches!(result, Err(ApplicationError::Domain(DomainError::FlowTransition(_)))));
        assert_eq!(session.status(), SessionStatus::GatheringInfo);
        assert!(audit.events().iter().any(|event| event.event_type == "session.transition_rejected"));
    }

    #[tokio::test]
    async fn turn_limit_completes_vague_conversations() {
        let audit = InMemoryAuditSink::default();
        let runtime = runtime(&audit);
        let mut session = session();

        for (index, text) in ["hello", "not sure", "hmm"].into_iter().enumerate() {
            let outcome =
                runtime.handle_turn(&mut session, text, "c").await.expect("turn succeeds");
            if index < 2 {
                assert_eq!(outcome.status, SessionStatus::GatheringInfo);
                assert_eq!(outcome.reply, "What's the occasion?");
            } else {
                assert_eq!(outcome.status, SessionStatus::ReadyForSearch);
                assert_eq!(outcome.completion, Some(CompletionReason::TurnLimit));
            }
        }
    }

    #[tokio::test]
    async fn extractor_failure_leaves_session_untouched() {
        let audit = InMemoryAuditSink::default();
        let runtime = AgentRuntime::new(
            Arc::new(FailingExtractor),
            Aggregator::new(demo_sources(), DEFAULT_SOURCE_TIMEOUT),
        )
        .with_audit_sink(Arc::new(audit.clone()));
        let mut session = session();

        let result = runtime.handle_turn(&mut session, "ski outfit", "c-1").await;
        assert!(matches!(
            result,
            Err(ApplicationError::Integration(message)) if message.contains("offline")
        ));
        assert_eq!(session.turns(), 0);
        assert!(session.transcript().is_empty());
        assert!(audit
            .events()
            .iter()
            .any(|event| event.event_type == "conversation.extraction_failed"));
    }

    #[tokio::test]
    async fn fallback_question_when_nothing_obvious_is_missing() {
        let audit = InMemoryAuditSink::default();
        let sufficiency = SufficiencyRule { threshold: 100, ..SufficiencyRule::default() };
        let runtime = runtime(&audit).with_completion(CompletionPolicy::new(10, sufficiency));
        let mut session = session();

        let outcome = runtime
            .handle_turn(&mut session, "ski outfit, 400€, size M, in 5 days", "c-1")
            .await
            .expect("turn succeeds");
        assert_eq!(outcome.status, SessionStatus::GatheringInfo);
        assert_eq!(outcome.reply, FALLBACK_QUESTION);
    }

    #[tokio::test]
    async fn cart_accepts_products_from_the_latest_result() {
        let audit = InMemoryAuditSink::default();
        let runtime = runtime(&audit);
        let mut session = session();

        runtime
            .handle_turn(&mut session, "ski jacket under 300 euro, search now", "c-1")
            .await
            .expect("turn succeeds");
        let result = runtime.run_search(&mut session, "c-2").await.expect("search succeeds");
        let top = result.products[0].candidate.clone();

        let id = runtime
            .add_to_cart(&mut session, top.source_id(), top.external_id(), 2, None, "c-3")
            .expect("product is in the result");
        assert_eq!(session.cart().get(id).map(|item| item.quantity), Some(2));

        let missing = runtime.add_to_cart(&mut session, "stylehub", "nope", 1, None, "c-4");
        assert!(matches!(
            missing,
            Err(ApplicationError::Domain(DomainError::InvalidCandidate(_)))
        ));
    }

    #[test]
    fn sources_follow_configuration() {
        let demo_only = SearchConfig {
            source_timeout_ms: 1_000,
            limit_per_source: 5,
            demo_catalog: true,
            http_sources: Vec::new(),
        };
        let ids: Vec<String> = build_sources(&demo_only)
            .expect("sources build")
            .iter()
            .map(|source| source.id().to_string())
            .collect();
        assert_eq!(ids, vec!["stylehub", "urbanoutfit", "sportdirect", "pantry"]);

        let remote_only = SearchConfig {
            demo_catalog: false,
            http_sources: vec![HttpSourceConfig {
                id: "acme".to_string(),
                base_url: "http://127.0.0.1:9".to_string(),
            }],
            ..demo_only
        };
        let sources = build_sources(&remote_only).expect("sources build");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id(), "acme");
    }
}
