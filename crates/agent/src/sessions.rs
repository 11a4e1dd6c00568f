use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use shopwise_core::cart::Cart;
use shopwise_core::completion::GatheringState;
use shopwise_core::domain::candidate::Candidate;
use shopwise_core::domain::requirement::{RequirementSpec, SessionId};
use shopwise_core::errors::ApplicationError;
use shopwise_core::flows::SessionStatus;
use shopwise_core::ranking::SearchResult;
use tokio::sync::{Mutex, RwLock};

use crate::conversation::{Message, Transcript};

/// Everything the runtime knows about one conversation.
#[derive(Clone, Debug)]
pub struct ShoppingSession {
    pub(crate) id: SessionId,
    pub(crate) transcript: Transcript,
    pub(crate) spec: RequirementSpec,
    pub(crate) gathering: GatheringState,
    pub(crate) status: SessionStatus,
    pub(crate) turns: u32,
    pub(crate) cart: Cart,
    pub(crate) last_result: Option<SearchResult>,
    pub(crate) created_at: DateTime<Utc>,
}

impl ShoppingSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            transcript: Transcript::new(),
            spec: RequirementSpec::new(),
            gathering: GatheringState::Gathering,
            status: SessionStatus::GatheringInfo,
            turns: 0,
            cart: Cart::new(),
            last_result: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn spec(&self) -> &RequirementSpec {
        &self.spec
    }

    pub fn gathering(&self) -> GatheringState {
        self.gathering
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn last_result(&self) -> Option<&SearchResult> {
        self.last_result.as_ref()
    }

    /// Looks a product up in the latest ranked result.
    pub fn find_product(&self, source_id: &str, external_id: &str) -> Option<&Candidate> {
        self.last_result.as_ref()?.products.iter().map(|ranked| &ranked.candidate).find(
            |candidate| candidate.source_id() == source_id && candidate.external_id() == external_id,
        )
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id.0.clone(),
            status: self.status,
            turns: self.turns,
            requirements: self.spec.snapshot(),
            messages: self.transcript.messages().to_vec(),
            created_at: self.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub status: SessionStatus,
    pub turns: u32,
    pub requirements: Value,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

pub type SessionHandle = Arc<Mutex<ShoppingSession>>;

/// In-memory sessions. Each session sits behind its own lock so turns and
/// searches for one session run one at a time. A session stays until it is
/// removed; nothing expires on its own.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> (SessionId, SessionHandle) {
        let id = SessionId::generate();
        let handle = Arc::new(Mutex::new(ShoppingSession::new(id.clone())));
        self.sessions.write().await.insert(id.clone(), handle.clone());
        tracing::info!(event_name = "agent.session_created", session_id = %id, "created session");
        (id, handle)
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn require(&self, id: &SessionId) -> Result<SessionHandle, ApplicationError> {
        self.get(id).await.ok_or_else(|| ApplicationError::SessionNotFound(id.0.clone()))
    }

    pub async fn remove(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(
                event_name = "agent.session_removed",
                session_id = %id,
                "removed session"
            );
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
