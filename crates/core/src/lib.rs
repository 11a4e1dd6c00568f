pub mod audit;
pub mod cart;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod ranking;
pub mod reference;
pub mod requirements;
pub mod search;

pub use cart::{Cart, CartItem, CartItemId, CartSummary, CheckoutSimulation, CheckoutStep};
pub use completion::{CompletionOutcome, CompletionPolicy, GatheringState, SufficiencyRule};
pub use domain::candidate::{Candidate, RankedCandidate, ScoreBreakdown, Variant};
pub use domain::requirement::{Category, RequirementSpec, SessionId};
pub use domain::update::{FieldName, FieldUpdate, UpdateEvent};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{FlowEngine, SessionStatus, ShoppingSessionFlow};
pub use ranking::{RankingEngine, RankingWeights, SearchResult};
pub use requirements::IntentUpdateApplier;
pub use search::{Aggregator, ProductSource, SearchConstraints, SearchQuery, SourceError};
