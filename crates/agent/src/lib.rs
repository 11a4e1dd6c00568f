//! Agent runtime - conversational intent capture and search orchestration
//!
//! This crate drives a shopping session from the first message to a ranked result:
//! - Extracts structured requirement updates from natural language (`conversation`, `extractor`)
//! - Exposes the two requirement tools a language model may call (`tools`)
//! - Applies updates, decides completion and asks follow-up questions (`runtime`)
//! - Keeps per-session state behind single-flight locks (`sessions`)
//!
//! # Safety Principle
//!
//! The model is strictly a translator. It never decides prices, rankings or which
//! products are shown. Those are deterministic decisions made by `shopwise-core`.

pub mod conversation;
pub mod extractor;
pub mod llm;
pub mod runtime;
pub mod sessions;
pub mod tools;

pub use conversation::{KeywordExtractor, Message, Role, Transcript};
pub use extractor::{Extraction, ExtractionError, IntentExtractor, LlmExtractor};
pub use runtime::{AgentRuntime, TurnOutcome};
pub use sessions::{SessionRegistry, ShoppingSession};
