//! # craftdeal - AI negotiation and generation core for an artisan marketplace
//!
//! The engines that sit between a marketplace UI and a generative-AI
//! provider:
//!
//! - **Negotiation Engine**: multi-turn bargaining over a product's price,
//!   with an in-code discount floor and deterministic deal detection
//! - **Generation Coordinator**: submits image/video generation jobs and
//!   polls long-running operations to a single artifact, with cancellation
//! - **Provider Client**: reqwest client for the Gemini REST surface behind
//!   mockable traits
//! - **App Store**: in-memory shared product/project/campaign state; deal
//!   outcomes are applied through a thin adapter, never by the engines
//! - **Market Assistant**: listing generation, pricing advice, and
//!   certificate minting prompts

pub mod config;
pub mod error;
pub mod generation;
pub mod model;
pub mod negotiation;
pub mod provider;
pub mod store;
pub mod tools;

pub use config::AppConfig;
pub use error::{EngineError, Result};
pub use generation::GenerationCoordinator;
pub use model::{
    Artifact, DealTerms, GenerationKind, GenerationRequest, NegotiationSession, OfferOutcome,
    Product, ProductSnapshot,
};
pub use negotiation::{NegotiationEngine, NegotiationPolicy};
pub use provider::{
    GeminiClient, GenerationProvider, GroundedAnswer, ReasoningProvider, SourceRef,
};
pub use store::AppStore;
pub use tools::MarketAssistant;

pub type SessionId = uuid::Uuid;
