//! claimlens — multi-provider AI document analysis with consensus building.
//!
//! A document (image or scan) is fanned out to several independent AI
//! analysis backends concurrently; their heterogeneous, partially
//! overlapping outputs are reconciled field by field into one consensus
//! result with a calibrated confidence score.
//!
//! Pipeline: select providers → dispatch in parallel → collect partial
//! results → merge consensus → score confidence.
//!
//! The crate is a library-level engine: it consumes document bytes plus
//! optional typed hints and produces an [`AnalysisConsensus`]. Upload
//! handling, auth, and persistence are the caller's concern.

pub mod analyzer;
pub mod config;
pub mod confidence;
pub mod consensus;
pub mod dispatch;
pub mod error;
pub mod provider;
pub mod registry;
pub mod types;

pub use analyzer::DocumentAnalyzer;
pub use config::CredentialStore;
pub use error::{OrchestrationError, ProviderError};
pub use registry::ProviderRegistry;
pub use types::*;
