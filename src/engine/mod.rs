//! Extraction engine interface, adapter, and orchestration.
//!
//! Concrete OCR/PDF/table extractors live outside this crate. Each one is
//! registered behind [`ExtractionEngine`] and selected at runtime through
//! the registry; nothing in the pipeline inspects concrete engine types.

pub mod adapter;
pub mod orchestrator;

use crate::error::Result;
use crate::schema::{EngineFamily, TableBlock, TokenSpan};
use async_trait::async_trait;
use std::sync::Arc;

/// Raw output of one engine invocation, before normalization. Engines fill
/// in whichever payloads their family produces; the adapter scores what is
/// actually present.
#[derive(Debug, Clone, Default)]
pub struct RawEngineOutput {
    pub text: String,
    pub tables: Vec<TableBlock>,
    pub tokens: Vec<TokenSpan>,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

/// Capability interface every extraction engine satisfies. Engines must be
/// pure functions of (document bytes, engine config) so the orchestrator can
/// run them concurrently with no shared state.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    fn name(&self) -> &str;

    fn family(&self) -> EngineFamily;

    /// May fail; the adapter converts failures into zero-confidence results
    /// instead of letting them escape the pipeline.
    async fn extract(&self, document: &[u8]) -> Result<RawEngineOutput>;
}

/// Runtime registry of configured engines.
#[derive(Default, Clone)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn ExtractionEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, engine: Arc<dyn ExtractionEngine>) {
        self.engines.push(engine);
    }

    pub fn engines(&self) -> &[Arc<dyn ExtractionEngine>] {
        &self.engines
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }
}
