//! Runs every registered engine against one document and selects a winner.
//!
//! Engines run concurrently; each gets the configured timeout and a timed-out
//! or failing engine is scored zero rather than blocking the others. All
//! scores are retained as the audit trail even when only the best output is
//! parsed downstream.

use crate::config::EngineConfig;
use crate::error::{PipelineError, Result};
use crate::schema::ExtractionResult;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{adapter, EngineRegistry};

/// Audit-trail entry for one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineScore {
    pub engine: String,
    /// Engine-local confidence, 0..1.
    pub confidence: f64,
    /// Reported 1-10 score: `1 + confidence * 9`.
    pub score: f64,
    pub failed: bool,
}

/// Outcome of running the full engine set against one document.
#[derive(Debug, Clone)]
pub struct ExtractionSelection {
    /// One entry per registered engine, in registration order.
    pub scores: Vec<EngineScore>,
    /// Usable results ordered best-first. Empty means manual extraction.
    pub ranked: Vec<ExtractionResult>,
    pub best_model: Option<String>,
    /// Best result scored under the configured floor; downstream parsing
    /// should fall back to the next-ranked text if the best yields nothing.
    pub low_confidence: bool,
}

pub async fn run_engines(
    registry: &EngineRegistry,
    document: &[u8],
    config: &EngineConfig,
) -> Result<ExtractionSelection> {
    if registry.is_empty() {
        return Err(PipelineError::NoEnginesRegistered);
    }

    let timeout = Duration::from_millis(config.timeout_ms);
    let invocations = registry.engines().iter().map(|engine| {
        let engine = engine.clone();
        async move {
            let outcome = match tokio::time::timeout(timeout, engine.extract(document)).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::EngineFailure {
                    engine: engine.name().to_string(),
                    reason: format!("timed out after {}ms", config.timeout_ms),
                }),
            };
            adapter::normalize(engine.name(), engine.family(), outcome, config)
        }
    });

    let results: Vec<ExtractionResult> = join_all(invocations).await;

    let scores: Vec<EngineScore> = results
        .iter()
        .map(|r| EngineScore {
            engine: r.engine.clone(),
            confidence: r.confidence,
            score: 1.0 + r.confidence * 9.0,
            failed: r.error.is_some(),
        })
        .collect();

    for score in &scores {
        debug!(
            "engine {} scored {:.2}/10 (failed: {})",
            score.engine, score.score, score.failed
        );
    }

    let mut ranked: Vec<ExtractionResult> =
        results.into_iter().filter(|r| r.is_usable()).collect();
    // Deterministic order: confidence descending, engine name as tiebreak.
    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.engine.cmp(&b.engine))
    });

    let best_model = ranked.first().map(|r| r.engine.clone());
    let low_confidence = ranked
        .first()
        .map(|r| 1.0 + r.confidence * 9.0 < config.low_confidence_floor)
        .unwrap_or(false);

    match &best_model {
        Some(engine) => info!(
            "selected engine {} of {} ({} usable)",
            engine,
            registry.len(),
            ranked.len()
        ),
        None => warn!("no engine produced usable output; manual extraction required"),
    }

    Ok(ExtractionSelection {
        scores,
        ranked,
        best_model,
        low_confidence,
    })
}
