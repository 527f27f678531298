//! Persistence seam.
//!
//! The real platform persists through its own database layer; the pipeline
//! only depends on this trait. Semantics are append-then-supersede: an
//! upsert appends a new generation and repoints "current"; prior
//! generations stay readable and nothing is ever hard-deleted, so the full
//! audit lineage (engine used, mapping method, confidence, timestamps)
//! survives corrections.

use crate::engine::orchestrator::EngineScore;
use crate::error::{PipelineError, Result};
use crate::reconcile::ReconciliationRecord;
use crate::schema::{
    ConfidenceScore, DocumentClassification, DocumentStatus, MappedLineItem, Period,
    StatementType, ValidationResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementKey {
    pub property: String,
    pub period: Period,
    pub statement_type: StatementType,
}

/// Everything one extraction attempt produced for one statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementRecord {
    pub key: StatementKey,
    pub classification: DocumentClassification,
    pub best_engine: Option<String>,
    pub engine_scores: Vec<EngineScore>,
    pub items: Vec<MappedLineItem>,
    pub validations: Vec<ValidationResult>,
    pub confidence: ConfidenceScore,
    pub review_flags: BTreeSet<String>,
    pub status: DocumentStatus,
}

/// One stored generation of a statement. The latest generation is current;
/// earlier ones are superseded but retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub number: u32,
    pub saved_at: DateTime<Utc>,
    pub superseded: bool,
    pub record: StatementRecord,
}

pub trait StatementStore: Send + Sync {
    /// Appends a new generation for the record's key and repoints current.
    /// Returns the new generation number.
    fn upsert_statement(&self, record: StatementRecord) -> Result<u32>;

    fn current(&self, key: &StatementKey) -> Option<StatementRecord>;

    fn history(&self, key: &StatementKey) -> Vec<Generation>;

    /// Current records of every statement type for one property/period.
    fn statements_for(&self, property: &str, period: Period) -> Vec<StatementRecord>;

    /// Replaces the reconciliation record for its property/period whole.
    fn save_reconciliation(&self, record: ReconciliationRecord) -> Result<()>;

    fn reconciliation(&self, property: &str, period: Period) -> Option<ReconciliationRecord>;
}

/// Reference store used in tests and small deployments.
#[derive(Default)]
pub struct InMemoryStore {
    statements: RwLock<HashMap<StatementKey, Vec<Generation>>>,
    reconciliations: RwLock<HashMap<(String, Period), ReconciliationRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatementStore for InMemoryStore {
    fn upsert_statement(&self, record: StatementRecord) -> Result<u32> {
        let mut statements = self
            .statements
            .write()
            .map_err(|_| PipelineError::StoreError("statement lock poisoned".to_string()))?;
        let generations = statements.entry(record.key.clone()).or_default();
        for generation in generations.iter_mut() {
            generation.superseded = true;
        }
        let number = generations.len() as u32 + 1;
        generations.push(Generation {
            number,
            saved_at: Utc::now(),
            superseded: false,
            record,
        });
        Ok(number)
    }

    fn current(&self, key: &StatementKey) -> Option<StatementRecord> {
        let statements = self.statements.read().ok()?;
        statements
            .get(key)
            .and_then(|generations| generations.last())
            .map(|generation| generation.record.clone())
    }

    fn history(&self, key: &StatementKey) -> Vec<Generation> {
        self.statements
            .read()
            .ok()
            .and_then(|statements| statements.get(key).cloned())
            .unwrap_or_default()
    }

    fn statements_for(&self, property: &str, period: Period) -> Vec<StatementRecord> {
        let statements = match self.statements.read() {
            Ok(statements) => statements,
            Err(_) => return Vec::new(),
        };
        let mut records: Vec<StatementRecord> = statements
            .iter()
            .filter(|(key, _)| key.property == property && key.period == period)
            .filter_map(|(_, generations)| generations.last())
            .map(|generation| generation.record.clone())
            .collect();
        records.sort_by_key(|r| r.key.statement_type);
        records
    }

    fn save_reconciliation(&self, record: ReconciliationRecord) -> Result<()> {
        let mut reconciliations = self
            .reconciliations
            .write()
            .map_err(|_| PipelineError::StoreError("reconciliation lock poisoned".to_string()))?;
        reconciliations.insert((record.property.clone(), record.period), record);
        Ok(())
    }

    fn reconciliation(&self, property: &str, period: Period) -> Option<ReconciliationRecord> {
        let reconciliations = self.reconciliations.read().ok()?;
        reconciliations.get(&(property.to_string(), period)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ClassificationMethod, ConfidenceCategory};
    use std::collections::BTreeMap;

    fn record(property: &str, generation_marker: f64) -> StatementRecord {
        StatementRecord {
            key: StatementKey {
                property: property.to_string(),
                period: Period { year: 2024, month: 3 },
                statement_type: StatementType::BalanceSheet,
            },
            classification: DocumentClassification {
                statement_type: StatementType::BalanceSheet,
                method: ClassificationMethod::Filename,
                period: Some(Period { year: 2024, month: 3 }),
                period_method: Some(ClassificationMethod::Filename),
                warnings: Vec::new(),
            },
            best_engine: Some("pdf_text".to_string()),
            engine_scores: Vec::new(),
            items: Vec::new(),
            validations: Vec::new(),
            confidence: ConfidenceScore {
                field_scores: BTreeMap::new(),
                document: generation_marker,
                category: ConfidenceCategory::Good,
            },
            review_flags: BTreeSet::new(),
            status: DocumentStatus::AutoApproved,
        }
    }

    #[test]
    fn test_upsert_supersedes_without_deleting() {
        let store = InMemoryStore::new();
        let first = record("prop-1", 90.0);
        let key = first.key.clone();

        assert_eq!(store.upsert_statement(first).unwrap(), 1);
        assert_eq!(store.upsert_statement(record("prop-1", 95.0)).unwrap(), 2);

        let history = store.history(&key);
        assert_eq!(history.len(), 2);
        assert!(history[0].superseded);
        assert!(!history[1].superseded);

        let current = store.current(&key).unwrap();
        assert_eq!(current.confidence.document, 95.0);
    }

    #[test]
    fn test_statements_for_filters_by_property_and_period() {
        let store = InMemoryStore::new();
        store.upsert_statement(record("prop-1", 90.0)).unwrap();
        store.upsert_statement(record("prop-2", 80.0)).unwrap();

        let records = store.statements_for("prop-1", Period { year: 2024, month: 3 });
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key.property, "prop-1");

        let none = store.statements_for("prop-1", Period { year: 2024, month: 4 });
        assert!(none.is_empty());
    }
}
