//! End-to-end pipeline: extract, classify, parse, map, validate, score,
//! persist, reconcile.
//!
//! Component-local failures never escape their stage; they are converted
//! into flags, unmatched items, or failed validation results so every run
//! completes with an explainable record. The only caller-actionable
//! failure is a rejected attempt (document confidence below the floor),
//! and even then the extracted data is persisted for audit.

use crate::chart_of_accounts::ChartOfAccounts;
use crate::classifier::DocumentClassifier;
use crate::config::PipelineConfig;
use crate::confidence::{status_for, ConfidenceAggregator};
use crate::engine::orchestrator::{run_engines, ExtractionSelection};
use crate::engine::EngineRegistry;
use crate::error::{PipelineError, Result};
use crate::mapper::AccountMapper;
use crate::money::format_cents;
use crate::parser::LineItemParser;
use crate::reconcile::{ReconciliationEngine, ReconciliationRecord, StatementInputs};
use crate::schema::{
    flags, ConfidenceCategory, ConfidenceScore, DocumentStatus, LineItem, MappedLineItem, Period,
    StatementType,
};
use crate::store::{StatementKey, StatementRecord, StatementStore};
use crate::validation::{apply_item_flags, ValidationEngine};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One document submitted for extraction.
#[derive(Debug, Clone)]
pub struct DocumentRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub property: String,
    /// Caller-known reporting period. When absent the classifier's
    /// detected period is used; when both are present and disagree the
    /// caller wins and the document is flagged.
    pub period: Option<Period>,
}

/// Everything one pipeline run produced, already persisted.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub record: StatementRecord,
    pub generation: u32,
    /// Items with no chart match, retained per the zero-loss guarantee.
    pub unmatched: Vec<MappedLineItem>,
}

impl DocumentOutcome {
    pub fn is_rejected(&self) -> bool {
        self.record.status == DocumentStatus::Rejected
    }

    /// Specific reasons behind a rejection or review flag: which rule
    /// failed, by how much, against what tolerance. Never opaque.
    pub fn failure_reasons(&self) -> Vec<String> {
        self.record
            .validations
            .iter()
            .filter(|v| !v.passed)
            .map(|v| {
                format!(
                    "{} ({}): variance {} against tolerance {} - {}",
                    v.rule,
                    v.severity,
                    format_cents(v.variance_cents),
                    format_cents(v.tolerance_cents),
                    v.message
                )
            })
            .collect()
    }
}

pub struct ExtractionPipeline {
    registry: EngineRegistry,
    chart: ChartOfAccounts,
    config: PipelineConfig,
    store: Arc<dyn StatementStore>,
    classifier: DocumentClassifier,
    parser: LineItemParser,
}

impl ExtractionPipeline {
    pub fn new(
        registry: EngineRegistry,
        chart: ChartOfAccounts,
        config: PipelineConfig,
        store: Arc<dyn StatementStore>,
    ) -> Self {
        Self {
            registry,
            chart,
            config,
            store,
            classifier: DocumentClassifier::new(),
            parser: LineItemParser::new(),
        }
    }

    /// Runs the full pipeline for one document and persists the result as a
    /// new generation. Always returns a record; `DocumentStatus` carries
    /// the disposition.
    pub async fn process_document(&self, request: DocumentRequest) -> Result<DocumentOutcome> {
        info!(
            "processing '{}' for property {} ({} bytes)",
            request.file_name,
            request.property,
            request.bytes.len()
        );

        let selection =
            run_engines(&self.registry, &request.bytes, &self.config.engines).await?;

        let best_text = selection
            .ranked
            .first()
            .map(|r| r.text.as_str())
            .unwrap_or("");
        let classification = self.classifier.classify(&request.file_name, best_text);

        let mut review_flags: BTreeSet<String> =
            classification.warnings.iter().cloned().collect();

        let period = match (request.period, classification.period) {
            (Some(requested), Some(detected)) => {
                if requested != detected {
                    warn!(
                        "caller period {} disagrees with detected {}",
                        requested, detected
                    );
                    review_flags.insert(flags::PERIOD_MISMATCH.to_string());
                }
                requested
            }
            (Some(requested), None) => requested,
            (None, Some(detected)) => detected,
            (None, None) => {
                return Err(PipelineError::InvalidPeriod(
                    "no period supplied and none detected".to_string(),
                ))
            }
        };

        let key = StatementKey {
            property: request.property.clone(),
            period,
            statement_type: classification.statement_type,
        };

        if selection.ranked.is_empty() {
            return self.persist_manual_extraction(key, classification, selection, review_flags);
        }

        let (items, fallback_used) = self.parse_with_fallback(&selection);
        if fallback_used {
            review_flags.insert(flags::ENGINE_FALLBACK_USED.to_string());
        }
        if items.is_empty() && selection.low_confidence {
            return self.persist_manual_extraction(key, classification, selection, review_flags);
        }

        let mapper = AccountMapper::new(&self.chart, &self.config.mapping);
        let mut mapped = mapper.map_items(items, classification.statement_type);
        apply_item_flags(&mut mapped, &self.chart);

        let validation_engine = ValidationEngine::new(&self.chart, &self.config.validation);
        let validations = validation_engine.validate(&mapped, classification.statement_type);

        let aggregator = ConfidenceAggregator::new(
            &self.chart,
            &self.config.confidence,
            &self.config.validation,
        );
        let confidence = aggregator.score(&mapped, &validations, classification.statement_type);
        let status = status_for(confidence.category);

        self.apply_confidence_flags(&mut mapped, &confidence, &mut review_flags);

        let unmatched: Vec<MappedLineItem> = mapped
            .iter()
            .filter(|i| i.is_unmatched())
            .cloned()
            .collect();

        let record = StatementRecord {
            key: key.clone(),
            classification,
            best_engine: selection.best_model.clone(),
            engine_scores: selection.scores,
            items: mapped,
            validations,
            confidence,
            review_flags,
            status,
        };

        let generation = self.store.upsert_statement(record.clone())?;
        info!(
            "persisted {} {} {} generation {} with status {}",
            key.property, key.period, key.statement_type, generation, status
        );

        // A successful (non-rejected) extraction of a known statement type
        // refreshes the derived reconciliation record.
        if contributes_to_reconciliation(&record) {
            self.reconcile(&key.property, key.period)?;
        }

        Ok(DocumentOutcome {
            record,
            generation,
            unmatched,
        })
    }

    /// Rebuilds and atomically replaces the reconciliation record for one
    /// property/period from the current generation of every statement.
    pub fn reconcile(&self, property: &str, period: Period) -> Result<ReconciliationRecord> {
        let records = self.store.statements_for(property, period);
        let contributing: Vec<&StatementRecord> = records
            .iter()
            .filter(|r| contributes_to_reconciliation(r))
            .collect();

        let mut inputs = StatementInputs::new();
        for record in &contributing {
            inputs.insert(record.key.statement_type, &record.items);
        }

        let engine =
            ReconciliationEngine::new(&self.config.tie_outs, &self.config.covenants);
        let record = engine.reconcile(property, period, &inputs);
        self.store.save_reconciliation(record.clone())?;
        Ok(record)
    }

    /// The currently persisted reconciliation record, if any.
    pub fn reconciliation(&self, property: &str, period: Period) -> Option<ReconciliationRecord> {
        self.store.reconciliation(property, period)
    }

    pub fn store(&self) -> &Arc<dyn StatementStore> {
        &self.store
    }

    /// Parses the best-ranked text; under the low-confidence floor, retries
    /// with the next-best engine's text before giving up.
    fn parse_with_fallback(&self, selection: &ExtractionSelection) -> (Vec<LineItem>, bool) {
        let mut fallback_used = false;
        for (index, result) in selection.ranked.iter().enumerate() {
            let items = self.parser.parse(&result.text);
            if !items.is_empty() {
                if index > 0 {
                    debug!("fell back to engine {}", result.engine);
                    fallback_used = true;
                }
                return (items, fallback_used);
            }
            if !selection.low_confidence {
                // Confident text that parses to nothing is a content
                // problem, not an engine problem; retrying other engines
                // would just reparse worse text.
                break;
            }
        }
        (Vec::new(), fallback_used)
    }

    fn apply_confidence_flags(
        &self,
        items: &mut [MappedLineItem],
        confidence: &ConfidenceScore,
        review_flags: &mut BTreeSet<String>,
    ) {
        match confidence.category {
            ConfidenceCategory::Acceptable => {
                // Flag only the weak items, not the whole document.
                let cutoff = self.config.confidence.acceptable_cutoff;
                for item in items.iter_mut() {
                    if item.confidence < cutoff {
                        item.flag(flags::LOW_CONFIDENCE);
                    }
                }
            }
            ConfidenceCategory::NeedsReview | ConfidenceCategory::Poor => {
                review_flags.insert(flags::LOW_CONFIDENCE.to_string());
            }
            _ => {}
        }
    }

    fn persist_manual_extraction(
        &self,
        key: StatementKey,
        classification: crate::schema::DocumentClassification,
        selection: ExtractionSelection,
        mut review_flags: BTreeSet<String>,
    ) -> Result<DocumentOutcome> {
        warn!(
            "no usable extraction for {} {} {}; manual extraction required",
            key.property, key.period, key.statement_type
        );
        review_flags.insert(flags::MANUAL_EXTRACTION_REQUIRED.to_string());

        let record = StatementRecord {
            key,
            classification,
            best_engine: selection.best_model.clone(),
            engine_scores: selection.scores,
            items: Vec::new(),
            validations: Vec::new(),
            confidence: ConfidenceScore {
                field_scores: BTreeMap::new(),
                document: 0.0,
                category: ConfidenceCategory::Poor,
            },
            review_flags,
            status: DocumentStatus::ManualExtractionRequired,
        };

        let generation = self.store.upsert_statement(record.clone())?;
        Ok(DocumentOutcome {
            record,
            generation,
            unmatched: Vec::new(),
        })
    }
}

/// Rejected and manual-extraction records are persisted for audit but do
/// not feed derived reconciliation state; neither do unclassified ones.
fn contributes_to_reconciliation(record: &StatementRecord) -> bool {
    record.key.statement_type != StatementType::Unknown
        && !matches!(
            record.status,
            DocumentStatus::Rejected | DocumentStatus::ManualExtractionRequired
        )
}
