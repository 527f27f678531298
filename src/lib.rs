//! # Financial Statement Pipeline
//!
//! A library for turning extracted financial statements (balance sheets,
//! income statements, cash-flow statements, rent rolls, mortgage
//! statements) into structured, validated, cross-document-consistent
//! records for a property-management platform.
//!
//! ## Core Concepts
//!
//! - **Engines**: independent, imperfect extraction methods behind one
//!   capability trait; every result carries an engine-local confidence.
//! - **Zero loss**: every parsed line item is retained, matched or not.
//!   Unmatched items land in an unmatched collection instead of being
//!   dropped; document rejection only ever returns an attempt for
//!   re-upload, never discards captured data.
//! - **Accounting integrity**: Assets = Liabilities + Capital enforced
//!   with tunable tolerances; a violation collapses document confidence.
//! - **Tie-outs**: cross-statement consistency checks per property/period,
//!   feeding covenant metrics (DSCR, LTV, occupancy) and an audit opinion.
//! - **Generations**: re-extraction appends and supersedes; nothing is
//!   mutated in place or hard-deleted.
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_statement_pipeline::*;
//! use std::sync::Arc;
//!
//! let mut registry = EngineRegistry::new();
//! registry.register(Arc::new(my_pdf_engine));
//!
//! let pipeline = ExtractionPipeline::new(
//!     registry,
//!     ChartOfAccounts::property_management_default(),
//!     PipelineConfig::default(),
//!     Arc::new(InMemoryStore::new()),
//! );
//!
//! let outcome = pipeline
//!     .process_document(DocumentRequest {
//!         file_name: "balance_sheet_2024-03.pdf".to_string(),
//!         bytes: document_bytes,
//!         property: "oakwood".to_string(),
//!         period: None,
//!     })
//!     .await?;
//!
//! let reconciliation = pipeline.reconcile("oakwood", outcome.record.key.period)?;
//! ```

pub mod chart_of_accounts;
pub mod classifier;
pub mod config;
pub mod confidence;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod money;
pub mod parser;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod utils;
pub mod validation;

pub use chart_of_accounts::{
    codes, AccountSection, CanonicalAccount, ChartOfAccounts, ExpectedSign,
};
pub use classifier::DocumentClassifier;
pub use config::{
    ConfidenceConfig, CovenantThresholds, EngineConfig, MappingConfig, PipelineConfig,
    ThresholdPair, TieOutThresholds, ValidationConfig,
};
pub use confidence::{status_for, ConfidenceAggregator};
pub use engine::orchestrator::{run_engines, EngineScore, ExtractionSelection};
pub use engine::{EngineRegistry, ExtractionEngine, RawEngineOutput};
pub use error::{PipelineError, Result};
pub use mapper::{unmatched_items, AccountMapper};
pub use money::{format_cents, parse_amount, Cents, ParsedAmount};
pub use parser::LineItemParser;
pub use pipeline::{DocumentOutcome, DocumentRequest, ExtractionPipeline};
pub use reconcile::{
    AuditOpinion, CovenantMetrics, MetricStatus, ReconciledFields, ReconciliationEngine,
    ReconciliationRecord, StatementInputs, TieOut, TieOutStatus,
};
pub use schema::{
    flags, AmountSign, ClassificationMethod, ConfidenceCategory, ConfidenceScore,
    DocumentClassification, DocumentStatus, EngineFamily, ExtractionResult, LineItem,
    LineItemKind, MappedLineItem, MappingMethod, Period, Severity, SourceLocation,
    StatementType, TableBlock, TokenSpan, ValidationResult,
};
pub use store::{Generation, InMemoryStore, StatementKey, StatementRecord, StatementStore};
pub use validation::{apply_item_flags, duplicate_codes, ValidationEngine};
