//! Domain data model shared across pipeline stages.
//!
//! Everything downstream of the engine adapter speaks these types. Records
//! are immutable once produced; a re-extraction creates a new generation in
//! the store rather than mutating anything in place.

use crate::error::{PipelineError, Result};
use crate::money::Cents;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A reporting period, always a single calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(PipelineError::InvalidPeriod(format!("{}-{}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// Parses "YYYY-MM".
    pub fn parse(s: &str) -> Result<Self> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| PipelineError::InvalidPeriod(s.to_string()))?;
        let year: i32 = y
            .parse()
            .map_err(|_| PipelineError::InvalidPeriod(s.to_string()))?;
        let month: u32 = m
            .parse()
            .map_err(|_| PipelineError::InvalidPeriod(s.to_string()))?;
        Self::new(year, month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
    RentRoll,
    MortgageStatement,
    Unknown,
}

impl StatementType {
    /// The five statement types reconciliation draws from.
    pub const RECONCILED: [StatementType; 5] = [
        StatementType::BalanceSheet,
        StatementType::IncomeStatement,
        StatementType::CashFlow,
        StatementType::RentRoll,
        StatementType::MortgageStatement,
    ];
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BalanceSheet => write!(f, "balance_sheet"),
            Self::IncomeStatement => write!(f, "income_statement"),
            Self::CashFlow => write!(f, "cash_flow"),
            Self::RentRoll => write!(f, "rent_roll"),
            Self::MortgageStatement => write!(f, "mortgage_statement"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Extraction engine families, used to pick the confidence formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineFamily {
    /// Rule-based text extractors (plain PDF text layers).
    RuleBasedText,
    /// Extractors that also detect table structure.
    TableAware,
    /// Layout models emitting tokens with per-token confidence.
    LayoutModel,
    /// OCR emitting word-level confidence.
    OcrWordConfidence,
}

/// One recognized token with its engine-local confidence, 0..1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub text: String,
    pub confidence: f64,
}

/// A detected table: header row plus data rows of raw cell text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableBlock {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Normalized output of one engine run against one document. Immutable;
/// one per (document, engine) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub engine: String,
    pub family: EngineFamily,
    pub text: String,
    pub tables: Vec<TableBlock>,
    /// Engine-local confidence in [0, 1].
    pub confidence: f64,
    pub processing_time_ms: u64,
    pub page_count: u32,
    /// Set when the engine errored or timed out; such results never abort
    /// the pipeline, they are just excluded from selection.
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn failed(engine: &str, family: EngineFamily, reason: String) -> Self {
        Self {
            engine: engine.to_string(),
            family,
            text: String::new(),
            tables: Vec::new(),
            confidence: 0.0,
            processing_time_ms: 0,
            page_count: 0,
            error: Some(reason),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.error.is_none() && self.confidence > 0.0 && !self.text.trim().is_empty()
    }
}

/// How a negative amount was rendered in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSign {
    Positive,
    MinusNegative,
    ParenthesizedNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Detail,
    CalculatedTotal,
    SectionTotal,
    GrandTotal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub page: u32,
    pub line: u32,
}

/// One typed line item parsed from the chosen engine's text.
/// Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub account_code: Option<String>,
    pub account_name: String,
    pub amount_cents: Cents,
    pub sign: AmountSign,
    pub kind: LineItemKind,
    pub location: Option<SourceLocation>,
    pub is_contra: bool,
    /// Amount violated the formatting contract but was retained.
    pub amount_penalty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    ExactCode,
    FuzzyName,
    Keyword,
    Unmatched,
}

impl fmt::Display for MappingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactCode => write!(f, "exact_code"),
            Self::FuzzyName => write!(f, "fuzzy_name"),
            Self::Keyword => write!(f, "keyword"),
            Self::Unmatched => write!(f, "unmatched"),
        }
    }
}

/// A LineItem resolved against the chart of accounts. Every LineItem
/// produces exactly one of these, unmatched included; data is never
/// dropped at this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedLineItem {
    pub item: LineItem,
    pub canonical_code: Option<String>,
    pub method: MappingMethod,
    /// Mapping confidence, 0..100.
    pub confidence: f64,
    pub review_flags: BTreeSet<String>,
}

impl MappedLineItem {
    pub fn flag(&mut self, name: &str) {
        self.review_flags.insert(name.to_string());
    }

    pub fn is_unmatched(&self) -> bool {
        self.method == MappingMethod::Unmatched
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Outcome of one validation rule. All rules always run; failures of any
/// severity never stop the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule: String,
    pub severity: Severity,
    pub passed: bool,
    pub variance_cents: Cents,
    pub tolerance_cents: Cents,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceCategory {
    Excellent,
    Good,
    Acceptable,
    NeedsReview,
    Poor,
}

impl fmt::Display for ConfidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Acceptable => write!(f, "acceptable"),
            Self::NeedsReview => write!(f, "needs_review"),
            Self::Poor => write!(f, "poor"),
        }
    }
}

/// Per-field and document-level confidence. Field keys are canonical
/// account codes where mapped, otherwise the raw account name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub field_scores: BTreeMap<String, f64>,
    pub document: f64,
    pub category: ConfidenceCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    Filename,
    Content,
    Unclassified,
}

/// Result of the tiered document classifier. A document is never rejected
/// here; the worst case is `Unknown` plus warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentClassification {
    pub statement_type: StatementType,
    pub method: ClassificationMethod,
    pub period: Option<Period>,
    pub period_method: Option<ClassificationMethod>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    AutoApproved,
    AcceptedWithFlags,
    NeedsReview,
    /// Document confidence below the floor: the attempt is returned for
    /// re-upload. The extracted data is still persisted for audit.
    Rejected,
    /// No engine produced usable text.
    ManualExtractionRequired,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApproved => write!(f, "auto_approved"),
            Self::AcceptedWithFlags => write!(f, "accepted_with_flags"),
            Self::NeedsReview => write!(f, "needs_review"),
            Self::Rejected => write!(f, "rejected"),
            Self::ManualExtractionRequired => write!(f, "manual_extraction_required"),
        }
    }
}

/// Review-flag vocabulary shared across stages.
pub mod flags {
    pub const UNMATCHED_ACCOUNT: &str = "unmatched_account";
    pub const KEYWORD_MATCH: &str = "keyword_match";
    pub const LOW_CONFIDENCE: &str = "low_confidence";
    pub const AMOUNT_PARSE_PENALTY: &str = "amount_parse_penalty";
    pub const CLASSIFIED_BY_CONTENT: &str = "classified_by_content";
    pub const UNKNOWN_DOCUMENT_TYPE: &str = "unknown_document_type";
    pub const PERIOD_DEFAULTED: &str = "period_defaulted";
    pub const PERIOD_UNKNOWN: &str = "period_unknown";
    pub const PERIOD_MISMATCH: &str = "period_mismatch";
    pub const DUPLICATE_ACCOUNT: &str = "duplicate_account";
    pub const CONTRA_SIGN_VIOLATION: &str = "contra_sign_violation";
    pub const MANUAL_EXTRACTION_REQUIRED: &str = "manual_extraction_required";
    pub const ENGINE_FALLBACK_USED: &str = "engine_fallback_used";
    pub const UNEXPECTED_SECTION: &str = "unexpected_section";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse_and_display() {
        let period = Period::parse("2024-03").unwrap();
        assert_eq!(period, Period { year: 2024, month: 3 });
        assert_eq!(period.to_string(), "2024-03");

        assert!(Period::parse("2024-13").is_err());
        assert!(Period::parse("March 2024").is_err());
    }

    #[test]
    fn test_extraction_result_usable() {
        let ok = ExtractionResult {
            engine: "pdf_text".to_string(),
            family: EngineFamily::RuleBasedText,
            text: "Cash  100.00".to_string(),
            tables: vec![],
            confidence: 0.8,
            processing_time_ms: 12,
            page_count: 1,
            error: None,
        };
        assert!(ok.is_usable());

        let failed = ExtractionResult::failed(
            "ocr",
            EngineFamily::OcrWordConfidence,
            "timeout".to_string(),
        );
        assert!(!failed.is_usable());
        assert_eq!(failed.confidence, 0.0);
    }

    #[test]
    fn test_serde_round_trip() {
        let item = MappedLineItem {
            item: LineItem {
                account_code: Some("0305-0000".to_string()),
                account_name: "A/R Tenants".to_string(),
                amount_cents: 21_036_506,
                sign: AmountSign::Positive,
                kind: LineItemKind::Detail,
                location: Some(SourceLocation { page: 1, line: 4 }),
                is_contra: false,
                amount_penalty: false,
            },
            canonical_code: Some("0305-0000".to_string()),
            method: MappingMethod::ExactCode,
            confidence: 100.0,
            review_flags: BTreeSet::new(),
        };

        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("exact_code"));
        let back: MappedLineItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
