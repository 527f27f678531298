//! Tunable business thresholds and weights.
//!
//! Every materiality tolerance, confidence weight, and covenant band in the
//! pipeline lives here, loaded once and passed explicitly into each
//! component. Defaults mirror the platform's standard operating values;
//! none of them is hard-coded at a call site.

use crate::money::Cents;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub engines: EngineConfig,
    pub mapping: MappingConfig,
    pub validation: ValidationConfig,
    pub confidence: ConfidenceConfig,
    pub tie_outs: TieOutThresholds,
    pub covenants: CovenantThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-engine wall-clock budget; a slower engine is treated as failed.
    pub timeout_ms: u64,
    /// 1-10 score under which the orchestrator tries the next-best engine.
    pub low_confidence_floor: f64,
    /// Expected character density used for page-coverage scoring.
    pub expected_chars_per_page: f64,
    /// Minimum extracted characters for a usable result.
    pub min_chars: usize,
    /// Column count a well-formed statement table should have.
    pub expected_table_columns: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            low_confidence_floor: 4.0,
            expected_chars_per_page: 1000.0,
            min_chars: 50,
            expected_table_columns: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Name-similarity acceptance threshold, 0..100.
    pub fuzzy_accept: f64,
    /// Keyword-match confidence band, 0..100.
    pub keyword_floor: f64,
    pub keyword_ceiling: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            fuzzy_accept: 85.0,
            keyword_floor: 60.0,
            keyword_ceiling: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// |Assets - (Liabilities + Capital)| tolerance.
    pub equation_tolerance_cents: Cents,
    /// |sum(details) - extracted subtotal| tolerance per section.
    pub section_tolerance_cents: Cents,
    /// Canonical codes that must be present on a balance sheet.
    pub required_balance_sheet_codes: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            equation_tolerance_cents: 1,
            section_tolerance_cents: 1,
            required_balance_sheet_codes: vec![
                "1999-0000".to_string(),
                "2999-0000".to_string(),
                "3999-0000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Per-field blend weights; must sum to 1.0.
    pub mapping_weight: f64,
    pub amount_clarity_weight: f64,
    pub position_weight: f64,
    pub validation_weight: f64,

    /// Document blend weights; must sum to 1.0.
    pub field_average_weight: f64,
    pub pass_rate_weight: f64,
    pub completeness_weight: f64,
    pub equation_weight: f64,

    /// Category cutoffs, 0..100.
    pub excellent_cutoff: f64,
    pub good_cutoff: f64,
    pub acceptable_cutoff: f64,
    pub needs_review_cutoff: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            mapping_weight: 0.5,
            amount_clarity_weight: 0.2,
            position_weight: 0.15,
            validation_weight: 0.15,
            field_average_weight: 0.4,
            pass_rate_weight: 0.3,
            completeness_weight: 0.2,
            equation_weight: 0.1,
            excellent_cutoff: 95.0,
            good_cutoff: 90.0,
            acceptable_cutoff: 80.0,
            needs_review_cutoff: 70.0,
        }
    }
}

/// A (pass, warning) variance band in cents. Inclusive at both boundaries:
/// a variance exactly equal to `pass_cents` still passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub pass_cents: Cents,
    pub warning_cents: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TieOutThresholds {
    pub principal_vs_long_term_debt: ThresholdPair,
    pub payment_vs_debt_service: ThresholdPair,
    pub ending_cash: ThresholdPair,
    pub balance_sheet_equation: ThresholdPair,
    pub cash_flow_consistency: ThresholdPair,
    pub rent_roll_vs_rental_income: ThresholdPair,
    pub interest_vs_interest_expense: ThresholdPair,
}

impl Default for TieOutThresholds {
    fn default() -> Self {
        Self {
            principal_vs_long_term_debt: ThresholdPair {
                pass_cents: 10_000,
                warning_cents: 100_000,
            },
            payment_vs_debt_service: ThresholdPair {
                pass_cents: 1_000,
                warning_cents: 10_000,
            },
            ending_cash: ThresholdPair {
                pass_cents: 1_000,
                warning_cents: 10_000,
            },
            balance_sheet_equation: ThresholdPair {
                pass_cents: 100,
                warning_cents: 10_000,
            },
            cash_flow_consistency: ThresholdPair {
                pass_cents: 100,
                warning_cents: 10_000,
            },
            rent_roll_vs_rental_income: ThresholdPair {
                pass_cents: 100_000,
                warning_cents: 1_000_000,
            },
            interest_vs_interest_expense: ThresholdPair {
                pass_cents: 10_000,
                warning_cents: 100_000,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CovenantThresholds {
    pub dscr_pass: f64,
    pub dscr_warning: f64,
    pub occupancy_pass: f64,
    pub occupancy_warning: f64,
}

impl Default for CovenantThresholds {
    fn default() -> Self {
        Self {
            dscr_pass: 1.25,
            dscr_warning: 1.0,
            occupancy_pass: 0.80,
            occupancy_warning: 0.70,
        }
    }
}
