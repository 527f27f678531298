//! Per-field and document confidence scoring.
//!
//! Field scores blend mapping method, amount clarity, positional context,
//! and validation outcome; the document score blends field average,
//! validation pass rate, completeness, and the accounting equation. All
//! weights come from configuration so operators can retune without a
//! deploy. Two overrides are not tunable: an explicit accounting-equation
//! failure pins the document to 0, and a completeness failure pins it to 20.

use crate::chart_of_accounts::ChartOfAccounts;
use crate::config::{ConfidenceConfig, ValidationConfig};
use crate::schema::{
    flags, ConfidenceCategory, ConfidenceScore, DocumentStatus, MappedLineItem, StatementType,
    ValidationResult,
};
use crate::validation::{RULE_ACCOUNTING_EQUATION, RULE_COMPLETENESS};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

pub struct ConfidenceAggregator<'a> {
    chart: &'a ChartOfAccounts,
    config: &'a ConfidenceConfig,
    validation_config: &'a ValidationConfig,
}

impl<'a> ConfidenceAggregator<'a> {
    pub fn new(
        chart: &'a ChartOfAccounts,
        config: &'a ConfidenceConfig,
        validation_config: &'a ValidationConfig,
    ) -> Self {
        Self {
            chart,
            config,
            validation_config,
        }
    }

    pub fn score(
        &self,
        items: &[MappedLineItem],
        validations: &[ValidationResult],
        statement_type: StatementType,
    ) -> ConfidenceScore {
        let mut field_scores = BTreeMap::new();
        for item in items {
            let score = self.field_score(item, statement_type);
            let base = item
                .canonical_code
                .clone()
                .unwrap_or_else(|| item.item.account_name.clone());
            // Duplicate codes keep distinct entries rather than overwriting.
            let mut key = base.clone();
            let mut suffix = 2;
            while field_scores.contains_key(&key) {
                key = format!("{}#{}", base, suffix);
                suffix += 1;
            }
            field_scores.insert(key, score);
        }

        let field_average = if field_scores.is_empty() {
            0.0
        } else {
            field_scores.values().sum::<f64>() / field_scores.len() as f64
        };

        let pass_rate = if validations.is_empty() {
            1.0
        } else {
            validations.iter().filter(|v| v.passed).count() as f64 / validations.len() as f64
        };

        let completeness = self.completeness_fraction(items, statement_type);

        let equation_failed = validations
            .iter()
            .any(|v| v.rule == RULE_ACCOUNTING_EQUATION && !v.passed);
        let completeness_failed = validations
            .iter()
            .any(|v| v.rule == RULE_COMPLETENESS && !v.passed);
        let equation_component = if equation_failed { 0.0 } else { 1.0 };

        let mut document = self.config.field_average_weight * field_average
            + self.config.pass_rate_weight * pass_rate * 100.0
            + self.config.completeness_weight * completeness * 100.0
            + self.config.equation_weight * equation_component * 100.0;

        if equation_failed {
            debug!("accounting equation failed: document confidence pinned to 0");
            document = 0.0;
        } else if completeness_failed {
            debug!("completeness failed: document confidence pinned to 20");
            document = 20.0;
        }

        ConfidenceScore {
            field_scores,
            document,
            category: self.categorize(document),
        }
    }

    fn field_score(&self, item: &MappedLineItem, statement_type: StatementType) -> f64 {
        let mapping = item.confidence;

        let amount_clarity = if item.item.amount_penalty { 50.0 } else { 100.0 };

        let position = match item
            .canonical_code
            .as_deref()
            .and_then(|code| self.chart.by_code(code))
        {
            Some(account) => {
                if statement_type == StatementType::Unknown {
                    75.0
                } else if account.statement_type == statement_type {
                    100.0
                } else {
                    40.0
                }
            }
            None => 50.0,
        };

        let validation = if item.review_flags.contains(flags::DUPLICATE_ACCOUNT) {
            50.0
        } else if item.review_flags.contains(flags::CONTRA_SIGN_VIOLATION) {
            60.0
        } else {
            100.0
        };

        self.config.mapping_weight * mapping
            + self.config.amount_clarity_weight * amount_clarity
            + self.config.position_weight * position
            + self.config.validation_weight * validation
    }

    /// Fraction of required accounts present; 1.0 for statement types with
    /// no required set configured.
    fn completeness_fraction(&self, items: &[MappedLineItem], statement_type: StatementType) -> f64 {
        if statement_type != StatementType::BalanceSheet {
            return 1.0;
        }
        let required = &self.validation_config.required_balance_sheet_codes;
        if required.is_empty() {
            return 1.0;
        }
        let present: BTreeSet<&str> = items
            .iter()
            .filter_map(|i| i.canonical_code.as_deref())
            .collect();
        let found = required
            .iter()
            .filter(|c| present.contains(c.as_str()))
            .count();
        found as f64 / required.len() as f64
    }

    fn categorize(&self, document: f64) -> ConfidenceCategory {
        if document >= self.config.excellent_cutoff {
            ConfidenceCategory::Excellent
        } else if document >= self.config.good_cutoff {
            ConfidenceCategory::Good
        } else if document >= self.config.acceptable_cutoff {
            ConfidenceCategory::Acceptable
        } else if document >= self.config.needs_review_cutoff {
            ConfidenceCategory::NeedsReview
        } else {
            ConfidenceCategory::Poor
        }
    }
}

/// Disposition implied by the document category. `Poor` is the single point
/// in the pipeline where an attempt is rejected (for re-upload); the
/// captured data is still persisted.
pub fn status_for(category: ConfidenceCategory) -> DocumentStatus {
    match category {
        ConfidenceCategory::Excellent | ConfidenceCategory::Good => DocumentStatus::AutoApproved,
        ConfidenceCategory::Acceptable => DocumentStatus::AcceptedWithFlags,
        ConfidenceCategory::NeedsReview => DocumentStatus::NeedsReview,
        ConfidenceCategory::Poor => DocumentStatus::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::codes;
    use crate::schema::{AmountSign, LineItem, LineItemKind, MappingMethod, Severity};

    fn mapped(code: &str, cents: i64) -> MappedLineItem {
        MappedLineItem {
            item: LineItem {
                account_code: Some(code.to_string()),
                account_name: code.to_string(),
                amount_cents: cents,
                sign: AmountSign::Positive,
                kind: LineItemKind::Detail,
                location: None,
                is_contra: false,
                amount_penalty: false,
            },
            canonical_code: Some(code.to_string()),
            method: MappingMethod::ExactCode,
            confidence: 100.0,
            review_flags: BTreeSet::new(),
        }
    }

    fn passing_validation(rule: &str) -> ValidationResult {
        ValidationResult {
            rule: rule.to_string(),
            severity: Severity::Critical,
            passed: true,
            variance_cents: 0,
            tolerance_cents: 1,
            message: "ok".to_string(),
        }
    }

    fn full_sheet() -> Vec<MappedLineItem> {
        vec![
            mapped(codes::TOTAL_ASSETS, 1_500_000),
            mapped(codes::TOTAL_LIABILITIES, 400_000),
            mapped(codes::TOTAL_CAPITAL, 1_100_000),
        ]
    }

    #[test]
    fn test_clean_document_auto_approves() {
        let chart = ChartOfAccounts::property_management_default();
        let confidence_config = ConfidenceConfig::default();
        let validation_config = ValidationConfig::default();
        let aggregator =
            ConfidenceAggregator::new(&chart, &confidence_config, &validation_config);

        let validations = vec![
            passing_validation(RULE_ACCOUNTING_EQUATION),
            passing_validation(RULE_COMPLETENESS),
        ];
        let score = aggregator.score(&full_sheet(), &validations, StatementType::BalanceSheet);

        assert!(score.document >= 95.0, "got {}", score.document);
        assert_eq!(score.category, ConfidenceCategory::Excellent);
        assert_eq!(status_for(score.category), DocumentStatus::AutoApproved);
    }

    #[test]
    fn test_equation_failure_collapses_document_to_zero() {
        let chart = ChartOfAccounts::property_management_default();
        let confidence_config = ConfidenceConfig::default();
        let validation_config = ValidationConfig::default();
        let aggregator =
            ConfidenceAggregator::new(&chart, &confidence_config, &validation_config);

        let mut failed = passing_validation(RULE_ACCOUNTING_EQUATION);
        failed.passed = false;
        let score = aggregator.score(&full_sheet(), &[failed], StatementType::BalanceSheet);

        assert_eq!(score.document, 0.0);
        assert_eq!(score.category, ConfidenceCategory::Poor);
        assert_eq!(status_for(score.category), DocumentStatus::Rejected);
    }

    #[test]
    fn test_completeness_failure_pins_to_twenty() {
        let chart = ChartOfAccounts::property_management_default();
        let confidence_config = ConfidenceConfig::default();
        let validation_config = ValidationConfig::default();
        let aggregator =
            ConfidenceAggregator::new(&chart, &confidence_config, &validation_config);

        let mut failed = passing_validation(RULE_COMPLETENESS);
        failed.passed = false;
        let items = vec![mapped(codes::TOTAL_ASSETS, 100)];
        let score = aggregator.score(&items, &[failed], StatementType::BalanceSheet);

        assert_eq!(score.document, 20.0);
        assert_eq!(score.category, ConfidenceCategory::Poor);
    }

    #[test]
    fn test_field_scores_penalize_unclear_amounts() {
        let chart = ChartOfAccounts::property_management_default();
        let confidence_config = ConfidenceConfig::default();
        let validation_config = ValidationConfig::default();
        let aggregator =
            ConfidenceAggregator::new(&chart, &confidence_config, &validation_config);

        let clean = mapped("0105-0000", 100);
        let mut smudged = mapped("0305-0000", 100);
        smudged.item.amount_penalty = true;

        let score = aggregator.score(
            &[clean, smudged],
            &[],
            StatementType::BalanceSheet,
        );
        let clean_score = score.field_scores["0105-0000"];
        let smudged_score = score.field_scores["0305-0000"];
        assert!(smudged_score < clean_score);
    }

    #[test]
    fn test_unexpected_section_reduces_position_score() {
        let chart = ChartOfAccounts::property_management_default();
        let confidence_config = ConfidenceConfig::default();
        let validation_config = ValidationConfig::default();
        let aggregator =
            ConfidenceAggregator::new(&chart, &confidence_config, &validation_config);

        // Rental income mapped inside a balance sheet document.
        let misplaced = mapped(codes::RENTAL_INCOME, 100);
        let expected = mapped("0105-0000", 100);
        let score = aggregator.score(
            &[misplaced, expected],
            &[],
            StatementType::BalanceSheet,
        );
        assert!(score.field_scores[codes::RENTAL_INCOME] < score.field_scores["0105-0000"]);
    }

    #[test]
    fn test_duplicate_field_keys_not_overwritten() {
        let chart = ChartOfAccounts::property_management_default();
        let confidence_config = ConfidenceConfig::default();
        let validation_config = ValidationConfig::default();
        let aggregator =
            ConfidenceAggregator::new(&chart, &confidence_config, &validation_config);

        let items = vec![mapped("0105-0000", 100), mapped("0105-0000", 200)];
        let score = aggregator.score(&items, &[], StatementType::BalanceSheet);
        assert_eq!(score.field_scores.len(), 2);
    }
}
