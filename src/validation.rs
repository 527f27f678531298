//! Validation rules over one document's mapped line items.
//!
//! Every applicable rule always runs and every result is retained; a
//! critical failure never stops lower-severity rules from reporting. Only
//! the accounting equation and completeness checks gate the document
//! downstream (via the confidence aggregator); everything else is advisory.

use crate::chart_of_accounts::{codes, AccountSection, ChartOfAccounts};
use crate::config::ValidationConfig;
use crate::money::{format_cents, Cents};
use crate::schema::{flags, MappedLineItem, Severity, StatementType, ValidationResult};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

pub const RULE_ACCOUNTING_EQUATION: &str = "accounting_equation";
pub const RULE_SECTION_TOTALS: &str = "section_totals";
pub const RULE_COMPLETENESS: &str = "completeness";
pub const RULE_CONTRA_SIGN: &str = "contra_sign";
pub const RULE_DUPLICATES: &str = "duplicate_accounts";

pub struct ValidationEngine<'a> {
    chart: &'a ChartOfAccounts,
    config: &'a ValidationConfig,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(chart: &'a ChartOfAccounts, config: &'a ValidationConfig) -> Self {
        Self { chart, config }
    }

    pub fn validate(
        &self,
        items: &[MappedLineItem],
        statement_type: StatementType,
    ) -> Vec<ValidationResult> {
        let mut results = Vec::new();

        if statement_type == StatementType::BalanceSheet {
            results.push(self.accounting_equation(items));
            results.extend(self.section_totals(items));
            results.push(self.completeness(items));
        }
        results.push(self.contra_sign(items));
        results.push(self.duplicates(items));

        for result in &results {
            if !result.passed {
                debug!(
                    "rule {} failed ({}): {}",
                    result.rule, result.severity, result.message
                );
            }
        }

        results
    }

    /// |Assets - (Liabilities + Capital)| within tolerance. The hard gate:
    /// an explicit failure pins document confidence to zero.
    fn accounting_equation(&self, items: &[MappedLineItem]) -> ValidationResult {
        let tolerance = self.config.equation_tolerance_cents;
        let assets = amount_by_code(items, codes::TOTAL_ASSETS);
        let liabilities = amount_by_code(items, codes::TOTAL_LIABILITIES);
        let capital = amount_by_code(items, codes::TOTAL_CAPITAL);

        match (assets, liabilities, capital) {
            (Some(a), Some(l), Some(c)) => {
                let variance = (a - (l + c)).abs();
                let passed = variance <= tolerance;
                ValidationResult {
                    rule: RULE_ACCOUNTING_EQUATION.to_string(),
                    severity: Severity::Critical,
                    passed,
                    variance_cents: variance,
                    tolerance_cents: tolerance,
                    message: format!(
                        "assets {} vs liabilities {} + capital {} (variance {}, tolerance {})",
                        format_cents(a),
                        format_cents(l),
                        format_cents(c),
                        format_cents(variance),
                        format_cents(tolerance)
                    ),
                }
            }
            _ => ValidationResult {
                rule: RULE_ACCOUNTING_EQUATION.to_string(),
                severity: Severity::Critical,
                passed: true,
                variance_cents: 0,
                tolerance_cents: tolerance,
                message: "not evaluated: required totals missing (see completeness)".to_string(),
            },
        }
    }

    /// Detail items per section must sum to the extracted subtotal.
    fn section_totals(&self, items: &[MappedLineItem]) -> Vec<ValidationResult> {
        let tolerance = self.config.section_tolerance_cents;
        let sections = [
            AccountSection::Assets,
            AccountSection::Liabilities,
            AccountSection::Capital,
        ];

        let mut results = Vec::new();
        for section in sections {
            let Some(total_account) = self.chart.section_total(section) else {
                continue;
            };
            let Some(extracted) = amount_by_code(items, &total_account.code) else {
                continue;
            };

            let detail_sum: Cents = items
                .iter()
                .filter_map(|i| {
                    let code = i.canonical_code.as_deref()?;
                    let account = self.chart.by_code(code)?;
                    (account.section == section && !account.is_calculated)
                        .then_some(i.item.amount_cents)
                })
                .sum();

            let variance = (detail_sum - extracted).abs();
            results.push(ValidationResult {
                rule: format!("{}:{:?}", RULE_SECTION_TOTALS, section).to_lowercase(),
                severity: Severity::High,
                passed: variance <= tolerance,
                variance_cents: variance,
                tolerance_cents: tolerance,
                message: format!(
                    "detail sum {} vs extracted {} {}",
                    format_cents(detail_sum),
                    total_account.name,
                    format_cents(extracted)
                ),
            });
        }
        results
    }

    /// Required canonical codes must all be present; missing any pins the
    /// document to needs-review at confidence 20.
    fn completeness(&self, items: &[MappedLineItem]) -> ValidationResult {
        let present: BTreeSet<&str> = items
            .iter()
            .filter_map(|i| i.canonical_code.as_deref())
            .collect();
        let missing: Vec<&str> = self
            .config
            .required_balance_sheet_codes
            .iter()
            .map(|c| c.as_str())
            .filter(|c| !present.contains(c))
            .collect();

        ValidationResult {
            rule: RULE_COMPLETENESS.to_string(),
            severity: Severity::Critical,
            passed: missing.is_empty(),
            variance_cents: missing.len() as Cents,
            tolerance_cents: 0,
            message: if missing.is_empty() {
                "all required accounts present".to_string()
            } else {
                format!("missing required accounts: {}", missing.join(", "))
            },
        }
    }

    /// Contra accounts (accumulated depreciation/amortization) must be <= 0.
    fn contra_sign(&self, items: &[MappedLineItem]) -> ValidationResult {
        let mut violation_total: Cents = 0;
        let mut violators = Vec::new();
        for item in items {
            if !self.is_contra(item) {
                continue;
            }
            if item.item.amount_cents > 0 {
                violation_total += item.item.amount_cents;
                violators.push(item.item.account_name.clone());
            }
        }

        ValidationResult {
            rule: RULE_CONTRA_SIGN.to_string(),
            severity: Severity::Warning,
            passed: violators.is_empty(),
            variance_cents: violation_total,
            tolerance_cents: 0,
            message: if violators.is_empty() {
                "all contra accounts carry the expected sign".to_string()
            } else {
                format!("positive balance on contra accounts: {}", violators.join(", "))
            },
        }
    }

    /// No two mapped items may share a canonical code. Violations are
    /// flagged, never silently merged.
    fn duplicates(&self, items: &[MappedLineItem]) -> ValidationResult {
        let duplicated = duplicate_codes(items);
        ValidationResult {
            rule: RULE_DUPLICATES.to_string(),
            severity: Severity::High,
            passed: duplicated.is_empty(),
            variance_cents: duplicated.len() as Cents,
            tolerance_cents: 0,
            message: if duplicated.is_empty() {
                "no duplicate canonical accounts".to_string()
            } else {
                format!(
                    "duplicate canonical accounts: {}",
                    duplicated.into_iter().collect::<Vec<_>>().join(", ")
                )
            },
        }
    }

    fn is_contra(&self, item: &MappedLineItem) -> bool {
        if item.item.is_contra {
            return true;
        }
        item.canonical_code
            .as_deref()
            .and_then(|code| self.chart.by_code(code))
            .map(|account| account.is_contra())
            .unwrap_or(false)
    }
}

/// Canonical codes appearing on more than one mapped item.
pub fn duplicate_codes(items: &[MappedLineItem]) -> BTreeSet<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        if let Some(code) = item.canonical_code.as_deref() {
            *counts.entry(code).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(code, _)| code.to_string())
        .collect()
}

/// Applies per-item review flags implied by rule violations (duplicates,
/// contra sign). Called once after validation so flags and results agree.
pub fn apply_item_flags(items: &mut [MappedLineItem], chart: &ChartOfAccounts) {
    let duplicated = duplicate_codes(items);
    for item in items.iter_mut() {
        if let Some(code) = item.canonical_code.clone() {
            if duplicated.contains(&code) {
                item.flag(flags::DUPLICATE_ACCOUNT);
            }
        }
        let contra = item.item.is_contra
            || item
                .canonical_code
                .as_deref()
                .and_then(|code| chart.by_code(code))
                .map(|account| account.is_contra())
                .unwrap_or(false);
        if contra && item.item.amount_cents > 0 {
            item.flag(flags::CONTRA_SIGN_VIOLATION);
        }
    }
}

pub fn amount_by_code(items: &[MappedLineItem], code: &str) -> Option<Cents> {
    items
        .iter()
        .find(|i| i.canonical_code.as_deref() == Some(code))
        .map(|i| i.item.amount_cents)
}
