//! Maps parsed line items onto the canonical chart of accounts.
//!
//! Strategies run in a fixed order and the first success wins: exact code,
//! fuzzy name, keyword tokens, unmatched. The unmatched tier is a real
//! result, not an error: every LineItem produces exactly one
//! MappedLineItem, and unmatched items are retained and surfaced. That
//! zero-loss guarantee is the point of this module; do not relax it.

use crate::chart_of_accounts::{CanonicalAccount, ChartOfAccounts};
use crate::config::MappingConfig;
use crate::schema::{flags, LineItem, MappedLineItem, MappingMethod, StatementType};
use log::debug;
use similar::TextDiff;
use std::collections::BTreeSet;

pub struct AccountMapper<'a> {
    chart: &'a ChartOfAccounts,
    config: &'a MappingConfig,
}

impl<'a> AccountMapper<'a> {
    pub fn new(chart: &'a ChartOfAccounts, config: &'a MappingConfig) -> Self {
        Self { chart, config }
    }

    pub fn map_items(
        &self,
        items: Vec<LineItem>,
        statement_type: StatementType,
    ) -> Vec<MappedLineItem> {
        items
            .into_iter()
            .map(|item| self.map_item(item, statement_type))
            .collect()
    }

    pub fn map_item(&self, item: LineItem, statement_type: StatementType) -> MappedLineItem {
        let mut review_flags = BTreeSet::new();
        if item.amount_penalty {
            review_flags.insert(flags::AMOUNT_PARSE_PENALTY.to_string());
        }

        // 1. Exact code.
        if let Some(code) = item.account_code.as_deref() {
            if let Some(account) = self.chart.by_code(code) {
                return MappedLineItem {
                    canonical_code: Some(account.code.clone()),
                    method: MappingMethod::ExactCode,
                    confidence: 100.0,
                    review_flags,
                    item,
                };
            }
        }

        // 2. Fuzzy name similarity against accounts of the same statement type.
        if let Some((account, similarity)) = self.best_fuzzy(&item.account_name, statement_type) {
            if similarity >= self.config.fuzzy_accept {
                debug!(
                    "fuzzy-mapped '{}' to {} at {:.0}",
                    item.account_name, account.code, similarity
                );
                return MappedLineItem {
                    canonical_code: Some(account.code.clone()),
                    method: MappingMethod::FuzzyName,
                    confidence: similarity,
                    review_flags,
                    item,
                };
            }
        }

        // 3. Keyword tokens, flagged for review.
        if let Some((account, coverage)) = self.best_keyword(&item.account_name, statement_type) {
            review_flags.insert(flags::KEYWORD_MATCH.to_string());
            let span = self.config.keyword_ceiling - self.config.keyword_floor;
            let confidence = self.config.keyword_floor + span * coverage;
            return MappedLineItem {
                canonical_code: Some(account.code.clone()),
                method: MappingMethod::Keyword,
                confidence,
                review_flags,
                item,
            };
        }

        // 4. Unmatched: retained, never dropped.
        review_flags.insert(flags::UNMATCHED_ACCOUNT.to_string());
        MappedLineItem {
            canonical_code: None,
            method: MappingMethod::Unmatched,
            confidence: 0.0,
            review_flags,
            item,
        }
    }

    fn best_fuzzy(
        &self,
        name: &str,
        statement_type: StatementType,
    ) -> Option<(&'a CanonicalAccount, f64)> {
        let target = name.to_lowercase();
        let mut best: Option<(&CanonicalAccount, f64)> = None;
        for account in self.chart.accounts_for(statement_type) {
            let candidate = account.name.to_lowercase();
            let similarity =
                TextDiff::from_chars(target.as_str(), candidate.as_str()).ratio() as f64 * 100.0;
            if best.map(|(_, s)| similarity > s).unwrap_or(true) {
                best = Some((account, similarity));
            }
        }
        best
    }

    /// Best keyword candidate by (hits, hit coverage), chart order as the
    /// deterministic tiebreak. Coverage feeds the 60-80 confidence band.
    fn best_keyword(
        &self,
        name: &str,
        statement_type: StatementType,
    ) -> Option<(&'a CanonicalAccount, f64)> {
        let target = name.to_lowercase();
        let mut best: Option<(&CanonicalAccount, usize, f64)> = None;
        for account in self.chart.accounts_for(statement_type) {
            if account.keywords.is_empty() {
                continue;
            }
            let hits = account
                .keywords
                .iter()
                .filter(|kw| target.contains(kw.as_str()))
                .count();
            if hits == 0 {
                continue;
            }
            let coverage = hits as f64 / account.keywords.len() as f64;
            let better = match best {
                None => true,
                Some((_, best_hits, best_coverage)) => {
                    hits > best_hits || (hits == best_hits && coverage > best_coverage)
                }
            };
            if better {
                best = Some((account, hits, coverage));
            }
        }
        best.map(|(account, _, coverage)| (account, coverage))
    }
}

/// The unmatched-items view required by the zero-loss contract.
pub fn unmatched_items(items: &[MappedLineItem]) -> Vec<&MappedLineItem> {
    items.iter().filter(|i| i.is_unmatched()).collect()
}
