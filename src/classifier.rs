//! Document type and period classification.
//!
//! Tiered and never-rejecting: filename heuristics first (fast, accurate on
//! well-named files), content markers second, and `Unknown` as the floor. A
//! document that defeats both tiers still enters the pipeline flagged for
//! review; rejecting it here would lose data.

use crate::schema::{flags, ClassificationMethod, DocumentClassification, Period, StatementType};
use crate::utils::month_from_name;
use log::debug;
use regex::Regex;

/// Filename tokens per statement type. Tokens are matched against the
/// filename split on non-alphanumeric separators.
const BALANCE_SHEET_TOKENS: &[&str] = &["balance", "bs"];
const INCOME_TOKENS: &[&str] = &["income", "profit", "pnl", "operations"];
const CASH_FLOW_JOINED: &[&str] = &["cashflow"];
const RENT_ROLL_JOINED: &[&str] = &["rentroll"];
const MORTGAGE_TOKENS: &[&str] = &["mortgage", "loan"];

pub struct DocumentClassifier {
    year_month: Regex,
    month_year_numeric: Regex,
    content_month: Regex,
    year: Regex,
}

impl DocumentClassifier {
    pub fn new() -> Self {
        // Filename separators are normalized to spaces before matching:
        // `_` is a word character to the regex engine, so `\b` anchors
        // would silently fail on names like "balance_2024-03.pdf".
        Self {
            // "2024 03", "202403" after normalization
            year_month: Regex::new(r"\b((?:19|20)\d{2}) ?(0[1-9]|1[0-2])\b")
                .expect("year_month pattern"),
            // "03 2024" after normalization
            month_year_numeric: Regex::new(r"\b(0?[1-9]|1[0-2]) ((?:19|20)\d{2})\b")
                .expect("month_year pattern"),
            // "March 31, 2024", "March 2024"
            content_month: Regex::new(
                r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\b(?:\s+\d{1,2},?)?\s+((?:19|20)\d{2})",
            )
            .expect("content_month pattern"),
            year: Regex::new(r"\b((?:19|20)\d{2})\b").expect("year pattern"),
        }
    }

    /// Classifies one document. Never fails and never rejects.
    pub fn classify(&self, file_name: &str, text: &str) -> DocumentClassification {
        let mut warnings = Vec::new();

        let (statement_type, method) = match self.type_from_filename(file_name) {
            Some(t) => (t, ClassificationMethod::Filename),
            None => match self.type_from_content(text) {
                Some(t) => {
                    warnings.push(flags::CLASSIFIED_BY_CONTENT.to_string());
                    (t, ClassificationMethod::Content)
                }
                None => {
                    warnings.push(flags::UNKNOWN_DOCUMENT_TYPE.to_string());
                    (StatementType::Unknown, ClassificationMethod::Unclassified)
                }
            },
        };

        let (period, period_method) = self.detect_period(file_name, text, &mut warnings);

        debug!(
            "classified '{}' as {} via {:?}, period {:?}",
            file_name, statement_type, method, period
        );

        DocumentClassification {
            statement_type,
            method,
            period,
            period_method,
            warnings,
        }
    }

    fn type_from_filename(&self, file_name: &str) -> Option<StatementType> {
        let lower = file_name.to_lowercase();
        let joined: String = lower.chars().filter(|c| c.is_alphanumeric()).collect();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let has_token = |set: &[&str]| tokens.iter().any(|t| set.contains(t));

        if RENT_ROLL_JOINED.iter().any(|m| joined.contains(m))
            || (tokens.contains(&"rent") && tokens.contains(&"roll"))
        {
            return Some(StatementType::RentRoll);
        }
        if has_token(MORTGAGE_TOKENS) {
            return Some(StatementType::MortgageStatement);
        }
        if CASH_FLOW_JOINED.iter().any(|m| joined.contains(m))
            || (tokens.contains(&"cash") && tokens.contains(&"flow"))
        {
            return Some(StatementType::CashFlow);
        }
        if has_token(INCOME_TOKENS) {
            return Some(StatementType::IncomeStatement);
        }
        if has_token(BALANCE_SHEET_TOKENS) {
            return Some(StatementType::BalanceSheet);
        }
        None
    }

    fn type_from_content(&self, text: &str) -> Option<StatementType> {
        let lower = text.to_lowercase();
        let contains = |marker: &str| lower.contains(marker);

        if contains("rent roll") {
            return Some(StatementType::RentRoll);
        }
        if contains("mortgage statement")
            || (contains("principal balance") && contains("escrow"))
        {
            return Some(StatementType::MortgageStatement);
        }
        if contains("statement of cash flows")
            || contains("cash flow statement")
            || (contains("beginning cash") && contains("ending cash"))
        {
            return Some(StatementType::CashFlow);
        }
        if contains("income statement")
            || contains("statement of operations")
            || contains("profit and loss")
            || contains("profit & loss")
        {
            return Some(StatementType::IncomeStatement);
        }
        if contains("balance sheet")
            || (contains("assets")
                && contains("liabilities")
                && (contains("capital") || contains("equity")))
        {
            return Some(StatementType::BalanceSheet);
        }
        None
    }

    /// Filename first, then content; a year with no month marker defaults to
    /// month 1 flagged for review; no year at all leaves the period unknown.
    fn detect_period(
        &self,
        file_name: &str,
        text: &str,
        warnings: &mut Vec<String>,
    ) -> (Option<Period>, Option<ClassificationMethod>) {
        if let Some(period) = self.period_from(file_name) {
            return (Some(period), Some(ClassificationMethod::Filename));
        }

        if let Some(captures) = self.content_month.captures(text) {
            let month = month_from_name(&captures[1]);
            let year = captures[2].parse().ok();
            if let (Some(month), Some(year)) = (month, year) {
                if let Ok(period) = Period::new(year, month) {
                    return (Some(period), Some(ClassificationMethod::Content));
                }
            }
        }

        // Year anywhere (filename preferred) with no month marker.
        let normalized = normalize_separators(file_name);
        let year_source = self
            .year
            .captures(&normalized)
            .map(|c| c[1].to_string())
            .or_else(|| self.year.captures(text).map(|c| c[1].to_string()));
        if let Some(year_text) = year_source {
            if let Ok(year) = year_text.parse() {
                warnings.push(flags::PERIOD_DEFAULTED.to_string());
                return (
                    Period::new(year, 1).ok(),
                    Some(ClassificationMethod::Content),
                );
            }
        }

        warnings.push(flags::PERIOD_UNKNOWN.to_string());
        (None, None)
    }

    fn period_from(&self, file_name: &str) -> Option<Period> {
        let normalized = normalize_separators(file_name);
        if let Some(captures) = self.year_month.captures(&normalized) {
            let year = captures[1].parse().ok()?;
            let month = captures[2].parse().ok()?;
            return Period::new(year, month).ok();
        }
        if let Some(captures) = self.month_year_numeric.captures(&normalized) {
            let month = captures[1].parse().ok()?;
            let year = captures[2].parse().ok()?;
            return Period::new(year, month).ok();
        }
        // month-name + year, e.g. "march_2024" or "Mar-2024"
        let month = normalized
            .split_whitespace()
            .find_map(month_from_name);
        if let Some(month) = month {
            if let Some(captures) = self.year.captures(&normalized) {
                if let Ok(year) = captures[1].parse() {
                    return Period::new(year, month).ok();
                }
            }
        }
        None
    }
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercases and replaces every non-alphanumeric character with a space so
/// the period regexes see clean word boundaries.
fn normalize_separators(file_name: &str) -> String {
    file_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}
