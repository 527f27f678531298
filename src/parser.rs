//! Turns the chosen engine's text into typed line items.
//!
//! Patterns are tried in a fixed order per line; a line matching none of
//! them is simply not emitted: a parse failure becomes absent data, not an
//! error. Amounts that violate the formatting contract are kept with a
//! penalty flag rather than dropped.

use crate::money::parse_amount;
use crate::schema::{AmountSign, LineItem, LineItemKind, SourceLocation};
use log::debug;
use regex::Regex;

/// Names whose totals settle a whole statement side rather than a section.
const GRAND_TOTAL_NAMES: &[&str] = &[
    "assets",
    "liabilities",
    "capital",
    "equity",
    "liabilities and capital",
    "liabilities & capital",
    "liabilities and equity",
    "liabilities & equity",
];

const SECTION_WORDS: &[&str] = &["assets", "liabilities", "capital", "income", "expenses"];

pub struct LineItemParser {
    total_line: Regex,
    code_line: Regex,
    name_line: Regex,
}

impl LineItemParser {
    pub fn new() -> Self {
        let amount = r"\(?\$?-?[\d,]+(?:\.\d+)?\)?";
        // The bare name+amount pattern is the loosest, so its amount must
        // look like formatted money (decimal point or thousands grouping);
        // otherwise date lines such as "As of December 31, 2023" would
        // produce phantom items.
        let formatted_amount = r"\(?\$?-?(?:[\d,]+\.\d+|\d{1,3}(?:,\d{3})+)\)?";
        Self {
            total_line: Regex::new(&format!(r"(?i)^\s*total\s+(.+?)\s+({})\s*$", amount))
                .expect("total pattern"),
            code_line: Regex::new(&format!(
                r"^\s*(\d{{3,4}}-\d{{3,4}})\s+(.+?)\s+({})\s*$",
                amount
            ))
            .expect("code pattern"),
            name_line: Regex::new(&format!(r"^\s*([A-Za-z].*?)\s+({})\s*$", formatted_amount))
                .expect("name pattern"),
        }
    }

    /// Parses the full text of one document into line items, tracking the
    /// source line for each.
    pub fn parse(&self, text: &str) -> Vec<LineItem> {
        let mut items = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if let Some(item) = self.parse_line(line, index as u32 + 1) {
                items.push(item);
            }
        }
        items
    }

    fn parse_line(&self, line: &str, line_number: u32) -> Option<LineItem> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.chars().all(|c| c == '-' || c == '=' || c == '_') {
            return None;
        }

        // (c) "Total <name> <amount>": extracted totals, not detail.
        if let Some(captures) = self.total_line.captures(trimmed) {
            let name = captures[1].trim().to_string();
            let parsed = parse_amount(&captures[2])?;
            let kind = total_kind(&name);
            return Some(self.build_item(
                None,
                format!("Total {}", name),
                parsed,
                kind,
                line_number,
            ));
        }

        // (a) "code  name  amount"
        if let Some(captures) = self.code_line.captures(trimmed) {
            let code = captures[1].to_string();
            let name = captures[2].trim().to_string();
            let parsed = parse_amount(&captures[3])?;
            return Some(self.build_item(Some(code), name, parsed, LineItemKind::Detail, line_number));
        }

        // (b) "name  amount": resolved by fuzzy/keyword mapping later.
        if let Some(captures) = self.name_line.captures(trimmed) {
            let name = captures[1].trim().trim_end_matches(':').to_string();
            if let Some(parsed) = parse_amount(&captures[2]) {
                return Some(self.build_item(None, name, parsed, LineItemKind::Detail, line_number));
            }
        }

        // (d) header / unparseable line: skipped, never fatal.
        debug!("no pattern matched line {}: '{}'", line_number, trimmed);
        None
    }

    fn build_item(
        &self,
        account_code: Option<String>,
        account_name: String,
        parsed: crate::money::ParsedAmount,
        kind: LineItemKind,
        line_number: u32,
    ) -> LineItem {
        // (e) accumulated depreciation/amortization lines are contra.
        let lower = account_name.to_lowercase();
        let is_contra =
            lower.contains("accumulated depreciation") || lower.contains("accumulated amortization");

        let sign = if parsed.parenthesized {
            AmountSign::ParenthesizedNegative
        } else if parsed.negative {
            AmountSign::MinusNegative
        } else {
            AmountSign::Positive
        };

        LineItem {
            account_code,
            account_name,
            amount_cents: parsed.cents,
            sign,
            kind,
            location: Some(SourceLocation {
                page: 1,
                line: line_number,
            }),
            is_contra,
            amount_penalty: parsed.penalty,
        }
    }
}

impl Default for LineItemParser {
    fn default() -> Self {
        Self::new()
    }
}

/// "Total Assets" settles a statement side; "Total Current Assets" settles a
/// section; anything else is a generic calculated line.
fn total_kind(name: &str) -> LineItemKind {
    let normalized = name.trim().to_lowercase();
    if GRAND_TOTAL_NAMES.contains(&normalized.as_str()) {
        LineItemKind::GrandTotal
    } else if SECTION_WORDS.iter().any(|w| normalized.contains(w)) {
        LineItemKind::SectionTotal
    } else {
        LineItemKind::CalculatedTotal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_name_amount_line() {
        let parser = LineItemParser::new();
        let items = parser.parse("0305-0000  A/R Tenants  210,365.06");

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.account_code.as_deref(), Some("0305-0000"));
        assert_eq!(item.account_name, "A/R Tenants");
        assert_eq!(item.amount_cents, 21_036_506);
        assert_eq!(item.kind, LineItemKind::Detail);
        assert_eq!(item.sign, AmountSign::Positive);
        assert!(!item.amount_penalty);
    }

    #[test]
    fn test_name_amount_line() {
        let parser = LineItemParser::new();
        let items = parser.parse("Prepaid Insurance  4,200.00");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].account_code, None);
        assert_eq!(items[0].account_name, "Prepaid Insurance");
        assert_eq!(items[0].amount_cents, 420_000);
    }

    #[test]
    fn test_total_lines_classified() {
        let parser = LineItemParser::new();
        let text = "Total Current Assets  350,000.00\n\
                    Total Assets  23,889,953.33\n\
                    Total Repairs  1,500.00";
        let items = parser.parse(text);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, LineItemKind::SectionTotal);
        assert_eq!(items[1].kind, LineItemKind::GrandTotal);
        assert_eq!(items[1].amount_cents, 2_388_995_333);
        assert_eq!(items[2].kind, LineItemKind::CalculatedTotal);
    }

    #[test]
    fn test_headers_skipped_without_error() {
        let parser = LineItemParser::new();
        let text = "ASSETS\nCurrent Assets:\n------------\n0105-0000  Cash - Operating  12,500.00";
        let items = parser.parse(text);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].account_code.as_deref(), Some("0105-0000"));
    }

    #[test]
    fn test_accumulated_depreciation_is_contra() {
        let parser = LineItemParser::new();
        let items = parser.parse("1030-0000  Accumulated Depreciation  (1,250,000.00)");

        assert_eq!(items.len(), 1);
        assert!(items[0].is_contra);
        assert_eq!(items[0].amount_cents, -125_000_000);
        assert_eq!(items[0].sign, AmountSign::ParenthesizedNegative);
    }

    #[test]
    fn test_minus_prefixed_negative() {
        let parser = LineItemParser::new();
        let items = parser.parse("7020-0000  Net Change in Cash  -3,450.10");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount_cents, -345_010);
        assert_eq!(items[0].sign, AmountSign::MinusNegative);
    }

    #[test]
    fn test_malformed_amount_kept_with_penalty() {
        let parser = LineItemParser::new();
        let items = parser.parse("0110-0000  Cash - Reserves  1234");

        assert_eq!(items.len(), 1);
        assert!(items[0].amount_penalty);
        assert_eq!(items[0].amount_cents, 123_400);
    }

    #[test]
    fn test_date_lines_do_not_become_items() {
        let parser = LineItemParser::new();
        let text = "Balance Sheet\nAs of December 31, 2023\nPage 1 of 3\n\
                    Prepaid Insurance  4,200.00";
        let items = parser.parse(text);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].account_name, "Prepaid Insurance");
    }

    #[test]
    fn test_source_lines_tracked() {
        let parser = LineItemParser::new();
        let text = "ASSETS\n0105-0000  Cash - Operating  12,500.00\n0305-0000  A/R Tenants  100.00";
        let items = parser.parse(text);

        assert_eq!(items[0].location.unwrap().line, 2);
        assert_eq!(items[1].location.unwrap().line, 3);
    }
}
