//! Cross-statement reconciliation for one (property, period).
//!
//! Pulls one reconciled figure per statement type, evaluates the tie-out
//! suite against configured variance bands, and derives covenant metrics
//! and an audit opinion. A missing source statement leaves its tie-outs
//! `NotEvaluated`; absence of data is a distinct state from a failed
//! check. The whole record is rebuilt from scratch on every call, so
//! recomputation is idempotent and the stored copy can be swapped
//! atomically.

use crate::chart_of_accounts::codes;
use crate::config::{CovenantThresholds, ThresholdPair, TieOutThresholds};
use crate::money::{format_cents, Cents};
use crate::schema::{MappedLineItem, Period, StatementType};
use crate::validation::amount_by_code;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TieOutStatus {
    Pass,
    Warning,
    Fail,
    NotEvaluated,
}

impl fmt::Display for TieOutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Warning => write!(f, "WARNING"),
            Self::Fail => write!(f, "FAIL"),
            Self::NotEvaluated => write!(f, "NOT_EVALUATED"),
        }
    }
}

/// One cross-statement consistency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieOut {
    pub name: String,
    pub left_field: String,
    pub right_field: String,
    pub left_cents: Option<Cents>,
    pub right_cents: Option<Cents>,
    pub variance_cents: Option<Cents>,
    pub status: TieOutStatus,
    /// Counted toward the qualified-opinion threshold.
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricStatus {
    Pass,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOpinion {
    Clean,
    Qualified,
    Adverse,
}

impl fmt::Display for AuditOpinion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "CLEAN"),
            Self::Qualified => write!(f, "QUALIFIED"),
            Self::Adverse => write!(f, "ADVERSE"),
        }
    }
}

/// Figures pulled from each statement's mapped items. All in cents; unit
/// counts ride the same fixed-point representation (45 units = 4500).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciledFields {
    // Balance sheet
    pub total_assets: Option<Cents>,
    pub total_liabilities: Option<Cents>,
    pub total_capital: Option<Cents>,
    pub cash: Option<Cents>,
    pub long_term_debt: Option<Cents>,
    pub property_value: Option<Cents>,
    // Income statement
    pub rental_income: Option<Cents>,
    pub interest_expense: Option<Cents>,
    pub net_operating_income: Option<Cents>,
    // Cash flow
    pub beginning_cash: Option<Cents>,
    pub net_change_in_cash: Option<Cents>,
    pub ending_cash: Option<Cents>,
    pub debt_service: Option<Cents>,
    // Rent roll
    pub scheduled_monthly_rent: Option<Cents>,
    pub occupied_units: Option<Cents>,
    pub total_units: Option<Cents>,
    // Mortgage statement
    pub principal_balance: Option<Cents>,
    pub total_payment: Option<Cents>,
    pub interest_portion: Option<Cents>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CovenantMetrics {
    pub dscr: Option<f64>,
    pub dscr_status: Option<MetricStatus>,
    pub ltv: Option<f64>,
    pub cash_flow_coverage: Option<f64>,
    pub occupancy: Option<f64>,
    pub occupancy_status: Option<MetricStatus>,
}

/// Derived state for one (property, period): rebuilt whole whenever any
/// contributing statement changes, never partially overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub property: String,
    pub period: Period,
    pub statements_present: Vec<StatementType>,
    pub fields: ReconciledFields,
    pub tie_outs: Vec<TieOut>,
    pub metrics: CovenantMetrics,
    pub opinion: AuditOpinion,
}

/// Mapped items grouped by statement type, the reconciliation input.
#[derive(Debug, Default)]
pub struct StatementInputs<'a> {
    items: BTreeMap<StatementType, &'a [MappedLineItem]>,
}

impl<'a> StatementInputs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, statement_type: StatementType, items: &'a [MappedLineItem]) {
        self.items.insert(statement_type, items);
    }

    fn get(&self, statement_type: StatementType) -> Option<&'a [MappedLineItem]> {
        self.items.get(&statement_type).copied()
    }

    fn amount(&self, statement_type: StatementType, code: &str) -> Option<Cents> {
        amount_by_code(self.get(statement_type)?, code)
    }
}

pub struct ReconciliationEngine<'a> {
    thresholds: &'a TieOutThresholds,
    covenants: &'a CovenantThresholds,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(thresholds: &'a TieOutThresholds, covenants: &'a CovenantThresholds) -> Self {
        Self {
            thresholds,
            covenants,
        }
    }

    pub fn reconcile(
        &self,
        property: &str,
        period: Period,
        inputs: &StatementInputs<'_>,
    ) -> ReconciliationRecord {
        let fields = self.pull_fields(inputs);
        let tie_outs = self.evaluate_tie_outs(&fields);
        let metrics = self.covenant_metrics(&fields);
        let opinion = derive_opinion(&tie_outs);

        let statements_present: Vec<StatementType> = StatementType::RECONCILED
            .iter()
            .copied()
            .filter(|t| inputs.get(*t).is_some())
            .collect();

        info!(
            "reconciled {} {}: {} statements, opinion {}",
            property,
            period,
            statements_present.len(),
            opinion
        );

        ReconciliationRecord {
            property: property.to_string(),
            period,
            statements_present,
            fields,
            tie_outs,
            metrics,
            opinion,
        }
    }

    fn pull_fields(&self, inputs: &StatementInputs<'_>) -> ReconciledFields {
        use StatementType::*;

        let cash = sum_present(&[
            inputs.amount(BalanceSheet, codes::CASH_OPERATING),
            inputs.amount(BalanceSheet, codes::CASH_RESERVES),
        ]);
        let property_value = sum_present(&[
            inputs.amount(BalanceSheet, codes::LAND),
            inputs.amount(BalanceSheet, codes::BUILDINGS),
        ]);

        // Prefer the extracted NOI line; derive it from totals when absent.
        let net_operating_income = inputs
            .amount(IncomeStatement, codes::NET_OPERATING_INCOME)
            .or_else(|| {
                let income = inputs.amount(IncomeStatement, codes::TOTAL_INCOME)?;
                let expenses = inputs.amount(IncomeStatement, codes::TOTAL_OPERATING_EXPENSES)?;
                debug!("deriving NOI from total income minus operating expenses");
                Some(income - expenses)
            });

        ReconciledFields {
            total_assets: inputs.amount(BalanceSheet, codes::TOTAL_ASSETS),
            total_liabilities: inputs.amount(BalanceSheet, codes::TOTAL_LIABILITIES),
            total_capital: inputs.amount(BalanceSheet, codes::TOTAL_CAPITAL),
            cash,
            long_term_debt: inputs.amount(BalanceSheet, codes::MORTGAGE_PAYABLE),
            property_value,
            rental_income: inputs.amount(IncomeStatement, codes::RENTAL_INCOME),
            interest_expense: inputs.amount(IncomeStatement, codes::MORTGAGE_INTEREST_EXPENSE),
            net_operating_income,
            beginning_cash: inputs.amount(CashFlow, codes::BEGINNING_CASH),
            net_change_in_cash: inputs.amount(CashFlow, codes::NET_CHANGE_IN_CASH),
            ending_cash: inputs.amount(CashFlow, codes::ENDING_CASH),
            debt_service: inputs.amount(CashFlow, codes::DEBT_SERVICE),
            scheduled_monthly_rent: inputs.amount(RentRoll, codes::SCHEDULED_RENT),
            occupied_units: inputs.amount(RentRoll, codes::OCCUPIED_UNITS),
            total_units: inputs.amount(RentRoll, codes::TOTAL_UNITS),
            principal_balance: inputs.amount(MortgageStatement, codes::PRINCIPAL_BALANCE),
            total_payment: inputs.amount(MortgageStatement, codes::TOTAL_PAYMENT),
            interest_portion: inputs.amount(MortgageStatement, codes::INTEREST_PORTION),
        }
    }

    fn evaluate_tie_outs(&self, fields: &ReconciledFields) -> Vec<TieOut> {
        let t = self.thresholds;
        vec![
            tie_out(
                "mortgage_principal_vs_long_term_debt",
                "mortgage principal balance",
                fields.principal_balance,
                "balance-sheet long-term debt",
                fields.long_term_debt,
                t.principal_vs_long_term_debt,
                true,
            ),
            tie_out(
                "mortgage_payment_vs_debt_service",
                "mortgage total payment",
                fields.total_payment,
                "cash-flow debt service",
                fields.debt_service,
                t.payment_vs_debt_service,
                true,
            ),
            tie_out(
                "ending_cash_vs_balance_sheet_cash",
                "cash-flow ending cash",
                fields.ending_cash,
                "balance-sheet cash",
                fields.cash,
                t.ending_cash,
                true,
            ),
            tie_out(
                "balance_sheet_equation",
                "total assets",
                fields.total_assets,
                "total liabilities + capital",
                add_present(fields.total_liabilities, fields.total_capital),
                t.balance_sheet_equation,
                true,
            ),
            tie_out(
                "cash_flow_self_consistency",
                "beginning cash + net change",
                add_present(fields.beginning_cash, fields.net_change_in_cash),
                "ending cash",
                fields.ending_cash,
                t.cash_flow_consistency,
                true,
            ),
            tie_out(
                "annualized_rent_roll_vs_rental_income",
                "annualized scheduled rent",
                fields.scheduled_monthly_rent.map(|r| r * 12),
                "annualized rental income",
                fields.rental_income.map(|r| r * 12),
                t.rent_roll_vs_rental_income,
                false,
            ),
            tie_out(
                "mortgage_interest_vs_interest_expense",
                "mortgage interest portion",
                fields.interest_portion,
                "income-statement interest expense",
                fields.interest_expense,
                t.interest_vs_interest_expense,
                false,
            ),
        ]
    }

    fn covenant_metrics(&self, fields: &ReconciledFields) -> CovenantMetrics {
        let debt_service = fields.debt_service.or(fields.total_payment);

        let dscr = match (fields.net_operating_income, debt_service) {
            (Some(noi), Some(ds)) if ds != 0 => Some(noi as f64 / ds as f64),
            _ => None,
        };
        let dscr_status = dscr.map(|value| {
            if value >= self.covenants.dscr_pass {
                MetricStatus::Pass
            } else if value >= self.covenants.dscr_warning {
                MetricStatus::Warning
            } else {
                MetricStatus::Critical
            }
        });

        let ltv = match (fields.principal_balance, fields.property_value) {
            (Some(principal), Some(value)) if value != 0 => {
                Some(principal as f64 / value as f64)
            }
            _ => None,
        };

        let cash_flow_coverage = match (fields.net_change_in_cash, debt_service) {
            (Some(net), Some(ds)) if ds != 0 => Some((net + ds) as f64 / ds as f64),
            _ => None,
        };

        let occupancy = match (fields.occupied_units, fields.total_units) {
            (Some(occupied), Some(total)) if total != 0 => {
                Some(occupied as f64 / total as f64)
            }
            _ => None,
        };
        let occupancy_status = occupancy.map(|value| {
            if value >= self.covenants.occupancy_pass {
                MetricStatus::Pass
            } else if value >= self.covenants.occupancy_warning {
                MetricStatus::Warning
            } else {
                MetricStatus::Critical
            }
        });

        CovenantMetrics {
            dscr,
            dscr_status,
            ltv,
            cash_flow_coverage,
            occupancy,
            occupancy_status,
        }
    }
}

/// Variance bands are inclusive: exactly the pass threshold still passes.
fn tie_out(
    name: &str,
    left_field: &str,
    left: Option<Cents>,
    right_field: &str,
    right: Option<Cents>,
    thresholds: ThresholdPair,
    critical: bool,
) -> TieOut {
    let (variance_cents, status) = match (left, right) {
        (Some(l), Some(r)) => {
            let variance = (l - r).abs();
            let status = if variance <= thresholds.pass_cents {
                TieOutStatus::Pass
            } else if variance <= thresholds.warning_cents {
                TieOutStatus::Warning
            } else {
                TieOutStatus::Fail
            };
            (Some(variance), status)
        }
        _ => (None, TieOutStatus::NotEvaluated),
    };

    TieOut {
        name: name.to_string(),
        left_field: left_field.to_string(),
        right_field: right_field.to_string(),
        left_cents: left,
        right_cents: right,
        variance_cents,
        status,
        critical,
    }
}

/// CLEAN when every evaluated tie-out passes; QUALIFIED when at least three
/// of the five critical tie-outs pass (unevaluated counts as not passed);
/// otherwise ADVERSE. With nothing evaluated at all there is no evidence
/// either way, which is a qualified position, not an adverse one.
fn derive_opinion(tie_outs: &[TieOut]) -> AuditOpinion {
    let evaluated: Vec<&TieOut> = tie_outs
        .iter()
        .filter(|t| t.status != TieOutStatus::NotEvaluated)
        .collect();

    if evaluated.is_empty() {
        return AuditOpinion::Qualified;
    }
    if evaluated.iter().all(|t| t.status == TieOutStatus::Pass) {
        return AuditOpinion::Clean;
    }

    let critical_passes = tie_outs
        .iter()
        .filter(|t| t.critical && t.status == TieOutStatus::Pass)
        .count();
    if critical_passes >= 3 {
        AuditOpinion::Qualified
    } else {
        AuditOpinion::Adverse
    }
}

impl ReconciliationRecord {
    /// Operator-facing report.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "# Reconciliation - {} {}\n\n",
            self.property, self.period
        ));
        output.push_str(&format!("**Audit opinion:** {}\n\n", self.opinion));
        output.push_str(&format!(
            "**Statements present:** {}\n\n",
            self.statements_present
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        output.push_str("## Tie-outs\n\n");
        for tie in &self.tie_outs {
            let variance = tie
                .variance_cents
                .map(|v| format_cents(v))
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "- [{}] {}: {} vs {} (variance {})\n",
                tie.status, tie.name, tie.left_field, tie.right_field, variance
            ));
        }
        output.push('\n');

        output.push_str("## Covenant metrics\n\n");
        if let Some(dscr) = self.metrics.dscr {
            output.push_str(&format!("- DSCR: {:.2}\n", dscr));
        }
        if let Some(ltv) = self.metrics.ltv {
            output.push_str(&format!("- LTV: {:.1}%\n", ltv * 100.0));
        }
        if let Some(occupancy) = self.metrics.occupancy {
            output.push_str(&format!("- Occupancy: {:.1}%\n", occupancy * 100.0));
        }
        if let Some(coverage) = self.metrics.cash_flow_coverage {
            output.push_str(&format!("- Cash flow coverage: {:.2}\n", coverage));
        }

        output
    }
}

fn add_present(a: Option<Cents>, b: Option<Cents>) -> Option<Cents> {
    Some(a? + b?)
}

/// Sum of the values that are present; None when none are.
fn sum_present(values: &[Option<Cents>]) -> Option<Cents> {
    let present: Vec<Cents> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AmountSign, LineItem, LineItemKind, MappingMethod};
    use std::collections::BTreeSet;

    fn mapped(code: &str, cents: Cents) -> MappedLineItem {
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

    fn engine_parts() -> (TieOutThresholds, CovenantThresholds) {
        (TieOutThresholds::default(), CovenantThresholds::default())
    }

    #[test]
    fn test_principal_tie_out_boundary_inclusive() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        // $5,000,100 vs $5,000,000: variance exactly $100 -> PASS.
        let mortgage = vec![mapped(codes::PRINCIPAL_BALANCE, 500_010_000)];
        let balance = vec![mapped(codes::MORTGAGE_PAYABLE, 500_000_000)];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::MortgageStatement, &mortgage);
        inputs.insert(StatementType::BalanceSheet, &balance);

        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        let tie = record
            .tie_outs
            .iter()
            .find(|t| t.name == "mortgage_principal_vs_long_term_debt")
            .unwrap();
        assert_eq!(tie.variance_cents, Some(10_000));
        assert_eq!(tie.status, TieOutStatus::Pass);
    }

    #[test]
    fn test_tie_out_warning_and_fail_bands() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        // variance $100.01 -> WARNING
        let mortgage = vec![mapped(codes::PRINCIPAL_BALANCE, 500_010_001)];
        let balance = vec![mapped(codes::MORTGAGE_PAYABLE, 500_000_000)];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::MortgageStatement, &mortgage);
        inputs.insert(StatementType::BalanceSheet, &balance);
        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        let tie = record
            .tie_outs
            .iter()
            .find(|t| t.name == "mortgage_principal_vs_long_term_debt")
            .unwrap();
        assert_eq!(tie.status, TieOutStatus::Warning);

        // variance $2,000 -> FAIL
        let mortgage = vec![mapped(codes::PRINCIPAL_BALANCE, 500_200_000)];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::MortgageStatement, &mortgage);
        inputs.insert(StatementType::BalanceSheet, &balance);
        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        let tie = record
            .tie_outs
            .iter()
            .find(|t| t.name == "mortgage_principal_vs_long_term_debt")
            .unwrap();
        assert_eq!(tie.status, TieOutStatus::Fail);
    }

    #[test]
    fn test_missing_statement_leaves_tie_out_unevaluated() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        let balance = vec![mapped(codes::MORTGAGE_PAYABLE, 500_000_000)];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::BalanceSheet, &balance);

        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        let tie = record
            .tie_outs
            .iter()
            .find(|t| t.name == "mortgage_principal_vs_long_term_debt")
            .unwrap();
        assert_eq!(tie.status, TieOutStatus::NotEvaluated);
        assert_eq!(tie.variance_cents, None);
    }

    #[test]
    fn test_balance_sheet_equation_tie_out() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        let balance = vec![
            mapped(codes::TOTAL_ASSETS, 2_388_995_333),
            mapped(codes::TOTAL_LIABILITIES, 2_383_921_610),
            mapped(codes::TOTAL_CAPITAL, 5_073_723),
        ];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::BalanceSheet, &balance);

        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        let tie = record
            .tie_outs
            .iter()
            .find(|t| t.name == "balance_sheet_equation")
            .unwrap();
        assert_eq!(tie.variance_cents, Some(0));
        assert_eq!(tie.status, TieOutStatus::Pass);
        // Only evaluated tie-out passes -> CLEAN.
        assert_eq!(record.opinion, AuditOpinion::Clean);
    }

    #[test]
    fn test_dscr_and_occupancy_metrics() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        let income = vec![mapped(codes::NET_OPERATING_INCOME, 150_000_00)];
        let cash_flow = vec![mapped(codes::DEBT_SERVICE, 100_000_00)];
        let rent_roll = vec![
            mapped(codes::OCCUPIED_UNITS, 45_00),
            mapped(codes::TOTAL_UNITS, 48_00),
        ];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::IncomeStatement, &income);
        inputs.insert(StatementType::CashFlow, &cash_flow);
        inputs.insert(StatementType::RentRoll, &rent_roll);

        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        assert_eq!(record.metrics.dscr, Some(1.5));
        assert_eq!(record.metrics.dscr_status, Some(MetricStatus::Pass));
        let occupancy = record.metrics.occupancy.unwrap();
        assert!((occupancy - 0.9375).abs() < 1e-9);
        assert_eq!(record.metrics.occupancy_status, Some(MetricStatus::Pass));
    }

    #[test]
    fn test_dscr_bands() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        for (noi, expected) in [
            (125_000_00, MetricStatus::Pass),     // exactly 1.25
            (110_000_00, MetricStatus::Warning),  // 1.10
            (90_000_00, MetricStatus::Critical),  // 0.90
        ] {
            let income = vec![mapped(codes::NET_OPERATING_INCOME, noi)];
            let cash_flow = vec![mapped(codes::DEBT_SERVICE, 100_000_00)];
            let mut inputs = StatementInputs::new();
            inputs.insert(StatementType::IncomeStatement, &income);
            inputs.insert(StatementType::CashFlow, &cash_flow);
            let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
            assert_eq!(record.metrics.dscr_status, Some(expected));
        }
    }

    #[test]
    fn test_noi_derived_from_totals_when_line_missing() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        let income = vec![
            mapped(codes::TOTAL_INCOME, 200_000_00),
            mapped(codes::TOTAL_OPERATING_EXPENSES, 80_000_00),
        ];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::IncomeStatement, &income);

        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        assert_eq!(record.fields.net_operating_income, Some(120_000_00));
    }

    #[test]
    fn test_opinion_qualified_when_three_criticals_pass() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        // Equation + cash-flow consistency + ending-cash pass; principal fails.
        let balance = vec![
            mapped(codes::TOTAL_ASSETS, 1_000_000_00),
            mapped(codes::TOTAL_LIABILITIES, 600_000_00),
            mapped(codes::TOTAL_CAPITAL, 400_000_00),
            mapped(codes::CASH_OPERATING, 50_000_00),
            mapped(codes::MORTGAGE_PAYABLE, 500_000_00),
        ];
        let cash_flow = vec![
            mapped(codes::BEGINNING_CASH, 40_000_00),
            mapped(codes::NET_CHANGE_IN_CASH, 10_000_00),
            mapped(codes::ENDING_CASH, 50_000_00),
        ];
        let mortgage = vec![mapped(codes::PRINCIPAL_BALANCE, 520_000_00)]; // $20k off
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::BalanceSheet, &balance);
        inputs.insert(StatementType::CashFlow, &cash_flow);
        inputs.insert(StatementType::MortgageStatement, &mortgage);

        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        assert_eq!(record.opinion, AuditOpinion::Qualified);
    }

    #[test]
    fn test_opinion_adverse_when_criticals_fail() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        let balance = vec![
            mapped(codes::TOTAL_ASSETS, 1_000_000_00),
            mapped(codes::TOTAL_LIABILITIES, 100_000_00),
            mapped(codes::TOTAL_CAPITAL, 400_000_00), // equation off by $500k
            mapped(codes::CASH_OPERATING, 50_000_00),
            mapped(codes::MORTGAGE_PAYABLE, 500_000_00),
        ];
        let cash_flow = vec![
            mapped(codes::BEGINNING_CASH, 40_000_00),
            mapped(codes::NET_CHANGE_IN_CASH, 10_000_00),
            mapped(codes::ENDING_CASH, 99_000_00), // inconsistent
        ];
        let mortgage = vec![mapped(codes::PRINCIPAL_BALANCE, 520_000_00)];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::BalanceSheet, &balance);
        inputs.insert(StatementType::CashFlow, &cash_flow);
        inputs.insert(StatementType::MortgageStatement, &mortgage);

        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        assert_eq!(record.opinion, AuditOpinion::Adverse);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        let balance = vec![
            mapped(codes::TOTAL_ASSETS, 1_000_000_00),
            mapped(codes::TOTAL_LIABILITIES, 600_000_00),
            mapped(codes::TOTAL_CAPITAL, 400_000_00),
        ];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::BalanceSheet, &balance);

        let period = Period { year: 2024, month: 3 };
        let first = engine.reconcile("prop-1", period, &inputs);
        let second = engine.reconcile("prop-1", period, &inputs);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_markdown_report() {
        let (thresholds, covenants) = engine_parts();
        let engine = ReconciliationEngine::new(&thresholds, &covenants);

        let balance = vec![
            mapped(codes::TOTAL_ASSETS, 1_000_000_00),
            mapped(codes::TOTAL_LIABILITIES, 600_000_00),
            mapped(codes::TOTAL_CAPITAL, 400_000_00),
        ];
        let mut inputs = StatementInputs::new();
        inputs.insert(StatementType::BalanceSheet, &balance);

        let record = engine.reconcile("prop-1", Period { year: 2024, month: 3 }, &inputs);
        let markdown = record.to_markdown();
        assert!(markdown.contains("# Reconciliation - prop-1 2024-03"));
        assert!(markdown.contains("CLEAN"));
        assert!(markdown.contains("balance_sheet_equation"));
    }
}
