//! The canonical chart of accounts.
//!
//! Loaded once per pipeline run (from CSV or JSON, per the persistence
//! interface) and passed explicitly into the mapper, validation engine, and
//! reconciliation engine. The chart is read-only; nothing in the pipeline
//! mutates it.

use crate::error::{PipelineError, Result};
use crate::schema::StatementType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Statement section an account reports under. Section totals are checked
/// against the sum of detail accounts in the same section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountSection {
    Assets,
    Liabilities,
    Capital,
    Income,
    Expenses,
    CashFlow,
    RentRoll,
    Mortgage,
    /// Cross-section lines (e.g. net operating income) that no single
    /// section check applies to.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedSign {
    Positive,
    /// Contra accounts (accumulated depreciation/amortization) carry a
    /// credit balance against their section and must be <= 0.
    Negative,
    Either,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalAccount {
    #[schemars(description = "Account code in NNNN-NNNN form, unique across the chart")]
    pub code: String,

    #[schemars(description = "Canonical display name, the fuzzy-match target")]
    pub name: String,

    #[schemars(description = "Statement type this account belongs to")]
    pub statement_type: StatementType,

    pub section: AccountSection,

    #[schemars(description = "Free-form subcategory, e.g. 'Current Assets'")]
    pub category: String,

    pub expected_sign: ExpectedSign,

    #[schemars(description = "True for extracted totals rows rather than detail lines")]
    pub is_calculated: bool,

    #[schemars(description = "Lowercase tokens used by the keyword mapping tier")]
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CanonicalAccount {
    pub fn is_contra(&self) -> bool {
        self.expected_sign == ExpectedSign::Negative
    }
}

/// Well-known codes the validation and reconciliation engines pull by name.
pub mod codes {
    pub const CASH_OPERATING: &str = "0105-0000";
    pub const CASH_RESERVES: &str = "0110-0000";
    pub const ACCUMULATED_DEPRECIATION: &str = "1030-0000";
    pub const LAND: &str = "1010-0000";
    pub const BUILDINGS: &str = "1020-0000";
    pub const TOTAL_ASSETS: &str = "1999-0000";
    pub const MORTGAGE_PAYABLE: &str = "2510-0000";
    pub const TOTAL_LIABILITIES: &str = "2999-0000";
    pub const TOTAL_CAPITAL: &str = "3999-0000";
    pub const RENTAL_INCOME: &str = "4010-0000";
    pub const TOTAL_INCOME: &str = "4999-0000";
    pub const TOTAL_OPERATING_EXPENSES: &str = "5999-0000";
    pub const MORTGAGE_INTEREST_EXPENSE: &str = "6010-0000";
    pub const NET_OPERATING_INCOME: &str = "6999-0000";
    pub const BEGINNING_CASH: &str = "7010-0000";
    pub const NET_CHANGE_IN_CASH: &str = "7020-0000";
    pub const ENDING_CASH: &str = "7030-0000";
    pub const DEBT_SERVICE: &str = "7110-0000";
    pub const SCHEDULED_RENT: &str = "8010-0000";
    pub const OCCUPIED_UNITS: &str = "8020-0000";
    pub const TOTAL_UNITS: &str = "8030-0000";
    pub const PRINCIPAL_BALANCE: &str = "9010-0000";
    pub const TOTAL_PAYMENT: &str = "9020-0000";
    pub const INTEREST_PORTION: &str = "9030-0000";
    pub const ESCROW_BALANCE: &str = "9040-0000";
}

#[derive(Debug, Clone)]
pub struct ChartOfAccounts {
    accounts: Vec<CanonicalAccount>,
    by_code: BTreeMap<String, usize>,
}

impl ChartOfAccounts {
    pub fn new(accounts: Vec<CanonicalAccount>) -> Result<Self> {
        let mut by_code = BTreeMap::new();
        for (idx, account) in accounts.iter().enumerate() {
            if account.code.trim().is_empty() {
                return Err(PipelineError::InvalidChart(format!(
                    "account '{}' has an empty code",
                    account.name
                )));
            }
            if by_code.insert(account.code.clone(), idx).is_some() {
                return Err(PipelineError::InvalidChart(format!(
                    "duplicate account code {}",
                    account.code
                )));
            }
        }
        Ok(Self { accounts, by_code })
    }

    pub fn by_code(&self, code: &str) -> Option<&CanonicalAccount> {
        self.by_code.get(code.trim()).map(|&i| &self.accounts[i])
    }

    pub fn accounts(&self) -> &[CanonicalAccount] {
        &self.accounts
    }

    /// Accounts eligible as fuzzy/keyword targets for a document of the
    /// given type. Unknown documents match against the whole chart.
    pub fn accounts_for(
        &self,
        statement_type: StatementType,
    ) -> impl Iterator<Item = &CanonicalAccount> {
        self.accounts.iter().filter(move |a| {
            statement_type == StatementType::Unknown || a.statement_type == statement_type
        })
    }

    /// The extracted-totals account for a section, when the chart has one.
    pub fn section_total(&self, section: AccountSection) -> Option<&CanonicalAccount> {
        self.accounts
            .iter()
            .find(|a| a.is_calculated && a.section == section)
    }

    pub fn total_accounts(&self) -> usize {
        self.accounts.len()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let accounts: Vec<CanonicalAccount> = serde_json::from_str(json)?;
        Self::new(accounts)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.accounts)?)
    }

    /// Loads the chart from CSV with columns:
    /// code,name,statement_type,section,category,expected_sign,is_calculated,keywords
    /// where keywords is `;`-separated.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        #[derive(Deserialize)]
        struct Row {
            code: String,
            name: String,
            statement_type: StatementType,
            section: AccountSection,
            category: String,
            expected_sign: ExpectedSign,
            is_calculated: bool,
            #[serde(default)]
            keywords: String,
        }

        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut accounts = Vec::new();
        for row in csv_reader.deserialize() {
            let row: Row = row?;
            accounts.push(CanonicalAccount {
                code: row.code,
                name: row.name,
                statement_type: row.statement_type,
                section: row.section,
                category: row.category,
                expected_sign: row.expected_sign,
                is_calculated: row.is_calculated,
                keywords: row
                    .keywords
                    .split(';')
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            });
        }
        Self::new(accounts)
    }

    /// The platform's standard property-management chart. Used as the test
    /// fixture and as the starting chart for new portfolios.
    pub fn property_management_default() -> Self {
        use AccountSection::*;
        use ExpectedSign::*;
        use StatementType::*;

        fn account(
            code: &str,
            name: &str,
            statement_type: StatementType,
            section: AccountSection,
            category: &str,
            expected_sign: ExpectedSign,
            is_calculated: bool,
            keywords: &[&str],
        ) -> CanonicalAccount {
            CanonicalAccount {
                code: code.to_string(),
                name: name.to_string(),
                statement_type,
                section,
                category: category.to_string(),
                expected_sign,
                is_calculated,
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            }
        }

        let accounts = vec![
            // Balance sheet
            account(codes::CASH_OPERATING, "Cash - Operating", BalanceSheet, Assets, "Current Assets", Positive, false, &["cash", "operating", "checking"]),
            account(codes::CASH_RESERVES, "Cash - Reserves", BalanceSheet, Assets, "Current Assets", Positive, false, &["cash", "reserve", "reserves"]),
            account("0305-0000", "A/R Tenants", BalanceSheet, Assets, "Current Assets", Positive, false, &["receivable", "a/r", "tenants"]),
            account("0510-0000", "Prepaid Insurance", BalanceSheet, Assets, "Current Assets", Positive, false, &["prepaid", "insurance"]),
            account(codes::LAND, "Land", BalanceSheet, Assets, "Fixed Assets", Positive, false, &["land"]),
            account(codes::BUILDINGS, "Buildings", BalanceSheet, Assets, "Fixed Assets", Positive, false, &["building", "buildings", "improvements"]),
            account(codes::ACCUMULATED_DEPRECIATION, "Accumulated Depreciation", BalanceSheet, Assets, "Fixed Assets", Negative, false, &["accumulated", "depreciation", "amortization"]),
            account(codes::TOTAL_ASSETS, "Total Assets", BalanceSheet, Assets, "Totals", Positive, true, &["total", "assets"]),
            account("2010-0000", "Accounts Payable", BalanceSheet, Liabilities, "Current Liabilities", Positive, false, &["payable", "a/p"]),
            account("2110-0000", "Security Deposits Held", BalanceSheet, Liabilities, "Current Liabilities", Positive, false, &["security", "deposit", "deposits"]),
            account("2210-0000", "Accrued Interest Payable", BalanceSheet, Liabilities, "Current Liabilities", Positive, false, &["accrued", "interest"]),
            account(codes::MORTGAGE_PAYABLE, "Mortgage Payable - Long Term", BalanceSheet, Liabilities, "Long-Term Liabilities", Positive, false, &["mortgage", "loan", "note"]),
            account(codes::TOTAL_LIABILITIES, "Total Liabilities", BalanceSheet, Liabilities, "Totals", Positive, true, &["total", "liabilities"]),
            account("3010-0000", "Partners' Capital", BalanceSheet, Capital, "Capital", Either, false, &["partners", "capital", "contributed"]),
            account("3020-0000", "Retained Earnings", BalanceSheet, Capital, "Capital", Either, false, &["retained", "earnings"]),
            account(codes::TOTAL_CAPITAL, "Total Capital", BalanceSheet, Capital, "Totals", Either, true, &["total", "capital", "equity"]),
            // Income statement
            account(codes::RENTAL_INCOME, "Rental Income", IncomeStatement, Income, "Income", Positive, false, &["rent", "rental", "income"]),
            account("4020-0000", "Late Fee Income", IncomeStatement, Income, "Income", Positive, false, &["late", "fee", "fees"]),
            account("4030-0000", "Other Income", IncomeStatement, Income, "Income", Positive, false, &["other", "misc", "income"]),
            account(codes::TOTAL_INCOME, "Total Income", IncomeStatement, Income, "Totals", Positive, true, &["total", "income", "revenue"]),
            account("5010-0000", "Repairs & Maintenance", IncomeStatement, Expenses, "Operating Expenses", Positive, false, &["repairs", "maintenance"]),
            account("5020-0000", "Utilities", IncomeStatement, Expenses, "Operating Expenses", Positive, false, &["utilities", "water", "electric"]),
            account("5030-0000", "Property Management Fees", IncomeStatement, Expenses, "Operating Expenses", Positive, false, &["management", "fees"]),
            account("5040-0000", "Insurance Expense", IncomeStatement, Expenses, "Operating Expenses", Positive, false, &["insurance"]),
            account("5050-0000", "Property Taxes", IncomeStatement, Expenses, "Operating Expenses", Positive, false, &["taxes", "property"]),
            account(codes::TOTAL_OPERATING_EXPENSES, "Total Operating Expenses", IncomeStatement, Expenses, "Totals", Positive, true, &["total", "operating", "expenses"]),
            account(codes::MORTGAGE_INTEREST_EXPENSE, "Mortgage Interest Expense", IncomeStatement, Other, "Non-Operating", Positive, false, &["mortgage", "interest", "expense"]),
            account("6020-0000", "Depreciation Expense", IncomeStatement, Other, "Non-Operating", Positive, false, &["depreciation", "expense"]),
            account(codes::NET_OPERATING_INCOME, "Net Operating Income", IncomeStatement, Other, "Totals", Either, true, &["net", "operating", "income", "noi"]),
            // Cash flow
            account(codes::BEGINNING_CASH, "Beginning Cash Balance", StatementType::CashFlow, AccountSection::CashFlow, "Cash Flow", Positive, false, &["beginning", "cash"]),
            account(codes::NET_CHANGE_IN_CASH, "Net Change in Cash", StatementType::CashFlow, AccountSection::CashFlow, "Cash Flow", Either, false, &["net", "change", "cash"]),
            account(codes::ENDING_CASH, "Ending Cash Balance", StatementType::CashFlow, AccountSection::CashFlow, "Cash Flow", Positive, false, &["ending", "cash"]),
            account(codes::DEBT_SERVICE, "Debt Service Payments", StatementType::CashFlow, AccountSection::CashFlow, "Financing", Positive, false, &["debt", "service", "mortgage"]),
            // Rent roll
            account(codes::SCHEDULED_RENT, "Total Scheduled Rent", StatementType::RentRoll, AccountSection::RentRoll, "Rent Roll", Positive, false, &["scheduled", "rent", "total"]),
            account(codes::OCCUPIED_UNITS, "Occupied Units", StatementType::RentRoll, AccountSection::RentRoll, "Rent Roll", Positive, false, &["occupied", "units"]),
            account(codes::TOTAL_UNITS, "Total Units", StatementType::RentRoll, AccountSection::RentRoll, "Rent Roll", Positive, false, &["total", "units"]),
            // Mortgage statement
            account(codes::PRINCIPAL_BALANCE, "Principal Balance", MortgageStatement, Mortgage, "Mortgage", Positive, false, &["principal", "balance", "outstanding"]),
            account(codes::TOTAL_PAYMENT, "Total Payment Due", MortgageStatement, Mortgage, "Mortgage", Positive, false, &["payment", "total", "due"]),
            account(codes::INTEREST_PORTION, "Interest Portion", MortgageStatement, Mortgage, "Mortgage", Positive, false, &["interest", "portion"]),
            account(codes::ESCROW_BALANCE, "Escrow Balance", MortgageStatement, Mortgage, "Mortgage", Positive, false, &["escrow", "balance"]),
        ];

        Self::new(accounts).expect("default chart has unique codes")
    }
}
