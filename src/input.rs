//! The per-return input record and its mapping onto raw ledger lines.
use crate::compute::Ledger;
use crate::error::TaxError;
use crate::forms::lines::*;
use crate::store::{FilingStatus, LineKey, Money, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SENIOR_AGE: u32 = 65;

/// Largest amount accepted on any input line.
pub const MAX_AMOUNT: Money = Money::from_dollars(1_000_000_000_000);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxpayerInfo {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub blind: bool,
    pub spouse_name: Option<String>,
    pub spouse_age: Option<u32>,
    pub spouse_blind: bool,
    /// Eligible K-12 educator (900 hours in the year).
    pub educator: bool,
    pub spouse_educator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependent {
    pub name: String,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub qualifying_child: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct W2 {
    #[serde(default)]
    pub employer: Option<String>,
    /// Box 1
    pub wages: Money,
    /// Box 2
    #[serde(default)]
    pub federal_withholding: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form1099Int {
    #[serde(default)]
    pub payer: Option<String>,
    /// Box 1
    pub interest_income: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Form1099Div {
    pub payer: Option<String>,
    /// Box 1a
    pub ordinary_dividends: Money,
    /// Box 1b
    pub qualified_dividends: Money,
}

/// Schedule C figures for one sole proprietorship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessIncome {
    pub business_name: Option<String>,
    pub gross_receipts: Money,
    pub returns_allowances: Money,
    pub cost_of_goods_sold: Money,
    pub other_income: Money,
    pub advertising: Money,
    pub car_truck_expenses: Money,
    pub commissions_fees: Money,
    pub contract_labor: Money,
    pub depreciation: Money,
    pub insurance: Money,
    pub interest: Money,
    pub legal_professional: Money,
    pub office_expense: Money,
    pub rent_lease: Money,
    pub repairs_maintenance: Money,
    pub supplies: Money,
    pub taxes_licenses: Money,
    pub travel: Money,
    pub meals: Money,
    pub utilities: Money,
    pub wages: Money,
    pub other_expenses: BTreeMap<String, Money>,
}

impl BusinessIncome {
    /// Amount of each Part II category, keyed like `BUSINESS_EXPENSES`.
    fn expense(&self, name: &str) -> Money {
        match name {
            "advertising" => self.advertising,
            "car_truck_expenses" => self.car_truck_expenses,
            "commissions_fees" => self.commissions_fees,
            "contract_labor" => self.contract_labor,
            "depreciation" => self.depreciation,
            "insurance" => self.insurance,
            "interest" => self.interest,
            "legal_professional" => self.legal_professional,
            "office_expense" => self.office_expense,
            "rent_lease" => self.rent_lease,
            "repairs_maintenance" => self.repairs_maintenance,
            "supplies" => self.supplies,
            "taxes_licenses" => self.taxes_licenses,
            "travel" => self.travel,
            "meals" => self.meals,
            "utilities" => self.utilities,
            "wages" => self.wages,
            _ => Money::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    pub educator_expenses: Money,
    pub spouse_educator_expenses: Money,
    pub student_loan_interest: Money,
}

/// One return's worth of taxpayer input, as delivered by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxReturnInput {
    pub filing_status: FilingStatus,
    #[serde(default)]
    pub taxpayer: TaxpayerInfo,
    #[serde(default)]
    pub dependents: Vec<Dependent>,
    #[serde(default)]
    pub w2: Vec<W2>,
    #[serde(default)]
    pub income_1099_int: Vec<Form1099Int>,
    #[serde(default)]
    pub income_1099_div: Vec<Form1099Div>,
    #[serde(default)]
    pub business_income: Option<BusinessIncome>,
    #[serde(default)]
    pub adjustments: Adjustments,
}

/// The variable-size parts of an input record. Forms are declared per shape,
/// so every return of one shape shares one compiled schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InputShape {
    pub w2: usize,
    pub interest: usize,
    pub dividends: usize,
    /// Names of the business's other expenses (Schedule C Part V).
    pub other_expenses: Vec<String>,
}

impl TaxReturnInput {
    pub fn new(filing_status: FilingStatus) -> Self {
        Self {
            filing_status,
            taxpayer: TaxpayerInfo::default(),
            dependents: Vec::new(),
            w2: Vec::new(),
            income_1099_int: Vec::new(),
            income_1099_div: Vec::new(),
            business_income: None,
            adjustments: Adjustments::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TaxError> {
        let input: Self = serde_json::from_str(json).map_err(|e| TaxError::InvalidInput(e.to_string()))?;
        input.validate()?;
        Ok(input)
    }

    pub fn shape(&self) -> InputShape {
        InputShape {
            w2: self.w2.len(),
            interest: self.income_1099_int.len(),
            dividends: self.income_1099_div.len(),
            other_expenses: self
                .business_income
                .as_ref()
                .map(|b| b.other_expenses.keys().cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Information-return amounts can't be negative, and no amount may exceed
    /// [`MAX_AMOUNT`] in magnitude.
    pub fn validate(&self) -> Result<(), TaxError> {
        let amounts = self
            .w2
            .iter()
            .flat_map(|w| [("W-2 wages", w.wages), ("W-2 withholding", w.federal_withholding)])
            .chain(self.income_1099_int.iter().map(|i| ("1099-INT interest", i.interest_income)))
            .chain(self.income_1099_div.iter().flat_map(|d| {
                [("1099-DIV ordinary dividends", d.ordinary_dividends), ("1099-DIV qualified dividends", d.qualified_dividends)]
            }))
            .chain([
                ("educator expenses", self.adjustments.educator_expenses),
                ("spouse educator expenses", self.adjustments.spouse_educator_expenses),
                ("student loan interest", self.adjustments.student_loan_interest),
            ]);
        for (what, amount) in amounts {
            if amount.is_negative() {
                return Err(TaxError::InvalidInput(format!("{} cannot be negative ({})", what, amount)));
            }
        }
        for (key, value) in self.raw_lines() {
            if let Value::Money(amount) = value {
                if amount.cents().unsigned_abs() > MAX_AMOUNT.cents().unsigned_abs() {
                    return Err(TaxError::InvalidInput(format!("{} of {} exceeds {}", key, amount, MAX_AMOUNT)));
                }
            }
        }
        Ok(())
    }

    /// Every raw line for this record. Absent optional data becomes zero.
    pub fn raw_lines(&self) -> Vec<(LineKey, Value)> {
        let senior = |age: Option<u32>| Value::Flag(age.is_some_and(|a| a >= SENIOR_AGE));
        let children = self.dependents.iter().filter(|d| d.qualifying_child).count() as u32;
        let business = self.business_income.clone().unwrap_or_default();

        let mut lines = vec![
            (FILING_STATUS, Value::Status(self.filing_status)),
            (TAXPAYER_65, senior(self.taxpayer.age)),
            (TAXPAYER_BLIND, Value::Flag(self.taxpayer.blind)),
            (SPOUSE_65, senior(self.taxpayer.spouse_age)),
            (SPOUSE_BLIND, Value::Flag(self.taxpayer.spouse_blind)),
            (QUALIFYING_CHILDREN, Value::Count(children)),
            (TAXPAYER_EDUCATOR, Value::Flag(self.taxpayer.educator)),
            (SPOUSE_EDUCATOR, Value::Flag(self.taxpayer.spouse_educator)),
            (EDUCATOR_PAID, self.adjustments.educator_expenses.into()),
            (SPOUSE_EDUCATOR_PAID, self.adjustments.spouse_educator_expenses.into()),
            (STUDENT_LOAN_INTEREST_PAID, self.adjustments.student_loan_interest.into()),
            (GROSS_RECEIPTS, business.gross_receipts.into()),
            (RETURNS_ALLOWANCES, business.returns_allowances.into()),
            (COST_OF_GOODS_SOLD, business.cost_of_goods_sold.into()),
            (BUSINESS_OTHER_INCOME, business.other_income.into()),
        ];
        lines.extend(BUSINESS_EXPENSES.iter().map(|&(name, _)| (business_expense(name), business.expense(name).into())));
        lines.extend(business.other_expenses.iter().map(|(name, &amount)| (other_business_expense(name), amount.into())));
        for (i, w2) in self.w2.iter().enumerate() {
            lines.push((w2_wages(i), w2.wages.into()));
            lines.push((w2_withholding(i), w2.federal_withholding.into()));
        }
        lines.extend(self.income_1099_int.iter().enumerate().map(|(i, f)| (interest(i), f.interest_income.into())));
        for (i, div) in self.income_1099_div.iter().enumerate() {
            lines.push((ordinary_dividends(i), div.ordinary_dividends.into()));
            lines.push((qualified_dividends(i), div.qualified_dividends.into()));
        }
        lines
    }

    /// Seeds the raw lines into a fresh ledger.
    pub fn seed(&self, ledger: &mut Ledger) -> Result<(), TaxError> {
        self.validate()?;
        for (key, value) in self.raw_lines() {
            ledger.seed(key, value)?;
        }
        Ok(())
    }
}
