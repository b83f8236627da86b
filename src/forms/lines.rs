//! Line keys of the standard form set and of the raw taxpayer input.
use crate::store::LineKey;

const fn key(form: &'static str, line: &'static str) -> LineKey { LineKey::from_static(form, line) }

// Taxpayer facts
pub const FILING_STATUS: LineKey = key("taxpayer", "filing_status");
pub const TAXPAYER_65: LineKey = key("taxpayer", "age_65_or_older");
pub const TAXPAYER_BLIND: LineKey = key("taxpayer", "blind");
pub const SPOUSE_65: LineKey = key("taxpayer", "spouse_65_or_older");
pub const SPOUSE_BLIND: LineKey = key("taxpayer", "spouse_blind");
pub const QUALIFYING_CHILDREN: LineKey = key("taxpayer", "qualifying_children");
pub const TAXPAYER_EDUCATOR: LineKey = key("taxpayer", "eligible_educator");
pub const SPOUSE_EDUCATOR: LineKey = key("taxpayer", "spouse_eligible_educator");

// Adjustment inputs
pub const EDUCATOR_PAID: LineKey = key("adjustments", "educator_expenses");
pub const SPOUSE_EDUCATOR_PAID: LineKey = key("adjustments", "spouse_educator_expenses");
pub const STUDENT_LOAN_INTEREST_PAID: LineKey = key("adjustments", "student_loan_interest");

// Business input
pub const GROSS_RECEIPTS: LineKey = key("business", "gross_receipts");
pub const RETURNS_ALLOWANCES: LineKey = key("business", "returns_allowances");
pub const COST_OF_GOODS_SOLD: LineKey = key("business", "cost_of_goods_sold");
pub const BUSINESS_OTHER_INCOME: LineKey = key("business", "other_income");

/// Schedule C Part II categories, in form order: (input line name, form line).
pub const BUSINESS_EXPENSES: [(&str, &str); 17] = [
    ("advertising", "8"),
    ("car_truck_expenses", "9"),
    ("commissions_fees", "10"),
    ("contract_labor", "11"),
    ("depreciation", "13"),
    ("insurance", "15"),
    ("interest", "16"),
    ("legal_professional", "17"),
    ("office_expense", "18"),
    ("rent_lease", "20"),
    ("repairs_maintenance", "21"),
    ("supplies", "22"),
    ("taxes_licenses", "23"),
    ("travel", "24a"),
    ("meals", "24b"),
    ("utilities", "25"),
    ("wages", "26"),
];

pub fn business_expense(name: &'static str) -> LineKey { key("business", name) }

pub fn other_business_expense(name: &str) -> LineKey { LineKey::new("business", format!("other.{}", name)) }

pub fn w2_wages(i: usize) -> LineKey { LineKey::new(format!("w2.{}", i), "box1") }
pub fn w2_withholding(i: usize) -> LineKey { LineKey::new(format!("w2.{}", i), "box2") }
pub fn interest(i: usize) -> LineKey { LineKey::new(format!("1099_int.{}", i), "box1") }
pub fn ordinary_dividends(i: usize) -> LineKey { LineKey::new(format!("1099_div.{}", i), "box1a") }
pub fn qualified_dividends(i: usize) -> LineKey { LineKey::new(format!("1099_div.{}", i), "box1b") }

// Schedule B
pub const SCHEDULE_B_INTEREST: LineKey = key("schedule_b", "2");
pub const SCHEDULE_B_TAXABLE_INTEREST: LineKey = key("schedule_b", "4");
pub const SCHEDULE_B_DIVIDENDS: LineKey = key("schedule_b", "6");

// Schedule C
pub const SCHEDULE_C_NET_RECEIPTS: LineKey = key("schedule_c", "3");
pub const SCHEDULE_C_GROSS_PROFIT: LineKey = key("schedule_c", "5");
pub const SCHEDULE_C_GROSS_INCOME: LineKey = key("schedule_c", "7");
pub const SCHEDULE_C_OTHER_EXPENSES: LineKey = key("schedule_c", "48");
pub const SCHEDULE_C_TOTAL_EXPENSES: LineKey = key("schedule_c", "28");
pub const SCHEDULE_C_NET_PROFIT: LineKey = key("schedule_c", "31");

// Schedule SE
pub const SCHEDULE_SE_NET_EARNINGS: LineKey = key("schedule_se", "4a");
pub const SCHEDULE_SE_TAX: LineKey = key("schedule_se", "12");
pub const SCHEDULE_SE_DEDUCTION: LineKey = key("schedule_se", "13");

// Schedule 1
pub const SCHEDULE_1_BUSINESS_INCOME: LineKey = key("schedule_1", "3");
pub const SCHEDULE_1_EXCESS_BUSINESS_LOSS: LineKey = key("schedule_1", "8p");
pub const SCHEDULE_1_ADDITIONAL_INCOME: LineKey = key("schedule_1", "10");
pub const SCHEDULE_1_EDUCATOR: LineKey = key("schedule_1", "11");
pub const SCHEDULE_1_SE_DEDUCTION: LineKey = key("schedule_1", "15");
pub const SCHEDULE_1_STUDENT_LOAN_MAGI: LineKey = key("schedule_1", "21.magi");
pub const SCHEDULE_1_STUDENT_LOAN: LineKey = key("schedule_1", "21");
pub const SCHEDULE_1_ADJUSTMENTS: LineKey = key("schedule_1", "26");

// Form 1040
pub const F1040_WAGES: LineKey = key("f1040", "1z");
pub const F1040_INTEREST: LineKey = key("f1040", "2b");
pub const F1040_DIVIDENDS: LineKey = key("f1040", "3b");
pub const F1040_ADDITIONAL_INCOME: LineKey = key("f1040", "8");
pub const F1040_TOTAL_INCOME: LineKey = key("f1040", "9");
pub const F1040_ADJUSTMENTS: LineKey = key("f1040", "10");
pub const F1040_AGI: LineKey = key("f1040", "11");
pub const F1040_DEDUCTION: LineKey = key("f1040", "12");
pub const F1040_TAXABLE_INCOME: LineKey = key("f1040", "15");
pub const F1040_TAX: LineKey = key("f1040", "16");
pub const F1040_CHILD_CREDIT: LineKey = key("f1040", "19");
pub const F1040_TAX_AFTER_CREDITS: LineKey = key("f1040", "22");
pub const F1040_OTHER_TAXES: LineKey = key("f1040", "23");
pub const F1040_TOTAL_TAX: LineKey = key("f1040", "24");
pub const F1040_W2_WITHHOLDING: LineKey = key("f1040", "25a");
pub const F1040_WITHHOLDING: LineKey = key("f1040", "25d");
pub const F1040_PAYMENTS: LineKey = key("f1040", "33");
pub const F1040_REFUND: LineKey = key("f1040", "34");
pub const F1040_AMOUNT_OWED: LineKey = key("f1040", "37");
