//! The closed set of supported forms.
//!
//! Form 1040 and Schedule 1 each appear as two nodes. Student loan interest
//! on Schedule 1 phases out on income that Form 1040 totals, so the 1040
//! income section runs first (`f1040.income`), the dependent adjustment runs
//! next (`schedule_1.adjustments`), and the rest of the 1040 runs last.
use super::contract::{FormModule, LedgerView, LineSet};
use super::lines::*;
use crate::error::TaxError;
use crate::graph::FormNode;
use crate::input::InputShape;
use crate::rules::{Composite, Rule};
use crate::store::{FormId, LineKey, Money};
use crate::validation::Check;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    ScheduleB,
    ScheduleC,
    ScheduleSe,
    Schedule1,
    Form1040Income,
    Schedule1Adjustments,
    Form1040,
}

impl FormKind {
    /// Declaration order, which is also the tie-break order within a stage.
    pub const ALL: [FormKind; 7] = [
        FormKind::ScheduleB,
        FormKind::ScheduleC,
        FormKind::ScheduleSe,
        FormKind::Schedule1,
        FormKind::Form1040Income,
        FormKind::Schedule1Adjustments,
        FormKind::Form1040,
    ];

    pub fn id(&self) -> FormId {
        FormId::from_static(match self {
            FormKind::ScheduleB => "schedule_b",
            FormKind::ScheduleC => "schedule_c",
            FormKind::ScheduleSe => "schedule_se",
            FormKind::Schedule1 => "schedule_1",
            FormKind::Form1040Income => "f1040.income",
            FormKind::Schedule1Adjustments => "schedule_1.adjustments",
            FormKind::Form1040 => "f1040",
        })
    }
}

/// A form module of the standard set, with its node built for one input shape.
#[derive(Debug, Clone)]
pub struct Form {
    kind: FormKind,
    node: FormNode,
}

impl Form {
    pub fn new(kind: FormKind, shape: &InputShape) -> Self {
        let node = match kind {
            FormKind::ScheduleB => schedule_b_node(shape),
            FormKind::ScheduleC => schedule_c_node(shape),
            FormKind::ScheduleSe => schedule_se_node(),
            FormKind::Schedule1 => schedule_1_node(),
            FormKind::Form1040Income => f1040_income_node(shape),
            FormKind::Schedule1Adjustments => schedule_1_adjustments_node(),
            FormKind::Form1040 => f1040_node(shape),
        };
        Self { kind, node }
    }

    pub fn kind(&self) -> FormKind { self.kind }
}

/// Every standard form, in declaration order.
pub fn standard_forms(shape: &InputShape) -> Vec<Form> {
    FormKind::ALL.iter().map(|&kind| Form::new(kind, shape)).collect()
}

/// Cross-line consistency checks over the standard lines.
pub fn standard_checks() -> Vec<Check> {
    vec![
        Check::MutuallyExclusive { first: F1040_REFUND, second: F1040_AMOUNT_OWED },
        Check::NonNegative { key: F1040_TAXABLE_INCOME },
        Check::Ceiling { key: F1040_AGI, limit: Money::from_dollars(1_000_000) },
        Check::TaxOnIncome { income: F1040_TAXABLE_INCOME, tax: F1040_TAX },
    ]
}

fn schedule_b_node(shape: &InputShape) -> FormNode {
    FormNode::new(FormKind::ScheduleB.id())
        .composite(SCHEDULE_B_INTEREST, Composite::sum((0..shape.interest).map(interest)))
        .composite(SCHEDULE_B_TAXABLE_INTEREST, Composite::sum([SCHEDULE_B_INTEREST]))
        .composite(SCHEDULE_B_DIVIDENDS, Composite::sum((0..shape.dividends).map(ordinary_dividends)))
}

fn schedule_c_node(shape: &InputShape) -> FormNode {
    let expenses = BUSINESS_EXPENSES
        .iter()
        .map(|&(name, _)| business_expense(name))
        .chain([SCHEDULE_C_OTHER_EXPENSES]);
    FormNode::new(FormKind::ScheduleC.id())
        .composite(SCHEDULE_C_NET_RECEIPTS, Composite::sum([GROSS_RECEIPTS]).minus([RETURNS_ALLOWANCES]))
        .composite(SCHEDULE_C_GROSS_PROFIT, Composite::sum([SCHEDULE_C_NET_RECEIPTS]).minus([COST_OF_GOODS_SOLD]))
        .composite(SCHEDULE_C_GROSS_INCOME, Composite::sum([SCHEDULE_C_GROSS_PROFIT, BUSINESS_OTHER_INCOME]))
        .composite(
            SCHEDULE_C_OTHER_EXPENSES,
            Composite::sum(shape.other_expenses.iter().map(|name| other_business_expense(name))),
        )
        .composite(SCHEDULE_C_TOTAL_EXPENSES, Composite::sum(expenses))
        .composite(SCHEDULE_C_NET_PROFIT, Composite::sum([SCHEDULE_C_GROSS_INCOME]).minus([SCHEDULE_C_TOTAL_EXPENSES]))
}

fn schedule_se_node() -> FormNode {
    FormNode::new(FormKind::ScheduleSe.id())
        .rule(SCHEDULE_SE_NET_EARNINGS, Rule::SelfEmploymentNetEarnings, [SCHEDULE_C_NET_PROFIT])
        .rule(SCHEDULE_SE_TAX, Rule::SelfEmploymentTax, [SCHEDULE_C_NET_PROFIT])
        .rule(SCHEDULE_SE_DEDUCTION, Rule::SelfEmploymentDeduction, [SCHEDULE_C_NET_PROFIT])
}

fn schedule_1_node() -> FormNode {
    FormNode::new(FormKind::Schedule1.id())
        .composite(SCHEDULE_1_BUSINESS_INCOME, Composite::sum([SCHEDULE_C_NET_PROFIT]))
        .rule(SCHEDULE_1_EXCESS_BUSINESS_LOSS, Rule::ExcessBusinessLoss, [SCHEDULE_C_NET_PROFIT, FILING_STATUS])
        .composite(
            SCHEDULE_1_ADDITIONAL_INCOME,
            Composite::sum([SCHEDULE_1_BUSINESS_INCOME, SCHEDULE_1_EXCESS_BUSINESS_LOSS]),
        )
        .rule(
            SCHEDULE_1_EDUCATOR,
            Rule::EducatorExpense,
            [EDUCATOR_PAID, TAXPAYER_EDUCATOR, SPOUSE_EDUCATOR_PAID, SPOUSE_EDUCATOR, FILING_STATUS],
        )
        .composite(SCHEDULE_1_SE_DEDUCTION, Composite::sum([SCHEDULE_SE_DEDUCTION]))
}

fn f1040_income_node(shape: &InputShape) -> FormNode {
    FormNode::new(FormKind::Form1040Income.id())
        .composite(F1040_WAGES, Composite::sum((0..shape.w2).map(w2_wages)))
        .composite(F1040_INTEREST, Composite::sum([SCHEDULE_B_TAXABLE_INTEREST]))
        .composite(F1040_DIVIDENDS, Composite::sum([SCHEDULE_B_DIVIDENDS]))
        .composite(F1040_ADDITIONAL_INCOME, Composite::sum([SCHEDULE_1_ADDITIONAL_INCOME]))
        .composite(
            F1040_TOTAL_INCOME,
            Composite::sum([F1040_WAGES, F1040_INTEREST, F1040_DIVIDENDS, F1040_ADDITIONAL_INCOME]),
        )
}

fn schedule_1_adjustments_node() -> FormNode {
    FormNode::new(FormKind::Schedule1Adjustments.id())
        .composite(
            SCHEDULE_1_STUDENT_LOAN_MAGI,
            Composite::sum([F1040_TOTAL_INCOME]).minus([SCHEDULE_1_EDUCATOR, SCHEDULE_1_SE_DEDUCTION]),
        )
        .rule(
            SCHEDULE_1_STUDENT_LOAN,
            Rule::StudentLoanInterest,
            [STUDENT_LOAN_INTEREST_PAID, SCHEDULE_1_STUDENT_LOAN_MAGI, FILING_STATUS],
        )
        .composite(
            SCHEDULE_1_ADJUSTMENTS,
            Composite::sum([SCHEDULE_1_EDUCATOR, SCHEDULE_1_SE_DEDUCTION, SCHEDULE_1_STUDENT_LOAN]),
        )
}

fn f1040_node(shape: &InputShape) -> FormNode {
    FormNode::new(FormKind::Form1040.id())
        .composite(F1040_ADJUSTMENTS, Composite::sum([SCHEDULE_1_ADJUSTMENTS]))
        .composite(F1040_AGI, Composite::sum([F1040_TOTAL_INCOME]).minus([F1040_ADJUSTMENTS]))
        .rule(
            F1040_DEDUCTION,
            Rule::StandardDeduction,
            [FILING_STATUS, TAXPAYER_65, TAXPAYER_BLIND, SPOUSE_65, SPOUSE_BLIND],
        )
        .composite(F1040_TAXABLE_INCOME, Composite::sum([F1040_AGI]).minus([F1040_DEDUCTION]).floored())
        .rule(F1040_TAX, Rule::BracketTax, [F1040_TAXABLE_INCOME, FILING_STATUS])
        .rule(F1040_CHILD_CREDIT, Rule::ChildTaxCredit, [QUALIFYING_CHILDREN, F1040_TAX])
        .composite(F1040_TAX_AFTER_CREDITS, Composite::sum([F1040_TAX]).minus([F1040_CHILD_CREDIT]).floored())
        .composite(F1040_OTHER_TAXES, Composite::sum([SCHEDULE_SE_TAX]))
        .composite(F1040_TOTAL_TAX, Composite::sum([F1040_TAX_AFTER_CREDITS, F1040_OTHER_TAXES]))
        .composite(F1040_W2_WITHHOLDING, Composite::sum((0..shape.w2).map(w2_withholding)))
        .composite(F1040_WITHHOLDING, Composite::sum([F1040_W2_WITHHOLDING]))
        .composite(F1040_PAYMENTS, Composite::sum([F1040_WITHHOLDING]))
        .composite(F1040_REFUND, Composite::sum([F1040_PAYMENTS]).minus([F1040_TOTAL_TAX]).floored())
        .composite(F1040_AMOUNT_OWED, Composite::sum([F1040_TOTAL_TAX]).minus([F1040_PAYMENTS]).floored())
}

impl FormModule for Form {
    fn node(&self) -> &FormNode { &self.node }

    fn process(&self, view: &LedgerView<'_>) -> Result<LineSet, TaxError> {
        let mut out = view.output();
        match self.kind {
            FormKind::ScheduleB => {
                // Aggregating the 1099s is delegated; line 4 has no exclusions.
                out.reason(&SCHEDULE_B_INTEREST)?;
                out.compute(&SCHEDULE_B_TAXABLE_INTEREST)?;
                out.reason(&SCHEDULE_B_DIVIDENDS)?;
            }
            FormKind::ScheduleC => {
                out.compute_all(&[
                    SCHEDULE_C_NET_RECEIPTS,
                    SCHEDULE_C_GROSS_PROFIT,
                    SCHEDULE_C_GROSS_INCOME,
                    SCHEDULE_C_OTHER_EXPENSES,
                ])?;
                out.reason(&SCHEDULE_C_TOTAL_EXPENSES)?;
                out.compute(&SCHEDULE_C_NET_PROFIT)?;
            }
            FormKind::ScheduleSe => {
                out.compute_all(&[SCHEDULE_SE_NET_EARNINGS, SCHEDULE_SE_TAX, SCHEDULE_SE_DEDUCTION])?;
            }
            FormKind::Schedule1 => {
                out.compute_all(&[
                    SCHEDULE_1_BUSINESS_INCOME,
                    SCHEDULE_1_EXCESS_BUSINESS_LOSS,
                    SCHEDULE_1_ADDITIONAL_INCOME,
                    SCHEDULE_1_EDUCATOR,
                    SCHEDULE_1_SE_DEDUCTION,
                ])?;
            }
            FormKind::Form1040Income => {
                out.reason(&F1040_WAGES)?;
                out.compute_all(&[F1040_INTEREST, F1040_DIVIDENDS, F1040_ADDITIONAL_INCOME, F1040_TOTAL_INCOME])?;
            }
            FormKind::Schedule1Adjustments => {
                out.compute_all(&[SCHEDULE_1_STUDENT_LOAN_MAGI, SCHEDULE_1_STUDENT_LOAN, SCHEDULE_1_ADJUSTMENTS])?;
            }
            FormKind::Form1040 => {
                out.compute_all(&[
                    F1040_ADJUSTMENTS,
                    F1040_AGI,
                    F1040_DEDUCTION,
                    F1040_TAXABLE_INCOME,
                    F1040_TAX,
                    F1040_CHILD_CREDIT,
                    F1040_TAX_AFTER_CREDITS,
                    F1040_OTHER_TAXES,
                    F1040_TOTAL_TAX,
                ])?;
                out.reason(&F1040_W2_WITHHOLDING)?;
                out.compute_all(&[F1040_WITHHOLDING, F1040_PAYMENTS, F1040_REFUND, F1040_AMOUNT_OWED])?;
            }
        }
        out.finish()
    }
}

/// Raw lines the standard forms expect to be seeded for `shape`.
pub fn raw_input_keys(shape: &InputShape) -> Vec<LineKey> {
    let mut keys = vec![
        FILING_STATUS,
        TAXPAYER_65,
        TAXPAYER_BLIND,
        SPOUSE_65,
        SPOUSE_BLIND,
        QUALIFYING_CHILDREN,
        TAXPAYER_EDUCATOR,
        SPOUSE_EDUCATOR,
        EDUCATOR_PAID,
        SPOUSE_EDUCATOR_PAID,
        STUDENT_LOAN_INTEREST_PAID,
        GROSS_RECEIPTS,
        RETURNS_ALLOWANCES,
        COST_OF_GOODS_SOLD,
        BUSINESS_OTHER_INCOME,
    ];
    keys.extend(BUSINESS_EXPENSES.iter().map(|&(name, _)| business_expense(name)));
    keys.extend(shape.other_expenses.iter().map(|name| other_business_expense(name)));
    for i in 0..shape.w2 {
        keys.push(w2_wages(i));
        keys.push(w2_withholding(i));
    }
    keys.extend((0..shape.interest).map(interest));
    for i in 0..shape.dividends {
        keys.push(ordinary_dividends(i));
        keys.push(qualified_dividends(i));
    }
    keys
}
