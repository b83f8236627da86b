use crate::error::TaxError;
use crate::rules::Formula;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

/// Identifier of a form module (a node of the dependency graph).
///
/// One paper form may be split across several nodes (a provisional and a final
/// pass), so this is deliberately distinct from the form part of a [`LineKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormId(Cow<'static, str>);

impl FormId {
    /// Producer recorded on raw taxpayer input.
    pub const INPUT: FormId = FormId::from_static("input");

    pub const fn from_static(id: &'static str) -> Self { Self(Cow::Borrowed(id)) }

    pub fn new(id: impl Into<String>) -> Self { Self(Cow::Owned(id.into())) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl Serialize for FormId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(&self.0) }
}

impl<'de> Deserialize<'de> for FormId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(FormId::new(String::deserialize(d)?))
    }
}

/// Address of a single line: `(form, line)`, case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    form: Cow<'static, str>,
    line: Cow<'static, str>,
}

impl LineKey {
    pub const fn from_static(form: &'static str, line: &'static str) -> Self {
        Self { form: Cow::Borrowed(form), line: Cow::Borrowed(line) }
    }

    pub fn new(form: impl Into<String>, line: impl Into<String>) -> Self {
        Self { form: Cow::Owned(form.into()), line: Cow::Owned(line.into()) }
    }

    pub fn form(&self) -> &str { &self.form }
    pub fn line(&self) -> &str { &self.line }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.form, self.line)
    }
}

impl FromStr for LineKey {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((form, line)) if !form.is_empty() && !line.is_empty() => Ok(LineKey::new(form, line)),
            _ => Err(TaxError::InvalidInput(format!("'{}' is not a 'form:line' key", s))),
        }
    }
}

impl Serialize for LineKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.collect_str(self) }
}

impl<'de> Deserialize<'de> for LineKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Rounds `n / d` to the nearest integer, halves away from zero. `d` must be positive.
pub(crate) fn div_round_half_up(n: i128, d: i128) -> i128 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    }
}

/// A fixed-point currency amount in cents.
///
/// All tax arithmetic runs on integers so that identical inputs give
/// bit-identical results; floats only appear when parsing external input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self { Self(cents) }
    pub const fn from_dollars(dollars: i64) -> Self { Self(dollars * 100) }

    pub fn cents(self) -> i64 { self.0 }
    pub fn is_negative(self) -> bool { self.0 < 0 }
    pub fn is_zero(self) -> bool { self.0 == 0 }

    /// Multiplies by a rate in basis points, rounding half-up to the cent.
    pub fn scale_bp(self, basis_points: u32) -> Money {
        let n = self.0 as i128 * basis_points as i128;
        Money(div_round_half_up(n, 10_000) as i64)
    }

    /// Rounds half-up to a whole currency unit.
    pub fn round_to_dollar(self) -> Money {
        Money(div_round_half_up(self.0 as i128, 100) as i64 * 100)
    }

    pub fn clamp_non_negative(self) -> Money { self.max(Money::ZERO) }

    pub fn checked_add(self, rhs: Money) -> Option<Money> { self.0.checked_add(rhs.0).map(Money) }
    pub fn checked_sub(self, rhs: Money) -> Option<Money> { self.0.checked_sub(rhs.0).map(Money) }
    pub fn checked_mul(self, n: i64) -> Option<Money> { self.0.checked_mul(n).map(Money) }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) { self.0 += rhs.0; }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money { Money(self.0 - rhs.0) }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money { Money(-self.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TaxError::InvalidInput(format!("'{}' is not a currency amount", s));
        let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != '$').collect();
        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_str()),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let dollars: i64 = whole.parse().map_err(|_| invalid())?;
        // Digits past the cent round half-up.
        let padded = format!("{:0<2}", frac);
        let (kept, rest) = padded.split_at(2);
        let mut cents: i64 = kept.parse().map_err(|_| invalid())?;
        if rest.starts_with(|c: char| c >= '5') {
            cents += 1;
        }
        let total = dollars.checked_mul(100).and_then(|d| d.checked_add(cents)).ok_or_else(invalid)?;
        Ok(Money(if negative { -total } else { total }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.collect_str(self) }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl<'de> Visitor<'de> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a currency amount as a number or decimal string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                v.checked_mul(100).map(Money).ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                i64::try_from(v).map_err(E::custom).and_then(|v| self.visit_i64(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                if !v.is_finite() {
                    return Err(E::custom("amount out of range"));
                }
                v.to_string().parse().map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                v.parse().map_err(E::custom)
            }
        }

        d.deserialize_any(MoneyVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
    #[serde(alias = "qualifying_widow")]
    QualifyingSurvivingSpouse,
}

impl FilingStatus {
    pub const ALL: [FilingStatus; 5] = [
        FilingStatus::Single,
        FilingStatus::MarriedFilingJointly,
        FilingStatus::MarriedFilingSeparately,
        FilingStatus::HeadOfHousehold,
        FilingStatus::QualifyingSurvivingSpouse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilingStatus::Single => "single",
            FilingStatus::MarriedFilingJointly => "married_filing_jointly",
            FilingStatus::MarriedFilingSeparately => "married_filing_separately",
            FilingStatus::HeadOfHousehold => "head_of_household",
            FilingStatus::QualifyingSurvivingSpouse => "qualifying_surviving_spouse",
        }
    }

    /// Statuses under which the spouse's age and blindness count toward the deduction.
    pub fn counts_spouse(&self) -> bool {
        matches!(self, FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse)
    }
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for FilingStatus {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "qualifying_widow" => Ok(FilingStatus::QualifyingSurvivingSpouse),
            other => FilingStatus::ALL
                .into_iter()
                .find(|status| status.as_str() == other)
                .ok_or_else(|| TaxError::InvalidInput(format!("Invalid filing status: '{}'", s))),
        }
    }
}

/// The value bound to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Money(Money),
    Status(FilingStatus),
    Flag(bool),
    Count(u32),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Money(_) => "money",
            Value::Status(_) => "status",
            Value::Flag(_) => "flag",
            Value::Count(_) => "count",
        }
    }

    pub fn as_money(&self, key: &LineKey) -> Result<Money, TaxError> {
        match self {
            Value::Money(m) => Ok(*m),
            other => Err(Self::mismatch(key, "money", other)),
        }
    }

    pub fn as_status(&self, key: &LineKey) -> Result<FilingStatus, TaxError> {
        match self {
            Value::Status(s) => Ok(*s),
            other => Err(Self::mismatch(key, "status", other)),
        }
    }

    pub fn as_flag(&self, key: &LineKey) -> Result<bool, TaxError> {
        match self {
            Value::Flag(b) => Ok(*b),
            other => Err(Self::mismatch(key, "flag", other)),
        }
    }

    pub fn as_count(&self, key: &LineKey) -> Result<u32, TaxError> {
        match self {
            Value::Count(n) => Ok(*n),
            other => Err(Self::mismatch(key, "count", other)),
        }
    }

    fn mismatch(key: &LineKey, expected: &'static str, actual: &Value) -> TaxError {
        TaxError::TypeMismatch { key: key.clone(), expected, actual: actual.kind_name() }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Money(m) => write!(f, "{}", m),
            Value::Status(s) => write!(f, "{}", s),
            Value::Flag(b) => write!(f, "{}", b),
            Value::Count(n) => write!(f, "{}", n),
        }
    }
}

impl From<Money> for Value {
    fn from(m: Money) -> Self { Value::Money(m) }
}

/// How a line value came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    RawInput,
    RuleComputed,
    AgentDerived,
}

/// Audit metadata attached to every ledger value.
///
/// Only raw-input provenance can be built outside the crate; computed and
/// agent-derived provenance is minted by the form output builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    producer: FormId,
    derivation: Derivation,
    #[serde(skip_serializing_if = "Option::is_none")]
    formula: Option<Formula>,
}

impl Provenance {
    pub fn raw_input() -> Self {
        Self { producer: FormId::INPUT, derivation: Derivation::RawInput, formula: None }
    }

    pub(crate) fn computed(producer: FormId, formula: Formula) -> Self {
        Self { producer, derivation: Derivation::RuleComputed, formula: Some(formula) }
    }

    pub(crate) fn agent(producer: FormId, formula: Option<Formula>) -> Self {
        Self { producer, derivation: Derivation::AgentDerived, formula }
    }

    pub fn producer(&self) -> &FormId { &self.producer }
    pub fn derivation(&self) -> Derivation { self.derivation }
    /// The formula the verifier replays for this line, if any.
    pub fn formula(&self) -> Option<&Formula> { self.formula.as_ref() }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineValue {
    value: Value,
    provenance: Provenance,
}

impl LineValue {
    pub fn raw(value: impl Into<Value>) -> Self {
        Self { value: value.into(), provenance: Provenance::raw_input() }
    }

    pub(crate) fn with_provenance(value: Value, provenance: Provenance) -> Self {
        Self { value, provenance }
    }

    pub fn value(&self) -> &Value { &self.value }
    pub fn provenance(&self) -> &Provenance { &self.provenance }
}
