use crate::error::TaxError;
use crate::store::{LineKey, LineValue, Value};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Read access to bound lines. Implemented by the ledger, its snapshots and
/// the per-form view, so formulas evaluate the same way everywhere.
pub trait LineSource {
    fn line(&self, key: &LineKey) -> Result<&LineValue, TaxError>;

    fn value(&self, key: &LineKey) -> Result<&Value, TaxError> {
        Ok(self.line(key)?.value())
    }
}

/// One append-only write. `seq` orders all writes of a run; `stage` is the
/// topological stage that produced it (`None` for seeded input).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub stage: Option<usize>,
    pub key: LineKey,
    pub value: LineValue,
}

#[derive(Debug, Clone, Default)]
struct Journal {
    entries: Vec<LedgerEntry>,
    index: HashMap<LineKey, usize>,
}

impl Journal {
    fn get(&self, key: &LineKey) -> Result<&LineValue, TaxError> {
        self.index
            .get(key)
            .map(|&i| &self.entries[i].value)
            .ok_or_else(|| TaxError::MissingLine { key: key.clone() })
    }

    fn prefix(&self, seq: u64) -> Journal {
        let entries: Vec<LedgerEntry> = self.entries.iter().take_while(|e| e.seq <= seq).cloned().collect();
        let index = entries.iter().enumerate().map(|(i, e)| (e.key.clone(), i)).collect();
        Journal { entries, index }
    }
}

/// The per-run store of line values. Every key is written at most once.
#[derive(Debug, Default)]
pub struct Ledger {
    journal: Journal,
    stage: Option<usize>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &LineKey) -> Result<&LineValue, TaxError> { self.journal.get(key) }

    pub fn contains(&self, key: &LineKey) -> bool { self.journal.index.contains_key(key) }

    /// Binds `key` to `value`, failing if the key is already bound this run.
    pub fn put(&mut self, key: LineKey, value: LineValue) -> Result<u64, TaxError> {
        if self.journal.index.contains_key(&key) {
            return Err(TaxError::DuplicateWrite { key, producer: value.provenance().producer().clone() });
        }
        let seq = self.journal.entries.len() as u64;
        tracing::trace!(seq, stage = ?self.stage, key = %key, value = %value.value(), "Ledger write");
        self.journal.index.insert(key.clone(), self.journal.entries.len());
        self.journal.entries.push(LedgerEntry { seq, stage: self.stage, key, value });
        Ok(seq)
    }

    /// Seeds raw taxpayer input.
    pub fn seed(&mut self, key: LineKey, value: impl Into<Value>) -> Result<u64, TaxError> {
        self.put(key, LineValue::raw(value))
    }

    /// Tags subsequent writes with the stage index.
    pub fn begin_stage(&mut self, stage: usize) { self.stage = Some(stage); }

    pub fn entries(&self) -> &[LedgerEntry] { &self.journal.entries }
    pub fn len(&self) -> usize { self.journal.entries.len() }
    pub fn is_empty(&self) -> bool { self.journal.entries.is_empty() }

    /// Immutable copy of everything written so far.
    pub fn snapshot(&self) -> LedgerSnapshot { LedgerSnapshot { journal: Arc::new(self.journal.clone()) } }

    /// What was known once the write numbered `seq` had landed.
    pub fn as_of(&self, seq: u64) -> LedgerSnapshot { LedgerSnapshot { journal: Arc::new(self.journal.prefix(seq)) } }

    pub fn into_snapshot(self) -> LedgerSnapshot { LedgerSnapshot { journal: Arc::new(self.journal) } }
}

impl LineSource for Ledger {
    fn line(&self, key: &LineKey) -> Result<&LineValue, TaxError> { self.get(key) }
}

/// A frozen ledger, cheap to clone and share between threads.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    journal: Arc<Journal>,
}

impl LedgerSnapshot {
    pub fn get(&self, key: &LineKey) -> Result<&LineValue, TaxError> { self.journal.get(key) }
    pub fn entries(&self) -> &[LedgerEntry] { &self.journal.entries }
    pub fn len(&self) -> usize { self.journal.entries.len() }
    pub fn is_empty(&self) -> bool { self.journal.entries.is_empty() }

    pub fn entry(&self, key: &LineKey) -> Option<&LedgerEntry> {
        self.journal.index.get(key).map(|&i| &self.journal.entries[i])
    }

    pub fn as_of(&self, seq: u64) -> LedgerSnapshot { LedgerSnapshot { journal: Arc::new(self.journal.prefix(seq)) } }

    /// Entries whose key belongs to the paper form `form`, in write order.
    pub fn form_lines<'a>(&'a self, form: &'a str) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.journal.entries.iter().filter(move |e| e.key.form() == form)
    }
}

impl LineSource for LedgerSnapshot {
    fn line(&self, key: &LineKey) -> Result<&LineValue, TaxError> { self.get(key) }
}

impl Serialize for LedgerSnapshot {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { self.journal.entries.serialize(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FormId, Money};

    const WAGES: LineKey = LineKey::from_static("w2.0", "box1");
    const WITHHELD: LineKey = LineKey::from_static("w2.0", "box2");

    #[test]
    fn test_put_get_and_missing() {
        let mut ledger = Ledger::new();
        ledger.seed(WAGES, Money::from_dollars(50_000)).unwrap();
        assert_eq!(ledger.value(&WAGES).unwrap(), &Value::Money(Money::from_dollars(50_000)));
        assert_eq!(ledger.get(&WITHHELD).unwrap_err(), TaxError::MissingLine { key: WITHHELD });
    }

    #[test]
    fn test_write_once() {
        let mut ledger = Ledger::new();
        ledger.seed(WAGES, Money::from_dollars(50_000)).unwrap();
        let err = ledger.seed(WAGES, Money::from_dollars(1)).unwrap_err();
        assert_eq!(err, TaxError::DuplicateWrite { key: WAGES, producer: FormId::INPUT });
        // The first value survives.
        assert_eq!(ledger.value(&WAGES).unwrap(), &Value::Money(Money::from_dollars(50_000)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_journal_order_and_stage_tags() {
        let mut ledger = Ledger::new();
        ledger.seed(WAGES, Money::from_dollars(50_000)).unwrap();
        ledger.begin_stage(0);
        let seq = ledger.seed(WITHHELD, Money::from_dollars(5_000)).unwrap();
        assert_eq!(seq, 1);

        let stages: Vec<_> = ledger.entries().iter().map(|e| (e.seq, e.stage)).collect();
        assert_eq!(stages, vec![(0, None), (1, Some(0))]);
    }

    #[test]
    fn test_snapshot_is_isolated_and_as_of_rewinds() {
        let mut ledger = Ledger::new();
        ledger.seed(WAGES, Money::from_dollars(50_000)).unwrap();
        let before = ledger.snapshot();
        ledger.seed(WITHHELD, Money::from_dollars(5_000)).unwrap();

        assert!(before.get(&WITHHELD).is_err());
        let full = ledger.snapshot();
        assert_eq!(full.len(), 2);
        let rewound = full.as_of(0);
        assert!(rewound.get(&WAGES).is_ok());
        assert!(rewound.get(&WITHHELD).is_err());
        assert_eq!(ledger.as_of(1).len(), 2);
    }

    #[test]
    fn test_form_lines_and_serialization() {
        let mut ledger = Ledger::new();
        ledger.seed(WAGES, Money::from_dollars(50_000)).unwrap();
        ledger.seed(LineKey::from_static("taxpayer", "blind"), Value::Flag(false)).unwrap();
        let snapshot = ledger.into_snapshot();
        assert_eq!(snapshot.form_lines("w2.0").count(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json[0]["key"], "w2.0:box1");
        assert_eq!(json[0]["value"]["value"]["value"], "50000.00");
        assert_eq!(json[0]["value"]["provenance"]["derivation"], "raw_input");
    }
}
