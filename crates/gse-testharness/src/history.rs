//! ---
//! gse_section: "11-test-harness"
//! gse_subsection: "01-engine"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Append-only telemetry and event history with selector queries."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::fmt::{self, Write as _};

use chrono::{DateTime, Utc};
use gse_msg::Value;
use indexmap::IndexMap;
use serde::Serialize;

use crate::compare::{Expected, Op};
use crate::engine::Verdict;
use crate::error::HarnessError;

/// Per-record filter applied before counting.
pub type Filter<'a> = &'a (dyn Fn(&Value) -> bool + Sync);

/// Kind of record kept in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Event,
    Telemetry,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Event => "EVR",
            Category::Telemetry => "TLM",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which records of a query a value assertion must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selector {
    /// Every matching record.
    #[default]
    All,
    /// At least one matching record.
    Any,
    /// The nth matching record in arrival order, 0-based.
    At(usize),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::Any => f.write_str("any"),
            Selector::At(index) => write!(f, "index {}", index),
        }
    }
}

/// A resolved item stored in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    pub value: Value,
    /// Arrival order across both categories.
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Store {
    records: Vec<Record>,
    by_name: IndexMap<String, Vec<usize>>,
}

impl Store {
    fn push(&mut self, record: Record) {
        let position = self.records.len();
        self.by_name
            .entry(record.name.clone())
            .or_default()
            .push(position);
        self.records.push(record);
    }

    fn clear(&mut self) {
        self.records.clear();
        self.by_name.clear();
    }

    fn select<'a>(&'a self, name: Option<&str>) -> Vec<&'a Record> {
        match name {
            None => self.records.iter().collect(),
            Some(name) => self
                .by_name
                .get(name)
                .map(|positions| positions.iter().map(|&idx| &self.records[idx]).collect())
                .unwrap_or_default(),
        }
    }
}

/// Append-only store of resolved telemetry and events.
///
/// Records are grouped by mnemonic; order within a mnemonic is arrival
/// order. Unnamed queries see every record of the category in arrival order.
#[derive(Debug, Default)]
pub struct History {
    events: Store,
    telemetry: Store,
    next_sequence: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, category: Category) -> &Store {
        match category {
            Category::Event => &self.events,
            Category::Telemetry => &self.telemetry,
        }
    }

    /// Append one resolved record.
    pub fn push(&mut self, category: Category, name: impl Into<String>, value: Value) {
        let record = Record {
            name: name.into(),
            value,
            sequence: self.next_sequence,
            received_at: Utc::now(),
        };
        self.next_sequence += 1;
        match category {
            Category::Event => self.events.push(record),
            Category::Telemetry => self.telemetry.push(record),
        }
    }

    /// Append resolved events, then resolved telemetry.
    pub fn add<E, T>(&mut self, events: E, telemetry: T)
    where
        E: IntoIterator<Item = (String, Value)>,
        T: IntoIterator<Item = (String, Value)>,
    {
        for (name, value) in events {
            self.push(Category::Event, name, value);
        }
        for (name, value) in telemetry {
            self.push(Category::Telemetry, name, value);
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.telemetry.clear();
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn clear_telemetry(&mut self) {
        self.telemetry.clear();
    }

    pub fn len(&self, category: Category) -> usize {
        self.store(category).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.records.is_empty() && self.telemetry.records.is_empty()
    }

    /// Records of a category, optionally restricted to one mnemonic.
    pub fn records(&self, category: Category, name: Option<&str>) -> Vec<&Record> {
        self.store(category).select(name)
    }

    /// Number of records, counting only those accepted by `filter` if given.
    pub fn size_of(&self, category: Category, name: Option<&str>, filter: Option<Filter<'_>>) -> usize {
        let records = self.records(category, name);
        match filter {
            Some(filter) => records.iter().filter(|record| filter(&record.value)).count(),
            None => records.len(),
        }
    }

    /// Values picked by `selector`. `All` and `Any` both return every match.
    pub fn values(
        &self,
        category: Category,
        name: Option<&str>,
        selector: Selector,
    ) -> Result<Vec<&Value>, HarnessError> {
        let records = self.records(category, name);
        match selector {
            Selector::All | Selector::Any => Ok(records.into_iter().map(|r| &r.value).collect()),
            Selector::At(index) => records
                .get(index)
                .map(|record| vec![&record.value])
                .ok_or_else(|| out_of_range(category, name, index, records.len())),
        }
    }

    /// Check the record count against `size` with `op`.
    pub fn size_check(
        &self,
        category: Category,
        size: usize,
        name: Option<&str>,
        filter: Option<Filter<'_>>,
        op: Op,
    ) -> Verdict {
        let actual = self.size_of(category, name, filter);
        if op.holds_for_count(actual, size) {
            return Verdict::Satisfied;
        }
        Verdict::Pending(format!(
            "{} size of {}{}: expected {} {}, found {}",
            category,
            describe(name),
            if filter.is_some() { " (filtered)" } else { "" },
            op,
            size,
            actual
        ))
    }

    /// Check recorded values against `expected` with `op` under `selector`.
    ///
    /// An empty match set never passes. An out-of-range `At(n)` is an error,
    /// not a pending verdict.
    pub fn value_check(
        &self,
        category: Category,
        expected: &Expected,
        name: Option<&str>,
        selector: Selector,
        op: Op,
    ) -> Result<Verdict, HarnessError> {
        let records = self.records(category, name);
        if records.is_empty() {
            if let Selector::At(index) = selector {
                return Err(out_of_range(category, name, index, 0));
            }
            return Ok(Verdict::Pending(format!(
                "{} value of {}: expected {} {} ({}), but no records were received",
                category,
                describe(name),
                op,
                expected,
                selector
            )));
        }

        let passed = match selector {
            Selector::All => records.iter().all(|r| expected.matches(op, &r.value)),
            Selector::Any => records.iter().any(|r| expected.matches(op, &r.value)),
            Selector::At(index) => {
                let record = records
                    .get(index)
                    .ok_or_else(|| out_of_range(category, name, index, records.len()))?;
                expected.matches(op, &record.value)
            }
        };
        if passed {
            return Ok(Verdict::Satisfied);
        }

        let observed = match selector {
            Selector::At(index) => records[index].value.to_string(),
            _ => records
                .iter()
                .map(|r| r.value.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        };
        Ok(Verdict::Pending(format!(
            "{} value of {}: expected {} {} ({}), observed [{}]",
            category,
            describe(name),
            op,
            expected,
            selector,
            observed
        )))
    }

    /// Render one category, grouped by mnemonic.
    pub fn print(&self, category: Category) -> String {
        let store = self.store(category);
        let mut out = format!("{} history ({} records):\n", category, store.records.len());
        if store.records.is_empty() {
            out.push_str("  <empty>\n");
        }
        for (name, positions) in &store.by_name {
            let _ = writeln!(out, "  {} ({}):", name, positions.len());
            for (nth, &position) in positions.iter().enumerate() {
                let record = &store.records[position];
                let _ = writeln!(
                    out,
                    "    [{}] #{} {} {}",
                    nth,
                    record.sequence,
                    record.received_at.format("%H:%M:%S%.3f"),
                    record.value
                );
            }
        }
        out
    }

    /// Render both categories for failure diagnostics.
    pub fn pretty_print(&self) -> String {
        format!(
            "{}\n{}",
            self.print(Category::Event),
            self.print(Category::Telemetry)
        )
    }
}

fn describe(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("'{}'", name),
        None => "all records".to_owned(),
    }
}

fn out_of_range(category: Category, name: Option<&str>, index: usize, len: usize) -> HarnessError {
    HarnessError::SelectorOutOfRange {
        category,
        name: name.unwrap_or("*").to_owned(),
        index,
        len,
    }
}
