//! Per-type tuple counts and console progress reporting.

use crate::emitter::Listener;
use crate::error::Result;
use crate::tuple::Attributes;
use crate::value::{AttributeValue, RecordId};
use std::any::Any;
use std::collections::BTreeMap;
use std::io::Write;

/// Attributes tried, in order, to describe a tuple in verbose output.
const DESCRIPTIVE_ATTRIBUTES: [&str; 5] = ["name", "login", "email", "number", "title"];

/// Number of tuples written or fed per type name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    counts: BTreeMap<String, usize>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, type_name: &str) {
        *self.counts.entry(type_name.to_string()).or_insert(0) += 1;
    }

    pub fn set(&mut self, type_name: impl Into<String>, count: usize) {
        self.counts.insert(type_name.into(), count);
    }

    /// Count for one type; zero when the type was never seen
    pub fn get(&self, type_name: &str) -> usize {
        self.counts.get(type_name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate `(type name, count)` pairs sorted by type name
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// How much a [`Status`] listener writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Nothing at all.
    Quiet,
    /// A single rewritten progress line, then totals.
    #[default]
    Normal,
    /// One line per tuple, then totals.
    Verbose,
}

/// Listener that reports dump or load progress to a writer.
///
/// `prefix` names the activity ("dump", "load") and is used for both the
/// progress line (`==> dumping: 12 objects`) and the summary
/// (`==> dumped 12 total objects:`).
pub struct Status<W: Write> {
    out: W,
    prefix: String,
    verbosity: Verbosity,
    count: usize,
}

impl<W: Write> Status<W> {
    pub fn new(out: W, prefix: impl Into<String>, verbosity: Verbosity) -> Self {
        Self {
            out,
            prefix: prefix.into(),
            verbosity,
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn describe(id: &RecordId, attributes: &Attributes) -> String {
        DESCRIPTIVE_ATTRIBUTES
            .iter()
            .find_map(|name| attributes.get(*name))
            .map(|value| match value {
                AttributeValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| id.to_string())
    }

    fn write_summary(&mut self, stats: &Stats) -> Result<()> {
        writeln!(self.out, "==> {}ed {} total objects:    ", self.prefix, self.count)?;
        let width = stats.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        for (name, count) in stats.iter() {
            writeln!(self.out, "{:<width$} {:>5}", name, count, width = width + 1)?;
        }
        Ok(())
    }
}

impl<W: Write> Listener for Status<W> {
    fn on_tuple(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &mut Attributes,
        _object: &dyn Any,
    ) -> Result<()> {
        self.count += 1;
        match self.verbosity {
            Verbosity::Verbose => {
                let desc = Self::describe(id, attributes);
                writeln!(self.out, "{}: {:<30} {}", self.prefix, type_name, desc)?;
            }
            Verbosity::Normal => {
                write!(self.out, "==> {}ing: {} objects      \r", self.prefix, self.count)?;
            }
            Verbosity::Quiet => {}
        }
        Ok(())
    }

    fn on_complete(&mut self, stats: &Stats) -> Result<()> {
        if self.verbosity != Verbosity::Quiet {
            self.write_summary(stats)?;
        }
        self.out.flush()?;
        Ok(())
    }
}
