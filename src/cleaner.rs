//! Cleaner capability and the values a cleaner emits.
//!
//! A cleaner turns the raw text of one fetched page (or one captured
//! [`Snapshot`]) into a finite, single-pass sequence of [`Emit`] items.
//! Each item is either a structured [`Record`] to persist or a [`NewJob`]
//! to feed back into the job board, which is how crawls recurse.
//!
//! Two shapes are supported:
//! - any type implementing [`Cleaner`] directly (text and snapshot cleaning,
//!   plus output routing metadata)
//! - a plain function wrapped in [`FnCleaner`] (text cleaning only)
//!
//! Both shapes may emit new jobs.

use std::any::TypeId;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, ScrapeError};
use crate::scheduler::job::NewJob;
use crate::snapshot::Snapshot;

/// Lazy, finite, single-pass output of one cleaning invocation.
pub type CleanerOutput = Box<dyn Iterator<Item = Result<Emit>> + Send>;

/// Cleaners are shared between the job that names them and every task
/// derived from it.
pub type SharedCleaner = Arc<dyn Cleaner>;

/// Wrap any owned iterator of emissions as a [`CleanerOutput`].
pub fn output_from<I>(items: I) -> CleanerOutput
where
    I: IntoIterator<Item = Result<Emit>>,
    I::IntoIter: Send + 'static,
{
    Box::new(items.into_iter())
}

pub fn empty_output() -> CleanerOutput {
    Box::new(std::iter::empty())
}

pub trait Cleaner: Send + Sync {
    fn clean_text(&self, text: &str) -> Result<CleanerOutput>;

    /// Clean one multi-shot capture. Only cleaners used with driver-script
    /// jobs need to implement this.
    fn clean_snapshot(&self, _snapshot: &Snapshot) -> Result<CleanerOutput> {
        Err(ScrapeError::SnapshotUnsupported {
            cleaner: self.name(),
        })
    }

    /// Destination for persisted records. `None` means one file per record
    /// type, named after the type.
    fn output(&self) -> Option<OutputTarget> {
        None
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }

    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>()).to_string()
    }
}

/// Adapts a plain `Fn(&str) -> Result<CleanerOutput>` into a [`Cleaner`].
pub struct FnCleaner<F> {
    func: F,
    name: String,
    output: Option<OutputTarget>,
    format: OutputFormat,
}

impl<F> FnCleaner<F>
where
    F: Fn(&str) -> Result<CleanerOutput> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            func,
            name: name.into(),
            output: None,
            format: OutputFormat::Csv,
        }
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn shared(self) -> SharedCleaner {
        Arc::new(self)
    }
}

impl<F> Cleaner for FnCleaner<F>
where
    F: Fn(&str) -> Result<CleanerOutput> + Send + Sync + 'static,
{
    fn clean_text(&self, text: &str) -> Result<CleanerOutput> {
        (self.func)(text)
    }

    fn output(&self) -> Option<OutputTarget> {
        self.output.clone()
    }

    fn format(&self) -> OutputFormat {
        self.format
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// One element of a cleaner's output.
pub enum Emit {
    Record(Record),
    Job(NewJob),
}

impl Emit {
    pub fn record<T: Serialize + 'static>(value: &T) -> Result<Self> {
        Record::from_serialize(value).map(Emit::Record)
    }

    pub fn job(job: NewJob) -> Self {
        Emit::Job(job)
    }
}

impl fmt::Debug for Emit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emit::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Emit::Job(job) => f.debug_tuple("Job").field(&job.url).finish(),
        }
    }
}

/// Identity of a record's concrete Rust type, used to batch records of the
/// same kind together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordKind {
    id: TypeId,
    name: &'static str,
}

impl RecordKind {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    /// Unqualified type name, e.g. `Link`.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A structured record, captured as an ordered field map at emission time.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: RecordKind,
    fields: Map<String, Value>,
}

impl Record {
    /// Snapshot any serializable struct as a record. The value must
    /// serialize to a JSON object; field order follows declaration order.
    pub fn from_serialize<T: Serialize + 'static>(value: &T) -> Result<Self> {
        let kind = RecordKind::of::<T>();
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self { kind, fields }),
            other => Err(ScrapeError::Cleaner(format!(
                "record {} must serialize to an object, got {}",
                kind, other
            ))),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn header(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field values rendered for a CSV row. Strings are written bare,
    /// `null` as an empty cell, everything else as JSON.
    pub fn values(&self) -> impl Iterator<Item = String> + '_ {
        self.fields.values().map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

/// Where a cleaner's records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    /// File name relative to the data directory.
    File(String),
}

impl FromStr for OutputTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "-" | "stdout" => OutputTarget::Stdout,
            name => OutputTarget::File(name.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Header row once per file, then one row per record.
    #[default]
    Csv,
    /// One JSON document per record, one per line.
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(OutputFormat::Csv),
            "text" => Ok(OutputFormat::Text),
            other => Err(ScrapeError::Internal(format!(
                "unknown output format {:?}, expected csv or text",
                other
            ))),
        }
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
