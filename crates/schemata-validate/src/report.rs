//! # Validation Reports
//!
//! An [`ErrorRecord`] describes one failed check: its taxonomy kind, where
//! in the schema the check lives, where in the instance it failed, and a
//! human-readable message. Composite keywords (`anyOf`, `oneOf`) attach the
//! failures of their branches as children.
//!
//! A [`ValidationReport`] is the ordered list of top-level records produced
//! by one validation call. It renders as a table with one row per record,
//! children indented under their parent.

use serde::Serialize;
use std::fmt;

use schemata_core::{ErrorKind, Path};

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    /// Taxonomy kind of the failure.
    pub kind: ErrorKind,
    /// Location of the failing keyword in the schema.
    pub schema_path: Path,
    /// Location of the offending value in the instance.
    pub instance_path: Path,
    /// Human-readable description.
    pub message: String,
    /// Failures of the branches of a composite keyword.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ErrorRecord>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, schema_path: Path, instance_path: Path, message: impl Into<String>) -> Self {
        Self {
            kind,
            schema_path,
            instance_path,
            message: message.into(),
            children: Vec::new(),
        }
    }

    /// Attach branch failures.
    pub fn with_children(mut self, children: Vec<ErrorRecord>) -> Self {
        self.children = children;
        self
    }

    /// This record and all descendants, depth first.
    pub fn walk(&self) -> Vec<(usize, &ErrorRecord)> {
        let mut out = Vec::new();
        walk_into(self, 0, &mut out);
        out
    }
}

fn walk_into<'a>(record: &'a ErrorRecord, depth: usize, out: &mut Vec<(usize, &'a ErrorRecord)>) {
    out.push((depth, record));
    for child in &record.children {
        walk_into(child, depth + 1, out);
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {}: {} [{}]", self.instance_path, self.message, self.kind)
    }
}

/// The records produced by one validation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    records: Vec<ErrorRecord>,
}

impl ValidationReport {
    pub fn new(records: Vec<ErrorRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.records
    }

    /// Kind of the first record.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.records.first().map(|r| r.kind)
    }

    /// Every record in the report, children included, with its depth.
    pub fn walk(&self) -> Vec<(usize, &ErrorRecord)> {
        self.records.iter().flat_map(ErrorRecord::walk).collect()
    }

    /// Collapse into a single record whose children are the top-level
    /// records. The root carries the kind of the first record.
    pub fn into_record(self) -> Option<ErrorRecord> {
        let first = self.records.first()?;
        if self.records.len() == 1 {
            return self.records.into_iter().next();
        }
        let kind = first.kind;
        let message = format!("{} validation errors", self.records.len());
        Some(ErrorRecord::new(kind, Path::root(), Path::root(), message).with_children(self.records))
    }

    /// Render the report as an aligned text table.
    pub fn render_table(&self) -> String {
        let rows: Vec<[String; 3]> = self
            .walk()
            .into_iter()
            .map(|(depth, r)| {
                [
                    format!("{}{}", "  ".repeat(depth), r.schema_path),
                    r.instance_path.to_string(),
                    format!("{} [{}]", r.message, r.kind),
                ]
            })
            .collect();
        let header = ["schema path", "instance path", "message"];
        let mut widths = header.map(str::len);
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let mut out = String::new();
        let line = |cells: [&str; 3], out: &mut String| {
            out.push_str(&format!(
                "{:<w0$} | {:<w1$} | {}\n",
                cells[0],
                cells[1],
                cells[2],
                w0 = widths[0],
                w1 = widths[1]
            ));
        };
        line(header, &mut out);
        out.push_str(&format!(
            "{}-+-{}-+-{}\n",
            "-".repeat(widths[0]),
            "-".repeat(widths[1]),
            "-".repeat(widths[2])
        ));
        for row in &rows {
            line([row[0].as_str(), row[1].as_str(), row[2].as_str()], &mut out);
        }
        out
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_table())
    }
}

/// Collects records up to a cap. A cap of zero means unlimited.
#[derive(Debug)]
pub(crate) struct Accumulator {
    records: Vec<ErrorRecord>,
    cap: usize,
}

impl Accumulator {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            records: Vec::new(),
            cap,
        }
    }

    pub(crate) fn cap(&self) -> usize {
        self.cap
    }

    pub(crate) fn push(&mut self, record: ErrorRecord) {
        if !self.is_full() {
            self.records.push(record);
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.cap != 0 && self.records.len() >= self.cap
    }

    pub(crate) fn into_records(self) -> Vec<ErrorRecord> {
        self.records
    }
}
