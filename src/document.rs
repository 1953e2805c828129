//! Loads export documents and decodes their fields.
//!
//! Decoding never stops at the first bad field: a [`Fields`] reader records
//! every missing or malformed field of a document and reports them together
//! from [`Fields::finish`].

use std::{fs, path::Path};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, FieldMismatch, FieldProblem, Problem, Result};

pub fn read_json(path: &Path) -> Result<Value> {
    tracing::trace!("Reading {}", path.display());

    let contents = fs::read(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_slice(&contents).map_err(|source| Error::Json {
        path: path.to_owned(),
        source,
    })
}

pub fn read_json_as<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let value = read_json(path)?;
    serde_json::from_value(value).map_err(|source| Error::Json {
        path: path.to_owned(),
        source,
    })
}

const EMPTY: &[Value] = &[];

pub struct Fields<'a> {
    entity: &'static str,
    doc: Option<&'a Map<String, Value>>,
    problems: Vec<FieldProblem>,
}

impl<'a> Fields<'a> {
    pub fn new(entity: &'static str, value: &'a Value) -> Self {
        let mut fields = Self {
            entity,
            doc: value.as_object(),
            problems: Vec::new(),
        };
        if fields.doc.is_none() {
            fields.malformed("<document>", "expected an object");
        }
        fields
    }

    /// A reader with no document of its own, gathering the problems of
    /// several nested documents.
    pub fn collect(entity: &'static str) -> Self {
        Self {
            entity,
            doc: None,
            problems: Vec::new(),
        }
    }

    fn missing(&mut self, field: &str) {
        self.problems.push(FieldProblem {
            field: field.to_owned(),
            problem: Problem::Missing,
        });
    }

    pub fn malformed(&mut self, field: &str, reason: impl Into<String>) {
        self.problems.push(FieldProblem {
            field: field.to_owned(),
            problem: Problem::Malformed(reason.into()),
        });
    }

    /// The raw value of a field, treating `null` as absent.
    pub fn raw(&self, field: &str) -> Option<&'a Value> {
        self.doc?.get(field).filter(|v| !v.is_null())
    }

    fn decode<T>(&mut self, field: &str, value: &Value) -> Option<T>
    where
        T: DeserializeOwned,
    {
        match T::deserialize(value) {
            Ok(v) => Some(v),
            Err(e) => {
                self.malformed(field, e.to_string());
                None
            }
        }
    }

    /// A field that must be present. Returns `T::default()` after recording
    /// the problem, so callers keep decoding the rest of the document.
    pub fn required<T>(&mut self, field: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        match self.raw(field) {
            Some(value) => self.decode(field, value).unwrap_or_default(),
            None => {
                if self.doc.is_some() {
                    self.missing(field);
                }
                T::default()
            }
        }
    }

    /// A field that may be absent or `null`.
    pub fn optional<T>(&mut self, field: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let value = self.raw(field)?;
        self.decode(field, value)
    }

    pub fn or_default<T>(&mut self, field: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.optional(field).unwrap_or_default()
    }

    /// A required array, borrowed from the document.
    pub fn array(&mut self, field: &str) -> &'a [Value] {
        match self.raw(field) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.malformed(field, "expected an array");
                EMPTY
            }
            None => {
                if self.doc.is_some() {
                    self.missing(field);
                }
                EMPTY
            }
        }
    }

    /// An array that defaults to empty when absent.
    pub fn array_or_empty(&mut self, field: &str) -> &'a [Value] {
        if self.raw(field).is_none() {
            return EMPTY;
        }
        self.array(field)
    }

    /// Adds the problems of a nested document under `prefix`.
    pub fn absorb(&mut self, prefix: &str, nested: FieldMismatch) {
        self.problems
            .extend(nested.problems.into_iter().map(|p| FieldProblem {
                field: format!("{prefix}.{}", p.field),
                problem: p.problem,
            }));
    }

    pub fn finish(self) -> Result<(), FieldMismatch> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(FieldMismatch {
                entity: self.entity,
                problems: self.problems,
            })
        }
    }
}
