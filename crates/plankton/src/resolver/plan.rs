use plankton_buffers::Reader;

use super::{FieldOutcome, FieldReport};
use crate::codec::{capacity_for, read_count, read_field_tag, Decoder};
use crate::error::{Error, Result};
use crate::schema::{RecordSchema, Schema, SchemaNode, SchemaVersion};
use crate::value::Value;

/// How one writer node is read into its reader shape.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// The writer payload already decodes to the reader's value.
    Same(SchemaNode),
    /// Decode with the writer node, then convert.
    Convert(SchemaNode, Conversion),
    /// Items, with the smallest payload of a writer item.
    Seq(Box<Step>, usize),
    Record(RecordStep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Conversion {
    UIntToInt,
    IntToFloat,
    StrToBytes,
}

impl Conversion {
    fn apply(self, value: Value) -> Value {
        match (self, value) {
            (Conversion::UIntToInt, Value::UInt(n)) => Value::Int(n as i64),
            (Conversion::IntToFloat, Value::Int(n)) => Value::Float(n as f64),
            (Conversion::IntToFloat, Value::UInt(n)) => Value::Float(n as f64),
            (Conversion::StrToBytes, Value::Str(s)) => Value::Bytes(s.into_bytes()),
            (_, other) => other,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum WriterSlot {
    /// Store into reader field `target` after applying `step`.
    Read { target: usize, step: Step },
    /// The reader has no such field.
    Skip(SchemaNode),
}

#[derive(Debug, Clone)]
pub(crate) struct ReaderField {
    pub name: String,
    pub default: Option<Value>,
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordStep {
    /// Writer record, needed to interpret field tags.
    pub writer: RecordSchema,
    /// One slot per writer field.
    pub slots: Vec<WriterSlot>,
    pub fields: Vec<ReaderField>,
}

/// The precomputed mapping from one writer schema to one reader schema.
///
/// Built by [`Resolver::resolve`](super::Resolver::resolve); immutable and
/// shareable between threads and streams.
#[derive(Debug)]
pub struct CompatibilityPlan {
    pub(crate) writer: Schema,
    pub(crate) reader: Schema,
    pub(crate) root: Step,
    pub(crate) identity: bool,
    pub(crate) reports: Vec<FieldReport>,
    pub(crate) decoder: Decoder,
}

impl CompatibilityPlan {
    /// Decodes a payload written with the writer schema into the reader's
    /// shape.
    pub fn decode(&self, data: &[u8]) -> Result<Value> {
        let mut reader = Reader::new(data);
        let value = self.read(&mut reader)?;
        if !reader.is_empty() {
            return Err(Error::TrailingBytes {
                remaining: reader.size(),
            });
        }
        Ok(value)
    }

    pub fn read(&self, r: &mut Reader<'_>) -> Result<Value> {
        if self.identity {
            return self.decoder.read(r, self.reader.root(), 0);
        }
        self.apply(r, &self.root, "$", 0)
    }

    fn apply(&self, r: &mut Reader<'_>, step: &Step, path: &str, depth: usize) -> Result<Value> {
        self.decoder.check_depth(depth)?;
        match step {
            Step::Same(node) => self.decoder.read(r, node, depth),
            Step::Convert(node, conversion) => {
                Ok(conversion.apply(self.decoder.read(r, node, depth)?))
            }
            Step::Seq(item, unit) => {
                let len = read_count(r, self.decoder.options(), *unit)?;
                let mut items = Vec::with_capacity(capacity_for(len, r));
                for _ in 0..len {
                    items.push(self.apply(r, item, path, depth + 1)?);
                }
                Ok(Value::Seq(items))
            }
            Step::Record(record) => self.apply_record(r, record, path, depth),
        }
    }

    fn apply_record(
        &self,
        r: &mut Reader<'_>,
        step: &RecordStep,
        path: &str,
        depth: usize,
    ) -> Result<Value> {
        let count = read_count(r, self.decoder.options(), 1)?;
        if count > step.writer.fields.len() {
            return Err(Error::mismatch(
                path,
                format!("{count} fields present, schema has {}", step.writer.fields.len()),
            ));
        }
        let mut seen = vec![false; step.writer.fields.len()];
        let mut values: Vec<Option<Value>> = vec![None; step.fields.len()];
        for _ in 0..count {
            let index = read_field_tag(r, &step.writer)?;
            if std::mem::replace(&mut seen[index], true) {
                return Err(Error::mismatch(
                    path,
                    format!("field {:?} appears twice", step.writer.fields[index].name),
                ));
            }
            match &step.slots[index] {
                WriterSlot::Read { target, step: inner } => {
                    let field_path = format!("{path}.{}", step.fields[*target].name);
                    values[*target] = Some(self.apply(r, inner, &field_path, depth + 1)?);
                }
                WriterSlot::Skip(node) => self.decoder.skip(r, node, depth + 1)?,
            }
        }
        let mut pairs = Vec::with_capacity(step.fields.len());
        for (field, value) in step.fields.iter().zip(values) {
            match value.or_else(|| field.default.clone()) {
                Some(v) => pairs.push((field.name.clone(), v)),
                None if field.optional => {}
                None => {
                    return Err(Error::mismatch(
                        format!("{path}.{}", field.name),
                        "required field is missing",
                    ))
                }
            }
        }
        Ok(Value::Map(pairs))
    }

    /// The writer and reader schemas are structurally identical, so
    /// decoding is plain decoding.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub fn writer_version(&self) -> SchemaVersion {
        self.writer.version()
    }

    pub fn reader_version(&self) -> SchemaVersion {
        self.reader.version()
    }

    pub fn writer(&self) -> &Schema {
        &self.writer
    }

    pub fn reader(&self) -> &Schema {
        &self.reader
    }

    /// Outcome of every field, reader fields first, then ignored writer
    /// fields.
    pub fn reports(&self) -> &[FieldReport] {
        &self.reports
    }

    /// Paths of writer fields that are skipped.
    pub fn ignored_fields(&self) -> Vec<&str> {
        self.paths_where(|o| matches!(o, FieldOutcome::Ignored))
    }

    /// Paths of reader fields the writer never provides.
    pub fn defaulted_fields(&self) -> Vec<&str> {
        self.paths_where(|o| matches!(o, FieldOutcome::DefaultFilled(_)))
    }

    fn paths_where(&self, pred: impl Fn(&FieldOutcome) -> bool) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| pred(&r.outcome))
            .map(|r| r.path.as_str())
            .collect()
    }
}
