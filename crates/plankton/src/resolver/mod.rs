//! Schema evolution: reading data written with one schema through another.
//!
//! Fields are matched by name, then by the reader field's aliases, then by
//! aliases registered on the [`Resolver`]. For each pair the writer type
//! must equal the reader type or widen safely into it:
//!
//! - an int into a wider (or equal) int of the same signedness, whatever
//!   the fixed/varint encoding on either side;
//! - an unsigned int into a strictly wider signed int;
//! - `float32` into `float64`, and an int of at most 32 bits into `float64`;
//! - `string` into `bytes`;
//! - an enum into an enum holding at least the same symbols;
//! - anything into `any`.
//!
//! Sequences and records recurse. Writer fields the reader lacks are
//! skipped; reader fields the writer lacks need a default or must be
//! optional.

mod plan;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub use plan::CompatibilityPlan;

use crate::codec::{min_size, Decoder};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::schema::{
    Field, Fingerprint, FloatWidth, IntType, RecordSchema, Schema, SchemaNode, SchemaVersion,
};
use crate::value::Value;
use plan::{Conversion, ReaderField, RecordStep, Step, WriterSlot};

/// What happens to one field when resolving a writer schema against a
/// reader schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Same type on both sides.
    Identical,
    /// The writer type converts safely into the reader type.
    Widened { writer: String, reader: String },
    /// Only the writer has the field; it is skipped.
    Ignored,
    /// Only the reader has the field; its default (if any) is used.
    DefaultFilled(Option<Value>),
    Incompatible(Incompatibility),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompatibility {
    FieldType { writer: String, reader: String },
    /// The reader requires a field the writer may leave out.
    MissingRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    /// Location such as `$.address.city`; `$` for the root.
    pub path: String,
    pub outcome: FieldOutcome,
}

impl FieldReport {
    pub fn is_compatible(&self) -> bool {
        !matches!(self.outcome, FieldOutcome::Incompatible(_))
    }

    pub fn to_error(&self) -> Option<Error> {
        match &self.outcome {
            FieldOutcome::Incompatible(Incompatibility::FieldType { writer, reader }) => {
                Some(Error::IncompatibleFieldType {
                    path: self.path.clone(),
                    writer: writer.clone(),
                    reader: reader.clone(),
                })
            }
            FieldOutcome::Incompatible(Incompatibility::MissingRequired) => {
                Some(Error::MissingRequiredField {
                    path: self.path.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Computes [`CompatibilityPlan`]s.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    /// `(reader name, writer name)` pairs.
    aliases: Vec<(String, String)>,
    options: CodecOptions,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Lets a reader field named `reader` read the writer field `writer`,
    /// in records at any depth.
    pub fn with_alias(mut self, reader: impl Into<String>, writer: impl Into<String>) -> Self {
        self.aliases.push((reader.into(), writer.into()));
        self
    }

    /// Reports the outcome for every field, including every
    /// incompatibility.
    pub fn diagnose(&self, writer: &Schema, reader: &Schema) -> Vec<FieldReport> {
        let mut reports = Vec::new();
        self.root_step(writer.root(), reader.root(), &mut reports);
        reports
    }

    /// Builds the plan for reading `writer` data as `reader`. Fails with
    /// the first incompatibility found.
    pub fn resolve(&self, writer: &Schema, reader: &Schema) -> Result<Arc<CompatibilityPlan>> {
        let mut reports = Vec::new();
        let root = self.root_step(writer.root(), reader.root(), &mut reports);
        if let Some(err) = reports.iter().find_map(FieldReport::to_error) {
            return Err(err);
        }
        let Some(root) = root else {
            return Err(Error::IncompatibleFieldType {
                path: "$".into(),
                writer: writer.root().type_name(),
                reader: reader.root().type_name(),
            });
        };
        let identity = writer.root() == reader.root();
        tracing::debug!(
            writer = %writer.version(),
            reader = %reader.version(),
            identity,
            ignored = reports.iter().filter(|r| r.outcome == FieldOutcome::Ignored).count(),
            "computed compatibility plan"
        );
        Ok(Arc::new(CompatibilityPlan {
            writer: writer.clone(),
            reader: reader.clone(),
            root,
            identity,
            reports,
            decoder: Decoder::with_options(self.options),
        }))
    }

    fn root_step(
        &self,
        writer: &SchemaNode,
        reader: &SchemaNode,
        reports: &mut Vec<FieldReport>,
    ) -> Option<Step> {
        let step = self.step(writer, reader, "$", reports);
        if step.is_none() && !matches!((writer, reader), (SchemaNode::Record(_), SchemaNode::Record(_)))
        {
            reports.push(FieldReport {
                path: "$".into(),
                outcome: FieldOutcome::Incompatible(Incompatibility::FieldType {
                    writer: writer.type_name(),
                    reader: reader.type_name(),
                }),
            });
        }
        step
    }

    /// `None` when `writer` cannot be read as `reader`. Field outcomes
    /// found inside records are appended to `reports`.
    fn step(
        &self,
        writer: &SchemaNode,
        reader: &SchemaNode,
        path: &str,
        reports: &mut Vec<FieldReport>,
    ) -> Option<Step> {
        match (writer, reader) {
            (SchemaNode::Record(w), SchemaNode::Record(r)) => {
                self.record_step(w, r, path, reports).map(Step::Record)
            }
            (SchemaNode::Seq(w), SchemaNode::Seq(r)) => {
                let item = self.step(w, r, &format!("{path}[]"), reports)?;
                Some(Step::Seq(Box::new(item), min_size(w)))
            }
            (w, r) if w == r => Some(Step::Same(w.clone())),
            (w, SchemaNode::Any) => Some(Step::Same(w.clone())),
            (SchemaNode::Int(w), SchemaNode::Int(r)) => {
                widen_int(w, r).map(|conversion| match conversion {
                    Some(c) => Step::Convert(writer.clone(), c),
                    None => Step::Same(writer.clone()),
                })
            }
            (SchemaNode::Int(w), SchemaNode::Float(FloatWidth::F64))
                if w.width.bits() <= 32 =>
            {
                Some(Step::Convert(writer.clone(), Conversion::IntToFloat))
            }
            (SchemaNode::Float(FloatWidth::F32), SchemaNode::Float(FloatWidth::F64)) => {
                Some(Step::Same(writer.clone()))
            }
            (SchemaNode::Str, SchemaNode::Bytes) => {
                Some(Step::Convert(writer.clone(), Conversion::StrToBytes))
            }
            (SchemaNode::Enum(w), SchemaNode::Enum(r)) if w.iter().all(|s| r.contains(s)) => {
                Some(Step::Same(writer.clone()))
            }
            _ => None,
        }
    }

    fn record_step(
        &self,
        writer: &RecordSchema,
        reader: &RecordSchema,
        path: &str,
        reports: &mut Vec<FieldReport>,
    ) -> Option<RecordStep> {
        let mut compatible = true;
        let mut slots: Vec<Option<WriterSlot>> = vec![None; writer.fields.len()];
        for (target, rf) in reader.fields.iter().enumerate() {
            let field_path = format!("{path}.{}", rf.name);
            let outcome = match self.match_writer_field(writer, reader, rf, &slots) {
                Some((index, wf)) => match self.step(&wf.node, &rf.node, &field_path, reports) {
                    None => FieldOutcome::Incompatible(Incompatibility::FieldType {
                        writer: wf.node.type_name(),
                        reader: rf.node.type_name(),
                    }),
                    Some(_) if wf.optional && rf.is_required() => {
                        FieldOutcome::Incompatible(Incompatibility::MissingRequired)
                    }
                    Some(step) => {
                        slots[index] = Some(WriterSlot::Read { target, step });
                        if wf.node == rf.node {
                            FieldOutcome::Identical
                        } else {
                            FieldOutcome::Widened {
                                writer: wf.node.type_name(),
                                reader: rf.node.type_name(),
                            }
                        }
                    }
                },
                None if rf.default.is_some() => FieldOutcome::DefaultFilled(rf.default.clone()),
                None if rf.optional => FieldOutcome::DefaultFilled(None),
                None => FieldOutcome::Incompatible(Incompatibility::MissingRequired),
            };
            compatible &= !matches!(outcome, FieldOutcome::Incompatible(_));
            reports.push(FieldReport {
                path: field_path,
                outcome,
            });
        }
        let slots = writer
            .fields
            .iter()
            .zip(slots)
            .map(|(wf, slot)| {
                slot.unwrap_or_else(|| {
                    reports.push(FieldReport {
                        path: format!("{path}.{}", wf.name),
                        outcome: FieldOutcome::Ignored,
                    });
                    WriterSlot::Skip(wf.node.clone())
                })
            })
            .collect();
        compatible.then(|| RecordStep {
            writer: writer.clone(),
            slots,
            fields: reader
                .fields
                .iter()
                .map(|f| ReaderField {
                    name: f.name.clone(),
                    default: f.default.clone(),
                    optional: f.optional,
                })
                .collect(),
        })
    }

    /// Finds the writer field feeding `rf` that no other reader field has
    /// claimed. A writer field sharing its name with some reader field only
    /// ever feeds that field, never an alias.
    fn match_writer_field<'w>(
        &self,
        writer: &'w RecordSchema,
        reader: &RecordSchema,
        rf: &Field,
        claimed: &[Option<WriterSlot>],
    ) -> Option<(usize, &'w Field)> {
        let registered = self
            .aliases
            .iter()
            .filter(|(r, _)| *r == rf.name)
            .map(|(_, w)| w.as_str());
        let aliases = rf
            .aliases
            .iter()
            .map(String::as_str)
            .chain(registered)
            .filter(|name| reader.field(name).is_none());
        std::iter::once(rf.name.as_str())
            .chain(aliases)
            .filter_map(|name| writer.field(name))
            .find(|(index, _)| claimed[*index].is_none())
    }
}

/// `Some(None)` when the decoded value needs no conversion, `Some(Some(c))`
/// when it does, `None` when `w` does not fit into `r`.
fn widen_int(w: &IntType, r: &IntType) -> Option<Option<Conversion>> {
    if w.signed == r.signed && r.width >= w.width {
        Some(None)
    } else if !w.signed && r.signed && r.width > w.width {
        Some(Some(Conversion::UIntToInt))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PlanKey {
    writer: (SchemaVersion, Fingerprint),
    reader: (SchemaVersion, Fingerprint),
}

impl PlanKey {
    fn new(writer: &Schema, reader: &Schema) -> Self {
        Self {
            writer: (writer.version(), writer.fingerprint()),
            reader: (reader.version(), reader.fingerprint()),
        }
    }
}

/// Plans shared across streams, one per (writer, reader) schema pair.
#[derive(Debug, Default)]
pub struct PlanCache {
    resolver: Resolver,
    plans: RwLock<HashMap<PlanKey, Arc<CompatibilityPlan>>>,
}

impl PlanCache {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            plans: RwLock::new(HashMap::new()),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Returns the cached plan or resolves and caches a new one. Failed
    /// resolutions are not cached.
    pub fn get(&self, writer: &Schema, reader: &Schema) -> Result<Arc<CompatibilityPlan>> {
        let key = PlanKey::new(writer, reader);
        if let Some(plan) = self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(plan));
        }
        let plan = self.resolver.resolve(writer, reader)?;
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(plans.entry(key).or_insert(plan)))
    }

    pub fn len(&self) -> usize {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::schema::IntWidth;

    fn schema(fields: Vec<Field>) -> Schema {
        Schema::new(SchemaNode::record(fields)).unwrap()
    }

    #[test]
    fn identical_schemas_give_an_identity_plan() {
        let s = schema(vec![Field::new("a", SchemaNode::uint8())]);
        let plan = Resolver::new().resolve(&s, &s).unwrap();
        assert!(plan.is_identity());
        assert_eq!(plan.reports()[0].outcome, FieldOutcome::Identical);
        let bytes = encode(&Value::map([("a", Value::Int(3))]), &s).unwrap();
        assert_eq!(plan.decode(&bytes).unwrap(), Value::map([("a", Value::UInt(3))]));
    }

    #[test]
    fn int_widening_rules() {
        let w = |t: &str| IntType::parse(t).unwrap();
        assert_eq!(widen_int(&w("uint8"), &w("uint32")), Some(None));
        assert_eq!(widen_int(&w("uint8"), &w("varuint8")), Some(None));
        assert_eq!(widen_int(&w("varint16"), &w("int64")), Some(None));
        assert_eq!(widen_int(&w("uint16"), &w("int32")), Some(Some(Conversion::UIntToInt)));
        assert_eq!(widen_int(&w("uint16"), &w("int16")), None);
        assert_eq!(widen_int(&w("int8"), &w("uint64")), None);
        assert_eq!(widen_int(&w("uint32"), &w("uint16")), None);
    }

    #[test]
    fn added_and_removed_fields() {
        let writer = schema(vec![
            Field::new("id", SchemaNode::uint32()),
            Field::new("legacy", SchemaNode::Str),
        ]);
        let reader = schema(vec![
            Field::new("id", SchemaNode::uint32()),
            Field::new("score", SchemaNode::float64()).with_default(Value::Float(1.0)),
            Field::new("note", SchemaNode::Str).optional(),
        ]);
        let plan = Resolver::new().resolve(&writer, &reader).unwrap();
        assert!(!plan.is_identity());
        assert_eq!(plan.ignored_fields(), ["$.legacy"]);
        assert_eq!(plan.defaulted_fields(), ["$.score", "$.note"]);
        let bytes = encode(
            &Value::map([("id", Value::Int(9)), ("legacy", Value::from("old"))]),
            &writer,
        )
        .unwrap();
        assert_eq!(
            plan.decode(&bytes).unwrap(),
            Value::map([("id", Value::UInt(9)), ("score", Value::Float(1.0))])
        );
    }

    #[test]
    fn missing_required_field() {
        let writer = schema(vec![Field::new("a", SchemaNode::Bool)]);
        let reader = schema(vec![
            Field::new("a", SchemaNode::Bool),
            Field::new("b", SchemaNode::Bool),
        ]);
        assert!(matches!(
            Resolver::new().resolve(&writer, &reader),
            Err(Error::MissingRequiredField { path }) if path == "$.b"
        ));
    }

    #[test]
    fn optional_writer_field_cannot_feed_required_reader_field() {
        let writer = schema(vec![Field::new("a", SchemaNode::Bool).optional()]);
        let reader = schema(vec![Field::new("a", SchemaNode::Bool)]);
        assert!(matches!(
            Resolver::new().resolve(&writer, &reader),
            Err(Error::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn narrowing_is_incompatible() {
        let writer = schema(vec![Field::new("n", SchemaNode::int64())]);
        let reader = schema(vec![Field::new("n", SchemaNode::int32())]);
        match Resolver::new().resolve(&writer, &reader) {
            Err(Error::IncompatibleFieldType {
                path,
                writer,
                reader,
            }) => {
                assert_eq!(path, "$.n");
                assert_eq!(writer, "int64");
                assert_eq!(reader, "int32");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn diagnose_reports_every_problem() {
        let writer = schema(vec![
            Field::new("a", SchemaNode::Str),
            Field::new("b", SchemaNode::float64()),
            Field::new("c", SchemaNode::uint8()),
        ]);
        let reader = schema(vec![
            Field::new("a", SchemaNode::Bool),
            Field::new("b", SchemaNode::float32()),
            Field::new("c", SchemaNode::uint16()),
            Field::new("d", SchemaNode::Str),
        ]);
        let reports = Resolver::new().diagnose(&writer, &reader);
        let bad: Vec<_> = reports
            .iter()
            .filter(|r| !r.is_compatible())
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(bad, ["$.a", "$.b", "$.d"]);
        assert!(matches!(reports[2].outcome, FieldOutcome::Widened { .. }));
    }

    #[test]
    fn renames_need_aliases() {
        let writer = schema(vec![Field::new("old", SchemaNode::uint8())]);
        let reader = schema(vec![Field::new("new", SchemaNode::uint16())]);
        assert!(Resolver::new().resolve(&writer, &reader).is_err());

        let plan = Resolver::new()
            .with_alias("new", "old")
            .resolve(&writer, &reader)
            .unwrap();
        let bytes = encode(&Value::map([("old", Value::Int(5))]), &writer).unwrap();
        assert_eq!(plan.decode(&bytes).unwrap(), Value::map([("new", Value::UInt(5))]));

        let aliased = schema(vec![Field::new("new", SchemaNode::uint16()).alias("old")]);
        assert!(Resolver::new().resolve(&writer, &aliased).is_ok());
    }

    #[test]
    fn exact_names_win_over_aliases() {
        let writer = schema(vec![
            Field::new("a", SchemaNode::uint8()),
            Field::new("b", SchemaNode::uint8()),
        ]);
        let reader = schema(vec![
            Field::new("a", SchemaNode::uint16()),
            Field::new("b", SchemaNode::uint16()),
        ]);
        let bytes = encode(
            &Value::map([("a", Value::Int(1)), ("b", Value::Int(2))]),
            &writer,
        )
        .unwrap();
        // "a" is read first and has "b" registered as an alias, but "b"
        // still feeds "b".
        let plan = Resolver::new()
            .with_alias("a", "b")
            .resolve(&writer, &reader)
            .unwrap();
        assert!(plan.ignored_fields().is_empty());
        assert_eq!(
            plan.decode(&bytes).unwrap(),
            Value::map([("a", Value::UInt(1)), ("b", Value::UInt(2))])
        );

        // With "a" gone from the writer, the alias may not take "b" either.
        let writer = schema(vec![Field::new("b", SchemaNode::uint8())]);
        let reader = schema(vec![
            Field::new("a", SchemaNode::uint8()).optional(),
            Field::new("b", SchemaNode::uint16()),
        ]);
        let bytes = encode(&Value::map([("b", Value::Int(2))]), &writer).unwrap();
        let plan = Resolver::new()
            .with_alias("a", "b")
            .resolve(&writer, &reader)
            .unwrap();
        assert_eq!(plan.decode(&bytes).unwrap(), Value::map([("b", Value::UInt(2))]));
    }

    #[test]
    fn conversions_apply() {
        let writer = schema(vec![
            Field::new("u", SchemaNode::uint16()),
            Field::new("i", SchemaNode::varint(IntWidth::W32, true)),
            Field::new("s", SchemaNode::Str),
            Field::new("e", SchemaNode::enumeration(["a"])),
            Field::new("x", SchemaNode::Bool),
        ]);
        let reader = schema(vec![
            Field::new("u", SchemaNode::int32()),
            Field::new("i", SchemaNode::float64()),
            Field::new("s", SchemaNode::bytes()),
            Field::new("e", SchemaNode::enumeration(["b", "a"])),
            Field::new("x", SchemaNode::Any),
        ]);
        let plan = Resolver::new().resolve(&writer, &reader).unwrap();
        let bytes = encode(
            &Value::map([
                ("u", Value::Int(65535)),
                ("i", Value::Int(-7)),
                ("s", Value::from("hi")),
                ("e", Value::from("a")),
                ("x", Value::Bool(true)),
            ]),
            &writer,
        )
        .unwrap();
        let value = plan.decode(&bytes).unwrap();
        assert!(matches!(value.get("u").unwrap(), Some(Value::Int(65535))));
        assert!(matches!(value.get("i").unwrap(), Some(Value::Float(f)) if *f == -7.0));
        assert_eq!(value.get("s").unwrap(), Some(&Value::Bytes(b"hi".to_vec())));
        assert_eq!(value.get("e").unwrap(), Some(&Value::from("a")));
        assert_eq!(value.get("x").unwrap(), Some(&Value::Bool(true)));
    }

    #[test]
    fn nested_records_and_sequences() {
        let point_w = SchemaNode::record(vec![
            Field::new("x", SchemaNode::int16()),
            Field::new("tag", SchemaNode::Str),
        ]);
        let point_r = SchemaNode::record(vec![Field::new("x", SchemaNode::int64())]);
        let writer = schema(vec![Field::new("pts", SchemaNode::seq(point_w))]);
        let reader = schema(vec![Field::new("pts", SchemaNode::seq(point_r))]);
        let plan = Resolver::new().resolve(&writer, &reader).unwrap();
        assert_eq!(plan.ignored_fields(), ["$.pts[].tag"]);
        let bytes = encode(
            &Value::map([(
                "pts",
                Value::Seq(vec![
                    Value::map([("x", Value::Int(-1)), ("tag", Value::from("a"))]),
                    Value::map([("x", Value::Int(2)), ("tag", Value::from("b"))]),
                ]),
            )]),
            &writer,
        )
        .unwrap();
        assert_eq!(
            plan.decode(&bytes).unwrap(),
            Value::map([(
                "pts",
                Value::Seq(vec![
                    Value::map([("x", Value::Int(-1))]),
                    Value::map([("x", Value::Int(2))]),
                ]),
            )])
        );
    }

    #[test]
    fn root_type_mismatch() {
        let writer = Schema::new(SchemaNode::Str).unwrap();
        let reader = Schema::new(SchemaNode::Bool).unwrap();
        let reports = Resolver::new().diagnose(&writer, &reader);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path, "$");
        assert!(matches!(
            Resolver::new().resolve(&writer, &reader),
            Err(Error::IncompatibleFieldType { .. })
        ));
    }

    #[test]
    fn cache_reuses_plans() {
        let writer = schema(vec![Field::new("a", SchemaNode::uint8())]);
        let reader = schema(vec![Field::new("a", SchemaNode::uint64())]);
        let cache = PlanCache::new(Resolver::new());
        let first = cache.get(&writer, &reader).unwrap();
        let second = cache.get(&writer, &reader).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        cache.get(&reader, &reader).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn plans_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompatibilityPlan>();
        assert_send_sync::<PlanCache>();
    }
}
