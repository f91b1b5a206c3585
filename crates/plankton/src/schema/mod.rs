//! Schema model.
//!
//! A [`Schema`] is a validated, immutable [`SchemaNode`] tree together with
//! its canonical binary descriptor, the SHA-224 [`Fingerprint`] of that
//! descriptor and a [`SchemaVersion`]. Cloning a schema is cheap; the tree
//! is shared.

mod def;
mod descriptor;
mod types;
mod validator;

use std::fmt;
use std::sync::Arc;

pub use def::{ComplexDef, FieldDef, SchemaDoc, TypeDef};
pub use descriptor::FINGERPRINT_LEN;
pub use types::{
    Field, FieldTagging, FloatWidth, IntEncoding, IntType, IntWidth, RecordSchema, SchemaNode,
};
pub use validator::conform;

use crate::error::{Error, Result};

/// Identifies a schema within a stream and in plan caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u64);

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for SchemaVersion {
    fn from(v: u64) -> Self {
        SchemaVersion(v)
    }
}

/// SHA-224 digest of a schema's descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn of(descriptor: &[u8]) -> Self {
        Fingerprint(descriptor::fingerprint(descriptor))
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Version derived from the first eight digest bytes, little-endian.
    pub fn derived_version(&self) -> SchemaVersion {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        SchemaVersion(u64::from_le_bytes(head))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

struct Inner {
    root: SchemaNode,
    version: SchemaVersion,
    fingerprint: Fingerprint,
    descriptor: Vec<u8>,
}

/// A validated schema.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<Inner>,
}

impl Schema {
    /// Validates `root`; the version is derived from the fingerprint.
    pub fn new(root: SchemaNode) -> Result<Schema> {
        Self::build(root, None)
    }

    pub fn with_version(root: SchemaNode, version: impl Into<SchemaVersion>) -> Result<Schema> {
        Self::build(root, Some(version.into()))
    }

    /// Builds a schema from its declarative JSON description. A `version`
    /// in the document wins over the derived one.
    pub fn from_json(json: &str) -> Result<Schema> {
        let doc = SchemaDoc::parse(json)?;
        Self::build(doc.to_node()?, doc.version())
    }

    /// Describes the schema as JSON.
    pub fn to_json(&self, explicit_version: bool) -> Result<String> {
        let root = TypeDef::from_node(self.root());
        let doc = if explicit_version {
            SchemaDoc::Versioned {
                version: Some(self.version().0),
                root,
            }
        } else {
            SchemaDoc::Bare(root)
        };
        serde_json::to_string(&doc).map_err(|e| Error::InvalidSchema(e.to_string()))
    }

    /// Rebuilds a schema from [`Schema::descriptor`] bytes.
    pub fn from_descriptor(bytes: &[u8], version: Option<SchemaVersion>) -> Result<Schema> {
        Self::build(descriptor::read_descriptor(bytes)?, version)
    }

    fn build(mut root: SchemaNode, version: Option<SchemaVersion>) -> Result<Schema> {
        validator::validate(&mut root)?;
        let descriptor = descriptor::write_descriptor(&root)?;
        let fingerprint = Fingerprint::of(&descriptor);
        let version = version.unwrap_or_else(|| fingerprint.derived_version());
        Ok(Schema {
            inner: Arc::new(Inner {
                root,
                version,
                fingerprint,
                descriptor,
            }),
        })
    }

    pub fn root(&self) -> &SchemaNode {
        &self.inner.root
    }

    pub fn version(&self) -> SchemaVersion {
        self.inner.version
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.inner.fingerprint
    }

    pub fn descriptor(&self) -> &[u8] {
        &self.inner.descriptor
    }

    /// Same structure, ignoring the version.
    pub fn same_structure(&self, other: &Schema) -> bool {
        self.inner.fingerprint == other.inner.fingerprint
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Schema) -> bool {
        self.inner.version == other.inner.version
            && self.inner.fingerprint == other.inner.fingerprint
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("version", &self.inner.version)
            .field("fingerprint", &self.inner.fingerprint)
            .field("root", &self.inner.root)
            .finish()
    }
}
