//! # Engine Handle
//!
//! An [`Engine`] owns every shared table: the keyword registry, the format
//! and media-type tables, the cast table, the named-descriptor table used
//! for forward references, the regex cache and the descriptor cache. It is
//! a cheap `Arc` handle; clones share all state.
//!
//! ## Initialization Order
//!
//! `Engine::new` builds, in order: registry → formats → media → casts →
//! cache. Nothing is interned during construction.
//!
//! [`Engine::global`] is a lazily built process-local engine with the
//! default configuration. Isolated engines (tests, embedders with their
//! own vocabulary) come from [`Engine::new`].
//!
//! ## Forward References
//!
//! `define(name, descriptor)` stores the descriptor's schema under `name`.
//! A bare `$ref` naming it, or a `$cast` step naming it, resolves through
//! this table at validation or construction time. The table holds schemas
//! rather than descriptors so that a definition never keeps the engine
//! alive through its own descriptor.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use schemata_core::{
    CoreError, Frozen, KeywordCatalog, MergeRule, Phase, Schema, SchemaDigest, ValueKind,
};
use schemata_validate::{
    check_draft7, FormatTable, KeywordDefinition, KeywordRegistry, MediaTypeTable, ReferenceResolver,
    RegexCache, Registration, RegistryError, Validator,
};

use crate::cache::DescriptorCache;
use crate::casts::CastTable;
use crate::config::EngineConfig;
use crate::descriptor::{Descriptor, WeakDescriptor};
use crate::error::SchemataError;

static GLOBAL: Lazy<Engine> = Lazy::new(|| Engine::new(EngineConfig::default()));

pub(crate) struct EngineInner {
    config: EngineConfig,
    registry: KeywordRegistry,
    formats: FormatTable,
    media: MediaTypeTable,
    casts: CastTable,
    named: RwLock<HashMap<String, Schema>>,
    regexes: RegexCache,
    cache: DescriptorCache,
}

impl ReferenceResolver for EngineInner {
    fn resolve(&self, name: &str) -> Option<Frozen> {
        self.named.read().get(name).map(Schema::to_frozen)
    }
}

/// Keyword view used for schema identity.
///
/// With `ignore_annotations_in_hash` off, documentation keywords count
/// towards the digest like any other keyword.
pub struct IdentityCatalog<'e> {
    registry: &'e KeywordRegistry,
    ignore_annotations: bool,
}

impl KeywordCatalog for IdentityCatalog<'_> {
    fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.registry.kind_of(name)
    }

    fn is_documentation(&self, name: &str) -> bool {
        self.ignore_annotations && self.registry.is_documentation(name)
    }
}

/// Shared handle over the engine's tables.
#[derive(Clone)]
pub struct Engine(Arc<EngineInner>);

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        tracing::debug!(draft = %config.draft, max_errors = config.max_errors, "initializing engine");
        let registry = KeywordRegistry::for_draft(config.draft);
        let formats = FormatTable::with_defaults();
        let media = MediaTypeTable::with_defaults();
        let casts = CastTable::with_defaults();
        let cache = DescriptorCache::new();
        Self(Arc::new(EngineInner {
            config,
            registry,
            formats,
            media,
            casts,
            named: RwLock::new(HashMap::new()),
            regexes: RegexCache::new(),
            cache,
        }))
    }

    /// The process-local engine with the default configuration.
    pub fn global() -> &'static Engine {
        &GLOBAL
    }

    pub fn config(&self) -> &EngineConfig {
        &self.0.config
    }

    pub fn registry(&self) -> &KeywordRegistry {
        &self.0.registry
    }

    pub fn formats(&self) -> &FormatTable {
        &self.0.formats
    }

    pub fn media(&self) -> &MediaTypeTable {
        &self.0.media
    }

    pub fn casts(&self) -> &CastTable {
        &self.0.casts
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.0.cache
    }

    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // -- Registration ------------------------------------------------------

    /// Register a custom keyword.
    ///
    /// # Errors
    ///
    /// `RegistryError::Duplicate` if the name exists and `mode` is
    /// `Registration::New`.
    pub fn register_keyword(&self, definition: KeywordDefinition, mode: Registration) -> Result<(), RegistryError> {
        self.0.registry.register(definition, mode)
    }

    /// Add or replace a format checker.
    pub fn register_format<F>(&self, name: impl Into<String>, checker: F)
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.0.formats.register(name, checker);
    }

    /// Add or replace a named cast.
    pub fn register_cast<F>(&self, name: impl Into<String>, cast: F)
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.0.casts.register(name, cast);
    }

    /// The catalog that decides schema identity for this engine.
    pub fn catalog(&self) -> IdentityCatalog<'_> {
        IdentityCatalog {
            registry: &self.0.registry,
            ignore_annotations: self.0.config.ignore_annotations_in_hash,
        }
    }

    // -- Interning ---------------------------------------------------------

    /// Check a plain document against this engine's vocabulary.
    pub fn schema(&self, value: &Value) -> Result<Schema, CoreError> {
        Schema::from_value(value, &self.0.registry)
    }

    /// The digest this engine identifies `schema` by.
    pub fn digest_of(&self, schema: &Schema) -> Result<SchemaDigest, CoreError> {
        schema.digest(&self.catalog())
    }

    /// Check and intern a plain document.
    pub fn descriptor(&self, value: &Value) -> Result<Descriptor, CoreError> {
        self.intern(self.schema(value)?)
    }

    pub fn intern(&self, schema: Schema) -> Result<Descriptor, CoreError> {
        self.intern_with(schema, Vec::new())
    }

    pub(crate) fn intern_frozen(&self, value: &Frozen) -> Result<Descriptor, CoreError> {
        self.intern(Schema::from_frozen(value, &self.0.registry)?)
    }

    /// Intern `schema`, recording `ancestors` if the descriptor is new.
    pub fn intern_with(&self, schema: Schema, ancestors: Vec<WeakDescriptor>) -> Result<Descriptor, CoreError> {
        let digest = self.digest_of(&schema)?;
        let (descriptor, created) = self
            .0
            .cache
            .intern(digest, || Descriptor::create(self.clone(), schema, digest, ancestors));
        if created {
            tracing::debug!(digest = %digest.short(), carrier = %descriptor.carrier(), "interned descriptor");
        }
        Ok(descriptor)
    }

    /// Import a Draft-7 document.
    ///
    /// The document is checked against the official metaschema first.
    /// Keywords this engine does not know are registered as opaque
    /// annotations so that they survive a `ravel` round trip.
    ///
    /// # Errors
    ///
    /// `Validation` for metaschema violations, `Core` for documents the
    /// vocabulary rejects.
    pub fn import(&self, value: &Value) -> Result<Descriptor, SchemataError> {
        check_draft7(value)?;
        let mut opaque = BTreeSet::new();
        loop {
            match self.schema(value) {
                Ok(schema) => return Ok(self.intern(schema)?),
                Err(CoreError::UnknownKeyword { keyword, path }) => {
                    if !opaque.insert(keyword.clone()) {
                        return Err(CoreError::UnknownKeyword { keyword, path }.into());
                    }
                    tracing::debug!(keyword = %keyword, path = %path, "registering opaque keyword from import");
                    let definition = KeywordDefinition::new(keyword, ValueKind::Any)
                        .with_phase(Phase::Annotation)
                        .with_merge_rule(MergeRule::Lift);
                    match self.0.registry.register(definition, Registration::New) {
                        Ok(()) | Err(RegistryError::Duplicate(_)) => {}
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Export a descriptor as its canonical Draft-7 document.
    pub fn ravel(&self, descriptor: &Descriptor) -> Value {
        descriptor.to_value()
    }

    // -- Named descriptors ---------------------------------------------------

    /// Make `descriptor` resolvable under `name`. Redefining replaces.
    pub fn define(&self, name: impl Into<String>, descriptor: &Descriptor) {
        let name = name.into();
        tracing::debug!(name = %name, digest = %descriptor.digest().short(), "defined named descriptor");
        self.0.named.write().insert(name, descriptor.schema().clone());
    }

    /// The descriptor defined under `name`.
    pub fn resolve_named(&self, name: &str) -> Result<Option<Descriptor>, CoreError> {
        let schema = self.0.named.read().get(name).cloned();
        schema.map(|s| self.intern(s)).transpose()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.0.named.read().contains_key(name)
    }

    /// A descriptor referring to `name`, which may be defined later.
    pub fn forward(&self, name: &str) -> Result<Descriptor, CoreError> {
        self.descriptor(&json!({ "$ref": name }))
    }

    /// A validator over this engine's tables with the configured options.
    pub fn validator(&self) -> Validator<'_> {
        Validator::new(&self.0.registry, &self.0.formats, &self.0.regexes, &*self.0)
            .with_options(self.0.config.validator_options())
    }

    // -- Convenience constructors ------------------------------------------

    pub fn any(&self) -> Result<Descriptor, CoreError> {
        self.intern(Schema::any())
    }

    pub fn nothing(&self) -> Result<Descriptor, CoreError> {
        self.intern(Schema::nothing())
    }

    pub fn null(&self) -> Result<Descriptor, CoreError> {
        self.primitive("null")
    }

    pub fn boolean(&self) -> Result<Descriptor, CoreError> {
        self.primitive("boolean")
    }

    pub fn integer(&self) -> Result<Descriptor, CoreError> {
        self.primitive("integer")
    }

    pub fn number(&self) -> Result<Descriptor, CoreError> {
        self.primitive("number")
    }

    pub fn text(&self) -> Result<Descriptor, CoreError> {
        self.primitive("string")
    }

    fn primitive(&self, type_name: &str) -> Result<Descriptor, CoreError> {
        self.descriptor(&json!({ "type": type_name }))
    }

    /// A homogeneous sequence.
    pub fn list(&self, items: &Descriptor) -> Result<Descriptor, CoreError> {
        self.descriptor(&json!({"type": "array", "items": items.to_value()}))
    }

    /// A fixed-length positional sequence.
    pub fn tuple(&self, items: &[Descriptor]) -> Result<Descriptor, CoreError> {
        let items: Vec<Value> = items.iter().map(Descriptor::to_value).collect();
        let len = items.len();
        self.descriptor(&json!({
            "type": "array",
            "items": items,
            "minItems": len,
            "maxItems": len,
        }))
    }

    /// A mapping whose values all satisfy `values`.
    pub fn dict(&self, values: &Descriptor) -> Result<Descriptor, CoreError> {
        self.descriptor(&json!({"type": "object", "additionalProperties": values.to_value()}))
    }

    pub fn enumeration<I>(&self, values: I) -> Result<Descriptor, CoreError>
    where
        I: IntoIterator<Item = Value>,
    {
        let values: Vec<Value> = values.into_iter().collect();
        self.descriptor(&json!({ "enum": values }))
    }

    pub fn constant(&self, value: Value) -> Result<Descriptor, CoreError> {
        self.descriptor(&json!({ "const": value }))
    }

    /// Text checked by the named format.
    pub fn format(&self, name: &str) -> Result<Descriptor, CoreError> {
        self.descriptor(&json!({"type": "string", "format": name}))
    }

    /// `if`/`then`/`else`.
    pub fn conditional(
        &self,
        condition: &Descriptor,
        then: Option<&Descriptor>,
        otherwise: Option<&Descriptor>,
    ) -> Result<Descriptor, CoreError> {
        let mut doc = Map::new();
        doc.insert("if".into(), condition.to_value());
        if let Some(then) = then {
            doc.insert("then".into(), then.to_value());
        }
        if let Some(otherwise) = otherwise {
            doc.insert("else".into(), otherwise.to_value());
        }
        self.descriptor(&Value::Object(doc))
    }

    /// Start an object descriptor.
    pub fn object(&self) -> ObjectBuilder<'_> {
        ObjectBuilder::new(self)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.0.config)
            .field("keywords", &self.0.registry.len())
            .field("formats", &self.0.formats.len())
            .field("descriptors", &self.0.cache.len())
            .finish()
    }
}

/// Builder for `type: object` descriptors.
#[derive(Debug)]
pub struct ObjectBuilder<'e> {
    engine: &'e Engine,
    properties: Map<String, Value>,
    required: Vec<String>,
    dependencies: Map<String, Value>,
    definitions: Map<String, Value>,
    closed: bool,
    title: Option<String>,
}

impl<'e> ObjectBuilder<'e> {
    fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            properties: Map::new(),
            required: Vec::new(),
            dependencies: Map::new(),
            definitions: Map::new(),
            closed: false,
            title: None,
        }
    }

    pub fn property(mut self, name: impl Into<String>, descriptor: &Descriptor) -> Self {
        self.properties.insert(name.into(), descriptor.to_value());
        self
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    /// Give property `name` a default, declaring it unconstrained if it
    /// has no descriptor yet.
    pub fn default(mut self, name: impl Into<String>, value: Value) -> Self {
        let slot = self
            .properties
            .entry(name.into())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(schema) = slot {
            schema.insert("default".into(), value);
        }
        self
    }

    /// Presence of `key` requires every key in `names`.
    pub fn dependency<I, S>(mut self, key: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<Value> = names.into_iter().map(|n| Value::String(n.into())).collect();
        self.dependencies.insert(key.into(), Value::Array(names));
        self
    }

    pub fn definition(mut self, name: impl Into<String>, descriptor: &Descriptor) -> Self {
        self.definitions.insert(name.into(), descriptor.to_value());
        self
    }

    /// Reject keys not declared as properties.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn intern(self) -> Result<Descriptor, CoreError> {
        let mut doc = Map::new();
        doc.insert("type".into(), json!("object"));
        if !self.properties.is_empty() {
            doc.insert("properties".into(), Value::Object(self.properties));
        }
        if !self.required.is_empty() {
            doc.insert("required".into(), json!(self.required));
        }
        if !self.dependencies.is_empty() {
            doc.insert("dependencies".into(), Value::Object(self.dependencies));
        }
        if !self.definitions.is_empty() {
            doc.insert("definitions".into(), Value::Object(self.definitions));
        }
        if self.closed {
            doc.insert("additionalProperties".into(), Value::Bool(false));
        }
        if let Some(title) = self.title {
            doc.insert("title".into(), Value::String(title));
        }
        self.engine.descriptor(&Value::Object(doc))
    }
}
