//! # Keyword Registry
//!
//! The runtime table of keywords the engine understands. Each entry pairs
//! a keyword name with its value kind, validation phase, merge rule,
//! optional construction role, and optional validator hook.
//!
//! ## Invariants
//!
//! - A name is registered at most once unless the caller asks for
//!   [`Registration::Override`]; an override keeps the original rank.
//! - [`KeywordRegistry::validators_for`] returns hooks in `(phase, rank)`
//!   order. Built-in keywords rank by their position in `Keyword::all()`;
//!   custom keywords rank after every built-in, in registration order.
//! - Under Draft 7 a schema holding `$ref` dispatches only `$ref`; its
//!   sibling keywords are ignored.
//! - Reads take the shared lock and registration takes the exclusive lock,
//!   so registration from one thread never tears a concurrent lookup.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use schemata_core::{Draft, Frozen, FrozenMap, Keyword, KeywordCatalog, MergeRule, Phase, Role, ValueKind};

use crate::error::RegistryError;
use crate::keywords;
use crate::scope::Scope;

/// A validator hook for one keyword.
///
/// The hook receives the scope of the schema object containing the
/// keyword (so it can read siblings), the keyword's own value, and the
/// instance under validation. Failures are reported through the scope.
pub trait KeywordValidator: Send + Sync {
    fn validate(&self, scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value);
}

impl<F> KeywordValidator for F
where
    F: Fn(&mut Scope<'_, '_>, &Frozen, &Value) + Send + Sync,
{
    fn validate(&self, scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
        self(scope, value, instance)
    }
}

/// Whether a registration may replace an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Fail with `Duplicate` if the name exists.
    New,
    /// Replace an existing entry, keeping its rank.
    Override,
}

/// Metadata and hook for one keyword.
#[derive(Clone)]
pub struct KeywordDefinition {
    name: String,
    kind: ValueKind,
    phase: Phase,
    merge_rule: MergeRule,
    role: Option<Role>,
    documentation: bool,
    validator: Option<Arc<dyn KeywordValidator>>,
}

impl KeywordDefinition {
    /// A custom keyword. Defaults to the constraint phase, the `Lift`
    /// merge rule, no role and no validator.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            phase: Phase::Constraint,
            merge_rule: MergeRule::Lift,
            role: None,
            documentation: false,
            validator: None,
        }
    }

    /// The definition of a built-in keyword, with its built-in hook.
    pub fn builtin(keyword: Keyword) -> Self {
        Self {
            name: keyword.as_str().to_string(),
            kind: keyword.kind(),
            phase: keyword.phase(),
            merge_rule: keyword.merge_rule(),
            role: keyword.role(),
            documentation: keyword.is_documentation(),
            validator: keywords::builtin_validator(keyword),
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_merge_rule(mut self, rule: MergeRule) -> Self {
        self.merge_rule = rule;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach a hook written as a closure or function.
    pub fn with_validator<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Scope<'_, '_>, &Frozen, &Value) + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(hook));
        self
    }

    /// Attach a hook implemented as a type.
    pub fn with_hook(mut self, hook: Arc<dyn KeywordValidator>) -> Self {
        self.validator = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn merge_rule(&self) -> MergeRule {
        self.merge_rule
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_documentation(&self) -> bool {
        self.documentation
    }

    pub fn validator(&self) -> Option<&Arc<dyn KeywordValidator>> {
        self.validator.as_ref()
    }
}

impl fmt::Debug for KeywordDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("phase", &self.phase)
            .field("merge_rule", &self.merge_rule)
            .field("role", &self.role)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    definition: Arc<KeywordDefinition>,
    rank: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: HashMap<String, Entry>,
    custom_count: usize,
}

/// The keyword table shared by an engine.
#[derive(Debug, Default)]
pub struct KeywordRegistry {
    inner: RwLock<RegistryInner>,
    draft: Draft,
}

impl KeywordRegistry {
    /// A registry with no keywords at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry seeded with every built-in keyword available in `draft`.
    pub fn for_draft(draft: Draft) -> Self {
        let mut inner = RegistryInner::default();
        for keyword in Keyword::all() {
            if keyword.since() > draft {
                continue;
            }
            inner.entries.insert(
                keyword.as_str().to_string(),
                Entry {
                    definition: Arc::new(KeywordDefinition::builtin(*keyword)),
                    rank: keyword.rank(),
                },
            );
        }
        tracing::debug!(draft = %draft, keywords = inner.entries.len(), "seeded keyword registry");
        Self {
            inner: RwLock::new(inner),
            draft,
        }
    }

    /// The draft whose vocabulary seeded this registry.
    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// Add a keyword.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Duplicate` if the name exists and `mode` is
    /// [`Registration::New`].
    pub fn register(&self, definition: KeywordDefinition, mode: Registration) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        let existing_rank = inner.entries.get(definition.name()).map(|e| e.rank);
        let rank = match (existing_rank, mode) {
            (Some(_), Registration::New) => {
                return Err(RegistryError::Duplicate(definition.name().to_string()));
            }
            (Some(rank), Registration::Override) => rank,
            (None, _) => {
                inner.custom_count += 1;
                Keyword::all().len() + inner.custom_count
            }
        };
        tracing::debug!(keyword = definition.name(), rank, override_existing = existing_rank.is_some(), "registered keyword");
        inner.entries.insert(
            definition.name().to_string(),
            Entry {
                definition: Arc::new(definition),
                rank,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<KeywordDefinition>> {
        self.inner.read().entries.get(name).map(|e| Arc::clone(&e.definition))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Registered names in canonical order.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut entries: Vec<_> = inner.entries.values().collect();
        entries.sort_by_key(|e| (e.definition.phase(), e.rank));
        entries.iter().map(|e| e.definition.name().to_string()).collect()
    }

    /// Definitions with a validator hook whose keywords appear in
    /// `schema`, in canonical order.
    pub fn validators_for(&self, schema: &FrozenMap) -> Vec<Arc<KeywordDefinition>> {
        let inner = self.inner.read();
        let reference = Keyword::Ref.as_str();
        if self.draft == Draft::Draft7 && schema.contains_key(reference) {
            return inner
                .entries
                .get(reference)
                .filter(|e| e.definition.validator().is_some())
                .map(|e| Arc::clone(&e.definition))
                .into_iter()
                .collect();
        }
        let mut found: Vec<&Entry> = schema
            .keys()
            .filter_map(|name| inner.entries.get(name))
            .filter(|e| e.definition.validator().is_some())
            .collect();
        found.sort_by_key(|e| (e.definition.phase(), e.rank));
        found.iter().map(|e| Arc::clone(&e.definition)).collect()
    }
}

impl KeywordCatalog for KeywordRegistry {
    fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.inner.read().entries.get(name).map(|e| e.definition.kind())
    }

    fn is_documentation(&self, name: &str) -> bool {
        self.inner
            .read()
            .entries
            .get(name)
            .is_some_and(|e| e.definition.is_documentation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frozen_map(v: Value) -> FrozenMap {
        Frozen::from(&v).as_map().cloned().unwrap_or_default()
    }

    #[test]
    fn test_seeded_draft7_vocabulary() {
        let registry = KeywordRegistry::for_draft(Draft::Draft7);
        assert!(registry.contains("type"));
        assert!(registry.contains("$cast"));
        assert!(!registry.contains("$defs"));
        let full = KeywordRegistry::for_draft(Draft::Draft201909);
        assert!(full.contains("$defs"));
        assert!(full.len() > registry.len());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = KeywordRegistry::for_draft(Draft::Draft7);
        let err = registry
            .register(KeywordDefinition::new("type", ValueKind::Any), Registration::New)
            .unwrap_err();
        assert_eq!(err.kind(), schemata_core::ErrorKind::Duplicate);
    }

    #[test]
    fn test_override_keeps_rank() {
        let registry = KeywordRegistry::for_draft(Draft::Draft7);
        let before = registry.names();
        registry
            .register(
                KeywordDefinition::builtin(Keyword::Minimum).with_phase(Phase::Constraint),
                Registration::Override,
            )
            .unwrap();
        assert_eq!(registry.names(), before);
    }

    #[test]
    fn test_custom_keyword_ranks_after_builtins() {
        let registry = KeywordRegistry::for_draft(Draft::Draft7);
        registry
            .register(
                KeywordDefinition::new("x-even", ValueKind::Boolean)
                    .with_validator(|_, _, _| {}),
                Registration::New,
            )
            .unwrap();
        let schema = frozen_map(json!({"x-even": true, "maxLength": 3, "type": "string"}));
        let order: Vec<String> = registry
            .validators_for(&schema)
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(order, vec!["type", "maxLength", "x-even"]);
    }

    #[test]
    fn test_validators_for_skips_annotations() {
        let registry = KeywordRegistry::for_draft(Draft::Draft7);
        let schema = frozen_map(json!({"title": "t", "default": 1, "minimum": 0}));
        let names: Vec<String> = registry
            .validators_for(&schema)
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["minimum"]);
    }

    #[test]
    fn test_structural_before_composite_before_constraint() {
        let registry = KeywordRegistry::for_draft(Draft::Draft7);
        let schema = frozen_map(json!({
            "minimum": 1, "anyOf": [{}], "type": "integer", "required": []
        }));
        let names: Vec<String> = registry
            .validators_for(&schema)
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["type", "required", "anyOf", "minimum"]);
    }

    #[test]
    fn test_reference_hides_siblings_in_draft7() {
        let schema = frozen_map(json!({"$ref": "#/definitions/a", "minimum": 10, "type": "integer"}));
        let names = |registry: &KeywordRegistry| -> Vec<String> {
            registry.validators_for(&schema).iter().map(|d| d.name().to_string()).collect()
        };
        let draft7 = KeywordRegistry::for_draft(Draft::Draft7);
        assert_eq!(draft7.draft(), Draft::Draft7);
        assert_eq!(names(&draft7), vec!["$ref"]);
        let later = KeywordRegistry::for_draft(Draft::Draft201909);
        assert_eq!(names(&later), vec!["type", "$ref", "minimum"]);
    }

    #[test]
    fn test_catalog_view() {
        let registry = KeywordRegistry::for_draft(Draft::Draft7);
        assert_eq!(registry.kind_of("minimum"), Some(ValueKind::Number));
        assert_eq!(registry.kind_of("nope"), None);
        assert!(registry.is_documentation("description"));
        assert!(!registry.is_documentation("default"));
    }
}
