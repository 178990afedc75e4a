//! # Keyword Vocabulary — Single Source of Truth
//!
//! Defines the `Keyword` enum covering the Draft-7 vocabulary, the
//! Draft 2019-09 keywords the engine also understands, and the `$cast`
//! extension keyword. Each keyword carries the metadata the rest of the
//! engine needs:
//!
//! - [`ValueKind`]: what shape its value must have inside a schema.
//! - [`Phase`]: where its validator runs in the canonical order.
//! - [`MergeRule`]: how two values combine under intersection.
//! - [`Role`]: whether it supplies defaults, constants, or examples.
//!
//! Custom keywords registered at runtime carry the same metadata through
//! the registry in `schemata-validate`; this enum is the built-in seed.
//!
//! ## Invariant
//!
//! The position of a keyword in [`Keyword::all()`] is its rank inside its
//! phase. Validation order is `(phase, rank)`, so it does not depend on the
//! key order of the schema document.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;
use crate::frozen::Frozen;

/// The seven Draft-7 primitive type names.
pub const SIMPLE_TYPES: &[&str] = &[
    "array", "boolean", "integer", "null", "number", "object", "string",
];

/// The shape a keyword's value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Any frozen value.
    Any,
    /// `true` or `false`.
    Boolean,
    /// A non-negative integer.
    Count,
    /// Any finite number.
    Number,
    /// A number strictly greater than zero.
    PositiveNumber,
    /// A string.
    Text,
    /// An array of distinct strings.
    TextList,
    /// A simple type name or a non-empty array of distinct type names.
    TypeSet,
    /// A schema: an object or a boolean.
    Schema,
    /// A non-empty array of schemas.
    SchemaList,
    /// An object whose values are schemas.
    SchemaMap,
    /// A schema or an array of schemas (`items`).
    ItemSchemas,
    /// An object whose values are schemas or arrays of strings.
    DependencyMap,
    /// An object whose values are arrays of strings.
    TextListMap,
    /// An array of arbitrary values.
    Values,
    /// An array whose entries are cast names or schemas.
    CastChain,
}

impl ValueKind {
    /// Returns the identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Boolean => "boolean",
            Self::Count => "count",
            Self::Number => "number",
            Self::PositiveNumber => "positive_number",
            Self::Text => "text",
            Self::TextList => "text_list",
            Self::TypeSet => "type_set",
            Self::Schema => "schema",
            Self::SchemaList => "schema_list",
            Self::SchemaMap => "schema_map",
            Self::ItemSchemas => "item_schemas",
            Self::DependencyMap => "dependency_map",
            Self::TextListMap => "text_list_map",
            Self::Values => "values",
            Self::CastChain => "cast_chain",
        }
    }

    /// Check the shallow shape of `value`. Nested schemas are checked by
    /// the caller via [`ValueKind::subschemas`].
    pub fn accepts(&self, value: &Frozen) -> bool {
        match self {
            Self::Any => true,
            Self::Boolean => matches!(value, Frozen::Bool(_)),
            Self::Count => value.as_i128().is_some_and(|n| n >= 0),
            Self::Number => value.as_f64().is_some(),
            Self::PositiveNumber => value.as_f64().is_some_and(|n| n > 0.0),
            Self::Text => value.as_str().is_some(),
            Self::TextList => value.as_seq().is_some_and(|items| distinct_texts(items)),
            Self::TypeSet => match value {
                Frozen::Text(name) => SIMPLE_TYPES.contains(&name.as_ref()),
                Frozen::Seq(names) => {
                    !names.is_empty()
                        && distinct_texts(names)
                        && names
                            .iter()
                            .all(|n| n.as_str().is_some_and(|n| SIMPLE_TYPES.contains(&n)))
                }
                _ => false,
            },
            Self::Schema => value.is_schema(),
            Self::SchemaList => value
                .as_seq()
                .is_some_and(|items| !items.is_empty() && items.iter().all(Frozen::is_schema)),
            Self::SchemaMap => value
                .as_map()
                .is_some_and(|map| map.values().all(Frozen::is_schema)),
            Self::ItemSchemas => {
                value.is_schema()
                    || value
                        .as_seq()
                        .is_some_and(|items| items.iter().all(Frozen::is_schema))
            }
            Self::DependencyMap => value.as_map().is_some_and(|map| {
                map.values().all(|v| {
                    v.is_schema() || v.as_seq().is_some_and(|items| distinct_texts(items))
                })
            }),
            Self::TextListMap => value.as_map().is_some_and(|map| {
                map.values()
                    .all(|v| v.as_seq().is_some_and(|items| distinct_texts(items)))
            }),
            Self::Values => value.as_seq().is_some(),
            Self::CastChain => value.as_seq().is_some_and(|items| {
                items
                    .iter()
                    .all(|step| step.as_str().is_some() || step.is_schema())
            }),
        }
    }

    /// The nested schemas held by a value of this kind, each paired with the
    /// pointer token leading to it (`None` when the value is itself a schema).
    pub fn subschemas<'a>(&self, value: &'a Frozen) -> Vec<(Option<String>, &'a Frozen)> {
        match self {
            Self::Schema => vec![(None, value)],
            Self::SchemaList | Self::CastChain => value
                .as_seq()
                .map(|items| {
                    items
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.is_schema())
                        .map(|(i, s)| (Some(i.to_string()), s))
                        .collect()
                })
                .unwrap_or_default(),
            Self::ItemSchemas => match value {
                Frozen::Seq(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (Some(i.to_string()), s))
                    .collect(),
                other => vec![(None, other)],
            },
            Self::SchemaMap | Self::DependencyMap => value
                .as_map()
                .map(|map| {
                    map.iter()
                        .filter(|(_, s)| s.is_schema())
                        .map(|(k, s)| (Some(k.clone()), s))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn distinct_texts(items: &[Frozen]) -> bool {
    let mut seen = std::collections::BTreeSet::new();
    items
        .iter()
        .all(|item| item.as_str().is_some_and(|s| seen.insert(s)))
}

/// A JSON Schema draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Draft {
    #[default]
    #[serde(rename = "draft7")]
    Draft7,
    #[serde(rename = "draft2019-09")]
    Draft201909,
}

impl Draft {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft7 => "draft7",
            Self::Draft201909 => "draft2019-09",
        }
    }
}

impl std::fmt::Display for Draft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation phase. Phases run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Identification and definition keywords. No validators.
    Core,
    /// `type`, `enum`, `const`, `required`.
    Structural,
    /// Applicators combining subschemas: `$ref`, `allOf`, `anyOf`, ...
    Composite,
    /// Value constraints: bounds, patterns, formats, members.
    Constraint,
    /// Documentation and construction hints. No validators.
    Annotation,
}

/// How two values of the same keyword combine when schemas are intersected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRule {
    /// Type sets intersect, with `integer` contained in `number`.
    TypeSet,
    /// Values must be equal.
    Equal,
    /// Enumerations intersect, preserving left order.
    Intersect,
    /// Lower bounds: the larger value wins.
    Lower,
    /// Upper bounds: the smaller value wins.
    Upper,
    /// Name lists union, preserving left order.
    Union,
    /// Boolean flags: either side set means set.
    Either,
    /// Schema maps merge key by key, intersecting shared keys.
    PerKey,
    /// Dependency maps merge key by key; lists union, schemas intersect.
    Dependencies,
    /// Single subschemas intersect.
    Nested,
    /// Arrays concatenate without duplicates.
    Concat,
    /// Branch lists cannot merge; the right side moves into `allOf`.
    Branch,
    /// `not` schemas combine as `not: {anyOf: [left, right]}`.
    Negate,
    /// The right side moves into `allOf`.
    Lift,
    /// The right side replaces the left.
    Override,
}

/// Construction role of a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Supplies the value used when no input is given.
    Default,
    /// Fixes the only admissible value.
    Constant,
    /// Lists illustrative values.
    Examples,
}

/// Built-in keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    #[serde(rename = "$schema")]
    Schema,
    #[serde(rename = "$id")]
    Id,
    #[serde(rename = "$anchor")]
    Anchor,
    #[serde(rename = "$comment")]
    Comment,
    #[serde(rename = "definitions")]
    Definitions,
    #[serde(rename = "$defs")]
    Defs,
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "enum")]
    Enum,
    #[serde(rename = "const")]
    Const,
    #[serde(rename = "required")]
    Required,
    #[serde(rename = "$ref")]
    Ref,
    #[serde(rename = "allOf")]
    AllOf,
    #[serde(rename = "anyOf")]
    AnyOf,
    #[serde(rename = "oneOf")]
    OneOf,
    #[serde(rename = "not")]
    Not,
    #[serde(rename = "if")]
    If,
    #[serde(rename = "then")]
    Then,
    #[serde(rename = "else")]
    Else,
    #[serde(rename = "multipleOf")]
    MultipleOf,
    #[serde(rename = "maximum")]
    Maximum,
    #[serde(rename = "exclusiveMaximum")]
    ExclusiveMaximum,
    #[serde(rename = "minimum")]
    Minimum,
    #[serde(rename = "exclusiveMinimum")]
    ExclusiveMinimum,
    #[serde(rename = "maxLength")]
    MaxLength,
    #[serde(rename = "minLength")]
    MinLength,
    #[serde(rename = "pattern")]
    Pattern,
    #[serde(rename = "format")]
    Format,
    #[serde(rename = "items")]
    Items,
    #[serde(rename = "additionalItems")]
    AdditionalItems,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "maxContains")]
    MaxContains,
    #[serde(rename = "minContains")]
    MinContains,
    #[serde(rename = "maxItems")]
    MaxItems,
    #[serde(rename = "minItems")]
    MinItems,
    #[serde(rename = "uniqueItems")]
    UniqueItems,
    #[serde(rename = "properties")]
    Properties,
    #[serde(rename = "patternProperties")]
    PatternProperties,
    #[serde(rename = "additionalProperties")]
    AdditionalProperties,
    #[serde(rename = "dependencies")]
    Dependencies,
    #[serde(rename = "dependentRequired")]
    DependentRequired,
    #[serde(rename = "dependentSchemas")]
    DependentSchemas,
    #[serde(rename = "propertyNames")]
    PropertyNames,
    #[serde(rename = "maxProperties")]
    MaxProperties,
    #[serde(rename = "minProperties")]
    MinProperties,
    #[serde(rename = "contentEncoding")]
    ContentEncoding,
    #[serde(rename = "contentMediaType")]
    ContentMediaType,
    #[serde(rename = "contentSchema")]
    ContentSchema,
    #[serde(rename = "unevaluatedItems")]
    UnevaluatedItems,
    #[serde(rename = "unevaluatedProperties")]
    UnevaluatedProperties,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "description")]
    Description,
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "examples")]
    Examples,
    #[serde(rename = "readOnly")]
    ReadOnly,
    #[serde(rename = "writeOnly")]
    WriteOnly,
    #[serde(rename = "deprecated")]
    Deprecated,
    /// Cast chain applied before construction-time validation.
    #[serde(rename = "$cast")]
    Cast,
}

impl Keyword {
    /// All built-in keywords in rank order.
    pub fn all() -> &'static [Keyword] {
        &[
            Self::Schema,
            Self::Id,
            Self::Anchor,
            Self::Comment,
            Self::Definitions,
            Self::Defs,
            Self::Type,
            Self::Enum,
            Self::Const,
            Self::Required,
            Self::Ref,
            Self::AllOf,
            Self::AnyOf,
            Self::OneOf,
            Self::Not,
            Self::If,
            Self::Then,
            Self::Else,
            Self::MultipleOf,
            Self::Maximum,
            Self::ExclusiveMaximum,
            Self::Minimum,
            Self::ExclusiveMinimum,
            Self::MaxLength,
            Self::MinLength,
            Self::Pattern,
            Self::Format,
            Self::Items,
            Self::AdditionalItems,
            Self::Contains,
            Self::MaxContains,
            Self::MinContains,
            Self::MaxItems,
            Self::MinItems,
            Self::UniqueItems,
            Self::Properties,
            Self::PatternProperties,
            Self::AdditionalProperties,
            Self::Dependencies,
            Self::DependentRequired,
            Self::DependentSchemas,
            Self::PropertyNames,
            Self::MaxProperties,
            Self::MinProperties,
            Self::ContentEncoding,
            Self::ContentMediaType,
            Self::ContentSchema,
            Self::UnevaluatedItems,
            Self::UnevaluatedProperties,
            Self::Title,
            Self::Description,
            Self::Default,
            Self::Examples,
            Self::ReadOnly,
            Self::WriteOnly,
            Self::Deprecated,
            Self::Cast,
        ]
    }

    /// The keyword as it appears in schema documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "$schema",
            Self::Id => "$id",
            Self::Anchor => "$anchor",
            Self::Comment => "$comment",
            Self::Definitions => "definitions",
            Self::Defs => "$defs",
            Self::Type => "type",
            Self::Enum => "enum",
            Self::Const => "const",
            Self::Required => "required",
            Self::Ref => "$ref",
            Self::AllOf => "allOf",
            Self::AnyOf => "anyOf",
            Self::OneOf => "oneOf",
            Self::Not => "not",
            Self::If => "if",
            Self::Then => "then",
            Self::Else => "else",
            Self::MultipleOf => "multipleOf",
            Self::Maximum => "maximum",
            Self::ExclusiveMaximum => "exclusiveMaximum",
            Self::Minimum => "minimum",
            Self::ExclusiveMinimum => "exclusiveMinimum",
            Self::MaxLength => "maxLength",
            Self::MinLength => "minLength",
            Self::Pattern => "pattern",
            Self::Format => "format",
            Self::Items => "items",
            Self::AdditionalItems => "additionalItems",
            Self::Contains => "contains",
            Self::MaxContains => "maxContains",
            Self::MinContains => "minContains",
            Self::MaxItems => "maxItems",
            Self::MinItems => "minItems",
            Self::UniqueItems => "uniqueItems",
            Self::Properties => "properties",
            Self::PatternProperties => "patternProperties",
            Self::AdditionalProperties => "additionalProperties",
            Self::Dependencies => "dependencies",
            Self::DependentRequired => "dependentRequired",
            Self::DependentSchemas => "dependentSchemas",
            Self::PropertyNames => "propertyNames",
            Self::MaxProperties => "maxProperties",
            Self::MinProperties => "minProperties",
            Self::ContentEncoding => "contentEncoding",
            Self::ContentMediaType => "contentMediaType",
            Self::ContentSchema => "contentSchema",
            Self::UnevaluatedItems => "unevaluatedItems",
            Self::UnevaluatedProperties => "unevaluatedProperties",
            Self::Title => "title",
            Self::Description => "description",
            Self::Default => "default",
            Self::Examples => "examples",
            Self::ReadOnly => "readOnly",
            Self::WriteOnly => "writeOnly",
            Self::Deprecated => "deprecated",
            Self::Cast => "$cast",
        }
    }

    /// Rank of this keyword inside its phase.
    pub fn rank(&self) -> usize {
        Self::all()
            .iter()
            .position(|k| k == self)
            .unwrap_or(usize::MAX)
    }

    /// The value kind this keyword requires.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Schema | Self::Id | Self::Anchor | Self::Comment | Self::Ref => ValueKind::Text,
            Self::Title | Self::Description | Self::Pattern | Self::Format => ValueKind::Text,
            Self::ContentEncoding | Self::ContentMediaType => ValueKind::Text,
            Self::Definitions | Self::Defs | Self::Properties | Self::PatternProperties => {
                ValueKind::SchemaMap
            }
            Self::DependentSchemas => ValueKind::SchemaMap,
            Self::Type => ValueKind::TypeSet,
            Self::Enum | Self::Examples => ValueKind::Values,
            Self::Const | Self::Default => ValueKind::Any,
            Self::Required => ValueKind::TextList,
            Self::AllOf | Self::AnyOf | Self::OneOf => ValueKind::SchemaList,
            Self::Not | Self::If | Self::Then | Self::Else => ValueKind::Schema,
            Self::AdditionalItems | Self::Contains | Self::AdditionalProperties => {
                ValueKind::Schema
            }
            Self::PropertyNames | Self::ContentSchema => ValueKind::Schema,
            Self::UnevaluatedItems | Self::UnevaluatedProperties => ValueKind::Schema,
            Self::MultipleOf => ValueKind::PositiveNumber,
            Self::Maximum | Self::ExclusiveMaximum | Self::Minimum | Self::ExclusiveMinimum => {
                ValueKind::Number
            }
            Self::MaxLength | Self::MinLength | Self::MaxItems | Self::MinItems => ValueKind::Count,
            Self::MaxContains | Self::MinContains => ValueKind::Count,
            Self::MaxProperties | Self::MinProperties => ValueKind::Count,
            Self::UniqueItems | Self::ReadOnly | Self::WriteOnly | Self::Deprecated => {
                ValueKind::Boolean
            }
            Self::Items => ValueKind::ItemSchemas,
            Self::Dependencies => ValueKind::DependencyMap,
            Self::DependentRequired => ValueKind::TextListMap,
            Self::Cast => ValueKind::CastChain,
        }
    }

    /// The validation phase of this keyword.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Schema | Self::Id | Self::Anchor | Self::Comment => Phase::Core,
            Self::Definitions | Self::Defs => Phase::Core,
            Self::Type | Self::Enum | Self::Const | Self::Required => Phase::Structural,
            Self::Ref | Self::AllOf | Self::AnyOf | Self::OneOf | Self::Not => Phase::Composite,
            Self::If | Self::Then | Self::Else => Phase::Composite,
            Self::Title
            | Self::Description
            | Self::Default
            | Self::Examples
            | Self::ReadOnly
            | Self::WriteOnly
            | Self::Deprecated
            | Self::Cast => Phase::Annotation,
            _ => Phase::Constraint,
        }
    }

    /// How two values of this keyword combine under intersection.
    pub fn merge_rule(&self) -> MergeRule {
        match self {
            Self::Type => MergeRule::TypeSet,
            Self::Const | Self::Format | Self::ContentEncoding | Self::ContentMediaType => {
                MergeRule::Equal
            }
            Self::Enum => MergeRule::Intersect,
            Self::Minimum | Self::ExclusiveMinimum => MergeRule::Lower,
            Self::MinLength | Self::MinItems | Self::MinProperties => MergeRule::Lower,
            Self::Maximum | Self::ExclusiveMaximum => MergeRule::Upper,
            Self::MaxLength | Self::MaxItems | Self::MaxProperties => MergeRule::Upper,
            Self::Required => MergeRule::Union,
            Self::UniqueItems => MergeRule::Either,
            Self::Properties | Self::PatternProperties | Self::Definitions | Self::Defs => {
                MergeRule::PerKey
            }
            Self::DependentSchemas => MergeRule::PerKey,
            Self::Dependencies | Self::DependentRequired => MergeRule::Dependencies,
            Self::PropertyNames | Self::Items | Self::AdditionalItems => MergeRule::Nested,
            Self::AdditionalProperties => MergeRule::Nested,
            Self::AllOf | Self::Cast => MergeRule::Concat,
            Self::AnyOf | Self::OneOf => MergeRule::Branch,
            Self::Not => MergeRule::Negate,
            Self::Ref | Self::If | Self::Then | Self::Else => MergeRule::Lift,
            Self::MultipleOf | Self::Pattern | Self::Contains => MergeRule::Lift,
            Self::MaxContains | Self::MinContains | Self::ContentSchema => MergeRule::Lift,
            Self::UnevaluatedItems | Self::UnevaluatedProperties => MergeRule::Lift,
            Self::Schema | Self::Id | Self::Anchor | Self::Comment => MergeRule::Override,
            Self::Title | Self::Description | Self::Default | Self::Examples => MergeRule::Override,
            Self::ReadOnly | Self::WriteOnly | Self::Deprecated => MergeRule::Override,
        }
    }

    /// Construction role, if any.
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Default => Some(Role::Default),
            Self::Const => Some(Role::Constant),
            Self::Examples => Some(Role::Examples),
            _ => None,
        }
    }

    /// The first draft defining this keyword. `$cast` is an engine
    /// extension available under every draft.
    pub fn since(&self) -> Draft {
        match self {
            Self::Defs
            | Self::Anchor
            | Self::DependentRequired
            | Self::DependentSchemas
            | Self::MaxContains
            | Self::MinContains
            | Self::UnevaluatedItems
            | Self::UnevaluatedProperties
            | Self::Deprecated
            | Self::ContentSchema => Draft::Draft201909,
            _ => Draft::Draft7,
        }
    }

    /// Documentation-only keywords. They are excluded from schema identity.
    pub fn is_documentation(&self) -> bool {
        matches!(self, Self::Title | Self::Description | Self::Comment)
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Keyword {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::UnknownKeyword {
                keyword: s.to_string(),
                path: String::new(),
            })
    }
}

/// Resolves keyword names to value kinds.
///
/// Implemented by the keyword registry; schema construction and
/// canonicalization only need this narrow view of it.
pub trait KeywordCatalog {
    /// The value kind of a registered keyword, or `None` if unregistered.
    fn kind_of(&self, name: &str) -> Option<ValueKind>;

    /// True if the keyword is documentation-only.
    fn is_documentation(&self, name: &str) -> bool {
        Keyword::from_str(name).is_ok_and(|k| k.is_documentation())
    }
}

/// The built-in vocabulary with no custom keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl KeywordCatalog for BuiltinCatalog {
    fn kind_of(&self, name: &str) -> Option<ValueKind> {
        Keyword::from_str(name).ok().map(|k| k.kind())
    }
}
