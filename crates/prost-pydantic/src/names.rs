//! Python identifiers for types, fields and enum values.
//!
//! Resolution is a pure function of the declared name, the reserved set and
//! the configured suffix, so repeated runs produce identical names.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::GeneratorConfig;
use crate::error::{Error, Location, NameCollisionError};
use crate::schema::{EnumNode, FileNode, MessageNode, SchemaIndex, TypeNode};

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

// Builtins that would shadow names used inside generated annotations.
const PYTHON_BUILTINS: &[&str] = &[
    "int", "float", "bool", "str", "bytes", "list", "dict", "set", "tuple", "type", "object",
    "range", "map", "filter", "id", "hash", "len", "max", "min", "sum", "abs", "round", "complex",
    "frozenset", "memoryview", "bytearray", "property", "classmethod", "staticmethod", "super",
];

const PYDANTIC_ATTRIBUTES: &[&str] = &[
    "model_config",
    "model_fields",
    "model_computed_fields",
    "model_extra",
    "model_fields_set",
    "model_construct",
    "model_copy",
    "model_dump",
    "model_dump_json",
    "model_json_schema",
    "model_parametrized_name",
    "model_post_init",
    "model_rebuild",
    "model_validate",
    "model_validate_json",
    "model_validate_strings",
];

/// Names exported by the generated runtime module.
pub(crate) const RUNTIME_NAMES: &[&str] = &[
    "ProtoModel",
    "ProtoInt32",
    "ProtoUInt32",
    "ProtoInt64",
    "ProtoUInt64",
    "ProtoTimestamp",
    "ProtoDuration",
];

static FIRST_CAP: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new("([a-z0-9])([A-Z])").unwrap()
});

static ALL_CAP: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new("([A-Z])([A-Z][a-z])").unwrap()
});

/// Returns true if `s` is a valid ASCII Python identifier.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The JSON name protoc derives for a field: underscores dropped, the
/// following letter upper-cased.
pub(crate) fn json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `UPPER_SNAKE` form of a CamelCase enum name, used as the value prefix.
fn upper_snake(name: &str) -> String {
    let snake = FIRST_CAP.replace_all(name, "${1}_${2}");
    ALL_CAP.replace_all(&snake, "${1}_${2}").to_uppercase()
}

/// A set of identifiers that must be renamed.
#[derive(Debug, Clone, Default)]
pub struct ReservedWords {
    words: BTreeSet<String>,
}

impl ReservedWords {
    /// Build a reserved set from arbitrary words.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    /// Reserved words for model fields: keywords, shadowing builtins and
    /// Pydantic model attributes, plus the user's list.
    #[must_use]
    pub fn for_fields(config: &GeneratorConfig) -> Self {
        Self::from_lists(
            &[PYTHON_KEYWORDS, PYTHON_BUILTINS, PYDANTIC_ATTRIBUTES],
            config,
        )
    }

    /// Reserved words for generated classes: keywords, shadowing builtins and
    /// runtime module exports, plus the user's list.
    #[must_use]
    pub fn for_types(config: &GeneratorConfig) -> Self {
        Self::from_lists(&[PYTHON_KEYWORDS, PYTHON_BUILTINS, RUNTIME_NAMES], config)
    }

    /// Reserved words for enum members.
    #[must_use]
    pub fn for_enum_values(config: &GeneratorConfig) -> Self {
        Self::from_lists(&[PYTHON_KEYWORDS, &["mro"]], config)
    }

    fn from_lists(lists: &[&[&str]], config: &GeneratorConfig) -> Self {
        let mut reserved = Self::new(lists.iter().flat_map(|list| list.iter().copied()));
        reserved.words.extend(config.reserved_names.iter().cloned());
        reserved
    }

    /// Returns true if `name` must be renamed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.words.contains(name)
    }
}

/// A resolved identifier and whether it differs from the declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// The Python identifier.
    pub name: String,
    /// Set when the declared name was reserved and got the suffix.
    pub renamed: bool,
}

/// Resolve one declared name against a reserved set.
///
/// # Errors
///
/// Returns the collision cause when the suffixed name is reserved as well.
pub fn resolve_identifier(
    name: &str,
    reserved: &ReservedWords,
    suffix: &str,
) -> Result<ResolvedName, String> {
    if !reserved.contains(name) {
        return Ok(ResolvedName {
            name: name.to_string(),
            renamed: false,
        });
    }
    let candidate = format!("{name}{suffix}");
    if reserved.contains(&candidate) {
        return Err(format!(
            "`{name}` is reserved and its suffixed form `{candidate}` is reserved too"
        ));
    }
    Ok(ResolvedName {
        name: candidate,
        renamed: true,
    })
}

/// Tracks identifiers already assigned inside one Python scope.
struct NameScope<'r> {
    reserved: &'r ReservedWords,
    suffix: &'r str,
    taken: HashMap<String, String>,
}

impl<'r> NameScope<'r> {
    fn new(reserved: &'r ReservedWords, suffix: &'r str) -> Self {
        Self {
            reserved,
            suffix,
            taken: HashMap::new(),
        }
    }

    fn assign(
        &mut self,
        declared: &str,
        location: impl Fn() -> Location,
    ) -> Result<ResolvedName, NameCollisionError> {
        let resolved =
            resolve_identifier(declared, self.reserved, self.suffix).map_err(|cause| {
                NameCollisionError {
                    location: location(),
                    cause,
                }
            })?;
        if let Some(previous) = self.taken.get(&resolved.name) {
            return Err(NameCollisionError {
                location: location(),
                cause: format!(
                    "resolves to `{}`, which is already used by `{previous}`",
                    resolved.name
                ),
            });
        }
        self.taken
            .insert(resolved.name.clone(), declared.to_string());
        Ok(resolved)
    }
}

/// Python class names for every emitted message and enum, keyed by full name.
#[derive(Debug, Clone, Default)]
pub struct TypeNames {
    names: HashMap<String, String>,
    members: HashMap<String, Vec<String>>,
}

impl TypeNames {
    /// The class name for a message or enum.
    #[must_use]
    pub fn get(&self, full_name: &str) -> Option<&str> {
        self.names.get(full_name).map(String::as_str)
    }

    /// The member name of the `index`-th value of an enum.
    #[must_use]
    pub fn member(&self, enum_name: &str, index: usize) -> Option<&str> {
        self.members
            .get(enum_name)
            .and_then(|members| members.get(index))
            .map(String::as_str)
    }

    /// Names as the generated module of `file` sees them. A class imported
    /// from another file whose name is already bound in the module, by a
    /// local declaration or an earlier import, is bound under an alias
    /// prefixed with its package (`pkg_v1_Money`).
    #[must_use]
    pub fn scoped(&self, index: &SchemaIndex, file: &FileNode) -> TypeNames {
        let mut scoped = self.clone();
        let mut taken: BTreeSet<String> = declarations(index, file)
            .iter()
            .filter_map(|full_name| self.get(full_name).map(ToString::to_string))
            .collect();
        for full_name in referenced_types(index, file) {
            let Some(declaring) = index.declaring_file(&full_name) else {
                continue;
            };
            let Some(class) = self.get(&full_name) else {
                continue;
            };
            if declaring == file.name {
                continue;
            }
            if taken.insert(class.to_string()) {
                continue;
            }
            let prefix = index
                .file(declaring)
                .map(|origin| {
                    if origin.package.is_empty() {
                        declaring.trim_end_matches(".proto").replace(['/', '.', '-'], "_")
                    } else {
                        origin.package.replace('.', "_")
                    }
                })
                .unwrap_or_default();
            let mut alias = format!("{prefix}_{class}");
            while !taken.insert(alias.clone()) {
                alias.push('_');
            }
            tracing::debug!(file = %file.name, %full_name, %alias, "aliased imported class");
            scoped.names.insert(full_name, alias);
        }
        scoped
    }
}

/// Computes identifiers from an immutable configuration.
#[derive(Debug, Clone)]
pub struct NameResolver {
    fields: ReservedWords,
    types: ReservedWords,
    enum_values: ReservedWords,
    suffix: String,
    preserving_proto_field_name: bool,
    auto_trim_enum_prefix: bool,
}

impl NameResolver {
    /// Build a resolver for `config`.
    #[must_use]
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            fields: ReservedWords::for_fields(config),
            types: ReservedWords::for_types(config),
            enum_values: ReservedWords::for_enum_values(config),
            suffix: config.keyword_suffix.clone(),
            preserving_proto_field_name: config.preserving_proto_field_name,
            auto_trim_enum_prefix: config.auto_trim_enum_prefix,
        }
    }

    /// Assign class names to every message and enum of every indexed file,
    /// and member names to every enum value.
    ///
    /// Nested declarations flatten with `_` (`Outer.Inner` → `Outer_Inner`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameCollision`] when two declarations of one file
    /// resolve to the same class name.
    pub fn type_names(&self, index: &SchemaIndex) -> Result<TypeNames, Error> {
        let mut names = HashMap::new();
        let mut members = HashMap::new();
        for file in index.files() {
            let mut scope = NameScope::new(&self.types, &self.suffix);
            for full_name in declarations(index, file) {
                let flat = flat_name(&file.package, &full_name);
                let resolved =
                    scope.assign(&flat, || Location::new(full_name.clone()).in_file(&file.name))?;
                if let Some(enumeration) = index.enumeration(&full_name) {
                    let values = self.enum_value_names(enumeration)?;
                    members.insert(
                        full_name.clone(),
                        values.into_iter().map(|value| value.name).collect(),
                    );
                }
                names.insert(full_name, resolved.name);
            }
        }
        Ok(TypeNames { names, members })
    }

    /// Resolve every field name of `message`, in field order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameCollision`] when two fields resolve to the same
    /// identifier or a name would become a Pydantic private attribute.
    pub fn field_names(&self, message: &MessageNode) -> Result<Vec<ResolvedName>, Error> {
        let mut scope = NameScope::new(&self.fields, &self.suffix);
        let mut resolved = Vec::with_capacity(message.fields.len());
        for field in &message.fields {
            let declared = if self.preserving_proto_field_name {
                field.name.as_str()
            } else {
                field.json_name.as_str()
            };
            let location = || {
                Location::new(field.full_name.clone())
                    .in_file(&message.file)
                    .at(field.span)
            };
            if declared.starts_with('_') {
                return Err(NameCollisionError {
                    location: location(),
                    cause: format!(
                        "`{declared}` starts with `_`, which Pydantic reserves for private attributes"
                    ),
                }
                .into());
            }
            resolved.push(scope.assign(declared, location)?);
        }
        Ok(resolved)
    }

    /// Resolve every value name of `enumeration`, in value order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameCollision`] when prefix trimming or suffixing makes
    /// two values share a member name.
    pub fn enum_value_names(&self, enumeration: &EnumNode) -> Result<Vec<ResolvedName>, Error> {
        let prefix = format!("{}_", upper_snake(&enumeration.name));
        let mut scope = NameScope::new(&self.enum_values, &self.suffix);
        let mut resolved = Vec::with_capacity(enumeration.values.len());
        for value in &enumeration.values {
            let declared = match value.name.strip_prefix(&prefix) {
                Some(rest) if self.auto_trim_enum_prefix && is_identifier(rest) => rest,
                _ => value.name.as_str(),
            };
            let location = || {
                Location::new(format!("{}.{}", enumeration.full_name, value.name))
                    .in_file(&enumeration.file)
            };
            resolved.push(scope.assign(declared, location)?);
        }
        Ok(resolved)
    }
}

/// All emitted declarations of a file in emission order: nested before parent,
/// enums before messages. Map entries are skipped.
pub(crate) fn declarations(index: &SchemaIndex, file: &FileNode) -> Vec<String> {
    let mut enums = file.enums.clone();
    let mut messages = Vec::new();
    for name in &file.messages {
        collect_message(index, name, &mut enums, &mut messages);
    }
    enums.extend(messages);
    enums
}

fn collect_message(
    index: &SchemaIndex,
    full_name: &str,
    enums: &mut Vec<String>,
    messages: &mut Vec<String>,
) {
    let Some(message) = index.message(full_name) else {
        return;
    };
    if message.map_entry {
        return;
    }
    enums.extend(message.nested_enums.iter().cloned());
    for nested in &message.nested_messages {
        collect_message(index, nested, enums, messages);
    }
    messages.push(full_name.to_string());
}

/// Full names of the messages and enums that fields declared in `file` refer to.
pub(crate) fn referenced_types(index: &SchemaIndex, file: &FileNode) -> BTreeSet<String> {
    fn collect(type_node: &TypeNode, out: &mut BTreeSet<String>) {
        match type_node {
            TypeNode::Message(name) | TypeNode::Enum(name) => {
                out.insert(name.clone());
            }
            TypeNode::Map(key, value) => {
                collect(key, out);
                collect(value, out);
            }
            TypeNode::Scalar(_) | TypeNode::WellKnown(_) => {}
        }
    }

    let mut types = BTreeSet::new();
    for full_name in declarations(index, file) {
        if let Some(message) = index.message(&full_name) {
            for field in &message.fields {
                collect(&field.type_node, &mut types);
            }
        }
    }
    types
}

fn flat_name(package: &str, full_name: &str) -> String {
    let relative = if package.is_empty() {
        full_name
    } else {
        full_name
            .strip_prefix(package)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(full_name)
    };
    relative.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use prost_types::field_descriptor_proto::Type;

    use super::{
        NameResolver, ReservedWords, declarations, json_name, resolve_identifier, upper_snake,
    };
    use crate::config::{GeneratorConfig, GeneratorOption};
    use crate::constraints::RuleSet;
    use crate::error::Error;
    use crate::schema::SchemaIndex;
    use crate::test_support::{enumeration, file, message, scalar};

    fn build_index(f: prost_types::FileDescriptorProto) -> SchemaIndex {
        SchemaIndex::build(&[f], &RuleSet::default()).expect("index builds")
    }

    #[test]
    fn reserved_field_names_get_the_suffix() {
        let mut f = file("kw.proto", "pkg");
        f.message_type.push(message(
            "Keywords",
            vec![
                scalar("class", 1, Type::String),
                scalar("model_config", 2, Type::String),
                scalar("type", 3, Type::Int32),
                scalar("plain", 4, Type::Bool),
            ],
        ));
        let index = build_index(f);
        let resolver = NameResolver::new(&GeneratorConfig::default());

        let names = resolver
            .field_names(index.message("pkg.Keywords").expect("Keywords"))
            .expect("names resolve");
        let rendered: Vec<_> = names.iter().map(|n| (n.name.as_str(), n.renamed)).collect();
        assert_eq!(
            rendered,
            vec![
                ("class_", true),
                ("model_config_", true),
                ("type_", true),
                ("plain", false),
            ]
        );
    }

    #[test]
    fn suffix_colliding_with_declared_field_is_reported() {
        let mut f = file("kw.proto", "pkg");
        f.message_type.push(message(
            "Clash",
            vec![
                scalar("class_", 1, Type::String),
                scalar("class", 2, Type::String),
            ],
        ));
        let index = build_index(f);
        let resolver = NameResolver::new(&GeneratorConfig::default());

        let err = resolver
            .field_names(index.message("pkg.Clash").expect("Clash"))
            .expect_err("collision");
        let Error::NameCollision(err) = err else {
            panic!("expected name collision, got {err:?}");
        };
        assert_eq!(err.location.entity, "pkg.Clash.class");
        assert_eq!(
            err.cause,
            "resolves to `class_`, which is already used by `class_`"
        );
    }

    #[test]
    fn leading_underscore_fields_are_rejected() {
        let mut f = file("p.proto", "pkg");
        f.message_type
            .push(message("Private", vec![scalar("_secret", 1, Type::String)]));
        let index = build_index(f);
        let resolver = NameResolver::new(&GeneratorConfig::default());
        assert!(
            resolver
                .field_names(index.message("pkg.Private").expect("Private"))
                .is_err()
        );
    }

    #[test]
    fn json_field_names_follow_protoc() {
        assert_eq!(json_name("display_name"), "displayName");
        assert_eq!(json_name("a_b_c"), "aBC");
        assert_eq!(json_name("plain"), "plain");

        let mut f = file("j.proto", "pkg");
        f.message_type
            .push(message("J", vec![scalar("display_name", 1, Type::String)]));
        let index = build_index(f);
        let config = GeneratorConfig::with_options(&[GeneratorOption::PreservingProtoFieldName(
            false,
        )])
        .expect("valid");
        let names = NameResolver::new(&config)
            .field_names(index.message("pkg.J").expect("J"))
            .expect("resolves");
        assert_eq!(names[0].name, "displayName");
    }

    #[test]
    fn enum_prefixes_are_trimmed_unless_that_breaks_the_identifier() {
        assert_eq!(upper_snake("HTTPStatus"), "HTTP_STATUS");
        assert_eq!(upper_snake("PhoneType"), "PHONE_TYPE");

        let mut f = file("e.proto", "pkg");
        f.enum_type.push(enumeration(
            "PhoneType",
            &[
                ("PHONE_TYPE_UNSPECIFIED", 0),
                ("PHONE_TYPE_1ST", 1),
                ("PHONE_TYPE_NONE", 2),
                ("OTHER", 3),
            ],
        ));
        let index = build_index(f);
        let names = NameResolver::new(&GeneratorConfig::default())
            .enum_value_names(index.enumeration("pkg.PhoneType").expect("PhoneType"))
            .expect("resolves");
        let rendered: Vec<_> = names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(rendered, vec!["UNSPECIFIED", "PHONE_TYPE_1ST", "NONE", "OTHER"]);

        let untrimmed = GeneratorConfig::with_options(&[GeneratorOption::AutoTrimEnumPrefix(
            false,
        )])
        .expect("valid");
        let names = NameResolver::new(&untrimmed)
            .enum_value_names(index.enumeration("pkg.PhoneType").expect("PhoneType"))
            .expect("resolves");
        assert_eq!(names[0].name, "PHONE_TYPE_UNSPECIFIED");
    }

    #[test]
    fn nested_types_flatten_and_collisions_fail() {
        let mut outer = message("Outer", vec![]);
        outer.nested_type.push(message("Inner", vec![]));
        outer
            .enum_type
            .push(enumeration("Kind", &[("KIND_UNSPECIFIED", 0)]));
        let mut f = file("n.proto", "pkg");
        f.message_type.push(outer);
        f.message_type.push(message("int", vec![]));
        let index = build_index(f);
        let resolver = NameResolver::new(&GeneratorConfig::default());
        let names = resolver.type_names(&index).expect("resolves");
        assert_eq!(names.get("pkg.Outer.Inner"), Some("Outer_Inner"));
        assert_eq!(names.get("pkg.Outer.Kind"), Some("Outer_Kind"));
        assert_eq!(names.get("pkg.int"), Some("int_"));
        assert_eq!(names.member("pkg.Outer.Kind", 0), Some("UNSPECIFIED"));
        assert_eq!(names.member("pkg.Outer.Kind", 1), None);
        assert_eq!(
            declarations(&index, &index.files()[0]),
            vec!["pkg.Outer.Kind", "pkg.Outer.Inner", "pkg.Outer", "pkg.int"]
        );

        let mut outer = message("Outer", vec![]);
        outer.nested_type.push(message("Inner", vec![]));
        let mut f = file("n.proto", "pkg");
        f.message_type.push(outer);
        f.message_type.push(message("Outer_Inner", vec![]));
        let err = resolver.type_names(&build_index(f)).expect_err("collision");
        assert!(matches!(err, Error::NameCollision(_)));
    }

    #[test]
    fn user_reserved_names_are_renamed() {
        let config = GeneratorConfig::from_parameter("reserved_names=schema:json,keyword_suffix=_pb")
            .expect("valid");
        let reserved = ReservedWords::for_fields(&config);
        let resolved = resolve_identifier("schema", &reserved, "_pb").expect("resolves");
        assert_eq!(resolved.name, "schema_pb");
        assert!(resolved.renamed);
    }

    proptest! {
        #[test]
        fn resolution_is_total_and_deterministic(
            name in "[a-z][a-z0-9_]{0,12}",
            extra in proptest::collection::vec("[a-z][a-z0-9]{0,8}", 0..8),
        ) {
            let mut words = extra.clone();
            words.push(name.clone());
            let reserved = ReservedWords::new(words);
            let first = resolve_identifier(&name, &reserved, "_");
            let second = resolve_identifier(&name, &reserved, "_");
            prop_assert_eq!(&first, &second);
            if let Ok(resolved) = first {
                prop_assert!(!reserved.contains(&resolved.name));
                prop_assert!(resolved.renamed);
            }
        }
    }
}
