//! `buf.validate` rules to Pydantic field arguments and validators.
//!
//! Rules are translated per family, one module each, mirroring the layout of
//! `buf.validate.FieldRules`. A rule with no Pydantic equivalent is never
//! silently lost: it becomes a [`Diagnostic`] plus a
//! `# buf.validate: <rule> (not translated)` comment next to the field.
//! Rules that cannot hold together fail the run with
//! [`Error::ConstraintConflict`] before anything is emitted.

mod collection;
mod enum_rules;
mod lookups;
mod message;
mod number;
mod raw;
mod string;
mod time;

pub use message::{MessageConstraints, OneofCheck};
pub use raw::{
    CelRule, EnumValueOptions, MessageOneofRule, MessageRules, RawConstraints, RuleSet, RuleValue,
};

use crate::error::{ConstraintConflictError, Diagnostic, Error, Location};
use crate::names::TypeNames;
use crate::python::ImportSet;
use crate::python::literal::{py_quote, py_quote_single};
use crate::schema::{Cardinality, FieldNode, ScalarKind, SchemaIndex, TypeNode};
use crate::types::DefaultValue;

/// One `examples=[...]` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Example {
    /// Rendered Python code (numbers, booleans, constructor calls).
    Code(String),
    /// Text, quoted at render time.
    Text(String),
}

/// Keyword arguments and validators constraining one value.
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct Metadata {
    pub gt: Option<String>,
    pub ge: Option<String>,
    pub lt: Option<String>,
    pub le: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    /// Regular expression source, unquoted.
    pub pattern: Option<String>,
    pub examples: Vec<Example>,
    /// Rendered `_AfterValidator(...)`/`_BeforeValidator(...)` expressions.
    pub validators: Vec<String>,
    /// Imports the kwargs and validators need.
    pub imports: ImportSet,
}

impl Metadata {
    /// Returns true when nothing constrains the value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty() && self.kwargs(false).is_empty()
    }

    /// `Field(...)` keyword arguments in a fixed order. `nested` selects
    /// single-quoted strings for use inside a quoted annotation.
    #[must_use]
    pub fn kwargs(&self, nested: bool) -> Vec<String> {
        let quote: fn(&str) -> String = if nested { py_quote_single } else { py_quote };
        let mut kwargs = Vec::new();
        let bounds = [("ge", &self.ge), ("gt", &self.gt), ("le", &self.le), ("lt", &self.lt)];
        for (name, value) in bounds {
            if let Some(value) = value {
                kwargs.push(format!("{name}={value}"));
            }
        }
        if let Some(min) = self.min_length {
            kwargs.push(format!("min_length={min}"));
        }
        if let Some(max) = self.max_length {
            kwargs.push(format!("max_length={max}"));
        }
        if let Some(pattern) = &self.pattern {
            kwargs.push(format!("pattern={}", quote(pattern)));
        }
        if !self.examples.is_empty() {
            let examples: Vec<String> = self
                .examples
                .iter()
                .map(|example| match example {
                    Example::Code(code) => code.clone(),
                    Example::Text(text) => quote(text),
                })
                .collect();
            kwargs.push(format!("examples=[{}]", examples.join(", ")));
        }
        kwargs
    }

    /// `Annotated` metadata for an element type: a `_Field(...)` carrying the
    /// kwargs, then the validators.
    #[must_use]
    pub fn annotation_metadata(&self) -> Vec<String> {
        let kwargs = self.kwargs(true);
        let mut metadata = Vec::with_capacity(self.validators.len() + 1);
        if !kwargs.is_empty() {
            metadata.push(format!("_Field({})", kwargs.join(", ")));
        }
        metadata.extend(self.validators.iter().cloned());
        metadata
    }

    pub(crate) fn after(&mut self, helper: &'static str, call: impl Into<String>) {
        self.imports.pydantic("AfterValidator");
        self.imports.runtime(helper);
        self.validators
            .push(format!("_AfterValidator({})", call.into()));
    }

    pub(crate) fn before(&mut self, helper: &'static str, call: impl Into<String>) {
        self.imports.pydantic("BeforeValidator");
        self.imports.runtime(helper);
        self.validators
            .push(format!("_BeforeValidator({})", call.into()));
    }

    fn raise_min_length(&mut self, min: u64) {
        self.min_length = Some(self.min_length.map_or(min, |current| current.max(min)));
    }
}

/// A `const` rule: the value's only admissible state.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    /// Contents of a `_Literal[...]` narrowing, when the value can be a literal type.
    pub literal: Option<String>,
    /// The default the field takes.
    pub default: DefaultValue,
}

/// Translated rules for one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translated {
    /// Keyword arguments and validators.
    pub metadata: Metadata,
    /// The `const` rule, if any.
    pub constant: Option<Constant>,
}

/// Translated `buf.validate.field` rules of one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldConstraints {
    /// Rules on the field value itself.
    pub value: Translated,
    /// `repeated.items` rules.
    pub items: Option<Translated>,
    /// `map.keys` rules.
    pub keys: Option<Translated>,
    /// `map.values` rules.
    pub values: Option<Translated>,
    /// The field must be supplied and cannot be `None`.
    pub required: bool,
    /// The field's zero default must pass the value rules too.
    pub validate_default: bool,
    /// The value rules are skipped for the zero value (`IGNORE_IF_ZERO_VALUE`).
    pub skip_zero: bool,
    /// Names of rules that were not translated, sorted.
    pub dropped: Vec<String>,
}

impl FieldConstraints {
    /// Every import the translated rules need.
    #[must_use]
    pub fn imports(&self) -> ImportSet {
        let mut imports = self.value.metadata.imports.clone();
        for element in [&self.items, &self.keys, &self.values].into_iter().flatten() {
            imports.extend(&element.metadata.imports);
            if element.constant.as_ref().is_some_and(|c| c.literal.is_some()) {
                imports.typing("Literal");
            }
        }
        if self.value.constant.as_ref().is_some_and(|c| c.literal.is_some()) {
            imports.typing("Literal");
        }
        imports
    }
}

/// Translation state for one field: where errors point and what was dropped.
pub(crate) struct Scope<'s> {
    location: &'s Location,
    prefix: String,
    dropped: Vec<String>,
    diagnostics: &'s mut Vec<Diagnostic>,
}

impl<'s> Scope<'s> {
    fn new(location: &'s Location, diagnostics: &'s mut Vec<Diagnostic>) -> Self {
        Self {
            location,
            prefix: String::new(),
            dropped: Vec::new(),
            diagnostics,
        }
    }

    /// A scope for element rules, naming dropped rules under `segment`.
    fn nested(&mut self, segment: &str) -> Scope<'_> {
        Scope {
            location: self.location,
            prefix: format!("{}{segment}.", self.prefix),
            dropped: Vec::new(),
            diagnostics: &mut *self.diagnostics,
        }
    }

    fn merge(&mut self, dropped: Vec<String>) {
        self.dropped.extend(dropped);
    }

    fn drop_rule(&mut self, rule: &str) {
        let name = format!("{}{rule}", self.prefix);
        self.diagnostics.push(Diagnostic::warning(
            self.location.clone(),
            format!("rule `{name}` is not translated"),
        ));
        self.dropped.push(name);
    }

    fn note(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::note(self.location.clone(), message));
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(self.location.clone(), message));
    }

    fn conflict(&self, cause: impl Into<String>) -> Error {
        ConstraintConflictError {
            location: self.location.clone(),
            cause: cause.into(),
        }
        .into()
    }

    fn drop_cel(&mut self, raw: &RawConstraints) {
        self.drop_cel_rules(&raw.cel);
    }

    fn drop_cel_rules(&mut self, rules: &[CelRule]) {
        for rule in rules {
            let name = format!("{}cel", self.prefix);
            let id = if rule.id.is_empty() {
                "<unnamed>"
            } else {
                rule.id.as_str()
            };
            self.diagnostics.push(Diagnostic::warning(
                self.location.clone(),
                format!("CEL rule `{id}` (`{}`) is not translated", rule.expression),
            ));
            if !self.dropped.contains(&name) {
                self.dropped.push(name);
            }
        }
    }
}

/// Translates raw rules against the resolved schema.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintTranslator<'a> {
    index: &'a SchemaIndex,
    names: &'a TypeNames,
    enabled: bool,
}

impl<'a> ConstraintTranslator<'a> {
    /// Build a translator; with `enabled` unset every field translates to nothing.
    #[must_use]
    pub fn new(index: &'a SchemaIndex, names: &'a TypeNames, enabled: bool) -> Self {
        Self {
            index,
            names,
            enabled,
        }
    }

    /// Translate the rules attached to `field`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConstraintConflict`] when rules contradict each other
    /// or do not apply to the field's type.
    pub fn translate_field(
        &self,
        field: &FieldNode,
        location: &Location,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<FieldConstraints, Error> {
        let raw = &field.constraints;
        let mut out = FieldConstraints::default();
        if !self.enabled || raw.is_empty() {
            return Ok(out);
        }
        let mut scope = Scope::new(location, diagnostics);
        if raw.ignored {
            scope.note("rules are ignored (`IGNORE_ALWAYS`)");
            return Ok(out);
        }
        scope.drop_cel(raw);

        if let Some(family) = raw.family.as_deref() {
            check_family(
                family,
                lookups::expected_field_rule(&field.type_node, field.cardinality),
                &field.type_node,
                field.cardinality,
                &scope,
            )?;
            match (family, &field.type_node) {
                ("repeated", element) => collection::repeated(self, raw, element, &mut scope, &mut out)?,
                ("map", TypeNode::Map(key, value)) => {
                    collection::map(self, raw, key, value, &mut scope, &mut out)?;
                }
                _ => out.value = self.translate_value(raw, &field.type_node, &mut scope)?,
            }
        }
        if raw.required {
            self.apply_required(field, &mut out, &mut scope)?;
        }
        check_lengths(&out.value.metadata, &scope)?;
        if raw.ignore_if_zero && !out.value.metadata.is_empty() {
            if raw.required {
                scope.note("`IGNORE_IF_ZERO_VALUE` has no effect on a required field");
            } else {
                out.skip_zero = true;
            }
        }
        out.validate_default = !out.required
            && has_implicit_presence(field)
            && !out.value.metadata.is_empty();

        let mut dropped = scope.dropped;
        dropped.sort();
        dropped.dedup();
        out.dropped = dropped;
        Ok(out)
    }

    /// Translate the nested rules of one repeated element, map key or map value.
    fn translate_element(
        &self,
        raw: &RawConstraints,
        type_node: &TypeNode,
        scope: &mut Scope<'_>,
    ) -> Result<Translated, Error> {
        if raw.ignored {
            return Ok(Translated::default());
        }
        scope.drop_cel(raw);
        if raw.required {
            scope.note("`required` has no effect on collection elements");
        }
        let Some(family) = raw.family.as_deref() else {
            return Ok(Translated::default());
        };
        check_family(
            family,
            lookups::expected_rule(type_node),
            type_node,
            Cardinality::Singular,
            scope,
        )?;
        let translated = self.translate_value(raw, type_node, scope)?;
        check_lengths(&translated.metadata, scope)?;
        Ok(translated)
    }

    fn translate_value(
        &self,
        raw: &RawConstraints,
        type_node: &TypeNode,
        scope: &mut Scope<'_>,
    ) -> Result<Translated, Error> {
        let mut out = Translated::default();
        let Some(family) = raw.family.as_deref() else {
            return Ok(out);
        };
        match (family, type_node) {
            ("string", _) => string::translate_string(raw, scope, &mut out)?,
            ("bytes", _) => string::translate_bytes(raw, scope, &mut out)?,
            ("bool", _) => number::translate_bool(raw, scope, &mut out),
            ("enum", TypeNode::Enum(enum_name)) => {
                enum_rules::translate(self, enum_name, raw, scope, &mut out)?;
            }
            ("duration" | "timestamp", _) => time::translate(family, raw, scope, &mut out)?,
            (family, _) if lookups::family_scalar(family).is_some() => {
                number::translate(family, raw, scope, &mut out)?;
            }
            (family, _) => {
                for (rule, _) in &raw.rules {
                    scope.drop_rule(&format!("{family}.{rule}"));
                }
            }
        }
        Ok(out)
    }

    fn apply_required(
        &self,
        field: &FieldNode,
        out: &mut FieldConstraints,
        scope: &mut Scope<'_>,
    ) -> Result<(), Error> {
        let metadata = &mut out.value.metadata;
        match (field.cardinality, &field.type_node) {
            (Cardinality::Oneof { .. }, _) => {
                scope.note("`required` on a oneof member is ignored; mark the oneof required instead");
            }
            (Cardinality::Optional | Cardinality::Required, _)
            | (Cardinality::Singular, TypeNode::Message(_) | TypeNode::WellKnown(_)) => {
                out.required = true;
            }
            (Cardinality::Repeated | Cardinality::Map, _)
            | (
                Cardinality::Singular,
                TypeNode::Scalar(ScalarKind::String | ScalarKind::Bytes) | TypeNode::Map(..),
            ) => metadata.raise_min_length(1),
            (Cardinality::Singular, TypeNode::Scalar(_)) => {
                metadata.after("_require_nonzero", "_require_nonzero");
            }
            (Cardinality::Singular, TypeNode::Enum(enum_name)) => {
                let zero = enum_rules::zero_member(self, enum_name, scope)?;
                metadata.imports.class(enum_name.clone());
                metadata.after(
                    "_make_not_in_validator",
                    format!("_make_not_in_validator(({zero},))"),
                );
            }
        }
        Ok(())
    }
}

/// Unset fields without presence read as their zero value, which protovalidate
/// checks like any other.
fn has_implicit_presence(field: &FieldNode) -> bool {
    match field.cardinality {
        Cardinality::Repeated | Cardinality::Map => true,
        Cardinality::Singular => !matches!(
            field.type_node,
            TypeNode::Message(_) | TypeNode::WellKnown(_)
        ),
        Cardinality::Optional | Cardinality::Required | Cardinality::Oneof { .. } => false,
    }
}

fn check_family(
    family: &str,
    expected: Option<&str>,
    type_node: &TypeNode,
    cardinality: Cardinality,
    scope: &Scope<'_>,
) -> Result<(), Error> {
    if expected == Some(family) {
        return Ok(());
    }
    Err(scope.conflict(format!(
        "`{family}` rules do not apply to a field of type {}",
        lookups::describe(type_node, cardinality)
    )))
}

fn check_lengths(metadata: &Metadata, scope: &Scope<'_>) -> Result<(), Error> {
    match (metadata.min_length, metadata.max_length) {
        (Some(min), Some(max)) if min > max => Err(scope.conflict(format!(
            "minimum length {min} exceeds maximum length {max}"
        ))),
        _ => Ok(()),
    }
}

/// Apply `len`/`min`/`max` style rules, rejecting contradictions.
pub(crate) fn apply_lengths(
    names: [&str; 3],
    exact: Option<u64>,
    min: Option<u64>,
    max: Option<u64>,
    scope: &Scope<'_>,
    metadata: &mut Metadata,
) -> Result<(), Error> {
    let [exact_name, min_name, max_name] = names;
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(scope.conflict(format!(
                "`{min_name} = {min}` exceeds `{max_name} = {max}`"
            )));
        }
    }
    if let Some(exact) = exact {
        if let Some(min) = min.filter(|min| *min > exact) {
            return Err(scope.conflict(format!(
                "`{exact_name} = {exact}` disagrees with `{min_name} = {min}`"
            )));
        }
        if let Some(max) = max.filter(|max| *max < exact) {
            return Err(scope.conflict(format!(
                "`{exact_name} = {exact}` disagrees with `{max_name} = {max}`"
            )));
        }
        metadata.min_length = Some(exact);
        metadata.max_length = Some(exact);
        return Ok(());
    }
    metadata.min_length = min;
    metadata.max_length = max;
    Ok(())
}

/// Non-negative integer view of a length rule.
fn length(value: &RuleValue) -> Option<u64> {
    value.as_i128().and_then(|v| u64::try_from(v).ok())
}

/// `(a, b)` with the single-element comma Python needs.
pub(crate) fn py_tuple(items: &[String]) -> String {
    match items {
        [single] => format!("({single},)"),
        _ => format!("({})", items.join(", ")),
    }
}

/// `frozenset({a, b})`.
pub(crate) fn py_frozenset(items: &[String]) -> String {
    format!("frozenset({{{}}})", items.join(", "))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use prost_types::field_descriptor_proto::Type;

    use super::{
        ConstraintTranslator, Constant, Example, FieldConstraints, Metadata, RuleSet, RuleValue,
    };
    use crate::config::GeneratorConfig;
    use crate::error::{Diagnostic, Error, Location, Severity};
    use crate::names::NameResolver;
    use crate::schema::SchemaIndex;
    use crate::test_support::{
        enum_field, enumeration, file, message, message_field, oneof, optional, repeated, rules,
        scalar,
    };
    use crate::types::DefaultValue;

    /// Index a single message `pkg.M` whose fields carry `field_rules`. Oneof
    /// index 0 is the real group `choice`, index 1 is free for `optional`.
    pub(super) fn translate(
        fields: Vec<prost_types::FieldDescriptorProto>,
        field_rules: Vec<(&str, super::RawConstraints)>,
    ) -> (Vec<Result<FieldConstraints, Error>>, Vec<Diagnostic>) {
        let mut m = message("M", fields);
        for name in ["choice", "_synthetic"] {
            m.oneof_decl.push(prost_types::OneofDescriptorProto {
                name: Some(name.to_string()),
                ..Default::default()
            });
        }
        let mut f = file("m.proto", "pkg");
        f.message_type.push(m);
        f.enum_type.push(enumeration(
            "Status",
            &[("STATUS_UNSPECIFIED", 0), ("STATUS_ACTIVE", 1), ("STATUS_GONE", 2)],
        ));
        let mut rule_set = RuleSet::default();
        for (field, raw) in field_rules {
            rule_set.fields.insert(format!("pkg.M.{field}"), raw);
        }
        let index = SchemaIndex::build(&[f], &rule_set).expect("index builds");
        let names = NameResolver::new(&GeneratorConfig::default())
            .type_names(&index)
            .expect("names resolve");
        let translator = ConstraintTranslator::new(&index, &names, true);
        let mut diagnostics = Vec::new();
        let results = index
            .message("pkg.M")
            .expect("M")
            .fields
            .iter()
            .map(|field| {
                translator.translate_field(
                    field,
                    &Location::new(field.full_name.clone()),
                    &mut diagnostics,
                )
            })
            .collect();
        (results, diagnostics)
    }

    pub(super) fn single(
        field: prost_types::FieldDescriptorProto,
        raw: super::RawConstraints,
    ) -> Result<FieldConstraints, Error> {
        let name = field.name.clone().unwrap_or_default();
        let (mut results, _) = translate(vec![field], vec![(name.as_str(), raw)]);
        results.remove(0)
    }

    #[test]
    fn kwargs_render_in_a_fixed_order() {
        let metadata = Metadata {
            lt: Some("10".to_string()),
            ge: Some("1".to_string()),
            max_length: Some(5),
            min_length: Some(1),
            pattern: Some("^a'b$".to_string()),
            examples: vec![Example::Text("ab".to_string()), Example::Code("3".to_string())],
            ..Metadata::default()
        };
        assert_eq!(
            metadata.kwargs(false),
            vec![
                "ge=1",
                "lt=10",
                "min_length=1",
                "max_length=5",
                "pattern=\"^a'b$\"",
                "examples=[\"ab\", 3]",
            ]
        );
        assert_eq!(
            metadata.annotation_metadata(),
            vec!["_Field(ge=1, lt=10, min_length=1, max_length=5, pattern='^a\\'b$', examples=['ab', 3])"]
        );
    }

    #[test]
    fn disabled_translation_yields_nothing() {
        let mut f = file("m.proto", "pkg");
        f.message_type
            .push(message("M", vec![scalar("name", 1, Type::String)]));
        let mut rule_set = RuleSet::default();
        rule_set.fields.insert(
            "pkg.M.name".to_string(),
            rules("string", &[("min_len", RuleValue::UInt(5)), ("max_len", RuleValue::UInt(1))]),
        );
        let index = SchemaIndex::build(&[f], &rule_set).expect("index builds");
        let names = NameResolver::new(&GeneratorConfig::default())
            .type_names(&index)
            .expect("names resolve");
        let field = &index.message("pkg.M").expect("M").fields[0];
        let translated = ConstraintTranslator::new(&index, &names, false)
            .translate_field(field, &Location::new("pkg.M.name"), &mut Vec::new())
            .expect("disabled translation never fails");
        assert_eq!(translated, FieldConstraints::default());
    }

    #[test]
    fn mismatched_rule_family_is_a_conflict() {
        let err = single(
            scalar("age", 1, Type::Int32),
            rules("string", &[("min_len", RuleValue::UInt(1))]),
        )
        .expect_err("string rules on int32");
        let Error::ConstraintConflict(err) = err else {
            panic!("expected conflict, got {err:?}");
        };
        assert_eq!(err.cause, "`string` rules do not apply to a field of type int32");

        let wrapped = single(
            message_field("age", 1, ".google.protobuf.Int32Value"),
            rules("int32", &[("gte", RuleValue::Int(0))]),
        )
        .expect("wrapper takes scalar rules");
        assert_eq!(wrapped.value.metadata.ge.as_deref(), Some("0"));
    }

    #[test]
    fn required_depends_on_presence() {
        let required = super::RawConstraints {
            required: true,
            ..Default::default()
        };
        let (results, diagnostics) = translate(
            vec![
                scalar("name", 1, Type::String),
                scalar("count", 2, Type::Int64),
                optional(scalar("nick", 3, Type::String), 1),
                message_field("child", 4, ".pkg.M"),
                repeated(scalar("tags", 5, Type::String)),
                enum_field("status", 6, ".pkg.Status"),
                oneof(scalar("pick", 7, Type::String), 0),
            ],
            ["name", "count", "nick", "child", "tags", "status", "pick"]
                .into_iter()
                .map(|name| (name, required.clone()))
                .collect(),
        );
        let results: Vec<_> = results
            .into_iter()
            .map(|r| r.expect("required translates"))
            .collect();

        assert_eq!(results[0].value.metadata.min_length, Some(1));
        assert!(!results[0].required);
        assert!(results[0].validate_default);
        assert_eq!(
            results[1].value.metadata.validators,
            vec!["_AfterValidator(_require_nonzero)"]
        );
        assert!(results[1].validate_default);
        assert!(results[2].required);
        assert!(!results[2].validate_default);
        assert!(results[3].required);
        assert!(!results[3].validate_default);
        assert_eq!(results[4].value.metadata.min_length, Some(1));
        assert!(results[4].validate_default);
        assert!(results[5].validate_default);
        assert_eq!(
            results[5].value.metadata.validators,
            vec!["_AfterValidator(_make_not_in_validator((Status.UNSPECIFIED,)))"]
        );
        assert_eq!(results[6], FieldConstraints::default());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Note);
    }

    #[test]
    fn ignore_if_zero_marks_the_zero_value_as_skipped() {
        let raw = super::RawConstraints {
            ignore_if_zero: true,
            ..rules("string", &[("min_len", RuleValue::UInt(3))])
        };
        let translated = single(scalar("code", 1, Type::String), raw.clone()).expect("translates");
        assert!(translated.skip_zero);
        assert!(translated.validate_default);
        assert_eq!(translated.value.metadata.min_length, Some(3));

        let (results, diagnostics) = translate(
            vec![optional(scalar("code", 1, Type::String), 1)],
            vec![(
                "code",
                super::RawConstraints {
                    required: true,
                    ..raw
                },
            )],
        );
        let translated = results.into_iter().next().expect("one field").expect("translates");
        assert!(!translated.skip_zero);
        assert!(translated.required);
        assert_eq!(
            diagnostics[0].message,
            "`IGNORE_IF_ZERO_VALUE` has no effect on a required field"
        );
    }

    #[test]
    fn cel_rules_are_dropped_with_a_warning() {
        let raw = super::RawConstraints {
            cel: vec![super::CelRule {
                id: "even".to_string(),
                expression: "this % 2 == 0".to_string(),
            }],
            ..rules("int32", &[("gt", RuleValue::Int(0))])
        };
        let (results, diagnostics) = translate(vec![scalar("n", 1, Type::Int32)], vec![("n", raw)]);
        let translated = results.into_iter().next().expect("one field").expect("translates");
        assert_eq!(translated.dropped, vec!["cel"]);
        assert_eq!(translated.value.metadata.gt.as_deref(), Some("0"));
        assert_eq!(
            diagnostics[0].message,
            "CEL rule `even` (`this % 2 == 0`) is not translated"
        );
    }

    #[test]
    fn const_narrows_to_a_literal_type() {
        let translated = single(
            scalar("kind", 1, Type::String),
            rules("string", &[("const", RuleValue::Str("user".to_string()))]),
        )
        .expect("translates");
        assert_eq!(
            translated.value.constant,
            Some(Constant {
                literal: Some("'user'".to_string()),
                default: DefaultValue::Literal("\"user\"".to_string()),
            })
        );
    }
}
