use std::collections::BTreeSet;

use super::Emitter;
use super::writer::Writer;
use crate::config::BaseModel;
use crate::constraints::{ConstraintTranslator, FieldConstraints, OneofCheck, Translated, py_tuple};
use crate::error::{Diagnostic, Error, Location};
use crate::names::ResolvedName;
use crate::python::literal::{py_bool, py_quote};
use crate::python::{ImportSet, PyType};
use crate::schema::{Cardinality, FieldNode, MessageNode};
use crate::types::{DefaultValue, TypeMapper};

/// One model field, ready to write.
struct FieldLine<'m> {
    name: String,
    /// Unquoted annotation text.
    annotation: String,
    /// The default first, then keyword arguments.
    arguments: Vec<String>,
    dropped: &'m [String],
    field: &'m FieldNode,
}

impl FieldLine<'_> {
    fn write(&self, w: &mut Writer) {
        w.comments(&self.field.comments.leading);
        let head = format!("{}: {} = _Field(", self.name, py_quote(&self.annotation));
        if let ([default], []) = (self.arguments.as_slice(), self.dropped) {
            w.line(format!("{head}{default})"));
        } else {
            w.line(head);
            w.indent();
            for argument in &self.arguments {
                w.line(format!("{argument},"));
            }
            for rule in self.dropped {
                w.line(format!("# buf.validate: {rule} (not translated)"));
            }
            w.dedent();
            w.line(")");
        }
        w.comments(&self.field.comments.trailing);
    }
}

/// Element rules go inside `list[...]`/`dict[...]` as `Annotated` metadata.
fn constrain_elements(annotation: PyType, constraints: &FieldConstraints) -> PyType {
    fn element(ty: PyType, translated: Option<&Translated>) -> PyType {
        let Some(translated) = translated else {
            return ty;
        };
        let ty = match translated.constant.as_ref().and_then(|c| c.literal.clone()) {
            Some(literal) => ty.with_value(PyType::Literal(vec![literal])),
            None => ty,
        };
        ty.annotated(translated.metadata.annotation_metadata())
    }
    match annotation {
        PyType::List(item) => PyType::List(Box::new(element(*item, constraints.items.as_ref()))),
        PyType::Dict(key, value) => PyType::Dict(
            Box::new(element(*key, constraints.keys.as_ref())),
            Box::new(element(*value, constraints.values.as_ref())),
        ),
        other => other,
    }
}

/// A zero value as a Python expression inside a quoted annotation.
fn zero_literal(zero: &DefaultValue, imports: &mut ImportSet) -> String {
    match zero {
        DefaultValue::Literal(literal) => literal.replace('"', "'"),
        DefaultValue::Member {
            enum_name,
            class,
            member,
            ..
        } => {
            imports.class(enum_name.clone());
            format!("{class}.{member}")
        }
        DefaultValue::Factory("dict") => "{}".to_string(),
        DefaultValue::Factory(_) => "[]".to_string(),
        DefaultValue::None | DefaultValue::Required => "None".to_string(),
    }
}

impl Emitter<'_> {
    /// Write one model class and return its class name.
    pub(super) fn emit_message(
        &self,
        message: &MessageNode,
        deferred: &BTreeSet<String>,
        w: &mut Writer,
        imports: &mut ImportSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<String, Error> {
        let location = Location::new(message.full_name.clone())
            .in_file(&message.file)
            .at(message.span);
        let class = self.class_name(&message.full_name, &location)?;
        let field_names = self.resolver.field_names(message)?;
        let mapper = TypeMapper::new(self.index, self.names);
        let translator =
            ConstraintTranslator::new(self.index, self.names, self.config.validate_constraints);

        let mut translated = Vec::with_capacity(message.fields.len());
        for field in &message.fields {
            let field_location = Location::new(field.full_name.clone())
                .in_file(&message.file)
                .at(field.span);
            let constraints = translator.translate_field(field, &field_location, diagnostics)?;
            translated.push((field_location, constraints));
        }
        let mut lines = Vec::with_capacity(message.fields.len());
        for (index, (field_location, constraints)) in translated.iter().enumerate() {
            lines.push(self.field_line(
                message,
                index,
                &field_names,
                field_location,
                constraints,
                &mapper,
                deferred,
                imports,
                diagnostics,
            )?);
        }
        let checks = translator.translate_message(message, &field_names, &location, diagnostics)?;

        let base = self.base_class(imports);
        w.line(format!("class {class}({base}):"));
        w.indent();
        let attributes: Vec<(String, &[String])> = lines
            .iter()
            .map(|line| {
                (
                    format!("{} ({}):", line.name, line.annotation),
                    line.field.comments.leading.as_slice(),
                )
            })
            .collect();
        self.docstring(&message.comments.leading, &attributes, w);

        imports.pydantic("ConfigDict");
        w.line("model_config = _ConfigDict(");
        w.indent();
        if field_names.iter().any(|n| n.renamed) {
            w.line("populate_by_name=True,");
        }
        w.line("ser_json_bytes=\"base64\",");
        w.line("val_json_bytes=\"base64\",");
        w.line("ser_json_inf_nan=\"strings\",");
        w.dedent();
        w.line(")");
        if !message.comments.trailing.is_empty() {
            w.blank();
            w.comments(&message.comments.trailing);
        }
        for rule in &checks.dropped {
            w.line(format!("# buf.validate: {rule} (not translated)"));
        }

        for line in &lines {
            w.blank();
            line.write(w);
        }
        if lines.is_empty() {
            w.blank();
            w.line("pass");
        }
        if !checks.oneofs.is_empty() {
            imports.pydantic("model_validator");
            imports.runtime("_check_oneof");
            w.blank();
            w.line("@_model_validator(mode=\"after\")");
            w.line("def _validate_oneofs(self):");
            w.indent();
            for check in &checks.oneofs {
                w.line(oneof_call(check));
            }
            w.line("return self");
            w.dedent();
        }
        w.dedent();
        tracing::trace!(message = %message.full_name, class, fields = lines.len(), "emitted model");
        Ok(class)
    }

    fn base_class(&self, imports: &mut ImportSet) -> String {
        match &self.config.base_model {
            BaseModel::Proto => {
                imports.runtime("ProtoModel");
                "ProtoModel".to_string()
            }
            BaseModel::Pydantic => {
                imports.pydantic("BaseModel");
                "_BaseModel".to_string()
            }
            BaseModel::Custom { module, class } => {
                imports.external(format!("from {module} import {class} as _ModelBase"));
                "_ModelBase".to_string()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn field_line<'m>(
        &self,
        message: &'m MessageNode,
        index: usize,
        field_names: &[ResolvedName],
        location: &Location,
        constraints: &'m FieldConstraints,
        mapper: &TypeMapper<'_>,
        deferred: &BTreeSet<String>,
        imports: &mut ImportSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<FieldLine<'m>, Error> {
        let field = &message.fields[index];
        let resolved = &field_names[index];
        let none_union = self.config.use_none_union_syntax;
        let mapped = mapper.map_field(field, location)?;
        imports.pydantic("Field");
        imports.extend(&constraints.imports());

        let mut annotation = constrain_elements(mapped.annotation, constraints);
        let zero = if constraints.skip_zero {
            Some(zero_literal(&mapper.zero_value(field, location)?, imports))
        } else {
            None
        };
        let mut default = mapped.default;
        if constraints.required {
            annotation = annotation.non_null();
            default = DefaultValue::Required;
        }
        if let Some(constant) = &constraints.value.constant {
            if let Some(literal) = &constant.literal {
                annotation = annotation.with_value(PyType::Literal(vec![literal.clone()]));
            }
            if matches!(default, DefaultValue::Literal(_) | DefaultValue::Member { .. }) {
                default = constant.default.clone();
            }
        }
        let metadata = &constraints.value.metadata;
        let annotation = match zero {
            Some(zero) => {
                imports.pydantic("WrapValidator");
                imports.runtime("_make_zero_skipper");
                let mut wrapped = metadata.annotation_metadata();
                wrapped.push(format!("_WrapValidator(_make_zero_skipper({zero}))"));
                annotation.annotated(wrapped)
            }
            None => annotation.annotated(metadata.validators.clone()),
        };
        annotation.collect_imports(none_union, imports);

        let (rendered, validate_default) = self.render_default(&default, deferred, imports);
        let mut arguments = vec![rendered];
        if !self.config.disable_field_description {
            let description = description(message, field, field_names);
            if !description.is_empty() {
                arguments.push(format!("description={}", py_quote(&description)));
            }
        }
        if resolved.renamed {
            let declared = if self.config.preserving_proto_field_name {
                &field.name
            } else {
                &field.json_name
            };
            arguments.push(format!("alias={}", py_quote(declared)));
        }
        if !constraints.skip_zero {
            arguments.extend(metadata.kwargs(false));
        }
        if field.deprecated {
            diagnostics.push(Diagnostic::note(location.clone(), "field is deprecated"));
            arguments.push("deprecated=True".to_string());
        }
        if validate_default || constraints.validate_default {
            arguments.push(format!("validate_default={}", py_bool(true)));
        }
        Ok(FieldLine {
            name: resolved.name.clone(),
            annotation: annotation.render(none_union),
            arguments,
            dropped: &constraints.dropped,
            field,
        })
    }

    /// The rendered default, and whether it must be validated to become the
    /// declared type. Members of enums imported at the bottom of the module
    /// do not exist yet when the class body runs, so they are spelled as raw
    /// values.
    fn render_default(
        &self,
        default: &DefaultValue,
        deferred: &BTreeSet<String>,
        imports: &mut ImportSet,
    ) -> (String, bool) {
        match default {
            DefaultValue::Required => ("...".to_string(), false),
            DefaultValue::None => ("None".to_string(), false),
            DefaultValue::Literal(literal) => (literal.clone(), false),
            DefaultValue::Factory(factory) => (format!("default_factory={factory}"), false),
            DefaultValue::Member {
                enum_name,
                class,
                member,
                number,
            } => {
                let is_deferred = self
                    .index
                    .declaring_file(enum_name)
                    .is_some_and(|file| deferred.contains(file));
                if !is_deferred {
                    imports.class(enum_name.clone());
                    return (format!("{class}.{member}"), false);
                }
                if self.config.use_integers_for_enums {
                    return (number.to_string(), true);
                }
                let primary = self
                    .index
                    .enumeration(enum_name)
                    .and_then(|e| e.values.iter().position(|v| v.number == *number))
                    .and_then(|position| self.names.member(enum_name, position))
                    .unwrap_or(member);
                (py_quote(primary), true)
            }
        }
    }
}

/// Leading comments, plus the group note for oneof members.
fn description(message: &MessageNode, field: &FieldNode, field_names: &[ResolvedName]) -> String {
    let mut text = field.comments.leading.join("\n");
    if let Cardinality::Oneof { group } = field.cardinality {
        if let Some(oneof) = message.oneofs.get(group) {
            let members: Vec<&str> = oneof
                .fields
                .iter()
                .filter_map(|&i| field_names.get(i).map(|n| n.name.as_str()))
                .collect();
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!(
                "Only one of the fields can be specified with: [{}] (oneof {})",
                members.join(", "),
                oneof.name
            ));
        }
    }
    text
}

fn oneof_call(check: &OneofCheck) -> String {
    let fields: Vec<String> = check.fields.iter().map(|f| py_quote(f)).collect();
    format!(
        "_check_oneof(self, {}, {}, required={})",
        py_quote(&check.group),
        py_tuple(&fields),
        py_bool(check.required)
    )
}
