use super::Emitter;
use super::writer::Writer;
use crate::config::EnumAliasPolicy;
use crate::error::{Diagnostic, Error, Location};
use crate::python::ImportSet;
use crate::constraints::RuleValue;
use crate::python::literal::{py_bool, py_bytes, py_float, py_quote};
use crate::schema::{EnumNode, EnumValueNode};

impl Emitter<'_> {
    /// Write one enum class.
    pub(super) fn emit_enum(
        &self,
        enumeration: &EnumNode,
        w: &mut Writer,
        imports: &mut ImportSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), Error> {
        let location = Location::new(enumeration.full_name.clone())
            .in_file(&enumeration.file)
            .at(enumeration.span);
        let class = self.class_name(&enumeration.full_name, &location)?;
        let members = self.resolver.enum_value_names(enumeration)?;
        let integers = self.config.use_integers_for_enums;

        let with_options = enumeration.values.iter().any(EnumValueNode::has_options);
        if with_options {
            imports.runtime("_ProtoEnum");
            imports.runtime("_EnumValueOptions");
            w.line(format!("class {class}(_ProtoEnum):"));
        } else {
            imports.enumeration();
            let base = if integers { "int" } else { "str" };
            w.line(format!("class {class}({base}, _Enum):"));
        }
        w.indent();
        self.docstring(&enumeration.comments.leading, &[], w);
        w.comments(&enumeration.comments.trailing);

        let value_of = |position: usize| -> String {
            if integers {
                enumeration.values[position].number.to_string()
            } else {
                py_quote(&members[position].name)
            }
        };
        for (position, value) in enumeration.values.iter().enumerate() {
            let member = &members[position].name;
            let rendered = match (value.alias_of, self.config.enum_alias_policy) {
                (Some(primary), EnumAliasPolicy::Omit) => {
                    diagnostics.push(Diagnostic::note(
                        location.clone(),
                        format!(
                            "alias `{}` of `{}` is omitted",
                            value.name, enumeration.values[primary].name
                        ),
                    ));
                    continue;
                }
                (Some(primary), EnumAliasPolicy::FirstDeclared) => value_of(primary),
                (Some(primary), EnumAliasPolicy::Distinct) if integers => {
                    diagnostics.push(Diagnostic::note(
                        location.clone(),
                        format!(
                            "integer enums cannot give alias `{}` its own value; it aliases `{}`",
                            value.name, enumeration.values[primary].name
                        ),
                    ));
                    value_of(primary)
                }
                _ => value_of(position),
            };
            w.comments(&value.comments.leading);
            let trailer = if integers {
                member.clone()
            } else {
                value.number.to_string()
            };
            if with_options {
                member_with_options(member, &rendered, &trailer, value, w);
            } else {
                w.line(format!("{member} = {rendered}  # {trailer}"));
            }
            w.comments(&value.comments.trailing);
        }

        if let Some(zero) = enumeration.zero_value() {
            w.blank();
            w.line("@classmethod");
            w.line("def _missing_(cls, value):");
            w.indent();
            w.line(format!("return cls.{}", members[zero].name));
            w.dedent();
        } else {
            w.line("pass");
        }
        w.dedent();
        tracing::trace!(enumeration = %enumeration.full_name, class, "emitted enum");
        Ok(())
    }
}

/// `NAME = (value, _EnumValueOptions(...))`, split over lines when custom
/// options are set.
fn member_with_options(
    member: &str,
    rendered: &str,
    trailer: &str,
    value: &EnumValueNode,
    w: &mut Writer,
) {
    let mut options = vec![format!("number={}", value.number)];
    if value.deprecated {
        options.push("deprecated=True".to_string());
    }
    if value.debug_redact {
        options.push("debug_redact=True".to_string());
    }
    if value.custom_options.is_empty() {
        w.line(format!(
            "{member} = ({rendered}, _EnumValueOptions({}))  # {trailer}",
            options.join(", ")
        ));
        return;
    }
    options.extend(value.custom_options.iter().filter_map(|(name, option)| {
        option_literal(option).map(|literal| format!("{name}={literal}"))
    }));
    w.line(format!("{member} = ("));
    w.indent();
    w.line(format!("{rendered},"));
    w.line("_EnumValueOptions(");
    w.indent();
    for option in options {
        w.line(format!("{option},"));
    }
    w.dedent();
    w.line("),");
    w.dedent();
    w.line(format!(")  # {trailer}"));
}

fn option_literal(value: &RuleValue) -> Option<String> {
    Some(match value {
        RuleValue::Bool(v) => py_bool(*v).to_string(),
        RuleValue::Int(v) => v.to_string(),
        RuleValue::UInt(v) => v.to_string(),
        RuleValue::Enum(v) => v.to_string(),
        RuleValue::Float(v) => py_float(*v),
        RuleValue::Str(v) => py_quote(v),
        RuleValue::Bytes(v) => py_bytes(v),
        RuleValue::List(_) | RuleValue::Message(_) | RuleValue::Nested(_) => return None,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use prost_types::{EnumValueOptions, FileDescriptorProto};

    use crate::config::{EnumAliasPolicy, GeneratorConfig};
    use crate::constraints::{RuleSet, RuleValue};
    use crate::emit::tests::{emit, emit_with_rules};
    use crate::error::Severity;
    use crate::test_support::{enumeration, file};

    fn status_file() -> FileDescriptorProto {
        let mut f = file("status.proto", "pkg");
        let mut status = enumeration(
            "Status",
            &[
                ("STATUS_UNSPECIFIED", 0),
                ("STATUS_ACTIVE", 1),
                ("STATUS_ENABLED", 1),
            ],
        );
        status.options = Some(prost_types::EnumOptions {
            allow_alias: Some(true),
            ..Default::default()
        });
        f.enum_type.push(status);
        f
    }

    #[test]
    fn string_enums_alias_the_first_declared_value() {
        let (body, _) = emit(&[status_file()], "status.proto", &GeneratorConfig::default());
        assert_eq!(
            body.definitions,
            "class Status(str, _Enum):\n    \"\"\" \"\"\"\n\n    UNSPECIFIED = \"UNSPECIFIED\"  # 0\n    ACTIVE = \"ACTIVE\"  # 1\n    ENABLED = \"ACTIVE\"  # 1\n\n    @classmethod\n    def _missing_(cls, value):\n        return cls.UNSPECIFIED\n"
        );
    }

    #[test]
    fn integer_enums_and_alias_policies() {
        let config = GeneratorConfig {
            use_integers_for_enums: true,
            enum_alias_policy: EnumAliasPolicy::Omit,
            ..GeneratorConfig::default()
        };
        let (body, diagnostics) = emit(&[status_file()], "status.proto", &config);
        assert!(body.definitions.starts_with("class Status(int, _Enum):"));
        assert!(body.definitions.contains("    ACTIVE = 1  # ACTIVE\n"));
        assert!(!body.definitions.contains("ENABLED"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Note);

        let distinct = GeneratorConfig {
            enum_alias_policy: EnumAliasPolicy::Distinct,
            ..GeneratorConfig::default()
        };
        let (body, _) = emit(&[status_file()], "status.proto", &distinct);
        assert!(body.definitions.contains("    ENABLED = \"ENABLED\"  # 1\n"));
    }

    #[test]
    fn deprecated_values_carry_options() {
        let mut f = file("level.proto", "pkg");
        let mut level = enumeration("Level", &[("LEVEL_LOW", 0), ("LEVEL_OLD", 1)]);
        level.value[1].options = Some(EnumValueOptions {
            deprecated: Some(true),
            ..Default::default()
        });
        f.enum_type.push(level);
        let (body, _) = emit(&[f], "level.proto", &GeneratorConfig::default());
        assert!(body.definitions.starts_with("class Level(_ProtoEnum):"));
        assert!(body.definitions.contains(
            "    LOW = (\"LOW\", _EnumValueOptions(number=0))  # 0\n"
        ));
        assert!(body.definitions.contains(
            "    OLD = (\"OLD\", _EnumValueOptions(number=1, deprecated=True))  # 1\n"
        ));
        assert!(body.imports.runtime_names().contains("_ProtoEnum"));
    }

    #[test]
    fn redacted_and_custom_options_are_carried_on_every_member() {
        let mut f = file("level.proto", "pkg");
        f.enum_type.push(enumeration("Level", &[("LEVEL_LOW", 0), ("LEVEL_SECRET", 1)]));
        let mut rules = RuleSet::default();
        rules
            .enum_option_fields
            .insert("label".to_string(), "str".to_string());
        rules.enum_values.insert(
            "pkg.Level.LEVEL_SECRET".to_string(),
            crate::constraints::EnumValueOptions {
                debug_redact: true,
                custom: vec![("label".to_string(), RuleValue::Str("Hidden".to_string()))],
            },
        );
        let config = GeneratorConfig {
            use_integers_for_enums: true,
            ..GeneratorConfig::default()
        };
        let (body, _) = emit_with_rules(&[f], &rules, "level.proto", &config);
        assert_eq!(
            body.definitions,
            concat!(
                "class Level(_ProtoEnum):\n",
                "    \"\"\" \"\"\"\n",
                "\n",
                "    LOW = (0, _EnumValueOptions(number=0))  # LOW\n",
                "    SECRET = (\n",
                "        1,\n",
                "        _EnumValueOptions(\n",
                "            number=1,\n",
                "            debug_redact=True,\n",
                "            label=\"Hidden\",\n",
                "        ),\n",
                "    )  # SECRET\n",
                "\n",
                "    @classmethod\n",
                "    def _missing_(cls, value):\n",
                "        return cls.LOW\n",
            )
        );
    }
}
