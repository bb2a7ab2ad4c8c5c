use super::{ConstraintTranslator, Scope};
use crate::error::{Diagnostic, Error, Location};
use crate::names::ResolvedName;
use crate::schema::MessageNode;

/// A mutual-exclusion check emitted into the model's `_validate_oneofs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneofCheck {
    /// Group label used in the error message.
    pub group: String,
    /// Python names of the member fields.
    pub fields: Vec<String>,
    /// Whether exactly one member must be set.
    pub required: bool,
}

/// Message-level checks of one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageConstraints {
    /// Real oneofs first, then `(buf.validate.message).oneof` rules.
    pub oneofs: Vec<OneofCheck>,
    /// Message rules that were not translated.
    pub dropped: Vec<String>,
}

impl ConstraintTranslator<'_> {
    /// Collect the oneof checks and message rules of `message`. `field_names`
    /// are the resolved Python names of its fields, in field order.
    ///
    /// Real oneof exclusivity is protobuf semantics and is kept even with
    /// constraint translation disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConstraintConflict`] when a message oneof rule names a
    /// field the message does not declare, or names a field twice.
    pub fn translate_message(
        &self,
        message: &MessageNode,
        field_names: &[ResolvedName],
        location: &Location,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<MessageConstraints, Error> {
        let python_name = |index: usize| {
            field_names
                .get(index)
                .map_or_else(|| message.fields[index].name.clone(), |n| n.name.clone())
        };
        let mut out = MessageConstraints::default();
        for oneof in &message.oneofs {
            out.oneofs.push(OneofCheck {
                group: oneof.name.clone(),
                fields: oneof.fields.iter().copied().map(&python_name).collect(),
                required: self.enabled && oneof.required,
            });
        }
        if !self.enabled {
            return Ok(out);
        }

        let mut scope = Scope::new(location, diagnostics);
        for rule in &message.rules.oneofs {
            let mut members = Vec::with_capacity(rule.fields.len());
            for name in &rule.fields {
                let Some(index) = message.fields.iter().position(|f| &f.name == name) else {
                    return Err(scope.conflict(format!(
                        "oneof rule names unknown field `{name}`"
                    )));
                };
                if members.contains(&index) {
                    return Err(scope.conflict(format!(
                        "oneof rule names field `{name}` more than once"
                    )));
                }
                members.push(index);
            }
            if members.is_empty() {
                scope.note("oneof rule without fields is ignored");
                continue;
            }
            out.oneofs.push(OneofCheck {
                group: format!("oneof({})", rule.fields.join(", ")),
                fields: members.into_iter().map(&python_name).collect(),
                required: rule.required,
            });
        }
        scope.drop_cel_rules(&message.rules.cel);
        out.dropped = scope.dropped;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use prost_types::field_descriptor_proto::Type;

    use super::OneofCheck;
    use crate::config::GeneratorConfig;
    use crate::constraints::{CelRule, ConstraintTranslator, MessageOneofRule, MessageRules, RuleSet};
    use crate::error::{Error, Location};
    use crate::names::NameResolver;
    use crate::schema::SchemaIndex;
    use crate::test_support::{file, message, oneof, scalar};

    fn index_with(rules: MessageRules, required_oneof: bool) -> SchemaIndex {
        let mut m = message(
            "M",
            vec![
                oneof(scalar("email", 1, Type::String), 0),
                oneof(scalar("phone", 2, Type::String), 0),
                scalar("first_name", 3, Type::String),
                scalar("last_name", 4, Type::String),
            ],
        );
        m.oneof_decl.push(prost_types::OneofDescriptorProto {
            name: Some("contact".to_string()),
            ..Default::default()
        });
        let mut f = file("m.proto", "pkg");
        f.message_type.push(m);
        let mut rule_set = RuleSet::default();
        rule_set.messages.insert("pkg.M".to_string(), rules);
        if required_oneof {
            rule_set.required_oneofs.insert("pkg.M.contact".to_string());
        }
        SchemaIndex::build(&[f], &rule_set).expect("index builds")
    }

    fn run(
        index: &SchemaIndex,
        enabled: bool,
    ) -> (Result<super::MessageConstraints, Error>, Vec<crate::error::Diagnostic>) {
        let resolver = NameResolver::new(&GeneratorConfig::default());
        let names = resolver.type_names(index).expect("names resolve");
        let message = index.message("pkg.M").expect("M");
        let fields = resolver.field_names(message).expect("fields resolve");
        let mut diagnostics = Vec::new();
        let result = ConstraintTranslator::new(index, &names, enabled).translate_message(
            message,
            &fields,
            &Location::new("pkg.M"),
            &mut diagnostics,
        );
        (result, diagnostics)
    }

    #[test]
    fn real_oneofs_are_always_checked() {
        let index = index_with(MessageRules::default(), true);
        let (disabled, _) = run(&index, false);
        assert_eq!(
            disabled.expect("translates").oneofs,
            vec![OneofCheck {
                group: "contact".to_string(),
                fields: vec!["email".to_string(), "phone".to_string()],
                required: false,
            }]
        );
        let (enabled, _) = run(&index, true);
        assert!(enabled.expect("translates").oneofs[0].required);
    }

    #[test]
    fn message_oneof_rules_and_cel() {
        let rules = MessageRules {
            cel: vec![CelRule {
                id: "names".to_string(),
                expression: "this.first_name != this.last_name".to_string(),
            }],
            oneofs: vec![MessageOneofRule {
                fields: vec!["first_name".to_string(), "last_name".to_string()],
                required: true,
            }],
        };
        let index = index_with(rules, false);
        let (result, diagnostics) = run(&index, true);
        let translated = result.expect("translates");
        assert_eq!(
            translated.oneofs[1],
            OneofCheck {
                group: "oneof(first_name, last_name)".to_string(),
                fields: vec!["first_name".to_string(), "last_name".to_string()],
                required: true,
            }
        );
        assert_eq!(translated.dropped, vec!["cel"]);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn unknown_oneof_rule_field_is_a_conflict() {
        let rules = MessageRules {
            oneofs: vec![MessageOneofRule {
                fields: vec!["nickname".to_string()],
                required: false,
            }],
            ..Default::default()
        };
        let index = index_with(rules, false);
        let (result, _) = run(&index, true);
        let Err(Error::ConstraintConflict(err)) = result else {
            panic!("expected conflict");
        };
        assert_eq!(err.cause, "oneof rule names unknown field `nickname`");
    }
}
