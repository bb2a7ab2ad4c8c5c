use super::{ConstraintTranslator, Constant, Example, RawConstraints, RuleValue, Scope, Translated, py_tuple};
use crate::error::{Error, UnresolvedReferenceError};
use crate::schema::EnumNode;
use crate::types::DefaultValue;

/// `Class.MEMBER` for the first value declared with `number`.
fn member_expr(
    translator: &ConstraintTranslator<'_>,
    enumeration: &EnumNode,
    number: i32,
) -> Option<(String, String)> {
    let position = enumeration.values.iter().position(|v| v.number == number)?;
    let class = translator.names.get(&enumeration.full_name)?;
    let member = translator.names.member(&enumeration.full_name, position)?;
    Some((class.to_string(), member.to_string()))
}

fn lookup<'t>(
    translator: &ConstraintTranslator<'t>,
    enum_name: &str,
    scope: &Scope<'_>,
) -> Result<&'t EnumNode, Error> {
    translator.index.enumeration(enum_name).ok_or_else(|| {
        UnresolvedReferenceError {
            location: scope.location.clone(),
            type_name: enum_name.to_string(),
        }
        .into()
    })
}

/// `Class.MEMBER` of the value an unset enum field reads as.
pub(super) fn zero_member(
    translator: &ConstraintTranslator<'_>,
    enum_name: &str,
    scope: &Scope<'_>,
) -> Result<String, Error> {
    let enumeration = lookup(translator, enum_name, scope)?;
    enumeration
        .zero_value()
        .and_then(|zero| member_expr(translator, enumeration, enumeration.values[zero].number))
        .map(|(class, member)| format!("{class}.{member}"))
        .ok_or_else(|| scope.conflict(format!("enum `{enum_name}` declares no values")))
}

fn number(value: &RuleValue) -> Option<i32> {
    value.as_i128().and_then(|n| i32::try_from(n).ok())
}

pub(super) fn translate(
    translator: &ConstraintTranslator<'_>,
    enum_name: &str,
    raw: &RawConstraints,
    scope: &mut Scope<'_>,
    out: &mut Translated,
) -> Result<(), Error> {
    let enumeration = lookup(translator, enum_name, scope)?;
    let numbers = |value: &RuleValue| -> Vec<i32> {
        value
            .as_list()
            .unwrap_or(std::slice::from_ref(value))
            .iter()
            .filter_map(number)
            .collect()
    };
    let mut constant = None;
    let mut allowed: Option<Vec<i32>> = None;
    let mut denied = Vec::new();
    for (rule, value) in &raw.rules {
        match (rule.as_str(), value) {
            ("const", _) if number(value).is_some() => constant = number(value),
            ("defined_only", RuleValue::Bool(defined_only)) => {
                if *defined_only {
                    let class = translator.names.get(enum_name).unwrap_or(&enumeration.name);
                    out.metadata.imports.class(enum_name);
                    out.metadata.before(
                        "_make_in_validator",
                        format!("_make_in_validator(tuple({class}))"),
                    );
                }
            }
            ("in", RuleValue::List(_)) => allowed = Some(numbers(value)),
            ("not_in", RuleValue::List(_)) => denied = numbers(value),
            ("example", _) => {
                out.metadata
                    .examples
                    .extend(numbers(value).into_iter().map(|n| Example::Code(n.to_string())));
            }
            _ => scope.drop_rule(&format!("enum.{rule}")),
        }
    }

    if let Some(constant) = constant {
        let Some((class, member)) = member_expr(translator, enumeration, constant) else {
            return Err(scope.conflict(format!(
                "const {constant} is not a value of `{enum_name}`"
            )));
        };
        if allowed.as_ref().is_some_and(|allowed| !allowed.contains(&constant)) {
            return Err(scope.conflict(format!("const {constant} is not among the `in` values")));
        }
        if denied.contains(&constant) {
            return Err(scope.conflict(format!("const {constant} is listed in `not_in`")));
        }
        out.metadata.imports.class(enum_name);
        out.constant = Some(Constant {
            literal: Some(format!("{class}.{member}")),
            default: DefaultValue::Member {
                enum_name: enum_name.to_string(),
                class,
                member,
                number: constant,
            },
        });
    }
    for (helper, values) in [
        ("_make_in_validator", allowed.unwrap_or_default()),
        ("_make_not_in_validator", denied),
    ] {
        // Numbers the enum does not declare can never be held by a member.
        let members: Vec<String> = values
            .iter()
            .filter_map(|&n| member_expr(translator, enumeration, n))
            .map(|(class, member)| format!("{class}.{member}"))
            .collect();
        if members.is_empty() {
            if helper == "_make_in_validator" && !values.is_empty() {
                scope.warn(format!(
                    "no `in` value is declared by `{enum_name}`; every value is rejected"
                ));
                out.metadata.after(helper, format!("{helper}(())"));
            }
            continue;
        }
        out.metadata.imports.class(enum_name);
        out.metadata
            .after(helper, format!("{helper}({})", py_tuple(&members)));
    }
    Ok(())
}
