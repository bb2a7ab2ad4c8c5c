use super::{ConstraintTranslator, FieldConstraints, RawConstraints, RuleValue, Scope, Translated, apply_lengths, length};
use crate::error::Error;
use crate::schema::TypeNode;

/// Translate nested element rules under `segment`, folding their dropped
/// rule names into the parent scope.
fn element(
    translator: &ConstraintTranslator<'_>,
    value: &RuleValue,
    type_node: &TypeNode,
    segment: &str,
    scope: &mut Scope<'_>,
) -> Result<Option<Translated>, Error> {
    let RuleValue::Nested(inner) = value else {
        scope.drop_rule(segment);
        return Ok(None);
    };
    let mut nested = scope.nested(segment);
    let translated = translator.translate_element(inner, type_node, &mut nested)?;
    let dropped = nested.dropped;
    scope.merge(dropped);
    Ok(Some(translated))
}

pub(super) fn repeated(
    translator: &ConstraintTranslator<'_>,
    raw: &RawConstraints,
    item: &TypeNode,
    scope: &mut Scope<'_>,
    out: &mut FieldConstraints,
) -> Result<(), Error> {
    let (mut min, mut max) = (None, None);
    for (rule, value) in &raw.rules {
        match rule.as_str() {
            "min_items" => min = length(value),
            "max_items" => max = length(value),
            "unique" => {
                if value.as_bool() == Some(true) {
                    out.value.metadata.after("_require_unique", "_require_unique");
                }
            }
            "items" => out.items = element(translator, value, item, "repeated.items", scope)?,
            _ => scope.drop_rule(&format!("repeated.{rule}")),
        }
    }
    apply_lengths(
        ["", "min_items", "max_items"],
        None,
        min,
        max,
        scope,
        &mut out.value.metadata,
    )
}

pub(super) fn map(
    translator: &ConstraintTranslator<'_>,
    raw: &RawConstraints,
    key: &TypeNode,
    value_type: &TypeNode,
    scope: &mut Scope<'_>,
    out: &mut FieldConstraints,
) -> Result<(), Error> {
    let (mut min, mut max) = (None, None);
    for (rule, value) in &raw.rules {
        match rule.as_str() {
            "min_pairs" => min = length(value),
            "max_pairs" => max = length(value),
            "keys" => out.keys = element(translator, value, key, "map.keys", scope)?,
            "values" => out.values = element(translator, value, value_type, "map.values", scope)?,
            _ => scope.drop_rule(&format!("map.{rule}")),
        }
    }
    apply_lengths(
        ["", "min_pairs", "max_pairs"],
        None,
        min,
        max,
        scope,
        &mut out.value.metadata,
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use prost_types::field_descriptor_proto::Type;

    use super::super::tests::translate;
    use crate::constraints::{RawConstraints, RuleValue};
    use crate::error::Error;
    use crate::test_support::{repeated, rules, scalar};

    fn nested(raw: RawConstraints) -> RuleValue {
        RuleValue::Nested(Box::new(raw))
    }

    #[test]
    fn repeated_rules_bound_the_list_and_its_items() {
        let raw = rules(
            "repeated",
            &[
                ("min_items", RuleValue::UInt(1)),
                ("max_items", RuleValue::UInt(3)),
                ("unique", RuleValue::Bool(true)),
                (
                    "items",
                    nested(rules(
                        "string",
                        &[
                            ("max_len", RuleValue::UInt(8)),
                            ("hostname", RuleValue::Bool(true)),
                        ],
                    )),
                ),
            ],
        );
        let (results, diagnostics) =
            translate(vec![repeated(scalar("tags", 1, Type::String))], vec![("tags", raw)]);
        let translated = results.into_iter().next().expect("one").expect("translates");
        assert_eq!(
            translated.value.metadata.kwargs(false),
            vec!["min_length=1", "max_length=3"]
        );
        assert_eq!(
            translated.value.metadata.validators,
            vec!["_AfterValidator(_require_unique)"]
        );
        let items = translated.items.expect("item rules");
        assert_eq!(items.metadata.annotation_metadata(), vec!["_Field(max_length=8)"]);
        assert_eq!(translated.dropped, vec!["repeated.items.string.hostname"]);
        assert_eq!(
            diagnostics[0].message,
            "rule `repeated.items.string.hostname` is not translated"
        );
    }

    #[test]
    fn item_rules_must_match_the_element_type() {
        let raw = rules(
            "repeated",
            &[("items", nested(rules("int32", &[("gt", RuleValue::Int(0))])))],
        );
        let (mut results, _) =
            translate(vec![repeated(scalar("tags", 1, Type::String))], vec![("tags", raw)]);
        let err = results.remove(0).expect_err("int32 items on strings");
        let Error::ConstraintConflict(err) = err else {
            panic!("expected conflict, got {err:?}");
        };
        assert_eq!(err.cause, "`int32` rules do not apply to a field of type string");

        let reversed = rules(
            "repeated",
            &[("min_items", RuleValue::UInt(4)), ("max_items", RuleValue::UInt(2))],
        );
        let (mut results, _) =
            translate(vec![repeated(scalar("tags", 1, Type::String))], vec![("tags", reversed)]);
        assert!(matches!(
            results.remove(0),
            Err(Error::ConstraintConflict(_))
        ));
    }
}
