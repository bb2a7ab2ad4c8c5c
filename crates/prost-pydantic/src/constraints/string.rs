use super::{
    Constant, Example, RawConstraints, RuleValue, Scope, Translated, apply_lengths, length,
    py_frozenset,
};
use crate::error::Error;
use crate::python::literal::{py_bytes, py_quote, py_quote_single};
use crate::types::DefaultValue;

/// String formats with a runtime validator, by rule name.
fn format_validator(rule: &str) -> Option<&'static str> {
    Some(match rule {
        "email" => "_validate_email",
        "uri" => "_validate_uri",
        "ip" => "_validate_ip",
        "ipv4" => "_validate_ipv4",
        "ipv6" => "_validate_ipv6",
        "uuid" => "_validate_uuid",
        _ => return None,
    })
}

/// Lengths of a `string`/`bytes` value plus the pattern pieces.
#[derive(Default)]
struct Shape {
    len: Option<u64>,
    min_len: Option<u64>,
    max_len: Option<u64>,
    pattern: Option<String>,
    prefix: Option<String>,
    suffix: Option<String>,
    contains: Option<String>,
}

impl Shape {
    fn length_rule(&mut self, rule: &str, value: &RuleValue) -> bool {
        let slot = match rule {
            "len" => &mut self.len,
            "min_len" => &mut self.min_len,
            "max_len" => &mut self.max_len,
            _ => return false,
        };
        *slot = length(value);
        slot.is_some()
    }

    fn admits_length(&self, len: u64) -> bool {
        self.len.is_none_or(|exact| exact == len)
            && self.min_len.is_none_or(|min| len >= min)
            && self.max_len.is_none_or(|max| len <= max)
    }

    /// Fold `prefix`/`suffix`/`contains` into one escaped pattern. With an
    /// explicit `pattern`, or when `contains` cannot join an anchored
    /// pattern, the leftovers are dropped.
    fn combine_pattern(&mut self, scope: &mut Scope<'_>) {
        if self.pattern.is_some() {
            for (rule, present) in [
                ("prefix", self.prefix.is_some()),
                ("suffix", self.suffix.is_some()),
                ("contains", self.contains.is_some()),
            ] {
                if present {
                    scope.drop_rule(&format!("string.{rule}"));
                }
            }
            return;
        }
        let anchored = match (self.prefix.as_deref(), self.suffix.as_deref()) {
            (Some(prefix), Some(suffix)) => Some(format!(
                "^{}.*{}$",
                regex::escape(prefix),
                regex::escape(suffix)
            )),
            (Some(prefix), None) => Some(format!("^{}", regex::escape(prefix))),
            (None, Some(suffix)) => Some(format!("{}$", regex::escape(suffix))),
            (None, None) => None,
        };
        match (anchored, self.contains.as_deref()) {
            (Some(anchored), contains) => {
                if contains.is_some() {
                    scope.drop_rule("string.contains");
                }
                self.pattern = Some(anchored);
            }
            (None, Some(contains)) => self.pattern = Some(regex::escape(contains)),
            (None, None) => {}
        }
    }
}

pub(super) fn translate_string(
    raw: &RawConstraints,
    scope: &mut Scope<'_>,
    out: &mut Translated,
) -> Result<(), Error> {
    let mut shape = Shape::default();
    let mut constant = None;
    let mut allowed: Option<Vec<String>> = None;
    let mut denied: Vec<String> = Vec::new();
    for (rule, value) in &raw.rules {
        if shape.length_rule(rule, value) {
            continue;
        }
        match (rule.as_str(), value) {
            ("pattern", RuleValue::Str(v)) => shape.pattern = Some(v.clone()),
            ("prefix", RuleValue::Str(v)) => shape.prefix = Some(v.clone()),
            ("suffix", RuleValue::Str(v)) => shape.suffix = Some(v.clone()),
            ("contains", RuleValue::Str(v)) => shape.contains = Some(v.clone()),
            ("const", RuleValue::Str(v)) => constant = Some(v.clone()),
            ("in", RuleValue::List(items)) => {
                allowed = Some(items.iter().filter_map(RuleValue::as_str).map(str::to_string).collect());
            }
            ("not_in", RuleValue::List(items)) => {
                denied = items.iter().filter_map(RuleValue::as_str).map(str::to_string).collect();
            }
            ("example", _) => {
                let examples = value.as_list().unwrap_or(std::slice::from_ref(value));
                out.metadata.examples.extend(
                    examples
                        .iter()
                        .filter_map(RuleValue::as_str)
                        .map(|v| Example::Text(v.to_string())),
                );
            }
            // Only qualifies `well_known_regex`.
            ("strict", _) => {}
            (format, RuleValue::Bool(enabled)) if format_validator(format).is_some() => {
                if let (true, Some(helper)) = (*enabled, format_validator(format)) {
                    out.metadata.after(helper, helper);
                }
            }
            _ => scope.drop_rule(&format!("string.{rule}")),
        }
    }

    apply_lengths(
        ["len", "min_len", "max_len"],
        shape.len,
        shape.min_len,
        shape.max_len,
        scope,
        &mut out.metadata,
    )?;
    shape.combine_pattern(scope);
    out.metadata.pattern = shape.pattern.clone();

    if let Some(constant) = constant {
        let chars = u64::try_from(constant.chars().count()).unwrap_or(u64::MAX);
        if !shape.admits_length(chars) {
            return Err(scope.conflict(format!(
                "const {} does not satisfy the length rules",
                py_quote(&constant)
            )));
        }
        if allowed.as_ref().is_some_and(|allowed| !allowed.contains(&constant)) {
            return Err(scope.conflict(format!(
                "const {} is not among the `in` values",
                py_quote(&constant)
            )));
        }
        if denied.contains(&constant) {
            return Err(scope.conflict(format!(
                "const {} is listed in `not_in`",
                py_quote(&constant)
            )));
        }
        out.constant = Some(Constant {
            literal: Some(py_quote_single(&constant)),
            default: DefaultValue::Literal(py_quote(&constant)),
        });
    }
    if let Some(allowed) = allowed.filter(|allowed| !allowed.is_empty()) {
        let items: Vec<String> = allowed.iter().map(|v| py_quote_single(v)).collect();
        out.metadata.after(
            "_make_in_validator",
            format!("_make_in_validator({})", py_frozenset(&items)),
        );
    }
    if !denied.is_empty() {
        let items: Vec<String> = denied.iter().map(|v| py_quote_single(v)).collect();
        out.metadata.after(
            "_make_not_in_validator",
            format!("_make_not_in_validator({})", py_frozenset(&items)),
        );
    }
    Ok(())
}

pub(super) fn translate_bytes(
    raw: &RawConstraints,
    scope: &mut Scope<'_>,
    out: &mut Translated,
) -> Result<(), Error> {
    let mut shape = Shape::default();
    let mut constant = None;
    let mut allowed = Vec::new();
    let mut denied = Vec::new();
    let bytes_list = |items: &[RuleValue]| -> Vec<Vec<u8>> {
        items
            .iter()
            .filter_map(|item| match item {
                RuleValue::Bytes(b) => Some(b.clone()),
                _ => None,
            })
            .collect()
    };
    for (rule, value) in &raw.rules {
        if shape.length_rule(rule, value) {
            continue;
        }
        match (rule.as_str(), value) {
            ("const", RuleValue::Bytes(v)) => constant = Some(v.clone()),
            ("in", RuleValue::List(items)) => allowed = bytes_list(items),
            ("not_in", RuleValue::List(items)) => denied = bytes_list(items),
            _ => scope.drop_rule(&format!("bytes.{rule}")),
        }
    }

    apply_lengths(
        ["len", "min_len", "max_len"],
        shape.len,
        shape.min_len,
        shape.max_len,
        scope,
        &mut out.metadata,
    )?;
    if let Some(constant) = constant {
        let len = u64::try_from(constant.len()).unwrap_or(u64::MAX);
        if !shape.admits_length(len) {
            return Err(scope.conflict(format!(
                "const {} does not satisfy the length rules",
                py_bytes(&constant)
            )));
        }
        if !allowed.is_empty() && !allowed.contains(&constant) {
            return Err(scope.conflict(format!(
                "const {} is not among the `in` values",
                py_bytes(&constant)
            )));
        }
        out.constant = Some(Constant {
            literal: Some(py_bytes(&constant)),
            default: DefaultValue::Literal(py_bytes(&constant)),
        });
    }
    for (helper, values) in [("_make_in_validator", &allowed), ("_make_not_in_validator", &denied)] {
        if values.is_empty() {
            continue;
        }
        let items: Vec<String> = values.iter().map(|v| py_bytes(v)).collect();
        out.metadata
            .after(helper, format!("{helper}({})", py_frozenset(&items)));
    }
    Ok(())
}
