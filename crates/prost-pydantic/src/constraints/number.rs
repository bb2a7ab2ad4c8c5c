use std::cmp::Ordering;

use super::lookups::family_scalar;
use super::{Constant, Example, RawConstraints, RuleValue, Scope, Translated, py_frozenset};
use crate::error::Error;
use crate::python::literal::{py_bool, py_float};
use crate::schema::ScalarKind;
use crate::types::DefaultValue;

/// A numeric rule value. Integers compare exactly; floats as IEEE doubles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    pub(super) fn render(self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => py_float(v),
        }
    }

    fn compare(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }
}

/// One side of a range, with the rule text used in conflict messages.
#[derive(Debug, Clone)]
pub(super) struct Bound {
    pub(super) value: Num,
    pub(super) inclusive: bool,
    pub(super) text: String,
}

/// `gt`/`gte` and `lt`/`lte` of one value.
#[derive(Debug, Clone, Default)]
pub(super) struct Bounds {
    pub(super) lower: Option<Bound>,
    pub(super) upper: Option<Bound>,
}

impl Bounds {
    /// Record `rule` if it is one of the four bound rules.
    pub(super) fn set(&mut self, rule: &str, value: Num, text: String) -> bool {
        let bound = |inclusive| Bound {
            value,
            inclusive,
            text,
        };
        match rule {
            "gt" => self.lower = Some(bound(false)),
            "gte" => self.lower = Some(bound(true)),
            "lt" => self.upper = Some(bound(false)),
            "lte" => self.upper = Some(bound(true)),
            _ => return false,
        }
        true
    }

    /// Reject reversed bounds and exclusive ranges with no admissible value.
    pub(super) fn check(&self, scope: &Scope<'_>) -> Result<(), Error> {
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            return Ok(());
        };
        let Some(order) = lower.value.compare(upper.value) else {
            return Ok(());
        };
        if order == Ordering::Greater {
            return Err(scope.conflict(format!(
                "lower bound `{}` is above upper bound `{}`",
                lower.text, upper.text
            )));
        }
        let empty = match (lower.value, upper.value) {
            // Integers are discrete: `gt = 5, lt = 6` admits nothing.
            (Num::Int(lo), Num::Int(hi)) => {
                let lo = if lower.inclusive { lo } else { lo + 1 };
                let hi = if upper.inclusive { hi } else { hi - 1 };
                lo > hi
            }
            _ => order == Ordering::Equal && !(lower.inclusive && upper.inclusive),
        };
        if empty {
            return Err(scope.conflict(format!(
                "`{}` and `{}` leave no admissible value",
                lower.text, upper.text
            )));
        }
        Ok(())
    }

    pub(super) fn admits(&self, value: Num) -> bool {
        let above = self.lower.as_ref().is_none_or(|lower| {
            matches!(
                (value.compare(lower.value), lower.inclusive),
                (Some(Ordering::Greater), _) | (Some(Ordering::Equal), true)
            )
        });
        let below = self.upper.as_ref().is_none_or(|upper| {
            matches!(
                (value.compare(upper.value), upper.inclusive),
                (Some(Ordering::Less), _) | (Some(Ordering::Equal), true)
            )
        });
        above && below
    }

    /// Write the bounds as `gt=`/`ge=`/`lt=`/`le=` with `render`.
    pub(super) fn emit(&self, render: impl Fn(Num) -> String, out: &mut Translated) {
        let metadata = &mut out.metadata;
        if let Some(lower) = &self.lower {
            let slot = if lower.inclusive { &mut metadata.ge } else { &mut metadata.gt };
            *slot = Some(render(lower.value));
        }
        if let Some(upper) = &self.upper {
            let slot = if upper.inclusive { &mut metadata.le } else { &mut metadata.lt };
            *slot = Some(render(upper.value));
        }
    }
}

/// Check `const` against the declared bounds and the `in`/`not_in` lists.
pub(super) fn check_const(
    constant: Num,
    bounds: &Bounds,
    allowed: Option<&[Num]>,
    denied: &[Num],
    scope: &Scope<'_>,
) -> Result<(), Error> {
    let shown = constant.render();
    if !bounds.admits(constant) {
        return Err(scope.conflict(format!("const {shown} is outside the declared bounds")));
    }
    if allowed.is_some_and(|allowed| !allowed.contains(&constant)) {
        return Err(scope.conflict(format!("const {shown} is not among the `in` values")));
    }
    if denied.contains(&constant) {
        return Err(scope.conflict(format!("const {shown} is listed in `not_in`")));
    }
    Ok(())
}

/// Rules of the ten integer families and `float`/`double`.
pub(super) fn translate(
    family: &str,
    raw: &RawConstraints,
    scope: &mut Scope<'_>,
    out: &mut Translated,
) -> Result<(), Error> {
    let float = family_scalar(family).is_some_and(ScalarKind::is_float);
    let num = |value: &RuleValue| -> Option<Num> {
        if float {
            value.as_f64().map(Num::Float)
        } else {
            value.as_i128().map(Num::Int)
        }
    };
    let list = |value: &RuleValue| -> Option<Vec<Num>> {
        value.as_list()?.iter().map(num).collect()
    };

    let mut bounds = Bounds::default();
    let mut constant = None;
    let mut allowed = None;
    let mut denied = Vec::new();
    for (rule, value) in &raw.rules {
        match (rule.as_str(), num(value)) {
            (bound @ ("gt" | "gte" | "lt" | "lte"), Some(n)) => {
                bounds.set(bound, n, format!("{bound} = {}", n.render()));
            }
            ("const", Some(n)) => constant = Some(n),
            ("finite", _) if float => {
                if value.as_bool() == Some(true) {
                    out.metadata.after("_require_finite", "_require_finite");
                }
            }
            ("in", _) if list(value).is_some() => allowed = list(value),
            ("not_in", _) if list(value).is_some() => denied = list(value).unwrap_or_default(),
            ("example", _) => {
                let examples = value.as_list().unwrap_or(std::slice::from_ref(value));
                out.metadata.examples.extend(
                    examples
                        .iter()
                        .filter_map(num)
                        .map(|n| Example::Code(n.render())),
                );
            }
            _ => scope.drop_rule(&format!("{family}.{rule}")),
        }
    }

    bounds.check(scope)?;
    bounds.emit(Num::render, out);
    if let Some(constant) = constant {
        check_const(constant, &bounds, allowed.as_deref(), &denied, scope)?;
        let rendered = constant.render();
        if float {
            // `Literal[...]` cannot hold floats.
            out.metadata.after(
                "_make_const_validator",
                format!("_make_const_validator({rendered})"),
            );
            out.constant = Some(Constant {
                literal: None,
                default: DefaultValue::Literal(rendered),
            });
        } else {
            out.constant = Some(Constant {
                literal: Some(rendered.clone()),
                default: DefaultValue::Literal(rendered),
            });
        }
    }
    if let Some(allowed) = allowed {
        let items: Vec<String> = allowed.into_iter().map(Num::render).collect();
        out.metadata.after(
            "_make_in_validator",
            format!("_make_in_validator({})", py_frozenset(&items)),
        );
    }
    if !denied.is_empty() {
        let items: Vec<String> = denied.into_iter().map(Num::render).collect();
        out.metadata.after(
            "_make_not_in_validator",
            format!("_make_not_in_validator({})", py_frozenset(&items)),
        );
    }
    Ok(())
}

/// `bool` rules: only `const` (and `example`) exist.
pub(super) fn translate_bool(raw: &RawConstraints, scope: &mut Scope<'_>, out: &mut Translated) {
    for (rule, value) in &raw.rules {
        match (rule.as_str(), value.as_bool()) {
            ("const", Some(v)) => {
                out.constant = Some(Constant {
                    literal: Some(py_bool(v).to_string()),
                    default: DefaultValue::Literal(py_bool(v).to_string()),
                });
            }
            ("example", _) => {
                let examples = value.as_list().unwrap_or(std::slice::from_ref(value));
                out.metadata.examples.extend(
                    examples
                        .iter()
                        .filter_map(RuleValue::as_bool)
                        .map(|v| Example::Code(py_bool(v).to_string())),
                );
            }
            _ => scope.drop_rule(&format!("bool.{rule}")),
        }
    }
}
