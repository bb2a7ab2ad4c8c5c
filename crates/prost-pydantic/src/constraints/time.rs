use super::number::{Bounds, Num, check_const};
use super::{Constant, Example, RawConstraints, RuleValue, Scope, Translated, py_tuple};
use crate::error::Error;
use crate::types::DefaultValue;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const EPOCH: &str = "_datetime.datetime(1970, 1, 1, tzinfo=_datetime.timezone.utc)";

/// Total nanoseconds of a flattened `Duration`/`Timestamp` value.
fn nanos(value: &RuleValue) -> Option<i128> {
    let RuleValue::Message(fields) = value else {
        return None;
    };
    let mut total = 0;
    for (name, field) in fields {
        match name.as_str() {
            "seconds" => total += field.as_i128()? * NANOS_PER_SECOND,
            "nanos" => total += field.as_i128()?,
            _ => {}
        }
    }
    Some(total)
}

/// `1.5s`, `-2s`: how bounds read in conflict messages.
fn seconds_text(nanos: i128) -> String {
    let sign = if nanos < 0 { "-" } else { "" };
    let abs = nanos.unsigned_abs();
    let per_second = NANOS_PER_SECOND.unsigned_abs();
    let (secs, frac) = (abs / per_second, abs % per_second);
    if frac == 0 {
        return format!("{sign}{secs}s");
    }
    let frac = format!("{frac:09}");
    format!("{sign}{secs}.{}s", frac.trim_end_matches('0'))
}

fn timedelta(nanos: i128) -> String {
    let micros = nanos.div_euclid(1000);
    let (secs, micros) = (micros.div_euclid(1_000_000), micros.rem_euclid(1_000_000));
    if micros == 0 {
        format!("_datetime.timedelta(seconds={secs})")
    } else {
        format!("_datetime.timedelta(seconds={secs}, microseconds={micros})")
    }
}

/// Rules of the `duration` and `timestamp` families.
pub(super) fn translate(
    family: &str,
    raw: &RawConstraints,
    scope: &mut Scope<'_>,
    out: &mut Translated,
) -> Result<(), Error> {
    let render = |n: Num| -> String {
        let Num::Int(nanos) = n else {
            return n.render();
        };
        match family {
            "timestamp" => format!("{EPOCH} + {}", timedelta(nanos)),
            _ => timedelta(nanos),
        }
    };
    let list = |value: &RuleValue| -> Option<Vec<Num>> {
        value.as_list()?.iter().map(|v| nanos(v).map(Num::Int)).collect()
    };

    let mut bounds = Bounds::default();
    let mut constant = None;
    let mut allowed = None;
    let mut denied = Vec::new();
    let mut truncated = false;
    for (rule, value) in &raw.rules {
        if let Some(n) = nanos(value) {
            truncated |= n % 1000 != 0;
        }
        match (rule.as_str(), nanos(value)) {
            (bound @ ("gt" | "gte" | "lt" | "lte"), Some(n)) => {
                bounds.set(bound, Num::Int(n), format!("{bound} = {}", seconds_text(n)));
            }
            ("const", Some(n)) => constant = Some(Num::Int(n)),
            ("in", _) if family == "duration" && list(value).is_some() => allowed = list(value),
            ("not_in", _) if family == "duration" && list(value).is_some() => {
                denied = list(value).unwrap_or_default();
            }
            ("example", _) => {
                let examples = value.as_list().unwrap_or(std::slice::from_ref(value));
                out.metadata.examples.extend(
                    examples
                        .iter()
                        .filter_map(nanos)
                        .map(|n| Example::Code(render(Num::Int(n)))),
                );
            }
            _ => scope.drop_rule(&format!("{family}.{rule}")),
        }
    }
    if truncated {
        scope.note(format!(
            "`{family}` rule values are truncated to microseconds"
        ));
    }

    bounds.check(scope)?;
    if bounds.lower.is_some() || bounds.upper.is_some() {
        out.metadata.imports.datetime();
    }
    bounds.emit(&render, out);
    if let Some(constant) = constant {
        check_const(constant, &bounds, allowed.as_deref(), &denied, scope)?;
        let rendered = render(constant);
        out.metadata.imports.datetime();
        out.metadata.after(
            "_make_const_validator",
            format!("_make_const_validator({rendered})"),
        );
        out.constant = Some(Constant {
            literal: None,
            default: DefaultValue::Literal(rendered),
        });
    }
    for (helper, values) in [
        ("_make_in_validator", allowed.unwrap_or_default()),
        ("_make_not_in_validator", denied),
    ] {
        if values.is_empty() {
            continue;
        }
        let items: Vec<String> = values.into_iter().map(&render).collect();
        out.metadata.imports.datetime();
        out.metadata
            .after(helper, format!("{helper}({})", py_tuple(&items)));
    }
    if !out.metadata.examples.is_empty() {
        out.metadata.imports.datetime();
    }
    Ok(())
}
