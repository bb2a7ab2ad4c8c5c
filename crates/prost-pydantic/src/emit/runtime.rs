//! The per-directory `_proto_types.py` helper module.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::GeneratorConfig;
use crate::python::imports::import_line;

pub(crate) const HEADER: &str = "# DO NOT EDIT. Generated by protoc-gen-pydantic.";

const BASE: &str = r#"
def _coerce_int(v: _Any) -> _Any:
    if isinstance(v, str):
        return int(v)
    return v


def _int_range(lo: int, hi: int):
    def check(v: int) -> int:
        if not lo <= v <= hi:
            raise ValueError(f"value {v} is out of range [{lo}, {hi}]")
        return v

    return check


def _int_to_str(v: int) -> str:
    return str(v)


ProtoInt32 = _Annotated[
    int,
    _BeforeValidator(_coerce_int),
    _AfterValidator(_int_range(-(2**31), 2**31 - 1)),
]
ProtoUInt32 = _Annotated[
    int,
    _BeforeValidator(_coerce_int),
    _AfterValidator(_int_range(0, 2**32 - 1)),
]
ProtoInt64 = _Annotated[
    int,
    _BeforeValidator(_coerce_int),
    _AfterValidator(_int_range(-(2**63), 2**63 - 1)),
    _PlainSerializer(_int_to_str, return_type=str, when_used="json"),
]
ProtoUInt64 = _Annotated[
    int,
    _BeforeValidator(_coerce_int),
    _AfterValidator(_int_range(0, 2**64 - 1)),
    _PlainSerializer(_int_to_str, return_type=str, when_used="json"),
]


def _parse_timestamp(v: _Any) -> _Any:
    if isinstance(v, str):
        return _datetime.datetime.fromisoformat(v.replace("Z", "+00:00"))
    return v


def _serialize_timestamp(v: _datetime.datetime) -> str:
    if v.tzinfo is None:
        v = v.replace(tzinfo=_datetime.timezone.utc)
    return v.astimezone(_datetime.timezone.utc).isoformat().replace("+00:00", "Z")


ProtoTimestamp = _Annotated[
    _datetime.datetime,
    _BeforeValidator(_parse_timestamp),
    _PlainSerializer(_serialize_timestamp, return_type=str, when_used="json"),
]

_DURATION_RE = _re.compile(r"^(-?\d+(?:\.\d+)?)s$")


def _parse_duration(v: _Any) -> _Any:
    if isinstance(v, str):
        match = _DURATION_RE.match(v)
        if match is None:
            raise ValueError(f"invalid duration {v!r}")
        return _datetime.timedelta(seconds=float(match.group(1)))
    return v


def _serialize_duration(v: _datetime.timedelta) -> str:
    micros = (v.days * 86400 + v.seconds) * 1_000_000 + v.microseconds
    sign = "-" if micros < 0 else ""
    seconds, micros = divmod(abs(micros), 1_000_000)
    if micros:
        return f"{sign}{seconds}.{micros:06d}".rstrip("0") + "s"
    return f"{sign}{seconds}s"


ProtoDuration = _Annotated[
    _datetime.timedelta,
    _BeforeValidator(_parse_duration),
    _PlainSerializer(_serialize_duration, return_type=str, when_used="json"),
]


def _is_populated(model: _BaseModel, name: str) -> bool:
    value = getattr(model, name)
    if value is None:
        return False
    if type(model).model_fields[name].default is None:
        return True
    if isinstance(value, _Enum):
        return value is not type(value)._missing_(None)
    return bool(value)


def _check_oneof(model: _BaseModel, group: str, fields: tuple, required: bool = False) -> None:
    populated = [name for name in fields if _is_populated(model, name)]
    if len(populated) > 1:
        raise ValueError(f"only one of {', '.join(fields)} may be set ({group})")
    if required and not populated:
        raise ValueError(f"one of {', '.join(fields)} must be set ({group})")


class ProtoModel(_BaseModel):
    """Base class for generated models with ProtoJSON helpers."""

    def to_proto_dict(self, **kwargs) -> dict:
        """Serialize to a dict, omitting default values and using proto names."""
        kwargs.setdefault("exclude_defaults", True)
        kwargs.setdefault("by_alias", True)
        return super().model_dump(**kwargs)

    def to_proto_json(self, **kwargs) -> str:
        """Serialize to JSON, omitting default values and using proto names."""
        kwargs.setdefault("exclude_defaults", True)
        kwargs.setdefault("by_alias", True)
        return super().model_dump_json(**kwargs)

    @classmethod
    def from_proto_dict(cls, data: dict, **kwargs):
        """Deserialize from a ProtoJSON dict."""
        return cls.model_validate(data, **kwargs)

    @classmethod
    def from_proto_json(cls, json_str: str, **kwargs):
        """Deserialize from a ProtoJSON string."""
        return cls.model_validate_json(json_str, **kwargs)
"#;

/// Helpers emitted only when a generated module in the directory uses them.
/// Each entry is `(name, source)`; order is emission order.
const ON_DEMAND: &[(&str, &str)] = &[
    (
        "_require_unique",
        r#"
def _require_unique(v: list) -> list:
    seen = []
    for item in v:
        if item in seen:
            raise ValueError(f"repeated value {item!r} is not unique")
        seen.append(item)
    return v
"#,
    ),
    (
        "_make_in_validator",
        r#"
def _make_in_validator(values):
    allowed = tuple(values)

    def check(v):
        if v not in allowed:
            raise ValueError(f"value must be one of {sorted(map(repr, allowed))}")
        return v

    return check
"#,
    ),
    (
        "_make_not_in_validator",
        r#"
def _make_not_in_validator(values):
    denied = tuple(values)

    def check(v):
        if v in denied:
            raise ValueError(f"value must not be one of {sorted(map(repr, denied))}")
        return v

    return check
"#,
    ),
    (
        "_make_const_validator",
        r#"
def _make_const_validator(expected):
    def check(v):
        if v != expected:
            raise ValueError(f"value must equal {expected!r}")
        return v

    return check
"#,
    ),
    (
        "_require_finite",
        r#"
def _require_finite(v: float) -> float:
    if not _math.isfinite(v):
        raise ValueError("value must be finite")
    return v
"#,
    ),
    (
        "_require_nonzero",
        r#"
def _require_nonzero(v: _Any) -> _Any:
    if not v:
        raise ValueError("value is required")
    return v
"#,
    ),
    (
        "_validate_email",
        r#"
def _validate_email(v: str) -> str:
    _pydantic_validate_email(v)
    return v
"#,
    ),
    (
        "_validate_uri",
        r#"
def _validate_uri(v: str) -> str:
    _url_adapter.validate_python(v)
    return v
"#,
    ),
    (
        "_validate_ip",
        r#"
def _validate_ip(v: str) -> str:
    _ipaddress.ip_address(v)
    return v
"#,
    ),
    (
        "_validate_ipv4",
        r#"
def _validate_ipv4(v: str) -> str:
    _ipaddress.IPv4Address(v)
    return v
"#,
    ),
    (
        "_validate_ipv6",
        r#"
def _validate_ipv6(v: str) -> str:
    _ipaddress.IPv6Address(v)
    return v
"#,
    ),
    (
        "_validate_uuid",
        r#"
def _validate_uuid(v: str) -> str:
    _uuid.UUID(v)
    return v
"#,
    ),
    (
        "_make_zero_skipper",
        r#"
def _make_zero_skipper(zero: _Any):
    def skip(v: _Any, handler: _Any) -> _Any:
        if v is None or v == zero:
            return v
        return handler(v)

    return skip
"#,
    ),
];

/// The `_EnumValueOptions` payload and `_ProtoEnum` base, with the enum's
/// value type substituted for `{base}` and custom option fields for `{custom}`.
const ENUM_OPTIONS: &str = r#"
@_dataclass(frozen=True)
class _EnumValueOptions:
    number: int
    deprecated: bool = False
    debug_redact: bool = False
{custom}

class _ProtoEnum({base}, _Enum):
    _options_: _EnumValueOptions

    def __new__(cls, value: {base}, options: _EnumValueOptions | None = None):
        obj = {base}.__new__(cls, value)
        obj._value_ = value
        obj._options_ = options if options is not None else _EnumValueOptions(number=-1)
        return obj

    @property
    def options(self) -> _EnumValueOptions:
        return self._options_
"#;

/// Render `_proto_types.py` with the always-present types plus the helpers
/// named in `used`. `option_fields` maps custom enum value options to the
/// Python type of their values.
pub(crate) fn runtime_module(
    used: &BTreeSet<&str>,
    config: &GeneratorConfig,
    option_fields: &BTreeMap<String, String>,
) -> String {
    let wants = |name: &str| used.contains(name);
    let enum_options = wants("_ProtoEnum") || wants("_EnumValueOptions");

    let mut standard = Vec::new();
    if enum_options {
        standard.push("from dataclasses import dataclass as _dataclass".to_string());
    }
    standard.push("import datetime as _datetime".to_string());
    standard.push("from enum import Enum as _Enum".to_string());
    if ["_validate_ip", "_validate_ipv4", "_validate_ipv6"].iter().any(|n| wants(n)) {
        standard.push("import ipaddress as _ipaddress".to_string());
    }
    if wants("_require_finite") {
        standard.push("import math as _math".to_string());
    }
    standard.push("import re as _re".to_string());
    standard.push("from typing import Annotated as _Annotated, Any as _Any".to_string());
    if wants("_validate_uuid") {
        standard.push("import uuid as _uuid".to_string());
    }

    let mut pydantic: Vec<String> = [
        "AfterValidator as _AfterValidator",
        "BaseModel as _BaseModel",
        "BeforeValidator as _BeforeValidator",
        "PlainSerializer as _PlainSerializer",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    if wants("_make_zero_skipper") {
        pydantic.push("WrapValidator as _WrapValidator".to_string());
    }
    if wants("_validate_uri") {
        pydantic.insert(0, "AnyUrl as _AnyUrl".to_string());
        pydantic.push("TypeAdapter as _TypeAdapter".to_string());
    }

    let mut out = String::new();
    out.push_str(HEADER);
    out.push_str("\n\"\"\"Runtime helpers shared by the generated models in this package.\"\"\"\n\n");
    for line in standard {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    for line in import_line("pydantic", &pydantic) {
        out.push_str(&line);
        out.push('\n');
    }
    if wants("_validate_email") {
        out.push_str("from pydantic.networks import validate_email as _pydantic_validate_email\n");
    }
    if wants("_validate_uri") {
        out.push_str("\n_url_adapter = _TypeAdapter(_AnyUrl)\n");
    }

    out.push('\n');
    out.push_str(BASE);
    for (name, source) in ON_DEMAND {
        if wants(name) {
            out.push('\n');
            out.push('\n');
            out.push_str(source);
        }
    }
    if enum_options {
        let base = if config.use_integers_for_enums { "int" } else { "str" };
        out.push('\n');
        out.push('\n');
        let custom: String = option_fields
            .iter()
            .map(|(name, ty)| format!("    {name}: {ty} | None = None\n"))
            .collect();
        out.push_str(&ENUM_OPTIONS.replace("{base}", base).replace("{custom}", &custom));
    }
    out
}
