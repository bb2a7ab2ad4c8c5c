use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A single rule value lifted out of a `buf.validate` rules message.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    /// `bool` rule (`finite`, `unique`, `email`, ...).
    Bool(bool),
    /// Signed integer rule.
    Int(i64),
    /// Unsigned integer rule (lengths, `uint64` bounds).
    UInt(u64),
    /// `float`/`double` rule.
    Float(f64),
    /// `string` rule (`pattern`, `prefix`, ...).
    Str(String),
    /// `bytes` rule.
    Bytes(Vec<u8>),
    /// Enum-number rule (`enum.const`, `enum.in`, `well_known_regex`).
    Enum(i32),
    /// Repeated rule (`in`, `not_in`, `example`).
    List(Vec<RuleValue>),
    /// Message-valued rule, flattened to its set fields (e.g. a `Duration`).
    Message(Vec<(String, RuleValue)>),
    /// Nested `FieldRules` (`repeated.items`, `map.keys`, `map.values`).
    Nested(Box<RawConstraints>),
}

impl RuleValue {
    /// Integer view used by length and bound checks.
    pub(crate) fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Int(v) => Some(i128::from(*v)),
            Self::UInt(v) => Some(i128::from(*v)),
            Self::Enum(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            #[allow(clippy::cast_precision_loss)]
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub(crate) fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn as_list(&self) -> Option<&[RuleValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

/// A CEL rule attached through `cel` or `cel_expression`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelRule {
    /// Rule identifier, possibly empty.
    pub id: String,
    /// The CEL expression source.
    pub expression: String,
}

/// `buf.validate.field` rules for one field, still untranslated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConstraints {
    /// The active member of the `FieldRules.type` oneof (e.g. `string`, `repeated`).
    pub family: Option<String>,
    /// Set fields of the family message, in descriptor order.
    pub rules: Vec<(String, RuleValue)>,
    /// `FieldRules.required`.
    pub required: bool,
    /// `FieldRules.ignore` was set to `IGNORE_ALWAYS`.
    pub ignored: bool,
    /// `FieldRules.ignore` was set to `IGNORE_IF_ZERO_VALUE`.
    pub ignore_if_zero: bool,
    /// Field-level CEL rules.
    pub cel: Vec<CelRule>,
}

impl RawConstraints {
    /// Returns true when no rule of any kind is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.family.is_none() && self.rules.is_empty() && !self.required && self.cel.is_empty()
    }

    pub(crate) fn get(&self, rule: &str) -> Option<&RuleValue> {
        self.rules
            .iter()
            .find_map(|(name, value)| (name == rule).then_some(value))
    }
}

/// A `(buf.validate.message).oneof` rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOneofRule {
    /// Member field names.
    pub fields: Vec<String>,
    /// Whether exactly one member must be set.
    pub required: bool,
}

/// `buf.validate.message` rules for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageRules {
    /// Message-level CEL rules.
    pub cel: Vec<CelRule>,
    /// Ad-hoc oneof rules across regular fields.
    pub oneofs: Vec<MessageOneofRule>,
}

impl MessageRules {
    /// Returns true when no rule is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cel.is_empty() && self.oneofs.is_empty()
    }
}

/// All constraint metadata of a request, keyed by fully-qualified names.
///
/// Filled from descriptor extensions by [`crate::annotations`] or built by hand.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Field rules keyed by field full name (`pkg.Message.field`).
    pub fields: HashMap<String, RawConstraints>,
    /// Message rules keyed by message full name.
    pub messages: HashMap<String, MessageRules>,
    /// Full names of oneofs with `(buf.validate.oneof).required = true`.
    pub required_oneofs: BTreeSet<String>,
    /// Options of enum values keyed by `pkg.Enum.VALUE`, when any is set.
    pub enum_values: HashMap<String, EnumValueOptions>,
    /// Custom `EnumValueOptions` extensions declared in the request, by name,
    /// with the Python type of their values.
    pub enum_option_fields: BTreeMap<String, String>,
}

impl RuleSet {
    /// Returns true when no rules were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.messages.is_empty()
            && self.required_oneofs.is_empty()
            && self.enum_values.is_empty()
    }
}

/// Enum value options that only the reflected pool carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumValueOptions {
    /// `debug_redact = true`.
    pub debug_redact: bool,
    /// Set custom option extensions, sorted by extension name.
    pub custom: Vec<(String, RuleValue)>,
}

impl EnumValueOptions {
    /// Returns true when nothing is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.debug_redact && self.custom.is_empty()
    }
}
