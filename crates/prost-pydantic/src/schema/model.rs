use prost_types::field_descriptor_proto::Type;

use crate::constraints::{MessageRules, RawConstraints, RuleValue};
use crate::error::SourceSpan;

/// The fifteen protobuf scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ScalarKind {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Bytes,
    Uint32,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl ScalarKind {
    pub(crate) fn from_proto(ty: Type) -> Option<Self> {
        Some(match ty {
            Type::Double => Self::Double,
            Type::Float => Self::Float,
            Type::Int64 => Self::Int64,
            Type::Uint64 => Self::Uint64,
            Type::Int32 => Self::Int32,
            Type::Fixed64 => Self::Fixed64,
            Type::Fixed32 => Self::Fixed32,
            Type::Bool => Self::Bool,
            Type::String => Self::String,
            Type::Bytes => Self::Bytes,
            Type::Uint32 => Self::Uint32,
            Type::Sfixed32 => Self::Sfixed32,
            Type::Sfixed64 => Self::Sfixed64,
            Type::Sint32 => Self::Sint32,
            Type::Sint64 => Self::Sint64,
            Type::Group | Type::Message | Type::Enum => return None,
        })
    }

    /// The `.proto` spelling of this kind, which is also the name of its
    /// `buf.validate.FieldRules` variant.
    #[must_use]
    pub fn proto_name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Int32 => "int32",
            Self::Fixed64 => "fixed64",
            Self::Fixed32 => "fixed32",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Uint32 => "uint32",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
        }
    }

    /// Returns true for the ten integer kinds.
    #[must_use]
    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            Self::Double | Self::Float | Self::Bool | Self::String | Self::Bytes
        )
    }

    /// Returns true for `float` and `double`.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Double | Self::Float)
    }
}

/// Protobuf-defined standard messages with dedicated Python mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum WellKnownKind {
    Timestamp,
    Duration,
    Struct,
    Value,
    ListValue,
    NullValue,
    Empty,
    FieldMask,
    Any,
    DoubleValue,
    FloatValue,
    Int64Value,
    UInt64Value,
    Int32Value,
    UInt32Value,
    BoolValue,
    StringValue,
    BytesValue,
}

impl WellKnownKind {
    /// Look up a well-known type by its fully-qualified name (no leading dot).
    #[must_use]
    pub fn from_full_name(name: &str) -> Option<Self> {
        Some(match name.strip_prefix("google.protobuf.")? {
            "Timestamp" => Self::Timestamp,
            "Duration" => Self::Duration,
            "Struct" => Self::Struct,
            "Value" => Self::Value,
            "ListValue" => Self::ListValue,
            "NullValue" => Self::NullValue,
            "Empty" => Self::Empty,
            "FieldMask" => Self::FieldMask,
            "Any" => Self::Any,
            "DoubleValue" => Self::DoubleValue,
            "FloatValue" => Self::FloatValue,
            "Int64Value" => Self::Int64Value,
            "UInt64Value" => Self::UInt64Value,
            "Int32Value" => Self::Int32Value,
            "UInt32Value" => Self::UInt32Value,
            "BoolValue" => Self::BoolValue,
            "StringValue" => Self::StringValue,
            "BytesValue" => Self::BytesValue,
            _ => return None,
        })
    }

    /// The scalar carried by a wrapper type.
    #[must_use]
    pub fn wrapped_scalar(self) -> Option<ScalarKind> {
        Some(match self {
            Self::DoubleValue => ScalarKind::Double,
            Self::FloatValue => ScalarKind::Float,
            Self::Int64Value => ScalarKind::Int64,
            Self::UInt64Value => ScalarKind::Uint64,
            Self::Int32Value => ScalarKind::Int32,
            Self::UInt32Value => ScalarKind::Uint32,
            Self::BoolValue => ScalarKind::Bool,
            Self::StringValue => ScalarKind::String,
            Self::BytesValue => ScalarKind::Bytes,
            _ => return None,
        })
    }
}

/// A resolved protobuf type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeNode {
    /// A scalar value.
    Scalar(ScalarKind),
    /// A message, by fully-qualified name.
    Message(String),
    /// An enum, by fully-qualified name.
    Enum(String),
    /// A `map<key, value>` field.
    Map(Box<TypeNode>, Box<TypeNode>),
    /// A well-known type with a fixed mapping.
    WellKnown(WellKnownKind),
}

/// How many values a field holds and how its presence is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Implicit presence: the field always reads as its type default.
    Singular,
    /// Explicit presence: proto3 `optional` or proto2/editions `optional`.
    Optional,
    /// proto2 `required`.
    Required,
    /// `repeated`, excluding maps.
    Repeated,
    /// `map<K, V>`.
    Map,
    /// Member of a real oneof; `group` indexes [`MessageNode::oneofs`].
    Oneof {
        /// Position of the group in the owning message.
        group: usize,
    },
}

/// File syntax, which decides presence for singular scalar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Syntax {
    Proto2,
    Proto3,
    Editions,
}

impl Syntax {
    pub(crate) fn from_proto(syntax: &str) -> Self {
        match syntax {
            "proto3" => Self::Proto3,
            "editions" => Self::Editions,
            _ => Self::Proto2,
        }
    }
}

/// Leading and trailing comments attached to a declaration, one entry per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Comments {
    pub leading: Vec<String>,
    pub trailing: Vec<String>,
}

/// A message field.
#[derive(Debug, Clone)]
pub struct FieldNode {
    /// Name as declared in the `.proto` file.
    pub name: String,
    /// Fully-qualified name (`pkg.Message.field`).
    pub full_name: String,
    /// JSON name (camelCase unless overridden with `json_name`).
    pub json_name: String,
    /// Tag number.
    pub number: i32,
    /// Resolved type.
    pub type_node: TypeNode,
    /// Cardinality and oneof membership.
    pub cardinality: Cardinality,
    /// proto2 `[default = ...]` text, as the compiler reports it.
    pub default_value: Option<String>,
    /// Whether `[deprecated = true]` is set.
    pub deprecated: bool,
    /// Comments from source info.
    pub comments: Comments,
    /// Declaration position.
    pub span: Option<SourceSpan>,
    /// Raw `buf.validate.field` rules, translated later.
    pub constraints: RawConstraints,
}

impl FieldNode {
    /// The oneof group this field belongs to, if any.
    #[must_use]
    pub fn oneof_group(&self) -> Option<usize> {
        match self.cardinality {
            Cardinality::Oneof { group } => Some(group),
            _ => None,
        }
    }
}

/// A real (non-synthetic) oneof group.
#[derive(Debug, Clone)]
pub struct OneofNode {
    /// Declared group name.
    pub name: String,
    /// Fully-qualified name (`pkg.Message.group`).
    pub full_name: String,
    /// Indexes of the member fields in [`MessageNode::fields`].
    pub fields: Vec<usize>,
    /// Whether `(buf.validate.oneof).required` is set.
    pub required: bool,
}

/// A message declaration.
#[derive(Debug, Clone)]
pub struct MessageNode {
    /// Fully-qualified name.
    pub full_name: String,
    /// Declared (unqualified) name.
    pub name: String,
    /// Declaring file.
    pub file: String,
    /// Enclosing message, for nested declarations.
    pub parent: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<FieldNode>,
    /// Real oneof groups in declaration order.
    pub oneofs: Vec<OneofNode>,
    /// Nested messages, by fully-qualified name.
    pub nested_messages: Vec<String>,
    /// Nested enums, by fully-qualified name.
    pub nested_enums: Vec<String>,
    /// Comments from source info.
    pub comments: Comments,
    /// Declaration position.
    pub span: Option<SourceSpan>,
    /// Whether this is a synthesized `map<K, V>` entry.
    pub map_entry: bool,
    /// Raw `buf.validate.message` rules.
    pub rules: MessageRules,
}

/// A single enum value.
#[derive(Debug, Clone)]
pub struct EnumValueNode {
    /// Declared name.
    pub name: String,
    /// Numeric value.
    pub number: i32,
    /// Index of the first earlier value sharing `number`, when this value is an alias.
    pub alias_of: Option<usize>,
    /// Whether `[deprecated = true]` is set.
    pub deprecated: bool,
    /// Whether `[debug_redact = true]` is set.
    pub debug_redact: bool,
    /// Custom option extensions set on the value, sorted by name.
    pub custom_options: Vec<(String, RuleValue)>,
    /// Comments from source info.
    pub comments: Comments,
}

impl EnumValueNode {
    /// Whether any option beyond the number has to be carried.
    #[must_use]
    pub fn has_options(&self) -> bool {
        self.deprecated || self.debug_redact || !self.custom_options.is_empty()
    }
}

/// An enum declaration.
#[derive(Debug, Clone)]
pub struct EnumNode {
    /// Fully-qualified name.
    pub full_name: String,
    /// Declared (unqualified) name.
    pub name: String,
    /// Declaring file.
    pub file: String,
    /// Enclosing message, for nested declarations.
    pub parent: Option<String>,
    /// Values in declaration order.
    pub values: Vec<EnumValueNode>,
    /// Comments from source info.
    pub comments: Comments,
    /// Declaration position.
    pub span: Option<SourceSpan>,
}

impl EnumNode {
    /// Index of the value an unset or unknown field reads as: the first value
    /// numbered 0, or the first declared value for proto2 enums without one.
    #[must_use]
    pub fn zero_value(&self) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.number == 0)
            .or((!self.values.is_empty()).then_some(0))
    }
}

/// A `.proto` file as seen by the index.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Path as given to the compiler (e.g. `acme/user.proto`).
    pub name: String,
    /// Declared package, possibly empty.
    pub package: String,
    /// File syntax.
    pub syntax: Syntax,
    /// Imported files.
    pub dependencies: Vec<String>,
    /// Top-level messages, by fully-qualified name, in declaration order.
    pub messages: Vec<String>,
    /// Top-level enums, by fully-qualified name, in declaration order.
    pub enums: Vec<String>,
    /// File-level comments.
    pub comments: Comments,
}
