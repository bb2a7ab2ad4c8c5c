//! Protobuf type and cardinality to a Python type expression plus default.

use crate::error::{Error, Location, UnresolvedReferenceError, UnsupportedTypeError};
use crate::names::TypeNames;
use crate::python::PyType;
use crate::python::literal::{py_bool, py_float, py_quote};
use crate::schema::{Cardinality, FieldNode, ScalarKind, SchemaIndex, TypeNode, WellKnownKind};

/// The default a generated field declares.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// No default; the field must be supplied.
    Required,
    /// `None`.
    None,
    /// A rendered Python literal.
    Literal(String),
    /// A member of a generated enum.
    Member {
        /// Fully-qualified enum name.
        enum_name: String,
        /// Python class name of the enum.
        class: String,
        /// Python member name.
        member: String,
        /// Numeric value of the member.
        number: i32,
    },
    /// `default_factory=<factory>`.
    Factory(&'static str),
}

/// The Python shape of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedField {
    /// The field annotation.
    pub annotation: PyType,
    /// The declared default.
    pub default: DefaultValue,
}

/// Maps resolved schema types onto Python types.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper<'a> {
    index: &'a SchemaIndex,
    names: &'a TypeNames,
}

impl<'a> TypeMapper<'a> {
    /// Build a mapper reading class names from `names`.
    #[must_use]
    pub fn new(index: &'a SchemaIndex, names: &'a TypeNames) -> Self {
        Self { index, names }
    }

    /// Map a field's type and presence to an annotation and default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedType`] for map keys without a Python
    /// mapping or an unparseable proto2 default, and
    /// [`Error::UnresolvedReference`] for a type without a generated class.
    pub fn map_field(&self, field: &FieldNode, location: &Location) -> Result<MappedField, Error> {
        let value = self.map_type(&field.type_node, location)?;
        let (annotation, default) = match field.cardinality {
            Cardinality::Repeated => (PyType::List(Box::new(value)), DefaultValue::Factory("list")),
            Cardinality::Map => (value, DefaultValue::Factory("dict")),
            Cardinality::Required => (value, DefaultValue::Required),
            Cardinality::Optional | Cardinality::Oneof { .. } => {
                let default = match &field.default_value {
                    Some(text) => self.proto2_default(field, text, location)?,
                    None => DefaultValue::None,
                };
                (value.nullable(), default)
            }
            Cardinality::Singular => match &field.type_node {
                TypeNode::Scalar(kind) => {
                    let default = match &field.default_value {
                        Some(text) => self.proto2_default(field, text, location)?,
                        None => DefaultValue::Literal(zero_literal(*kind)),
                    };
                    (value, default)
                }
                TypeNode::Enum(enum_name) => {
                    let default = match &field.default_value {
                        Some(text) => self.proto2_default(field, text, location)?,
                        None => self.enum_member(enum_name, None, location)?,
                    };
                    (value, default)
                }
                TypeNode::Map(..) => (value, DefaultValue::Factory("dict")),
                TypeNode::Message(_) | TypeNode::WellKnown(_) => (value.nullable(), DefaultValue::None),
            },
        };
        Ok(MappedField {
            annotation,
            default,
        })
    }

    /// Map a bare type, ignoring cardinality.
    ///
    /// # Errors
    ///
    /// See [`TypeMapper::map_field`].
    pub fn map_type(&self, type_node: &TypeNode, location: &Location) -> Result<PyType, Error> {
        Ok(match type_node {
            TypeNode::Scalar(kind) => scalar(*kind),
            TypeNode::WellKnown(kind) => well_known(*kind),
            TypeNode::Message(full_name) | TypeNode::Enum(full_name) => self.class(full_name, location)?,
            TypeNode::Map(key, value) => {
                let key_type = match key.as_ref() {
                    TypeNode::Scalar(kind) if kind.is_integer() || matches!(kind, ScalarKind::Bool | ScalarKind::String) => {
                        scalar(*kind)
                    }
                    other => {
                        return Err(UnsupportedTypeError {
                            location: location.clone(),
                            cause: format!("map keys of type {} are not supported", describe(other)),
                        }
                        .into());
                    }
                };
                PyType::Dict(Box::new(key_type), Box::new(self.map_type(value, location)?))
            }
        })
    }

    fn class(&self, full_name: &str, location: &Location) -> Result<PyType, Error> {
        let name = self.names.get(full_name).ok_or_else(|| UnresolvedReferenceError {
            location: location.clone(),
            type_name: full_name.to_string(),
        })?;
        Ok(PyType::Class {
            full_name: full_name.to_string(),
            name: name.to_string(),
        })
    }

    /// The zero value of a field's type, ignoring declared defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedReference`] or [`Error::UnsupportedType`]
    /// for enums without a class or without values.
    pub fn zero_value(&self, field: &FieldNode, location: &Location) -> Result<DefaultValue, Error> {
        Ok(match (field.cardinality, &field.type_node) {
            (Cardinality::Repeated, _) => DefaultValue::Factory("list"),
            (Cardinality::Map, _) | (_, TypeNode::Map(..)) => DefaultValue::Factory("dict"),
            (_, TypeNode::Scalar(kind)) => DefaultValue::Literal(zero_literal(*kind)),
            (_, TypeNode::Enum(enum_name)) => self.enum_member(enum_name, None, location)?,
            (_, TypeNode::Message(_) | TypeNode::WellKnown(_)) => DefaultValue::None,
        })
    }

    /// The member of `enum_name` declared as `value_name`, or its zero value.
    pub(crate) fn enum_member(
        &self,
        enum_name: &str,
        value_name: Option<&str>,
        location: &Location,
    ) -> Result<DefaultValue, Error> {
        let unresolved = || UnresolvedReferenceError {
            location: location.clone(),
            type_name: enum_name.to_string(),
        };
        let enumeration = self.index.enumeration(enum_name).ok_or_else(unresolved)?;
        let position = match value_name {
            Some(value_name) => enumeration.values.iter().position(|v| v.name == value_name),
            None => enumeration.zero_value(),
        };
        let Some(position) = position else {
            return Err(UnsupportedTypeError {
                location: location.clone(),
                cause: match value_name {
                    Some(value_name) => format!("`{value_name}` is not a value of `{enum_name}`"),
                    None => format!("enum `{enum_name}` declares no values"),
                },
            }
            .into());
        };
        let class = self.names.get(enum_name).ok_or_else(unresolved)?;
        let member = self.names.member(enum_name, position).ok_or_else(unresolved)?;
        Ok(DefaultValue::Member {
            enum_name: enum_name.to_string(),
            class: class.to_string(),
            member: member.to_string(),
            number: enumeration.values[position].number,
        })
    }

    fn proto2_default(
        &self,
        field: &FieldNode,
        text: &str,
        location: &Location,
    ) -> Result<DefaultValue, Error> {
        let invalid = || -> Error {
            UnsupportedTypeError {
                location: location.clone(),
                cause: format!("default value `{text}` cannot be represented in Python"),
            }
            .into()
        };
        let kind = match &field.type_node {
            TypeNode::Enum(enum_name) => return self.enum_member(enum_name, Some(text), location),
            TypeNode::Scalar(kind) => *kind,
            TypeNode::WellKnown(kind) => kind.wrapped_scalar().ok_or_else(invalid)?,
            TypeNode::Message(_) | TypeNode::Map(..) => return Err(invalid()),
        };
        let literal = match kind {
            ScalarKind::Bool => py_bool(text == "true").to_string(),
            ScalarKind::String => py_quote(text),
            // protoc reports bytes defaults C-escaped, which Python reads the same way.
            ScalarKind::Bytes => format!("b\"{text}\""),
            ScalarKind::Double | ScalarKind::Float => match text {
                "inf" => py_float(f64::INFINITY),
                "-inf" => py_float(f64::NEG_INFINITY),
                "nan" => py_float(f64::NAN),
                _ => py_float(text.parse::<f64>().map_err(|_| invalid())?),
            },
            _ => text.parse::<i128>().map_err(|_| invalid())?.to_string(),
        };
        Ok(DefaultValue::Literal(literal))
    }
}

/// The fixed scalar mapping.
pub(crate) fn scalar(kind: ScalarKind) -> PyType {
    match kind {
        ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => PyType::Runtime("ProtoInt32"),
        ScalarKind::Uint32 | ScalarKind::Fixed32 => PyType::Runtime("ProtoUInt32"),
        ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => PyType::Runtime("ProtoInt64"),
        ScalarKind::Uint64 | ScalarKind::Fixed64 => PyType::Runtime("ProtoUInt64"),
        ScalarKind::Double | ScalarKind::Float => PyType::Builtin("float"),
        ScalarKind::Bool => PyType::Builtin("bool"),
        ScalarKind::String => PyType::Builtin("str"),
        ScalarKind::Bytes => PyType::Builtin("bytes"),
    }
}

fn well_known(kind: WellKnownKind) -> PyType {
    if let Some(wrapped) = kind.wrapped_scalar() {
        return scalar(wrapped);
    }
    match kind {
        WellKnownKind::Timestamp => PyType::Runtime("ProtoTimestamp"),
        WellKnownKind::Duration => PyType::Runtime("ProtoDuration"),
        WellKnownKind::Struct => PyType::Dict(Box::new(PyType::Builtin("str")), Box::new(PyType::Any)),
        WellKnownKind::ListValue => PyType::List(Box::new(PyType::Any)),
        WellKnownKind::NullValue | WellKnownKind::Empty => PyType::Builtin("None"),
        WellKnownKind::FieldMask => PyType::List(Box::new(PyType::Builtin("str"))),
        _ => PyType::Any,
    }
}

/// The Python literal of a scalar's zero value.
pub(crate) fn zero_literal(kind: ScalarKind) -> String {
    match kind {
        ScalarKind::Bool => "False",
        ScalarKind::String => "\"\"",
        ScalarKind::Bytes => "b\"\"",
        ScalarKind::Double | ScalarKind::Float => "0.0",
        _ => "0",
    }
    .to_string()
}

fn describe(type_node: &TypeNode) -> String {
    match type_node {
        TypeNode::Scalar(kind) => kind.proto_name().to_string(),
        TypeNode::Message(name) | TypeNode::Enum(name) => format!("`{name}`"),
        TypeNode::WellKnown(kind) => format!("`google.protobuf.{kind:?}`"),
        TypeNode::Map(..) => "map".to_string(),
    }
}
