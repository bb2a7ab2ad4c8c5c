use crate::schema::{Cardinality, ScalarKind, TypeNode, WellKnownKind};

/// The `FieldRules.type` variant expected for a field of this type and cardinality.
pub(super) fn expected_field_rule(type_node: &TypeNode, cardinality: Cardinality) -> Option<&'static str> {
    match cardinality {
        Cardinality::Repeated => Some("repeated"),
        Cardinality::Map => Some("map"),
        _ => expected_rule(type_node),
    }
}

/// The `FieldRules.type` variant expected for a single value of this type.
pub(super) fn expected_rule(type_node: &TypeNode) -> Option<&'static str> {
    match type_node {
        TypeNode::Scalar(kind) => Some(kind.proto_name()),
        TypeNode::Enum(_) => Some("enum"),
        TypeNode::Map(..) => Some("map"),
        TypeNode::Message(_) => None,
        TypeNode::WellKnown(kind) => expected_well_known_rule(*kind),
    }
}

/// Wrapper types take the rules of the scalar they carry.
pub(super) fn expected_well_known_rule(kind: WellKnownKind) -> Option<&'static str> {
    if let Some(wrapped) = kind.wrapped_scalar() {
        return Some(wrapped.proto_name());
    }
    match kind {
        WellKnownKind::Any => Some("any"),
        WellKnownKind::Duration => Some("duration"),
        WellKnownKind::Timestamp => Some("timestamp"),
        WellKnownKind::FieldMask => Some("field_mask"),
        _ => None,
    }
}

/// The scalar a rule family constrains, if it is a scalar family.
pub(super) fn family_scalar(family: &str) -> Option<ScalarKind> {
    Some(match family {
        "double" => ScalarKind::Double,
        "float" => ScalarKind::Float,
        "int64" => ScalarKind::Int64,
        "uint64" => ScalarKind::Uint64,
        "int32" => ScalarKind::Int32,
        "fixed64" => ScalarKind::Fixed64,
        "fixed32" => ScalarKind::Fixed32,
        "bool" => ScalarKind::Bool,
        "string" => ScalarKind::String,
        "bytes" => ScalarKind::Bytes,
        "uint32" => ScalarKind::Uint32,
        "sfixed32" => ScalarKind::Sfixed32,
        "sfixed64" => ScalarKind::Sfixed64,
        "sint32" => ScalarKind::Sint32,
        "sint64" => ScalarKind::Sint64,
        _ => return None,
    })
}

/// Human-readable type description for conflict messages.
pub(super) fn describe(type_node: &TypeNode, cardinality: Cardinality) -> String {
    let value = match type_node {
        TypeNode::Scalar(kind) => kind.proto_name().to_string(),
        TypeNode::Message(name) | TypeNode::Enum(name) => format!("`{name}`"),
        TypeNode::WellKnown(kind) => format!("`google.protobuf.{kind:?}`"),
        TypeNode::Map(..) => "map".to_string(),
    };
    match cardinality {
        Cardinality::Repeated => format!("repeated {value}"),
        _ => value,
    }
}
