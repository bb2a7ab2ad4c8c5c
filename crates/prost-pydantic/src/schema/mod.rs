//! Resolved view of the input descriptor set.

mod index;
mod model;
mod source;

pub use index::SchemaIndex;
pub use model::{
    Cardinality, Comments, EnumNode, EnumValueNode, FieldNode, FileNode, MessageNode, OneofNode,
    ScalarKind, Syntax, TypeNode, WellKnownKind,
};
