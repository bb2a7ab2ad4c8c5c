use std::collections::{BTreeMap, HashMap};

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    ServiceDescriptorProto,
};

use super::model::{
    Cardinality, EnumNode, EnumValueNode, FieldNode, FileNode, MessageNode, OneofNode, ScalarKind,
    Syntax, TypeNode, WellKnownKind,
};
use super::source::{
    ENUM_VALUE, FILE_ENUM, FILE_MESSAGE, FILE_SERVICE, FILE_SYNTAX, MESSAGE_ENUM, MESSAGE_FIELD,
    MESSAGE_NESTED, SERVICE_METHOD, SourceInfo, child_path,
};
use crate::constraints::RuleSet;
use crate::error::{
    DuplicateNameError, Error, Location, UnresolvedReferenceError, UnsupportedTypeError,
};
use crate::names::json_name;

/// A name registered during the first pass.
#[derive(Clone, Copy)]
enum Declared<'a> {
    Message {
        file: &'a str,
        proto: &'a DescriptorProto,
    },
    Enum {
        file: &'a str,
    },
}

impl Declared<'_> {
    fn file(&self) -> &str {
        match self {
            Self::Message { file, .. } | Self::Enum { file } => file,
        }
    }
}

/// Fully-resolved, cross-file lookup of every message and enum in a request.
///
/// Built in two passes: the first registers every declared name across all
/// files, the second resolves field types against that registry. Forward and
/// circular references therefore resolve regardless of declaration order.
#[derive(Debug, Default)]
pub struct SchemaIndex {
    files: Vec<FileNode>,
    messages: BTreeMap<String, MessageNode>,
    enums: BTreeMap<String, EnumNode>,
    enum_option_fields: BTreeMap<String, String>,
}

impl SchemaIndex {
    /// Index `files` (targets and their transitive imports) with the given rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] when a fully-qualified name is declared
    /// twice, [`Error::UnresolvedReference`] when a field, map value or method
    /// type cannot be found, and [`Error::UnsupportedType`] for group fields.
    pub fn build(files: &[FileDescriptorProto], rules: &RuleSet) -> Result<Self, Error> {
        let declared = register(files)?;
        tracing::debug!(
            files = files.len(),
            declarations = declared.len(),
            "registered declarations"
        );

        let mut index = Self {
            enum_option_fields: rules.enum_option_fields.clone(),
            ..Self::default()
        };
        for file in files {
            let resolver = FileResolver {
                declared: &declared,
                rules,
                file,
                source: SourceInfo::new(file.source_code_info.as_ref()),
                syntax: Syntax::from_proto(file.syntax()),
            };
            let node = resolver.index_file(&mut index)?;
            index.files.push(node);
        }
        Ok(index)
    }

    /// All indexed files, in input order.
    #[must_use]
    pub fn files(&self) -> &[FileNode] {
        &self.files
    }

    /// Look up a file by its path.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FileNode> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Look up a message by fully-qualified name.
    #[must_use]
    pub fn message(&self, full_name: &str) -> Option<&MessageNode> {
        self.messages.get(full_name)
    }

    /// Look up an enum by fully-qualified name.
    #[must_use]
    pub fn enumeration(&self, full_name: &str) -> Option<&EnumNode> {
        self.enums.get(full_name)
    }

    /// Custom enum value option extensions and the Python type of their values.
    #[must_use]
    pub fn enum_option_fields(&self) -> &BTreeMap<String, String> {
        &self.enum_option_fields
    }

    /// The file declaring a message or enum.
    #[must_use]
    pub fn declaring_file(&self, full_name: &str) -> Option<&str> {
        self.messages
            .get(full_name)
            .map(|m| m.file.as_str())
            .or_else(|| self.enums.get(full_name).map(|e| e.file.as_str()))
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn register(files: &[FileDescriptorProto]) -> Result<HashMap<String, Declared<'_>>, Error> {
    let mut declared = HashMap::new();
    for file in files {
        let source = SourceInfo::new(file.source_code_info.as_ref());
        let mut registrar = Registrar {
            declared: &mut declared,
            file: file.name(),
            source: &source,
        };
        for (i, message) in file.message_type.iter().enumerate() {
            registrar.message(file.package(), message, &child_path(&[], FILE_MESSAGE, i))?;
        }
        for (i, enumeration) in file.enum_type.iter().enumerate() {
            let name = qualify(file.package(), enumeration.name());
            registrar.insert(name, Declared::Enum { file: file.name() }, &child_path(&[], FILE_ENUM, i))?;
        }
    }
    Ok(declared)
}

struct Registrar<'a, 'm> {
    declared: &'m mut HashMap<String, Declared<'a>>,
    file: &'a str,
    source: &'m SourceInfo<'a>,
}

impl<'a> Registrar<'a, '_> {
    fn message(&mut self, scope: &str, proto: &'a DescriptorProto, path: &[i32]) -> Result<(), Error> {
        let full_name = qualify(scope, proto.name());
        for (i, nested) in proto.nested_type.iter().enumerate() {
            self.message(&full_name, nested, &child_path(path, MESSAGE_NESTED, i))?;
        }
        for (i, enumeration) in proto.enum_type.iter().enumerate() {
            let name = qualify(&full_name, enumeration.name());
            let declared = Declared::Enum { file: self.file };
            self.insert(name, declared, &child_path(path, MESSAGE_ENUM, i))?;
        }
        let declared = Declared::Message {
            file: self.file,
            proto,
        };
        self.insert(full_name, declared, path)
    }

    fn insert(&mut self, name: String, declared: Declared<'a>, path: &[i32]) -> Result<(), Error> {
        if let Some(previous) = self.declared.get(&name) {
            return Err(DuplicateNameError {
                location: Location::new(name)
                    .in_file(self.file)
                    .at(self.source.span(path)),
                previous_file: previous.file().to_string(),
            }
            .into());
        }
        self.declared.insert(name, declared);
        Ok(())
    }
}

struct FileResolver<'a> {
    declared: &'a HashMap<String, Declared<'a>>,
    rules: &'a RuleSet,
    file: &'a FileDescriptorProto,
    source: SourceInfo<'a>,
    syntax: Syntax,
}

impl<'a> FileResolver<'a> {
    fn index_file(&self, index: &mut SchemaIndex) -> Result<FileNode, Error> {
        let package = self.file.package();
        let mut node = FileNode {
            name: self.file.name().to_string(),
            package: package.to_string(),
            syntax: self.syntax,
            dependencies: self.file.dependency.clone(),
            messages: Vec::with_capacity(self.file.message_type.len()),
            enums: Vec::with_capacity(self.file.enum_type.len()),
            comments: self.source.comments(&[FILE_SYNTAX]),
        };

        for (i, enumeration) in self.file.enum_type.iter().enumerate() {
            let path = child_path(&[], FILE_ENUM, i);
            node.enums
                .push(self.index_enum(index, package, None, enumeration, &path));
        }
        for (i, message) in self.file.message_type.iter().enumerate() {
            let path = child_path(&[], FILE_MESSAGE, i);
            node.messages
                .push(self.index_message(index, package, None, message, &path)?);
        }
        for extension in &self.file.extension {
            self.check_extension(package, extension)?;
        }
        for (i, service) in self.file.service.iter().enumerate() {
            self.check_service(package, service, &child_path(&[], FILE_SERVICE, i))?;
        }

        tracing::debug!(
            file = %node.name,
            messages = node.messages.len(),
            enums = node.enums.len(),
            "indexed file"
        );
        Ok(node)
    }

    fn location(&self, entity: impl Into<String>, path: &[i32]) -> Location {
        Location::new(entity)
            .in_file(self.file.name())
            .at(self.source.span(path))
    }

    fn index_enum(
        &self,
        index: &mut SchemaIndex,
        scope: &str,
        parent: Option<&str>,
        proto: &EnumDescriptorProto,
        path: &[i32],
    ) -> String {
        let full_name = qualify(scope, proto.name());
        let values = proto
            .value
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let options = self
                    .rules
                    .enum_values
                    .get(&format!("{full_name}.{}", value.name()))
                    .cloned()
                    .unwrap_or_default();
                EnumValueNode {
                    name: value.name().to_string(),
                    number: value.number(),
                    alias_of: proto.value[..i]
                        .iter()
                        .position(|earlier| earlier.number() == value.number()),
                    deprecated: value.options.as_ref().is_some_and(|o| o.deprecated()),
                    debug_redact: options.debug_redact,
                    custom_options: options.custom,
                    comments: self.source.comments(&child_path(path, ENUM_VALUE, i)),
                }
            })
            .collect();

        index.enums.insert(
            full_name.clone(),
            EnumNode {
                full_name: full_name.clone(),
                name: proto.name().to_string(),
                file: self.file.name().to_string(),
                parent: parent.map(str::to_string),
                values,
                comments: self.source.comments(path),
                span: self.source.span(path),
            },
        );
        full_name
    }

    fn index_message(
        &self,
        index: &mut SchemaIndex,
        scope: &str,
        parent: Option<&str>,
        proto: &DescriptorProto,
        path: &[i32],
    ) -> Result<String, Error> {
        let full_name = qualify(scope, proto.name());

        let nested_enums = proto
            .enum_type
            .iter()
            .enumerate()
            .map(|(i, nested)| {
                let nested_path = child_path(path, MESSAGE_ENUM, i);
                self.index_enum(index, &full_name, Some(&full_name), nested, &nested_path)
            })
            .collect();
        let mut nested_messages = Vec::with_capacity(proto.nested_type.len());
        for (i, nested) in proto.nested_type.iter().enumerate() {
            let nested_path = child_path(path, MESSAGE_NESTED, i);
            nested_messages.push(self.index_message(
                index,
                &full_name,
                Some(&full_name),
                nested,
                &nested_path,
            )?);
        }

        // Oneofs holding only proto3 `optional` fields are synthetic and get no group.
        let mut oneofs = Vec::new();
        let mut group_of_decl = vec![None; proto.oneof_decl.len()];
        for (decl_index, decl) in proto.oneof_decl.iter().enumerate() {
            let synthetic = proto
                .field
                .iter()
                .filter(|f| f.oneof_index.and_then(|i| usize::try_from(i).ok()) == Some(decl_index))
                .all(FieldDescriptorProto::proto3_optional);
            if synthetic {
                continue;
            }
            group_of_decl[decl_index] = Some(oneofs.len());
            let oneof_name = format!("{full_name}.{}", decl.name());
            oneofs.push(OneofNode {
                name: decl.name().to_string(),
                required: self.rules.required_oneofs.contains(&oneof_name),
                full_name: oneof_name,
                fields: Vec::new(),
            });
        }

        let mut fields = Vec::with_capacity(proto.field.len());
        for (i, field) in proto.field.iter().enumerate() {
            let group = field
                .oneof_index
                .and_then(|idx| usize::try_from(idx).ok())
                .and_then(|idx| group_of_decl.get(idx).copied().flatten());
            if let Some(group) = group {
                oneofs[group].fields.push(i);
            }
            let field_path = child_path(path, MESSAGE_FIELD, i);
            fields.push(self.index_field(&full_name, field, group, &field_path)?);
        }
        for extension in &proto.extension {
            self.check_extension(&full_name, extension)?;
        }

        index.messages.insert(
            full_name.clone(),
            MessageNode {
                full_name: full_name.clone(),
                name: proto.name().to_string(),
                file: self.file.name().to_string(),
                parent: parent.map(str::to_string),
                fields,
                oneofs,
                nested_messages,
                nested_enums,
                comments: self.source.comments(path),
                span: self.source.span(path),
                map_entry: proto.options.as_ref().is_some_and(|o| o.map_entry()),
                rules: self
                    .rules
                    .messages
                    .get(&full_name)
                    .cloned()
                    .unwrap_or_default(),
            },
        );
        Ok(full_name)
    }

    fn index_field(
        &self,
        message: &str,
        field: &FieldDescriptorProto,
        group: Option<usize>,
        path: &[i32],
    ) -> Result<FieldNode, Error> {
        let full_name = format!("{message}.{}", field.name());
        let location = || self.location(full_name.clone(), path);

        let declared_type = field.r#type.and_then(|t| Type::try_from(t).ok());
        let label = field
            .label
            .and_then(|l| Label::try_from(l).ok())
            .unwrap_or(Label::Optional);

        let type_node = match declared_type.and_then(ScalarKind::from_proto) {
            Some(scalar) => TypeNode::Scalar(scalar),
            None if declared_type == Some(Type::Group) => {
                return Err(UnsupportedTypeError {
                    location: location(),
                    cause: "proto2 groups are not supported".to_string(),
                }
                .into());
            }
            None => self.resolve_reference(
                message,
                field.type_name(),
                label == Label::Repeated,
                &location,
            )?,
        };

        let cardinality = match (&type_node, label) {
            (TypeNode::Map(..), _) => Cardinality::Map,
            (_, Label::Repeated) => Cardinality::Repeated,
            (_, Label::Required) => Cardinality::Required,
            _ => match group {
                Some(group) => Cardinality::Oneof { group },
                None if field.proto3_optional() || self.syntax != Syntax::Proto3 => {
                    Cardinality::Optional
                }
                None => Cardinality::Singular,
            },
        };

        Ok(FieldNode {
            name: field.name().to_string(),
            json_name: field
                .json_name
                .clone()
                .unwrap_or_else(|| json_name(field.name())),
            number: field.number(),
            type_node,
            cardinality,
            default_value: field.default_value.clone(),
            deprecated: field.options.as_ref().is_some_and(|o| o.deprecated()),
            comments: self.source.comments(path),
            span: self.source.span(path),
            constraints: self
                .rules
                .fields
                .get(&full_name)
                .cloned()
                .unwrap_or_default(),
            full_name,
        })
    }

    fn resolve_reference(
        &self,
        scope: &str,
        type_name: &str,
        repeated: bool,
        location: &dyn Fn() -> Location,
    ) -> Result<TypeNode, Error> {
        if type_name.is_empty() {
            return Err(UnsupportedTypeError {
                location: location(),
                cause: "field declares neither a scalar type nor a type name".to_string(),
            }
            .into());
        }
        if let Some(kind) = type_name
            .strip_prefix('.')
            .and_then(WellKnownKind::from_full_name)
        {
            return Ok(TypeNode::WellKnown(kind));
        }

        let Some((full_name, declared)) = self.lookup(scope, type_name) else {
            return Err(UnresolvedReferenceError {
                location: location(),
                type_name: type_name.to_string(),
            }
            .into());
        };
        if let Some(kind) = WellKnownKind::from_full_name(&full_name) {
            return Ok(TypeNode::WellKnown(kind));
        }

        Ok(match declared {
            Declared::Enum { .. } => TypeNode::Enum(full_name),
            Declared::Message { proto, .. }
                if repeated && proto.options.as_ref().is_some_and(|o| o.map_entry()) =>
            {
                self.map_type(&full_name, proto, location)?
            }
            Declared::Message { .. } => TypeNode::Message(full_name),
        })
    }

    fn map_type(
        &self,
        entry_name: &str,
        entry: &DescriptorProto,
        location: &dyn Fn() -> Location,
    ) -> Result<TypeNode, Error> {
        let part = |number: i32| -> Result<TypeNode, Error> {
            let Some(field) = entry.field.iter().find(|f| f.number() == number) else {
                return Err(UnsupportedTypeError {
                    location: location(),
                    cause: format!("map entry `{entry_name}` has no field number {number}"),
                }
                .into());
            };
            match field
                .r#type
                .and_then(|t| Type::try_from(t).ok())
                .and_then(ScalarKind::from_proto)
            {
                Some(scalar) => Ok(TypeNode::Scalar(scalar)),
                None => self.resolve_reference(entry_name, field.type_name(), false, location),
            }
        };
        Ok(TypeNode::Map(Box::new(part(1)?), Box::new(part(2)?)))
    }

    /// Resolve `type_name` from `scope` outwards, the way protoc scopes names.
    fn lookup(&self, scope: &str, type_name: &str) -> Option<(String, Declared<'a>)> {
        if let Some(absolute) = type_name.strip_prefix('.') {
            return self
                .declared
                .get(absolute)
                .map(|declared| (absolute.to_string(), *declared));
        }
        let mut scope = scope;
        loop {
            let candidate = qualify(scope, type_name);
            if let Some(declared) = self.declared.get(&candidate) {
                return Some((candidate, *declared));
            }
            if scope.is_empty() {
                return None;
            }
            scope = scope.rsplit_once('.').map_or("", |(outer, _)| outer);
        }
    }

    fn check_extension(&self, scope: &str, extension: &FieldDescriptorProto) -> Result<(), Error> {
        let name = qualify(scope, extension.name());
        let location = || Location::new(name.clone()).in_file(self.file.name());
        let declared_type = extension.r#type.and_then(|t| Type::try_from(t).ok());
        if declared_type.and_then(ScalarKind::from_proto).is_some() {
            return Ok(());
        }
        self.resolve_reference(scope, extension.type_name(), false, &location)
            .map(|_| ())
    }

    fn check_service(
        &self,
        package: &str,
        service: &ServiceDescriptorProto,
        path: &[i32],
    ) -> Result<(), Error> {
        let service_name = qualify(package, service.name());
        for (i, method) in service.method.iter().enumerate() {
            let method_path = child_path(path, SERVICE_METHOD, i);
            let location = || self.location(format!("{service_name}.{}", method.name()), &method_path);
            for type_name in [method.input_type(), method.output_type()] {
                self.resolve_reference(&service_name, type_name, false, &location)?;
            }
        }
        Ok(())
    }
}
