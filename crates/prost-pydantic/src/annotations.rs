//! Read `buf.validate` annotations out of a reflected descriptor pool.
//!
//! The generator never links against the `buf.validate` schema. Whatever
//! version the caller compiled against travels inside the request, so rule
//! messages are walked dynamically and every set field becomes a
//! [`RuleValue`], named as declared.

use prost_reflect::{
    DescriptorPool, DynamicMessage, ExtensionDescriptor, FieldDescriptor, Kind, MessageDescriptor,
    ReflectMessage, Value,
};

use crate::constraints::{
    CelRule, EnumValueOptions, MessageOneofRule, MessageRules, RawConstraints, RuleSet, RuleValue,
};

const FIELD_RULES: &str = "buf.validate.FieldRules";
const ENUM_VALUE_OPTIONS: &str = "google.protobuf.EnumValueOptions";

/// The three `buf.validate` option extensions, when the pool declares them.
struct Extensions {
    field: Option<ExtensionDescriptor>,
    message: Option<ExtensionDescriptor>,
    oneof: Option<ExtensionDescriptor>,
}

impl Extensions {
    fn find(pool: &DescriptorPool) -> Self {
        Self {
            field: pool.get_extension_by_name("buf.validate.field"),
            message: pool.get_extension_by_name("buf.validate.message"),
            oneof: pool.get_extension_by_name("buf.validate.oneof"),
        }
    }

    fn is_empty(&self) -> bool {
        self.field.is_none() && self.message.is_none() && self.oneof.is_none()
    }
}

/// Collect every `buf.validate` rule attached to messages, fields and oneofs
/// of `pool`. A pool without the `buf.validate` extensions yields an empty set.
#[must_use]
pub fn extract(pool: &DescriptorPool) -> RuleSet {
    let extensions = Extensions::find(pool);
    let mut rules = RuleSet::default();
    if extensions.is_empty() {
        tracing::debug!("no buf.validate extensions in request; constraints are skipped");
        return rules;
    }
    for message in pool.all_messages() {
        if message.is_map_entry() {
            continue;
        }
        collect_message(&message, &extensions, &mut rules);
    }
    tracing::debug!(
        fields = rules.fields.len(),
        messages = rules.messages.len(),
        oneofs = rules.required_oneofs.len(),
        "collected buf.validate rules"
    );
    rules
}

fn collect_message(message: &MessageDescriptor, extensions: &Extensions, rules: &mut RuleSet) {
    if let Some(ext) = &extensions.message {
        if let Some(dynamic) = extension_message(&message.options(), ext) {
            let message_rules = message_rules(&dynamic);
            if !message_rules.is_empty() {
                rules
                    .messages
                    .insert(message.full_name().to_string(), message_rules);
            }
        }
    }
    if let Some(ext) = &extensions.oneof {
        for oneof in message.oneofs().filter(|oneof| !oneof.is_synthetic()) {
            let required = extension_message(&oneof.options(), ext)
                .and_then(|dynamic| dynamic.get_field_by_name("required").and_then(|v| v.as_bool()))
                .unwrap_or(false);
            if required {
                rules.required_oneofs.insert(oneof.full_name().to_string());
            }
        }
    }
    if let Some(ext) = &extensions.field {
        for field in message.fields() {
            let Some(dynamic) = extension_message(&field.options(), ext) else {
                continue;
            };
            let raw = field_rules(&dynamic);
            if !raw.is_empty() || raw.ignored {
                rules.fields.insert(field.full_name().to_string(), raw);
            }
        }
    }
}

fn extension_message(options: &DynamicMessage, ext: &ExtensionDescriptor) -> Option<DynamicMessage> {
    if !options.has_extension(ext) {
        return None;
    }
    options.get_extension(ext).as_message().cloned()
}

/// Set fields of `message` in declaration order.
fn set_fields(message: &DynamicMessage) -> Vec<(FieldDescriptor, Value)> {
    let descriptor = message.descriptor();
    descriptor
        .fields()
        .filter(|field| message.has_field(field))
        .map(|field| {
            let value = message.get_field(&field).into_owned();
            (field, value)
        })
        .collect()
}

/// Lift a `buf.validate.FieldRules` message.
pub(crate) fn field_rules(rules: &DynamicMessage) -> RawConstraints {
    let mut raw = RawConstraints::default();
    for (field, value) in set_fields(rules) {
        if field
            .containing_oneof()
            .is_some_and(|oneof| oneof.name() == "type")
        {
            raw.family = Some(field.name().to_string());
            if let Value::Message(family) = &value {
                raw.rules = set_fields(family)
                    .into_iter()
                    .map(|(rule, value)| (rule.name().to_string(), rule_value(&value)))
                    .collect();
            }
            continue;
        }
        match (field.name(), &value) {
            ("required", Value::Bool(required)) => raw.required = *required,
            ("ignore", Value::EnumNumber(number)) => match ignore_mode(&field, *number).as_deref() {
                Some("IGNORE_ALWAYS") => raw.ignored = true,
                Some("IGNORE_IF_ZERO_VALUE" | "IGNORE_IF_UNPOPULATED" | "IGNORE_IF_DEFAULT_VALUE") => {
                    raw.ignore_if_zero = true;
                }
                _ => {}
            },
            ("cel", Value::List(items)) => raw.cel.extend(items.iter().filter_map(cel_rule)),
            ("cel_expression", Value::List(items)) => {
                raw.cel.extend(items.iter().filter_map(|item| {
                    item.as_str().map(|expression| CelRule {
                        id: String::new(),
                        expression: expression.to_string(),
                    })
                }));
            }
            _ => {}
        }
    }
    raw
}

fn ignore_mode(field: &FieldDescriptor, number: i32) -> Option<String> {
    match field.kind() {
        Kind::Enum(ignore) => ignore.get_value(number).map(|value| value.name().to_string()),
        _ => None,
    }
}

fn cel_rule(value: &Value) -> Option<CelRule> {
    let rule = value.as_message()?;
    let text = |name: &str| {
        rule.get_field_by_name(name)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    };
    Some(CelRule {
        id: text("id"),
        expression: text("expression"),
    })
}

/// Lift a `buf.validate.MessageRules` message.
pub(crate) fn message_rules(rules: &DynamicMessage) -> MessageRules {
    let mut out = MessageRules::default();
    for (field, value) in set_fields(rules) {
        let Value::List(items) = &value else {
            continue;
        };
        match field.name() {
            "cel" => out.cel.extend(items.iter().filter_map(cel_rule)),
            "cel_expression" => out.cel.extend(items.iter().filter_map(|item| {
                item.as_str().map(|expression| CelRule {
                    id: String::new(),
                    expression: expression.to_string(),
                })
            })),
            "oneof" => out.oneofs.extend(items.iter().filter_map(|item| {
                let rule = item.as_message()?;
                let fields: Vec<String> = rule
                    .get_field_by_name("fields")
                    .and_then(|v| {
                        v.as_list().map(|names| {
                            names
                                .iter()
                                .filter_map(|name| name.as_str().map(str::to_string))
                                .collect()
                        })
                    })
                    .unwrap_or_default();
                let required = rule
                    .get_field_by_name("required")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                Some(MessageOneofRule { fields, required })
            })),
            _ => {}
        }
    }
    out
}

fn rule_value(value: &Value) -> RuleValue {
    match value {
        Value::Bool(v) => RuleValue::Bool(*v),
        Value::I32(v) => RuleValue::Int(i64::from(*v)),
        Value::I64(v) => RuleValue::Int(*v),
        Value::U32(v) => RuleValue::UInt(u64::from(*v)),
        Value::U64(v) => RuleValue::UInt(*v),
        Value::F32(v) => RuleValue::Float(f64::from(*v)),
        Value::F64(v) => RuleValue::Float(*v),
        Value::String(v) => RuleValue::Str(v.clone()),
        Value::Bytes(v) => RuleValue::Bytes(v.to_vec()),
        Value::EnumNumber(v) => RuleValue::Enum(*v),
        Value::List(items) => RuleValue::List(items.iter().map(rule_value).collect()),
        Value::Message(message) if message.descriptor().full_name() == FIELD_RULES => {
            RuleValue::Nested(Box::new(field_rules(message)))
        }
        Value::Message(message) => RuleValue::Message(
            set_fields(message)
                .into_iter()
                .map(|(field, value)| (field.name().to_string(), rule_value(&value)))
                .collect(),
        ),
        Value::Map(entries) => {
            tracing::warn!(entries = entries.len(), "map-valued rule is not supported; ignored");
            RuleValue::List(Vec::new())
        }
    }
}

/// Collect `debug_redact` and custom extension options of every enum value
/// in `pool` into `rules`.
pub fn collect_enum_value_options(pool: &DescriptorPool, rules: &mut RuleSet) {
    for extension in pool.all_extensions() {
        if extension.containing_message().full_name() != ENUM_VALUE_OPTIONS || extension.is_list() {
            continue;
        }
        rules
            .enum_option_fields
            .entry(extension.name().to_string())
            .or_insert_with(|| option_type(&extension.kind()).to_string());
    }

    for enumeration in pool.all_enums() {
        for value in enumeration.values() {
            let options = value.options();
            let mut collected = EnumValueOptions {
                debug_redact: options
                    .get_field_by_name("debug_redact")
                    .is_some_and(|v| v.as_bool() == Some(true)),
                custom: Vec::new(),
            };
            for (extension, option) in options.extensions() {
                match option {
                    Value::List(_) | Value::Map(_) | Value::Message(_) => {
                        tracing::warn!(
                            option = extension.full_name(),
                            value = value.full_name(),
                            "non-scalar enum value option is not carried"
                        );
                    }
                    scalar => collected
                        .custom
                        .push((extension.name().to_string(), rule_value(scalar))),
                }
            }
            collected.custom.sort_by(|a, b| a.0.cmp(&b.0));
            if !collected.is_empty() {
                rules.enum_values.insert(
                    format!("{}.{}", enumeration.full_name(), value.name()),
                    collected,
                );
            }
        }
    }
}

/// Python annotation for values of a custom enum value option.
fn option_type(kind: &Kind) -> &'static str {
    match kind {
        Kind::Bool => "bool",
        Kind::Int32
        | Kind::Int64
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Fixed32
        | Kind::Fixed64
        | Kind::Sfixed32
        | Kind::Sfixed64
        | Kind::Enum(_) => "int",
        Kind::Float | Kind::Double => "float",
        Kind::String => "str",
        Kind::Bytes => "bytes",
        Kind::Message(_) => "_Any",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use prost::Message;
    use prost_reflect::{DescriptorPool, DynamicMessage, Value};
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, OneofDescriptorProto,
    };

    use super::{collect_enum_value_options, extract, field_rules, message_rules};
    use crate::constraints::{
        CelRule, EnumValueOptions, MessageOneofRule, RawConstraints, RuleSet, RuleValue,
    };

    fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        }
    }

    fn typed(name: &str, number: i32, ty: Type, type_name: &str, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..field(name, number, ty, label)
        }
    }

    fn in_type_oneof(field: FieldDescriptorProto) -> FieldDescriptorProto {
        FieldDescriptorProto {
            oneof_index: Some(0),
            ..field
        }
    }

    /// A cut-down `buf/validate/validate.proto` with just what the tests set.
    fn validate_pool() -> DescriptorPool {
        let message = |name: &str, fields: Vec<FieldDescriptorProto>| DescriptorProto {
            name: Some(name.to_string()),
            field: fields,
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("buf/validate/validate.proto".to_string()),
            package: Some("buf.validate".to_string()),
            syntax: Some("proto2".to_string()),
            message_type: vec![
                DescriptorProto {
                    oneof_decl: vec![OneofDescriptorProto {
                        name: Some("type".to_string()),
                        ..Default::default()
                    }],
                    ..message(
                        "FieldRules",
                        vec![
                            in_type_oneof(typed("string", 14, Type::Message, ".buf.validate.StringRules", Label::Optional)),
                            in_type_oneof(typed("repeated", 18, Type::Message, ".buf.validate.RepeatedRules", Label::Optional)),
                            typed("cel", 23, Type::Message, ".buf.validate.Rule", Label::Repeated),
                            field("required", 25, Type::Bool, Label::Optional),
                            typed("ignore", 27, Type::Enum, ".buf.validate.Ignore", Label::Optional),
                        ],
                    )
                },
                message(
                    "StringRules",
                    vec![
                        field("min_len", 2, Type::Uint64, Label::Optional),
                        field("max_len", 3, Type::Uint64, Label::Optional),
                        field("in", 10, Type::String, Label::Repeated),
                    ],
                ),
                message(
                    "RepeatedRules",
                    vec![
                        field("min_items", 1, Type::Uint64, Label::Optional),
                        typed("items", 4, Type::Message, ".buf.validate.FieldRules", Label::Optional),
                    ],
                ),
                message(
                    "Rule",
                    vec![
                        field("id", 1, Type::String, Label::Optional),
                        field("message", 2, Type::String, Label::Optional),
                        field("expression", 3, Type::String, Label::Optional),
                    ],
                ),
                message(
                    "MessageRules",
                    vec![
                        typed("cel", 3, Type::Message, ".buf.validate.Rule", Label::Repeated),
                        typed("oneof", 4, Type::Message, ".buf.validate.MessageOneofRule", Label::Repeated),
                    ],
                ),
                message(
                    "MessageOneofRule",
                    vec![
                        field("fields", 1, Type::String, Label::Repeated),
                        field("required", 2, Type::Bool, Label::Optional),
                    ],
                ),
            ],
            enum_type: vec![EnumDescriptorProto {
                name: Some("Ignore".to_string()),
                value: ["IGNORE_UNSPECIFIED", "IGNORE_IF_ZERO_VALUE", "IGNORE_ALWAYS"]
                    .iter()
                    .zip([0, 1, 3])
                    .map(|(name, number)| EnumValueDescriptorProto {
                        name: Some((*name).to_string()),
                        number: Some(number),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_proto(file).expect("validate.proto is well formed");
        pool
    }

    fn new_message(pool: &DescriptorPool, name: &str) -> DynamicMessage {
        DynamicMessage::new(pool.get_message_by_name(name).expect("declared"))
    }

    #[test]
    fn field_rules_lift_the_active_family_and_nested_items() {
        let pool = validate_pool();
        let mut items = new_message(&pool, "buf.validate.FieldRules");
        let mut string = new_message(&pool, "buf.validate.StringRules");
        string.set_field_by_name("min_len", Value::U64(1));
        string.set_field_by_name(
            "in",
            Value::List(vec![Value::String("a".to_string()), Value::String("b".to_string())]),
        );
        items.set_field_by_name("string", Value::Message(string));

        let mut repeated = new_message(&pool, "buf.validate.RepeatedRules");
        repeated.set_field_by_name("min_items", Value::U64(2));
        repeated.set_field_by_name("items", Value::Message(items));
        let mut rules = new_message(&pool, "buf.validate.FieldRules");
        rules.set_field_by_name("repeated", Value::Message(repeated));
        rules.set_field_by_name("required", Value::Bool(true));

        let raw = field_rules(&rules);
        assert_eq!(raw.family.as_deref(), Some("repeated"));
        assert!(raw.required);
        assert_eq!(raw.get("min_items"), Some(&RuleValue::UInt(2)));
        let Some(RuleValue::Nested(items)) = raw.get("items") else {
            panic!("expected nested item rules, got {:?}", raw.get("items"));
        };
        assert_eq!(
            **items,
            RawConstraints {
                family: Some("string".to_string()),
                rules: vec![
                    ("min_len".to_string(), RuleValue::UInt(1)),
                    (
                        "in".to_string(),
                        RuleValue::List(vec![
                            RuleValue::Str("a".to_string()),
                            RuleValue::Str("b".to_string()),
                        ]),
                    ),
                ],
                ..Default::default()
            }
        );
    }

    #[test]
    fn ignore_always_and_cel_rules_are_recorded() {
        let pool = validate_pool();
        let mut cel = new_message(&pool, "buf.validate.Rule");
        cel.set_field_by_name("id", Value::String("short".to_string()));
        cel.set_field_by_name("expression", Value::String("size(this) < 3".to_string()));
        let mut rules = new_message(&pool, "buf.validate.FieldRules");
        rules.set_field_by_name("cel", Value::List(vec![Value::Message(cel)]));
        rules.set_field_by_name("ignore", Value::EnumNumber(3));

        let raw = field_rules(&rules);
        assert!(raw.ignored);
        assert_eq!(
            raw.cel,
            vec![CelRule {
                id: "short".to_string(),
                expression: "size(this) < 3".to_string(),
            }]
        );

        rules.set_field_by_name("ignore", Value::EnumNumber(1));
        let raw = field_rules(&rules);
        assert!(!raw.ignored);
        assert!(raw.ignore_if_zero);
    }

    #[test]
    fn message_oneof_rules_are_lifted() {
        let pool = validate_pool();
        let mut oneof = new_message(&pool, "buf.validate.MessageOneofRule");
        oneof.set_field_by_name(
            "fields",
            Value::List(vec![Value::String("a".to_string()), Value::String("b".to_string())]),
        );
        oneof.set_field_by_name("required", Value::Bool(true));
        let mut rules = new_message(&pool, "buf.validate.MessageRules");
        rules.set_field_by_name("oneof", Value::List(vec![Value::Message(oneof)]));

        assert_eq!(
            message_rules(&rules).oneofs,
            vec![MessageOneofRule {
                fields: vec!["a".to_string(), "b".to_string()],
                required: true,
            }]
        );
    }

    #[test]
    fn pools_without_the_extensions_yield_no_rules() {
        let pool = validate_pool();
        assert!(extract(&pool).is_empty());
    }

    #[test]
    fn enum_value_options_are_read_from_the_pool() {
        let mut pool = DescriptorPool::global();
        pool.add_file_descriptor_proto(FileDescriptorProto {
            name: Some("labels.proto".to_string()),
            package: Some("labels".to_string()),
            dependency: vec!["google/protobuf/descriptor.proto".to_string()],
            extension: vec![
                FieldDescriptorProto {
                    extendee: Some(".google.protobuf.EnumValueOptions".to_string()),
                    ..field("label", 50001, Type::String, Label::Optional)
                },
                FieldDescriptorProto {
                    extendee: Some(".google.protobuf.EnumValueOptions".to_string()),
                    ..field("weight", 50002, Type::Int32, Label::Optional)
                },
            ],
            ..Default::default()
        })
        .expect("labels.proto is well formed");

        let status = FileDescriptorProto {
            name: Some("status.proto".to_string()),
            package: Some("pkg".to_string()),
            dependency: vec!["labels.proto".to_string()],
            enum_type: vec![EnumDescriptorProto {
                name: Some("Status".to_string()),
                value: ["STATUS_UNSPECIFIED", "STATUS_ACTIVE"]
                    .iter()
                    .zip([0, 1])
                    .map(|(name, number)| EnumValueDescriptorProto {
                        name: Some((*name).to_string()),
                        number: Some(number),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut options = new_message(&pool, "google.protobuf.EnumValueOptions");
        options.set_field_by_name("debug_redact", Value::Bool(true));
        let label = pool.get_extension_by_name("labels.label").expect("declared");
        options.set_extension(&label, Value::String("Active".to_string()));
        let mut file = DynamicMessage::decode(
            pool.get_message_by_name("google.protobuf.FileDescriptorProto")
                .expect("well-known"),
            status.encode_to_vec().as_slice(),
        )
        .expect("decodes");
        let Some(Value::List(enums)) = file.get_field_by_name_mut("enum_type") else {
            panic!("enum_type is a list");
        };
        let Some(Value::Message(status_enum)) = enums.first_mut() else {
            panic!("one enum");
        };
        let Some(Value::List(values)) = status_enum.get_field_by_name_mut("value") else {
            panic!("value is a list");
        };
        let Some(Value::Message(active)) = values.get_mut(1) else {
            panic!("two values");
        };
        active.set_field_by_name("options", Value::Message(options));
        pool.decode_file_descriptor_proto(file.encode_to_vec().as_slice())
            .expect("status.proto is well formed");

        let mut rules = RuleSet::default();
        collect_enum_value_options(&pool, &mut rules);
        assert_eq!(
            rules.enum_option_fields.get("label").map(String::as_str),
            Some("str")
        );
        assert_eq!(
            rules.enum_option_fields.get("weight").map(String::as_str),
            Some("int")
        );
        assert_eq!(
            rules.enum_values.get("pkg.Status.STATUS_ACTIVE"),
            Some(&EnumValueOptions {
                debug_redact: true,
                custom: vec![("label".to_string(), RuleValue::Str("Active".to_string()))],
            })
        );
        assert!(!rules.enum_values.contains_key("pkg.Status.STATUS_UNSPECIFIED"));
    }

    #[test]
    fn map_valued_rules_lift_to_nothing() {
        let value = Value::Map(std::collections::HashMap::new());
        assert_eq!(super::rule_value(&value), RuleValue::List(Vec::new()));
    }
}
