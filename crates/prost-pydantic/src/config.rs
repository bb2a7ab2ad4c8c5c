use std::collections::BTreeSet;

use crate::error::ConfigurationError;
use crate::names::is_identifier;

/// A single plugin option, as carried in the `CodeGeneratorRequest` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GeneratorOption {
    /// Translate `buf.validate` rules into Pydantic validators.
    ValidateConstraints(bool),

    /// Suffix appended to names that collide with reserved words.
    KeywordSuffix(String),

    /// Base class for generated models.
    BaseModel(BaseModel),

    /// Extra names that are always renamed, on top of Python keywords and builtins.
    ReservedNames(Vec<String>),

    /// How enum values sharing a number with an earlier value are emitted.
    EnumAliasPolicy(EnumAliasPolicy),

    /// Use declared proto field names instead of their JSON (camelCase) names.
    PreservingProtoFieldName(bool),

    /// Strip the `ENUM_NAME_` prefix from enum values.
    AutoTrimEnumPrefix(bool),

    /// Emit `int` enums whose values are the proto numbers.
    UseIntegersForEnums(bool),

    /// Omit `description=` from field definitions.
    DisableFieldDescription(bool),

    /// Spell nullable types as `T | None` instead of `_Optional[T]`.
    UseNoneUnionSyntax(bool),
}

/// Base-class strategy for generated models.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BaseModel {
    /// `ProtoModel` from the generated runtime module, which adds ProtoJSON helpers.
    #[default]
    Proto,
    /// Plain `pydantic.BaseModel`.
    Pydantic,
    /// A user-supplied class, imported as `from {module} import {class}`.
    Custom {
        /// Dotted module path.
        module: String,
        /// Class name inside `module`.
        class: String,
    },
}

/// Naming policy for enum values that alias an earlier value's number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAliasPolicy {
    /// Emit the alias as `ALIAS = PRIMARY`; the first declared value stays canonical.
    #[default]
    FirstDeclared,
    /// Emit every alias as its own member with its own value.
    Distinct,
    /// Leave aliases out of the generated enum.
    Omit,
}

/// Immutable configuration threaded through every generation stage.
///
/// See [`GeneratorOption`] for what each field controls.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs, clippy::struct_excessive_bools)]
pub struct GeneratorConfig {
    pub validate_constraints: bool,
    pub keyword_suffix: String,
    pub base_model: BaseModel,
    pub reserved_names: BTreeSet<String>,
    pub enum_alias_policy: EnumAliasPolicy,
    pub preserving_proto_field_name: bool,
    pub auto_trim_enum_prefix: bool,
    pub use_integers_for_enums: bool,
    pub disable_field_description: bool,
    pub use_none_union_syntax: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            validate_constraints: true,
            keyword_suffix: "_".to_string(),
            base_model: BaseModel::Proto,
            reserved_names: BTreeSet::new(),
            enum_alias_policy: EnumAliasPolicy::FirstDeclared,
            preserving_proto_field_name: true,
            auto_trim_enum_prefix: true,
            use_integers_for_enums: false,
            disable_field_description: false,
            use_none_union_syntax: true,
        }
    }
}

impl GeneratorConfig {
    /// Build a configuration from the raw plugin parameter string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for unknown keys or invalid values.
    pub fn from_parameter(parameter: &str) -> Result<Self, ConfigurationError> {
        Self::with_options(&GeneratorOption::parse_parameter(parameter)?)
    }

    /// Fold options over the defaults; later options override earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the resulting keyword suffix is not
    /// usable inside an identifier.
    pub fn with_options(options: &[GeneratorOption]) -> Result<Self, ConfigurationError> {
        let mut config = Self::default();
        for option in options {
            match option {
                GeneratorOption::ValidateConstraints(v) => config.validate_constraints = *v,
                GeneratorOption::KeywordSuffix(s) => config.keyword_suffix.clone_from(s),
                GeneratorOption::BaseModel(b) => config.base_model = b.clone(),
                GeneratorOption::ReservedNames(names) => {
                    config.reserved_names.extend(names.iter().cloned());
                }
                GeneratorOption::EnumAliasPolicy(p) => config.enum_alias_policy = *p,
                GeneratorOption::PreservingProtoFieldName(v) => {
                    config.preserving_proto_field_name = *v;
                }
                GeneratorOption::AutoTrimEnumPrefix(v) => config.auto_trim_enum_prefix = *v,
                GeneratorOption::UseIntegersForEnums(v) => config.use_integers_for_enums = *v,
                GeneratorOption::DisableFieldDescription(v) => {
                    config.disable_field_description = *v;
                }
                GeneratorOption::UseNoneUnionSyntax(v) => config.use_none_union_syntax = *v,
            }
        }

        if config.keyword_suffix.is_empty()
            || !config
                .keyword_suffix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigurationError {
                cause: format!(
                    "keyword_suffix `{}` must be a non-empty run of letters, digits or `_`",
                    config.keyword_suffix
                ),
            });
        }
        Ok(config)
    }
}

impl GeneratorOption {
    /// Parse a protoc parameter string of comma-separated `key=value` pairs.
    ///
    /// A key without `=` is shorthand for `key=true`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] on an unrecognized key or a malformed value.
    pub fn parse_parameter(parameter: &str) -> Result<Vec<Self>, ConfigurationError> {
        parameter
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => Self::parse(key.trim(), Some(value.trim())),
                None => Self::parse(pair, None),
            })
            .collect()
    }

    fn parse(key: &str, value: Option<&str>) -> Result<Self, ConfigurationError> {
        let flag = || parse_bool(key, value);
        let text = || {
            value.ok_or_else(|| ConfigurationError {
                cause: format!("option `{key}` requires a value"),
            })
        };

        Ok(match key {
            "validate_constraints" => Self::ValidateConstraints(flag()?),
            "keyword_suffix" => Self::KeywordSuffix(text()?.to_string()),
            "base_model" => Self::BaseModel(parse_base_model(text()?)?),
            "reserved_names" => Self::ReservedNames(
                text()?
                    .split(':')
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "enum_alias_policy" => Self::EnumAliasPolicy(match text()? {
                "first_declared" => EnumAliasPolicy::FirstDeclared,
                "distinct" => EnumAliasPolicy::Distinct,
                "omit" => EnumAliasPolicy::Omit,
                other => {
                    return Err(ConfigurationError {
                        cause: format!(
                            "enum_alias_policy must be `first_declared`, `distinct` or `omit`, got `{other}`"
                        ),
                    });
                }
            }),
            "preserving_proto_field_name" => Self::PreservingProtoFieldName(flag()?),
            "auto_trim_enum_prefix" => Self::AutoTrimEnumPrefix(flag()?),
            "use_integers_for_enums" => Self::UseIntegersForEnums(flag()?),
            "disable_field_description" => Self::DisableFieldDescription(flag()?),
            "use_none_union_syntax_instead_of_optional" => Self::UseNoneUnionSyntax(flag()?),
            _ => {
                return Err(ConfigurationError {
                    cause: format!("unknown option `{key}`"),
                });
            }
        })
    }
}

fn parse_bool(key: &str, value: Option<&str>) -> Result<bool, ConfigurationError> {
    match value {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(ConfigurationError {
            cause: format!("option `{key}` expects `true` or `false`, got `{other}`"),
        }),
    }
}

fn parse_base_model(value: &str) -> Result<BaseModel, ConfigurationError> {
    match value {
        "proto" => return Ok(BaseModel::Proto),
        "pydantic" => return Ok(BaseModel::Pydantic),
        _ => {}
    }

    let invalid = || ConfigurationError {
        cause: format!(
            "base_model must be `proto`, `pydantic` or a dotted `module.Class` path, got `{value}`"
        ),
    };
    let (module, class) = value.rsplit_once('.').ok_or_else(invalid)?;
    if !is_identifier(class) || !module.split('.').all(is_identifier) {
        return Err(invalid());
    }
    Ok(BaseModel::Custom {
        module: module.to_string(),
        class: class.to_string(),
    })
}
