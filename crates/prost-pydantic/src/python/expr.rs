use super::imports::ImportSet;

/// A Python type expression, kept structured until rendering so nullability
/// and `Annotated` metadata compose without string surgery.
#[derive(Debug, Clone, PartialEq)]
pub enum PyType {
    /// A builtin (`int`, `str`, `None`, ...).
    Builtin(&'static str),
    /// A type exported by the runtime module (`ProtoInt64`, ...).
    Runtime(&'static str),
    /// `typing.Any`.
    Any,
    /// A generated message or enum class.
    Class {
        /// Fully-qualified proto name.
        full_name: String,
        /// Python class name.
        name: String,
    },
    /// `list[T]`.
    List(Box<PyType>),
    /// `dict[K, V]`.
    Dict(Box<PyType>, Box<PyType>),
    /// `Literal[...]` over rendered Python literals.
    Literal(Vec<String>),
    /// `Annotated[T, metadata...]` over rendered metadata expressions.
    Annotated(Box<PyType>, Vec<String>),
    /// `T | None` or `Optional[T]`.
    Optional(Box<PyType>),
}

impl PyType {
    /// Wrap in `Optional`, unless the type already admits `None`.
    #[must_use]
    pub fn nullable(self) -> Self {
        match self {
            Self::Builtin("None") | Self::Optional(_) => self,
            other => Self::Optional(Box::new(other)),
        }
    }

    /// Strip one level of `Optional`.
    #[must_use]
    pub fn non_null(self) -> Self {
        match self {
            Self::Optional(inner) => *inner,
            other => other,
        }
    }

    /// Returns true for `Optional[...]`.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Optional(_) | Self::Builtin("None"))
    }

    /// Attach `Annotated` metadata, inside any `Optional`.
    #[must_use]
    pub fn annotated(self, metadata: Vec<String>) -> Self {
        if metadata.is_empty() {
            return self;
        }
        match self {
            Self::Optional(inner) => Self::Optional(Box::new(inner.annotated(metadata))),
            Self::Annotated(inner, mut existing) => {
                existing.extend(metadata);
                Self::Annotated(inner, existing)
            }
            other => Self::Annotated(Box::new(other), metadata),
        }
    }

    /// Replace the innermost value type, keeping `Optional` and `Annotated`.
    #[must_use]
    pub fn with_value(self, value: Self) -> Self {
        match self {
            Self::Optional(inner) => Self::Optional(Box::new(inner.with_value(value))),
            Self::Annotated(inner, metadata) => {
                Self::Annotated(Box::new(inner.with_value(value)), metadata)
            }
            _ => value,
        }
    }

    /// Render as Python source.
    #[must_use]
    pub fn render(&self, none_union: bool) -> String {
        match self {
            Self::Builtin(name) | Self::Runtime(name) => (*name).to_string(),
            Self::Any => "_Any".to_string(),
            Self::Class { name, .. } => name.clone(),
            Self::List(inner) => format!("list[{}]", inner.render(none_union)),
            Self::Dict(key, value) => format!(
                "dict[{}, {}]",
                key.render(none_union),
                value.render(none_union)
            ),
            Self::Literal(values) => format!("_Literal[{}]", values.join(", ")),
            Self::Annotated(inner, metadata) => format!(
                "_Annotated[{}, {}]",
                inner.render(none_union),
                metadata.join(", ")
            ),
            Self::Optional(inner) if none_union => format!("{} | None", inner.render(none_union)),
            Self::Optional(inner) => format!("_Optional[{}]", inner.render(none_union)),
        }
    }

    /// Record the imports rendering this type requires.
    pub(crate) fn collect_imports(&self, none_union: bool, imports: &mut ImportSet) {
        match self {
            Self::Builtin(_) => {}
            Self::Runtime(name) => imports.runtime(name),
            Self::Any => imports.typing("Any"),
            Self::Class { full_name, .. } => imports.class(full_name.clone()),
            Self::List(inner) => inner.collect_imports(none_union, imports),
            Self::Dict(key, value) => {
                key.collect_imports(none_union, imports);
                value.collect_imports(none_union, imports);
            }
            Self::Literal(_) => imports.typing("Literal"),
            Self::Annotated(inner, _) => {
                imports.typing("Annotated");
                inner.collect_imports(none_union, imports);
            }
            Self::Optional(inner) => {
                if !none_union {
                    imports.typing("Optional");
                }
                inner.collect_imports(none_union, imports);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::PyType;
    use crate::python::imports::ImportSet;

    fn user() -> PyType {
        PyType::Class {
            full_name: "pkg.User".to_string(),
            name: "User".to_string(),
        }
    }

    #[test]
    fn optional_renders_both_syntaxes() {
        let ty = PyType::List(Box::new(user())).nullable();
        assert_eq!(ty.render(true), "list[User] | None");
        assert_eq!(ty.render(false), "_Optional[list[User]]");
        assert_eq!(ty.clone().nullable(), ty);
        assert_eq!(PyType::Builtin("None").nullable(), PyType::Builtin("None"));
    }

    #[test]
    fn metadata_goes_inside_optional() {
        let ty = PyType::Builtin("str")
            .nullable()
            .annotated(vec!["_AfterValidator(_validate_email)".to_string()])
            .annotated(vec!["_AfterValidator(_require_nonzero)".to_string()]);
        assert_eq!(
            ty.render(true),
            "_Annotated[str, _AfterValidator(_validate_email), _AfterValidator(_require_nonzero)] | None"
        );
        let narrowed = ty.with_value(PyType::Literal(vec!["'a'".to_string()]));
        assert_eq!(
            narrowed.render(false),
            "_Optional[_Annotated[_Literal['a'], _AfterValidator(_validate_email), _AfterValidator(_require_nonzero)]]"
        );
    }

    #[test]
    fn imports_follow_the_rendered_names() {
        let ty = PyType::Dict(
            Box::new(PyType::Builtin("str")),
            Box::new(PyType::Runtime("ProtoInt64").annotated(vec!["_Field(ge=1)".to_string()])),
        )
        .nullable();
        let mut with_optional = ImportSet::default();
        ty.collect_imports(false, &mut with_optional);
        let mut expected = ImportSet::default();
        expected.typing("Optional");
        expected.typing("Annotated");
        expected.runtime("ProtoInt64");
        assert_eq!(with_optional, expected);

        let mut classes = ImportSet::default();
        PyType::List(Box::new(user())).collect_imports(true, &mut classes);
        assert!(classes.classes().contains("pkg.User"));
    }
}
