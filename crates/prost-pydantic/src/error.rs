use std::fmt;

/// Top-level error type returned by generation.
///
/// Every variant is terminal for the run: generation is a pure function of
/// its input, so the same request always fails the same way.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A field or method references a type that no input file declares.
    #[error(transparent)]
    UnresolvedReference(#[from] UnresolvedReferenceError),

    /// Two declarations claim the same fully-qualified name.
    #[error(transparent)]
    DuplicateName(#[from] DuplicateNameError),

    /// A declared name cannot be turned into a unique Python identifier.
    #[error(transparent)]
    NameCollision(#[from] NameCollisionError),

    /// A protobuf construct has no Pydantic mapping.
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),

    /// The `buf.validate` rules on a field contradict each other or the field type.
    #[error(transparent)]
    ConstraintConflict(#[from] ConstraintConflictError),

    /// The plugin parameter string is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The request envelope could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// 1-based line and column of a declaration in its `.proto` source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceSpan {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number, starting at 1.
    pub column: u32,
}

impl SourceSpan {
    /// Build a span from a `SourceCodeInfo.Location.span` array (0-based).
    pub(crate) fn from_proto(span: &[i32]) -> Option<Self> {
        let (&line, &column) = (span.first()?, span.get(1)?);
        Some(Self {
            line: u32::try_from(line).ok()? + 1,
            column: u32::try_from(column).ok()? + 1,
        })
    }
}

/// The declaration an error or diagnostic refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Fully-qualified protobuf name of the entity (e.g. `pkg.Message.field`).
    pub entity: String,
    /// The `.proto` file declaring the entity, when known.
    pub file: Option<String>,
    /// Position inside `file`, when source info was supplied.
    pub span: Option<SourceSpan>,
}

impl Location {
    pub(crate) fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            file: None,
            span: None,
        }
    }

    pub(crate) fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub(crate) fn at(mut self, span: Option<SourceSpan>) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.entity)?;
        match (&self.file, self.span) {
            (Some(file), Some(span)) => write!(f, " ({file}:{}:{})", span.line, span.column),
            (Some(file), None) => write!(f, " ({file})"),
            (None, _) => Ok(()),
        }
    }
}

/// Returned when a type reference cannot be resolved after indexing all files.
#[derive(Debug, thiserror::Error)]
#[error("unresolved reference: {location} refers to unknown type `{type_name}`")]
pub struct UnresolvedReferenceError {
    /// The referencing field or method.
    pub location: Location,
    /// The type name as written in the descriptor.
    pub type_name: String,
}

/// Returned when a fully-qualified name is declared twice.
#[derive(Debug, thiserror::Error)]
#[error("duplicate name: {location} is already declared in `{previous_file}`")]
pub struct DuplicateNameError {
    /// The second declaration.
    pub location: Location,
    /// The file holding the first declaration.
    pub previous_file: String,
}

/// Returned when reserved-word suffixing cannot produce a unique identifier.
#[derive(Debug, thiserror::Error)]
#[error("name collision: {location}: {cause}")]
pub struct NameCollisionError {
    /// The entity whose name collides.
    pub location: Location,
    /// What it collides with.
    pub cause: String,
}

/// Returned when a protobuf construct cannot be mapped to a Python type.
#[derive(Debug, thiserror::Error)]
#[error("unsupported type: {location}: {cause}")]
pub struct UnsupportedTypeError {
    /// The offending field.
    pub location: Location,
    /// Description of the unsupported construct.
    pub cause: String,
}

/// Returned when validation rules on one field cannot all hold at once.
#[derive(Debug, thiserror::Error)]
#[error("constraint conflict: {location}: {cause}")]
pub struct ConstraintConflictError {
    /// The constrained field.
    pub location: Location,
    /// Which rules contradict each other.
    pub cause: String,
}

/// Returned when the plugin parameter string cannot be applied.
#[derive(Debug, thiserror::Error)]
#[error("configuration error: {cause}")]
pub struct ConfigurationError {
    /// Description of the invalid option.
    pub cause: String,
}

/// Returned when request bytes are not a valid `CodeGeneratorRequest`.
#[derive(Debug, thiserror::Error)]
#[error("decode error: {cause}")]
pub struct DecodeError {
    /// Description of the decoding failure.
    pub cause: String,
}

/// Severity of a non-fatal [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational; output is complete.
    Note,
    /// Something in the input was not carried into the output.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => f.write_str("note"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// A non-fatal finding reported next to successful output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious the finding is.
    pub severity: Severity,
    /// The declaration it concerns.
    pub location: Location,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn warning(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location,
            message: message.into(),
        }
    }

    pub(crate) fn note(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Note,
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.location, self.message)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{
        ConstraintConflictError, Diagnostic, Error, Location, SourceSpan, UnresolvedReferenceError,
    };

    #[test]
    fn location_display_includes_file_and_span_when_known() {
        let bare = Location::new("pkg.Msg.field");
        assert_eq!(bare.to_string(), "`pkg.Msg.field`");

        let with_file = Location::new("pkg.Msg").in_file("a/b.proto");
        assert_eq!(with_file.to_string(), "`pkg.Msg` (a/b.proto)");

        let with_span = Location::new("pkg.Msg.id")
            .in_file("a/b.proto")
            .at(Some(SourceSpan { line: 7, column: 3 }));
        assert_eq!(with_span.to_string(), "`pkg.Msg.id` (a/b.proto:7:3)");
    }

    #[test]
    fn source_span_converts_zero_based_proto_spans() {
        assert_eq!(
            SourceSpan::from_proto(&[4, 2, 30]),
            Some(SourceSpan { line: 5, column: 3 })
        );
        assert_eq!(SourceSpan::from_proto(&[4]), None);
        assert_eq!(SourceSpan::from_proto(&[-1, 0]), None);
    }

    #[test]
    fn error_variants_render_their_inner_message() {
        let err: Error = UnresolvedReferenceError {
            location: Location::new("pkg.Bar.foo").in_file("b.proto"),
            type_name: ".pkg.Foo".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "unresolved reference: `pkg.Bar.foo` (b.proto) refers to unknown type `.pkg.Foo`"
        );

        let err: Error = ConstraintConflictError {
            location: Location::new("pkg.User.name"),
            cause: "min_len 5 exceeds max_len 1".to_string(),
        }
        .into();
        assert!(matches!(err, Error::ConstraintConflict(_)));
        assert_eq!(
            err.to_string(),
            "constraint conflict: `pkg.User.name`: min_len 5 exceeds max_len 1"
        );
    }

    #[test]
    fn diagnostic_display_leads_with_severity() {
        let diag = Diagnostic::warning(
            Location::new("pkg.User.email").in_file("user.proto"),
            "rule `string.hostname` is not translated",
        );
        assert_eq!(
            diag.to_string(),
            "warning: `pkg.User.email` (user.proto): rule `string.hostname` is not translated"
        );
        assert_eq!(
            Diagnostic::note(Location::new("x"), "n").to_string(),
            "note: `x`: n"
        );
    }
}
