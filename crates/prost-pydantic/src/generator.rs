use crate::annotations;
use crate::config::GeneratorConfig;
use crate::constraints::RuleSet;
use crate::error::{Diagnostic, Error, Location};
use crate::names::NameResolver;
use crate::plan::Planner;
use crate::request::{GenerationOutput, GenerationRequest};
use crate::schema::SchemaIndex;

/// Run the whole pipeline over one request.
///
/// Output depends only on the request: the same request always yields the
/// same files in the same order.
///
/// # Errors
///
/// Returns the first fatal error of any stage. No files are produced then.
pub fn generate(request: &GenerationRequest) -> Result<GenerationOutput, Error> {
    let config = GeneratorConfig::from_parameter(&request.parameter)?;
    let mut diagnostics = Vec::new();

    let mut rules = RuleSet::default();
    match request.descriptor_pool() {
        Ok(pool) => {
            if config.validate_constraints {
                rules = annotations::extract(&pool);
            }
            annotations::collect_enum_value_options(&pool, &mut rules);
        }
        Err(cause) if config.validate_constraints => {
            diagnostics.push(Diagnostic::warning(
                Location::new("request"),
                format!("buf.validate rules are not read: {cause}"),
            ));
        }
        Err(cause) => tracing::debug!(%cause, "enum value options are not read"),
    }

    let index = SchemaIndex::build(&request.proto_files, &rules)?;
    let resolver = NameResolver::new(&config);
    let names = resolver.type_names(&index)?;
    let files = Planner::new(&index, &names, &resolver, &config)
        .plan(&request.files_to_generate, &mut diagnostics)?;

    tracing::debug!(
        files = files.len(),
        diagnostics = diagnostics.len(),
        "generation finished"
    );
    Ok(GenerationOutput { files, diagnostics })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use prost_types::field_descriptor_proto::Type;

    use super::generate;
    use crate::error::{Error, Severity};
    use crate::request::GenerationRequest;
    use crate::test_support::{file, message, scalar};

    #[test]
    fn bad_parameters_fail_the_run() {
        let request = GenerationRequest::new(
            vec!["a.proto".to_string()],
            "frobnicate=1",
            vec![file("a.proto", "pkg")],
        );
        let err = generate(&request).expect_err("unknown option");
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn unreadable_pools_only_warn() {
        let mut orphan = file("orphan.proto", "pkg");
        orphan.dependency.push("missing.proto".to_string());
        orphan
            .message_type
            .push(message("Orphan", vec![scalar("count", 1, Type::Int64)]));
        let request = GenerationRequest::new(vec!["orphan.proto".to_string()], "", vec![orphan]);

        let output = generate(&request).expect("generates");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].severity, Severity::Warning);
        assert_eq!(output.files[0].name, "orphan_pydantic.py");
        assert!(output.files[0].content.contains("    count: \"ProtoInt64\" = _Field(0)\n"));
    }

    #[test]
    fn disabled_constraints_skip_the_pool() {
        let mut orphan = file("orphan.proto", "pkg");
        orphan.dependency.push("missing.proto".to_string());
        let request = GenerationRequest::new(
            vec!["orphan.proto".to_string()],
            "validate_constraints=false",
            vec![orphan],
        );
        let output = generate(&request).expect("generates");
        assert!(output.diagnostics.is_empty());
    }
}
