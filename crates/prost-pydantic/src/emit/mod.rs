//! Python source for the enums and models of one `.proto` file.
//!
//! The emitter produces class definitions and records what they reference in
//! an [`ImportSet`]. Where referenced classes live, and which imports must be
//! deferred to break cycles, is the planner's business.

mod enums;
mod messages;
pub(crate) mod runtime;
mod writer;

use std::collections::BTreeSet;

pub(crate) use writer::{Writer, post_process};

use crate::config::GeneratorConfig;
use crate::error::{Diagnostic, Error, Location, UnresolvedReferenceError};
use crate::names::{NameResolver, TypeNames, declarations};
use crate::python::ImportSet;
use crate::python::literal::docstring_text;
use crate::schema::{FileNode, SchemaIndex};

/// Class definitions of one file, before imports are laid out.
#[derive(Debug, Clone, Default)]
pub struct ModuleBody {
    /// Enum and model classes in emission order, separated by two blank lines.
    pub definitions: String,
    /// Everything the definitions reference.
    pub imports: ImportSet,
    /// Model class names, in emission order.
    pub models: Vec<String>,
}

/// Renders schema declarations as Python classes.
#[derive(Debug, Clone, Copy)]
pub struct Emitter<'a> {
    index: &'a SchemaIndex,
    names: &'a TypeNames,
    resolver: &'a NameResolver,
    config: &'a GeneratorConfig,
}

impl<'a> Emitter<'a> {
    /// Build an emitter over a resolved index.
    #[must_use]
    pub fn new(
        index: &'a SchemaIndex,
        names: &'a TypeNames,
        resolver: &'a NameResolver,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self {
            index,
            names,
            resolver,
            config,
        }
    }

    /// Emit every enum and message declared in `file`: enums first, then
    /// messages with nested types ahead of their parent.
    ///
    /// `deferred` names the files whose imports will only be available at
    /// the bottom of the module.
    ///
    /// # Errors
    ///
    /// Fails with the first mapping, naming or constraint error of any
    /// declaration in the file.
    pub fn emit_file(
        &self,
        file: &FileNode,
        deferred: &BTreeSet<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<ModuleBody, Error> {
        let names = self.names.scoped(self.index, file);
        let scoped = Emitter::new(self.index, &names, self.resolver, self.config);
        let mut body = ModuleBody::default();
        let mut blocks = Vec::new();
        for full_name in declarations(self.index, file) {
            let mut w = Writer::default();
            if let Some(enumeration) = self.index.enumeration(&full_name) {
                scoped.emit_enum(enumeration, &mut w, &mut body.imports, diagnostics)?;
            } else if let Some(message) = self.index.message(&full_name) {
                let class =
                    scoped.emit_message(message, deferred, &mut w, &mut body.imports, diagnostics)?;
                body.models.push(class);
            }
            blocks.push(w.finish());
        }
        body.definitions = blocks.join("\n\n");
        tracing::debug!(
            file = %file.name,
            declarations = blocks.len(),
            models = body.models.len(),
            "emitted module body"
        );
        Ok(body)
    }

    fn class_name(&self, full_name: &str, location: &Location) -> Result<String, Error> {
        self.names
            .get(full_name)
            .map(ToString::to_string)
            .ok_or_else(|| {
                UnresolvedReferenceError {
                    location: location.clone(),
                    type_name: full_name.to_string(),
                }
                .into()
            })
    }

    /// A class docstring from leading comments, plus an `Attributes:`
    /// section of `(heading, comment lines)` pairs. Followed by a blank line.
    fn docstring(&self, leading: &[String], attributes: &[(String, &[String])], w: &mut Writer) {
        if leading.is_empty() && attributes.is_empty() {
            w.line("\"\"\" \"\"\"");
            w.blank();
            return;
        }
        w.line("\"\"\"");
        for line in leading {
            w.line(docstring_text(line));
        }
        if !attributes.is_empty() {
            if !leading.is_empty() {
                w.blank();
            }
            w.line("Attributes:");
            for (heading, comments) in attributes {
                w.line(format!("  {}", docstring_text(heading)));
                for line in *comments {
                    w.line(format!("    {}", docstring_text(line)));
                }
            }
        }
        w.line("\"\"\"");
        w.blank();
    }
}
