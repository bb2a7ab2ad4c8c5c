//! Output layout: one module per requested file, the imports between those
//! modules, and the package scaffolding around them.
//!
//! Files that import each other form a strongly connected component of the
//! import graph. Imports along edges inside a component move below the class
//! definitions, after which every model of the module is rebuilt so its
//! string annotations resolve.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::GeneratorConfig;
use crate::emit::runtime::{HEADER, runtime_module};
use crate::emit::{Emitter, ModuleBody, post_process};
use crate::error::{DecodeError, Diagnostic, Error};
use crate::names::{NameResolver, TypeNames, referenced_types};
use crate::python::imports::import_line;
use crate::python::literal::docstring_text;
use crate::request::GeneratedFile;
use crate::schema::{FileNode, SchemaIndex};

const INIT_CONTENT: &str = "# Generated by protoc-gen-pydantic.\n";

/// `acme/user.proto` → `acme/user_pydantic.py`.
#[must_use]
pub fn output_path(proto: &str) -> String {
    let stem = proto.strip_suffix(".proto").unwrap_or(proto);
    format!("{stem}_pydantic.py")
}

/// Directory part of a `/`-separated path; empty at the root.
fn directory(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn in_directory(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// The module `from` uses to import the generated module of `target`:
/// relative inside one directory, absolute otherwise.
fn import_module(from: &str, target: &str) -> String {
    let target_path = output_path(target);
    let target_dir = directory(&target_path);
    let module = target_path
        .rsplit('/')
        .next()
        .unwrap_or(&target_path)
        .trim_end_matches(".py");
    if target_dir == directory(&output_path(from)) {
        format!(".{module}")
    } else if target_dir.is_empty() {
        module.to_string()
    } else {
        format!("{}.{module}", target_dir.replace('/', "."))
    }
}

/// Component id of every node, by Tarjan's algorithm.
fn components(graph: &BTreeMap<String, BTreeSet<String>>) -> BTreeMap<&str, usize> {
    struct State<'g> {
        graph: &'g BTreeMap<String, BTreeSet<String>>,
        next_index: usize,
        index: BTreeMap<&'g str, usize>,
        lowlink: BTreeMap<&'g str, usize>,
        stack: Vec<&'g str>,
        on_stack: BTreeSet<&'g str>,
        component: BTreeMap<&'g str, usize>,
        next_component: usize,
    }

    fn visit<'g>(state: &mut State<'g>, node: &'g str) {
        state.index.insert(node, state.next_index);
        state.lowlink.insert(node, state.next_index);
        state.next_index += 1;
        state.stack.push(node);
        state.on_stack.insert(node);

        let graph = state.graph;
        for next in graph.get(node).into_iter().flatten() {
            let next = next.as_str();
            if !state.index.contains_key(next) {
                visit(state, next);
                let low = state.lowlink[node].min(state.lowlink[next]);
                state.lowlink.insert(node, low);
            } else if state.on_stack.contains(next) {
                let low = state.lowlink[node].min(state.index[next]);
                state.lowlink.insert(node, low);
            }
        }

        if state.lowlink[node] == state.index[node] {
            while let Some(member) = state.stack.pop() {
                state.on_stack.remove(member);
                state.component.insert(member, state.next_component);
                if member == node {
                    break;
                }
            }
            state.next_component += 1;
        }
    }

    let mut state = State {
        graph,
        next_index: 0,
        index: BTreeMap::new(),
        lowlink: BTreeMap::new(),
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        component: BTreeMap::new(),
        next_component: 0,
    };
    let nodes = graph
        .iter()
        .flat_map(|(node, edges)| std::iter::once(node).chain(edges));
    for node in nodes {
        if !state.index.contains_key(node.as_str()) {
            visit(&mut state, node);
        }
    }
    state.component
}

/// Lays out generated modules and scaffolding.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    index: &'a SchemaIndex,
    names: &'a TypeNames,
    resolver: &'a NameResolver,
    config: &'a GeneratorConfig,
}

impl<'a> Planner<'a> {
    /// Build a planner over a resolved index.
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

    /// For every indexed file, the other files declaring types its messages
    /// reference.
    #[must_use]
    pub fn import_graph(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut graph = BTreeMap::new();
        for file in self.index.files() {
            let targets: BTreeSet<String> = referenced_types(self.index, file)
                .iter()
                .filter_map(|name| self.index.declaring_file(name))
                .filter(|declaring| *declaring != file.name)
                .map(ToString::to_string)
                .collect();
            graph.insert(file.name.clone(), targets);
        }
        graph
    }

    /// Generate every file in `targets`, in order, followed by the
    /// `__init__.py` and `_proto_types.py` files of their directories sorted
    /// by path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for a target missing from the request and
    /// propagates the first emission error.
    pub fn plan(
        &self,
        targets: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<GeneratedFile>, Error> {
        let graph = self.import_graph();
        let component = components(&graph);
        let emitter = Emitter::new(self.index, self.names, self.resolver, self.config);

        let mut files = Vec::with_capacity(targets.len());
        let mut runtime: BTreeMap<String, BTreeSet<&'static str>> = BTreeMap::new();
        for target in targets {
            let Some(file) = self.index.file(target) else {
                return Err(DecodeError {
                    cause: format!("file to generate `{target}` is not in the request"),
                }
                .into());
            };
            let deferred: BTreeSet<String> = graph
                .get(target)
                .into_iter()
                .flatten()
                .filter(|dep| component.get(dep.as_str()) == component.get(target.as_str()))
                .cloned()
                .collect();
            if !deferred.is_empty() {
                tracing::debug!(file = %target, ?deferred, "deferring cyclic imports");
            }
            let body = emitter.emit_file(file, &deferred, diagnostics)?;
            let path = output_path(target);
            runtime
                .entry(directory(&path).to_string())
                .or_default()
                .extend(body.imports.runtime_names().iter().copied());
            files.push(GeneratedFile {
                name: path,
                content: self.module_text(file, &body, &deferred),
            });
        }

        let mut scaffolding = BTreeMap::new();
        for (dir, used) in &runtime {
            scaffolding.insert(in_directory(dir, "__init__.py"), INIT_CONTENT.to_string());
            scaffolding.insert(
                in_directory(dir, "_proto_types.py"),
                post_process(&runtime_module(
                    used,
                    self.config,
                    self.index.enum_option_fields(),
                )),
            );
        }
        files.extend(
            scaffolding
                .into_iter()
                .map(|(name, content)| GeneratedFile { name, content }),
        );
        tracing::debug!(files = files.len(), "planned output");
        Ok(files)
    }

    /// `from <module> import <classes>` lines for classes declared in other
    /// files, split into top-of-module and deferred imports. Classes bound
    /// under an alias in this module import `as` that alias.
    fn model_imports(
        &self,
        file: &FileNode,
        body: &ModuleBody,
        deferred: &BTreeSet<String>,
    ) -> (Vec<String>, Vec<String>) {
        let scoped = self.names.scoped(self.index, file);
        let mut by_file: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for full_name in body.imports.classes() {
            let (Some(declaring), Some(class), Some(local)) = (
                self.index.declaring_file(full_name),
                self.names.get(full_name),
                scoped.get(full_name),
            ) else {
                continue;
            };
            if declaring == file.name {
                continue;
            }
            let imported = if class == local {
                class.to_string()
            } else {
                format!("{class} as {local}")
            };
            by_file.entry(declaring).or_default().insert(imported);
        }
        let (mut eager, mut late) = (Vec::new(), Vec::new());
        for (declaring, classes) in by_file {
            let classes: Vec<String> = classes.into_iter().collect();
            let mut lines = import_line(&import_module(&file.name, declaring), &classes);
            if deferred.contains(declaring) {
                if let Some(first) = lines.first_mut() {
                    first.push_str("  # noqa: E402");
                }
                late.extend(lines);
            } else {
                eager.extend(lines);
            }
        }
        (eager, late)
    }

    fn module_text(&self, file: &FileNode, body: &ModuleBody, deferred: &BTreeSet<String>) -> String {
        let mut out = String::new();
        let mut push = |line: &str| {
            out.push_str(line);
            out.push('\n');
        };
        push(HEADER);
        if !file.comments.leading.is_empty() {
            push("\"\"\"");
            for line in &file.comments.leading {
                push(&docstring_text(line));
            }
            push("\"\"\"");
        }
        for block in body.imports.blocks() {
            push("");
            for line in &block {
                push(line);
            }
        }
        let (eager, late) = self.model_imports(file, body, deferred);
        if !eager.is_empty() {
            push("");
            for line in &eager {
                push(line);
            }
        }
        push("");
        push("");
        push(&body.definitions);
        if !file.comments.trailing.is_empty() {
            push("");
            for line in &file.comments.trailing {
                push(&format!("# {line}"));
            }
        }
        if !late.is_empty() {
            push("");
            push("");
            for line in &late {
                push(line);
            }
            push("");
            for model in &body.models {
                push(&format!("{model}.model_rebuild()"));
            }
        }
        post_process(&out)
    }
}
