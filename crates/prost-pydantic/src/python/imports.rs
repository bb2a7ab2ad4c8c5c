use std::collections::BTreeSet;

/// Longest import line before it is wrapped in parentheses.
const MAX_IMPORT_LINE: usize = 88;

/// Module name of the per-directory runtime helpers.
pub(crate) const RUNTIME_MODULE: &str = "_proto_types";

/// Everything one generated module needs to import, apart from which
/// module each referenced model class comes from (the planner decides that).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    typing: BTreeSet<&'static str>,
    pydantic: BTreeSet<&'static str>,
    runtime: BTreeSet<&'static str>,
    classes: BTreeSet<String>,
    /// Complete `from m import C as _A` lines for user-supplied modules.
    external: BTreeSet<String>,
    datetime: bool,
    enumeration: bool,
}

impl ImportSet {
    pub(crate) fn typing(&mut self, name: &'static str) {
        self.typing.insert(name);
    }

    pub(crate) fn pydantic(&mut self, name: &'static str) {
        self.pydantic.insert(name);
    }

    pub(crate) fn runtime(&mut self, name: &'static str) {
        self.runtime.insert(name);
    }

    /// Record a reference to a generated message or enum by full name.
    pub(crate) fn class(&mut self, full_name: impl Into<String>) {
        self.classes.insert(full_name.into());
    }

    pub(crate) fn external(&mut self, line: impl Into<String>) {
        self.external.insert(line.into());
    }

    pub(crate) fn datetime(&mut self) {
        self.datetime = true;
    }

    pub(crate) fn enumeration(&mut self) {
        self.enumeration = true;
    }

    pub(crate) fn extend(&mut self, other: &Self) {
        self.typing.extend(other.typing.iter().copied());
        self.pydantic.extend(other.pydantic.iter().copied());
        self.runtime.extend(other.runtime.iter().copied());
        self.classes.extend(other.classes.iter().cloned());
        self.external.extend(other.external.iter().cloned());
        self.datetime |= other.datetime;
        self.enumeration |= other.enumeration;
    }

    /// Runtime module names this module imports.
    pub(crate) fn runtime_names(&self) -> &BTreeSet<&'static str> {
        &self.runtime
    }

    /// Full names of every referenced generated class.
    pub(crate) fn classes(&self) -> &BTreeSet<String> {
        &self.classes
    }

    /// Standard, typing, pydantic, external and runtime import blocks, in
    /// that order.
    /// Empty blocks are omitted.
    pub(crate) fn blocks(&self) -> Vec<Vec<String>> {
        let mut standard = Vec::new();
        if self.datetime {
            standard.push("import datetime as _datetime".to_string());
        }
        if self.enumeration {
            standard.push("from enum import Enum as _Enum".to_string());
        }
        if !self.typing.is_empty() {
            standard.extend(import_line("typing", &aliased(&self.typing)));
        }
        let mut blocks = vec![standard];
        if !self.pydantic.is_empty() {
            blocks.push(import_line("pydantic", &aliased(&self.pydantic)));
        }
        blocks.push(self.external.iter().cloned().collect());
        if !self.runtime.is_empty() {
            let names: Vec<String> = self.runtime.iter().map(ToString::to_string).collect();
            blocks.push(import_line(&format!(".{RUNTIME_MODULE}"), &names));
        }
        blocks.retain(|block| !block.is_empty());
        blocks
    }
}

fn aliased(names: &BTreeSet<&'static str>) -> Vec<String> {
    names.iter().map(|name| format!("{name} as _{name}")).collect()
}

/// `from <module> import <names>`, wrapped when too long. Returns the lines.
pub(crate) fn import_line(module: &str, names: &[String]) -> Vec<String> {
    let single = format!("from {module} import {}", names.join(", "));
    if single.len() <= MAX_IMPORT_LINE {
        return vec![single];
    }
    let mut lines = Vec::with_capacity(names.len() + 2);
    lines.push(format!("from {module} import ("));
    lines.extend(names.iter().map(|name| format!("    {name},")));
    lines.push(")".to_string());
    lines
}
