//! Hand-written callback bodies.
//!
//! An override file is Rust source holding functions marked `#[action]` or `#[guard]`. Each
//! marked function replaces the generated function of the same name; the marker is stripped
//! and the rest of the item is emitted as written. Unmarked items are ignored.

use std::path::{Path, PathBuf};

use tracing::info;

use super::{CallbackKind, CallbackUnit};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{CompileError, Result};

#[derive(Debug, Clone)]
pub struct OverrideFn {
    pub kind: CallbackKind,
    pub item: syn::ItemFn,
}

impl OverrideFn {
    pub fn name(&self) -> String {
        self.item.sig.ident.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct OverrideFile {
    pub path: PathBuf,
    pub functions: Vec<OverrideFn>,
}

impl OverrideFile {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
        Self::parse(path, &source)
    }

    pub fn parse(path: &Path, source: &str) -> Result<Self> {
        let file = syn::parse_file(source).map_err(|e| CompileError::OverrideParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut functions: Vec<OverrideFn> = Vec::new();
        for item in file.items {
            let syn::Item::Fn(mut item) = item else {
                continue;
            };
            let Some(kind) = take_marker(&mut item.attrs) else {
                continue;
            };
            let candidate = OverrideFn { kind, item };
            let name = candidate.name();
            if functions.iter().any(|f| f.name() == name) {
                return Err(CompileError::DuplicateDefinition {
                    kind: "override function",
                    name,
                });
            }
            functions.push(candidate);
        }
        Ok(Self {
            path: path.to_path_buf(),
            functions,
        })
    }

    /// Substitutes matching units and returns the names nothing referenced.
    pub fn merge_into(
        self,
        units: &mut [CallbackUnit],
        diag: &mut Diagnostics,
    ) -> Result<Vec<String>> {
        let mut orphans = Vec::new();
        let mut merged = 0usize;
        for function in self.functions {
            let name = function.name();
            match units.iter_mut().find(|u| u.name == name) {
                Some(unit) if unit.kind != function.kind => {
                    return Err(CompileError::CallbackKindConflict { name });
                }
                Some(unit) => {
                    unit.replace(function.item);
                    merged += 1;
                }
                None => orphans.push(name),
            }
        }
        if !orphans.is_empty() {
            diag.warn(
                WarningKind::OrphanedOverride,
                format!(
                    "{}: callbacks never referenced by the design: {}",
                    self.path.display(),
                    orphans.join(", ")
                ),
            );
        }
        info!(merged, orphans = orphans.len(), "override callbacks merged");
        Ok(orphans)
    }
}

/// Removes the `#[action]` or `#[guard]` marker and reports which it was.
fn take_marker(attrs: &mut Vec<syn::Attribute>) -> Option<CallbackKind> {
    let position = attrs.iter().position(|attr| {
        attr.path().is_ident("action") || attr.path().is_ident("guard")
    })?;
    let attr = attrs.remove(position);
    if attr.path().is_ident("guard") {
        Some(CallbackKind::Guard)
    } else {
        Some(CallbackKind::Action)
    }
}
