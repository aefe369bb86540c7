//! The staged compilation pipeline.
//!
//! A compilation walks [`Stage::ALL`] in order. Each stage either advances or aborts the run
//! with the first fatal error; nothing is written unless every stage succeeded. Warnings
//! accumulate across stages and travel with the outcome either way.

pub mod declarations;
pub mod wrapper;

use std::fmt;
use std::path::{Path, PathBuf};

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use tracing::{debug, error, info, warn};

use crate::builder::build_model;
use crate::codegen::overrides::OverrideFile;
use crate::codegen::{CallbackGenerator, Callbacks, ident};
use crate::config::CompileOptions;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{CompileError, Result};
use crate::model::DesignModel;
use crate::validate::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub enum Stage {
    ParseDesign,
    AllocateEvents,
    ValidateStart,
    ValidateTransitions,
    GenerateStateHooks,
    GenerateTransitionHooks,
    MergeOverrides,
    EmitDeclarations,
    EmitWrapper,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::ParseDesign,
        Stage::AllocateEvents,
        Stage::ValidateStart,
        Stage::ValidateTransitions,
        Stage::GenerateStateHooks,
        Stage::GenerateTransitionHooks,
        Stage::MergeOverrides,
        Stage::EmitDeclarations,
        Stage::EmitWrapper,
    ];

    pub fn next(self) -> Option<Stage> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Stages that only run when code generation is on.
    pub fn generates(self) -> bool {
        matches!(
            self,
            Self::GenerateStateHooks
                | Self::GenerateTransitionHooks
                | Self::MergeOverrides
                | Self::EmitDeclarations
                | Self::EmitWrapper
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ParseDesign => "parsing the design",
            Self::AllocateEvents => "allocating events",
            Self::ValidateStart => "validating start transitions",
            Self::ValidateTransitions => "validating transitions",
            Self::GenerateStateHooks => "generating state callbacks",
            Self::GenerateTransitionHooks => "generating transition callbacks",
            Self::MergeOverrides => "merging override callbacks",
            Self::EmitDeclarations => "emitting declarations",
            Self::EmitWrapper => "emitting the wrapper",
        };
        f.write_str(text)
    }
}

/// A run stopped by a fatal error.
#[derive(Debug, thiserror::Error)]
#[error("aborted while {stage}: {error}")]
pub struct Aborted {
    pub stage: Stage,
    #[source]
    pub error: CompileError,
    pub warnings: Vec<Warning>,
}

/// A successful run.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub model: DesignModel,
    /// Generated module; `None` when generation is off.
    pub source: Option<String>,
    /// Callbacks file content when `GenCallbacks` is set.
    pub callbacks_source: Option<String>,
    /// Override functions no state or transition referenced.
    pub orphans: Vec<String>,
    pub warnings: Vec<Warning>,
    pub output_path: PathBuf,
}

impl Compilation {
    /// `<output stem>_cb.rs` next to the output.
    pub fn callbacks_path(&self) -> PathBuf {
        let stem = self
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.model.name.clone());
        self.output_path.with_file_name(format!("{stem}_cb.rs"))
    }

    /// Writes the generated module and, once, the callbacks file. Returns the written paths.
    pub fn write(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if let Some(source) = &self.source {
            std::fs::write(&self.output_path, source)
                .map_err(|e| CompileError::io(&self.output_path, e))?;
            info!(path = %self.output_path.display(), "generated code written");
            written.push(self.output_path.clone());
        }
        if let Some(callbacks) = &self.callbacks_source {
            let path = self.callbacks_path();
            if path.exists() {
                warn!(path = %path.display(), "callbacks file exists, leaving it untouched");
            } else {
                std::fs::write(&path, callbacks).map_err(|e| CompileError::io(&path, e))?;
                info!(path = %path.display(), "callbacks file written");
                written.push(path);
            }
        }
        Ok(written)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Emitted(Compilation),
    Aborted(Aborted),
}

impl Outcome {
    pub fn warnings(&self) -> &[Warning] {
        match self {
            Self::Emitted(compilation) => &compilation.warnings,
            Self::Aborted(aborted) => &aborted.warnings,
        }
    }

    pub fn into_result(self) -> std::result::Result<Compilation, Aborted> {
        match self {
            Self::Emitted(compilation) => Ok(compilation),
            Self::Aborted(aborted) => Err(aborted),
        }
    }
}

/// State carried from one stage to the next.
#[derive(Default)]
struct Run {
    diag: Diagnostics,
    model: DesignModel,
    callbacks: Callbacks,
    orphans: Vec<String>,
    declarations: TokenStream,
    source: Option<String>,
}

pub struct Pipeline {
    options: CompileOptions,
    text: Option<String>,
}

impl Pipeline {
    /// Compiles the design file named by `options`.
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            text: None,
        }
    }

    /// Compiles `text` as if read from `options.design`.
    pub fn with_source(options: CompileOptions, text: impl Into<String>) -> Self {
        Self {
            options,
            text: Some(text.into()),
        }
    }

    pub fn run(self) -> Outcome {
        let mut run = Run::default();
        for stage in Stage::ALL {
            if stage.generates() && !run.model.options.gen_code {
                debug!(%stage, "skipped, GenCode is off");
                continue;
            }
            debug!(%stage, "entering stage");
            if let Err(error) = self.run_stage(stage, &mut run) {
                error!(%stage, "{error}");
                return Outcome::Aborted(Aborted {
                    stage,
                    error,
                    warnings: run.diag.into_warnings(),
                });
            }
        }

        let callbacks_source = match self.callbacks_file(&run) {
            Ok(source) => source,
            Err(error) => {
                return Outcome::Aborted(Aborted {
                    stage: Stage::EmitWrapper,
                    error,
                    warnings: run.diag.into_warnings(),
                });
            }
        };
        info!(
            chart = %run.model.name,
            states = run.model.enabled_states().count(),
            transitions = run.model.enabled_transitions().count(),
            warnings = run.diag.count(),
            "compilation finished"
        );
        let output_path = self.options.output_path(&run.model.name);
        Outcome::Emitted(Compilation {
            model: run.model,
            source: run.source,
            callbacks_source,
            orphans: run.orphans,
            warnings: run.diag.into_warnings(),
            output_path,
        })
    }

    fn run_stage(&self, stage: Stage, run: &mut Run) -> Result<()> {
        match stage {
            Stage::ParseDesign => {
                let text = match &self.text {
                    Some(text) => text.clone(),
                    None => std::fs::read_to_string(&self.options.design)
                        .map_err(|e| CompileError::io(&self.options.design, e))?,
                };
                let label = self
                    .options
                    .design
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.options.design.display().to_string());
                let base_dir = self.options.design.parent().unwrap_or_else(|| Path::new(""));
                run.model = build_model(&label, &text, base_dir, &mut run.diag)?;
            }
            Stage::AllocateEvents => validate(run, |v| {
                v.allocate_event_ids()?;
                v.resolve_suppressed()?;
                v.verify_ports();
                Ok(())
            })?,
            Stage::ValidateStart => validate(run, |v| {
                v.verify_state_parents()?;
                v.verify_transition_states()?;
                v.verify_start_transitions()
            })?,
            Stage::ValidateTransitions => validate(run, |v| v.check_transitions())?,
            Stage::GenerateStateHooks => {
                let previous = std::mem::take(&mut run.callbacks);
                let mut generator = CallbackGenerator::resume(&run.model, &mut run.diag, previous);
                generator.generate_state_hooks()?;
                run.callbacks = generator.finish();
            }
            Stage::GenerateTransitionHooks => {
                let previous = std::mem::take(&mut run.callbacks);
                let mut generator = CallbackGenerator::resume(&run.model, &mut run.diag, previous);
                generator.generate_transition_hooks()?;
                run.callbacks = generator.finish();
            }
            Stage::MergeOverrides => {
                if let Some(path) = self.options.override_path(&run.model.options, &mut run.diag) {
                    let file = OverrideFile::load(&path)?;
                    run.orphans = file.merge_into(&mut run.callbacks.units, &mut run.diag)?;
                }
            }
            Stage::EmitDeclarations => {
                let chart = ident("STATECHART", &run.model.name)?;
                check_type_names(&run.model)?;
                let groups = declarations::event_groups(&run.model)?;
                let tables = declarations::event_tables(&run.model)?;
                let ports = declarations::port_tables(&run.model);
                let fns = declarations::callback_fns(&run.callbacks, &chart);
                let build = declarations::build_statechart(&run.model, &run.callbacks, &chart)?;
                run.declarations = quote! {
                    #groups
                    #tables
                    #ports
                    #fns
                    #build
                };
            }
            Stage::EmitWrapper => {
                let chart = ident("STATECHART", &run.model.name)?;
                let wrapper = wrapper::wrapper(&run.model, &chart);
                let declarations = std::mem::take(&mut run.declarations);
                run.source = Some(render(
                    &run.model,
                    quote! {
                        #declarations
                        #wrapper
                    },
                )?);
            }
        }
        Ok(())
    }

    fn callbacks_file(&self, run: &Run) -> Result<Option<String>> {
        if !run.model.options.gen_code || !run.model.options.gen_callbacks {
            return Ok(None);
        }
        let chart = ident("STATECHART", &run.model.name)?;
        let fns = run.callbacks.units.iter().map(|unit| unit.to_marked_tokens(&chart));
        let file = parse_rendered(quote! { #(#fns)* })?;
        Ok(Some(format!(
            "// Callbacks for statechart {}. Edit the bodies and pass this file with -c.\n\n{}",
            run.model.name,
            prettyplease::unparse(&file)
        )))
    }
}

/// Moves the model through a [`Validator`] and back.
fn validate(
    run: &mut Run,
    check: impl FnOnce(&mut Validator<'_>) -> Result<()>,
) -> Result<()> {
    let model = std::mem::take(&mut run.model);
    let mut validator = Validator::new(model, &mut run.diag);
    check(&mut validator)?;
    run.model = validator.into_model();
    Ok(())
}

/// Group types and the wrapper share one namespace.
fn check_type_names(model: &DesignModel) -> Result<()> {
    match model.groups.iter().find(|g| g.name == model.name) {
        Some(group) => Err(CompileError::DuplicateDefinition {
            kind: "type name",
            name: group.name.clone(),
        }),
        None => Ok(()),
    }
}

fn parse_rendered(tokens: TokenStream) -> Result<syn::File> {
    syn::parse2::<syn::File>(tokens).map_err(|e| CompileError::Render {
        message: e.to_string(),
    })
}

fn initial_items(model: &DesignModel) -> Result<Vec<syn::Item>> {
    let text = model.initial.join("\n");
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file = syn::parse_file(&text).map_err(|e| CompileError::InvalidInitializer {
        message: e.to_string(),
    })?;
    if !file.attrs.is_empty() {
        return Err(CompileError::InvalidInitializer {
            message: "inner attributes are not supported".into(),
        });
    }
    Ok(file.items)
}

/// Header, imports, initializer, then `body`, pretty-printed.
fn render(model: &DesignModel, body: TokenStream) -> Result<String> {
    let runtime: syn::Path =
        syn::parse_str(&model.options.runtime).map_err(|_| CompileError::InvalidValue {
            section: "OPTIONS".into(),
            key: "runtime".into(),
            value: model.options.runtime.clone(),
            expected: "a Rust crate path".into(),
        })?;
    let initial = initial_items(model)?;
    let prelude = format_ident!("prelude");
    let file = parse_rendered(quote! {
        #![allow(dead_code, non_snake_case, non_upper_case_globals, unused_imports, unused_variables)]

        use #runtime::#prelude::*;

        #(#initial)*

        #body
    })?;
    Ok(format!(
        "// @generated by scb for statechart {}. Do not edit by hand.\n\n{}",
        model.name,
        prettyplease::unparse(&file)
    ))
}
