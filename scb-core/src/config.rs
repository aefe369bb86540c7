//! Compiler configuration.
//!
//! Two layers feed a compilation: [`DesignOptions`] read from the design file's `OPTIONS`
//! section, and [`CompileOptions`] supplied by the caller (usually the command line). Where
//! both name an override file the caller wins.

use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::model::is_none_value;
use crate::section::Section;

/// Runtime crate the generated code imports when the design doesn't name one.
pub const DEFAULT_RUNTIME: &str = "scb_runtime";

/// `OPTIONS` section flags.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub struct DesignOptions {
    /// Trace stubs print `start -> end`.
    pub debug: bool,
    /// Echo generated code to stdout.
    pub print: bool,
    /// Literal code in structured callbacks is an error instead of a warning.
    pub limit_actions: bool,
    /// When false only validation runs.
    pub gen_code: bool,
    /// Also write a standalone callbacks file usable as an override file.
    pub gen_callbacks: bool,
    pub interpret: bool,
    pub override_file: Option<PathBuf>,
    pub runtime: String,
}

impl Default for DesignOptions {
    fn default() -> Self {
        Self {
            debug: false,
            print: false,
            limit_actions: false,
            gen_code: true,
            gen_callbacks: false,
            interpret: false,
            override_file: None,
            runtime: DEFAULT_RUNTIME.to_string(),
        }
    }
}

/// `true` (any case) or `1`.
pub(crate) fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn flag(section: &Section, key: &str, default: bool) -> bool {
    section.get(key).map_or(default, parse_flag)
}

impl DesignOptions {
    pub fn from_section(section: &Section, diag: &mut Diagnostics) -> Self {
        let defaults = Self::default();
        let override_file = section
            .get("insertcb")
            .filter(|v| !is_none_value(v) && !v.trim().eq_ignore_ascii_case("false"))
            .map(|v| PathBuf::from(v.trim()));
        let runtime = section
            .get("runtime")
            .filter(|v| !is_none_value(v))
            .map_or(defaults.runtime, |v| v.trim().to_string());

        let options = Self {
            debug: flag(section, "debug", defaults.debug),
            print: flag(section, "print", defaults.print),
            limit_actions: flag(section, "limitaction", defaults.limit_actions),
            gen_code: flag(section, "gencode", defaults.gen_code),
            gen_callbacks: flag(section, "gencallbacks", defaults.gen_callbacks),
            interpret: flag(section, "interpret", defaults.interpret),
            override_file,
            runtime,
        };
        if options.interpret {
            diag.warn(
                WarningKind::IgnoredOption,
                "Interpret is set but the interactive shell is not part of this tool, ignoring",
            );
        }
        options
    }
}

/// Caller-supplied settings for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub design: PathBuf,
    /// Defaults to `<chart name>.rs` next to the design file.
    pub output: Option<PathBuf>,
    /// Override file; takes precedence over the design's `InsertCB`.
    pub callbacks: Option<PathBuf>,
    /// Validate only, never write.
    pub check_only: bool,
}

impl CompileOptions {
    pub fn new(design: impl Into<PathBuf>) -> Self {
        Self {
            design: design.into(),
            output: None,
            callbacks: None,
            check_only: false,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_callbacks(mut self, callbacks: impl Into<PathBuf>) -> Self {
        self.callbacks = Some(callbacks.into());
        self
    }

    pub fn check_only(mut self, check_only: bool) -> Self {
        self.check_only = check_only;
        self
    }

    fn design_dir(&self) -> &Path {
        self.design.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Override file to merge: the caller's, else the design's relative to the design file.
    pub fn override_path(
        &self,
        design: &DesignOptions,
        diag: &mut Diagnostics,
    ) -> Option<PathBuf> {
        let from_design = design
            .override_file
            .as_ref()
            .map(|path| self.design_dir().join(path));
        match (&self.callbacks, from_design) {
            (Some(cli), Some(file)) => {
                if *cli != file {
                    diag.warn(
                        WarningKind::IgnoredOption,
                        format!(
                            "InsertCB {} is overridden by {}",
                            file.display(),
                            cli.display()
                        ),
                    );
                }
                Some(cli.clone())
            }
            (Some(cli), None) => Some(cli.clone()),
            (None, file) => file,
        }
    }

    pub fn output_path(&self, chart_name: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.design_dir().join(format!("{chart_name}.rs")))
    }
}
