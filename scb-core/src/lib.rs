// Copyright 2025 0xjcf
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # scb-core
//! Compiles statechart design files into Rust.
//!
//! A design file describes a Harel statechart in sectioned key/value form: states and their
//! hierarchy, event groups, transitions, and optional network ports. The compiler reads it
//! into a [`DesignModel`], validates it (event id ranges, start transitions, transition
//! consistency) and emits a Rust module that builds the chart against a runtime crate.
//!
//! ```no_run
//! use scb_core::{CompileOptions, compile};
//!
//! let compilation = compile(&CompileOptions::new("lamp.ini")).into_result()?;
//! for warning in &compilation.warnings {
//!     println!("{warning}");
//! }
//! # Ok::<(), scb_core::emit::Aborted>(())
//! ```

pub mod builder;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod model;
pub mod section;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use config::{CompileOptions, DesignOptions};
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use emit::{Aborted, Compilation, Outcome, Pipeline, Stage};
pub use error::{CompileError, ErrorCategory, Result};
pub use model::DesignModel;

/// Compiles the design named by `options` and, unless it is a check-only run, writes the
/// generated files.
pub fn compile(options: &CompileOptions) -> Outcome {
    let compilation = match Pipeline::new(options.clone()).run() {
        Outcome::Emitted(compilation) => compilation,
        aborted => return aborted,
    };
    if options.check_only {
        return Outcome::Emitted(compilation);
    }
    match compilation.write() {
        Ok(_) => Outcome::Emitted(compilation),
        Err(error) => Outcome::Aborted(Aborted {
            stage: Stage::EmitWrapper,
            error,
            warnings: compilation.warnings,
        }),
    }
}
