// Copyright 2025 Johann Kempter
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
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # yakssa
//!
//! On-the-fly SSA construction for yaklang, a dynamically typed scripting language.
//!
//! `yakssa` takes the syntax tree of a yaklang compilation unit and lowers it into
//! static single assignment form in a single walk. Variables are resolved while the
//! tree is visited: phis are created only where definitions from different paths
//! meet, incomplete phis of loop headers are completed when the header is sealed and
//! trivial phis disappear immediately. The resulting graph is the basis for data
//! flow and taint analyses of yaklang scripts.
//!
//! ## Features
//!
//! - **Minimal SSA without dominance frontiers** - phis are placed during the walk
//! - **Structured control flow** - `if`/`elif`/`else`, three clause and range loops,
//!   `switch` with `fallthrough`, `try`/`catch`/`finally`, `break` and `continue`
//! - **Closures** - free variables are captured as shared cells, assignments inside a
//!   closure write through to the enclosing function
//! - **Structural types** - composite literals are classified as array, map or
//!   record; function types are computed from parameters and returns
//! - **Idempotent, parallel builds** - every package builds exactly once, a program
//!   builds its packages on the rayon thread pool
//! - **Graphviz export** - control flow and def-use graphs as DOT
//!
//! ## Quick Start
//!
//! ```rust
//! use yakssa::prelude::*;
//!
//! // x = 1; if c { x = 2 }; y = x
//! let file = SourceFile::new(
//!     "demo",
//!     vec![
//!         Stmt::assign("c", Expr::bool(true)),
//!         Stmt::assign("x", Expr::int(1)),
//!         IfStmt::new(Expr::ident("c"), vec![Stmt::assign("x", Expr::int(2))]).into(),
//!         Stmt::assign("y", Expr::ident("x")),
//!     ],
//! );
//!
//! let package = Package::new("demo", file);
//! let graph = package.build()?;
//! let main = graph.main().expect("main function");
//!
//! // one phi merges the two definitions of `x`
//! assert_eq!(main.phis().count(), 1);
//! assert!(package.diagnostics().is_empty());
//! # Ok::<(), yakssa::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Problems in the syntax tree are diagnostics, not panics. With the default
//! [`ErrorPolicy::BestEffort`] a failing statement is recorded on its function and
//! building continues; [`BuildConfig::strict`] stops at the first diagnostic and
//! [`Package::build`] returns [`Error::BuildFailed`].
//!
//! ## Logging
//!
//! Every build records structured events into the package's [`EventLog`]. Resolver
//! level events (sealing, phi creation and removal) are only recorded with
//! [`BuildConfig::traced`].

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use yakssa::prelude::*;
///
/// let package = Package::new("empty", SourceFile::new("empty", vec![]));
/// let graph = package.build()?;
/// assert_eq!(graph.functions().len(), 1);
/// # Ok::<(), Error>(())
/// ```
pub mod prelude;

/// The syntax tree handed to the builder.
///
/// See [`ast::SourceFile`] for the root of a compilation unit.
pub mod ast;

/// Build configuration: error policy, tracing and parallelism.
pub mod config;

/// Structured build events.
pub mod events;

/// SSA construction and the resulting graph.
///
/// The main entry points are [`ssa::Package`] and [`ssa::Program`]; the built
/// [`ssa::Graph`] gives access to functions, blocks, instructions and values.
pub mod ssa;

/// Shared helpers.
pub mod utils;

/// `yakssa` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `yakssa` Error type
///
/// The main error type for all operations in this crate. Source level diagnostics
/// carry the position of the offending node.
///
/// # Examples
///
/// ```rust
/// use yakssa::{ast::{SourceFile, Stmt}, BuildConfig, Error, Package};
/// use std::sync::Arc;
///
/// let file = SourceFile::new("demo", vec![Stmt::brk().at(3, 1)]);
/// let package = Package::with_config("demo", Arc::new(file), BuildConfig::strict());
///
/// match package.build() {
///     Err(Error::BuildFailed { source, .. }) => {
///         assert!(matches!(*source, Error::MisplacedControlTransfer { keyword: "break", .. }));
///     }
///     other => panic!("unexpected result {other:?}"),
/// }
/// ```
pub use error::Error;

pub use config::{BuildConfig, ErrorPolicy};
pub use events::{Event, EventKind, EventLog};
pub use ssa::{Package, Program};
