//! Compilation units: packages and the program that groups them.
//!
//! A [`Package`] owns a syntax tree and builds it into a [`Graph`] exactly once. The
//! build runs under a [`OnceLock`], so concurrent callers of [`Package::build`] block
//! until the first caller finished and then observe the same graph. The current
//! [`BuildState`] can be read at any time without blocking.
//!
//! A [`Program`] owns packages by unique name in insertion order and builds all of
//! them, on the rayon thread pool unless [`BuildConfig::parallel`] is cleared.
//!
//! # Examples
//!
//! ```rust
//! use yakssa::{ast::{Expr, SourceFile, Stmt}, Program};
//!
//! let program = Program::new("demo");
//! program.add_package("a", SourceFile::new("a", vec![Stmt::assign("x", Expr::int(1))]))?;
//! program.add_package("b", SourceFile::new("b", vec![]))?;
//! program.build()?;
//!
//! assert!(program.is_built());
//! assert_eq!(program.package("a")?.graph().map(|g| g.functions().len()), Some(1));
//! # Ok::<(), yakssa::Error>(())
//! ```

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, OnceLock,
};

use dashmap::{mapref::entry::Entry, DashMap};
use rayon::prelude::*;
use strum::Display;

use crate::{
    ast::SourceFile,
    config::BuildConfig,
    events::{EventKind, EventLog},
    ssa::{
        builder::{BuildOutput, Builder},
        Graph,
    },
    Error, Result,
};

/// Build progress of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u8)]
pub enum BuildState {
    /// `build` was never called
    #[strum(serialize = "not built")]
    NotBuilt = 0,
    /// A build is running
    #[strum(serialize = "building")]
    Building = 1,
    /// The graph is available
    #[strum(serialize = "built")]
    Built = 2,
}

impl BuildState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BuildState::NotBuilt,
            1 => BuildState::Building,
            _ => BuildState::Built,
        }
    }
}

/// The outcome of the single build of a package.
#[derive(Debug)]
struct Built {
    graph: Graph,
    failure: Option<Error>,
}

/// A named compilation unit.
#[derive(Debug)]
pub struct Package {
    name: String,
    source: Arc<SourceFile>,
    config: BuildConfig,
    state: AtomicU8,
    built: OnceLock<Built>,
    events: EventLog,
}

impl Package {
    /// Creates a package with the default configuration.
    pub fn new(name: impl Into<String>, source: SourceFile) -> Self {
        Self::with_config(name, Arc::new(source), BuildConfig::default())
    }

    /// Creates a package sharing `source` and building with `config`.
    pub fn with_config(name: impl Into<String>, source: Arc<SourceFile>, config: BuildConfig) -> Self {
        Self {
            name: name.into(),
            source,
            config,
            state: AtomicU8::new(BuildState::NotBuilt as u8),
            built: OnceLock::new(),
            events: EventLog::new(),
        }
    }

    /// Name of the package.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The syntax tree the package is built from.
    #[must_use]
    pub fn source(&self) -> &Arc<SourceFile> {
        &self.source
    }

    /// The configuration used by [`Package::build`].
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Current build progress.
    #[must_use]
    pub fn state(&self) -> BuildState {
        BuildState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Builds the package into SSA form.
    ///
    /// Only the first call builds, every later or concurrent call returns the same
    /// result. Under the strict error policy the first diagnostic fails the build
    /// with [`Error::BuildFailed`]; the partial graph stays available through
    /// [`Package::graph`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuildFailed`] if a strict build stopped at a diagnostic or
    /// the graph could not be constructed.
    pub fn build(&self) -> Result<&Graph> {
        let built = self.built.get_or_init(|| self.run());
        match &built.failure {
            Some(err) => Err(err.clone()),
            None => Ok(&built.graph),
        }
    }

    fn run(&self) -> Built {
        self.state
            .store(BuildState::Building as u8, Ordering::Release);

        let BuildOutput { graph, failure } = match Builder::new(&self.name, &self.config, &self.events) {
            Ok(builder) => builder.build(&self.source),
            Err(err) => BuildOutput {
                graph: Graph::new(),
                failure: Some(Error::BuildFailed {
                    package: self.name.clone(),
                    source: Box::new(err),
                }),
            },
        };

        let diagnostics: usize = graph
            .functions()
            .iter()
            .map(|function| function.diagnostics().len())
            .sum();
        self.events.record(EventKind::PackageBuilt).message(format!(
            "package `{}`: {} functions, {} phis, {} diagnostics{}",
            self.name,
            graph.functions().len(),
            graph.phi_count(),
            diagnostics,
            if failure.is_some() { ", aborted" } else { "" }
        ));

        self.state.store(BuildState::Built as u8, Ordering::Release);
        Built { graph, failure }
    }

    /// The graph, once a build finished. Also available after a failed build.
    #[must_use]
    pub fn graph(&self) -> Option<&Graph> {
        self.built.get().map(|built| &built.graph)
    }

    /// Every diagnostic recorded on any function of the package, in function order.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<&Error> {
        self.graph()
            .map(|graph| {
                graph
                    .functions()
                    .iter()
                    .flat_map(|function| function.diagnostics())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Events recorded while building.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }
}

/// A compilation request over one or more packages.
pub struct Program {
    name: String,
    config: BuildConfig,
    packages: boxcar::Vec<Arc<Package>>,
    index: DashMap<String, usize>,
}

impl Program {
    /// Creates an empty program with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, BuildConfig::default())
    }

    /// Creates an empty program whose packages build with `config`.
    pub fn with_config(name: impl Into<String>, config: BuildConfig) -> Self {
        Self {
            name: name.into(),
            config,
            packages: boxcar::Vec::new(),
            index: DashMap::new(),
        }
    }

    /// Name of the program.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a package.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePackage`] if a package with this name exists.
    pub fn add_package(&self, name: impl Into<String>, source: SourceFile) -> Result<Arc<Package>> {
        let name = name.into();
        match self.index.entry(name.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicatePackage(name)),
            Entry::Vacant(slot) => {
                let package = Arc::new(Package::with_config(
                    name,
                    Arc::new(source),
                    self.config,
                ));
                let index = self.packages.push(Arc::clone(&package));
                slot.insert(index);
                Ok(package)
            }
        }
    }

    /// Looks up a package by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageNotFound`] for unknown names.
    pub fn package(&self, name: &str) -> Result<Arc<Package>> {
        self.index
            .get(name)
            .and_then(|index| self.packages.get(*index).cloned())
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }

    /// All packages in insertion order.
    #[must_use]
    pub fn packages(&self) -> Vec<Arc<Package>> {
        self.packages
            .iter()
            .map(|(_, package)| Arc::clone(package))
            .collect()
    }

    /// Number of packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.count()
    }

    /// Returns true if no package was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds every package.
    ///
    /// All packages are built even if one of them fails.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first package, in insertion order, whose build failed.
    pub fn build(&self) -> Result<()> {
        let packages = self.packages();
        let results: Vec<Result<()>> = if self.config.parallel {
            packages
                .par_iter()
                .map(|package| package.build().map(|_| ()))
                .collect()
        } else {
            packages
                .iter()
                .map(|package| package.build().map(|_| ()))
                .collect()
        };
        results.into_iter().collect()
    }

    /// Returns true once every package was built.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.packages
            .iter()
            .all(|(_, package)| package.state() == BuildState::Built)
    }

    /// Diagnostics of all built packages, as `(package, diagnostic)` pairs.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<(String, Error)> {
        self.packages
            .iter()
            .flat_map(|(_, package)| {
                package
                    .diagnostics()
                    .into_iter()
                    .map(|err| (package.name().to_string(), err.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
