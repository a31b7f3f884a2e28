use thiserror::Error;

use crate::ast::Position;

macro_rules! malformed_error {
    // Single string version
    ($pos:expr, $msg:expr) => {
        crate::Error::MalformedConstruct {
            message: $msg.to_string(),
            position: $pos,
        }
    };

    // Format string with arguments version
    ($pos:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedConstruct {
            message: format!($fmt, $($arg)*),
            position: $pos,
        }
    };
}

macro_rules! unsupported_error {
    ($pos:expr, $construct:expr) => {
        crate::Error::UnsupportedConstruct {
            construct: $construct,
            position: $pos,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The first four variants are source-level diagnostics: they describe a problem with the
/// syntax tree handed to the builder and always carry the [`Position`] of the offending node.
/// The remaining variants describe failures of the build machinery itself.
///
/// # Error Categories
///
/// ## Source Diagnostics
/// - [`Error::UndefinedReference`] - Identifier that is neither local nor capturable
/// - [`Error::MisplacedControlTransfer`] - `break`/`continue`/`fallthrough` outside its construct
/// - [`Error::MalformedConstruct`] - Wrong arity or shape of a construct
/// - [`Error::UnsupportedConstruct`] - Construct the builder does not lower
///
/// ## Build Errors
/// - [`Error::SsaError`] - Internal graph invariant violated
/// - [`Error::RecursionLimit`] - Function literals nested deeper than configured
/// - [`Error::DuplicatePackage`] / [`Error::PackageNotFound`] - Program bookkeeping
/// - [`Error::BuildFailed`] - Strict build stopped at a diagnostic
///
/// # Examples
///
/// ```rust
/// use yakssa::{ast::{Expr, SourceFile, Stmt}, Error, Package};
///
/// let file = SourceFile::new("demo", vec![Stmt::expr(Expr::ident("missing"))]);
/// let package = Package::new("demo", file);
/// package.build()?;
///
/// for diagnostic in package.diagnostics() {
///     match diagnostic {
///         Error::UndefinedReference { name, position } => {
///             eprintln!("{position}: `{name}` is not defined");
///         }
///         other => eprintln!("{other}"),
///     }
/// }
/// # Ok::<(), yakssa::Error>(())
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Source diagnostics
    /// An identifier could not be resolved.
    ///
    /// The name has no reaching definition in the current function and no enclosing
    /// function defines it either, so it can not be captured as a free value.
    #[error("{position}: undefined value `{name}`")]
    UndefinedReference {
        /// The identifier text
        name: String,
        /// Where the identifier was read
        position: Position,
    },

    /// A control transfer statement appeared outside of the construct it targets.
    ///
    /// `break` requires an enclosing loop or switch, `continue` an enclosing loop and
    /// `fallthrough` an enclosing switch case that has a following case.
    #[error("{position}: `{keyword}` outside of an enclosing {expected}")]
    MisplacedControlTransfer {
        /// The offending keyword
        keyword: &'static str,
        /// The construct that would have been required
        expected: &'static str,
        /// Where the statement appeared
        position: Position,
    },

    /// A construct has the wrong shape or arity.
    ///
    /// Covers subscripts with a number of keys outside `1..=3`, `make` with bad type
    /// arguments, call targets that can not be called and assignments whose value count
    /// does not match the target count.
    #[error("{position}: malformed construct: {message}")]
    MalformedConstruct {
        /// Description of what was malformed
        message: String,
        /// Where the construct appeared
        position: Position,
    },

    /// A construct is recognized but not lowered into the graph.
    #[error("{position}: unsupported construct `{construct}`")]
    UnsupportedConstruct {
        /// Keyword or short name of the construct
        construct: &'static str,
        /// Where the construct appeared
        position: Position,
    },

    // Build errors
    /// Error during SSA construction.
    ///
    /// Raised when an internal invariant of the graph would be broken, for example when
    /// an edge is added to a block that was already sealed.
    #[error("SSA error: {0}")]
    SsaError(String),

    /// Function literals are nested deeper than [`crate::BuildConfig::max_nesting_depth`].
    #[error("Reached the maximum closure nesting depth allowed - {0}")]
    RecursionLimit(usize),

    /// A package with the same name was already added to the program.
    #[error("Package `{0}` already exists")]
    DuplicatePackage(String),

    /// The requested package does not exist in the program.
    #[error("Package `{0}` not found")]
    PackageNotFound(String),

    /// A strict build stopped at its first diagnostic.
    ///
    /// The wrapped error is the diagnostic that aborted the build.
    #[error("Building package `{package}` failed - {source}")]
    BuildFailed {
        /// Name of the package
        package: String,
        /// The diagnostic which stopped the build
        source: Box<Error>,
    },
}

impl Error {
    /// Returns the source position for source-level diagnostics.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match self {
            Error::UndefinedReference { position, .. }
            | Error::MisplacedControlTransfer { position, .. }
            | Error::MalformedConstruct { position, .. }
            | Error::UnsupportedConstruct { position, .. } => Some(*position),
            Error::BuildFailed { source, .. } => source.position(),
            Error::SsaError(_)
            | Error::RecursionLimit(_)
            | Error::DuplicatePackage(_)
            | Error::PackageNotFound(_) => None,
        }
    }

    /// Returns true if this error describes a problem in the source tree rather than in
    /// the build machinery.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Error::UndefinedReference { .. }
                | Error::MisplacedControlTransfer { .. }
                | Error::MalformedConstruct { .. }
                | Error::UnsupportedConstruct { .. }
        )
    }
}
