//! Error types for term validation, elaboration, decoding and backends.
//!
//! [`TraceabilityError`] lives with the traces it describes.
//!
//! The encoding-level `Ast::Error` value is not represented here: a failed
//! rewrite is ordinary data that flows through the symbolic encoding. The
//! types in this module report misuse of the library or malformed input.

use crate::traceability::TraceabilityError;
use std::fmt;

/// Structural well-formedness failure of an [`Expr`](crate::expr::Expr) or
/// a [`Theory`](crate::theory::Theory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Symbol string is empty.
    EmptySymbol,
    /// A variable must carry exactly one child (its sort).
    VarArity { sym: String, found: usize },
    /// The single child of a variable must be a sort.
    VarSortKind { sym: String },
    /// Only the first child of an application may be a sort.
    SortUnderApp { sym: String, index: usize },
    /// Sorts may not have sort children.
    SortUnderSort { sym: String },
    /// The same symbol is declared twice.
    DuplicateDeclaration { sym: String },
    /// A symbol is declared both as a sort and as an operator.
    KindClash { sym: String },
    /// A declaration's pattern has the wrong kind at its root.
    DeclarationShape { sym: String, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptySymbol => write!(f, "empty symbol"),
            ValidationError::VarArity { sym, found } => write!(
                f,
                "variable '{}' must have exactly one sort child, found {}",
                sym, found
            ),
            ValidationError::VarSortKind { sym } => {
                write!(f, "child of variable '{}' is not a sort", sym)
            }
            ValidationError::SortUnderApp { sym, index } => write!(
                f,
                "application '{}' has a sort at argument position {}",
                sym, index
            ),
            ValidationError::SortUnderSort { sym } => {
                write!(f, "sort '{}' has a sort child", sym)
            }
            ValidationError::DuplicateDeclaration { sym } => {
                write!(f, "symbol '{}' declared more than once", sym)
            }
            ValidationError::KindClash { sym } => {
                write!(f, "symbol '{}' declared as both sort and operator", sym)
            }
            ValidationError::DeclarationShape { sym, reason } => {
                write!(f, "declaration of '{}': {}", sym, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure to elaborate (infer the sort of) a term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    /// Operator symbol has no declaration in the theory.
    UnknownOperator { sym: String },
    /// Operator applied to the wrong number of arguments.
    ArityMismatch { sym: String, expected: usize, found: usize },
    /// The sort of an argument does not match the declared argument pattern.
    ArgumentMismatch { sym: String, index: usize },
    /// Two arguments bind the same pattern variable to different terms.
    ConflictingBindings { sym: String, index: usize },
    /// Operator declarations depend on each other cyclically.
    CyclicDeclarations { syms: Vec<String> },
    /// Elaborated term is not well-formed.
    Invalid(ValidationError),
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceError::UnknownOperator { sym } => write!(f, "unknown operator '{}'", sym),
            InferenceError::ArityMismatch { sym, expected, found } => write!(
                f,
                "operator '{}' expects {} arguments, got {}",
                sym, expected, found
            ),
            InferenceError::ArgumentMismatch { sym, index } => write!(
                f,
                "argument {} of '{}' does not match its declared sort",
                index, sym
            ),
            InferenceError::ConflictingBindings { sym, index } => write!(
                f,
                "argument {} of '{}' conflicts with earlier bindings",
                index, sym
            ),
            InferenceError::CyclicDeclarations { syms } => {
                write!(f, "cyclic operator declarations: {}", syms.join(", "))
            }
            InferenceError::Invalid(err) => write!(f, "ill-formed elaboration: {}", err),
        }
    }
}

impl std::error::Error for InferenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InferenceError::Invalid(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for InferenceError {
    fn from(err: ValidationError) -> Self {
        InferenceError::Invalid(err)
    }
}

/// Failure to turn an encoded value back into a term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Expected a node, found `None` or `Error`.
    NotANode { found: String },
    /// Tag is neither a known symbol code nor a fresh-variable code.
    UnknownCode(i64),
    /// Decoded children do not form a valid term.
    BadShape(ValidationError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotANode { found } => write!(f, "expected a node, found {}", found),
            DecodeError::UnknownCode(code) => write!(f, "no symbol for code {}", code),
            DecodeError::BadShape(err) => write!(f, "decoded term is malformed: {}", err),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<ValidationError> for DecodeError {
    fn from(err: ValidationError) -> Self {
        DecodeError::BadShape(err)
    }
}

/// Misuse of the symbolic term language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Variable has no value in the environment.
    UnboundVariable(String),
    /// Application of a function that was never defined.
    UnknownFunction(String),
    /// Function applied to the wrong number of arguments.
    ArityMismatch { name: String, expected: usize, found: usize },
    /// Operand has an unexpected sort.
    SortMismatch { expected: String, found: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnboundVariable(name) => write!(f, "unbound variable '{}'", name),
            EvalError::UnknownFunction(name) => write!(f, "unknown function '{}'", name),
            EvalError::ArityMismatch { name, expected, found } => write!(
                f,
                "function '{}' expects {} arguments, got {}",
                name, expected, found
            ),
            EvalError::SortMismatch { expected, found } => {
                write!(f, "sort mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Failure inside a reachability backend.
#[derive(Debug)]
pub enum BackendError {
    /// Datatypes must be declared before functions or checks.
    NotDeclared,
    /// A function with this name was already defined.
    DuplicateDefinition(String),
    /// Evaluating a definition or transition failed.
    Eval(EvalError),
    /// The transition system is malformed.
    System(String),
    /// Writing the witness file failed.
    Io(std::io::Error),
    /// Serializing the witness failed.
    Serialization(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotDeclared => write!(f, "datatypes have not been declared"),
            BackendError::DuplicateDefinition(name) => {
                write!(f, "function '{}' is already defined", name)
            }
            BackendError::Eval(err) => write!(f, "evaluation failed: {}", err),
            BackendError::System(msg) => write!(f, "malformed transition system: {}", msg),
            BackendError::Io(err) => write!(f, "witness I/O error: {}", err),
            BackendError::Serialization(msg) => write!(f, "witness serialization error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Eval(err) => Some(err),
            BackendError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EvalError> for BackendError {
    fn from(err: EvalError) -> Self {
        BackendError::Eval(err)
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err)
    }
}

/// Invalid search configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A field holds a value outside its range.
    Invalid(String),
    /// Reading the configuration file failed.
    Io(std::io::Error),
    /// The configuration is not valid JSON for [`SearchConfig`](crate::config::SearchConfig).
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
            ConfigError::Io(err) => write!(f, "cannot read configuration: {}", err),
            ConfigError::Parse(err) => write!(f, "cannot parse configuration: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Umbrella error for the top-level search API.
#[derive(Debug)]
pub enum Error {
    Validation(ValidationError),
    Inference(InferenceError),
    Decode(DecodeError),
    Eval(EvalError),
    Backend(BackendError),
    Config(ConfigError),
    Trace(TraceabilityError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(err) => err.fmt(f),
            Error::Inference(err) => err.fmt(f),
            Error::Decode(err) => err.fmt(f),
            Error::Eval(err) => err.fmt(f),
            Error::Backend(err) => err.fmt(f),
            Error::Config(err) => err.fmt(f),
            Error::Trace(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Validation(err) => Some(err),
            Error::Inference(err) => Some(err),
            Error::Decode(err) => Some(err),
            Error::Eval(err) => Some(err),
            Error::Backend(err) => Some(err),
            Error::Config(err) => Some(err),
            Error::Trace(err) => Some(err),
        }
    }
}

macro_rules! impl_from_for_error {
    ($($variant:ident($ty:ty)),*) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Error::$variant(err)
                }
            }
        )*
    };
}

impl_from_for_error!(
    Validation(ValidationError),
    Inference(InferenceError),
    Decode(DecodeError),
    Eval(EvalError),
    Backend(BackendError),
    Config(ConfigError),
    Trace(TraceabilityError)
);

/// Result alias for the top-level API.
pub type Result<T> = std::result::Result<T, Error>;
