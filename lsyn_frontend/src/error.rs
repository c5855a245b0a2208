use lsyn_netlist::NetlistError;
use thiserror::Error;

/// Errors raised while reading and elaborating source text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontendError {
    /// Characters that do not form a token.
    #[error("{line}:{col}: unexpected character sequence '{text}'")]
    Lex { line: usize, col: usize, text: String },

    /// Token sequence outside the grammar.
    #[error("{line}:{col}: {message}")]
    Syntax { line: usize, col: usize, message: String },

    /// Valid Verilog this front end does not handle.
    #[error("{line}:{col}: unsupported construct: {construct}")]
    Unsupported { line: usize, col: usize, construct: String },

    /// A name used before (or without) declaration.
    #[error("{line}: undeclared signal '{signal}' in module '{module}'")]
    UndeclaredSignal { module: String, signal: String, line: usize },

    /// A name declared twice in one module.
    #[error("{line}: '{signal}' is declared twice in module '{module}'")]
    DuplicateDeclaration { module: String, signal: String, line: usize },

    /// Two modules share a name.
    #[error("Module '{0}' is defined twice")]
    DuplicateModule(String),

    /// A signal assigned by more than one statement.
    #[error("{line}: signal '{signal}' in module '{module}' has more than one driver")]
    MultipleDrivers { module: String, signal: String, line: usize },

    /// An assignment to an input port.
    #[error("{line}: input '{signal}' of module '{module}' cannot be driven")]
    DrivenInput { module: String, signal: String, line: usize },

    /// A bad instance port connection.
    #[error("{line}: instance '{instance}': {message}")]
    Connection { instance: String, message: String, line: usize },

    /// The requested top module does not exist.
    #[error("Top module '{0}' not found")]
    UnknownTop(String),

    /// Several modules could be the top; name one explicitly.
    #[error("Cannot infer the top module, candidates: {}", .0.join(", "))]
    AmbiguousTop(Vec<String>),

    /// The source defines no module.
    #[error("No module definition found")]
    NoModules,

    /// A module instantiates itself, directly or not.
    #[error("Module '{0}' is instantiated recursively")]
    RecursiveInstance(String),

    /// The lowered netlist is structurally invalid.
    #[error(transparent)]
    Netlist(#[from] NetlistError),
}
