//! Forkscript: a small embeddable engine that runs JavaScript-flavoured
//! snippets against a host-controlled variable store and function table.
//! Engines can be forked cheaply with [`ScriptEngine::duplicate`]; forks
//! share one [`TypeNamespace`] so a variable keeps a single type across
//! every branch.

pub mod ast;
pub mod diagnostics;
pub mod engine;
pub mod environment;
pub mod functions;
pub mod lexer;
pub mod namespace;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod snapshot;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, ErrorKind, ScriptError, SourceSpan};
pub use engine::ScriptEngine;
pub use environment::{BOOLEAN_WORD, RESERVED_WORDS};
pub use functions::{FunctionTable, FunctionTableRef, HostFunction, NativeFunction};
pub use namespace::TypeNamespace;
pub use repl::Repl;
pub use snapshot::DeepCopy;
pub use value::{TypeTag, Value, ValueKind, VariableStore};
