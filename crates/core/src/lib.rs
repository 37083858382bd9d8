//! Syntax tree model, traversal framework, scope analysis and host bridge
//! shared by every pyveil pass.
pub mod ast;
pub mod build;
pub mod code;
pub mod constant;
pub mod deps;
pub mod fold;
pub mod host;
pub mod import_path;
pub mod names;
pub mod python;
pub mod scope;
pub mod validate;
pub mod visit;

pub use ast::{Expr, Module, Stmt};
pub use constant::Constant;
pub use host::{HostRuntime, HostVersion, SourceCodec};
pub use python::PythonHost;
