use thiserror::Error;

/// Errors raised while talking to the host Python runtime.
#[derive(Debug, Error)]
pub enum HostError {
    /// The interpreter could not be started.
    #[error("could not start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Pipe I/O with the interpreter failed.
    #[error("bridge i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// A request or reply could not be (de)serialized.
    #[error("bridge payload error: {0}")]
    Json(#[from] serde_json::Error),
    /// The bridge answered with something we did not ask for.
    #[error("bridge protocol violation: {0}")]
    Protocol(String),
    /// The source text did not parse.
    #[error("syntax error in {path}: {message}")]
    Syntax { path: String, message: String },
    /// A tree could not be rendered back to source text.
    #[error("cannot render tree: {0}")]
    Render(String),
    /// A tree was rejected by the compiler.
    #[error("compile failed: {0}")]
    Compile(String),
    /// Any other failure reported by the interpreter.
    #[error("host runtime error: {0}")]
    Runtime(String),
}

/// Errors produced by the naming-template evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}' in naming template")]
    UnknownPlaceholder(String),
    #[error("unbalanced brace at byte {0} in naming template")]
    Unbalanced(usize),
    #[error("naming template produced '{0}', which is not an identifier")]
    InvalidIdentifier(String),
    #[error("naming template produced the keyword '{0}'")]
    Keyword(String),
    #[error("naming template '{template}' found no fresh name after {attempts} attempts")]
    Exhausted { template: String, attempts: usize },
}

/// Error type for transform operations.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A pass left the tree structurally invalid.
    #[error("malformed tree: {0}")]
    Malformed(String),
    /// The pass needs a host capability that is missing.
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("naming template error: {0}")]
    Template(#[from] TemplateError),
    #[error("host error: {0}")]
    Host(#[from] HostError),
    #[error("encryption failed: {0}")]
    Crypto(String),
    #[error("generic error: {0}")]
    Generic(String),
}

/// Errors raised while loading the persisted configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration existed; a default one was written instead.
    #[error("no configuration at '{path}', wrote a default one; edit it and run again")]
    Missing { path: String },
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The document is malformed or from an older layout.
    #[error("malformed or outdated configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("invalid naming template: {0}")]
    Template(#[from] TemplateError),
}

/// Errors raised while discovering local imports.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("entry file '{0}' does not exist")]
    NotFound(String),
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

/// Errors raised by the pass pipeline for one file.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A pass failed; the file keeps its last good tree.
    #[error("pass '{pass}' failed on {path}: {source}")]
    Pass {
        pass: &'static str,
        path: String,
        #[source]
        source: TransformError,
    },
    /// The rewritten tree could not be rendered.
    #[error("cannot render {path}: {source}")]
    Render {
        path: String,
        #[source]
        source: HostError,
    },
    /// The file was already marked failed by an earlier stage.
    #[error("{0} failed in an earlier stage")]
    Skipped(String),
    /// A worker task died without reporting.
    #[error("worker for {path} aborted: {message}")]
    Aborted { path: String, message: String },
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

/// Errors that can occur during obfuscation.
#[derive(Debug, Error)]
pub enum ObfuscateError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("dependency error: {0}")]
    Dependency(#[from] DependencyError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("host error: {0}")]
    Host(#[from] HostError),
    /// File read/write error.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    /// Some files failed; the rest were written.
    #[error("{failed} of {total} files failed")]
    Partial { failed: usize, total: usize },
}
