pub mod attr_assign;
pub mod collector;
pub mod config;
pub mod dynamic_code;
pub mod fstring;
pub mod int_encoder;
pub mod naming;
pub mod obfuscator;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod renamer;
pub mod string_encoder;
pub mod workspace;

use pyveil_core::ast::Module;
use pyveil_utils::errors::TransformError;
use rand::rngs::StdRng;
use std::fmt;
use std::path::{Path, PathBuf};
use workspace::WorkspaceIndex;

/// Trait for tree-rewriting obfuscation passes.
pub trait Transform: Send + Sync {
    /// Returns the transform's name for logging and configuration.
    fn name(&self) -> &'static str;

    /// Rewrites one file's tree. Returning the input unchanged is legal.
    fn apply(&self, module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError>;

    /// Whether this pass queues edits for other files. The orchestrator ends
    /// a stage after every such pass.
    fn edits_siblings(&self) -> bool {
        false
    }
}

type Rewrite = Box<dyn FnOnce(Module) -> Result<Module, TransformError> + Send>;

/// A rewrite one file's pass wants applied to another file's tree.
pub struct SiblingEdit {
    pub target: PathBuf,
    rewrite: Rewrite,
}

impl SiblingEdit {
    pub fn new(
        target: PathBuf,
        rewrite: impl FnOnce(Module) -> Result<Module, TransformError> + Send + 'static,
    ) -> Self {
        Self {
            target,
            rewrite: Box::new(rewrite),
        }
    }

    pub fn apply(self, module: Module) -> Result<Module, TransformError> {
        (self.rewrite)(module)
    }
}

impl fmt::Debug for SiblingEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiblingEdit")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Per-file state handed to every pass.
pub struct PassContext<'a> {
    /// Absolute path of the file being rewritten.
    pub path: &'a Path,
    /// Facts about every file of the run; `None` in single-file mode.
    pub workspace: Option<&'a WorkspaceIndex>,
    pub rng: &'a mut StdRng,
    /// Edits queued for other files.
    pub edits: Vec<SiblingEdit>,
}

impl<'a> PassContext<'a> {
    pub fn new(path: &'a Path, workspace: Option<&'a WorkspaceIndex>, rng: &'a mut StdRng) -> Self {
        Self {
            path,
            workspace,
            rng,
            edits: Vec::new(),
        }
    }

    pub fn single(path: &'a Path, rng: &'a mut StdRng) -> Self {
        Self::new(path, None, rng)
    }
}
