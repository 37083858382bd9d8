//! Runs the pipeline over every file of a run.
//!
//! The pipeline is cut into stages after each pass that edits other files.
//! Every live file finishes a stage before any file starts the next one, and
//! the edits queued during a stage are applied at that barrier. Each file
//! sits behind its own lock and no task ever holds two.
use crate::pipeline;
use crate::progress::{ProgressSink, TracingProgress};
use crate::workspace::WorkspaceIndex;
use crate::{PassContext, SiblingEdit, Transform};
use pyveil_core::ast::Module;
use pyveil_utils::errors::PipelineError;
use rand::{rngs::StdRng, SeedableRng};
use sha3::{Digest, Sha3_256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// One file of the run.
#[derive(Debug)]
struct Slot {
    path: PathBuf,
    module: Mutex<Module>,
    failure: Mutex<Option<PipelineError>>,
}

impl Slot {
    fn lock(&self) -> Result<MutexGuard<'_, Module>, PipelineError> {
        self.module.lock().map_err(|_| PipelineError::Aborted {
            path: self.path.display().to_string(),
            message: "file lock poisoned".into(),
        })
    }

    fn failed(&self) -> bool {
        self.failure.lock().map_or(true, |f| f.is_some())
    }

    fn fail(&self, error: PipelineError) {
        warn!(path = %self.path.display(), %error, "file failed");
        if let Ok(mut slot) = self.failure.lock() {
            slot.get_or_insert(error);
        }
    }
}

/// The trees of a run, one lock per file.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    slots: Vec<Arc<Slot>>,
    /// Whether passes see each other's files.
    linked: bool,
}

impl Workspace {
    /// A run over one file; passes get no workspace facts.
    pub fn single(path: PathBuf, module: Module) -> Self {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut ws = Self::new(root, vec![(path, module)]);
        ws.linked = false;
        ws
    }

    /// A run over related files. `root` is where absolute imports start.
    pub fn new(root: PathBuf, files: Vec<(PathBuf, Module)>) -> Self {
        let slots = files
            .into_iter()
            .map(|(path, module)| {
                Arc::new(Slot {
                    path,
                    module: Mutex::new(module),
                    failure: Mutex::new(None),
                })
            })
            .collect();
        Self {
            root,
            slots,
            linked: true,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.slots.iter().map(|s| s.path.as_path())
    }

    fn live(&self) -> Vec<Arc<Slot>> {
        self.slots.iter().filter(|s| !s.failed()).cloned().collect()
    }

    /// Facts about the current trees, taking one lock at a time.
    fn index(&self) -> Result<WorkspaceIndex, PipelineError> {
        let mut files = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let module = slot.lock()?.clone();
            files.push((slot.path.clone(), module));
        }
        Ok(WorkspaceIndex::build(
            &self.root,
            files.iter().map(|(p, m)| (p.as_path(), m)),
        ))
    }

    fn apply_edit(&self, edit: SiblingEdit) {
        let Some(slot) = self.slots.iter().find(|s| s.path == edit.target) else {
            debug!(file = %edit.target.display(), "edit for a file outside the run");
            return;
        };
        if slot.failed() {
            return;
        }
        let result = slot.lock().and_then(|mut module| {
            let edited = edit
                .apply(module.clone())
                .map_err(|source| PipelineError::Pass {
                    pass: "sibling edit",
                    path: slot.path.display().to_string(),
                    source,
                })?;
            *module = edited;
            Ok(())
        });
        if let Err(e) = result {
            slot.fail(e);
        }
    }

    /// Every file with its final tree, or the error that stopped it.
    pub fn into_results(self) -> Vec<(PathBuf, Result<Module, PipelineError>)> {
        self.slots
            .into_iter()
            .map(|slot| {
                let path = slot.path.clone();
                let failure = slot.failure.lock().ok().and_then(|mut f| f.take());
                let result = match failure {
                    Some(e) => Err(e),
                    None => slot.lock().map(|m| m.clone()),
                };
                (path, result)
            })
            .collect()
    }
}

/// Per-file generator derived from the run seed, the file and the stage, so
/// results do not depend on scheduling.
pub fn file_rng(seed: u64, path: &Path, stage: usize) -> StdRng {
    let mut hasher = Sha3_256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update((stage as u64).to_le_bytes());
    StdRng::from_seed(hasher.finalize().into())
}

type Stage = Arc<Vec<Box<dyn Transform>>>;

/// Drives staged, bounded-concurrency runs.
pub struct Orchestrator {
    stages: Vec<Stage>,
    seed: u64,
    workers: usize,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("stages", &self.stages.len())
            .field("seed", &self.seed)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(passes: Vec<Box<dyn Transform>>, seed: u64, workers: usize) -> Self {
        Self {
            stages: pipeline::stages(passes).into_iter().map(Arc::new).collect(),
            seed,
            workers: workers.max(1),
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs every stage over `workspace`. Failures are recorded per file.
    pub async fn run(&self, workspace: &Workspace) {
        let permits = Arc::new(Semaphore::new(self.workers));
        for (number, passes) in self.stages.iter().enumerate() {
            let live = workspace.live();
            if live.is_empty() {
                break;
            }
            let index = if workspace.linked {
                match workspace.index() {
                    Ok(index) => Some(Arc::new(index)),
                    Err(e) => {
                        warn!(%e, "cannot index workspace");
                        for slot in &live {
                            slot.fail(PipelineError::Skipped(slot.path.display().to_string()));
                        }
                        break;
                    }
                }
            } else {
                None
            };

            let task = format!("stage {}/{}", number + 1, self.stages.len());
            let total = live.len();
            let mut handles = Vec::with_capacity(total);
            for slot in live {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    slot.fail(PipelineError::Aborted {
                        path: slot.path.display().to_string(),
                        message: "worker pool closed".into(),
                    });
                    continue;
                };
                let passes = passes.clone();
                let index = index.clone();
                let seed = self.seed;
                let worker = slot.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    run_file(&worker, &passes, index.as_deref(), seed, number)
                });
                handles.push((slot, handle));
            }

            let mut edits = Vec::new();
            for (completed, (slot, handle)) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(Ok(queued)) => edits.extend(queued),
                    Ok(Err(e)) => slot.fail(e),
                    Err(e) => slot.fail(PipelineError::Aborted {
                        path: slot.path.display().to_string(),
                        message: e.to_string(),
                    }),
                }
                self.progress.update(
                    &task,
                    completed + 1,
                    total,
                    &slot.path.display().to_string(),
                );
            }

            // barrier: every file is done with this stage
            debug!(stage = number, edits = edits.len(), "applying sibling edits");
            for edit in edits {
                workspace.apply_edit(edit);
            }
        }
    }
}

fn run_file(
    slot: &Slot,
    passes: &[Box<dyn Transform>],
    index: Option<&WorkspaceIndex>,
    seed: u64,
    stage: usize,
) -> Result<Vec<SiblingEdit>, PipelineError> {
    let mut module = slot.lock()?;
    let mut rng = file_rng(seed, &slot.path, stage);
    let mut ctx = PassContext::new(&slot.path, index, &mut rng);
    pipeline::run(&mut *module, passes, &mut ctx)?;
    Ok(ctx.edits)
}
