use crate::{PassContext, Transform};
use pyveil_core::ast::Module;
use pyveil_core::validate::check_module;
use pyveil_utils::errors::{PipelineError, TransformError};
use tracing::{info, warn};

/// Trait for running a sequence of obfuscation transforms on one file.
pub trait Pass {
    /// Applies `passes` in order. On failure `module` keeps the tree left by
    /// the last pass that succeeded.
    fn run(
        &self,
        module: &mut Module,
        passes: &[Box<dyn Transform>],
        ctx: &mut PassContext<'_>,
    ) -> Result<(), PipelineError>;
}

/// Default implementation of the Pass trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPass;

impl Pass for DefaultPass {
    fn run(
        &self,
        module: &mut Module,
        passes: &[Box<dyn Transform>],
        ctx: &mut PassContext<'_>,
    ) -> Result<(), PipelineError> {
        for pass in passes {
            let snapshot = module.clone();
            let queued = ctx.edits.len();

            let result = pass
                .apply(snapshot, ctx)
                .and_then(|out| check_module(&out).map(|()| out));
            match result {
                Ok(out) => {
                    info!("{:>18} ✓ {}", pass.name(), ctx.path.display());
                    *module = out;
                }
                Err(TransformError::Unsupported(reason)) => {
                    ctx.edits.truncate(queued);
                    warn!(pass = pass.name(), path = %ctx.path.display(), %reason, "pass skipped");
                }
                Err(source) => {
                    ctx.edits.truncate(queued);
                    info!("{:>18} × {}", pass.name(), ctx.path.display());
                    return Err(PipelineError::Pass {
                        pass: pass.name(),
                        path: ctx.path.display().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Convenience function to run the default pass.
pub fn run(
    module: &mut Module,
    passes: &[Box<dyn Transform>],
    ctx: &mut PassContext<'_>,
) -> Result<(), PipelineError> {
    DefaultPass.run(module, passes, ctx)
}

/// Splits the pipeline after every pass that edits sibling files, so those
/// edits land on every file before any later pass runs.
pub fn stages(passes: Vec<Box<dyn Transform>>) -> Vec<Vec<Box<dyn Transform>>> {
    let mut stages = Vec::new();
    let mut current = Vec::new();
    for pass in passes {
        let boundary = pass.edits_siblings();
        current.push(pass);
        if boundary {
            stages.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        stages.push(current);
    }
    stages
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::SiblingEdit;
    use pyveil_core::ast::{Expr, Stmt};
    use rand::{rngs::StdRng, SeedableRng};
    use std::path::{Path, PathBuf};

    /// Appends `name = 1`; fails or is unsupported on demand.
    pub(crate) struct Mark {
        pub(crate) name: &'static str,
        pub(crate) outcome: Outcome,
        pub(crate) siblings: bool,
    }

    #[derive(Clone, Copy)]
    pub(crate) enum Outcome {
        Ok,
        Unsupported,
        Fail,
        Malformed,
    }

    impl Mark {
        pub(crate) fn ok(name: &'static str) -> Box<dyn Transform> {
            Box::new(Self {
                name,
                outcome: Outcome::Ok,
                siblings: false,
            })
        }
    }

    impl Transform for Mark {
        fn name(&self) -> &'static str {
            self.name
        }

        fn edits_siblings(&self) -> bool {
            self.siblings
        }

        fn apply(&self, mut module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError> {
            ctx.edits
                .push(SiblingEdit::new(PathBuf::from("other.py"), Ok));
            match self.outcome {
                Outcome::Ok => {
                    module
                        .body
                        .push(Stmt::assign(self.name, pyveil_core::build::int_lit(1)));
                    Ok(module)
                }
                Outcome::Unsupported => Err(TransformError::Unsupported("old host".into())),
                Outcome::Fail => Err(TransformError::Generic("boom".into())),
                Outcome::Malformed => {
                    module.body.push(Stmt::Assign {
                        targets: vec![],
                        value: Box::new(pyveil_core::build::int_lit(1)),
                        type_comment: None,
                    });
                    Ok(module)
                }
            }
        }
    }

    fn marks(outcomes: &[(&'static str, Outcome)]) -> Vec<Box<dyn Transform>> {
        outcomes
            .iter()
            .map(|&(name, outcome)| {
                Box::new(Mark {
                    name,
                    outcome,
                    siblings: false,
                }) as Box<dyn Transform>
            })
            .collect()
    }

    fn assigned(module: &Module) -> Vec<String> {
        module
            .body
            .iter()
            .filter_map(|s| match s {
                Stmt::Assign { targets, .. } => match &targets[0] {
                    Expr::Name { id, .. } => Some(id.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    #[test]
    fn unsupported_passes_are_skipped() {
        let passes = marks(&[("a", Outcome::Ok), ("b", Outcome::Unsupported), ("c", Outcome::Ok)]);
        let mut module = Module::default();
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = PassContext::single(Path::new("m.py"), &mut rng);
        run(&mut module, &passes, &mut ctx).unwrap();
        assert_eq!(assigned(&module), ["a", "c"]);
        assert_eq!(ctx.edits.len(), 2);
    }

    #[test]
    fn failure_keeps_the_last_good_tree() {
        for bad in [Outcome::Fail, Outcome::Malformed] {
            let passes = marks(&[("a", Outcome::Ok), ("b", bad), ("c", Outcome::Ok)]);
            let mut module = Module::default();
            let mut rng = StdRng::seed_from_u64(0);
            let mut ctx = PassContext::single(Path::new("m.py"), &mut rng);
            let err = run(&mut module, &passes, &mut ctx).unwrap_err();
            assert!(matches!(err, PipelineError::Pass { pass: "b", .. }));
            assert_eq!(assigned(&module), ["a"]);
            assert_eq!(ctx.edits.len(), 1);
        }
    }

    #[test]
    fn stages_end_after_sibling_editors() {
        let passes: Vec<Box<dyn Transform>> = vec![
            Mark::ok("a"),
            Box::new(Mark {
                name: "r",
                outcome: Outcome::Ok,
                siblings: true,
            }),
            Mark::ok("b"),
            Mark::ok("c"),
        ];
        let names: Vec<Vec<&str>> = stages(passes)
            .iter()
            .map(|s| s.iter().map(|p| p.name()).collect())
            .collect();
        assert_eq!(names, vec![vec!["a", "r"], vec!["b", "c"]]);
    }
}
