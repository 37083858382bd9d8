//! One obfuscation run, from a loaded configuration to written files.
use crate::config::ObfuscatorConfig;
use crate::orchestrator::{Orchestrator, Workspace};
use crate::progress::ProgressSink;
use pyveil_core::ast::Module;
use pyveil_core::deps::DependencyGraph;
use pyveil_core::host::{HostRuntime, SourceCodec};
use pyveil_utils::errors::{ConfigError, DependencyError, ObfuscateError, PipelineError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a run that got as far as writing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObfuscationResult {
    /// Files written, in closure order.
    pub written: Vec<PathBuf>,
    /// Input files that produced no output, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    pub metadata: ObfuscationMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObfuscationMetadata {
    /// Names of the enabled passes, in pipeline order.
    pub passes: Vec<String>,
    pub seed_used: u64,
    pub transitive: bool,
    /// Barrier-separated stages the pipeline was cut into.
    pub stages: usize,
}

impl ObfuscationResult {
    /// True when every pass was disabled and nothing was read or written.
    pub fn nothing_to_do(&self) -> bool {
        self.metadata.passes.is_empty()
    }
}

/// Runs the configured pipeline and writes its output.
///
/// Single-file mode fails with the file's own error. Transitive mode writes
/// every file that survived and reports the rest as
/// [`ObfuscateError::Partial`].
pub async fn obfuscate<H>(
    config: &ObfuscatorConfig,
    host: Arc<H>,
    progress: Option<Arc<dyn ProgressSink>>,
) -> Result<ObfuscationResult, ObfuscateError>
where
    H: SourceCodec + HostRuntime + 'static,
{
    let general = &config.general;
    let passes = config.build_passes(host.clone())?;
    let mut result = ObfuscationResult {
        metadata: ObfuscationMetadata {
            passes: passes.iter().map(|p| p.name().to_owned()).collect(),
            seed_used: general.seed,
            transitive: general.transitive,
            stages: 0,
        },
        ..Default::default()
    };
    if passes.is_empty() {
        info!("nothing to do, every pass is disabled");
        return Ok(result);
    }
    debug!(passes = ?result.metadata.passes, seed = general.seed, "pipeline built");

    let (workspace, placement) = if general.transitive {
        load_closure(&general.input, &general.output, host.as_ref())?
    } else {
        load_single(&general.input, &general.output, host.as_ref())?
    };
    info!(files = workspace.len(), "obfuscating");

    let mut orchestrator = Orchestrator::new(passes, general.seed, general.workers);
    if let Some(progress) = progress {
        orchestrator = orchestrator.with_progress(progress);
    }
    result.metadata.stages = orchestrator.stage_count();
    orchestrator.run(&workspace).await;

    let mut errors = Vec::new();
    for (path, tree) in workspace.into_results() {
        let target = placement.target(&path);
        match tree.and_then(|module| render(host.as_ref(), &path, &module)) {
            Ok(text) => {
                write_output(&target, &text)?;
                info!(input = %path.display(), output = %target.display(), "written");
                result.written.push(target);
            }
            Err(e) => {
                warn!(input = %path.display(), error = %e, "no output written");
                result.failed.push((path, e.to_string()));
                errors.push(e);
            }
        }
    }

    match placement {
        Placement::Single(_) => match errors.pop() {
            Some(e) => Err(e.into()),
            None => Ok(result),
        },
        Placement::Mirror { .. } if !result.failed.is_empty() => Err(ObfuscateError::Partial {
            failed: result.failed.len(),
            total: result.failed.len() + result.written.len(),
        }),
        Placement::Mirror { .. } => Ok(result),
    }
}

/// Where each input's output goes.
#[derive(Debug)]
enum Placement {
    Single(PathBuf),
    Mirror { common: PathBuf, output: PathBuf },
}

impl Placement {
    fn target(&self, input: &Path) -> PathBuf {
        match self {
            Self::Single(target) => target.clone(),
            Self::Mirror { common, output } => match input.strip_prefix(common) {
                Ok(relative) => output.join(relative),
                Err(_) => output.join(input.file_name().unwrap_or(input.as_os_str())),
            },
        }
    }
}

fn load_single(
    input: &Path,
    output: &Path,
    codec: &dyn SourceCodec,
) -> Result<(Workspace, Placement), ObfuscateError> {
    if !input.is_file() {
        return Err(DependencyError::NotFound(input.display().to_string()).into());
    }
    let target = single_output_path(input, output);
    if target != output {
        info!(output = %target.display(), "output path taken, using an alternative");
    }
    let path = input.canonicalize()?;
    let source = std::fs::read_to_string(&path)?;
    let module = codec.parse(&source, &path.display().to_string())?;
    Ok((Workspace::single(path, module), Placement::Single(target)))
}

fn load_closure(
    input: &Path,
    output: &Path,
    codec: &dyn SourceCodec,
) -> Result<(Workspace, Placement), ObfuscateError> {
    if output.exists() && !output.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "transitive mode needs an output directory, '{}' is a file",
            output.display()
        ))
        .into());
    }
    let graph = DependencyGraph::discover(input, codec)?;
    let root = graph
        .entry()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let files = graph.into_modules();
    let common = common_dir(files.iter().map(|(p, _)| p.as_path()));
    debug!(files = files.len(), common = %common.display(), "closure loaded");
    Ok((
        Workspace::new(root, files),
        Placement::Mirror {
            common,
            output: output.to_path_buf(),
        },
    ))
}

fn render(codec: &dyn SourceCodec, path: &Path, module: &Module) -> Result<String, PipelineError> {
    codec.unparse(module).map_err(|source| PipelineError::Render {
        path: path.display().to_string(),
        source,
    })
}

fn write_output(target: &Path, text: &str) -> Result<(), ObfuscateError> {
    if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(target, text)?;
    Ok(())
}

/// Output path of a single-file run. A directory output gets the input's
/// file name; an existing file is never overwritten, `stem_0.py`,
/// `stem_1.py`, ... are tried instead.
pub fn single_output_path(input: &Path, output: &Path) -> PathBuf {
    let mut target = output.to_path_buf();
    if target.is_dir() {
        if let Some(name) = input.file_name() {
            target.push(name);
        }
    }
    if !target.exists() {
        return target;
    }
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = target.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut attempt = 0usize;
    loop {
        let candidate = dir.join(format!("{stem}_{attempt}.py"));
        if !candidate.exists() {
            return candidate;
        }
        attempt += 1;
    }
}

/// Deepest directory containing every one of `files`.
pub fn common_dir<'a>(files: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    let mut common: Option<PathBuf> = None;
    for file in files {
        let dir = file.parent().unwrap_or(file);
        common = Some(match common {
            None => dir.to_path_buf(),
            Some(prefix) => prefix
                .components()
                .zip(dir.components())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyveil_core::ast::{Alias, Stmt};
    use pyveil_core::code::CompiledUnit;
    use pyveil_core::host::HostVersion;
    use pyveil_utils::errors::HostError;
    use std::fs;

    /// Reads `import` lines and the word `fail`; renders imports back and
    /// refuses to render `fail`.
    struct LineHost;

    impl SourceCodec for LineHost {
        fn parse(&self, source: &str, _path: &str) -> Result<Module, HostError> {
            let body = source
                .lines()
                .filter_map(|line| match line.strip_prefix("import ") {
                    Some(name) => Some(Stmt::Import {
                        names: vec![Alias {
                            name: name.trim().to_owned(),
                            asname: None,
                        }],
                    }),
                    None if line.trim() == "fail" => Some(Stmt::Pass),
                    None => None,
                })
                .collect();
            Ok(Module::new(body))
        }

        fn unparse(&self, module: &Module) -> Result<String, HostError> {
            let mut text = String::new();
            for stmt in &module.body {
                match stmt {
                    Stmt::Import { names } => {
                        text.push_str(&format!("import {}\n", names[0].name));
                    }
                    _ => return Err(HostError::Render("cannot render".into())),
                }
            }
            Ok(text)
        }
    }

    impl HostRuntime for LineHost {
        fn version(&self) -> Result<HostVersion, HostError> {
            Ok(HostVersion::new(3, 12, 0))
        }

        fn compile(&self, _module: &Module, _filename: &str) -> Result<CompiledUnit, HostError> {
            Err(HostError::Compile("no compiler".into()))
        }
    }

    /// Only the f-string pass, which leaves these trees alone.
    fn config(input: PathBuf, output: PathBuf, transitive: bool) -> ObfuscatorConfig {
        let mut config = ObfuscatorConfig::default();
        config.general.input = input;
        config.general.output = output;
        config.general.transitive = transitive;
        config.renamer.enabled = false;
        config.int_encoder.enabled = false;
        config.string_encoder.enabled = false;
        config.attr_assign.enabled = false;
        config.collector.enabled = false;
        config.dynamic_code.enabled = false;
        config
    }

    #[test]
    fn single_output_names() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.py");
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        assert_eq!(single_output_path(&input, &out), out.join("app.py"));
        fs::write(out.join("app.py"), "").unwrap();
        assert_eq!(single_output_path(&input, &out), out.join("app_0.py"));
        fs::write(out.join("app_0.py"), "").unwrap();
        assert_eq!(single_output_path(&input, &out), out.join("app_1.py"));

        let file = dir.path().join("result.py");
        assert_eq!(single_output_path(&input, &file), file);
    }

    #[test]
    fn common_dir_of_a_closure() {
        let files = [
            Path::new("/w/app/main.py"),
            Path::new("/w/app/pkg/util.py"),
            Path::new("/w/lib/extra.py"),
        ];
        assert_eq!(common_dir(files), PathBuf::from("/w"));
        assert_eq!(common_dir([Path::new("/w/app/main.py")]), PathBuf::from("/w/app"));
    }

    #[tokio::test]
    async fn nothing_to_do_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.py");
        let mut config = config(dir.path().join("missing.py"), output.clone(), false);
        config.fstring_to_format.enabled = false;

        let result = obfuscate(&config, Arc::new(LineHost), None).await.unwrap();
        assert!(result.nothing_to_do());
        assert!(result.written.is_empty());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn single_file_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.py");
        fs::write(&input, "import os\n").unwrap();
        let output = dir.path().join("out.py");
        fs::write(&output, "keep").unwrap();

        let config = config(input, output.clone(), false);
        let result = obfuscate(&config, Arc::new(LineHost), None).await.unwrap();
        assert_eq!(result.written, [dir.path().join("out_0.py")]);
        assert_eq!(fs::read_to_string(&output).unwrap(), "keep");
        assert_eq!(fs::read_to_string(&result.written[0]).unwrap(), "import os\n");
    }

    #[tokio::test]
    async fn render_failure_writes_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.py");
        fs::write(&input, "fail\n").unwrap();
        let output = dir.path().join("out.py");

        let config = config(input, output.clone(), false);
        let err = obfuscate(&config, Arc::new(LineHost), None).await.unwrap_err();
        assert!(matches!(
            err,
            ObfuscateError::Pipeline(PipelineError::Render { .. })
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn transitive_mirrors_the_closure() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("pkg")).unwrap();
        fs::write(src.join("main.py"), "import pkg.util\n").unwrap();
        fs::write(src.join("pkg").join("__init__.py"), "").unwrap();
        fs::write(src.join("pkg").join("util.py"), "import os\n").unwrap();
        let out = dir.path().join("out");

        let config = config(src.join("main.py"), out.clone(), true);
        let result = obfuscate(&config, Arc::new(LineHost), None).await.unwrap();
        assert_eq!(result.written.len(), 3);
        assert_eq!(
            fs::read_to_string(out.join("main.py")).unwrap(),
            "import pkg.util\n"
        );
        assert!(out.join("pkg").join("__init__.py").is_file());
        assert!(out.join("pkg").join("util.py").is_file());
    }

    #[tokio::test]
    async fn transitive_failures_are_partial() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.py"), "import util\n").unwrap();
        fs::write(dir.path().join("util.py"), "fail\n").unwrap();
        let out = dir.path().join("out");

        let config = config(dir.path().join("main.py"), out.clone(), true);
        let err = obfuscate(&config, Arc::new(LineHost), None).await.unwrap_err();
        assert!(matches!(err, ObfuscateError::Partial { failed: 1, total: 2 }));
        assert!(out.join("main.py").is_file());
        assert!(!out.join("util.py").exists());
    }
}
