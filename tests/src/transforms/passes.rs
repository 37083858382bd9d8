use pyveil_core::host::{HostRuntime, SourceCodec};
use pyveil_tests::{execute, has_module, obfuscate_source, only, python, PASSES, SAMPLE};
use pyveil_transform::config::ObfuscatorConfig;
use std::fs;

#[tokio::test]
async fn every_pass_renders_parseable_source() {
    let Some(host) = python() else { return };
    for pass in PASSES {
        let dir = tempfile::tempdir().unwrap();
        let result = obfuscate_source(host.clone(), dir.path(), SAMPLE, only(pass))
            .await
            .unwrap_or_else(|e| panic!("{pass}: {e}"));
        assert_eq!(result.metadata.passes, [pass]);
        let text = fs::read_to_string(&result.written[0]).unwrap();
        host.parse(&text, "output.py")
            .unwrap_or_else(|e| panic!("{pass} emitted unparseable source: {e}"));
    }
}

#[tokio::test]
async fn same_seed_same_output() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    let mut config = ObfuscatorConfig::default();
    config.dynamic_code.enabled = false;

    let first = obfuscate_source(host.clone(), dir.path(), SAMPLE, config.clone())
        .await
        .unwrap();
    let second = obfuscate_source(host, dir.path(), SAMPLE, config).await.unwrap();
    assert_ne!(first.written, second.written);
    assert!(second.written[0].ends_with("output_0.py"));
    assert_eq!(
        fs::read_to_string(&first.written[0]).unwrap(),
        fs::read_to_string(&second.written[0]).unwrap()
    );
}

#[tokio::test]
async fn all_passes_disabled_reads_nothing() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    let mut config = only("none");
    config.general.input = dir.path().join("absent.py");
    config.general.output = dir.path().join("output.py");
    let result = pyveil_transform::obfuscator::obfuscate(&config, host, None)
        .await
        .unwrap();
    assert!(result.nothing_to_do());
    assert!(!dir.path().join("output.py").exists());
}

#[ignore]
#[tokio::test]
async fn every_pass_keeps_behavior() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("reference.py"), SAMPLE).unwrap();
    let expected = execute(dir.path(), &dir.path().join("reference.py"));
    assert!(expected.status.success());

    for pass in PASSES {
        let run = tempfile::tempdir().unwrap();
        let result = obfuscate_source(host.clone(), run.path(), SAMPLE, only(pass))
            .await
            .unwrap();
        let out = execute(run.path(), &result.written[0]);
        assert!(out.status.success(), "{pass}: {}", String::from_utf8_lossy(&out.stderr));
        assert_eq!(out.stdout, expected.stdout, "{pass} changed the output");
    }
}

#[ignore]
#[tokio::test]
async fn full_pipeline_keeps_behavior() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    let result = obfuscate_source(host, dir.path(), SAMPLE, ObfuscatorConfig::default())
        .await
        .unwrap();
    let expected = execute(dir.path(), &dir.path().join("input.py"));
    let out = execute(dir.path(), &result.written[0]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(out.stdout, expected.stdout);
}

#[ignore]
#[tokio::test]
async fn sealed_program_keeps_behavior() {
    let Some(host) = python() else { return };
    if !host.version().unwrap().at_least(3, 11) || !has_module("Crypto.Cipher") {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut config = ObfuscatorConfig::default();
    config.dynamic_code.encrypt = true;
    let result = obfuscate_source(host, dir.path(), SAMPLE, config).await.unwrap();

    let text = fs::read_to_string(&result.written[0]).unwrap();
    assert!(!text.contains("Account"));
    let expected = execute(dir.path(), &dir.path().join("input.py"));
    let out = execute(dir.path(), &result.written[0]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.ends_with(&expected.stdout));
}
