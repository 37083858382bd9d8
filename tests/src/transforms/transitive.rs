use pyveil_core::ast::{Expr, Module, Stmt};
use pyveil_core::host::SourceCodec;
use pyveil_core::python::PythonHost;
use pyveil_tests::{execute, only, python};
use pyveil_transform::config::ObfuscatorConfig;
use pyveil_transform::obfuscator::obfuscate;
use std::fs;
use std::path::Path;

fn parse_output(host: &PythonHost, path: &Path) -> Module {
    host.parse(&fs::read_to_string(path).unwrap(), "out.py").unwrap()
}

fn transitive(mut config: ObfuscatorConfig, entry: &Path, out: &Path) -> ObfuscatorConfig {
    config.general.input = entry.to_path_buf();
    config.general.output = out.to_path_buf();
    config.general.transitive = true;
    config
}

#[tokio::test]
async fn renamed_function_is_renamed_at_call_sites() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("a.py"), "import b\n\nb.greet()\n").unwrap();
    fs::write(src.join("b.py"), "def greet():\n    print('hi')\n").unwrap();
    let out = dir.path().join("out");

    let mut config = only("renamer");
    config.renamer.rename_format = "fn{counter}".into();
    let result = obfuscate(&transitive(config, &src.join("a.py"), &out), host.clone(), None)
        .await
        .unwrap();
    assert_eq!(result.written.len(), 2);

    let b = parse_output(&host, &out.join("b.py"));
    let Stmt::FunctionDef(def) = &b.body[0] else {
        panic!("expected b.py to start with a function");
    };
    assert_ne!(def.name, "greet");
    assert!(def.name.starts_with("fn"));

    let a = parse_output(&host, &out.join("a.py"));
    let Stmt::Expr { value } = &a.body[1] else {
        panic!("expected the call statement");
    };
    assert_eq!(
        value.as_ref(),
        &Expr::call(Expr::attr(Expr::name("b"), def.name.as_str()), vec![])
    );
}

#[tokio::test]
async fn output_mirrors_the_package_layout() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("app");
    fs::create_dir_all(src.join("lib")).unwrap();
    fs::write(src.join("main.py"), "from lib import util\n\nprint(util.twice(4))\n").unwrap();
    fs::write(src.join("lib").join("__init__.py"), "").unwrap();
    fs::write(src.join("lib").join("util.py"), "def twice(n):\n    return n * 2\n").unwrap();
    let out = dir.path().join("out");

    let mut config = ObfuscatorConfig::default();
    config.dynamic_code.enabled = false;
    let result = obfuscate(&transitive(config, &src.join("main.py"), &out), host, None)
        .await
        .unwrap();
    assert_eq!(result.written.len(), 3);
    assert!(out.join("main.py").is_file());
    assert!(out.join("lib").join("__init__.py").is_file());
    assert!(out.join("lib").join("util.py").is_file());
}

#[ignore]
#[tokio::test]
async fn obfuscated_package_keeps_behavior() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("app");
    fs::create_dir_all(src.join("shapes")).unwrap();
    fs::write(
        src.join("main.py"),
        "from shapes import square\nimport helpers\n\n\
         s = square.Square(3)\nprint(s.area(), helpers.describe(s))\n",
    )
    .unwrap();
    fs::write(src.join("helpers.py"), "def describe(shape):\n    return f'square of side {shape.side}'\n").unwrap();
    fs::write(src.join("shapes").join("__init__.py"), "").unwrap();
    fs::write(
        src.join("shapes").join("square.py"),
        "class Square:\n    def __init__(self, side):\n        self.side = side\n\n    def area(self):\n        return self.side ** 2\n",
    )
    .unwrap();
    let out = dir.path().join("out");

    obfuscate(
        &transitive(ObfuscatorConfig::default(), &src.join("main.py"), &out),
        host,
        None,
    )
    .await
    .unwrap();
    let expected = execute(&src, &src.join("main.py"));
    let actual = execute(&out, &out.join("main.py"));
    assert!(actual.status.success(), "{}", String::from_utf8_lossy(&actual.stderr));
    assert_eq!(actual.stdout, expected.stdout);
}
