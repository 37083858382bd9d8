use petgraph::algo::is_cyclic_directed;
use pyveil_core::deps::DependencyGraph;
use pyveil_tests::python;
use std::fs;

#[test]
fn cyclic_imports_close_once() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("x.py"), "import y\nimport json\n\ny.hello()\n").unwrap();
    fs::write(dir.path().join("y.py"), "def hello():\n    from x import json\n").unwrap();

    let graph = DependencyGraph::discover(&dir.path().join("x.py"), host.as_ref()).unwrap();
    let closure = graph.closure();
    assert_eq!(closure.len(), 2);
    assert!(closure[0].ends_with("x.py"));
    assert!(closure[1].ends_with("y.py"));
    assert!(is_cyclic_directed(&graph.graph));
}

#[test]
fn packages_relative_imports_and_foreign_modules() {
    let Some(host) = python() else { return };
    let dir = tempfile::tempdir().unwrap();
    let pkg = dir.path().join("pkg");
    fs::create_dir(&pkg).unwrap();
    fs::write(
        dir.path().join("main.py"),
        "import os, pkg.tools\nfrom pkg import extra as e\n",
    )
    .unwrap();
    fs::write(pkg.join("__init__.py"), "").unwrap();
    fs::write(pkg.join("tools.py"), "from .extra import VALUE\n").unwrap();
    fs::write(pkg.join("extra.py"), "VALUE = 1\n").unwrap();

    let graph = DependencyGraph::discover(&dir.path().join("main.py"), host.as_ref()).unwrap();
    let root = graph.entry().parent().unwrap().to_path_buf();
    let mut files: Vec<String> = graph
        .closure()
        .iter()
        .map(|p| p.strip_prefix(&root).unwrap().display().to_string())
        .collect();
    files.sort();
    assert_eq!(
        files,
        ["main.py", "pkg/__init__.py", "pkg/extra.py", "pkg/tools.py"]
    );
    assert!(!is_cyclic_directed(&graph.graph));
}
