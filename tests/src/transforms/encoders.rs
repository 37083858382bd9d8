use num_bigint::BigInt;
use pyveil_core::ast::{Expr, Module, Stmt};
use pyveil_core::build;
use pyveil_core::host::SourceCodec;
use pyveil_tests::{execute, python};
use pyveil_transform::int_encoder::EncodedInt;
use pyveil_transform::string_encoder::StringEncoder;
use pyveil_transform::{PassContext, Transform};
use rand::{rngs::StdRng, SeedableRng};
use std::fs;
use std::path::Path;

fn samples() -> Vec<BigInt> {
    let big: BigInt = "1".repeat(60).parse().unwrap();
    vec![
        BigInt::from(0),
        BigInt::from(1),
        BigInt::from(-1),
        BigInt::from(255),
        BigInt::from(-128),
        BigInt::from(u64::MAX) + 1u32,
        BigInt::from(-300_000_000_000i64),
        big.clone(),
        -big,
    ]
}

fn print(value: Expr) -> Stmt {
    Stmt::expr(Expr::call(Expr::name("print"), vec![value]))
}

#[test]
fn encoded_ints_decode_to_themselves() {
    let mut rng = StdRng::seed_from_u64(3);
    for v in samples() {
        assert_eq!(EncodedInt::encode(&v, &mut rng).decode(), Some(v));
    }
}

#[ignore]
#[test]
fn host_evaluates_encoded_ints() {
    let Some(host) = python() else { return };
    let mut rng = StdRng::seed_from_u64(9);
    let body = samples()
        .iter()
        .map(|v| print(EncodedInt::encode(v, &mut rng).to_expr()))
        .collect();
    let text = host.unparse(&Module::new(body)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("ints.py"), text).unwrap();
    let out = execute(dir.path(), &dir.path().join("ints.py"));
    let expected: String = samples().iter().map(|v| format!("{v}\n")).collect();
    assert_eq!(String::from_utf8_lossy(&out.stdout), expected);
}

#[ignore]
#[test]
fn host_decodes_encoded_literals() {
    let Some(host) = python() else { return };
    let every_byte: Vec<u8> = (0..=255).collect();
    let program = Module::new(vec![
        print(Expr::call(Expr::name("list"), vec![build::bytes_lit(every_byte)])),
        print(Expr::call(Expr::name("repr"), vec![build::str_lit("")])),
        print(build::bytes_lit(Vec::new())),
        print(build::str_lit("naïve ☃ text")),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let run = |name: &str, module: &Module| {
        let path = dir.path().join(name);
        fs::write(&path, host.unparse(module).unwrap()).unwrap();
        execute(dir.path(), &path).stdout
    };
    let expected = run("plain.py", &program);

    for compress in [false, true] {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = PassContext::single(Path::new("plain.py"), &mut rng);
        let encoded = StringEncoder { compress }
            .apply(program.clone(), &mut ctx)
            .unwrap();
        assert_ne!(encoded, program);
        assert_eq!(run("encoded.py", &encoded), expected, "compress={compress}");
    }
}
