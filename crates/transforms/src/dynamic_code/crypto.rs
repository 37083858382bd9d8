//! Sealing the serialized program under a key only the decoy function can
//! re-derive.
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use pyveil_core::ast::*;
use pyveil_core::build;
use pyveil_core::code::{CodeValue, CompiledUnit};
use pyveil_utils::errors::TransformError;
use rand::{rngs::StdRng, Rng};
use sha3::{Digest, Sha3_256};

use super::loader::random_name;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Name of the decoy function; loaders take the code type from it.
pub const DECOY: &str = "b";

/// AES-256-GCM output with the tag split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub tag: [u8; TAG_SIZE],
}

/// `def b(): print(...); <names> = <int>; ...` with 3 to 5 assignments of
/// 3 to 5 targets each.
pub fn decoy(rng: &mut StdRng) -> Stmt {
    let mut body = vec![Stmt::expr(Expr::call(
        Expr::name("print"),
        vec![build::str_lit("what'cha looking for?")],
    ))];
    for _ in 0..rng.random_range(3..=5) {
        let targets = (0..rng.random_range(3..=5))
            .map(|_| Expr::store(random_name(rng)))
            .collect();
        let value: u16 = rng.random();
        body.push(Stmt::Assign {
            targets,
            value: Box::new(build::int_lit(i64::from(value))),
            type_comment: None,
        });
    }
    build::function(DECOY, body)
}

/// `sha3_256("".join(map(repr, [co_code, *co_consts, *co_names, *co_varnames])))`
pub fn derive_key(decoy: &CompiledUnit) -> Result<[u8; 32], TransformError> {
    let mut text = Constant::Bytes(decoy.co_code.clone()).repr();
    for value in &decoy.co_consts {
        match value {
            CodeValue::Const(c) => text.push_str(&c.repr()),
            other => {
                return Err(TransformError::Crypto(format!(
                    "decoy constant {other:?} has no literal repr"
                )))
            }
        }
    }
    for name in decoy.co_names.iter().chain(&decoy.co_varnames) {
        text.push_str(&Constant::str(name.as_str()).repr());
    }
    Ok(Sha3_256::digest(text.as_bytes()).into())
}

pub fn seal(key: &[u8; 32], plaintext: &[u8], rng: &mut StdRng) -> Result<Sealed, TransformError> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| TransformError::Crypto(e.to_string()))?;
    let nonce: [u8; NONCE_SIZE] = rng.random();
    let mut ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| TransformError::Crypto(e.to_string()))?;
    let tag_at = ciphertext.len().saturating_sub(TAG_SIZE);
    let tag = ciphertext
        .split_off(tag_at)
        .try_into()
        .map_err(|_| TransformError::Crypto("ciphertext shorter than its tag".into()))?;
    Ok(Sealed {
        ciphertext,
        nonce,
        tag,
    })
}

/// Inverse of [`seal`].
pub fn open(key: &[u8; 32], sealed: &Sealed) -> Result<Vec<u8>, TransformError> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| TransformError::Crypto(e.to_string()))?;
    let mut payload = sealed.ciphertext.clone();
    payload.extend_from_slice(&sealed.tag);
    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), payload.as_slice())
        .map_err(|e| TransformError::Crypto(e.to_string()))
}

fn decoy_field(field: &str) -> Expr {
    Expr::attr(Expr::attr(Expr::name(DECOY), "__code__"), field)
}

/// The key derivation of [`derive_key`], as evaluated at run time against
/// the decoy actually defined in the program.
fn key_expr() -> Expr {
    let parts = build::list(vec![
        decoy_field("co_code"),
        build::starred(decoy_field("co_consts")),
        build::starred(decoy_field("co_names")),
        build::starred(decoy_field("co_varnames")),
    ]);
    let joined = build::method_call(
        build::str_lit(""),
        "join",
        vec![Expr::call(Expr::name("map"), vec![Expr::name("repr"), parts])],
    );
    let digest = build::method_call(
        build::import_module("hashlib"),
        "sha3_256",
        vec![build::method_call(joined, "encode", vec![build::str_lit("utf8")])],
    );
    build::method_call(digest, "digest", vec![])
}

/// `from Crypto.Cipher import AES` and one `exec` of the decrypted,
/// unmarshaled program.
pub fn bootstrap(sealed: &Sealed) -> Module {
    let cipher = Expr::Call {
        func: Box::new(Expr::attr(Expr::name("AES"), "new")),
        args: vec![key_expr(), Expr::attr(Expr::name("AES"), "MODE_GCM")],
        keywords: vec![Keyword {
            arg: Some("nonce".into()),
            value: build::bytes_lit(sealed.nonce.to_vec()),
        }],
    };
    let plaintext = build::method_call(
        cipher,
        "decrypt_and_verify",
        vec![
            build::bytes_lit(sealed.ciphertext.clone()),
            build::bytes_lit(sealed.tag.to_vec()),
        ],
    );
    let program = build::method_call(build::import_module("marshal"), "loads", vec![plaintext]);
    Module::new(vec![
        Stmt::ImportFrom {
            module: Some("Crypto.Cipher".into()),
            names: vec![Alias {
                name: "AES".into(),
                asname: None,
            }],
            level: 0,
        },
        Stmt::expr(Expr::call(Expr::name("exec"), vec![program])),
    ])
}
