//! Replaces a module with loaders that rebuild its compiled form at run
//! time, optionally sealed under AES-GCM.
pub mod crypto;
pub mod loader;

use crate::{PassContext, Transform};
use loader::Loaders;
use pyveil_core::ast::*;
use pyveil_core::build;
use pyveil_core::host::HostRuntime;
use pyveil_utils::errors::TransformError;
use rand::rngs::StdRng;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Compiled units are emitted under this file name.
const FILENAME: &str = "";

pub struct DynamicCode {
    host: Arc<dyn HostRuntime>,
    pub encrypt: bool,
}

impl DynamicCode {
    pub fn new(host: Arc<dyn HostRuntime>, encrypt: bool) -> Self {
        Self { host, encrypt }
    }

    fn plain(&self, module: &Module, rng: &mut StdRng) -> Result<Module, TransformError> {
        let root = self.host.compile(module, FILENAME)?;
        let loaders = Loaders::every_unit(&root, rng);
        let entry = loaders
            .root_call()
            .ok_or_else(|| TransformError::Malformed("compiled module has no root".into()))?;

        let mut body = vec![build::function(crypto::DECOY, vec![Stmt::Pass])];
        body.extend(loaders.definitions(rng));
        body.push(Stmt::expr(Expr::call(Expr::name("exec"), vec![entry])));
        Ok(Module::new(body))
    }

    fn sealed(&self, module: &Module, rng: &mut StdRng) -> Result<Module, TransformError> {
        let root = self.host.compile(module, FILENAME)?;

        let decoy = crypto::decoy(rng);
        let decoy_module = self.host.compile(&Module::new(vec![decoy.clone()]), FILENAME)?;
        let decoy_unit = decoy_module
            .nested()
            .first()
            .copied()
            .ok_or_else(|| TransformError::Crypto("decoy compiled without a function".into()))?;
        let key = crypto::derive_key(decoy_unit)?;
        let sealed = crypto::seal(&key, &root.marshal, rng)?;
        debug!(
            nonce = %hex::encode(sealed.nonce),
            bytes = sealed.ciphertext.len(),
            "sealed compiled program"
        );

        let bootstrap = self.host.compile(&crypto::bootstrap(&sealed), FILENAME)?;
        let loaders = Loaders::root_only(&bootstrap, rng);
        let entry = loaders
            .root_call()
            .ok_or_else(|| TransformError::Malformed("bootstrap has no root".into()))?;

        let mut body = vec![decoy];
        body.extend(loaders.definitions(rng));
        body.push(Stmt::expr(Expr::call(Expr::name("exec"), vec![entry])));
        Ok(Module::new(body))
    }
}

impl fmt::Debug for DynamicCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCode")
            .field("encrypt", &self.encrypt)
            .finish_non_exhaustive()
    }
}

impl Transform for DynamicCode {
    fn name(&self) -> &'static str {
        "dynamic_code"
    }

    fn apply(&self, module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError> {
        let version = self.host.version()?;
        if !version.at_least(3, 11) {
            return Err(TransformError::Unsupported(format!(
                "rebuilding code objects needs Python 3.11 or newer, host is {version}"
            )));
        }
        let out = if self.encrypt {
            self.sealed(&module, &mut *ctx.rng)?
        } else {
            self.plain(&module, &mut *ctx.rng)?
        };
        debug!(
            path = %ctx.path.display(),
            encrypt = self.encrypt,
            statements = out.body.len(),
            "emitted loaders"
        );
        Ok(out)
    }
}
