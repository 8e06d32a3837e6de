//! Loaded WebAssembly modules and their debug information.

use tracing::{debug, warn};

use crate::debug_info::{DebugInfo, DebugInfoDecoder, SourceLocation, Variable};
use crate::protocol::{ProtocolAddress, ScriptId};
use crate::store::VariableStore;

type Descriptor<D> = <<D as DebugInfoDecoder>::Info as DebugInfo>::Descriptor;

/// A module with decoded debug information.
#[derive(Debug)]
pub struct Module<I> {
    /// Protocol script id.
    pub script_id: ScriptId,
    /// URL the module was loaded from.
    pub url: String,
    /// Decoded debug information.
    pub info: I,
}

/// Registry of every module loaded since the last navigation.
///
/// Address lookups go to the module that owns the address's script.
/// Source-location lookups scan modules in registration order and the
/// first match wins.
pub struct ModuleRegistry<D: DebugInfoDecoder> {
    decoder: D,
    modules: Vec<Module<D::Info>>,
}

impl<D: DebugInfoDecoder> ModuleRegistry<D> {
    /// Create an empty registry decoding with `decoder`.
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            modules: Vec::new(),
        }
    }

    /// Decode `bytecode` and register it under `script_id`.
    ///
    /// Returns `false` and registers nothing when decoding fails.
    pub fn register_module(&mut self, script_id: ScriptId, url: &str, bytecode: &[u8]) -> bool {
        match self.decoder.decode(bytecode) {
            Ok(info) => {
                debug!(script = %script_id, url, "registered module");
                self.modules.push(Module {
                    script_id,
                    url: url.to_string(),
                    info,
                });
                true
            }
            Err(e) => {
                warn!(script = %script_id, url, "skipping module: {e}");
                false
            }
        }
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Registered modules in registration order.
    pub fn modules(&self) -> &[Module<D::Info>] {
        &self.modules
    }

    /// Source location of `address`, via the module that owns its script.
    pub fn location_for_address(&self, address: &ProtocolAddress) -> Option<SourceLocation> {
        self.owner(&address.script_id)?
            .info
            .location_for_address(address.offset)
    }

    /// Protocol address of `file:line` in the first module that maps it.
    pub fn address_for_source_location(&self, file: &str, line: u32) -> Option<ProtocolAddress> {
        self.modules.iter().find_map(|m| {
            m.info
                .address_for_location(file, line)
                .map(|offset| ProtocolAddress::new(m.script_id.clone(), offset))
        })
    }

    /// Module that owns `script_id`.
    pub fn owner(&self, script_id: &ScriptId) -> Option<&Module<D::Info>> {
        self.modules.iter().find(|m| &m.script_id == script_id)
    }

    /// Variables in scope at `address`, from the module that owns its script.
    pub fn variables_at(&self, address: &ProtocolAddress) -> Option<Vec<Variable>> {
        let module = self.owner(&address.script_id)?;
        Some(module.info.variables_at(address.offset))
    }

    /// Globals visible at `address`, from the module that owns its script.
    pub fn global_variables_at(&self, address: &ProtocolAddress) -> Option<Vec<Variable>> {
        let module = self.owner(&address.script_id)?;
        Some(module.info.global_variables_at(address.offset))
    }

    /// Resolve `expr` at `address` in the module that owns its script.
    pub fn resolve_variable(
        &self,
        expr: &str,
        address: &ProtocolAddress,
        store: &VariableStore,
    ) -> Option<Descriptor<D>> {
        self.owner(&address.script_id)?
            .info
            .resolve_variable(expr, store, address.offset)
    }

    /// Drop every module.
    pub fn reset(&mut self) {
        debug!(count = self.modules.len(), "resetting module registry");
        self.modules.clear();
    }
}
