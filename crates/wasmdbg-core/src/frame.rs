//! Source-mapped call frames of a paused session.

use std::fmt;

use tracing::{debug, warn};

use crate::debug_info::{DebugInfoDecoder, SourceLocation};
use crate::error::{GatewayError, StoreError};
use crate::gateway::ProtocolGateway;
use crate::module::ModuleRegistry;
use crate::protocol::{CallFrame, ProtocolAddress, Scope};
use crate::store::VariableStore;

/// Where a frame is executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLocation {
    /// Mapped through debug information.
    Source(SourceLocation),
    /// No module maps the address; the protocol's own location.
    Raw {
        url: String,
        line: u32,
        column: Option<u32>,
    },
}

impl fmt::Display for FrameLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameLocation::Source(loc) => write!(f, "{loc}"),
            FrameLocation::Raw {
                url,
                line,
                column: Some(col),
            } => write!(f, "{url}:{line}:{col}"),
            FrameLocation::Raw { url, line, .. } => write!(f, "{url}:{line}"),
        }
    }
}

/// Display data for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    pub index: usize,
    pub function_name: String,
    pub location: FrameLocation,
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} at {}",
            self.index, self.function_name, self.location
        )
    }
}

#[derive(Debug, Clone, Default)]
enum StoreSlot {
    #[default]
    Unbuilt,
    Ready(VariableStore),
    Unusable,
}

/// One frame of the paused call stack. Valid until the next resume.
#[derive(Debug, Clone)]
pub struct StackFrame {
    /// Position in the stack; 0 is innermost.
    pub index: usize,
    pub function_name: String,
    /// Script and byte offset of the current instruction.
    pub address: ProtocolAddress,
    pub location: FrameLocation,
    /// Protocol id used for evaluation on this frame.
    pub call_frame_id: String,
    pub scope_chain: Vec<Scope>,
    store: StoreSlot,
}

impl StackFrame {
    /// Map a protocol call frame through the registered modules.
    pub fn from_call_frame<D: DebugInfoDecoder>(
        index: usize,
        frame: CallFrame,
        modules: &ModuleRegistry<D>,
    ) -> Self {
        let address = frame.location.address();
        let location = match modules.location_for_address(&address) {
            Some(loc) => FrameLocation::Source(loc),
            None => FrameLocation::Raw {
                url: frame.url,
                line: frame.location.line_number,
                column: frame.location.column_number,
            },
        };
        Self {
            index,
            function_name: frame.function_name,
            address,
            location,
            call_frame_id: frame.call_frame_id,
            scope_chain: frame.scope_chain,
            store: StoreSlot::Unbuilt,
        }
    }

    /// Byte offset of the current instruction.
    pub fn instruction_address(&self) -> usize {
        self.address.offset
    }

    /// Mapped source location, if any.
    pub fn source(&self) -> Option<&SourceLocation> {
        match &self.location {
            FrameLocation::Source(loc) => Some(loc),
            FrameLocation::Raw { .. } => None,
        }
    }

    pub fn summary(&self) -> FrameSummary {
        FrameSummary {
            index: self.index,
            function_name: self.function_name.clone(),
            location: self.location.clone(),
        }
    }

    /// The frame's variable store, built on first use.
    ///
    /// Returns `Ok(None)` when the scope chain does not fit the expected
    /// shape; that outcome is cached. Gateway failures are returned and
    /// leave the store unbuilt.
    pub async fn variable_store<G: ProtocolGateway>(
        &mut self,
        gateway: &mut G,
    ) -> Result<Option<&VariableStore>, GatewayError> {
        if matches!(self.store, StoreSlot::Unbuilt) {
            self.store = match VariableStore::build(gateway, &self.scope_chain).await {
                Ok(store) => {
                    debug!(frame = self.index, "variable store ready");
                    StoreSlot::Ready(store)
                }
                Err(StoreError::Schema(e)) => {
                    warn!(frame = self.index, "no usable variable store: {e}");
                    StoreSlot::Unusable
                }
                Err(StoreError::Gateway(e)) => return Err(e),
            };
        }
        Ok(match &self.store {
            StoreSlot::Ready(store) => Some(store),
            _ => None,
        })
    }
}
