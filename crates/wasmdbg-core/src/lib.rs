//! wasmdbg-core: source-level debugging of WebAssembly in the browser.
//!
//! This crate maps between the browser debugging protocol's view of a
//! paused module (script ids, byte offsets, scope objects) and the source
//! view provided by debug information (files, lines, typed variables). It
//! owns the session state machine, breakpoints, loaded modules and the
//! per-frame variable pipeline. Transport and DWARF decoding are supplied
//! by the host through [`ProtocolGateway`] and [`DebugInfoDecoder`].

pub mod breakpoint;
pub mod dap;
pub mod debug_info;
pub mod error;
pub mod event;
pub mod frame;
pub mod gateway;
pub mod logging;
pub mod memory;
pub mod mock;
pub mod module;
pub mod protocol;
pub mod session;
pub mod source;
pub mod store;

// Re-export key types for convenience.
pub use breakpoint::{Breakpoint, BreakpointRegistry};
pub use dap::{StopReason, StoppedEventBody};
pub use debug_info::{DebugInfo, DebugInfoDecoder, SourceLocation, Variable, VariableDescriptor};
pub use error::{DebugError, DecodeError, GatewayError, SchemaMismatch, StoreError};
pub use event::{ChannelSink, EventSink};
pub use frame::{FrameLocation, FrameSummary, StackFrame};
pub use gateway::{event_channel, EventReceiver, EventSender, GatewayEvent, ProtocolGateway};
pub use module::ModuleRegistry;
pub use protocol::{ProtocolAddress, ScriptId};
pub use session::{Mode, Reply, Session};
pub use source::SourceWindow;
pub use store::{VariableStore, WasmValue};
pub use wasmdbg_config::{ConfigError, ConfigSources, LogConfig, SessionConfig};
