//! In-memory collaborators for tests and host-less experiments.
//!
//! [`MockGateway`] records every round-trip, [`MockDecoder`] hands out
//! scripted [`MockDebugInfo`] handles, and [`RecordingSink`] keeps every
//! stop notification.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use serde_json::json;

use crate::dap::StopReason;
use crate::debug_info::{
    DebugInfo, DebugInfoDecoder, SourceLocation, Variable, VariableDescriptor,
};
use crate::error::{DecodeError, GatewayError};
use crate::event::EventSink;
use crate::gateway::ProtocolGateway;
use crate::memory::MemoryRead;
use crate::protocol::{
    CallFrame, Location, PropertyDescriptor, ProtocolAddress, ProtocolBreakpointId,
    RemoteObject, Scope, ScopeType, ScriptId,
};
use crate::store::VariableStore;

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// A round-trip observed by [`MockGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ScriptSource(ScriptId),
    SetBreakpoint(ProtocolAddress),
    RemoveBreakpoint(ProtocolBreakpointId),
    Resume,
    StepOver,
    StepInto,
    StepOut,
    GetProperties(String),
    Evaluate {
        call_frame_id: String,
        expression: String,
    },
}

/// Recording gateway backed by in-memory scripts, objects and memory.
#[derive(Debug, Default)]
pub struct MockGateway {
    calls: Vec<GatewayCall>,
    scripts: HashMap<ScriptId, Vec<u8>>,
    properties: HashMap<String, Vec<PropertyDescriptor>>,
    memory: Vec<u8>,
    next_breakpoint: u32,
    failing_removals: HashSet<ProtocolBreakpointId>,
    fail_all: bool,
    fail_evaluations: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every round-trip issued so far, in order.
    pub fn calls(&self) -> &[GatewayCall] {
        &self.calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&GatewayCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Number of memory reads issued so far.
    pub fn memory_reads(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Evaluate { .. }))
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Serve `bytecode` for `script_id`.
    pub fn add_script(&mut self, script_id: &ScriptId, bytecode: Vec<u8>) {
        self.scripts.insert(script_id.clone(), bytecode);
    }

    /// Serve `props` for `object_id`.
    pub fn set_properties(&mut self, object_id: &str, props: Vec<PropertyDescriptor>) {
        self.properties.insert(object_id.to_string(), props);
    }

    /// Write `data` into linear memory at `address`, growing it as needed.
    pub fn write_memory(&mut self, address: usize, data: &[u8]) {
        let end = address + data.len();
        if self.memory.len() < end {
            self.memory.resize(end, 0);
        }
        self.memory[address..end].copy_from_slice(data);
    }

    /// Make removal of `id` fail.
    pub fn fail_removal_of(&mut self, id: ProtocolBreakpointId) {
        self.failing_removals.insert(id);
    }

    /// Make every subsequent request fail.
    pub fn fail_requests(&mut self, fail: bool) {
        self.fail_all = fail;
    }

    /// Make every subsequent `evaluate_on_call_frame` fail.
    pub fn fail_evaluations(&mut self, fail: bool) {
        self.fail_evaluations = fail;
    }

    fn check(&self) -> Result<(), GatewayError> {
        if self.fail_all {
            return Err(GatewayError::Transport("mock transport down".into()));
        }
        Ok(())
    }
}

impl ProtocolGateway for MockGateway {
    async fn script_source(&mut self, script_id: &ScriptId) -> Result<Vec<u8>, GatewayError> {
        self.calls.push(GatewayCall::ScriptSource(script_id.clone()));
        self.check()?;
        self.scripts
            .get(script_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                message: format!("No script for id: {script_id}"),
            })
    }

    async fn set_breakpoint(
        &mut self,
        address: &ProtocolAddress,
    ) -> Result<ProtocolBreakpointId, GatewayError> {
        self.calls.push(GatewayCall::SetBreakpoint(address.clone()));
        self.check()?;
        self.next_breakpoint += 1;
        Ok(ProtocolBreakpointId(format!(
            "bp-{}:{}",
            self.next_breakpoint, address.offset
        )))
    }

    async fn remove_breakpoint(&mut self, id: &ProtocolBreakpointId) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::RemoveBreakpoint(id.clone()));
        self.check()?;
        if self.failing_removals.contains(id) {
            return Err(GatewayError::Rejected {
                message: format!("breakpoint {} not found", id.0),
            });
        }
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::Resume);
        self.check()
    }

    async fn step_over(&mut self) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::StepOver);
        self.check()
    }

    async fn step_into(&mut self) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::StepInto);
        self.check()
    }

    async fn step_out(&mut self) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::StepOut);
        self.check()
    }

    async fn get_properties(
        &mut self,
        object_id: &str,
    ) -> Result<Vec<PropertyDescriptor>, GatewayError> {
        self.calls
            .push(GatewayCall::GetProperties(object_id.to_string()));
        self.check()?;
        self.properties
            .get(object_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                message: format!("Could not find object with given id: {object_id}"),
            })
    }

    async fn evaluate_on_call_frame(
        &mut self,
        call_frame_id: &str,
        expression: &str,
    ) -> Result<RemoteObject, GatewayError> {
        self.calls.push(GatewayCall::Evaluate {
            call_frame_id: call_frame_id.to_string(),
            expression: expression.to_string(),
        });
        self.check()?;
        if self.fail_evaluations {
            return Err(GatewayError::Rejected {
                message: "Cannot access memory of a detached frame".into(),
            });
        }
        let read = MemoryRead::parse(expression).ok_or_else(|| GatewayError::Rejected {
            message: format!("unsupported expression: {expression}"),
        })?;
        let start = read.address.min(self.memory.len());
        let end = (read.address + read.size).min(self.memory.len());
        Ok(RemoteObject {
            object_type: "object".into(),
            value: Some(json!(self.memory[start..end].to_vec())),
            ..Default::default()
        })
    }
}

/// Mirror a JSON primitive the way the protocol reports scope values.
///
/// The strings `NaN`, `Infinity`, `-Infinity` and `-0` become unserializable
/// numbers.
pub fn remote_value(value: &serde_json::Value) -> RemoteObject {
    if let Some(text @ ("NaN" | "Infinity" | "-Infinity" | "-0")) = value.as_str() {
        return RemoteObject {
            object_type: "number".into(),
            unserializable_value: Some(text.to_string()),
            description: Some(text.to_string()),
            ..Default::default()
        };
    }
    let object_type = match value {
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Bool(_) => "boolean",
        _ => "object",
    };
    RemoteObject {
        object_type: object_type.into(),
        value: Some(value.clone()),
        ..Default::default()
    }
}

fn indexed_properties(values: &[serde_json::Value]) -> Vec<PropertyDescriptor> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| PropertyDescriptor {
            name: i.to_string(),
            value: Some(remote_value(v)),
        })
        .collect()
}

fn scope_object(id: &str) -> RemoteObject {
    RemoteObject {
        object_type: "object".into(),
        object_id: Some(id.to_string()),
        ..Default::default()
    }
}

/// Register the objects of a WebAssembly frame's scope chain on `gateway`
/// and return the chain, ids prefixed with `frame`.
pub fn wasm_scope_chain(
    gateway: &mut MockGateway,
    frame: &str,
    stack: &[serde_json::Value],
    locals: &[serde_json::Value],
    globals: &[serde_json::Value],
) -> Vec<Scope> {
    let stack_id = format!("{frame}:stack");
    let local_id = format!("{frame}:locals");
    let module_id = format!("{frame}:module");
    let globals_id = format!("{frame}:globals");

    gateway.set_properties(&stack_id, indexed_properties(stack));
    gateway.set_properties(&local_id, indexed_properties(locals));
    gateway.set_properties(&globals_id, indexed_properties(globals));
    gateway.set_properties(
        &module_id,
        vec![
            PropertyDescriptor {
                name: "instance".into(),
                value: Some(scope_object(&format!("{frame}:instance"))),
            },
            PropertyDescriptor {
                name: "globals".into(),
                value: Some(scope_object(&globals_id)),
            },
        ],
    );

    vec![
        Scope {
            scope_type: ScopeType::WasmExpressionStack,
            object: scope_object(&stack_id),
            name: None,
        },
        Scope {
            scope_type: ScopeType::Local,
            object: scope_object(&local_id),
            name: None,
        },
        Scope {
            scope_type: ScopeType::Module,
            object: scope_object(&module_id),
            name: None,
        },
    ]
}

/// A call frame paused at `offset` inside `script`.
pub fn call_frame(
    id: &str,
    function_name: &str,
    script: &ScriptId,
    offset: u32,
    scope_chain: Vec<Scope>,
) -> CallFrame {
    CallFrame {
        call_frame_id: id.to_string(),
        function_name: function_name.to_string(),
        location: Location {
            script_id: script.clone(),
            line_number: 0,
            column_number: Some(offset),
        },
        url: format!("wasm://wasm/{script}"),
        scope_chain,
    }
}

// ---------------------------------------------------------------------------
// Debug information
// ---------------------------------------------------------------------------

/// Where a mock variable lives.
#[derive(Debug, Clone, PartialEq)]
pub enum MockPlacement {
    /// Fixed linear-memory address.
    Absolute(usize),
    /// Frame-base local plus offset, the usual shape for C stack variables.
    LocalRelative { local: usize, offset: usize },
}

/// A variable known to [`MockDebugInfo`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockVariable {
    pub variable: Variable,
    pub scope: Range<usize>,
    pub placement: MockPlacement,
    pub byte_size: usize,
}

/// Scripted debug information: a line table plus variables.
#[derive(Debug, Clone, Default)]
pub struct MockDebugInfo {
    lines: Vec<(usize, SourceLocation)>,
    variables: Vec<MockVariable>,
    globals: Vec<MockVariable>,
}

impl MockDebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line-table row; rows are kept sorted by offset.
    pub fn line(mut self, offset: usize, file: &str, line: u32) -> Self {
        self.lines.push((offset, SourceLocation::new(file, line)));
        self.lines.sort_by_key(|(o, _)| *o);
        self
    }

    /// Add a variable visible in `scope`.
    pub fn variable(
        mut self,
        name: &str,
        type_name: &str,
        scope: Range<usize>,
        placement: MockPlacement,
        byte_size: usize,
    ) -> Self {
        self.variables.push(MockVariable {
            variable: Variable::new(name, type_name),
            scope,
            placement,
            byte_size,
        });
        self
    }

    /// Add a compile-unit global at a fixed address.
    pub fn global(mut self, name: &str, type_name: &str, address: usize, byte_size: usize) -> Self {
        self.globals.push(MockVariable {
            variable: Variable::new(name, type_name),
            scope: 0..usize::MAX,
            placement: MockPlacement::Absolute(address),
            byte_size,
        });
        self
    }
}

impl DebugInfo for MockDebugInfo {
    type Descriptor = MockDescriptor;

    fn location_for_address(&self, offset: usize) -> Option<SourceLocation> {
        self.lines
            .iter()
            .take_while(|(o, _)| *o <= offset)
            .last()
            .map(|(_, loc)| loc.clone())
    }

    fn address_for_location(&self, file: &str, line: u32) -> Option<usize> {
        self.lines
            .iter()
            .find(|(_, loc)| loc.file == file && loc.line == line)
            .map(|(o, _)| *o)
    }

    fn variables_at(&self, offset: usize) -> Vec<Variable> {
        self.variables
            .iter()
            .filter(|v| v.scope.contains(&offset))
            .map(|v| v.variable.clone())
            .collect()
    }

    fn global_variables_at(&self, _offset: usize) -> Vec<Variable> {
        self.globals.iter().map(|v| v.variable.clone()).collect()
    }

    fn resolve_variable(
        &self,
        expr: &str,
        store: &VariableStore,
        offset: usize,
    ) -> Option<MockDescriptor> {
        let var = self
            .variables
            .iter()
            .find(|v| v.variable.name == expr && v.scope.contains(&offset))
            .or_else(|| self.globals.iter().find(|v| v.variable.name == expr))?;
        let address = match var.placement {
            MockPlacement::Absolute(addr) => addr,
            MockPlacement::LocalRelative { local, offset } => {
                store.local(local)?.as_address()? + offset
            }
        };
        Some(MockDescriptor {
            name: var.variable.name.clone(),
            type_name: var.variable.type_name.clone(),
            address,
            byte_size: var.byte_size,
            data: Vec::new(),
        })
    }
}

/// Descriptor produced by [`MockDebugInfo`]; prints little-endian integers.
#[derive(Debug, Clone, PartialEq)]
pub struct MockDescriptor {
    pub name: String,
    pub type_name: String,
    pub address: usize,
    pub byte_size: usize,
    data: Vec<u8>,
}

impl VariableDescriptor for MockDescriptor {
    fn address(&self) -> usize {
        self.address
    }

    fn byte_size(&self) -> usize {
        self.byte_size
    }

    fn set_memory_slice(&mut self, data: &[u8]) {
        self.data = data.to_vec();
    }

    fn print(&self) -> Option<String> {
        let value = match self.data.len() {
            0 => "{}".to_string(),
            1 => self.data[0].to_string(),
            2 => i16::from_le_bytes(self.data[..2].try_into().ok()?).to_string(),
            4 => i32::from_le_bytes(self.data[..4].try_into().ok()?).to_string(),
            8 => i64::from_le_bytes(self.data[..8].try_into().ok()?).to_string(),
            _ => return None,
        };
        Some(format!("{}: {} = {}", self.name, self.type_name, value))
    }
}

/// Decoder mapping exact bytecode to scripted debug information.
#[derive(Debug, Clone, Default)]
pub struct MockDecoder {
    modules: HashMap<Vec<u8>, MockDebugInfo>,
}

impl MockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytecode` as `info`.
    pub fn with_module(mut self, bytecode: &[u8], info: MockDebugInfo) -> Self {
        self.modules.insert(bytecode.to_vec(), info);
        self
    }
}

impl DebugInfoDecoder for MockDecoder {
    type Info = MockDebugInfo;

    fn decode(&self, bytecode: &[u8]) -> Result<MockDebugInfo, DecodeError> {
        if !bytecode.starts_with(b"\0asm") {
            return Err(DecodeError::Malformed("bad magic".into()));
        }
        self.modules
            .get(bytecode)
            .cloned()
            .ok_or(DecodeError::NoDebugInfo)
    }
}

// ---------------------------------------------------------------------------
// Event sink
// ---------------------------------------------------------------------------

/// Sink that keeps every stop notification.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub stops: Vec<(StopReason, i64)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn notify_stopped(&mut self, reason: StopReason, thread_id: i64) {
        self.stops.push((reason, thread_id));
    }
}

/// Build a module binary whose bytes are unique to `tag`.
pub fn wasm_bytes(tag: u8) -> Vec<u8> {
    vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, tag]
}
