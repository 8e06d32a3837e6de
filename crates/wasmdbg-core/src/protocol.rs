//! Remote debugging protocol message types.
//!
//! The subset of the browser debugging protocol (Debugger and Runtime
//! domains) the session consumes, with serde Serialize/Deserialize
//! support so a transport can decode notifications straight into them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque script identifier assigned by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptId(pub String);

impl ScriptId {
    /// Create a script id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque breakpoint identifier assigned by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolBreakpointId(pub String);

/// A location inside a running module: script plus byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolAddress {
    /// Script owning the code.
    pub script_id: ScriptId,
    /// Byte offset into the module binary.
    pub offset: usize,
}

impl ProtocolAddress {
    /// Create a protocol address.
    pub fn new(script_id: ScriptId, offset: usize) -> Self {
        Self { script_id, offset }
    }

    /// Protocol location for this address.
    ///
    /// WebAssembly scripts are addressed with line 0 and the byte offset
    /// carried in the column. `None` when the offset does not fit the
    /// protocol's 32-bit column.
    pub fn to_location(&self) -> Option<Location> {
        let column = u32::try_from(self.offset).ok()?;
        Some(Location {
            script_id: self.script_id.clone(),
            line_number: 0,
            column_number: Some(column),
        })
    }
}

impl fmt::Display for ProtocolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.script_id, self.offset)
    }
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Language of a parsed script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptLanguage {
    /// Plain JavaScript.
    JavaScript,
    /// A WebAssembly module.
    WebAssembly,
}

/// Body of the `Debugger.scriptParsed` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsed {
    /// Identifier of the parsed script.
    pub script_id: ScriptId,
    /// URL the script was loaded from.
    #[serde(default)]
    pub url: String,
    /// Script language; absent means JavaScript.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_language: Option<ScriptLanguage>,
}

impl ScriptParsed {
    /// Whether this script is a WebAssembly module.
    pub fn is_wasm(&self) -> bool {
        self.script_language == Some(ScriptLanguage::WebAssembly)
    }
}

// ---------------------------------------------------------------------------
// Call frames and scopes
// ---------------------------------------------------------------------------

/// A location as reported by the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Script containing the location.
    pub script_id: ScriptId,
    /// Line number (0-based).
    pub line_number: u32,
    /// Column number (0-based); the byte offset for WebAssembly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

impl Location {
    /// Byte-offset address of this location.
    pub fn address(&self) -> ProtocolAddress {
        ProtocolAddress::new(
            self.script_id.clone(),
            self.column_number.unwrap_or(0) as usize,
        )
    }
}

/// Kind of a scope in a call frame's scope chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeType {
    Global,
    Local,
    With,
    Closure,
    Catch,
    Block,
    Script,
    Eval,
    Module,
    WasmExpressionStack,
    /// Any scope kind this crate does not know about.
    #[serde(other)]
    Other,
}

impl ScopeType {
    /// Protocol name of the scope type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Global => "global",
            ScopeType::Local => "local",
            ScopeType::With => "with",
            ScopeType::Closure => "closure",
            ScopeType::Catch => "catch",
            ScopeType::Block => "block",
            ScopeType::Script => "script",
            ScopeType::Eval => "eval",
            ScopeType::Module => "module",
            ScopeType::WasmExpressionStack => "wasm-expression-stack",
            ScopeType::Other => "other",
        }
    }
}

/// A scope object in a call frame's scope chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Scope kind.
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    /// Object whose properties are the scope's variables.
    pub object: RemoteObject,
    /// Optional scope name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A call frame from a `Debugger.paused` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Frame identifier, valid until the next resume.
    pub call_frame_id: String,
    /// Name of the executing function.
    #[serde(default)]
    pub function_name: String,
    /// Current location.
    pub location: Location,
    /// URL of the owning script.
    #[serde(default)]
    pub url: String,
    /// Scopes, innermost first.
    #[serde(default)]
    pub scope_chain: Vec<Scope>,
}

/// Body of the `Debugger.paused` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    /// Call stack, innermost frame first.
    pub call_frames: Vec<CallFrame>,
    /// Pause reason (e.g. "other", "exception").
    #[serde(default)]
    pub reason: String,
    /// Breakpoints hit at this location.
    #[serde(default)]
    pub hit_breakpoints: Vec<ProtocolBreakpointId>,
}

// ---------------------------------------------------------------------------
// Runtime objects
// ---------------------------------------------------------------------------

/// A mirror object referencing a value in the debuggee.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// Object type (e.g. "object", "number", "bigint", "i32").
    #[serde(rename = "type")]
    pub object_type: String,
    /// Object subtype hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Primitive value or JSON-serialized value when returned by value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Primitive values that JSON cannot carry (e.g. "5n", "NaN").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    /// String representation of the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Handle for property enumeration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

/// One property of a remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Property value, if it is a data property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<RemoteObject>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
