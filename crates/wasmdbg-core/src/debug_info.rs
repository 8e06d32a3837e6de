//! The debug-information seam.
//!
//! DWARF decoding lives outside this crate. A [`DebugInfoDecoder`] turns
//! module bytecode into a [`DebugInfo`] handle; the session only ever
//! queries handles through this trait.

use std::fmt;

use crate::error::DecodeError;
use crate::store::VariableStore;

/// A position in a source file as known to the debug information.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Source file path as recorded in the debug information.
    pub file: String,
    /// Line number (1-based).
    pub line: u32,
    /// Column number (1-based), when recorded.
    pub column: Option<u32>,
}

impl SourceLocation {
    /// Create a location without column information.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column: None,
        }
    }

    /// Attach a column.
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(col) => write!(f, "{}:{}:{}", self.file, self.line, col),
            None => write!(f, "{}:{}", self.file, self.line),
        }
    }
}

/// A variable visible at an address. Carries no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Variable name.
    pub name: String,
    /// Display name of the variable's type.
    pub type_name: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A resolved variable awaiting its backing memory.
pub trait VariableDescriptor {
    /// Linear-memory address of the value.
    fn address(&self) -> usize;

    /// Number of bytes backing the value.
    fn byte_size(&self) -> usize;

    /// Supply the bytes read from linear memory.
    fn set_memory_slice(&mut self, data: &[u8]);

    /// Type-aware rendering of the value, or `None` if it cannot be
    /// formatted.
    fn print(&self) -> Option<String>;
}

/// Queryable debug information of one module.
///
/// Offsets are byte offsets into the module binary, as used by the
/// protocol.
pub trait DebugInfo {
    /// Descriptor produced by [`resolve_variable`](Self::resolve_variable).
    type Descriptor: VariableDescriptor;

    /// Source position of the instruction at `offset`.
    fn location_for_address(&self, offset: usize) -> Option<SourceLocation>;

    /// First instruction offset attributed to `file:line`.
    fn address_for_location(&self, file: &str, line: u32) -> Option<usize>;

    /// Variables in scope at `offset`, in declaration order.
    fn variables_at(&self, offset: usize) -> Vec<Variable>;

    /// Globals of the compile unit enclosing `offset`.
    fn global_variables_at(&self, _offset: usize) -> Vec<Variable> {
        Vec::new()
    }

    /// Resolve `expr` at `offset` against a snapshot of the frame's
    /// runtime values.
    fn resolve_variable(
        &self,
        expr: &str,
        store: &VariableStore,
        offset: usize,
    ) -> Option<Self::Descriptor>;
}

/// Turns module bytecode into debug information.
pub trait DebugInfoDecoder {
    type Info: DebugInfo;

    fn decode(&self, bytecode: &[u8]) -> Result<Self::Info, DecodeError>;
}
