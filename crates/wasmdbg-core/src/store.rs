//! Per-frame snapshot of WebAssembly runtime values.
//!
//! A paused WebAssembly frame exposes its operand stack, locals and module
//! globals as protocol scope objects. [`VariableStore::build`] reads them
//! through the gateway after checking the scope chain has the expected
//! shape:
//!
//! ```text
//!   wasm-expression-stack   -> stack values
//!   local                   -> local values
//!   module                  -> { globals: { ... } } -> global values
//! ```

use std::fmt;

use tracing::debug;

use crate::error::{SchemaMismatch, StoreError};
use crate::gateway::ProtocolGateway;
use crate::protocol::{RemoteObject, Scope, ScopeType};

/// A single WebAssembly value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WasmValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    V128(u128),
}

impl WasmValue {
    /// Convert a protocol value mirror into a wasm value.
    ///
    /// Accepts the explicit wasm type names (`i32`, `i64`, `f32`, `f64`,
    /// `v128`) as well as plain `number` and `bigint` values. Floats the
    /// protocol cannot put in JSON (`NaN`, `Infinity`, `-Infinity`, `-0`)
    /// are read from `unserializableValue`.
    pub fn from_remote(obj: &RemoteObject) -> Option<Self> {
        match obj.object_type.as_str() {
            "i32" => obj
                .value
                .as_ref()?
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(WasmValue::I32),
            "i64" | "bigint" => match obj.value.as_ref().and_then(|v| v.as_i64()) {
                Some(v) => Some(WasmValue::I64(v)),
                None => parse_bigint(obj).map(WasmValue::I64),
            },
            "f32" => float_value(obj).map(|v| WasmValue::F32(v as f32)),
            "f64" => float_value(obj).map(WasmValue::F64),
            "v128" => {
                let text = obj.value.as_ref()?.as_str()?;
                let hex = text.strip_prefix("0x").unwrap_or(text);
                u128::from_str_radix(hex, 16).ok().map(WasmValue::V128)
            }
            "number" => match obj
                .value
                .as_ref()
                .and_then(|v| v.as_i64())
                .and_then(|v| i32::try_from(v).ok())
            {
                Some(v) => Some(WasmValue::I32(v)),
                None => float_value(obj).map(WasmValue::F64),
            },
            _ => None,
        }
    }

    /// The value as a linear-memory address, if it is an integer.
    pub fn as_address(&self) -> Option<usize> {
        match *self {
            WasmValue::I32(v) => Some(v as u32 as usize),
            WasmValue::I64(v) => usize::try_from(v).ok(),
            _ => None,
        }
    }
}

fn float_value(obj: &RemoteObject) -> Option<f64> {
    if let Some(v) = obj.value.as_ref().and_then(|v| v.as_f64()) {
        return Some(v);
    }
    match obj.unserializable_value.as_deref()? {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "-0" => Some(-0.0),
        _ => None,
    }
}

fn parse_bigint(obj: &RemoteObject) -> Option<i64> {
    let text = obj
        .unserializable_value
        .as_deref()
        .or(obj.description.as_deref())?;
    text.trim_end_matches('n').parse().ok()
}

impl fmt::Display for WasmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmValue::I32(v) => write!(f, "i32 {v}"),
            WasmValue::I64(v) => write!(f, "i64 {v}"),
            WasmValue::F32(v) => write!(f, "f32 {v}"),
            WasmValue::F64(v) => write!(f, "f64 {v}"),
            WasmValue::V128(v) => write!(f, "v128 {v:#034x}"),
        }
    }
}

/// Stack, local and global values of one paused frame.
///
/// Slots whose protocol value has no wasm representation are kept as `None`
/// so that every other slot stays at its wasm index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    /// Operand stack, bottom first.
    pub stack_values: Vec<Option<WasmValue>>,
    /// Function locals, parameters first.
    pub local_values: Vec<Option<WasmValue>>,
    /// Module globals in index order.
    pub global_values: Vec<Option<WasmValue>>,
}

impl VariableStore {
    /// Local at `index`.
    pub fn local(&self, index: usize) -> Option<WasmValue> {
        self.local_values.get(index).copied().flatten()
    }

    /// Global at `index`.
    pub fn global(&self, index: usize) -> Option<WasmValue> {
        self.global_values.get(index).copied().flatten()
    }

    /// Operand stack slot at `index`, counted from the bottom.
    pub fn stack(&self, index: usize) -> Option<WasmValue> {
        self.stack_values.get(index).copied().flatten()
    }

    /// Read a frame's values through the gateway.
    pub async fn build<G: ProtocolGateway>(
        gateway: &mut G,
        scope_chain: &[Scope],
    ) -> Result<Self, StoreError> {
        let stack_scope = find_scope(scope_chain, ScopeType::WasmExpressionStack)?;
        let local_scope = find_scope(scope_chain, ScopeType::Local)?;
        let module_scope = find_scope(scope_chain, ScopeType::Module)?;

        let stack_values = read_values(gateway, &stack_scope.object, "stack").await?;
        let local_values = read_values(gateway, &local_scope.object, "locals").await?;

        let module_id = object_id(&module_scope.object, "module")?;
        let globals = gateway
            .get_properties(module_id)
            .await?
            .into_iter()
            .find(|p| p.name == "globals")
            .and_then(|p| p.value)
            .ok_or(SchemaMismatch::MissingGlobals)?;
        let global_values = read_values(gateway, &globals, "globals").await?;

        debug!(
            stack = stack_values.len(),
            locals = local_values.len(),
            globals = global_values.len(),
            "built variable store"
        );

        Ok(Self {
            stack_values,
            local_values,
            global_values,
        })
    }
}

/// The single scope of kind `kind` in the chain.
fn find_scope(chain: &[Scope], kind: ScopeType) -> Result<&Scope, SchemaMismatch> {
    let mut matches = chain.iter().filter(|s| s.scope_type == kind);
    let scope = matches
        .next()
        .ok_or_else(|| SchemaMismatch::MissingScope(kind.clone()))?;
    if matches.next().is_some() {
        return Err(SchemaMismatch::DuplicateScope(kind));
    }
    Ok(scope)
}

fn object_id<'a>(obj: &'a RemoteObject, what: &str) -> Result<&'a str, SchemaMismatch> {
    obj.object_id
        .as_deref()
        .ok_or_else(|| SchemaMismatch::NotEnumerable(what.to_string()))
}

async fn read_values<G: ProtocolGateway>(
    gateway: &mut G,
    obj: &RemoteObject,
    what: &str,
) -> Result<Vec<Option<WasmValue>>, StoreError> {
    let id = object_id(obj, what)?;
    let props = gateway.get_properties(id).await?;

    let values = props
        .iter()
        .map(|prop| {
            let value = prop.value.as_ref().and_then(WasmValue::from_remote);
            if value.is_none() {
                let kind = prop
                    .value
                    .as_ref()
                    .map_or("accessor", |v| v.object_type.as_str());
                debug!(scope = what, slot = %prop.name, kind, "skipping non-wasm slot");
            }
            value
        })
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockGateway};
    use serde_json::json;

    fn number(v: serde_json::Value) -> RemoteObject {
        RemoteObject {
            object_type: "number".into(),
            value: Some(v),
            ..Default::default()
        }
    }

    #[test]
    fn wasm_value_from_typed_objects() {
        let i32_obj = RemoteObject {
            object_type: "i32".into(),
            value: Some(json!(-7)),
            ..Default::default()
        };
        assert_eq!(WasmValue::from_remote(&i32_obj), Some(WasmValue::I32(-7)));

        let f64_obj = RemoteObject {
            object_type: "f64".into(),
            value: Some(json!(2.5)),
            ..Default::default()
        };
        assert_eq!(WasmValue::from_remote(&f64_obj), Some(WasmValue::F64(2.5)));

        let v128_obj = RemoteObject {
            object_type: "v128".into(),
            value: Some(json!("0xff")),
            ..Default::default()
        };
        assert_eq!(
            WasmValue::from_remote(&v128_obj),
            Some(WasmValue::V128(0xff))
        );
    }

    #[test]
    fn wasm_value_from_number_and_bigint() {
        assert_eq!(
            WasmValue::from_remote(&number(json!(1024))),
            Some(WasmValue::I32(1024))
        );
        assert_eq!(
            WasmValue::from_remote(&number(json!(0.5))),
            Some(WasmValue::F64(0.5))
        );

        let big = RemoteObject {
            object_type: "bigint".into(),
            unserializable_value: Some("9007199254740993n".into()),
            ..Default::default()
        };
        assert_eq!(
            WasmValue::from_remote(&big),
            Some(WasmValue::I64(9_007_199_254_740_993))
        );
    }

    #[test]
    fn wasm_value_from_unserializable_floats() {
        let special = |object_type: &str, text: &str| RemoteObject {
            object_type: object_type.into(),
            unserializable_value: Some(text.into()),
            description: Some(text.into()),
            ..Default::default()
        };

        assert!(matches!(
            WasmValue::from_remote(&special("number", "NaN")),
            Some(WasmValue::F64(v)) if v.is_nan()
        ));
        assert_eq!(
            WasmValue::from_remote(&special("number", "Infinity")),
            Some(WasmValue::F64(f64::INFINITY))
        );
        assert_eq!(
            WasmValue::from_remote(&special("f32", "-Infinity")),
            Some(WasmValue::F32(f32::NEG_INFINITY))
        );
        match WasmValue::from_remote(&special("f64", "-0")) {
            Some(WasmValue::F64(v)) => assert!(v == 0.0 && v.is_sign_negative()),
            other => panic!("expected -0, got {other:?}"),
        }
        assert_eq!(WasmValue::from_remote(&special("number", "bogus")), None);
    }

    #[test]
    fn wasm_value_rejects_objects() {
        let obj = RemoteObject {
            object_type: "object".into(),
            object_id: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(WasmValue::from_remote(&obj), None);
    }

    #[test]
    fn wasm_value_as_address() {
        assert_eq!(WasmValue::I32(-16).as_address(), Some(0xffff_fff0));
        assert_eq!(WasmValue::I64(64).as_address(), Some(64));
        assert_eq!(WasmValue::F32(1.0).as_address(), None);
    }

    #[tokio::test]
    async fn build_reads_all_three_scopes() {
        let mut gateway = MockGateway::new();
        let chain = mock::wasm_scope_chain(
            &mut gateway,
            "f0",
            &[json!(3)],
            &[json!(1024), json!(7)],
            &[json!(65536)],
        );

        let store = VariableStore::build(&mut gateway, &chain).await.unwrap();
        assert_eq!(store.stack_values, vec![Some(WasmValue::I32(3))]);
        assert_eq!(store.local(0), Some(WasmValue::I32(1024)));
        assert_eq!(store.local(1), Some(WasmValue::I32(7)));
        assert_eq!(store.global(0), Some(WasmValue::I32(65536)));
        assert_eq!(store.stack(1), None);
    }

    #[tokio::test]
    async fn build_rejects_missing_scope() {
        let mut gateway = MockGateway::new();
        let mut chain = mock::wasm_scope_chain(&mut gateway, "f0", &[], &[], &[]);
        chain.retain(|s| s.scope_type != ScopeType::Local);

        let err = VariableStore::build(&mut gateway, &chain)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Schema(SchemaMismatch::MissingScope(ScopeType::Local))
        ));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn build_rejects_duplicate_scope() {
        let mut gateway = MockGateway::new();
        let mut chain = mock::wasm_scope_chain(&mut gateway, "f0", &[], &[], &[]);
        let extra = chain[0].clone();
        chain.push(extra);

        let err = VariableStore::build(&mut gateway, &chain)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Schema(SchemaMismatch::DuplicateScope(_))
        ));
    }

    #[tokio::test]
    async fn build_rejects_module_without_globals() {
        let mut gateway = MockGateway::new();
        let chain = mock::wasm_scope_chain(&mut gateway, "f0", &[], &[], &[]);
        let module_id = chain
            .iter()
            .find(|s| s.scope_type == ScopeType::Module)
            .and_then(|s| s.object.object_id.clone())
            .unwrap();
        gateway.set_properties(&module_id, Vec::new());

        let err = VariableStore::build(&mut gateway, &chain)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Schema(SchemaMismatch::MissingGlobals)
        ));
    }

    #[tokio::test]
    async fn build_keeps_non_wasm_slots_in_place() {
        let mut gateway = MockGateway::new();
        let chain = mock::wasm_scope_chain(
            &mut gateway,
            "f0",
            &[json!("text")],
            &[json!({ "o": 1 }), json!(64)],
            &[],
        );

        let store = VariableStore::build(&mut gateway, &chain).await.unwrap();
        assert_eq!(store.stack_values, vec![None]);
        assert_eq!(store.stack(0), None);
        assert_eq!(store.local(0), None);
        assert_eq!(store.local(1), Some(WasmValue::I32(64)));
    }

    #[tokio::test]
    async fn build_keeps_indices_after_nan_local() {
        let mut gateway = MockGateway::new();
        let chain = mock::wasm_scope_chain(
            &mut gateway,
            "f0",
            &[],
            &[json!(1), json!("NaN"), json!(9)],
            &[],
        );

        let store = VariableStore::build(&mut gateway, &chain).await.unwrap();
        assert_eq!(store.local_values.len(), 3);
        assert!(matches!(store.local(1), Some(WasmValue::F64(v)) if v.is_nan()));
        assert_eq!(store.local(2), Some(WasmValue::I32(9)));
    }

    #[tokio::test]
    async fn build_propagates_gateway_failure() {
        let mut gateway = MockGateway::new();
        let chain = mock::wasm_scope_chain(&mut gateway, "f0", &[], &[], &[]);
        gateway.fail_requests(true);

        let err = VariableStore::build(&mut gateway, &chain)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Gateway(_)));
    }
}
