//! Source-level breakpoints and their protocol bindings.
//!
//! Each user breakpoint gets an id from a monotonic counter. A record is
//! *bound* while the browser holds a matching protocol breakpoint and
//! *pending* otherwise: either its location did not resolve yet, or a
//! navigation discarded every protocol breakpoint.

use tracing::{debug, warn};

use crate::debug_info::DebugInfoDecoder;
use crate::error::GatewayError;
use crate::gateway::ProtocolGateway;
use crate::module::ModuleRegistry;
use crate::protocol::ProtocolBreakpointId;

/// A breakpoint as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// Stable id; `None` when the location was malformed.
    pub id: Option<u32>,
    /// Whether the browser currently holds this breakpoint.
    pub verified: bool,
    /// Source file.
    pub file: String,
    /// Line number (1-based).
    pub line: u32,
}

#[derive(Debug, Clone)]
struct BreakpointRecord {
    id: u32,
    file: String,
    line: u32,
    protocol_id: Option<ProtocolBreakpointId>,
}

impl BreakpointRecord {
    fn to_breakpoint(&self) -> Breakpoint {
        Breakpoint {
            id: Some(self.id),
            verified: self.protocol_id.is_some(),
            file: self.file.clone(),
            line: self.line,
        }
    }
}

/// Split `"file:line"` at the last `:`.
pub fn parse_location(location: &str) -> Option<(&str, u32)> {
    let (file, line) = location.rsplit_once(':')?;
    let line = line.trim().parse().ok()?;
    Some((file, line))
}

/// All user breakpoints of a session, in insertion order.
#[derive(Debug, Clone)]
pub struct BreakpointRegistry {
    records: Vec<BreakpointRecord>,
    next_id: u32,
}

impl Default for BreakpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every breakpoint in insertion order.
    pub fn all(&self) -> impl Iterator<Item = Breakpoint> + '_ {
        self.records.iter().map(BreakpointRecord::to_breakpoint)
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Set a breakpoint at `"file:line"`.
    ///
    /// Malformed locations yield an unverified breakpoint without an id.
    /// Locations no module maps yet are kept pending. Gateway failures
    /// propagate and leave no record behind.
    pub async fn set<G, D>(
        &mut self,
        location: &str,
        modules: &ModuleRegistry<D>,
        gateway: &mut G,
    ) -> Result<Breakpoint, GatewayError>
    where
        G: ProtocolGateway,
        D: DebugInfoDecoder,
    {
        let Some((file, line)) = parse_location(location) else {
            debug!(location, "malformed breakpoint location");
            return Ok(Breakpoint {
                id: None,
                verified: false,
                file: location.to_string(),
                line: 0,
            });
        };

        let protocol_id = match modules.address_for_source_location(file, line) {
            Some(address) => {
                let id = gateway.set_breakpoint(&address).await?;
                debug!(%address, "breakpoint bound");
                Some(id)
            }
            None => {
                debug!(file, line, "breakpoint pending: location not mapped");
                None
            }
        };

        let record = BreakpointRecord {
            id: self.allocate_id(),
            file: file.to_string(),
            line,
            protocol_id,
        };
        let bp = record.to_breakpoint();
        self.records.push(record);
        Ok(bp)
    }

    /// Remove the breakpoint with `id`.
    ///
    /// Local state is updated first; every bound record is then
    /// unregistered and the first gateway error is returned.
    pub async fn remove<G: ProtocolGateway>(
        &mut self,
        id: u32,
        gateway: &mut G,
    ) -> Result<(), GatewayError> {
        let removed = self.take(|r| r.id == id);
        unregister(removed, gateway).await
    }

    /// Remove every breakpoint in `file`.
    pub async fn remove_all<G: ProtocolGateway>(
        &mut self,
        file: &str,
        gateway: &mut G,
    ) -> Result<(), GatewayError> {
        let removed = self.take(|r| r.file == file);
        unregister(removed, gateway).await
    }

    fn take(&mut self, pred: impl Fn(&BreakpointRecord) -> bool) -> Vec<BreakpointRecord> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| pred(r));
        self.records = kept;
        removed
    }

    /// Breakpoints at exactly `"file:line"`, in insertion order.
    pub fn list(&self, location: &str) -> Vec<Breakpoint> {
        let Some((file, line)) = parse_location(location) else {
            return Vec::new();
        };
        self.records
            .iter()
            .filter(|r| r.file == file && r.line == line)
            .map(BreakpointRecord::to_breakpoint)
            .collect()
    }

    /// Forget every protocol binding, keeping the records as pending.
    pub fn invalidate_bindings(&mut self) {
        for record in &mut self.records {
            record.protocol_id = None;
        }
    }

    /// Bind every pending record whose location now resolves.
    ///
    /// Returns the number of records bound. All records are attempted; the
    /// first gateway error is returned after the pass.
    pub async fn bind_pending<G, D>(
        &mut self,
        modules: &ModuleRegistry<D>,
        gateway: &mut G,
    ) -> Result<usize, GatewayError>
    where
        G: ProtocolGateway,
        D: DebugInfoDecoder,
    {
        let mut bound = 0;
        let mut first_err = None;
        for record in self.records.iter_mut().filter(|r| r.protocol_id.is_none()) {
            let Some(address) = modules.address_for_source_location(&record.file, record.line)
            else {
                continue;
            };
            match gateway.set_breakpoint(&address).await {
                Ok(id) => {
                    debug!(id = record.id, %address, "pending breakpoint bound");
                    record.protocol_id = Some(id);
                    bound += 1;
                }
                Err(e) => {
                    warn!(id = record.id, "failed to bind breakpoint: {e}");
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(bound),
        }
    }
}

async fn unregister<G: ProtocolGateway>(
    removed: Vec<BreakpointRecord>,
    gateway: &mut G,
) -> Result<(), GatewayError> {
    let mut first_err = None;
    for protocol_id in removed.into_iter().filter_map(|r| r.protocol_id) {
        if let Err(e) = gateway.remove_breakpoint(&protocol_id).await {
            warn!(id = %protocol_id.0, "failed to remove breakpoint: {e}");
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{wasm_bytes, GatewayCall, MockDebugInfo, MockDecoder, MockGateway};
    use crate::protocol::ScriptId;

    fn modules() -> ModuleRegistry<MockDecoder> {
        let decoder = MockDecoder::new().with_module(
            &wasm_bytes(1),
            MockDebugInfo::new()
                .line(0x10, "main.c", 5)
                .line(0x20, "main.c", 6)
                .line(0x30, "util.c", 2),
        );
        let mut reg = ModuleRegistry::new(decoder);
        reg.register_module(ScriptId::new("7"), "main.wasm", &wasm_bytes(1));
        reg
    }

    fn set_calls(gateway: &MockGateway) -> usize {
        gateway.count(|c| matches!(c, GatewayCall::SetBreakpoint(_)))
    }

    fn remove_calls(gateway: &MockGateway) -> usize {
        gateway.count(|c| matches!(c, GatewayCall::RemoveBreakpoint(_)))
    }

    #[test]
    fn parse_location_splits_at_last_colon() {
        assert_eq!(parse_location("main.c:5"), Some(("main.c", 5)));
        assert_eq!(parse_location("C:/src/a.c:12"), Some(("C:/src/a.c", 12)));
        assert_eq!(parse_location("main.c"), None);
        assert_eq!(parse_location("main.c:five"), None);
    }

    #[tokio::test]
    async fn set_malformed_never_contacts_gateway() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        for location in ["main.c", "", "main.c:x"] {
            let bp = reg.set(location, &modules, &mut gateway).await.unwrap();
            assert!(!bp.verified);
            assert_eq!(bp.id, None);
        }
        assert_eq!(gateway.call_count(), 0);
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn set_resolved_location_binds() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        let bp = reg.set("main.c:5", &modules, &mut gateway).await.unwrap();
        assert!(bp.verified);
        assert_eq!(bp.id, Some(1));
        assert_eq!(bp.line, 5);
        assert_eq!(
            gateway.calls(),
            &[GatewayCall::SetBreakpoint(
                crate::protocol::ProtocolAddress::new(ScriptId::new("7"), 0x10)
            )]
        );
    }

    #[tokio::test]
    async fn set_unresolved_location_is_pending() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        let bp = reg.set("other.c:1", &modules, &mut gateway).await.unwrap();
        assert_eq!(bp.id, Some(1));
        assert!(!bp.verified);
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(reg.list("other.c:1"), vec![bp]);
    }

    #[tokio::test]
    async fn set_ids_strictly_increase() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        let mut last = 0;
        for location in ["main.c:5", "main.c:5", "util.c:2", "nowhere.c:1", "main.c:6"] {
            let id = reg
                .set(location, &modules, &mut gateway)
                .await
                .unwrap()
                .id
                .unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[tokio::test]
    async fn set_gateway_failure_stores_nothing() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        gateway.fail_requests(true);
        let mut reg = BreakpointRegistry::new();

        assert!(reg.set("main.c:5", &modules, &mut gateway).await.is_err());
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn remove_unregisters_bound_records() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        let a = reg.set("main.c:5", &modules, &mut gateway).await.unwrap();
        let b = reg.set("main.c:5", &modules, &mut gateway).await.unwrap();
        reg.remove(a.id.unwrap(), &mut gateway).await.unwrap();

        let left = reg.list("main.c:5");
        assert_eq!(left, vec![b]);
        assert_eq!(remove_calls(&gateway), 1);
    }

    #[tokio::test]
    async fn remove_pending_skips_gateway() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        let bp = reg.set("nowhere.c:3", &modules, &mut gateway).await.unwrap();
        reg.remove(bp.id.unwrap(), &mut gateway).await.unwrap();
        assert!(reg.is_empty());
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn remove_failure_keeps_local_removal() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        reg.set("main.c:5", &modules, &mut gateway).await.unwrap();
        reg.set("main.c:6", &modules, &mut gateway).await.unwrap();
        reg.set("util.c:2", &modules, &mut gateway).await.unwrap();
        gateway.fail_removal_of(ProtocolBreakpointId("bp-1:16".into()));

        let err = reg.remove_all("main.c", &mut gateway).await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { .. }));
        assert_eq!(remove_calls(&gateway), 2);
        assert_eq!(reg.len(), 1);
        assert!(reg.list("main.c:5").is_empty());
        assert!(reg.list("main.c:6").is_empty());
    }

    #[tokio::test]
    async fn list_is_idempotent_and_ordered() {
        let modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        reg.set("main.c:5", &modules, &mut gateway).await.unwrap();
        reg.set("main.c:6", &modules, &mut gateway).await.unwrap();
        reg.set("main.c:5", &modules, &mut gateway).await.unwrap();

        let first = reg.list("main.c:5");
        assert_eq!(first, reg.list("main.c:5"));
        let ids: Vec<_> = first.iter().map(|b| b.id.unwrap()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(first.iter().all(|b| b.verified));
        assert!(reg.list("main.c").is_empty());
    }

    #[tokio::test]
    async fn invalidate_then_bind_pending() {
        let mut modules = modules();
        let mut gateway = MockGateway::new();
        let mut reg = BreakpointRegistry::new();

        reg.set("main.c:5", &modules, &mut gateway).await.unwrap();
        reg.set("late.c:1", &modules, &mut gateway).await.unwrap();

        reg.invalidate_bindings();
        assert!(reg.all().all(|b| !b.verified));

        modules.reset();
        assert_eq!(reg.bind_pending(&modules, &mut gateway).await.unwrap(), 0);

        modules.register_module(ScriptId::new("8"), "main.wasm", &wasm_bytes(1));
        gateway.clear_calls();
        assert_eq!(reg.bind_pending(&modules, &mut gateway).await.unwrap(), 1);
        assert_eq!(set_calls(&gateway), 1);
        assert!(reg.list("main.c:5")[0].verified);
        assert!(!reg.list("late.c:1")[0].verified);

        // Already bound records are left alone.
        assert_eq!(reg.bind_pending(&modules, &mut gateway).await.unwrap(), 0);
        assert_eq!(set_calls(&gateway), 1);
    }
}
