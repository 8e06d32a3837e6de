//! Debug session state machine.
//!
//! A [`Session`] is either running or paused. Protocol notifications drive
//! every transition; user commands only read the paused state or forward
//! requests to the gateway.
//!
//! ```text
//!            paused (frames > 0)
//!   Running ---------------------> Paused{frames, focused}
//!      ^                               |
//!      +------ resumed / navigated ----+
//! ```

use tracing::{debug, info, warn};
use wasmdbg_config::{load_config, Config, ConfigError, ConfigSources, LogConfig, SessionConfig};

use crate::breakpoint::{Breakpoint, BreakpointRegistry};
use crate::dap::StopReason;
use crate::debug_info::{DebugInfoDecoder, Variable, VariableDescriptor};
use crate::error::DebugError;
use crate::event::EventSink;
use crate::frame::{FrameSummary, StackFrame};
use crate::gateway::{EventReceiver, GatewayEvent, ProtocolGateway};
use crate::memory::MemoryRead;
use crate::module::ModuleRegistry;
use crate::protocol::{PausedEvent, ScriptParsed};
use crate::source::{self, SourceWindow};

/// Outcome of a command that depends on the paused state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    /// The command produced a value.
    Value(T),
    /// The session is running; nothing was done.
    NotPaused,
    /// The requested data does not exist for the current frame.
    NotAvailable(String),
}

impl<T> Reply<T> {
    /// The value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            Reply::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_not_paused(&self) -> bool {
        matches!(self, Reply::NotPaused)
    }

    pub fn is_not_available(&self) -> bool {
        matches!(self, Reply::NotAvailable(_))
    }
}

/// State held while the debuggee is paused.
#[derive(Debug)]
pub struct PausedState {
    frames: Vec<StackFrame>,
    focused: usize,
}

impl PausedState {
    /// Frames, innermost first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Index of the focused frame.
    pub fn focused(&self) -> usize {
        self.focused
    }

    fn focused_frame(&self) -> &StackFrame {
        &self.frames[self.focused]
    }
}

/// Current execution mode.
#[derive(Debug, Default)]
pub enum Mode {
    #[default]
    Running,
    Paused(PausedState),
}

/// A debug session over one browser target.
pub struct Session<G, D: DebugInfoDecoder, S> {
    gateway: G,
    modules: ModuleRegistry<D>,
    breakpoints: BreakpointRegistry,
    sink: S,
    config: SessionConfig,
    mode: Mode,
    stepping: bool,
}

fn not_paused<T>(command: &str) -> Reply<T> {
    warn!(command, "debugger not paused");
    Reply::NotPaused
}

fn not_available<T>(what: impl Into<String>) -> Reply<T> {
    let what = what.into();
    info!("{what}: not available");
    Reply::NotAvailable(what)
}

/// Classify a pause for the `stopped` notification.
pub fn stop_reason(event: &PausedEvent, stepping: bool) -> StopReason {
    if !event.hit_breakpoints.is_empty() {
        StopReason::Breakpoint
    } else if matches!(event.reason.as_str(), "exception" | "promiseRejection") {
        StopReason::Exception
    } else if stepping {
        StopReason::Step
    } else {
        StopReason::Pause
    }
}

impl<G, D, S> Session<G, D, S>
where
    G: ProtocolGateway,
    D: DebugInfoDecoder,
    S: EventSink,
{
    /// Create a running session.
    pub fn new(gateway: G, decoder: D, sink: S, config: SessionConfig) -> Self {
        Self {
            gateway,
            modules: ModuleRegistry::new(decoder),
            breakpoints: BreakpointRegistry::new(),
            sink,
            config,
            mode: Mode::Running,
            stepping: false,
        }
    }

    /// Load configuration from `sources` and create a running session with
    /// its `[session]` table. The `[log]` table is handed back for
    /// [`init_tracing`](crate::logging::init_tracing).
    pub fn from_sources(
        gateway: G,
        decoder: D,
        sink: S,
        sources: &ConfigSources,
    ) -> Result<(Self, LogConfig), ConfigError> {
        let Config { log, session } = load_config(sources)?;
        debug!(
            context = session.source_context_lines,
            roots = session.source_roots.len(),
            "session configured"
        );
        Ok((Self::new(gateway, decoder, sink, session), log))
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.mode, Mode::Paused(_))
    }

    pub fn modules(&self) -> &ModuleRegistry<D> {
        &self.modules
    }

    pub fn breakpoints(&self) -> &BreakpointRegistry {
        &self.breakpoints
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Apply one protocol notification.
    pub async fn handle_event(&mut self, event: GatewayEvent) -> Result<(), DebugError> {
        match event {
            GatewayEvent::ScriptParsed(script) => self.on_script_parsed(script).await,
            GatewayEvent::Paused(paused) => {
                self.on_paused(paused);
                Ok(())
            }
            GatewayEvent::Resumed => {
                if self.is_paused() {
                    debug!("resumed");
                }
                self.mode = Mode::Running;
                Ok(())
            }
            GatewayEvent::Navigated => {
                self.on_navigated();
                Ok(())
            }
        }
    }

    /// Apply every notification already queued on `rx`, in order.
    ///
    /// Failures are logged and do not stop the drain. Returns the number of
    /// notifications applied.
    pub async fn drain_events(&mut self, rx: &mut EventReceiver) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            if let Err(e) = self.handle_event(event).await {
                warn!("event handling failed: {e}");
            }
            applied += 1;
        }
        applied
    }

    async fn on_script_parsed(&mut self, script: ScriptParsed) -> Result<(), DebugError> {
        if !script.is_wasm() {
            return Ok(());
        }
        let bytecode = self.gateway.script_source(&script.script_id).await?;
        debug!(script = %script.script_id, bytes = bytecode.len(), "fetched module");
        if self
            .modules
            .register_module(script.script_id, &script.url, &bytecode)
        {
            let bound = self
                .breakpoints
                .bind_pending(&self.modules, &mut self.gateway)
                .await?;
            if bound > 0 {
                info!(bound, "bound pending breakpoints");
            }
        }
        Ok(())
    }

    fn on_paused(&mut self, event: PausedEvent) {
        if event.call_frames.is_empty() {
            debug!("ignoring pause without call frames");
            return;
        }
        let reason = stop_reason(&event, self.stepping);
        self.stepping = false;

        let frames: Vec<StackFrame> = event
            .call_frames
            .into_iter()
            .enumerate()
            .map(|(i, frame)| StackFrame::from_call_frame(i, frame, &self.modules))
            .collect();
        debug!(frames = frames.len(), ?reason, "paused");

        let was_running = !self.is_paused();
        self.mode = Mode::Paused(PausedState { frames, focused: 0 });
        if was_running {
            self.sink.notify_stopped(reason, self.config.thread_id);
        }
    }

    fn on_navigated(&mut self) {
        info!("page navigated; dropping modules and stack");
        self.modules.reset();
        self.breakpoints.invalidate_bindings();
        self.mode = Mode::Running;
        self.stepping = false;
    }

    // -----------------------------------------------------------------------
    // Breakpoints
    // -----------------------------------------------------------------------

    /// Set a breakpoint at `"file:line"`.
    pub async fn set_breakpoint(&mut self, location: &str) -> Result<Breakpoint, DebugError> {
        Ok(self
            .breakpoints
            .set(location, &self.modules, &mut self.gateway)
            .await?)
    }

    pub async fn remove_breakpoint(&mut self, id: u32) -> Result<(), DebugError> {
        Ok(self.breakpoints.remove(id, &mut self.gateway).await?)
    }

    /// Remove every breakpoint in `file`.
    pub async fn remove_all_breakpoints(&mut self, file: &str) -> Result<(), DebugError> {
        Ok(self.breakpoints.remove_all(file, &mut self.gateway).await?)
    }

    pub fn list_breakpoints(&self, location: &str) -> Vec<Breakpoint> {
        self.breakpoints.list(location)
    }

    // -----------------------------------------------------------------------
    // Execution control
    // -----------------------------------------------------------------------

    pub async fn step_over(&mut self) -> Result<Reply<()>, DebugError> {
        if !self.is_paused() {
            return Ok(not_paused("step_over"));
        }
        self.gateway.step_over().await?;
        self.stepping = true;
        Ok(Reply::Value(()))
    }

    pub async fn step_in(&mut self) -> Result<Reply<()>, DebugError> {
        if !self.is_paused() {
            return Ok(not_paused("step_in"));
        }
        self.gateway.step_into().await?;
        self.stepping = true;
        Ok(Reply::Value(()))
    }

    pub async fn step_out(&mut self) -> Result<Reply<()>, DebugError> {
        if !self.is_paused() {
            return Ok(not_paused("step_out"));
        }
        self.gateway.step_out().await?;
        self.stepping = true;
        Ok(Reply::Value(()))
    }

    pub async fn continue_execution(&mut self) -> Result<Reply<()>, DebugError> {
        if !self.is_paused() {
            return Ok(not_paused("continue"));
        }
        self.gateway.resume().await?;
        self.stepping = false;
        Ok(Reply::Value(()))
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Display data of the paused stack. No gateway traffic.
    pub fn stack_frames(&self) -> Reply<Vec<FrameSummary>> {
        match &self.mode {
            Mode::Running => not_paused("stack_frames"),
            Mode::Paused(state) => {
                Reply::Value(state.frames.iter().map(StackFrame::summary).collect())
            }
        }
    }

    /// Focus frame `index` for subsequent inspection commands.
    pub fn set_focused_frame(&mut self, index: usize) -> Result<Reply<()>, DebugError> {
        let Mode::Paused(state) = &mut self.mode else {
            return Ok(not_paused("set_focused_frame"));
        };
        if index >= state.frames.len() {
            return Err(DebugError::FrameOutOfRange {
                index,
                len: state.frames.len(),
            });
        }
        state.focused = index;
        Ok(Reply::Value(()))
    }

    /// Source text around the focused frame's line.
    pub async fn show_line(&self) -> Reply<SourceWindow> {
        let Mode::Paused(state) = &self.mode else {
            return not_paused("show_line");
        };
        let Some(loc) = state.focused_frame().source() else {
            return not_available("source location");
        };
        match source::read_window(
            &loc.file,
            loc.line,
            &self.config.source_roots,
            self.config.source_context_lines,
        )
        .await
        {
            Some(window) => Reply::Value(window),
            None => not_available(format!("source of {loc}")),
        }
    }

    /// Variables in scope at the focused frame.
    pub fn list_variables(&self) -> Reply<Vec<Variable>> {
        let Mode::Paused(state) = &self.mode else {
            return not_paused("list_variables");
        };
        let address = &state.focused_frame().address;
        match self.modules.variables_at(address) {
            Some(vars) => Reply::Value(vars),
            None => {
                info!(%address, "no variable information for address");
                Reply::Value(Vec::new())
            }
        }
    }

    /// Globals of the compile unit enclosing the focused frame.
    pub fn list_global_variables(&self) -> Reply<Vec<Variable>> {
        let Mode::Paused(state) = &self.mode else {
            return not_paused("list_global_variables");
        };
        let address = &state.focused_frame().address;
        match self.modules.global_variables_at(address) {
            Some(vars) => Reply::Value(vars),
            None => {
                info!(%address, "no global variable information for address");
                Reply::Value(Vec::new())
            }
        }
    }

    /// Evaluate `expr` in the focused frame and print its value.
    pub async fn dump_variable(&mut self, expr: &str) -> Result<Reply<String>, DebugError> {
        let Mode::Paused(state) = &mut self.mode else {
            return Ok(not_paused("dump_variable"));
        };
        let frame = &mut state.frames[state.focused];
        if self.modules.owner(&frame.address.script_id).is_none() {
            info!(address = %frame.address, "frame has no debug information");
            return Ok(not_available(format!("variable `{expr}`")));
        }
        let address = frame.address.clone();
        let call_frame_id = frame.call_frame_id.clone();

        let Some(store) = frame.variable_store(&mut self.gateway).await? else {
            return Ok(not_available(format!("variable store for `{expr}`")));
        };
        let Some(mut descriptor) = self.modules.resolve_variable(expr, &address, store) else {
            return Ok(not_available(format!("variable `{expr}`")));
        };

        let size = descriptor.byte_size();
        if size > self.config.max_memory_read {
            warn!(
                expr,
                size,
                limit = self.config.max_memory_read,
                "variable too large to read"
            );
            return Ok(not_available(format!("value of `{expr}`")));
        }
        if size > 0 {
            let read = MemoryRead::new(descriptor.address(), size);
            debug!(expr, %read, "reading variable");
            let bytes = read.execute(&mut self.gateway, &call_frame_id).await?;
            descriptor.set_memory_slice(&bytes);
        }

        Ok(match descriptor.print() {
            Some(text) => Reply::Value(text),
            None => not_available(format!("printable value of `{expr}`")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{
        self, wasm_bytes, GatewayCall, MockDebugInfo, MockDecoder, MockGateway, MockPlacement,
        RecordingSink,
    };
    use crate::protocol::{ProtocolBreakpointId, ScriptId, ScriptLanguage};
    use serde_json::json;

    type TestSession = Session<MockGateway, MockDecoder, RecordingSink>;

    fn session() -> TestSession {
        let decoder = MockDecoder::new().with_module(
            &wasm_bytes(1),
            MockDebugInfo::new()
                .line(0x10, "main.c", 5)
                .line(0x20, "main.c", 6)
                .variable("x", "int", 0x10..0x30, MockPlacement::Absolute(64), 4)
                .variable(
                    "y",
                    "long",
                    0x10..0x30,
                    MockPlacement::LocalRelative { local: 0, offset: 8 },
                    8,
                )
                .variable("empty", "struct {}", 0x10..0x30, MockPlacement::Absolute(0), 0)
                .variable("big", "char[]", 0x10..0x30, MockPlacement::Absolute(0), 1 << 20)
                .global("counter", "int", 128, 4),
        );
        let mut gateway = MockGateway::new();
        gateway.add_script(&ScriptId::new("1"), wasm_bytes(1));
        Session::new(gateway, decoder, RecordingSink::new(), SessionConfig::default())
    }

    fn wasm_script(id: &str) -> GatewayEvent {
        GatewayEvent::ScriptParsed(ScriptParsed {
            script_id: ScriptId::new(id),
            url: format!("http://localhost/{id}.wasm"),
            script_language: Some(ScriptLanguage::WebAssembly),
        })
    }

    async fn pause_at(session: &mut TestSession, offsets: &[u32], reason: &str) {
        let mut frames = Vec::new();
        for (i, offset) in offsets.iter().enumerate() {
            let id = format!("cf{i}");
            let chain = mock::wasm_scope_chain(
                session.gateway_mut(),
                &id,
                &[],
                &[json!(1000)],
                &[],
            );
            frames.push(mock::call_frame(&id, "f", &ScriptId::new("1"), *offset, chain));
        }
        session
            .handle_event(GatewayEvent::Paused(PausedEvent {
                call_frames: frames,
                reason: reason.into(),
                hit_breakpoints: Vec::new(),
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn javascript_scripts_are_ignored() {
        let mut s = session();
        s.handle_event(GatewayEvent::ScriptParsed(ScriptParsed {
            script_id: ScriptId::new("9"),
            url: "app.js".into(),
            script_language: None,
        }))
        .await
        .unwrap();
        assert!(s.modules().is_empty());
        assert_eq!(s.gateway().call_count(), 0);
    }

    #[tokio::test]
    async fn running_commands_issue_no_gateway_calls() {
        let mut s = session();
        s.handle_event(wasm_script("1")).await.unwrap();
        s.gateway_mut().clear_calls();

        assert!(s.step_over().await.unwrap().is_not_paused());
        assert!(s.step_in().await.unwrap().is_not_paused());
        assert!(s.step_out().await.unwrap().is_not_paused());
        assert!(s.continue_execution().await.unwrap().is_not_paused());
        assert!(s.stack_frames().is_not_paused());
        assert!(s.set_focused_frame(0).unwrap().is_not_paused());
        assert!(s.show_line().await.is_not_paused());
        assert!(s.list_variables().is_not_paused());
        assert!(s.list_global_variables().is_not_paused());
        assert!(s.dump_variable("x").await.unwrap().is_not_paused());
        assert_eq!(s.gateway().call_count(), 0);
    }

    #[tokio::test]
    async fn pause_notifies_once_and_resume_clears() {
        let mut s = session();
        s.handle_event(wasm_script("1")).await.unwrap();

        pause_at(&mut s, &[0x10, 0x20], "other").await;
        assert!(s.is_paused());
        assert_eq!(s.sink().stops, vec![(StopReason::Pause, 1)]);

        // A second pause while paused rebuilds the stack without notifying.
        pause_at(&mut s, &[0x20], "other").await;
        assert_eq!(s.sink().stops.len(), 1);

        s.handle_event(GatewayEvent::Resumed).await.unwrap();
        assert!(!s.is_paused());
        assert!(s.stack_frames().is_not_paused());
    }

    #[tokio::test]
    async fn pause_without_frames_is_ignored() {
        let mut s = session();
        s.handle_event(GatewayEvent::Paused(PausedEvent {
            call_frames: Vec::new(),
            reason: "other".into(),
            hit_breakpoints: Vec::new(),
        }))
        .await
        .unwrap();
        assert!(!s.is_paused());
        assert!(s.sink().stops.is_empty());
    }

    #[test]
    fn stop_reason_classification() {
        let mut event = PausedEvent {
            call_frames: Vec::new(),
            reason: "other".into(),
            hit_breakpoints: Vec::new(),
        };
        assert_eq!(stop_reason(&event, false), StopReason::Pause);
        assert_eq!(stop_reason(&event, true), StopReason::Step);
        event.reason = "exception".into();
        assert_eq!(stop_reason(&event, true), StopReason::Exception);
        event.hit_breakpoints.push(ProtocolBreakpointId("bp".into()));
        assert_eq!(stop_reason(&event, false), StopReason::Breakpoint);
    }

    #[tokio::test]
    async fn step_then_pause_reports_step() {
        let mut s = session();
        s.handle_event(wasm_script("1")).await.unwrap();
        pause_at(&mut s, &[0x10], "other").await;

        s.step_in().await.unwrap().value().unwrap();
        assert_eq!(s.gateway().calls().last(), Some(&GatewayCall::StepInto));
        s.handle_event(GatewayEvent::Resumed).await.unwrap();
        pause_at(&mut s, &[0x20], "other").await;

        assert_eq!(s.sink().stops.last(), Some(&(StopReason::Step, 1)));
    }

    #[tokio::test]
    async fn focused_frame_is_validated() {
        let mut s = session();
        s.handle_event(wasm_script("1")).await.unwrap();
        pause_at(&mut s, &[0x10, 0x20], "other").await;

        assert_eq!(s.set_focused_frame(1).unwrap(), Reply::Value(()));
        let err = s.set_focused_frame(2).unwrap_err();
        assert!(matches!(err, DebugError::FrameOutOfRange { index: 2, len: 2 }));
        match s.mode() {
            Mode::Paused(state) => assert_eq!(state.focused(), 1),
            Mode::Running => panic!("expected paused"),
        }
    }

    #[tokio::test]
    async fn dump_variable_reads_exact_bytes() {
        let mut s = session();
        s.handle_event(wasm_script("1")).await.unwrap();
        s.gateway_mut().write_memory(64, &42i32.to_le_bytes());
        s.gateway_mut().write_memory(1008, &(-5i64).to_le_bytes());
        pause_at(&mut s, &[0x10], "other").await;

        let reply = s.dump_variable("x").await.unwrap();
        assert_eq!(reply, Reply::Value("x: int = 42".into()));
        let reply = s.dump_variable("y").await.unwrap();
        assert_eq!(reply, Reply::Value("y: long = -5".into()));

        let reads: Vec<_> = s
            .gateway()
            .calls()
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Evaluate { expression, .. } => MemoryRead::parse(expression),
                _ => None,
            })
            .collect();
        assert_eq!(reads, vec![MemoryRead::new(64, 4), MemoryRead::new(1008, 8)]);
    }

    #[tokio::test]
    async fn dump_variable_skips_reads_when_not_needed() {
        let mut s = session();
        s.handle_event(wasm_script("1")).await.unwrap();
        pause_at(&mut s, &[0x10], "other").await;

        assert!(s.dump_variable("nope").await.unwrap().is_not_available());
        assert!(s.dump_variable("big").await.unwrap().is_not_available());
        assert_eq!(
            s.dump_variable("empty").await.unwrap(),
            Reply::Value("empty: struct {} = {}".into())
        );
        assert_eq!(s.gateway().memory_reads(), 0);
    }

    #[tokio::test]
    async fn list_variables_and_globals() {
        let mut s = session();
        s.handle_event(wasm_script("1")).await.unwrap();
        pause_at(&mut s, &[0x10, 0x40], "other").await;

        let names: Vec<String> = s
            .list_variables()
            .value()
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["x", "y", "empty", "big"]);
        assert_eq!(s.list_global_variables().value().unwrap().len(), 1);

        s.set_focused_frame(1).unwrap();
        assert_eq!(s.list_variables(), Reply::Value(Vec::new()));
    }

    #[tokio::test]
    async fn navigation_resets_modules_and_stack() {
        let mut s = session();
        s.handle_event(wasm_script("1")).await.unwrap();
        let bp = s.set_breakpoint("main.c:5").await.unwrap();
        assert!(bp.verified);
        pause_at(&mut s, &[0x10], "other").await;

        s.handle_event(GatewayEvent::Navigated).await.unwrap();
        assert!(s.modules().is_empty());
        assert!(!s.is_paused());
        assert!(!s.list_breakpoints("main.c:5")[0].verified);

        s.handle_event(wasm_script("1")).await.unwrap();
        assert!(s.list_breakpoints("main.c:5")[0].verified);
    }

    #[tokio::test]
    async fn drain_events_applies_in_order() {
        let mut s = session();
        let (tx, mut rx) = crate::gateway::event_channel();
        tx.send(wasm_script("1")).unwrap();
        tx.send(GatewayEvent::Navigated).unwrap();
        tx.send(wasm_script("1")).unwrap();

        assert_eq!(s.drain_events(&mut rx).await, 3);
        assert_eq!(s.modules().len(), 1);
    }
}
