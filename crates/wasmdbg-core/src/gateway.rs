//! The protocol gateway seam.
//!
//! The session never talks to the transport directly. Everything it needs
//! from the browser goes through [`ProtocolGateway`], and everything the
//! browser reports comes back as a [`GatewayEvent`].

use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::protocol::{
    PausedEvent, PropertyDescriptor, ProtocolAddress, ProtocolBreakpointId, RemoteObject,
    ScriptId, ScriptParsed,
};

/// Notifications the session subscribes to.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// `Debugger.scriptParsed`.
    ScriptParsed(ScriptParsed),
    /// `Debugger.paused`.
    Paused(PausedEvent),
    /// `Debugger.resumed`.
    Resumed,
    /// `Page.frameNavigated` for the top-level frame.
    Navigated,
}

/// Sending half used by transports to queue notifications for a session.
pub type EventSender = mpsc::UnboundedSender<GatewayEvent>;

/// Receiving half drained by [`Session::drain_events`](crate::session::Session::drain_events).
pub type EventReceiver = mpsc::UnboundedReceiver<GatewayEvent>;

/// Create a notification channel for one session.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Requests the session issues against the browser.
///
/// Every method is one protocol round-trip. Implementations must not
/// reorder notifications relative to the completion of these calls.
#[allow(async_fn_in_trait)]
pub trait ProtocolGateway {
    /// `Debugger.getScriptSource`: the raw module bytecode.
    async fn script_source(&mut self, script_id: &ScriptId) -> Result<Vec<u8>, GatewayError>;

    /// `Debugger.setBreakpoint` at a byte-offset address.
    async fn set_breakpoint(
        &mut self,
        address: &ProtocolAddress,
    ) -> Result<ProtocolBreakpointId, GatewayError>;

    /// `Debugger.removeBreakpoint`.
    async fn remove_breakpoint(&mut self, id: &ProtocolBreakpointId) -> Result<(), GatewayError>;

    /// `Debugger.resume`.
    async fn resume(&mut self) -> Result<(), GatewayError>;

    /// `Debugger.stepOver`.
    async fn step_over(&mut self) -> Result<(), GatewayError>;

    /// `Debugger.stepInto`.
    async fn step_into(&mut self) -> Result<(), GatewayError>;

    /// `Debugger.stepOut`.
    async fn step_out(&mut self) -> Result<(), GatewayError>;

    /// `Runtime.getProperties` (own properties, in protocol order).
    async fn get_properties(
        &mut self,
        object_id: &str,
    ) -> Result<Vec<PropertyDescriptor>, GatewayError>;

    /// `Debugger.evaluateOnCallFrame` with the result returned by value.
    async fn evaluate_on_call_frame(
        &mut self,
        call_frame_id: &str,
        expression: &str,
    ) -> Result<RemoteObject, GatewayError>;
}
