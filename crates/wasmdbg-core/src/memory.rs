//! Guest linear-memory reads.
//!
//! The only channel into a paused module's memory is expression evaluation
//! on a call frame. Each read asks for an exact slice so the browser never
//! serializes more than the bytes a variable occupies.

use std::fmt;

use crate::error::GatewayError;
use crate::gateway::ProtocolGateway;

/// A bounded read of linear memory 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRead {
    /// Start address.
    pub address: usize,
    /// Number of bytes.
    pub size: usize,
}

const EXPR_PREFIX: &str = "Array.from(new Uint8Array(memories[0].buffer, ";
const EXPR_SUFFIX: &str = "))";

impl MemoryRead {
    pub fn new(address: usize, size: usize) -> Self {
        Self { address, size }
    }

    /// The expression evaluated on the call frame.
    pub fn expression(&self) -> String {
        format!("{EXPR_PREFIX}{}, {}{EXPR_SUFFIX}", self.address, self.size)
    }

    /// Recognize an expression produced by [`expression`](Self::expression).
    pub fn parse(expression: &str) -> Option<Self> {
        let args = expression
            .strip_prefix(EXPR_PREFIX)?
            .strip_suffix(EXPR_SUFFIX)?;
        let (address, size) = args.split_once(',')?;
        Some(Self {
            address: address.trim().parse().ok()?,
            size: size.trim().parse().ok()?,
        })
    }

    /// Perform the read on `call_frame_id`.
    ///
    /// Fails with [`GatewayError::UnexpectedValue`] unless the browser
    /// returns exactly `size` bytes.
    pub async fn execute<G: ProtocolGateway>(
        &self,
        gateway: &mut G,
        call_frame_id: &str,
    ) -> Result<Vec<u8>, GatewayError> {
        let result = gateway
            .evaluate_on_call_frame(call_frame_id, &self.expression())
            .await?;

        let items = result
            .value
            .as_ref()
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                GatewayError::UnexpectedValue(format!(
                    "memory read returned `{}` instead of an array",
                    result.object_type
                ))
            })?;

        let bytes = items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| {
                GatewayError::UnexpectedValue("memory read returned a non-byte element".into())
            })?;

        if bytes.len() != self.size {
            return Err(GatewayError::UnexpectedValue(format!(
                "memory read returned {} bytes, expected {}",
                bytes.len(),
                self.size
            )));
        }
        Ok(bytes)
    }
}

impl fmt::Display for MemoryRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}; {}]", self.address, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{GatewayCall, MockGateway};

    #[test]
    fn expression_round_trips_through_parse() {
        let read = MemoryRead::new(1024, 4);
        assert_eq!(
            read.expression(),
            "Array.from(new Uint8Array(memories[0].buffer, 1024, 4))"
        );
        assert_eq!(MemoryRead::parse(&read.expression()), Some(read));
        assert_eq!(MemoryRead::parse("memories[0].buffer"), None);
    }

    #[tokio::test]
    async fn execute_reads_exact_slice() {
        let mut gateway = MockGateway::new();
        gateway.write_memory(16, &[1, 2, 3, 4, 5]);

        let bytes = MemoryRead::new(17, 3)
            .execute(&mut gateway, "frame-0")
            .await
            .unwrap();
        assert_eq!(bytes, vec![2, 3, 4]);
        assert!(matches!(
            gateway.calls().last(),
            Some(GatewayCall::Evaluate { call_frame_id, .. }) if call_frame_id == "frame-0"
        ));
    }

    #[tokio::test]
    async fn execute_rejects_short_result() {
        let mut gateway = MockGateway::new();
        gateway.write_memory(0, &[9, 9]);

        let err = MemoryRead::new(0, 8)
            .execute(&mut gateway, "frame-0")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 8"), "got: {err}");
    }
}
