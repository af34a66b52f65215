// OpenSpace Hub - Command Bridge
//
// Turns asynchronous, relayed browser command execution into awaitable
// tool calls. Each dispatched command gets a fresh request id and a
// pending record; the frontend posts the result back out-of-band and
// resolve_command wakes the waiting caller. Per request the state
// machine is DISPATCHED -> (RESOLVED | TIMED_OUT); a request id is
// consumed exactly once and no timer or map entry outlives either
// outcome.

use crate::mcp::ToolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Outbound command handed to the registered frontend callback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeCommand {
    pub cmd: String,
    pub args: Value,
    pub request_id: String,
}

/// The frontend's only contractual obligation back to this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub cmd: String,
    #[serde(default)]
    pub args: Value,
    pub success: bool,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time: u64,
    #[serde(default)]
    pub timestamp: u64,
    pub request_id: String,
}

/// Delivers a command toward the browser. Returning Err means delivery
/// failed synchronously; the bridge cleans up and reports an error
/// result without waiting.
pub type FrontendCallback = Box<dyn Fn(&BridgeCommand) -> Result<(), String> + Send + Sync>;

pub struct CommandBridge {
    timeout: Duration,
    callback: Mutex<Option<FrontendCallback>>,
    pending: Mutex<HashMap<String, Sender<CommandResult>>>,
}

impl CommandBridge {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            callback: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or replace) the frontend delivery callback.
    pub fn register_frontend(&self, callback: FrontendCallback) {
        *self.callback.lock().expect("bridge callback poisoned") = Some(callback);
        log::info!("Frontend registered with command bridge");
    }

    pub fn frontend_registered(&self) -> bool {
        self.callback.lock().expect("bridge callback poisoned").is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending command map poisoned").len()
    }

    /// Execute an IDE command via the frontend and await its result.
    /// Never panics or throws: every failure path is a structured error
    /// result.
    pub fn execute(&self, cmd: &str, args: Value) -> ToolResult {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel();

        {
            let callback = self.callback.lock().expect("bridge callback poisoned");
            let Some(callback) = callback.as_ref() else {
                // No pending record is registered for this failure.
                return ToolResult::error(format!(
                    "Cannot execute '{cmd}': no frontend is connected to the bridge"
                ));
            };

            self.pending
                .lock()
                .expect("pending command map poisoned")
                .insert(request_id.clone(), tx);

            let command = BridgeCommand {
                cmd: cmd.to_string(),
                args,
                request_id: request_id.clone(),
            };
            if let Err(e) = callback(&command) {
                // Synchronous delivery failure: tear the record down now
                // so nothing dangles.
                self.pending
                    .lock()
                    .expect("pending command map poisoned")
                    .remove(&request_id);
                return ToolResult::error(format!("Command '{cmd}' could not be delivered: {e}"));
            }
        }

        match rx.recv_timeout(self.timeout) {
            Ok(result) => Self::into_tool_result(cmd, result),
            Err(RecvTimeoutError::Timeout) => {
                self.pending
                    .lock()
                    .expect("pending command map poisoned")
                    .remove(&request_id);
                ToolResult::error(format!(
                    "Command '{cmd}' timed out after {}ms (request {request_id})",
                    self.timeout.as_millis()
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.pending
                    .lock()
                    .expect("pending command map poisoned")
                    .remove(&request_id);
                ToolResult::error(format!("Command '{cmd}' was dropped before a result arrived"))
            }
        }
    }

    /// Deliver a result from the frontend. Unknown request ids (already
    /// resolved, timed out, or never issued) are a safe no-op.
    pub fn resolve_command(&self, request_id: &str, result: CommandResult) {
        let waiter = self
            .pending
            .lock()
            .expect("pending command map poisoned")
            .remove(request_id);
        match waiter {
            Some(tx) => {
                // The waiter may have timed out between our removal and
                // this send; that race is benign.
                let _ = tx.send(result);
            }
            None => {
                log::debug!("Ignoring result for unknown request {request_id}");
            }
        }
    }

    fn into_tool_result(cmd: &str, result: CommandResult) -> ToolResult {
        if result.success {
            match &result.output {
                Some(output) => match serde_json::to_string_pretty(output) {
                    Ok(text) => ToolResult::ok(text),
                    Err(_) => ToolResult::ok(format!("Command '{cmd}' completed successfully")),
                },
                None => ToolResult::ok(format!("Command '{cmd}' completed successfully")),
            }
        } else {
            let reason = result.error.as_deref().unwrap_or("unspecified error");
            ToolResult::error(format!("Command '{cmd}' failed: {reason}"))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
