// OpenSpace Hub - MCP Server (JSON-RPC 2.0 over stdio)
//
// Tool surface consumed by the agent. File tools run directly against
// the path resolver, sensitive-file classifier, artifact store, and
// patch engine; IDE-control tools are forwarded to the browser frontend
// through the command bridge. Handlers never throw past this boundary —
// every failure becomes an isError text result.

use crate::bridge::CommandResult;
use crate::config::OPENSPACE_DIR;
use crate::errors::HubError;
use crate::hub::Hub;
use crate::patch::{parse_ops, PatchRequest};
use crate::paths::resolve_real_path;
use crate::search;
use crate::sensitive::is_sensitive;
use crate::store::{Actor, WriteOptions};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "openspace-hub";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// IDE-control tool names — thin forwarders to the command bridge. The
/// schemas below are part of the Hub's contract even though execution
/// happens in the frontend.
const IDE_TOOLS: &[&str] = &[
    "pane.open",
    "pane.close",
    "pane.focus",
    "editor.open",
    "editor.highlight",
    "terminal.create",
    "terminal.run",
    "presentation.show",
    "presentation.next",
    "whiteboard.draw",
    "whiteboard.clear",
    "voice.speak",
];

/// A structured tool outcome: text payload plus error flag.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true }
    }

    /// MCP wire shape: `{content: [{type: "text", text}], isError?}`.
    pub fn into_json(self) -> Value {
        let mut v = json!({
            "content": [{"type": "text", "text": self.text}],
        });
        if self.is_error {
            v["isError"] = json!(true);
        }
        v
    }
}

/// Log to stderr (stdout is JSON-RPC).
fn log_line(msg: &str) {
    eprintln!("[openspace-hub] {}", msg);
}

/// Send JSON-RPC response
fn send_response(id: &Value, result: Value) {
    let response = json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    });
    write_line(&response);
}

/// Send JSON-RPC error response
fn send_error(id: &Value, code: i64, message: &str) {
    let response = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    });
    write_line(&response);
}

/// Send JSON-RPC notification (no id, no reply expected)
fn send_notification(method: &str, params: Value) {
    let message = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    });
    write_line(&message);
}

fn write_line(message: &Value) {
    let msg = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = out.write_all(msg.as_bytes());
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

/// MCP tool definition helper
fn tool_def(name: &str, description: &str, properties: Value, required: Vec<&str>) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// Return all tool definitions
pub fn tool_definitions() -> Vec<Value> {
    vec![
        // ====== FILE TOOLS ======
        tool_def(
            "file.read",
            "Read a workspace file. Paths are relative to the workspace root.",
            json!({
                "path": {"type": "string", "description": "Workspace-relative file path"},
                "offset": {"type": "integer", "description": "Line offset to start from (optional)"},
                "limit": {"type": "integer", "description": "Max lines to return (optional)"}
            }),
            vec!["path"],
        ),
        tool_def(
            "file.write",
            "Write a workspace file through the artifact store: atomic write, rolling backup, audit trail.",
            json!({
                "path": {"type": "string", "description": "Workspace-relative file path"},
                "content": {"type": "string", "description": "Full file content"},
                "reason": {"type": "string", "description": "Why this write is happening (audit trail)"}
            }),
            vec!["path", "content"],
        ),
        tool_def(
            "file.list",
            "List a workspace directory. Entries are sorted; directories carry a trailing slash.",
            json!({
                "path": {"type": "string", "description": "Workspace-relative directory (default: root)"}
            }),
            vec![],
        ),
        tool_def(
            "file.search",
            "Regex search across workspace files. Returns path:line matches.",
            json!({
                "pattern": {"type": "string", "description": "Regex pattern to search for"},
                "path": {"type": "string", "description": "Directory to search in (default: root)"},
                "case_insensitive": {"type": "boolean", "description": "Case insensitive search", "default": true}
            }),
            vec!["pattern"],
        ),
        tool_def(
            "file.patch",
            "Apply patch operations to a file without a version precondition. Ops: one replace_content, or one or more replace_lines {startLine, endLine, content} (zero-indexed, inclusive).",
            json!({
                "path": {"type": "string", "description": "Workspace-relative file path"},
                "ops": {"type": "array", "description": "Patch operations", "items": {"type": "object"}},
                "intent": {"type": "string", "description": "Why this patch is happening (audit trail)"}
            }),
            vec!["path", "ops"],
        ),
        tool_def(
            "artifact.getVersion",
            "Get the current OCC version of an artifact (0 = never patched).",
            json!({
                "path": {"type": "string", "description": "Workspace-relative file path"}
            }),
            vec!["path"],
        ),
        tool_def(
            "artifact.patch",
            "Apply patch operations with optimistic concurrency control. Fails with the current version if baseVersion is stale.",
            json!({
                "path": {"type": "string", "description": "Workspace-relative file path"},
                "baseVersion": {"type": "integer", "description": "Version this patch was computed against"},
                "ops": {"type": "array", "description": "Patch operations", "items": {"type": "object"}},
                "intent": {"type": "string", "description": "Why this patch is happening (audit trail)"}
            }),
            vec!["path", "baseVersion", "ops"],
        ),

        // ====== IDE-CONTROL TOOLS — executed by the frontend ======
        tool_def(
            "pane.open",
            "Open an IDE pane in the browser frontend.",
            json!({
                "pane": {"type": "string", "description": "Pane identifier (editor, terminal, preview, ...)"}
            }),
            vec!["pane"],
        ),
        tool_def(
            "pane.close",
            "Close an IDE pane.",
            json!({
                "pane": {"type": "string", "description": "Pane identifier"}
            }),
            vec!["pane"],
        ),
        tool_def(
            "pane.focus",
            "Focus an IDE pane.",
            json!({
                "pane": {"type": "string", "description": "Pane identifier"}
            }),
            vec!["pane"],
        ),
        tool_def(
            "editor.open",
            "Open a file in the editor pane.",
            json!({
                "path": {"type": "string", "description": "Workspace-relative file path"},
                "line": {"type": "integer", "description": "Line to scroll to (optional)"}
            }),
            vec!["path"],
        ),
        tool_def(
            "editor.highlight",
            "Highlight a line range in the open editor.",
            json!({
                "path": {"type": "string", "description": "Workspace-relative file path"},
                "startLine": {"type": "integer", "description": "First line (zero-indexed)"},
                "endLine": {"type": "integer", "description": "Last line (inclusive)"}
            }),
            vec!["path", "startLine", "endLine"],
        ),
        tool_def(
            "terminal.create",
            "Create a new terminal in the IDE.",
            json!({}),
            vec![],
        ),
        tool_def(
            "terminal.run",
            "Run a command in the active IDE terminal.",
            json!({
                "command": {"type": "string", "description": "Command line to execute"}
            }),
            vec!["command"],
        ),
        tool_def(
            "presentation.show",
            "Show a presentation slide.",
            json!({
                "slide": {"type": "integer", "description": "Slide index"}
            }),
            vec![],
        ),
        tool_def(
            "presentation.next",
            "Advance the presentation by one slide.",
            json!({}),
            vec![],
        ),
        tool_def(
            "whiteboard.draw",
            "Draw elements on the whiteboard.",
            json!({
                "elements": {"type": "array", "description": "Whiteboard elements", "items": {"type": "object"}}
            }),
            vec!["elements"],
        ),
        tool_def(
            "whiteboard.clear",
            "Clear the whiteboard.",
            json!({}),
            vec![],
        ),
        tool_def(
            "voice.speak",
            "Speak text through the frontend voice channel.",
            json!({
                "text": {"type": "string", "description": "Text to speak"}
            }),
            vec!["text"],
        ),
    ]
}

/// Convert a core error into an error result the client can act on.
/// Conflicts and validation failures keep their machine-readable parts.
fn error_result(err: HubError) -> ToolResult {
    match err {
        HubError::Conflict { current_version, file_path } => ToolResult::error(format!(
            "CONFLICT: {file_path} is at version {current_version}; retry with baseVersion={current_version}"
        )),
        HubError::PatchValidation(e) => ToolResult::error(format!(
            "PATCH_VALIDATION [{}] at {}: {}",
            e.code, e.location, e.hint
        )),
        other => ToolResult::error(format!("ERROR: {other}")),
    }
}

/// Sensitive-file gate applied to every file tool.
fn deny_sensitive(path: &str) -> Option<ToolResult> {
    if is_sensitive(path) {
        Some(ToolResult::error(format!(
            "BLOCKED: {path} matches the sensitive-file denylist and is not accessible to agents"
        )))
    } else {
        None
    }
}

fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolResult> {
    args.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolResult::error(format!("ERROR: missing required argument '{field}'")))
}

/// Handle a tool call
pub fn handle_tool_call(
    hub: &Hub,
    name: &str,
    args: &Value,
    tool_call_id: Option<String>,
) -> ToolResult {
    match name {
        // ====== file.read ======
        "file.read" => {
            let path = match required_str(args, "path") {
                Ok(p) => p,
                Err(e) => return e,
            };
            if let Some(denied) = deny_sensitive(path) {
                return denied;
            }
            let bytes = match hub.store.read(path) {
                Ok(b) => b,
                Err(e) => return error_result(e),
            };
            if bytes.len() as u64 > hub.config.max_read_bytes {
                return ToolResult::error(format!(
                    "ERROR: {path} is {} bytes, above the {} byte read limit",
                    bytes.len(),
                    hub.config.max_read_bytes
                ));
            }
            let content = String::from_utf8_lossy(&bytes);

            let offset = args.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            if offset == 0 && limit == 0 {
                return ToolResult::ok(content.into_owned());
            }
            let lines: Vec<&str> = content.lines().collect();
            let start = offset.min(lines.len());
            let end = if limit > 0 { (start + limit).min(lines.len()) } else { lines.len() };
            ToolResult::ok(lines[start..end].join("\n"))
        }

        // ====== file.write ======
        "file.write" => {
            let path = match required_str(args, "path") {
                Ok(p) => p,
                Err(e) => return e,
            };
            let content = match required_str(args, "content") {
                Ok(c) => c,
                Err(e) => return e,
            };
            if let Some(denied) = deny_sensitive(path) {
                return denied;
            }
            let reason = args
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("file.write via MCP")
                .to_string();
            let opts = WriteOptions { actor: Actor::Agent, reason, tool_call_id };
            match hub.store.write(path, content.as_bytes(), opts) {
                Ok(()) => ToolResult::ok(format!("Written: {} ({} bytes)", path, content.len())),
                Err(e) => error_result(e),
            }
        }

        // ====== file.list ======
        "file.list" => {
            let rel = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
            let dir = match resolve_real_path(&hub.root, rel) {
                Ok(d) => d,
                Err(e) => return error_result(e),
            };
            let entries = match std::fs::read_dir(&dir) {
                Ok(rd) => rd,
                Err(e) => return ToolResult::error(format!("ERROR: cannot list {rel}: {e}")),
            };
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    if name == OPENSPACE_DIR {
                        return None;
                    }
                    let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    Some(if is_dir { format!("{name}/") } else { name })
                })
                .collect();
            names.sort();
            ToolResult::ok(names.join("\n"))
        }

        // ====== file.search ======
        "file.search" => {
            let pattern = match required_str(args, "pattern") {
                Ok(p) => p,
                Err(e) => return e,
            };
            let rel = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
            let case_insensitive = args
                .get("case_insensitive")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            match search::search(&hub.root, rel, pattern, case_insensitive, &hub.config) {
                Ok(matches) => {
                    let mut out = format!("{} match(es)", matches.len());
                    for m in matches {
                        out.push_str(&format!("\n{}:{}: {}", m.path, m.line, m.text));
                    }
                    ToolResult::ok(out)
                }
                Err(e) => error_result(e),
            }
        }

        // ====== file.patch ======
        "file.patch" => {
            let path = match required_str(args, "path") {
                Ok(p) => p,
                Err(e) => return e,
            };
            if let Some(denied) = deny_sensitive(path) {
                return denied;
            }
            let req = match patch_request(args, 0, tool_call_id) {
                Ok(r) => r,
                Err(e) => return e,
            };
            match hub.patch.apply_unconditional(path, &req) {
                Ok(outcome) => ToolResult::ok(
                    serde_json::to_string_pretty(&outcome).unwrap_or_default(),
                ),
                Err(e) => error_result(e),
            }
        }

        // ====== artifact.getVersion ======
        "artifact.getVersion" => {
            let path = match required_str(args, "path") {
                Ok(p) => p,
                Err(e) => return e,
            };
            match hub.patch.version(path) {
                Ok(version) => ToolResult::ok(
                    serde_json::to_string_pretty(&json!({"path": path, "version": version}))
                        .unwrap_or_default(),
                ),
                Err(e) => error_result(e),
            }
        }

        // ====== artifact.patch ======
        "artifact.patch" => {
            let path = match required_str(args, "path") {
                Ok(p) => p,
                Err(e) => return e,
            };
            if let Some(denied) = deny_sensitive(path) {
                return denied;
            }
            let Some(base_version) = args.get("baseVersion").and_then(|v| v.as_u64()) else {
                return ToolResult::error("ERROR: missing required argument 'baseVersion'");
            };
            let req = match patch_request(args, base_version, tool_call_id) {
                Ok(r) => r,
                Err(e) => return e,
            };
            match hub.patch.apply(path, &req) {
                Ok(outcome) => ToolResult::ok(
                    serde_json::to_string_pretty(&outcome).unwrap_or_default(),
                ),
                Err(e) => error_result(e),
            }
        }

        // ====== IDE-control tools — forwarded over the bridge ======
        n if IDE_TOOLS.contains(&n) => hub.bridge.execute(n, args.clone()),

        _ => ToolResult::error(format!("ERROR: unknown tool '{name}'")),
    }
}

/// Assemble a PatchRequest from tool arguments.
fn patch_request(
    args: &Value,
    base_version: u64,
    tool_call_id: Option<String>,
) -> Result<PatchRequest, ToolResult> {
    let raw = args
        .get("ops")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let ops = parse_ops(&raw).map_err(|e| error_result(HubError::PatchValidation(e)))?;
    let intent = args
        .get("intent")
        .and_then(|v| v.as_str())
        .unwrap_or("patch via MCP")
        .to_string();
    Ok(PatchRequest { base_version, actor: Actor::Agent, intent, tool_call_id, ops })
}

/// Summarize tool params for logging (truncate large values)
fn param_summary(name: &str, args: &Value) -> String {
    match name {
        n if n.starts_with("file.") || n.starts_with("artifact.") => {
            let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("?");
            match args.get("pattern").and_then(|v| v.as_str()) {
                Some(pattern) => format!("path={path} pattern={pattern}"),
                None => format!("path={path}"),
            }
        }
        _ => {
            let s = args.to_string();
            if s.len() > 200 {
                format!("{}…", &s[..200])
            } else {
                s
            }
        }
    }
}

/// Run the stdio server. The reader thread never blocks on tool work:
/// tools/call is handled on a spawned thread so bridge/result
/// notifications keep flowing while a bridge round-trip is pending.
pub fn run(hub: Arc<Hub>) {
    log_line(&format!("Starting {} v{}", SERVER_NAME, SERVER_VERSION));
    log_line(&format!("Workspace: {:?}", hub.root));

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log_line(&format!("stdin read error: {}", e));
                continue;
            }
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                log_line(&format!("JSON parse error: {}", e));
                continue;
            }
        };

        let method = msg["method"].as_str().unwrap_or("");
        let id = msg["id"].clone();
        let params = msg["params"].clone();

        match method {
            "initialize" => {
                send_response(&id, json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": SERVER_VERSION,
                    }
                }));
            }

            "notifications/initialized" => {
                // No response needed
            }

            "tools/list" => {
                send_response(&id, json!({ "tools": tool_definitions() }));
            }

            "tools/call" => {
                let name = params["name"].as_str().unwrap_or("").to_string();
                let args = params.get("arguments").cloned().unwrap_or(json!({}));
                let hub = Arc::clone(&hub);

                log_line(&format!("CALL {} | {}", name, param_summary(&name, &args)));

                // Bridge round-trips can take up to the full timeout; the
                // reader loop must not wait on them.
                std::thread::spawn(move || {
                    let tool_call_id = match &id {
                        Value::Null => None,
                        other => Some(other.to_string().trim_matches('"').to_string()),
                    };
                    let result = handle_tool_call(&hub, &name, &args, tool_call_id);
                    if result.is_error {
                        let snippet: String = result.text.chars().take(200).collect();
                        log_line(&format!("FAIL {} | {}", name, snippet));
                    }
                    send_response(&id, result.into_json());
                });
            }

            // Frontend lifecycle: once registered, IDE-control tools are
            // relayed as bridge/execute notifications on stdout.
            "bridge/register" => {
                hub.bridge.register_frontend(Box::new(|cmd| {
                    let params = serde_json::to_value(cmd).map_err(|e| e.to_string())?;
                    send_notification("bridge/execute", params);
                    Ok(())
                }));
                if !id.is_null() {
                    send_response(&id, json!({"registered": true}));
                }
            }

            // The frontend's result path back into the bridge.
            "bridge/result" => {
                match serde_json::from_value::<CommandResult>(params) {
                    Ok(result) => {
                        let request_id = result.request_id.clone();
                        hub.bridge.resolve_command(&request_id, result);
                    }
                    Err(e) => log_line(&format!("Malformed bridge/result: {}", e)),
                }
                if !id.is_null() {
                    send_response(&id, json!({}));
                }
            }

            "ping" => {
                send_response(&id, json!({}));
            }

            _ => {
                if !id.is_null() {
                    send_error(&id, -32601, &format!("Unknown method: {}", method));
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(dir: &tempfile::TempDir) -> Arc<Hub> {
        Hub::open(dir.path()).unwrap()
    }

    fn call(hub: &Hub, name: &str, args: Value) -> ToolResult {
        handle_tool_call(hub, name, &args, Some("test-call".to_string()))
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);

        let w = call(&hub, "file.write", json!({"path": "src/app.ts", "content": "let x = 1;\n"}));
        assert!(!w.is_error, "{}", w.text);

        let r = call(&hub, "file.read", json!({"path": "src/app.ts"}));
        assert!(!r.is_error);
        assert_eq!(r.text, "let x = 1;\n");
    }

    #[test]
    fn read_with_line_window() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        call(&hub, "file.write", json!({"path": "w.txt", "content": "a\nb\nc\nd"}));

        let r = call(&hub, "file.read", json!({"path": "w.txt", "offset": 1, "limit": 2}));
        assert_eq!(r.text, "b\nc");
    }

    #[test]
    fn traversal_is_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        let r = call(&hub, "file.write", json!({"path": "../evil.txt", "content": "x"}));
        assert!(r.is_error);
        assert!(r.text.contains("escapes"), "{}", r.text);
    }

    #[test]
    fn sensitive_paths_blocked_for_read_and_write() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);

        let r = call(&hub, "file.read", json!({"path": ".env"}));
        assert!(r.is_error);
        assert!(r.text.contains("BLOCKED"));

        let w = call(&hub, "file.write", json!({"path": "keys/id_rsa", "content": "x"}));
        assert!(w.is_error);

        // The regression case must stay writable.
        let ok = call(&hub, "file.write", json!({"path": "secret-santa.ts", "content": "x"}));
        assert!(!ok.is_error, "{}", ok.text);
    }

    #[test]
    fn artifact_patch_scenario_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);

        let r = call(&hub, "artifact.patch", json!({
            "path": "new.txt",
            "baseVersion": 0,
            "ops": [{"op": "replace_content", "content": "hello world"}],
        }));
        assert!(!r.is_error, "{}", r.text);
        assert!(r.text.contains("\"version\": 1"));
        assert!(r.text.contains("\"bytes\": 11"));
        assert_eq!(std::fs::read_to_string(dir.path().join("new.txt")).unwrap(), "hello world");
    }

    #[test]
    fn stale_base_version_reports_conflict_with_current() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);

        call(&hub, "artifact.patch", json!({
            "path": "a.txt", "baseVersion": 0,
            "ops": [{"op": "replace_content", "content": "one"}],
        }));
        let r = call(&hub, "artifact.patch", json!({
            "path": "a.txt", "baseVersion": 0,
            "ops": [{"op": "replace_content", "content": "two"}],
        }));
        assert!(r.is_error);
        assert!(r.text.contains("CONFLICT"), "{}", r.text);
        assert!(r.text.contains("baseVersion=1"), "{}", r.text);
    }

    #[test]
    fn get_version_tracks_applies() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);

        let v0 = call(&hub, "artifact.getVersion", json!({"path": "a.txt"}));
        assert!(v0.text.contains("\"version\": 0"));

        call(&hub, "artifact.patch", json!({
            "path": "a.txt", "baseVersion": 0,
            "ops": [{"op": "replace_content", "content": "one"}],
        }));
        let v1 = call(&hub, "artifact.getVersion", json!({"path": "a.txt"}));
        assert!(v1.text.contains("\"version\": 1"));
    }

    #[test]
    fn file_patch_out_of_bounds_reports_code() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        call(&hub, "file.write", json!({"path": "s.txt", "content": "a\nb"}));

        let r = call(&hub, "file.patch", json!({
            "path": "s.txt",
            "ops": [{"op": "replace_lines", "startLine": 0, "endLine": 99, "content": "X"}],
        }));
        assert!(r.is_error);
        assert!(r.text.contains("OUT_OF_BOUNDS"), "{}", r.text);
        assert_eq!(std::fs::read_to_string(dir.path().join("s.txt")).unwrap(), "a\nb");
    }

    #[test]
    fn unsupported_op_reports_code() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        let r = call(&hub, "file.patch", json!({
            "path": "s.txt",
            "ops": [{"op": "insert_lines", "content": "X"}],
        }));
        assert!(r.is_error);
        assert!(r.text.contains("UNSUPPORTED_OP"), "{}", r.text);
    }

    #[test]
    fn file_list_hides_hub_internals() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        call(&hub, "file.write", json!({"path": "src/a.ts", "content": "x"}));
        call(&hub, "file.write", json!({"path": "top.md", "content": "x"}));

        let r = call(&hub, "file.list", json!({}));
        assert!(!r.is_error);
        assert!(r.text.contains("src/"));
        assert!(r.text.contains("top.md"));
        assert!(!r.text.contains(".openspace"));
    }

    #[test]
    fn file_search_finds_written_content() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        call(&hub, "file.write", json!({"path": "src/a.ts", "content": "const magicValue = 7;\n"}));

        let r = call(&hub, "file.search", json!({"pattern": "magicValue"}));
        assert!(!r.is_error);
        assert!(r.text.contains("src/a.ts:1"), "{}", r.text);
    }

    #[test]
    fn ide_tool_without_frontend_is_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        let r = call(&hub, "pane.open", json!({"pane": "editor"}));
        assert!(r.is_error);
        assert!(r.text.contains("no frontend"));
    }

    #[test]
    fn ide_tool_round_trip_via_registered_frontend() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);

        let resolver = Arc::clone(&hub);
        hub.bridge.register_frontend(Box::new(move |cmd| {
            resolver.bridge.resolve_command(
                &cmd.request_id,
                CommandResult {
                    cmd: cmd.cmd.clone(),
                    args: cmd.args.clone(),
                    success: true,
                    output: Some(json!({"pane": "editor", "opened": true})),
                    error: None,
                    execution_time: 1,
                    timestamp: 0,
                    request_id: cmd.request_id.clone(),
                },
            );
            Ok(())
        }));

        let r = call(&hub, "pane.open", json!({"pane": "editor"}));
        assert!(!r.is_error, "{}", r.text);
        assert!(r.text.contains("opened"));
    }

    #[test]
    fn unknown_tool_is_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        let r = call(&hub, "evil.tool", json!({}));
        assert!(r.is_error);
        assert!(r.text.contains("unknown tool"));
    }

    #[test]
    fn tool_definitions_cover_contract() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs.iter().filter_map(|d| d["name"].as_str()).collect();
        for expected in [
            "file.read", "file.write", "file.list", "file.search", "file.patch",
            "artifact.getVersion", "artifact.patch",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        for ide in IDE_TOOLS {
            assert!(names.contains(ide), "missing {ide}");
        }
    }
}
