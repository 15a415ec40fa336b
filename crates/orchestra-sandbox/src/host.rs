//! Host functions linked into every sandboxed module under `env`. This is
//! the entire whitelist: a guest module that imports anything outside this
//! list fails to instantiate rather than silently losing the capability.

use std::future::Future;
use std::pin::Pin;

use serde_json::{json, Value};
use wasmtime::{Caller, Linker};

use crate::SandboxState;

/// Capability names exposed under `env`, for diagnostics and for the
/// compile-time whitelist check in [`crate::Sandbox::compile_check`].
pub const CAPABILITY_NAMES: &[&str] =
    &["json_stringify", "json_parse_field", "text_upper", "text_lower", "date_now_ms", "regex_is_match", "http_fetch"];

fn read_guest_bytes(caller: &mut Caller<'_, SandboxState>, ptr: u32, len: u32) -> anyhow::Result<Vec<u8>> {
    let memory = caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| anyhow::anyhow!("guest module must export linear memory"))?;
    let data = memory.data(&caller);
    let start = ptr as usize;
    let end = start + len as usize;
    data.get(start..end).map(|s| s.to_vec()).ok_or_else(|| anyhow::anyhow!("guest pointer out of bounds"))
}

/// Writes `value` as JSON into guest memory by calling back into the
/// guest's own `alloc(len) -> ptr` export, then returns the (ptr, len)
/// pair the guest can read it back from.
fn write_guest_json(caller: &mut Caller<'_, SandboxState>, value: &Value) -> anyhow::Result<(u32, u32)> {
    let bytes = serde_json::to_vec(value)?;
    let alloc = caller
        .get_export("alloc")
        .and_then(|e| e.into_func())
        .ok_or_else(|| anyhow::anyhow!("guest module must export alloc(len) -> ptr"))?;
    let alloc = alloc.typed::<u32, u32>(&caller)?;
    let ptr = alloc.call(&mut *caller, bytes.len() as u32)?;
    let memory = caller.get_export("memory").and_then(|e| e.into_memory()).expect("checked above");
    memory.write(&mut *caller, ptr as usize, &bytes)?;
    Ok((ptr, bytes.len() as u32))
}

pub fn link_capabilities(linker: &mut Linker<SandboxState>) -> anyhow::Result<()> {
    linker.func_wrap(
        "env",
        "json_stringify",
        |mut caller: Caller<'_, SandboxState>, ptr: u32, len: u32| -> anyhow::Result<(u32, u32)> {
            let bytes = read_guest_bytes(&mut caller, ptr, len)?;
            let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            write_guest_json(&mut caller, &Value::String(serde_json::to_string(&value)?))
        },
    )?;

    linker.func_wrap(
        "env",
        "json_parse_field",
        |mut caller: Caller<'_, SandboxState>, obj_ptr: u32, obj_len: u32, field_ptr: u32, field_len: u32| -> anyhow::Result<(u32, u32)> {
            let obj_bytes = read_guest_bytes(&mut caller, obj_ptr, obj_len)?;
            let field_bytes = read_guest_bytes(&mut caller, field_ptr, field_len)?;
            let field = String::from_utf8_lossy(&field_bytes).into_owned();
            let value: Value = serde_json::from_slice(&obj_bytes).unwrap_or(Value::Null);
            let extracted = value.get(&field).cloned().unwrap_or(Value::Null);
            write_guest_json(&mut caller, &extracted)
        },
    )?;

    linker.func_wrap(
        "env",
        "text_upper",
        |mut caller: Caller<'_, SandboxState>, ptr: u32, len: u32| -> anyhow::Result<(u32, u32)> {
            let bytes = read_guest_bytes(&mut caller, ptr, len)?;
            let text = String::from_utf8_lossy(&bytes).to_uppercase();
            write_guest_json(&mut caller, &Value::String(text))
        },
    )?;

    linker.func_wrap(
        "env",
        "text_lower",
        |mut caller: Caller<'_, SandboxState>, ptr: u32, len: u32| -> anyhow::Result<(u32, u32)> {
            let bytes = read_guest_bytes(&mut caller, ptr, len)?;
            let text = String::from_utf8_lossy(&bytes).to_lowercase();
            write_guest_json(&mut caller, &Value::String(text))
        },
    )?;

    // A restricted "regex": literal substring containment only. Pulling in
    // a full regex engine here would be an ungrounded dependency for this
    // workspace; block authors needing real regex semantics compile that
    // logic into the wasm module itself instead of relying on the host.
    linker.func_wrap(
        "env",
        "regex_is_match",
        |mut caller: Caller<'_, SandboxState>, pattern_ptr: u32, pattern_len: u32, text_ptr: u32, text_len: u32| -> anyhow::Result<u32> {
            let pattern = String::from_utf8_lossy(&read_guest_bytes(&mut caller, pattern_ptr, pattern_len)?).into_owned();
            let text = String::from_utf8_lossy(&read_guest_bytes(&mut caller, text_ptr, text_len)?).into_owned();
            Ok(text.contains(&pattern) as u32)
        },
    )?;

    linker.func_wrap("env", "date_now_ms", |_caller: Caller<'_, SandboxState>| -> i64 {
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
    })?;

    linker.func_wrap2_async(
        "env",
        "http_fetch",
        |mut caller: Caller<'_, SandboxState>, ptr: u32, len: u32| -> Pin<Box<dyn Future<Output = anyhow::Result<(u32, u32)>> + Send>> {
            Box::pin(async move {
                let bytes = read_guest_bytes(&mut caller, ptr, len)?;
                let request: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
                let url = request.get("url").and_then(Value::as_str).unwrap_or_default().to_string();
                if url.is_empty() {
                    return write_guest_json(&mut caller, &json!({ "error": "missing url" }));
                }
                let client = caller.data().http.clone();
                let outcome = async {
                    let resp = client.get(&url).send().await?;
                    let status = resp.status().as_u16();
                    let body = resp.text().await?;
                    Ok::<_, reqwest::Error>((status, body))
                }
                .await;
                match outcome {
                    Ok((status, body)) => write_guest_json(&mut caller, &json!({ "status": status, "body": body })),
                    Err(e) => write_guest_json(&mut caller, &json!({ "error": e.to_string() })),
                }
            })
        },
    )?;

    Ok(())
}
