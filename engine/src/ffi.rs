//! FFI layer for the mobile shell.
//!
//! This module provides C-compatible functions callable from the app's native
//! bridge. Structured data crosses the boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `fazenda_*` functions are allocated by Rust
//! - Caller must free them with `fazenda_string_free`
//! - `fazenda_version` returns a static string that must not be freed
//!
//! # Error Handling
//!
//! JSON-returning functions produce either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{
    calculate_calibration, calculate_confidence, kg_to_arrobas, smooth_count, summarize_pen,
    validate_camera_url, AggregationRule, CalibrationSample, CameraCountSample, CameraId,
    QueueSnapshot,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ffi::{c_char, CStr, CString};

/// Result wrapper for FFI responses.
#[derive(Serialize)]
#[serde(untagged)]
enum FfiResult<T: Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: Serialize> FfiResult<T> {
    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

impl<T: Serialize> From<Result<T, String>> for FfiResult<T> {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(ok) => FfiResult::Ok { ok },
            Err(error) => FfiResult::Err { error },
        }
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `fazenda_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .unwrap_or_default()
            .into_raw(),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Parse a JSON argument.
unsafe fn parse_arg<T: DeserializeOwned>(ptr: *const c_char, what: &str) -> Result<T, String> {
    let raw = from_c_string(ptr).ok_or_else(|| format!("invalid {} string", what))?;
    serde_json::from_str(&raw).map_err(|e| format!("parse error: {}", e))
}

fn respond<T: Serialize>(result: Result<T, String>) -> *mut c_char {
    to_c_string(FfiResult::from(result).to_json())
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `fazenda_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn fazenda_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Vision
// ============================================================================

/// Request body for `fazenda_pen_count`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PenCountRequest {
    samples: Vec<CameraCountSample>,
    #[serde(default)]
    rule: AggregationRule,
    #[serde(default)]
    primary_camera: Option<CameraId>,
}

/// Aggregate camera samples for one pen.
///
/// # Arguments
/// - `request_json`: `{"samples": [...], "rule": "median", "primaryCamera": 2}`
///
/// # Returns
/// JSON string: `{"ok": PenCountSummary}` or `{"error": "message"}`
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `fazenda_string_free`
#[no_mangle]
pub unsafe extern "C" fn fazenda_pen_count(request_json: *const c_char) -> *mut c_char {
    respond(
        parse_arg::<PenCountRequest>(request_json, "request")
            .map(|req| summarize_pen(&req.samples, req.rule, req.primary_camera)),
    )
}

/// Trailing moving average of a count history.
///
/// # Returns
/// JSON string: `{"ok": <count>}` or `{"error": "message"}`
///
/// # Safety
/// - `counts_json` must be a valid null-terminated C string (JSON array) or null
/// - Caller must free the returned string with `fazenda_string_free`
#[no_mangle]
pub unsafe extern "C" fn fazenda_smooth_count(
    counts_json: *const c_char,
    window_size: u32,
) -> *mut c_char {
    respond(
        parse_arg::<Vec<u32>>(counts_json, "counts")
            .map(|counts| smooth_count(&counts, window_size as usize)),
    )
}

/// Agreement confidence of a count series.
///
/// # Returns
/// JSON string: `{"ok": <confidence>}` or `{"error": "message"}`
///
/// # Safety
/// - `counts_json` must be a valid null-terminated C string (JSON array) or null
/// - Caller must free the returned string with `fazenda_string_free`
#[no_mangle]
pub unsafe extern "C" fn fazenda_confidence(counts_json: *const c_char) -> *mut c_char {
    respond(parse_arg::<Vec<u32>>(counts_json, "counts").map(|counts| calculate_confidence(&counts)))
}

/// Fit a calibration model.
///
/// # Arguments
/// - `samples_json`: `[{"estimated": 300, "actual": 320}, ...]`
///
/// # Returns
/// JSON string: `{"ok": CalibrationModel}` or `{"error": "message"}`
///
/// # Safety
/// - `samples_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `fazenda_string_free`
#[no_mangle]
pub unsafe extern "C" fn fazenda_calibrate(samples_json: *const c_char) -> *mut c_char {
    respond(
        parse_arg::<Vec<CalibrationSample>>(samples_json, "samples")
            .map(|samples| calculate_calibration(&samples)),
    )
}

/// Validate a camera stream URL. Null pointers are invalid.
///
/// # Safety
/// - `url` must be a valid null-terminated C string or null
#[no_mangle]
pub unsafe extern "C" fn fazenda_validate_camera_url(url: *const c_char) -> bool {
    from_c_string(url)
        .map(|u| validate_camera_url(&u))
        .unwrap_or(false)
}

// ============================================================================
// Calculator
// ============================================================================

/// Carcass arrobas for a live weight.
#[no_mangle]
pub extern "C" fn fazenda_kg_to_arrobas(kg: f64, carcass_yield: f64) -> f64 {
    kg_to_arrobas(kg, carcass_yield)
}

// ============================================================================
// Queue
// ============================================================================

/// Normalize a stored queue, upgrading the legacy array format.
///
/// # Returns
/// JSON string: `{"ok": QueueSnapshot}` or `{"error": "message"}`
///
/// # Safety
/// - `queue_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `fazenda_string_free`
#[no_mangle]
pub unsafe extern "C" fn fazenda_queue_migrate(queue_json: *const c_char) -> *mut c_char {
    let result = from_c_string(queue_json)
        .ok_or_else(|| "invalid queue string".to_string())
        .and_then(|raw| QueueSnapshot::from_json(&raw).map_err(|e| e.to_string()));
    respond(result)
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn fazenda_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Get the queue format version.
#[no_mangle]
pub extern "C" fn fazenda_queue_format_version() -> u32 {
    crate::QUEUE_FORMAT_VERSION
}
