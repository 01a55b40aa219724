//! Exit codes following sysexits.h conventions.
//!
//! These codes give scripts and CI systems a way to tell a missing watermark
//! apart from a broken input file or an unreachable registry.

use tracemark_core::TracemarkError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid creator id or timestamp).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// No watermark recovered, image not registered, or ledger chain broken.
/// Maps to EX_DATAERR from sysexits.h.
pub const NOT_VERIFIED: i32 = 65;

/// Cannot open or decode the input image, or it cannot carry a watermark.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Registry unreachable, timed out or rejected the record.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const REGISTRY_UNAVAILABLE: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let classified = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<TracemarkError>())
            .map(classify);

        let code = classified.unwrap_or_else(|| {
            if message.contains("Failed to read") {
                INPUT_ERROR
            } else if message.contains("Failed to write") {
                IO_ERROR
            } else if message.contains("registry") {
                REGISTRY_UNAVAILABLE
            } else {
                GENERAL_ERROR
            }
        });

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify(err: &TracemarkError) -> i32 {
    match err {
        TracemarkError::InvalidPayload(_) => USAGE_ERROR,
        TracemarkError::ImageLoad(_)
        | TracemarkError::ImageTooSmall { .. }
        | TracemarkError::Unrecoverable(_)
        | TracemarkError::InvalidDataUrl(_) => INPUT_ERROR,
        TracemarkError::Registry(_) | TracemarkError::Timeout(_) => REGISTRY_UNAVAILABLE,
        TracemarkError::ImageEncode(_) | TracemarkError::Io(_) => IO_ERROR,
        TracemarkError::Transform(_)
        | TracemarkError::Serialization(_)
        | TracemarkError::Cancelled => GENERAL_ERROR,
        // HTTP transport errors, present when the core is built with `network`
        #[allow(unreachable_patterns)]
        _ => REGISTRY_UNAVAILABLE,
    }
}
