use crate::record::normalize_line;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;

/// Upper bound on causal-chain traversal. Well-formed chains terminate long
/// before this; the bound keeps a malformed, self-referential chain from
/// looping forever.
pub const MAX_CAUSE_DEPTH: usize = 32;

/// Placeholder for a message or type name that is not available.
pub const NOT_DEFINED: &str = "NotDefined";

/// Placeholder for a missing stack trace.
pub const NO_STACK_TRACE: &str = "NoStackTrace";

/// Borrowed view of an error handed to the pipeline.
///
/// Rust erases the concrete type once an error is behind `dyn Error`, so the
/// type name must be captured at the call site while it is still known.
pub struct SourceError<'a> {
    pub error: &'a (dyn Error + 'static),
    pub type_name: Option<&'a str>,
}

impl<'a> SourceError<'a> {
    /// Wrap a typed error, capturing its concrete type name.
    pub fn new<E: Error + 'static>(error: &'a E) -> Self {
        SourceError {
            error,
            type_name: Some(std::any::type_name::<E>()),
        }
    }

    /// Wrap an already-erased error; its type name is unknown.
    pub fn from_dyn(error: &'a (dyn Error + 'static)) -> Self {
        SourceError {
            error,
            type_name: None,
        }
    }
}

/// Capture the current stack trace, if backtraces are enabled for the
/// process. Returns `None` when capture is disabled or unsupported.
pub fn capture_stack_trace() -> Option<String> {
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        Some(backtrace.to_string())
    } else {
        None
    }
}

/// Append the flattened causal chain of `source` to `out`.
///
/// Each exception in the chain, outermost first, contributes one labeled
/// block with its normalized message, type name and stack trace. The first
/// block is labeled "Original", every later one "Inner". Unavailable fields
/// are replaced by [`NOT_DEFINED`] / [`NO_STACK_TRACE`]; only the outermost
/// block can carry a type name and a stack trace.
pub fn append_error_details(out: &mut String, source: SourceError<'_>, stack_trace: Option<&str>) {
    let mut current: Option<&(dyn Error + 'static)> = Some(source.error);
    let mut depth = 0;

    while let Some(error) = current {
        if depth == MAX_CAUSE_DEPTH {
            break;
        }

        let label = if depth == 0 { "Original" } else { "Inner" };
        out.push_str(&format!("\n\n--- {} Exception Details ---\n\n", label));

        let mut message = normalize_line(&error.to_string());
        if message.is_empty() {
            message = NOT_DEFINED.to_string();
        }

        let type_name = if depth == 0 {
            source.type_name.unwrap_or(NOT_DEFINED)
        } else {
            NOT_DEFINED
        };

        let trace = if depth == 0 {
            stack_trace.unwrap_or(NO_STACK_TRACE)
        } else {
            NO_STACK_TRACE
        };

        out.push_str(&format!(
            "    Message: {}\n    Type: {}\n    Stack Trace:\n    {}",
            message,
            type_name,
            indent_trace(trace)
        ));

        current = error.source();
        depth += 1;
    }
}

fn indent_trace(trace: &str) -> String {
    trace.replace("\r\n", "\n").replace('\n', "\n    ")
}
