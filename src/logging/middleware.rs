//! Trace id generation

use uuid::Uuid;

/// Generate a new trace id using UUID v4
///
/// Used when a chat request carries no trace id in its body or headers.
///
/// # Examples
///
/// ```
/// use gateway::logging::generate_trace_id;
///
/// let trace_id = generate_trace_id();
/// assert!(!trace_id.is_empty());
/// ```
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}
