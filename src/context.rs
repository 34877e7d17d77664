use uuid::Uuid;

/// Per-request context: a correlation id attached to every log line a
/// handler emits. Never shared across requests.
#[derive(Debug, Clone)]
pub struct Context {
    pub request_id: String,
}

impl Context {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Context for tests and internal callers that are not tied to an
    /// inbound request.
    pub fn internal() -> Self {
        Self {
            request_id: "internal".into(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
