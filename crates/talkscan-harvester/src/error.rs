use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("element interaction failed: {reason}")]
    Interaction { reason: String },

    #[error("could not parse \"{input}\": {reason}")]
    Parse { input: String, reason: String },

    #[error("timed out after {waited_ms}ms waiting for {what}")]
    Timeout { what: String, waited_ms: u64 },

    #[error("page session unusable: {reason}")]
    Session { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Only a broken page session ends the whole run; everything else is
    /// recovered at the element, block, or URL scope.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarvestError::Session { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_session_errors_are_fatal() {
        assert!(HarvestError::Session {
            reason: "invalid session id".to_string()
        }
        .is_fatal());
        assert!(!HarvestError::Interaction {
            reason: "stale element reference".to_string()
        }
        .is_fatal());
        assert!(!HarvestError::Timeout {
            what: "listing content".to_string(),
            waited_ms: 10
        }
        .is_fatal());
        assert!(!HarvestError::Navigation {
            url: "https://www.dcard.tw/search".to_string(),
            reason: "unknown error".to_string()
        }
        .is_fatal());
    }
}
