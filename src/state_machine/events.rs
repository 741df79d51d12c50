use serde::{Deserialize, Serialize};

/// Events that can trigger job state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEvent {
    /// The service picked the job up
    Start,
    /// The service returned a result payload
    Succeed(String),
    /// The service reported an error, or submission was exhausted
    Fail(String),
    /// The local wait budget ran out, with the reason attached
    Expire(String),
}

impl JobEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Succeed(_) => "succeed",
            Self::Fail(_) => "fail",
            Self::Expire(_) => "expire",
        }
    }

    /// Extract the failure or expiry reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Fail(reason) | Self::Expire(reason) => Some(reason),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeed(_) | Self::Fail(_) | Self::Expire(_))
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(JobEvent::Start.event_type(), "start");
        assert_eq!(JobEvent::Succeed(String::new()).event_type(), "succeed");
        assert_eq!(
            JobEvent::fail_with_error("rate limited").event_type(),
            "fail"
        );
    }

    #[test]
    fn test_reason_extraction() {
        assert_eq!(
            JobEvent::Fail("boom".to_string()).reason(),
            Some("boom")
        );
        assert_eq!(
            JobEvent::Expire("waited 60s".to_string()).reason(),
            Some("waited 60s")
        );
        assert!(JobEvent::Start.reason().is_none());
    }
}
