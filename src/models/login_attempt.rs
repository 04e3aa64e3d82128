use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginOutcome {
    Success,
    Failure,
}

impl LoginOutcome {
    // `successful` column value
    pub fn as_flag(self) -> &'static str {
        match self {
            LoginOutcome::Success => "Y",
            LoginOutcome::Failure => "N",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub username: String,
    pub timestamp: String,
    pub outcome: LoginOutcome,
}

impl LoginAttempt {
    pub fn new(username: String, timestamp: String, outcome: LoginOutcome) -> Self {
        Self {
            username,
            timestamp,
            outcome,
        }
    }

    pub fn failed(username: String, timestamp: String) -> Self {
        Self::new(username, timestamp, LoginOutcome::Failure)
    }

    pub fn succeeded(username: String, timestamp: String) -> Self {
        Self::new(username, timestamp, LoginOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_flags() {
        assert_eq!(LoginOutcome::Success.as_flag(), "Y");
        assert_eq!(LoginOutcome::Failure.as_flag(), "N");
    }

    #[test]
    fn test_serializes_outcome_lowercase() {
        let attempt = LoginAttempt::failed("root".to_string(), "2024-01-05 03:14:07".to_string());
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["username"], "root");
        assert_eq!(json["timestamp"], "2024-01-05 03:14:07");
        assert_eq!(json["outcome"], "failure");
    }
}
