use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Checking,
    Granted,
    Denied,
    PromptNeeded,
}

/// What the page renders. `Unsupported` wins over any status once the
/// capability probe has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateView {
    Unsupported,
    Checking,
    Granted,
    Denied,
    PromptNeeded,
}

impl GateView {
    pub fn resolve(supported: Option<bool>, status: AuthorizationStatus) -> Self {
        if supported == Some(false) {
            return Self::Unsupported;
        }
        match status {
            AuthorizationStatus::Checking => Self::Checking,
            AuthorizationStatus::Granted => Self::Granted,
            AuthorizationStatus::Denied => Self::Denied,
            AuthorizationStatus::PromptNeeded => Self::PromptNeeded,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unsupported => "Unsupported",
            Self::Checking => "Checking",
            Self::Granted => "Granted",
            Self::Denied => "Denied",
            Self::PromptNeeded => "Permission needed",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::Unsupported => "is-danger",
            Self::Checking => "is-info",
            Self::Granted => "is-success",
            Self::Denied => "is-warning",
            Self::PromptNeeded => "is-dark",
        }
    }

    pub fn accepts_request(self) -> bool {
        matches!(self, Self::Denied | Self::PromptNeeded)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GateSnapshot {
    pub supported: Option<bool>,
    pub status: AuthorizationStatus,
    pub view: GateView,
    pub message: Option<String>,
}
