//! Core data types shared across the pipeline.

use serde::{Deserialize, Serialize};

/// One classifier output: a label and its confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class name from the model's label metadata
    pub label: String,

    /// Confidence score
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Kid-friendly guide content for one landmark.
///
/// Field names serialize in camelCase to match the JSON the generative
/// service is asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkRecord {
    /// Proper name of the landmark
    pub name: String,

    /// A short story about how/when it was built
    pub history: String,

    /// Surprising facts (three are requested, not enforced)
    pub fun_facts: Vec<String>,

    /// What it looks like, in simple terms
    pub architecture: String,

    /// Practical tips for visiting
    pub visit_info: String,
}

impl LandmarkRecord {
    /// Deterministic placeholder content used when enrichment fails.
    pub fn fallback(label: &str) -> Self {
        Self {
            name: label.to_string(),
            history: "We couldn't load the history right now, but it looks amazing!".to_string(),
            fun_facts: vec![
                "It's a mystery!".to_string(),
                "Try again later to learn more.".to_string(),
                "Ask a grown-up!".to_string(),
            ],
            architecture: "It looks very cool!".to_string(),
            visit_info: "Check local maps for info.".to_string(),
        }
    }

    /// Name of the first required field that is blank, if any.
    pub fn first_blank_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.history.trim().is_empty() {
            Some("history")
        } else if self.fun_facts.is_empty() || self.fun_facts.iter().all(|f| f.trim().is_empty())
        {
            Some("funFacts")
        } else if self.architecture.trim().is_empty() {
            Some("architecture")
        } else if self.visit_info.trim().is_empty() {
            Some("visitInfo")
        } else {
            None
        }
    }
}

/// The five application states. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    Home,
    AnalyzingImage,
    FetchingInfo,
    Result,
    Error,
}

impl AppState {
    pub const ALL: [AppState; 5] = [
        AppState::Home,
        AppState::AnalyzingImage,
        AppState::FetchingInfo,
        AppState::Result,
        AppState::Error,
    ];

    /// Loading message for the busy states.
    pub fn loading_message(self) -> Option<&'static str> {
        match self {
            AppState::AnalyzingImage => Some("Looking at your photo..."),
            AppState::FetchingInfo => Some("Checking the guide book..."),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AppState::Home => "HOME",
            AppState::AnalyzingImage => "ANALYZING_IMAGE",
            AppState::FetchingInfo => "FETCHING_INFO",
            AppState::Result => "RESULT",
            AppState::Error => "ERROR",
        };
        f.write_str(name)
    }
}
