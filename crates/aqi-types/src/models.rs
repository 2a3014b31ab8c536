use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// Feedback moves `Pending -> Resolved` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackStatus {
    Pending,
    Resolved,
}

impl FeedbackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Resolved" => Ok(Self::Resolved),
            other => Err(UnknownVariant::new("feedback status", other)),
        }
    }
}

/// Filter used when listing feedback. `All` matches every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Resolved,
}

impl StatusFilter {
    pub fn status(self) -> Option<FeedbackStatus> {
        match self {
            Self::All => None,
            Self::Pending => Some(FeedbackStatus::Pending),
            Self::Resolved => Some(FeedbackStatus::Resolved),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    #[serde(rename = "Incorrect Data")]
    IncorrectData,
    #[serde(rename = "Missing Data")]
    MissingData,
    #[serde(rename = "App Bug")]
    AppBug,
    #[serde(rename = "Feature Request")]
    FeatureRequest,
    Other,
}

impl IssueType {
    pub const ALL: [IssueType; 5] = [
        Self::IncorrectData,
        Self::MissingData,
        Self::AppBug,
        Self::FeatureRequest,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncorrectData => "Incorrect Data",
            Self::MissingData => "Missing Data",
            Self::AppBug => "App Bug",
            Self::FeatureRequest => "Feature Request",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("issue type", s))
    }
}

/// AQI severity buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
    Severe,
    Unknown,
}

impl AqiCategory {
    pub fn from_aqi(aqi: Option<f64>) -> Self {
        let Some(aqi) = aqi.filter(|v| v.is_finite()) else {
            return Self::Unknown;
        };
        if aqi <= 50.0 {
            Self::Good
        } else if aqi <= 100.0 {
            Self::Satisfactory
        } else if aqi <= 200.0 {
            Self::Moderate
        } else if aqi <= 300.0 {
            Self::Poor
        } else if aqi <= 400.0 {
            Self::VeryPoor
        } else {
            Self::Severe
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Satisfactory => "Satisfactory",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
            Self::Severe => "Severe",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_only_known_values() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn issue_type_uses_display_names() {
        let json = serde_json::to_string(&IssueType::AppBug).unwrap();
        assert_eq!(json, "\"App Bug\"");
        assert_eq!("Missing Data".parse::<IssueType>().unwrap(), IssueType::MissingData);
        assert!("Bug".parse::<IssueType>().is_err());
    }

    #[test]
    fn category_thresholds() {
        assert_eq!(AqiCategory::from_aqi(Some(0.0)), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(Some(50.0)), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(Some(50.5)), AqiCategory::Satisfactory);
        assert_eq!(AqiCategory::from_aqi(Some(200.0)), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(Some(300.0)), AqiCategory::Poor);
        assert_eq!(AqiCategory::from_aqi(Some(400.0)), AqiCategory::VeryPoor);
        assert_eq!(AqiCategory::from_aqi(Some(401.0)), AqiCategory::Severe);
        assert_eq!(AqiCategory::from_aqi(None), AqiCategory::Unknown);
        assert_eq!(AqiCategory::from_aqi(Some(f64::NAN)), AqiCategory::Unknown);
    }

    #[test]
    fn status_filter_maps_to_status() {
        assert_eq!(StatusFilter::All.status(), None);
        assert_eq!(StatusFilter::Pending.status(), Some(FeedbackStatus::Pending));
        assert_eq!(StatusFilter::Resolved.status(), Some(FeedbackStatus::Resolved));
    }
}
