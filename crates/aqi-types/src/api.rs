use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AqiCategory, FeedbackStatus, IssueType, Role, StatusFilter};

// -- JWT Claims --

/// Session token claims. `sub` is the username; `role` is informational
/// only, the authoritative role is re-read from the store per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,
}

/// Password reset claims. `fp` fingerprints the password hash the token was
/// issued against, so the token dies as soon as the password changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: String,
    pub purpose: String,
    pub fp: String,
    pub exp: usize,
    pub jti: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FederatedLoginRequest {
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetDelivery {
    Sent,
    Failed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetResponse {
    pub status: ResetDelivery,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteResetRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// -- Profile --

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub role: Role,
    pub subscription: bool,
    pub federated: bool,
    /// Base64 of the stored image, if any.
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionRequest {
    pub subscribed: bool,
}

// -- Admin: users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub role: Role,
    pub subscription: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteUsersRequest {
    pub usernames: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUsersResponse {
    pub deleted: usize,
}

// -- Feedback --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitFeedbackRequest {
    pub city: String,
    pub issue_type: IssueType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub id: i64,
    pub username: String,
    pub city: String,
    pub issue_type: IssueType,
    pub description: Option<String>,
    pub status: FeedbackStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackQuery {
    #[serde(default)]
    pub status: StatusFilter,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveFeedbackRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveFeedbackResponse {
    pub resolved: usize,
}

// -- Activity log --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub username: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

// -- Settings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub maintenance: bool,
    pub notice: Option<String>,
}

// -- Air quality --

#[derive(Debug, Default, Deserialize)]
pub struct AirQuery {
    /// Comma-separated city names. Empty or absent means every city.
    pub cities: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQualityRecord {
    pub city: String,
    pub date: NaiveDate,
    pub aqi: Option<f64>,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
    pub o3: Option<f64>,
    pub category: AqiCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollutantAverage {
    pub pollutant: String,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: AqiCategory,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub cities: Vec<String>,
    pub records: usize,
    pub average_aqi: Option<f64>,
    pub max_aqi: Option<f64>,
    pub pollutants: Vec<PollutantAverage>,
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictRequest {
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub co: f64,
    pub o3: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub aqi: f64,
    pub category: AqiCategory,
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub city: String,
    pub date: NaiveDate,
    pub predicted_aqi: f64,
    pub category: AqiCategory,
}
