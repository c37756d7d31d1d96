//! Page data for the dashboard routes. Rendering happens in the frontend.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::{
    api_keys::ApiKeyResponse, device::DeviceRequestStatus, dns_tokens::DnsTokenResponse, users::CurrentUser,
    zones::ZoneWithRecords,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthPageData {
    /// Where to send the user after signing in
    pub redirect_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardPageData {
    pub user: CurrentUser,
    pub tokens: Vec<DnsTokenResponse>,
    pub zones: Vec<ZoneWithRecords>,
    pub api_keys: Vec<ApiKeyResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DevicePageData {
    pub user: CurrentUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceApprovePageData {
    pub user: CurrentUser,
    pub user_code: String,
    /// The pending request behind `user_code`, if it is known and unexpired
    pub request: Option<DeviceRequestStatus>,
}
