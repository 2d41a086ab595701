//! Static informational endpoints.

use axum::Json;
use serde::Serialize;
use uuid::Uuid;

/// Platform name reported by `/version`.
pub const PLATFORM: &str = "Residorg";
/// Platform release reported by `/version`.
pub const PLATFORM_VERSION: &str = "3.0.1";
/// Fixed platform identifier reported by `/version`.
pub const PLATFORM_UID: Uuid = Uuid::from_u128(0x5f3c_9a1e_2b7d_4c60_8e14_a9d2_7b0c_3f51);

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub platform: &'static str,
    pub version: &'static str,
    pub uid: String,
    #[serde(rename = "guidBytes")]
    pub guid_bytes: Vec<u8>,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            platform: PLATFORM,
            version: PLATFORM_VERSION,
            uid: PLATFORM_UID.hyphenated().to_string(),
            guid_bytes: PLATFORM_UID.as_bytes().to_vec(),
        }
    }
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "healthy" })
}
