use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

pub const KEY_DATA_LEN: usize = 16;
pub const ROLLING_START_NUMBER: u32 = 2_655_169;
pub const TRANSMISSION_RISK_LEVEL: u8 = 0;
pub const ROLLING_PERIOD: u32 = 144;
pub const REGION: &str = "test:volume";

/// Upper bound on exposures generated at once for a single payload.
pub const EXPOSURE_CONCURRENCY: usize = 50;

/// A synthetic exposure key entry as accepted by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exposure {
    pub key_data: String,
    pub rolling_start_number: u32,
    pub transmission_risk_level: u8,
    pub rolling_period: u32,
    pub regions: Vec<String>,
}

pub type Payload = Vec<Exposure>;

pub fn generate_random_key_data() -> String {
    let mut bytes = [0u8; KEY_DATA_LEN];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

pub async fn generate_random_exposure() -> Exposure {
    Exposure {
        key_data: generate_random_key_data(),
        rolling_start_number: ROLLING_START_NUMBER,
        transmission_risk_level: TRANSMISSION_RISK_LEVEL,
        rolling_period: ROLLING_PERIOD,
        regions: vec![REGION.to_string()],
    }
}

/// Generate `count` exposures. Records are independent, so completion order
/// is not preserved.
pub async fn generate_random_payload(count: usize) -> Payload {
    stream::iter(0..count)
        .map(|_| generate_random_exposure())
        .buffer_unordered(EXPOSURE_CONCURRENCY)
        .collect()
        .await
}
