//! Wire contract with the surrounding messaging layer.
//!
//! Only the message shapes are owned here; the transport (pub/sub bus) is
//! the caller's concern. Task correlation state lives with the messaging
//! layer, not in this pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Document, FlagSet, IdentityClaim, VerificationStatus};

/// Workflow step name published with every verification result.
pub const STEP_KYC_DONE: &str = "kyc_done";

/// User-asserted identity data as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub full_name: String,
    pub dob: String,
    pub address: String,
}

impl From<UserData> for IdentityClaim {
    fn from(user: UserData) -> Self {
        IdentityClaim {
            full_name: user.full_name,
            date_of_birth: user.dob,
            address: user.address,
        }
    }
}

/// One verification task received from the messaging layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub task_id: String,
    pub user_id: String,
    pub user_data: UserData,
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// Task-level verification outcome inside the response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub match_score: f64,
    pub flags: FlagSet,
    pub metadata: Value,
}

/// Response published back to the messaging layer. Always complete and
/// well-formed: failure manifests only as a more conservative status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub task_id: String,
    pub user_id: String,
    pub step: String,
    pub result: VerificationResult,
}
