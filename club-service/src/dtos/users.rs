use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RoleUpdateRequest {
    /// One of `user`, `core_member`, `admin`.
    #[schema(example = "core_member")]
    pub role: String,
}
