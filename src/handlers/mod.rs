pub mod election_handlers;
pub mod voting_handlers;
pub mod whitelist_handlers;

pub use election_handlers::*;
pub use voting_handlers::*;
pub use whitelist_handlers::*;

use crate::response::ApiReply;
use serde_json::{json, Value};

pub async fn health() -> ApiReply<Value> {
    ApiReply::ok(
        "Dvota API is running",
        json!({ "version": env!("CARGO_PKG_VERSION") }),
    )
}
