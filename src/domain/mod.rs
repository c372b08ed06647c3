pub mod credential;
pub mod models;
pub mod numeric;
pub mod sync_summary;
pub mod vendor_payload;
pub mod weather;
