pub mod api;
pub mod db;
pub mod vendor_http;
pub mod weather_http;
