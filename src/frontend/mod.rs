pub mod http;
pub mod http_utils;
pub mod odata;
