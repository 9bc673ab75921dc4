//! HTTP protocol layer module
//!
//! Response builders shared by the router and the connection layer.

pub mod response;

// Re-export commonly used types
pub use response::{
    build_500_response, build_error_response, build_json_response, build_preflight_response,
    build_raw_json_response,
};
