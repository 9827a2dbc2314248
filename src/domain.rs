mod api_prefix;
mod request_path;

pub use api_prefix::*;
pub use request_path::*;
