pub mod descriptor;

pub use descriptor::{normalize_server_data, parse_timestamp, SearchQuery, ServerDescriptor};
