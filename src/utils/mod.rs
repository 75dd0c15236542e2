/// Utility functions and helpers
use sha2::{Digest, Sha256};

/// Stable key for a cluster, derived from its primary's address
pub fn server_hash(primary_address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(primary_address.as_bytes());
    hex::encode(hasher.finalize())
}

/// Server root of a database URL (`http://host:8080/databases/foo` -> `http://host:8080`)
pub fn root_database_url(url: &str) -> &str {
    let root = match url.find("/databases/") {
        Some(index) => &url[..index],
        None => url,
    };
    root.trim_end_matches('/')
}

/// Format duration for human-readable output
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
