//! Per-page access overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Explicit allow/deny for one user on one page path. No row means the
/// role rules decide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub page_path: String,
    pub can_access: bool,
    pub updated_at: DateTime<Utc>,
}

/// Normalize a page path for storage and matching: leading slash, no
/// trailing slash, no query or fragment, lower-case. Empty and `.` segments
/// are dropped and `..` pops its parent, so `//admin` and `/x/../admin`
/// both become `/admin`.
pub fn normalize_page_path(path: &str) -> String {
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_page_path("/Cybercrime/"), "/cybercrime");
        assert_eq!(normalize_page_path("cid?tab=2"), "/cid");
        assert_eq!(normalize_page_path("/"), "/");
        assert_eq!(normalize_page_path(""), "/");
    }

    #[test]
    fn collapses_slashes_and_dot_segments() {
        assert_eq!(normalize_page_path("//admin"), "/admin");
        assert_eq!(normalize_page_path("/x/../admin"), "/admin");
        assert_eq!(normalize_page_path("/cid/./reports//"), "/cid/reports");
        assert_eq!(normalize_page_path("/../../admin"), "/admin");
    }
}
