//! Target URL construction.

/// Join a backend base URL with the inbound path and query.
///
/// Never produces a double slash at the seam; an empty path yields the bare
/// base URL.
pub fn build_target_url(base: &str, path: &str, query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    let mut target = if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    };

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }

    target
}
