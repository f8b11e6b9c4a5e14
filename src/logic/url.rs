use regex::Regex;
use std::sync::OnceLock;

fn semantic_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("semantic version regex must compile"))
}

fn is_zero(component: &str) -> bool {
    component.bytes().all(|b| b == b'0')
}

/// URL path segment for a release name.
///
/// Major releases get `vX`, minor releases `vY` and patch releases the full
/// `vX.Y.Z`; anything that is not `X.Y.Z` is used verbatim after the `v`.
pub fn version_path_segment(version_name: &str) -> String {
    let Some(caps) = semantic_version_re().captures(version_name) else {
        return format!("v{}", version_name);
    };
    let (major, minor, patch) = (&caps[1], &caps[2], &caps[3]);
    if is_zero(minor) && is_zero(patch) {
        format!("v{}", major)
    } else if is_zero(patch) {
        format!("v{}", minor)
    } else {
        format!("v{}", version_name)
    }
}

pub fn append_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Join two URL parts with exactly one '/' between them.
pub fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
