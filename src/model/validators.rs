use regex::Regex;
use std::sync::OnceLock;

fn version_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version name regex must compile"))
}

fn view_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/[A-Za-z0-9/_.\-]+$").expect("view path regex must compile"))
}

/// `major.minor.patch`, digits only.
pub fn validate_version_name(value: &str) -> Result<(), String> {
    if version_name_re().is_match(value) {
        Ok(())
    } else {
        Err(format!("'{}' is not a major.minor.patch version", value))
    }
}

/// Free-form site path: must start with '/' and never contain "::".
pub fn validate_path(value: &str) -> Result<(), String> {
    if !value.starts_with('/') {
        return Err(format!("Your path is not started with '/': '{}'", value));
    }
    if value.contains("::") {
        return Err(format!("Path '{}' must not contain '::'", value));
    }
    Ok(())
}

/// View path: must start with '/' and use only URL-safe path characters.
pub fn validate_view_path(value: &str) -> Result<(), String> {
    if !value.starts_with('/') {
        return Err(format!("Your path is not started with '/': '{}'", value));
    }
    if view_path_re().is_match(value) {
        Ok(())
    } else {
        Err(format!("'{}' contains characters not allowed in a view path", value))
    }
}

/// Absolute view URLs may point off-site, so only the separator rule applies.
pub fn validate_absolute_url(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("Absolute view url must not be empty".to_string());
    }
    if value.contains("::") {
        return Err(format!("Url '{}' must not contain '::'", value));
    }
    Ok(())
}

/// View codes are slugs.
pub fn validate_view_code(value: &str) -> Result<(), String> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid view code slug", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_names() {
        assert!(validate_version_name("1.0.0").is_ok());
        assert!(validate_version_name("12.4.10").is_ok());
        assert!(validate_version_name("1.0").is_err());
        assert!(validate_version_name("v1.0.0").is_err());
    }

    #[test]
    fn paths_need_leading_slash() {
        assert!(validate_path("/blog").is_ok());
        assert!(validate_path("blog").is_err());
        assert!(validate_path("/a::b").is_err());
        assert!(validate_view_path("/users/list").is_ok());
        assert!(validate_view_path("/users list").is_err());
        assert!(validate_view_path("users").is_err());
    }

    #[test]
    fn view_codes_are_slugs() {
        assert!(validate_view_code("user-list_v2").is_ok());
        assert!(validate_view_code("").is_err());
        assert!(validate_view_code("user list").is_err());
    }
}
