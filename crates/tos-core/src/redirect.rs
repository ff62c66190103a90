/// Return `target` if it stays on this origin, otherwise `fallback`.
///
/// Only absolute paths are accepted: a single leading `/`, no scheme, no
/// authority (`//host` or `/\host`), no whitespace or control characters.
pub fn safe_redirect<'a>(target: Option<&'a str>, fallback: &'a str) -> &'a str {
    match target {
        Some(t) if is_same_origin_path(t) => t,
        _ => fallback,
    }
}

pub fn is_same_origin_path(target: &str) -> bool {
    let mut chars = target.chars();
    if chars.next() != Some('/') {
        return false;
    }
    if matches!(chars.next(), Some('/') | Some('\\')) {
        return false;
    }
    !target.chars().any(|c| c.is_whitespace() || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_local_paths() {
        assert!(is_same_origin_path("/"));
        assert!(is_same_origin_path("/dashboard/"));
        assert!(is_same_origin_path("/view/?param=http://example.com"));
    }

    #[test]
    fn test_rejects_offsite_targets() {
        for target in [
            "",
            "http://example.com",
            "//example.com/",
            "/\\example.com",
            "example.com",
            "/has space",
            "/line\nbreak",
            "javascript:alert(1)",
        ] {
            assert!(!is_same_origin_path(target), "{:?} should be rejected", target);
        }
    }

    #[test]
    fn test_fallback() {
        assert_eq!(safe_redirect(Some("//evil.test"), "/"), "/");
        assert_eq!(safe_redirect(None, "/home/"), "/home/");
        assert_eq!(safe_redirect(Some("/ok/"), "/"), "/ok/");
    }
}
