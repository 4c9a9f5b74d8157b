/// Check the trigger request's authorization header against the shared
/// scheduler secret. Expects `Bearer <secret>`; the comparison is constant
/// time over the full header value.
pub fn is_authorized(header_value: Option<&str>, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(header) = header_value else {
        return false;
    };
    let expected = format!("Bearer {secret}");
    constant_time_eq(header.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_bearer_token() {
        assert!(is_authorized(Some("Bearer hunter2"), "hunter2"));
    }

    #[test]
    fn rejects_wrong_or_missing_token() {
        assert!(!is_authorized(Some("Bearer hunter3"), "hunter2"));
        assert!(!is_authorized(Some("hunter2"), "hunter2"));
        assert!(!is_authorized(Some("Bearer hunter22"), "hunter2"));
        assert!(!is_authorized(None, "hunter2"));
    }

    #[test]
    fn rejects_everything_when_secret_unset() {
        assert!(!is_authorized(Some("Bearer "), ""));
        assert!(!is_authorized(None, ""));
    }
}
