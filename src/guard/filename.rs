use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strips directory separators, replaces disallowed characters, collapses
/// whitespace, and truncates to 255 bytes. An empty result is replaced with
/// `upload_<8 hex chars>`.
pub fn sanitize_filename(input: &str) -> String {
    let stripped = input.replace(['/', '\\'], "");

    let replaced: String = stripped
        .chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '|' | '?' | '*' | '"' => '_',
            c if (c as u32) <= 31 => '_',
            other => other,
        })
        .collect();

    let collapsed = WHITESPACE_RUN.replace_all(replaced.trim(), " ").to_string();

    let truncated = truncate_to_bytes(&collapsed, 255);

    if truncated.trim().is_empty() {
        format!("upload_{}", random_hex(8))
    } else {
        truncated
    }
}

fn truncate_to_bytes(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn random_hex(len: usize) -> String {
    uuid::Uuid::new_v4().simple().to_string()[..len].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directory_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "..etcpasswd");
    }

    #[test]
    fn replaces_disallowed_characters() {
        assert_eq!(sanitize_filename("a<b>c:d|e?f*g\"h"), "a_b_c_d_e_f_g_h");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(sanitize_filename("a   b\t\tc"), "a b c");
    }

    #[test]
    fn truncates_to_255_bytes() {
        let long = "a".repeat(300);
        let result = sanitize_filename(&long);
        assert_eq!(result.len(), 255);
    }

    #[test]
    fn empty_result_gets_upload_fallback() {
        let result = sanitize_filename("///");
        assert!(result.starts_with("upload_"));
        assert_eq!(result.len(), "upload_".len() + 8);
    }
}
