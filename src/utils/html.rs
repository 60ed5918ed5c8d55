// src/utils/html.rs

/// Cleans admin-entered question HTML with ammonia's whitelist.
///
/// Formatting tags such as <b>, <sup> and <p> survive; <script>, <iframe>
/// and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_removed() {
        let cleaned = clean_html("x<sup>2</sup><script>alert(1)</script>");
        assert_eq!(cleaned, "x<sup>2</sup>");
    }
}
