// src/utils.rs

/// First submitted render target. A blank first value counts as missing.
pub fn first_render_target(values: &[String]) -> Option<&str> {
    values
        .first()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Format elapsed seconds the way render timings are reported
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    format!("{:.3} secs", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_render_target() {
        let values = vec![
            " https://www.github.com ".to_string(),
            "https://www.wikipedia.org".to_string(),
        ];
        assert_eq!(first_render_target(&values), Some("https://www.github.com"));
        assert_eq!(first_render_target(&[]), None);
        assert_eq!(first_render_target(&["  ".to_string()]), None);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.500 secs");
    }
}
