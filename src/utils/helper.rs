use std::time::Duration;

pub fn add_indent(s: &str, indent: usize, indent_first_line: bool) -> String {
    let indent_str = " ".repeat(indent);
    s.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 && !indent_first_line {
                line.into()
            } else {
                format!("{}{}", indent_str, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Models are sloppy about tool names; registries match on the
/// normalized form.
pub fn normalize_tool_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Metadata stores durations as integer milliseconds.
pub fn duration_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tool_name() {
        assert_eq!(normalize_tool_name("Web Search"), "web_search");
        assert_eq!(normalize_tool_name("  calculator "), "calculator");
    }

    #[test]
    fn test_add_indent() {
        assert_eq!(add_indent("a\nb", 2, false), "a\n  b");
        assert_eq!(add_indent("a\nb", 2, true), "  a\n  b");
    }
}
