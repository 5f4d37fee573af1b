// ABOUTME: Shared utility functions for text processing and Matrix message formatting
// ABOUTME: Includes markdown-to-HTML conversion, user pills, and code fences

use pulldown_cmark::{html, Parser};

/// Convert markdown to HTML for Matrix message formatting
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Link to a user that clients render as a mention pill
pub fn make_pill(user_id: &str, display_name: Option<&str>) -> String {
    let display_name = display_name.unwrap_or(user_id);
    format!(
        "<a href=\"https://matrix.to/#/{}\">{}</a>",
        user_id, display_name
    )
}

/// Wrap command output in a fenced code block
pub fn code_block(text: &str) -> String {
    format!("```\n{}\n```", text.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_to_html_paragraph() {
        assert_eq!(markdown_to_html("hello"), "<p>hello</p>\n");
    }

    #[test]
    fn test_make_pill_defaults_to_user_id() {
        assert_eq!(
            make_pill("@alice:example.org", None),
            "<a href=\"https://matrix.to/#/@alice:example.org\">@alice:example.org</a>"
        );
        assert!(make_pill("@alice:example.org", Some("Alice")).ends_with(">Alice</a>"));
    }

    #[test]
    fn test_code_block_trims_trailing_newlines() {
        assert_eq!(code_block("a\nb\n\n"), "```\na\nb\n```");
    }
}
