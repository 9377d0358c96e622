// src/utils/html.rs

/// Strips dangerous markup from admin-entered text (quiz titles, question
/// content, explanations, choices) before it is stored.
///
/// Whitelist-based: safe tags like <b> or <p> survive, <script> and
/// event-handler attributes do not.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

pub fn clean_optional(input: Option<String>) -> Option<String> {
    input.map(|s| clean_html(&s))
}
