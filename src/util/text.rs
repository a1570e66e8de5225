use std::borrow::Cow;

/// Removes control characters and collapses runs of whitespace.
///
/// Feed titles regularly arrive with embedded newlines, tabs and the odd
/// escape byte. Returns `Cow::Borrowed` when the input is already clean.
///
/// # Examples
///
/// ```
/// use rssbar::util::clean_title;
///
/// assert_eq!(clean_title("Hello\n   world"), "Hello world");
/// assert_eq!(clean_title("  padded  "), "padded");
/// assert_eq!(clean_title("bell\x07"), "bell");
/// ```
pub fn clean_title(s: &str) -> Cow<'_, str> {
    let needs_cleaning = s.trim() != s
        || s.chars().any(char::is_control)
        || s.contains("  ");

    if !needs_cleaning {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    for c in s.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if c.is_control() {
            continue;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }

    Cow::Owned(out)
}

/// Case-insensitive substring match. An empty needle matches everything.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
