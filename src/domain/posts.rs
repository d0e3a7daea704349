//! Field rules shared by post and comment submissions.

use crate::domain::error::DomainError;

pub const POST_TEXT_FIELD: &str = "text";
pub const POST_GROUP_FIELD: &str = "group";
pub const POST_IMAGE_FIELD: &str = "image";
pub const COMMENT_TEXT_FIELD: &str = "text";

pub const USERNAME_MAX_LEN: usize = 150;
pub const GROUP_TITLE_MAX_LEN: usize = 200;

/// Trim submitted text and reject it when nothing remains.
pub fn normalize_text(field: &'static str, input: &str) -> Result<String, DomainError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "This field is required."));
    }
    Ok(trimmed.to_string())
}

/// Usernames appear in URLs, so only ASCII letters, digits and `@.+-_` are accepted.
pub fn validate_username(input: &str) -> Result<String, DomainError> {
    let username = normalize_text("username", input)?;
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(DomainError::validation(
            "username",
            format!("must be at most {USERNAME_MAX_LEN} characters"),
        ));
    }
    if let Some(ch) = username
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_')))
    {
        return Err(DomainError::validation(
            "username",
            format!("unsupported character `{ch}`"),
        ));
    }
    Ok(username)
}

pub fn validate_group_title(input: &str) -> Result<String, DomainError> {
    let title = normalize_text("title", input)?;
    if title.chars().count() > GROUP_TITLE_MAX_LEN {
        return Err(DomainError::validation(
            "title",
            format!("must be at most {GROUP_TITLE_MAX_LEN} characters"),
        ));
    }
    Ok(title)
}
