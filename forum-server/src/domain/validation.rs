use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use validator::ValidateEmail;

use crate::domain::error::DomainError;

/// Markup allowed in post text.
pub const ALLOWED_TAGS: &[&str] = &["a", "code", "i", "strong"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
pub const TEXT_FILE_EXTENSIONS: &[&str] = &["txt"];
pub const MIN_USERNAME_LEN: usize = 3;
/// Width of `posts.username`, which copies the author's name.
pub const MAX_USERNAME_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_SEARCH_QUERY_LEN: usize = 2;

static TAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?([A-Za-z][A-Za-z0-9]*)\b").expect("valid tag regex"));

static FULL_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)\b([^>]*)>").expect("valid tag regex")
});

static LINK_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(href|title)\s*=\s*("[^"]*"|'[^']*')"#).expect("valid attribute regex")
});

/// Trims the text, rejects disallowed markup and strips attributes other than
/// `href`/`title` on links. Links to anything but http(s)/mailto lose their href.
pub fn sanitize_post_text(raw: &str) -> Result<String, DomainError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DomainError::validation("post text must not be empty"));
    }

    let disallowed: BTreeSet<String> = TAG_NAME
        .captures_iter(text)
        .map(|caps| caps[1].to_lowercase())
        .filter(|tag| !ALLOWED_TAGS.contains(&tag.as_str()))
        .collect();
    if !disallowed.is_empty() {
        let tags: Vec<&str> = disallowed.iter().map(String::as_str).collect();
        return Err(DomainError::validation(format!(
            "disallowed HTML tags: {}",
            tags.join(", ")
        )));
    }

    let cleaned = FULL_TAG.replace_all(text, |caps: &Captures| {
        let closing = &caps[1];
        let name = caps[2].to_lowercase();
        if !closing.is_empty() {
            return format!("</{name}>");
        }
        if name != "a" {
            return format!("<{name}>");
        }
        let attrs: Vec<String> = LINK_ATTR
            .captures_iter(&caps[3])
            .filter(|attr| {
                !attr[1].eq_ignore_ascii_case("href") || is_safe_href(unquote(&attr[2]))
            })
            .map(|attr| format!("{}={}", attr[1].to_lowercase(), &attr[2]))
            .collect();
        if attrs.is_empty() {
            "<a>".to_string()
        } else {
            format!("<a {}>", attrs.join(" "))
        }
    });

    Ok(cleaned.into_owned())
}

fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}

fn is_safe_href(href: &str) -> bool {
    let href = href.trim().to_ascii_lowercase();
    if !href.contains(':') {
        return true;
    }
    ["http:", "https:", "mailto:"]
        .iter()
        .any(|scheme| href.starts_with(scheme))
}

pub fn validate_username(username: &str) -> Result<String, DomainError> {
    let username = username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(DomainError::validation(format!(
            "username must be at least {MIN_USERNAME_LEN} characters long"
        )));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters long"
        )));
    }
    Ok(username.to_string())
}

pub fn validate_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim();
    if !email.validate_email() {
        return Err(DomainError::validation("invalid email address"));
    }
    Ok(email.to_string())
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

/// Returns the trimmed query, rejecting anything shorter than two characters.
pub fn validate_search_query(query: &str) -> Result<String, DomainError> {
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_QUERY_LEN {
        return Err(DomainError::validation(format!(
            "search query must be at least {MIN_SEARCH_QUERY_LEN} characters long"
        )));
    }
    Ok(query.to_string())
}

/// Lowercased extension of an uploaded file, if it is one of `allowed`.
pub fn allowed_extension(filename: &str, allowed: &[&str]) -> Result<String, DomainError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if allowed.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        let formats: Vec<String> = allowed.iter().map(|ext| ext.to_uppercase()).collect();
        Err(DomainError::validation(format!(
            "unsupported file type, allowed formats: {}",
            formats.join(", ")
        )))
    }
}
