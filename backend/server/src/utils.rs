use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_NAME_LEN: usize = 50;

static CONTROL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Cc}").unwrap());
static OPERATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\$+").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());

/// Strips control characters and leading `$` operators, collapses whitespace.
pub fn sanitize(input: &str) -> String {
    let s = CONTROL.replace_all(input, " ");
    let s = SPACES.replace_all(s.trim(), " ");

    OPERATOR.replace(&s, "").trim().to_string()
}

pub fn validate_name(raw: Option<&str>, kind: &str) -> Result<String, AppError> {
    let name = raw.map(sanitize).unwrap_or_default();

    if name.is_empty() {
        return Err(AppError::Validation(format!("{kind} name is required")));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "{kind} name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    Ok(name)
}

pub fn validate_color(raw: Option<&str>) -> Result<String, AppError> {
    let color = raw.map(sanitize).unwrap_or_default();

    if !COLOR.is_match(&color) {
        return Err(AppError::Validation(
            "Color must be a hex code like #AABBCC".to_string(),
        ));
    }

    Ok(color)
}

pub fn parse_id(raw: Option<&str>, kind: &str) -> Result<Uuid, AppError> {
    let raw = raw.map(str::trim).unwrap_or_default();

    if raw.is_empty() {
        return Err(AppError::Validation(format!("{kind} id is required")));
    }

    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid {kind} id")))
}
