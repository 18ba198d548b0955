use crate::error::ApiError;

/// Trimmed, non-empty, at most `max` characters.
pub(crate) fn required(field: &str, value: &str, max: usize) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max {
        return Err(ApiError::validation(format!("{} must be at most {} characters", field, max)));
    }
    Ok(trimmed.to_string())
}

/// Like `required`, for fields that may be left out.
pub(crate) fn optional(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, ApiError> {
    value.map(|v| required(field, v, max)).transpose()
}

pub(crate) fn email(value: &str) -> Result<String, ApiError> {
    let email = required("email", value, 254)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::validation("email is not a valid address")),
    }
}

pub(crate) fn list(field: &str, values: &[String], max_items: usize) -> Result<Vec<String>, ApiError> {
    if values.len() > max_items {
        return Err(ApiError::validation(format!("{} may hold at most {} entries", field, max_items)));
    }
    values.iter().map(|v| required(field, v, 64)).collect()
}
