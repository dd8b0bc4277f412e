use std::fmt::Display;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::utils::error::{Result, StreamError};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl Display, reason: impl Into<String>) -> StreamError {
    StreamError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Only `http` and `https` streams can be followed.
pub fn validate_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| invalid(field, value, format!("Invalid URL format: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(field, value, format!("Unsupported URL scheme: {}", scheme))),
    }
}

pub fn validate_hostname(field: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(invalid(field, value, "Host name cannot be empty or contain spaces"));
    }
    Ok(())
}

pub fn validate_port(field: &str, port: u16) -> Result<()> {
    if port == 0 {
        return Err(invalid(field, port, "Port must be between 1 and 65535"));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + Display + Copy>(field: &str, value: T, min: T, max: T) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(field, value, format!("Value must be between {} and {}", min, max)));
    }
    Ok(())
}

/// `#rrggbb` or `#rrggbbaa`, the forms written by the colour pickers of the desktop viewer.
pub fn validate_color(field: &str, value: &str) -> Result<()> {
    static COLOR: OnceLock<Regex> = OnceLock::new();
    let re = COLOR.get_or_init(|| {
        Regex::new(r"^#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("colour pattern is a valid regex")
    });
    if !re.is_match(value) {
        return Err(invalid(field, value, "Expected a colour like #1a2b3c or #1a2b3cff"));
    }
    Ok(())
}
