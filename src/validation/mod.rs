use bigdecimal::BigDecimal;
use std::fmt;

use crate::domain::BuyerInfo;

pub const IDENTITY_NUMBER_MAX_LEN: usize = 32;
pub const FULL_NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PHONE_MIN_DIGITS: usize = 6;
pub const PHONE_MAX_DIGITS: usize = 15;
pub const QUANTITY_MAX: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_quantity(quantity: i32) -> ValidationResult {
    if quantity < 1 {
        return Err(ValidationError::new("quantity", "must be at least 1"));
    }
    if quantity > QUANTITY_MAX {
        return Err(ValidationError::new(
            "quantity",
            format!("must be at most {}", QUANTITY_MAX),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

/// IDR has no minor unit; Snap only accepts integral gross amounts.
pub fn validate_whole_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount.with_scale(0) != *amount {
        return Err(ValidationError::new(field, "must be a whole rupiah amount"));
    }

    Ok(())
}

pub fn validate_identity_number(value: &str) -> ValidationResult {
    validate_required("identityNumber", value)?;
    validate_max_len("identityNumber", value, IDENTITY_NUMBER_MAX_LEN)?;

    if !value.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "identityNumber",
            "must contain only letters and digits",
        ));
    }

    Ok(())
}

pub fn validate_email(value: &str) -> ValidationResult {
    validate_required("email", value)?;
    validate_max_len("email", value, EMAIL_MAX_LEN)?;

    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::new("email", "must be a valid email address"));
    }

    Ok(())
}

pub fn validate_phone(value: &str) -> ValidationResult {
    validate_required("phone", value)?;

    let digits = value.strip_prefix('+').unwrap_or(value);
    if !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(
            "phone",
            "must contain only digits with an optional leading '+'",
        ));
    }
    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len()) {
        return Err(ValidationError::new(
            "phone",
            format!(
                "must have between {} and {} digits",
                PHONE_MIN_DIGITS, PHONE_MAX_DIGITS
            ),
        ));
    }

    Ok(())
}

/// Sanitizes and validates buyer details, returning the cleaned copy.
pub fn validate_buyer(buyer: &BuyerInfo) -> Result<BuyerInfo, ValidationError> {
    let cleaned = BuyerInfo {
        identity_number: sanitize_string(&buyer.identity_number),
        full_name: sanitize_string(&buyer.full_name),
        email: sanitize_string(&buyer.email).to_lowercase(),
        phone: sanitize_string(&buyer.phone).replace([' ', '-'], ""),
    };

    validate_identity_number(&cleaned.identity_number)?;
    validate_required("fullName", &cleaned.full_name)?;
    validate_max_len("fullName", &cleaned.full_name, FULL_NAME_MAX_LEN)?;
    validate_email(&cleaned.email)?;
    validate_phone(&cleaned.phone)?;

    Ok(cleaned)
}
