//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a colour is written as `#rrggbb`.
///
/// # Examples
///
/// ```ignore
/// validate_hex_color("#374151") // Ok
/// validate_hex_color("374151")  // Err - missing '#'
/// validate_hex_color("#37415")  // Err - too short
/// ```
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let Some(digits) = color.strip_prefix('#') else {
        let mut err = ValidationError::new("hex_color_prefix");
        err.message = Some("Colour must start with '#'".into());
        return Err(err);
    };

    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut err = ValidationError::new("hex_color_format");
        err.message =
            Some(format!("Colour must be '#' followed by 6 hexadecimal digits (got {color})").into());
        return Err(err);
    }

    Ok(())
}
