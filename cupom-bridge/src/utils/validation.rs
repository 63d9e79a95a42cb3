//! Request validation helpers

use cupom_printer::validate_device_path;

use crate::utils::AppError;

/// Upper bound for identifiers such as `pedidoId` and `tipoImpressora`
pub const MAX_ID_LEN: usize = 128;

/// Upper bound for `devicePath`
pub const MAX_DEVICE_PATH_LEN: usize = 260;

/// Validate that a required field is present and non-empty after trimming
///
/// Returns the trimmed value.
pub fn require_text<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(format!("Campo obrigatório ausente: {field}"))),
    }
}

/// Validate that a string is within the length limit
pub fn check_len(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{field} muito longo ({} caracteres, máximo {max_len})",
            value.chars().count()
        )));
    }
    Ok(())
}

/// Validate a `devicePath`: required, bounded, no traversal, allowed namespace
pub fn require_device_path(value: Option<&str>) -> Result<&str, AppError> {
    let path = require_text(value, "devicePath")?;
    check_len(path, "devicePath", MAX_DEVICE_PATH_LEN)?;
    validate_device_path(path)
        .map_err(|e| AppError::validation(format!("devicePath inválido: {e}")))
}
