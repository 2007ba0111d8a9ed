use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Appends `error-message` (JSON list of the message lines, base64 encoded) and `base64=true` to `base_url`.
pub(crate) fn build_error_url(base_url: &str, error_message: &str) -> String {
    let lines: Vec<&str> = error_message.split('\n').collect();
    let encoded = STANDARD.encode(serde_json::Value::from(lines).to_string());
    let separator = if base_url.contains('?') { '&' } else { '?' };

    format!("{base_url}{separator}error-message={}&base64=true", urlencoding::encode(&encoded))
}
