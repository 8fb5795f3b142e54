use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error};

use crate::error::AppError;

/// Parses `key=value` strings into query parameter pairs.
///
/// Each string is split at the first `=`; everything after it, including
/// further `=` characters, is the value.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` if a string has no `=`.
///
/// # Examples
///
/// ```
/// use subgrab::utils::parse_params;
///
/// let params = vec![
///     "token=abc".to_string(),
///     "sig=a=b".to_string(),
/// ];
/// let result = parse_params(&params).unwrap();
/// assert_eq!(result, vec![
///     ("token".to_string(), "abc".to_string()),
///     ("sig".to_string(), "a=b".to_string()),
/// ]);
/// ```
pub fn parse_params(params: &[String]) -> Result<Vec<(String, String)>, AppError> {
    debug!("Parsing {} parameters", params.len());

    params
        .iter()
        .map(|param| {
            param
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| {
                    error!("Invalid param format: {param}");
                    AppError::InvalidInput(format!("Invalid param format: {param}"))
                })
        })
        .collect()
}

/// Parses `Name: Value` strings into a header map. Later duplicates are
/// appended, not replaced.
pub fn parse_headers(headers: &[String]) -> Result<HeaderMap, AppError> {
    let mut map = HeaderMap::new();
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid header format: {header}")))?;

        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| AppError::InvalidInput(format!("Invalid header name in {header}: {e}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| AppError::InvalidInput(format!("Invalid header value in {header}: {e}")))?;

        debug!(header = %name, "Added request header");
        map.append(name, value);
    }
    Ok(map)
}
