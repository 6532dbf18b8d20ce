// ABOUTME: Decoding of registry authorization tokens.
// ABOUTME: Tokens are base64 of `username:password` and are never logged.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::RegistryAuth;
use crate::resource::DeployError;

/// Decode a registry authorization token into a credential pair.
///
/// The decoded text must contain exactly one `:`. Error messages never
/// include any part of the token.
pub fn decode_authorization_token(token: &str) -> Result<RegistryAuth, DeployError> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|e| DeployError::Decode(format!("token is not valid base64: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| DeployError::Decode("token is not valid UTF-8".to_string()))?;

    match text.split_once(':') {
        Some((username, password)) if !password.contains(':') => Ok(RegistryAuth {
            username: username.to_string(),
            password: password.to_string(),
            server: None,
        }),
        _ => Err(DeployError::Decode(format!(
            "expected 'username:password', found {} colon-separated part(s)",
            text.split(':').count()
        ))),
    }
}
