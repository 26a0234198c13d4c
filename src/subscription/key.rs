use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::notifications::error::{InitError, InitResult};

/// Public half of the server's push authentication key pair, as configured (base64url).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKey {
    encoded: String,
    raw: Vec<u8>,
}

impl ServerKey {
    /// Accepts padded or unpadded input, and the standard alphabet's `+` and `/`.
    pub fn parse(value: &str) -> InitResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(InitError::MissingServerKey);
        }
        let normalized: String = trimmed
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                other => other,
            })
            .collect();
        let raw = URL_SAFE_NO_PAD
            .decode(normalized.as_bytes())
            .map_err(|err| InitError::InvalidServerKey(err.to_string()))?;
        if raw.is_empty() {
            return Err(InitError::InvalidServerKey("decoded key is empty".to_string()));
        }
        Ok(Self {
            encoded: normalized,
            raw,
        })
    }

    pub fn from_config(value: Option<&str>) -> InitResult<Self> {
        match value {
            Some(value) => Self::parse(value),
            None => Err(InitError::MissingServerKey),
        }
    }

    pub fn as_base64url(&self) -> &str {
        &self.encoded
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_and_standard_alphabet_keys() {
        let key = ServerKey::parse("BA0B+p4S/w==").unwrap();
        assert_eq!(key.as_base64url(), "BA0B-p4S_w");
        assert_eq!(key.as_bytes(), &[0x04, 0x0d, 0x01, 0xfa, 0x9e, 0x12, 0xff]);
    }

    #[test]
    fn missing_and_garbage_keys_are_distinct_errors() {
        assert_eq!(ServerKey::from_config(None), Err(InitError::MissingServerKey));
        assert_eq!(ServerKey::parse("   "), Err(InitError::MissingServerKey));
        assert!(matches!(
            ServerKey::parse("not a key!"),
            Err(InitError::InvalidServerKey(_))
        ));
    }
}
