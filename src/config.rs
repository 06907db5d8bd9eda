use serde::{Deserialize, Serialize};

use crate::opcodes::HIGHEST_PROTOCOL;

const DEFAULT_MAX_MEMO_ENTRIES: usize = 100_000;
const DEFAULT_MAX_BINARY_SIZE: usize = 256 * 1024 * 1024; // 256 MB

/// Limits and strictness switches for one decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Distinct memo keys a stream may store before it is rejected.
    pub max_memo_entries: usize,
    /// Largest counted string/bytes/long payload accepted, in bytes.
    pub max_binary_size: usize,
    /// Reject bytes left in the buffer after STOP.
    pub strict_trailing_bytes: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_memo_entries: DEFAULT_MAX_MEMO_ENTRIES,
            max_binary_size: DEFAULT_MAX_BINARY_SIZE,
            strict_trailing_bytes: false,
        }
    }
}

impl DecodeOptions {
    /// Load options from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Protocol to emit, 0 through 3.
    pub protocol: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { protocol: 2 }
    }
}

impl EncodeOptions {
    pub fn with_protocol(protocol: u8) -> Self {
        Self { protocol }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.protocol <= HIGHEST_PROTOCOL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = DecodeOptions::default();
        assert_eq!(opts.max_memo_entries, 100_000);
        assert_eq!(opts.max_binary_size, 256 * 1024 * 1024);
        assert!(!opts.strict_trailing_bytes);
        assert_eq!(EncodeOptions::default().protocol, 2);
    }

    #[test]
    fn test_partial_json() {
        let opts = DecodeOptions::from_json_str(r#"{"strict_trailing_bytes": true}"#).unwrap();
        assert!(opts.strict_trailing_bytes);
        assert_eq!(opts.max_memo_entries, 100_000);
        assert!(DecodeOptions::from_json_str("{").is_err());
    }

    #[test]
    fn test_encode_protocol_validity() {
        assert!(EncodeOptions::with_protocol(3).is_valid());
        assert!(!EncodeOptions::with_protocol(4).is_valid());
    }
}
