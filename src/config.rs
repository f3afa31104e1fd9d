use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 8 MiB, generous for directory entries while still bounding a hostile
/// peer's allocation.
pub const DEFAULT_MAX_PDU_SIZE: usize = 8 * 1024 * 1024;

/// Four octets of length already addresses 4 GiB.
pub const DEFAULT_MAX_LENGTH_OCTETS: usize = 4;

/// Codec limits, loadable from YAML so deployments can tighten them without
/// a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Largest PDU accepted by [`parse_message`](crate::parse_message).
    #[serde(default = "default_max_pdu_size")]
    pub max_pdu_size: usize,

    /// Longest accepted length-of-length in TLV headers.
    #[serde(default = "default_max_length_octets")]
    pub max_length_octets: usize,
}

fn default_max_pdu_size() -> usize {
    DEFAULT_MAX_PDU_SIZE
}

fn default_max_length_octets() -> usize {
    DEFAULT_MAX_LENGTH_OCTETS
}

impl CodecConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CodecConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let config: CodecConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_length_octets: DEFAULT_MAX_LENGTH_OCTETS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = CodecConfig::default();
        assert_eq!(config.max_pdu_size, 8 * 1024 * 1024);
        assert_eq!(config.max_length_octets, 4);
    }

    #[test]
    fn test_config_from_str() {
        let yaml = "max_pdu_size: 65536\nmax_length_octets: 3\n";
        let config = CodecConfig::from_str(yaml).unwrap();
        assert_eq!(config.max_pdu_size, 65536);
        assert_eq!(config.max_length_octets, 3);
    }

    #[test]
    fn test_config_from_str_defaults_apply() {
        let config = CodecConfig::from_str("{}").unwrap();
        assert_eq!(config.max_pdu_size, DEFAULT_MAX_PDU_SIZE);
        assert_eq!(config.max_length_octets, DEFAULT_MAX_LENGTH_OCTETS);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_pdu_size: 1048576").unwrap();

        let config = CodecConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_pdu_size, 1048576);
    }

    #[test]
    fn test_config_from_missing_file() {
        assert!(CodecConfig::from_file("/nonexistent/codec.yaml").is_err());
    }
}
