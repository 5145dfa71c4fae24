//! Ambient configuration. The only value read from the environment is the IPv4 network that host
//! addresses are derived from; everything else is passed explicitly through option structs.

use std::env::{self, VarError};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// The environment variable holding the host network prefix, in CIDR notation.
pub const IP4_NETWORK_VAR: &str = "VNSIM_IP4_NETWORK";

/// The host network used when [`IP4_NETWORK_VAR`] is unset.
pub const DEFAULT_IP4_NETWORK: Ipv4Prefix = Ipv4Prefix {
    network: Ipv4Addr::new(10, 0, 0, 0),
    len: 8,
};

/// An IPv4 network prefix such as `10.0.0.0/8`.
///
/// Serialized in CIDR notation. Deserialization goes through [`FromStr`], so it validates the
/// same way parsing does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Prefix {
    network: Ipv4Addr,
    len: u8,
}

impl Ipv4Prefix {
    /// Creates a prefix. Host bits set in `network` are cleared.
    pub fn new(network: Ipv4Addr, len: u8) -> Result<Self, ConfigError> {
        if len > 32 {
            return Err(ConfigError::InvalidPrefixLen(len));
        }
        let network = Ipv4Addr::from(u32::from(network) & Self::mask(len));
        Ok(Self { network, len })
    }

    /// Reads the prefix from [`IP4_NETWORK_VAR`], falling back to [`DEFAULT_IP4_NETWORK`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_var(env::var(IP4_NETWORK_VAR))
    }

    /// Interprets the result of looking up [`IP4_NETWORK_VAR`].
    pub(crate) fn from_var(var: Result<String, VarError>) -> Result<Self, ConfigError> {
        match var {
            Ok(value) => value.trim().parse(),
            Err(VarError::NotPresent) => Ok(DEFAULT_IP4_NETWORK),
            Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode),
        }
    }

    /// The network address.
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// The prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// The number of addresses in the network, including the network address itself.
    pub fn size(&self) -> u64 {
        1 << (32 - u32::from(self.len))
    }

    /// Returns the `n`th address of the network, or `None` if it falls outside the prefix.
    pub fn nth(&self, n: u64) -> Option<Ipv4Addr> {
        if n >= self.size() {
            return None;
        }
        // `n` fits in the host bits, so this neither overflows nor touches the network bits
        let addr = u32::from(self.network) | n as u32;
        Some(Ipv4Addr::from(addr))
    }

    fn mask(len: u8) -> u32 {
        match len {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len)),
        }
    }
}

impl Default for Ipv4Prefix {
    fn default() -> Self {
        DEFAULT_IP4_NETWORK
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

impl TryFrom<String> for Ipv4Prefix {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Prefix> for String {
    fn from(prefix: Ipv4Prefix) -> Self {
        prefix.to_string()
    }
}

impl FromStr for Ipv4Prefix {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| ConfigError::MissingPrefixLen(s.to_owned()))?;
        let network = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| ConfigError::InvalidAddress(addr.to_owned()))?;
        let len = len
            .parse::<u8>()
            .map_err(|_| ConfigError::InvalidPrefixLenStr(len.to_owned()))?;
        Self::new(network, len)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The prefix has no `/len` suffix.
    #[error("network prefix {0:?} is missing a prefix length")]
    MissingPrefixLen(String),

    /// The address part of the prefix could not be parsed.
    #[error("invalid IPv4 address {0:?}")]
    InvalidAddress(String),

    /// The length part of the prefix could not be parsed.
    #[error("invalid prefix length {0:?}")]
    InvalidPrefixLenStr(String),

    /// The prefix length is out of range.
    #[error("prefix length {0} exceeds 32")]
    InvalidPrefixLen(u8),

    /// The environment variable is not valid unicode.
    #[error("VNSIM_IP4_NETWORK is not valid unicode")]
    NotUnicode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_network_is_ten_slash_eight() {
        let prefix = Ipv4Prefix::default();
        assert_eq!(prefix.to_string(), "10.0.0.0/8");
        assert_eq!(prefix.prefix_len(), 8);
    }

    #[test]
    fn parse_succeeds() -> Result<(), ConfigError> {
        let prefix: Ipv4Prefix = "192.168.1.0/24".parse()?;
        assert_eq!(prefix.network(), Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(prefix.prefix_len(), 24);
        assert_eq!(prefix.size(), 256);
        Ok(())
    }

    #[test]
    fn parse_clears_host_bits() -> Result<(), ConfigError> {
        let prefix: Ipv4Prefix = "172.16.5.9/16".parse()?;
        assert_eq!(prefix.network(), Ipv4Addr::new(172, 16, 0, 0));
        Ok(())
    }

    #[test]
    fn parse_failures() {
        assert!(matches!(
            "10.0.0.0".parse::<Ipv4Prefix>(),
            Err(ConfigError::MissingPrefixLen(..))
        ));
        assert!(matches!(
            "10.0.0/8".parse::<Ipv4Prefix>(),
            Err(ConfigError::InvalidAddress(..))
        ));
        assert!(matches!(
            "10.0.0.0/x".parse::<Ipv4Prefix>(),
            Err(ConfigError::InvalidPrefixLenStr(..))
        ));
        assert!(matches!(
            "10.0.0.0/33".parse::<Ipv4Prefix>(),
            Err(ConfigError::InvalidPrefixLen(33))
        ));
    }

    #[test]
    fn nth_stays_within_prefix() -> Result<(), ConfigError> {
        let prefix: Ipv4Prefix = "192.168.1.0/30".parse()?;
        assert_eq!(prefix.nth(1), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(prefix.nth(3), Some(Ipv4Addr::new(192, 168, 1, 3)));
        assert_eq!(prefix.nth(4), None);
        Ok(())
    }

    #[test]
    fn unset_variable_falls_back_to_default() -> Result<(), ConfigError> {
        let prefix = Ipv4Prefix::from_var(Err(VarError::NotPresent))?;
        assert_eq!(prefix, DEFAULT_IP4_NETWORK);
        Ok(())
    }

    #[test]
    fn variable_overrides_default() -> Result<(), ConfigError> {
        let prefix = Ipv4Prefix::from_var(Ok(" 192.168.0.0/16\n".to_owned()))?;
        assert_eq!(prefix.network(), Ipv4Addr::new(192, 168, 0, 0));
        assert_eq!(prefix.prefix_len(), 16);
        Ok(())
    }

    #[test]
    fn invalid_variable_fails() {
        assert!(matches!(
            Ipv4Prefix::from_var(Ok("10.0.0.0".to_owned())),
            Err(ConfigError::MissingPrefixLen(..))
        ));
        assert!(matches!(
            Ipv4Prefix::from_var(Err(VarError::NotUnicode("\u{fffd}".into()))),
            Err(ConfigError::NotUnicode)
        ));
    }

    #[test]
    fn deserialization_validates() {
        use serde::de::{value::Error, Deserialize, IntoDeserializer};

        let parse = |s: &str| Ipv4Prefix::deserialize(s.into_deserializer()).map_err(|e: Error| e);
        assert_eq!(parse("172.16.5.9/16").ok(), "172.16.0.0/16".parse().ok());
        assert!(parse("10.0.0.0/33").is_err());
        assert!(parse("10.0.0.0").is_err());
        assert_eq!(String::from(DEFAULT_IP4_NETWORK), "10.0.0.0/8");
    }

    #[test]
    fn full_address_space() -> Result<(), ConfigError> {
        let prefix: Ipv4Prefix = "0.0.0.0/0".parse()?;
        assert_eq!(prefix.size(), 1 << 32);
        assert_eq!(prefix.nth(u64::from(u32::MAX)), Some(Ipv4Addr::BROADCAST));
        Ok(())
    }
}
