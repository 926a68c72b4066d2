//! Desk tunables
//!
//! A [`DeskConfig`] holds the handful of numbers which govern movement and discovery. The
//! [`DeskConfig::DEFAULT`] constant matches the stock desk and is what embedded builds use. With
//! the `std` feature, a config can also be loaded from a TOML file, in which any omitted field
//! takes its default value.
//!
//! # An example TOML file
//!
//! ```toml
//! # Position delta below which the desk is considered arrived
//! stopping_distance = 140
//! # Bad register reads tolerated before discovery restarts
//! read_retry_limit = 2
//! # Number of node addresses probed during discovery
//! scan_candidates = 8
//! # Number of slow commands sent before stopping
//! slow_dwell_ticks = 3
//! ```

/// Tunable parameters of the desk controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default, deny_unknown_fields))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeskConfig {
    /// Distance, in position units, within which the desk counts as arrived
    pub stopping_distance: u16,
    /// Number of bad register reads tolerated in one discovery state
    pub read_retry_limit: u8,
    /// Number of node addresses probed during the scan (at most 8)
    pub scan_candidates: u8,
    /// Number of slow commands sent before the stop command
    pub slow_dwell_ticks: u8,
}

impl DeskConfig {
    /// Parameters of the stock desk
    pub const DEFAULT: DeskConfig = DeskConfig {
        stopping_distance: 140,
        read_retry_limit: 2,
        scan_candidates: 8,
        slow_dwell_ticks: 3,
    };

    /// The largest supported `scan_candidates`
    pub const MAX_SCAN_CANDIDATES: u8 = 8;
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(feature = "std")]
pub use loader::LoadError;

#[cfg(feature = "std")]
mod loader {
    use snafu::ResultExt as _;
    use snafu::Snafu;

    use super::DeskConfig;

    /// Error returned when loading a desk config fails
    #[derive(Debug, Snafu)]
    pub enum LoadError {
        /// An IO error occured while reading the file
        #[snafu(display("IO error: {source}"))]
        Io {
            /// The underlying IO error
            source: std::io::Error,
        },
        /// An error occured in the TOML parser
        #[snafu(display("Toml parse error: {source}"))]
        TomlParsing {
            /// The toml error which led to this error
            source: toml::de::Error,
        },
        /// A field holds a value the controller cannot work with
        #[snafu(display("Invalid value {value} for {field}"))]
        InvalidValue {
            /// Name of the offending field
            field: &'static str,
            /// The value found in the config
            value: u16,
        },
    }

    impl DeskConfig {
        /// Try to read a desk config from a file
        pub fn load(config_path: impl AsRef<std::path::Path>) -> Result<Self, LoadError> {
            let config_str = std::fs::read_to_string(&config_path).context(IoSnafu)?;
            Self::load_from_str(&config_str)
        }

        /// Try to read a config from a &str
        pub fn load_from_str(config_str: &str) -> Result<Self, LoadError> {
            let config: DeskConfig = toml::from_str(config_str).context(TomlParsingSnafu)?;
            config.validate()?;
            Ok(config)
        }

        fn validate(&self) -> Result<(), LoadError> {
            if self.scan_candidates == 0 || self.scan_candidates > Self::MAX_SCAN_CANDIDATES {
                return InvalidValueSnafu {
                    field: "scan_candidates",
                    value: self.scan_candidates as u16,
                }
                .fail();
            }
            if self.slow_dwell_ticks == 0 {
                return InvalidValueSnafu {
                    field: "slow_dwell_ticks",
                    value: 0u16,
                }
                .fail();
            }
            Ok(())
        }
    }
}
