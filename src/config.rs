use serde::Serialize;
use typed_builder::TypedBuilder;

use crate::{Error, Result};

/// Observation-wide parameters used to describe every output stream.
///
/// # Example
/// ```
/// use spead2dada::ObservationConfig;
///
/// let config = ObservationConfig::builder()
///     .feng_nchan(4096)
///     .sync_epoch(1_554_000_000.0)
///     .build();
/// assert_eq!(config.bandwidth_mhz, 856.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(TypedBuilder, Serialize, Debug, Clone, PartialEq)]
pub struct ObservationConfig {
    /// Total number of F-engine channels across the full band.
    pub feng_nchan: usize,
    /// Unix time, in seconds, of the global synchronisation epoch; timestamp 0.
    pub sync_epoch: f64,
    /// Total bandwidth in MHz.
    #[builder(default = 856.0)]
    pub bandwidth_mhz: f64,
    /// Centre frequency of the full band in MHz.
    #[builder(default = 1284.0)]
    pub centre_freq_mhz: f64,

    #[builder(default = String::from("unset"), setter(into))]
    pub obs_id: String,
    #[builder(default = String::from("B1937+21"), setter(into))]
    pub source: String,
    #[builder(default = String::from("00:00:00.00"), setter(into))]
    pub ra: String,
    #[builder(default = String::from("00:00:00.00"), setter(into))]
    pub dec: String,
    #[builder(default = String::from("MeerKAT"), setter(into))]
    pub telescope: String,
    #[builder(default = String::from("feng"), setter(into))]
    pub instrument: String,
    #[builder(default = String::from("lband"), setter(into))]
    pub receiver: String,
}

impl ObservationConfig {
    /// Channel bandwidth in MHz.
    #[must_use]
    pub fn channel_bandwidth_mhz(&self) -> f64 {
        self.bandwidth_mhz / self.feng_nchan as f64
    }

    /// # Errors
    /// [Error::Config] for a zero channel count or non-finite/non-positive bandwidth, or a
    /// non-finite centre frequency or sync epoch.
    pub fn validate(&self) -> Result<()> {
        if self.feng_nchan == 0 {
            return Err(Error::Config("F-engine channel count must be > 0".to_string()));
        }
        if !self.bandwidth_mhz.is_finite() || self.bandwidth_mhz <= 0.0 {
            return Err(Error::Config(format!(
                "bandwidth must be positive; got {}",
                self.bandwidth_mhz
            )));
        }
        if !self.centre_freq_mhz.is_finite() {
            return Err(Error::Config("centre frequency must be finite".to_string()));
        }
        if !self.sync_epoch.is_finite() || self.sync_epoch < 0.0 {
            return Err(Error::Config(format!(
                "sync epoch must be a non-negative unix time; got {}",
                self.sync_epoch
            )));
        }
        Ok(())
    }
}
