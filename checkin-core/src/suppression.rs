/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use crate::runtime_error::RuntimeError;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use std::env::{var, VarError};
use std::fmt::{Display, Formatter};

const WINDOW_VARIABLE: &str = "CHECKIN_SUPPRESSION_MINUTES";

/// Identity under which check-ins are de-duplicated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SuppressionKey {
    Device { vehicle_id: String, device_id: String },
    Ip { vehicle_id: String, client_ip: String },
}

impl SuppressionKey {
    /// Device identifier takes precedence, the address is used only for clients that do not send one.
    pub fn of(vehicle_id: &str, device_id: Option<&str>, client_ip: &str) -> Self {
        match device_id {
            Some(device_id) => Self::Device {
                vehicle_id: vehicle_id.into(),
                device_id: device_id.into(),
            },
            None => Self::Ip {
                vehicle_id: vehicle_id.into(),
                client_ip: client_ip.into(),
            },
        }
    }

    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device { .. })
    }
}

impl Display for SuppressionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device { vehicle_id, device_id } => write!(formatter, "{vehicle_id}:device:{device_id}"),
            Self::Ip { vehicle_id, client_ip } => write!(formatter, "{vehicle_id}:ip:{client_ip}"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SuppressionPolicy {
    window: TimeDelta,
}

/**
Optional environment variables:
<dl>
    <dt><code>CHECKIN_SUPPRESSION_MINUTES</code></dt>
    <dd>Length of the suppression window in minutes, defaults to 15.</dd>
</dl>
 */
impl SuppressionPolicy {
    pub const DEFAULT_WINDOW_MINUTES: i64 = 15;

    pub fn load_from_env() -> Result<Self, RuntimeError> {
        match var(WINDOW_VARIABLE) {
            Ok(minutes) => minutes
                .trim()
                .parse()
                .map_err(|_| RuntimeError::InvalidConfiguration(WINDOW_VARIABLE, minutes.clone()))
                .and_then(Self::from_minutes),
            Err(VarError::NotPresent) => Self::from_minutes(Self::DEFAULT_WINDOW_MINUTES),
            Err(error) => Err(error.into()),
        }
    }

    pub fn from_minutes(minutes: i64) -> Result<Self, RuntimeError> {
        TimeDelta::try_minutes(minutes)
            .filter(|window| *window > TimeDelta::zero())
            .map(|window| Self { window })
            .ok_or_else(|| RuntimeError::InvalidConfiguration(WINDOW_VARIABLE, minutes.to_string()))
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// Index of the fixed window containing given moment; the storage layer keeps at most one check-in per key and
    /// bucket.
    pub fn bucket(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.window.num_seconds())
    }

    pub fn is_too_soon(&self, last: DateTime<FixedOffset>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last.with_timezone(&Utc)) < self.window
    }
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        Self {
            window: TimeDelta::minutes(Self::DEFAULT_WINDOW_MINUTES),
        }
    }
}
