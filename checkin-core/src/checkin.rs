/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use crate::api_error::ApiError;
use crate::model::{Checkin, Profile, Vehicle};
use crate::receipt::Receipt;
use crate::runtime_error::RuntimeError;
use crate::suppression::{SuppressionKey, SuppressionPolicy};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::info;

/// Storage operations needed to record a check-in.
#[async_trait]
pub trait CheckinStore {
    async fn get_vehicle(&self, vehicle_id: &str) -> Result<Option<Vehicle>, RuntimeError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, RuntimeError>;

    /// Whether a check-in with exactly this scan date and time was already recorded under the key.
    async fn find_duplicate(
        &self,
        key: &SuppressionKey,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, RuntimeError>;

    async fn latest_checkin(&self, key: &SuppressionKey) -> Result<Option<Checkin>, RuntimeError>;

    /// Returns `false` when another check-in already occupies the bucket.
    async fn create_checkin(&self, key: &SuppressionKey, bucket: i64, checkin: Checkin) -> Result<bool, RuntimeError>;
}

/// Check-in request after transport decoding, fields are validated by [`CheckinRecorder::record`].
#[derive(Debug, Default)]
pub struct CheckinSubmission {
    pub vehicle_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub amount: f64,
    pub device_id: Option<String>,
    pub client_ip: String,
    pub valid_month: Option<String>,
    pub dry_run: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinStatus {
    Ok,
    Exists,
    TooSoon,
    Inserted,
}

#[derive(Debug, Serialize)]
pub struct CheckinOutcome {
    pub status: CheckinStatus,
    pub receipt: Receipt,
}

pub struct CheckinRecorder<'a, S> {
    store: &'a S,
    policy: &'a SuppressionPolicy,
}

impl<'a, S: CheckinStore + Sync> CheckinRecorder<'a, S> {
    pub fn new(store: &'a S, policy: &'a SuppressionPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn record(&self, submission: CheckinSubmission, now: DateTime<Utc>) -> Result<CheckinOutcome, ApiError> {
        let vehicle_id = non_blank(submission.vehicle_id).ok_or(ApiError::MissingField("vehicle_id"))?;
        let date = parse_date(submission.date)?;
        let time_input = non_blank(submission.time).ok_or(ApiError::MissingField("time"))?;
        let time = parse_time(&time_input)?;
        let valid_month = parse_valid_month(submission.valid_month)?;
        let device_id = non_blank(submission.device_id);

        let vehicle = self
            .store
            .get_vehicle(&vehicle_id)
            .await?
            .ok_or_else(|| ApiError::VehicleNotFound(vehicle_id.clone()))?;
        let owner = match vehicle.owner_user_id.as_deref() {
            Some(user_id) => self.store.get_profile(user_id).await?,
            None => None,
        };
        let receipt = Receipt::new(&vehicle, owner.as_ref(), date, time_input, valid_month.clone());

        let key = SuppressionKey::of(&vehicle_id, device_id.as_deref(), &submission.client_ip);
        let outcome = |status| CheckinOutcome { status, receipt };

        if key.is_device() && self.store.find_duplicate(&key, date, time).await? {
            info!(key = %key, "Check-in already recorded.");
            return Ok(outcome(CheckinStatus::Exists));
        }

        if let Some(last) = self.store.latest_checkin(&key).await? {
            if self.policy.is_too_soon(last.created_at, now) {
                info!(key = %key, last = %last.created_at, "Check-in within suppression window.");
                return Ok(outcome(CheckinStatus::TooSoon));
            }
        }

        if submission.dry_run {
            return Ok(outcome(CheckinStatus::Ok));
        }

        let checkin = Checkin {
            vehicle_id,
            date,
            time,
            amount: submission.amount,
            device_id,
            client_ip: submission.client_ip,
            valid_month,
            passenger_count: 1,
            created_at: now.fixed_offset(),
        };

        if self.store.create_checkin(&key, self.policy.bucket(now), checkin).await? {
            info!(key = %key, "Check-in recorded.");
            Ok(outcome(CheckinStatus::Inserted))
        } else {
            info!(key = %key, "Concurrent check-in already occupies the window.");
            Ok(outcome(CheckinStatus::TooSoon))
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_date(value: Option<String>) -> Result<NaiveDate, ApiError> {
    let value = non_blank(value).ok_or(ApiError::MissingField("date"))?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| ApiError::InvalidField("date", value))
}

fn parse_time(value: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ApiError::InvalidField("time", value.into()))
}

fn parse_valid_month(value: Option<String>) -> Result<Option<String>, ApiError> {
    match non_blank(value) {
        Some(month) => NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
            .map(|_| Some(month.clone()))
            .map_err(|_| ApiError::InvalidField("valid_month", month)),
        None => Ok(None),
    }
}
