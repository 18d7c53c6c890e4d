/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[doc = "Passenger check-in entity."]
pub struct Checkin {
    #[doc = "Vehicle ID."]
    pub vehicle_id: String,
    #[doc = "Day of the scan."]
    pub date: NaiveDate,
    #[doc = "Time of the scan."]
    pub time: NaiveTime,
    #[doc = "Paid amount."]
    pub amount: f64,
    #[doc = "Client-generated device identifier."]
    pub device_id: Option<String>,
    #[doc = "Address of the scanning client."]
    pub client_ip: String,
    #[doc = "Subscription month (YYYY-MM)."]
    pub valid_month: Option<String>,
    #[doc = "Number of passengers, always 1."]
    pub passenger_count: u32,
    #[doc = "Date when check-in was recorded."]
    pub created_at: DateTime<FixedOffset>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[doc = "Vehicle entity."]
pub struct Vehicle {
    #[doc = "Vehicle ID."]
    pub vehicle_id: String,
    #[doc = "Registration plate."]
    pub registration_plate: String,
    #[doc = "Driver name configured for the vehicle."]
    pub display_driver_name: Option<String>,
    #[doc = "Owner profile ID."]
    pub owner_user_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[doc = "User profile entity."]
pub struct Profile {
    #[doc = "User ID."]
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
