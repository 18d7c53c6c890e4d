/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use crate::model::{Profile, Vehicle};
use chrono::NaiveDate;
use serde::Serialize;

pub const UNKNOWN_DRIVER: &str = "—";

#[derive(Debug, Serialize)]
pub struct ReceiptVehicle {
    pub registration_plate: String,
}

#[derive(Debug, Serialize)]
pub struct ReceiptDriver {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display: String,
}

/// Human readable confirmation of a scan.
#[derive(Debug, Serialize)]
pub struct Receipt {
    pub vehicle: ReceiptVehicle,
    pub driver: ReceiptDriver,
    pub date: NaiveDate,
    /// Scan time exactly as submitted.
    pub time: String,
    pub valid_month: Option<String>,
}

impl Receipt {
    pub fn new(
        vehicle: &Vehicle,
        owner: Option<&Profile>,
        date: NaiveDate,
        time: String,
        valid_month: Option<String>,
    ) -> Self {
        let first_name = owner.and_then(|profile| non_blank(profile.first_name.as_deref()));
        let last_name = owner.and_then(|profile| non_blank(profile.last_name.as_deref()));
        let display = display_name(
            first_name.as_deref(),
            last_name.as_deref(),
            vehicle.display_driver_name.as_deref(),
        );

        Self {
            vehicle: ReceiptVehicle {
                registration_plate: vehicle.registration_plate.clone(),
            },
            driver: ReceiptDriver {
                first_name,
                last_name,
                display,
            },
            date,
            time,
            valid_month,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(String::from)
}

fn display_name(first_name: Option<&str>, last_name: Option<&str>, configured: Option<&str>) -> String {
    let full_name = [first_name, last_name].into_iter().flatten().collect::<Vec<_>>().join(" ");

    if full_name.is_empty() {
        non_blank(configured).unwrap_or_else(|| UNKNOWN_DRIVER.into())
    } else {
        full_name
    }
}
