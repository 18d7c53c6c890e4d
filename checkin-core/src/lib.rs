/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

mod api_error;
mod checkin;
mod checkin_dao;
mod lambda;
mod model;
mod receipt;
mod runtime_error;
mod suppression;

pub use crate::api_error::ApiError;
pub use crate::checkin::{CheckinOutcome, CheckinRecorder, CheckinStatus, CheckinStore, CheckinSubmission};
pub use crate::checkin_dao::CheckinDao;
pub use crate::lambda::{dispatch, setup_tracing, JsonResponse};
pub use crate::model::{Checkin, Profile, Vehicle};
pub use crate::receipt::{Receipt, ReceiptDriver, ReceiptVehicle};
pub use crate::runtime_error::RuntimeError;
pub use crate::suppression::{SuppressionKey, SuppressionPolicy};
