//! Status updates and OTP resend.

use anyhow::{Context, Result};
use platform::{Config, HttpRequest, Identity};
use serde::{Deserialize, Serialize};

use crate::client;
use crate::trip::TripStatus;

/// Updates the status of a trip.
///
/// The backend verifies `otp` when the status is `COMPLETED`; a rejected OTP
/// surfaces as [`platform::Error::BadRequest`].
///
/// # Errors
///
/// Returns an error when the status update request fails or is rejected.
pub async fn update_status<P>(trip_id: &str, update: &StatusUpdate, provider: &P) -> Result<()>
where
    P: Config + HttpRequest + Identity,
{
    let path = format!("/trips/{}/status", urlencoding::encode(trip_id));
    client::patch(&path, Some(update), provider)
        .await
        .with_context(|| format!("updating trip {trip_id} to {}", update.status))
}

/// Asks the backend to send a fresh delivery OTP to the recipient.
///
/// # Errors
///
/// Returns an error when the resend request fails.
pub async fn resend_otp<P>(trip_id: &str, provider: &P) -> Result<()>
where
    P: Config + HttpRequest + Identity,
{
    let path = format!("/trips/{}/resend-otp", urlencoding::encode(trip_id));
    client::patch::<_, ()>(&path, None, provider)
        .await
        .with_context(|| format!("resending OTP for trip {trip_id}"))
}

/// Body of the `update-status` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: TripStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expenses: Option<Vec<Expense>>,
}

impl StatusUpdate {
    #[must_use]
    pub const fn new(status: TripStatus) -> Self {
        Self { status, otp: None, delivered_image_url: None, expenses: None }
    }
}

/// A toll or road expense captured before billing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub amount: f64,

    /// URL of the uploaded receipt image.
    pub receipt: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_update_omits_optionals() {
        let body = serde_json::to_value(StatusUpdate::new(TripStatus::InTransit)).unwrap();
        assert_eq!(body, json!({"status": "IN_TRANSIT"}));
    }

    #[test]
    fn toll_update_carries_expenses() {
        let update = StatusUpdate {
            expenses: Some(vec![Expense {
                amount: 4.2,
                receipt: "https://cdn.example/r1.jpg".to_string(),
                description: "Northern Gateway".to_string(),
            }]),
            ..StatusUpdate::new(TripStatus::TollBillPending)
        };
        let body = serde_json::to_value(update).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "TOLL_BILL_PENDING",
                "expenses": [{
                    "amount": 4.2,
                    "receipt": "https://cdn.example/r1.jpg",
                    "description": "Northern Gateway"
                }]
            })
        );
    }
}
