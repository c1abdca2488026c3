//! Payment outcome events received from the payment service
//!
//! Two shapes arrive on the wire: the webhook envelope
//! `{event, version, occurred_at, data: {...}}` and the flat body published
//! by the direct charge path, which names the payment `charge_id`.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::BookingId;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire<T> {
    Envelope { data: T },
    Flat(T),
}

fn decode_wire<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    match serde_json::from_slice::<Wire<T>>(payload) {
        Ok(Wire::Envelope { data }) | Ok(Wire::Flat(data)) => Ok(data),
        Err(e) => Err(DomainError::MalformedEvent(format!("undecodable payload: {}", e))),
    }
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DomainError::MalformedEvent(format!("missing {}", field))),
    }
}

fn booking_ref(value: Option<String>) -> Result<BookingId> {
    let raw = required("booking_id", value)?;
    BookingId::parse(&raw)
        .map_err(|_| DomainError::MalformedEvent(format!("booking_id is not a booking id: {}", raw)))
}

#[derive(Deserialize)]
struct PaidData {
    #[serde(default, alias = "charge_id")]
    payment_id: Option<String>,
    #[serde(default)]
    booking_id: Option<String>,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    method: Option<String>,
}

/// `payment.paid`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPaid {
    pub payment_id: String,
    pub booking_id: BookingId,
    pub amount: i64,
    pub currency: String,
    pub method: String,
}

impl PaymentPaid {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let data: PaidData = decode_wire(payload)?;
        Ok(Self {
            payment_id: required("payment_id", data.payment_id)?,
            booking_id: booking_ref(data.booking_id)?,
            amount: data.amount,
            currency: data.currency,
            method: data.method.unwrap_or_else(|| "card".to_string()),
        })
    }
}

#[derive(Deserialize)]
struct FailedData {
    #[serde(default, alias = "charge_id")]
    payment_id: Option<String>,
    #[serde(default)]
    booking_id: Option<String>,
    #[serde(default, alias = "failure_code")]
    reason: Option<String>,
    #[serde(default)]
    failure_message: Option<String>,
}

/// `payment.failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailed {
    pub payment_id: String,
    pub booking_id: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl PaymentFailed {
    /// Informational only, so the booking reference is kept as sent.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let data: FailedData = decode_wire(payload)?;
        Ok(Self {
            payment_id: required("payment_id", data.payment_id)?,
            booking_id: required("booking_id", data.booking_id)?,
            reason: data.reason.filter(|r| !r.is_empty()),
            message: data.failure_message.filter(|m| !m.is_empty()),
        })
    }
}
