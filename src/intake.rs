//! Best-effort extraction of patient data from payment-completion events.
//!
//! Only the fields the prescription needs are read; anything else in the
//! event is ignored, and missing fields are left for the renderer fallbacks.

use serde::{Deserialize, Serialize};

use crate::patient::{present, PatientData};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSession {
    pub id: String,
    pub payment_status: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<PostalAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostalAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// Default output file name, `receita_<id>.pdf`. Characters outside
    /// `[A-Za-z0-9_-]` in the id become `_`, so the name never leaves the
    /// directory it is joined to.
    pub fn output_file_name(&self) -> String {
        let id: String = self
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        let id = if id.is_empty() { "sem_id".to_string() } else { id };
        format!("receita_{id}.pdf")
    }
}

impl PostalAddress {
    /// `line1[, line2], city, state - postal_code, country`
    pub fn formatted(&self) -> String {
        let part = |v: &Option<String>| present(v).unwrap_or("").to_string();
        let mut out = part(&self.line1);
        if let Some(line2) = present(&self.line2) {
            out.push_str(", ");
            out.push_str(line2);
        }
        format!(
            "{out}, {}, {} - {}, {}",
            part(&self.city),
            part(&self.state),
            part(&self.postal_code),
            part(&self.country)
        )
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

/// The paid checkout session carried by `json`, if there is one.
///
/// Other event types and unpaid sessions yield `Ok(None)`. Malformed JSON is
/// an error.
pub fn parse_event(json: &str) -> serde_json::Result<Option<CheckoutSession>> {
    let envelope: Envelope = serde_json::from_str(json)?;
    if envelope.kind != CHECKOUT_COMPLETED {
        log::info!("Ignoring unhandled event type {}", envelope.kind);
        return Ok(None);
    }
    let session: CheckoutSession = serde_json::from_value(envelope.data.object)?;
    if !session.is_paid() {
        log::info!(
            "Checkout session {} is not paid ({:?}); nothing to generate",
            session.id,
            session.payment_status
        );
        return Ok(None);
    }
    log::debug!("Paid checkout session {}", session.id);
    Ok(Some(session))
}

/// Patient fields available from the session. The national id never is.
pub fn patient_from_session(session: &CheckoutSession) -> PatientData {
    let Some(details) = &session.customer_details else {
        return PatientData::default();
    };
    PatientData {
        name: details.name.clone(),
        national_id: None,
        address: details.address.as_ref().map(PostalAddress::formatted),
        phone: details.phone.clone(),
        email: details.email.clone(),
    }
}
