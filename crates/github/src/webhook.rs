use std::{
    collections::{HashSet, VecDeque},
    fmt::Display,
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use octocrab::models::webhook_events::WebhookEvent;
use sha2::Sha256;
use thiserror::Error;

use crate::GitHub;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("signature header missing")]
    MissingSignature,
    #[error("signature header malformed")]
    MalformedSignature,
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Verify the `X-Hub-Signature-256` header against the raw payload bytes.
/// The comparison is constant-time via `Mac::verify_slice`. A body without a
/// signature header is rejected outright.
pub fn verify_signature(
    secret: &str,
    signature_header: Option<&str>,
    body: &[u8],
) -> Result<(), VerificationError> {
    let signature = signature_header
        .ok_or(VerificationError::MissingSignature)?
        .strip_prefix("sha256=")
        .ok_or(VerificationError::MalformedSignature)?;
    let signature = hex::decode(signature).map_err(|_| VerificationError::MalformedSignature)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    mac.verify_slice(&signature).map_err(|_| VerificationError::SignatureMismatch)
}

/// Remembers the most recent delivery IDs so redelivered webhooks are
/// dropped. Bounded: once `capacity` IDs are held, the oldest is evicted.
pub struct DeliveryLog {
    inner: tokio::sync::Mutex<DeliveryWindow>,
}

struct DeliveryWindow {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DeliveryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(DeliveryWindow {
                seen: HashSet::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Record a delivery ID, returning false if it was already seen.
    pub async fn record(&self, delivery_id: &str) -> bool {
        let mut window = self.inner.lock().await;
        if window.seen.contains(delivery_id) {
            return false;
        }
        if window.order.len() == window.capacity
            && let Some(evicted) = window.order.pop_front()
        {
            window.seen.remove(&evicted);
        }
        window.seen.insert(delivery_id.to_string());
        window.order.push_back(delivery_id.to_string());
        true
    }
}

/// Verify and extract a GitHub webhook event payload.
#[derive(Clone)]
#[must_use]
pub struct GitHubEvent {
    pub delivery_id: String,
    pub event: WebhookEvent,
}

impl<S> FromRequest<S> for GitHubEvent
where
    Arc<GitHub>: FromRef<S>,
    S: Send + Sync + Clone,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        fn err(m: impl Display) -> Response {
            tracing::error!("{m}");
            (StatusCode::BAD_REQUEST, m.to_string()).into_response()
        }
        let github = <Arc<GitHub>>::from_ref(state);
        let event = req
            .headers()
            .get("X-GitHub-Event")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err("X-GitHub-Event header missing"))?
            .to_string();
        let delivery_id = req
            .headers()
            .get("X-GitHub-Delivery")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err("X-GitHub-Delivery header missing"))?
            .to_string();
        let signature = req
            .headers()
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = Bytes::from_request(req, state).await.map_err(|_| err("error reading body"))?;
        verify_signature(&github.config.webhook_secret, signature.as_deref(), &body)
            .map_err(err)?;
        if !github.deliveries.record(&delivery_id).await {
            // Respond OK so the platform does not keep redelivering.
            tracing::info!("Dropping duplicate delivery {delivery_id}");
            return Err((StatusCode::OK, "Duplicate delivery").into_response());
        }
        let value = WebhookEvent::try_from_header_and_body(&event, &body)
            .map_err(|_| err("error parsing body"))?;
        Ok(GitHubEvent { delivery_id, event: value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_accepted() {
        let body = br#"{"action":"requested"}"#;
        let header = sign("secret", body);
        assert_eq!(verify_signature("secret", Some(&header), body), Ok(()));
    }

    #[test]
    fn missing_header_rejected() {
        assert_eq!(
            verify_signature("secret", None, b"{}"),
            Err(VerificationError::MissingSignature)
        );
    }

    #[test]
    fn malformed_header_rejected() {
        assert_eq!(
            verify_signature("secret", Some("sha1=abcd"), b"{}"),
            Err(VerificationError::MalformedSignature)
        );
        assert_eq!(
            verify_signature("secret", Some("sha256=zz"), b"{}"),
            Err(VerificationError::MalformedSignature)
        );
    }

    #[test]
    fn flipped_byte_invalidates_signature() {
        let body = b"payload bytes";
        let header = sign("secret", body);
        assert_eq!(
            verify_signature("secret", Some(&header), b"payload byteZ"),
            Err(VerificationError::SignatureMismatch)
        );
        assert_eq!(
            verify_signature("other secret", Some(&header), body),
            Err(VerificationError::SignatureMismatch)
        );
    }

    #[tokio::test]
    async fn delivery_dedup() {
        let log = DeliveryLog::new(16);
        assert!(log.record("d-1").await);
        assert!(!log.record("d-1").await);
        assert!(log.record("d-2").await);
    }

    #[tokio::test]
    async fn delivery_window_evicts_oldest() {
        let log = DeliveryLog::new(2);
        assert!(log.record("d-1").await);
        assert!(log.record("d-2").await);
        assert!(log.record("d-3").await);
        // d-1 fell out of the window and would be processed again.
        assert!(log.record("d-1").await);
        // d-3 is still in the window.
        assert!(!log.record("d-3").await);
    }
}
