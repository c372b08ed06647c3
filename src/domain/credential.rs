#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampMs(pub i64);

impl TimestampMs {
    pub fn as_epoch_seconds(self) -> i64 {
        self.0.div_euclid(1000)
    }
}

pub trait Clock {
    fn now(&self) -> TimestampMs;
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn now(&self) -> TimestampMs {
        self.as_ref().now()
    }
}

/// Subtracted from the provider TTL so a token is renewed before the vendor
/// starts rejecting it.
pub const EXPIRY_SAFETY_MARGIN_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: TimestampMs,
}

impl Credential {
    pub fn issue(token: String, ttl_seconds: i64, issued_at: TimestampMs) -> Self {
        let ttl_ms = ttl_seconds.max(0).saturating_mul(1000);
        Self {
            token,
            expires_at: TimestampMs(
                issued_at
                    .0
                    .saturating_add(ttl_ms)
                    .saturating_sub(EXPIRY_SAFETY_MARGIN_MS),
            ),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> TimestampMs {
        self.expires_at
    }

    pub fn is_expired(&self, now: TimestampMs) -> bool {
        now >= self.expires_at
    }
}

pub fn token_state(credential: Option<&Credential>, now: TimestampMs) -> TokenState {
    match credential {
        None => TokenState::Absent,
        Some(credential) if credential.is_expired(now) => TokenState::Expired,
        Some(_) => TokenState::Valid,
    }
}
