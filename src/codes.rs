//! Tracking codes, pickup codes and public tokens.
//!
//! Each code is drawn independently from the thread-local CSPRNG over an
//! alphabet without `0`, `O`, `1` or `I`, so codes survive being read aloud
//! or copied by hand. Candidates are checked against live and retired codes
//! in the store; after every `lengthen_after` collisions the next candidate
//! gets one more character.
use rand::Rng;
use records::{AssignedCodes, Submission};
use serde::{Deserialize, Serialize};
use store::{CodeField, RequestStore};
use tracing::warn;

use crate::ServiceError;

/// Upper-case letters and digits minus the easily confused ones.
pub const SAFE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Prepended to tracking codes. Default: `ABIS-`.
    pub tracking_prefix: String,
    pub tracking_len: usize,
    pub pickup_len: usize,
    pub token_len: usize,
    /// Candidates tried per code before giving up.
    pub max_attempts: u32,
    /// Collisions tolerated at one length before lengthening.
    pub lengthen_after: u32,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            tracking_prefix: "ABIS-".to_string(),
            tracking_len: 8,
            pickup_len: 8,
            token_len: 12,
            max_attempts: 16,
            lengthen_after: 3,
        }
    }
}

impl CodeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tracking_len < 6 || self.pickup_len < 6 || self.token_len < 6 {
            return Err("code lengths must be at least 6".into());
        }
        if self.max_attempts == 0 || self.lengthen_after == 0 {
            return Err("max_attempts and lengthen_after must be >= 1".into());
        }
        if self.tracking_prefix != normalize_code(&self.tracking_prefix) {
            return Err("tracking_prefix must be upper-case without surrounding spaces".into());
        }
        Ok(())
    }
}

/// Trims and upper-cases user-supplied codes before lookup.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// `len` characters from [`SAFE_ALPHABET`].
pub fn random_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| SAFE_ALPHABET[rng.random_range(0..SAFE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    cfg: CodeConfig,
}

impl CodeGenerator {
    pub fn new(cfg: CodeConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &CodeConfig {
        &self.cfg
    }

    fn candidate(&self, field: CodeField, extra: usize) -> String {
        match field {
            CodeField::Tracking => format!(
                "{}{}",
                self.cfg.tracking_prefix,
                random_code(self.cfg.tracking_len + extra)
            ),
            CodeField::Pickup => random_code(self.cfg.pickup_len + extra),
            CodeField::PublicToken => random_code(self.cfg.token_len + extra),
        }
    }

    /// A code for `field` that no live or retired record holds.
    pub async fn generate(
        &self,
        store: &dyn RequestStore,
        field: CodeField,
    ) -> Result<String, ServiceError> {
        for attempt in 0..self.cfg.max_attempts {
            let extra = (attempt / self.cfg.lengthen_after) as usize;
            let code = self.candidate(field, extra);
            if !store.code_exists(field, &code).await? {
                return Ok(code);
            }
            warn!(%field, attempt, "code_collision");
        }
        Err(ServiceError::Internal(format!(
            "no free {field} code after {} attempts",
            self.cfg.max_attempts
        )))
    }

    /// Codes for a validated submission: always a tracking code, a pickup
    /// code when pickup was requested, a public token for blotter reports.
    pub async fn assign(
        &self,
        store: &dyn RequestStore,
        submission: &Submission,
    ) -> Result<AssignedCodes, ServiceError> {
        let tracking_code = self.generate(store, CodeField::Tracking).await?;
        let pickup_code = if submission.wants_pickup() {
            Some(self.generate(store, CodeField::Pickup).await?)
        } else {
            None
        };
        let public_token = if submission.kind() == records::RequestKind::Blotter {
            Some(self.generate(store, CodeField::PublicToken).await?)
        } else {
            None
        };
        Ok(AssignedCodes {
            tracking_code,
            public_token,
            pickup_code,
        })
    }
}
