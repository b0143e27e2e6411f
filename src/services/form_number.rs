//! Unique form number issuance for partners.
//!
//! Numbers look like `P-{partner}-{region}-{type}-{HEX}`. Uniqueness comes
//! from the random suffix plus an existence check against stored loans;
//! there is no counter or lock.

use rand::RngCore;
use thiserror::Error;

use crate::models::{FormType, RegionCode};
use crate::store::{FormNumberLookup, StoreError};

/// Candidates tried before giving up
pub const MAX_GENERATION_ATTEMPTS: usize = 10;

/// Random bytes per suffix (rendered as twice as many hex characters)
pub const SUFFIX_BYTES: usize = 6;

#[derive(Error, Debug)]
pub enum FormNumberError {
    #[error("Partner ID must be a positive integer, got {0}")]
    InvalidPartnerId(i64),

    #[error("Could not find a free form number after {attempts} attempts")]
    Exhausted { attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Generates collision-checked form numbers
#[derive(Debug, Clone)]
pub struct FormNumberGenerator {
    max_attempts: usize,
}

impl Default for FormNumberGenerator {
    fn default() -> Self {
        Self::new(MAX_GENERATION_ATTEMPTS)
    }
}

impl FormNumberGenerator {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Build one candidate without checking the store.
    pub fn candidate(partner_id: i64, region: RegionCode, form_type: FormType) -> String {
        let mut bytes = [0u8; SUFFIX_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!(
            "P-{}-{}-{}-{}",
            partner_id,
            region.code(),
            form_type.code(),
            hex::encode_upper(bytes)
        )
    }

    /// Return the first candidate no stored loan already carries.
    pub async fn generate<L>(
        &self,
        lookup: &L,
        partner_id: i64,
        region: RegionCode,
        form_type: FormType,
    ) -> Result<String, FormNumberError>
    where
        L: FormNumberLookup + ?Sized,
    {
        if partner_id <= 0 {
            return Err(FormNumberError::InvalidPartnerId(partner_id));
        }

        for attempt in 1..=self.max_attempts {
            let candidate = Self::candidate(partner_id, region, form_type);
            if !lookup.form_number_exists(&candidate).await? {
                tracing::debug!(
                    partner_id,
                    attempt,
                    form_number = %candidate,
                    "Form number generated"
                );
                return Ok(candidate);
            }
            tracing::warn!(partner_id, attempt, "Form number collision, retrying");
        }

        tracing::error!(
            partner_id,
            region = %region,
            form_type = %form_type,
            attempts = self.max_attempts,
            "Form number generation exhausted"
        );
        Err(FormNumberError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Split a form number into its partner, region and form type parts.
pub fn parse_form_number(form_number: &str) -> Option<(i64, RegionCode, FormType)> {
    let mut parts = form_number.split('-');
    if parts.next()? != "P" {
        return None;
    }
    let partner_id = parts.next()?.parse::<i64>().ok().filter(|id| *id > 0)?;
    let region = parts.next()?.parse::<RegionCode>().ok()?;
    let form_type = parts.next()?.parse::<FormType>().ok()?;
    let suffix = parts.next()?;
    if parts.next().is_some()
        || suffix.len() != SUFFIX_BYTES * 2
        || !suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase())
    {
        return None;
    }
    Some((partner_id, region, form_type))
}
