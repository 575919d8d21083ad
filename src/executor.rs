//! Form fill executor.
//!
//! Takes a classified field set and the entrant profile and drives values
//! into the page through the [`FormDriver`] seam. Fields are filled in the
//! canonical [`FieldKind::FILL_ORDER`], one at a time; a failure on one
//! field is recorded and the rest proceed. Filling is best-effort by
//! construction: the fill rate in the report says how much of the form was
//! actually covered.

use crate::config::EntrantConfig;
use crate::model::{FieldDescriptor, FieldKind, FieldOutcome, FillReport, SkipReason};
use crate::profile::PersonalProfile;
use anyhow::Result;
use async_trait::async_trait;

/// Seam to the live page. The production implementation evaluates JS against
/// the bound frame; tests script it.
#[async_trait]
pub trait FormDriver: Send {
    async fn set_text(&mut self, locator: &str, value: &str) -> Result<()>;
    async fn set_checked(&mut self, locator: &str, checked: bool) -> Result<()>;
}

/// Fill every classified field the profile has a value for, in canonical
/// order. Returns a report covering ALL scanned descriptors, filled or not.
pub async fn fill_form(
    descriptors: &[FieldDescriptor],
    profile: &PersonalProfile,
    cfg: &EntrantConfig,
    driver: &mut dyn FormDriver,
) -> FillReport {
    let mut fields: Vec<(FieldDescriptor, FieldOutcome)> = Vec::with_capacity(descriptors.len());

    for kind in FieldKind::FILL_ORDER {
        for desc in descriptors.iter().filter(|d| d.kind == kind) {
            let outcome = fill_one(desc, profile, cfg, driver).await;
            if matches!(outcome, FieldOutcome::Failed { .. }) {
                tracing::warn!(
                    locator = %desc.raw.locator,
                    kind = ?desc.kind,
                    "field fill failed, continuing"
                );
            }
            fields.push((desc.clone(), outcome));
        }
    }

    let filled = fields
        .iter()
        .filter(|(_, o)| matches!(o, FieldOutcome::Filled))
        .count();
    let fill_rate = if fields.is_empty() {
        0.0
    } else {
        filled as f32 / fields.len() as f32
    };
    tracing::info!(filled, total = fields.len(), fill_rate, "form fill complete");

    FillReport { fields, fill_rate }
}

async fn fill_one(
    desc: &FieldDescriptor,
    profile: &PersonalProfile,
    cfg: &EntrantConfig,
    driver: &mut dyn FormDriver,
) -> FieldOutcome {
    if desc.kind == FieldKind::Unknown {
        return FieldOutcome::Skipped {
            reason: SkipReason::Unclassified,
        };
    }
    if desc.confidence < cfg.confidence_floor {
        return FieldOutcome::Skipped {
            reason: SkipReason::BelowConfidenceFloor,
        };
    }

    if desc.kind == FieldKind::TermsCheckbox {
        if !profile.consents() {
            return FieldOutcome::Skipped {
                reason: SkipReason::NoProfileValue,
            };
        }
        return match driver.set_checked(&desc.raw.locator, true).await {
            Ok(()) => FieldOutcome::Filled,
            Err(e) => FieldOutcome::Failed {
                error: e.to_string(),
            },
        };
    }

    let Some(value) = profile.value_for(desc.kind) else {
        return FieldOutcome::Skipped {
            reason: SkipReason::NoProfileValue,
        };
    };
    match driver.set_text(&desc.raw.locator, value).await {
        Ok(()) => FieldOutcome::Filled,
        Err(e) => FieldOutcome::Failed {
            error: e.to_string(),
        },
    }
}
