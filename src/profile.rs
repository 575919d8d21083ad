// Copyright 2026 the Entrant Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Entrant profile — the personal data the executor fills into forms.
//!
//! Loaded once at startup and shared read-only across workers. A missing
//! value is an ordinary condition (the field is skipped), never an error.

use crate::model::FieldKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    /// Whether terms/consent checkboxes may be ticked on the entrant's
    /// behalf. Defaults to off; nothing is consented to implicitly.
    pub accept_terms: bool,
}

impl PersonalProfile {
    /// Load a profile from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse profile: {}", path.display()))
    }

    /// The fill value for a classified field kind, if the profile has one.
    /// Checkbox kinds are handled separately via [`Self::consents`].
    pub fn value_for(&self, kind: FieldKind) -> Option<&str> {
        let v = match kind {
            FieldKind::FirstName => &self.first_name,
            FieldKind::LastName => &self.last_name,
            FieldKind::Email => &self.email,
            FieldKind::Phone => &self.phone,
            FieldKind::AddressLine => &self.address_line,
            FieldKind::City => &self.city,
            FieldKind::State => &self.state,
            FieldKind::PostalCode => &self.postal_code,
            FieldKind::Country => &self.country,
            FieldKind::TermsCheckbox | FieldKind::Unknown => &None,
        };
        v.as_deref()
    }

    pub fn consents(&self) -> bool {
        self.accept_terms
    }
}
