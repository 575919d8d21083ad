//! Semantic field classification.
//!
//! Maps raw input-element attributes to a semantic [`FieldKind`] with a
//! confidence score. Classification is total: every input gets a descriptor,
//! with unrecognizable fields landing in `Unknown` at confidence 0.
//!
//! Rule precedence, highest first:
//!
//! 1. exact match of the field name/id against a canonical vocabulary
//! 2. regex match against the associated label text
//! 3. match against placeholder text
//! 4. the declared input type (`email`, `tel`) as a weak signal
//! 5. `Unknown`, confidence 0
//!
//! The static DOM scan in this module is **synchronous** because `scraper`'s
//! types are `!Send` — callers wrap in `tokio::task::spawn_blocking` when
//! integrating with the async runtime.

pub mod visual;

use crate::config::EntrantConfig;
use crate::model::{FieldDescriptor, FieldKind, FieldSource, RawField};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

// ── Canonical vocabulary ─────────────────────────────────────────────────────

/// Exact name/id tokens per semantic kind. Matched after lowercasing and
/// stripping `-`/`_`/`[]` noise, so `first_name`, `first-name`, and
/// `entry[first_name]` all hit `FirstName`.
const VOCABULARY: &[(FieldKind, &[&str])] = &[
    (
        FieldKind::FirstName,
        &["firstname", "fname", "givenname", "forename"],
    ),
    (
        FieldKind::LastName,
        &["lastname", "lname", "surname", "familyname"],
    ),
    (FieldKind::Email, &["email", "emailaddress", "mail"]),
    (
        FieldKind::Phone,
        &["phone", "phonenumber", "mobile", "tel", "telephone", "cell"],
    ),
    (
        FieldKind::AddressLine,
        &["address", "address1", "addressline1", "street", "streetaddress"],
    ),
    (FieldKind::City, &["city", "town", "suburb"]),
    (FieldKind::State, &["state", "province", "region"]),
    (
        FieldKind::PostalCode,
        &["zip", "zipcode", "postcode", "postalcode", "postal"],
    ),
    (FieldKind::Country, &["country", "nation"]),
];

/// Consent-indicating phrases for checkbox labels.
const CONSENT_PHRASES: &[&str] = &[
    "terms",
    "conditions",
    "agree",
    "consent",
    "accept",
    "privacy policy",
    "i am over",
    "opt in",
];

fn label_patterns() -> &'static Vec<(FieldKind, Regex)> {
    static PATTERNS: OnceLock<Vec<(FieldKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // Order matters: first/last name before the bare "name" catch-all.
        let raw: &[(FieldKind, &str)] = &[
            (FieldKind::FirstName, r"(?i)\bfirst\s*name\b|\bgiven\s*name\b"),
            (FieldKind::LastName, r"(?i)\blast\s*name\b|\bsurname\b|\bfamily\s*name\b"),
            (FieldKind::Email, r"(?i)\be-?mail\b"),
            (FieldKind::Phone, r"(?i)\bphone\b|\bmobile\b|\btelephone\b|\bcontact\s*number\b"),
            (FieldKind::PostalCode, r"(?i)\bpost\s*code\b|\bpostal\s*code\b|\bzip\b"),
            (FieldKind::AddressLine, r"(?i)\baddress\b|\bstreet\b"),
            (FieldKind::City, r"(?i)\bcity\b|\btown\b|\bsuburb\b"),
            (FieldKind::State, r"(?i)\bstate\b|\bprovince\b"),
            (FieldKind::Country, r"(?i)\bcountry\b"),
            // Bare "name" defaults to first name, matching how entry forms
            // with a single name field are filled.
            (FieldKind::FirstName, r"(?i)\bname\b"),
        ];
        raw.iter()
            .map(|(k, p)| (*k, Regex::new(p).expect("label pattern is valid")))
            .collect()
    })
}

// ── Classification ───────────────────────────────────────────────────────────

/// Classify one raw field into a [`FieldDescriptor`].
pub fn classify(raw: &RawField, source: FieldSource, cfg: &EntrantConfig) -> FieldDescriptor {
    let (kind, confidence) = classify_inner(raw, cfg);
    FieldDescriptor {
        kind,
        source,
        raw: raw.clone(),
        confidence,
    }
}

fn classify_inner(raw: &RawField, cfg: &EntrantConfig) -> (FieldKind, f32) {
    // Consent checkboxes are recognized from the label regardless of name,
    // and each independent checkbox is classified separately.
    if raw.input_type.eq_ignore_ascii_case("checkbox") {
        let label = raw.label.to_lowercase();
        if CONSENT_PHRASES.iter().any(|p| label.contains(p)) {
            return (FieldKind::TermsCheckbox, cfg.label_match_confidence);
        }
        return (FieldKind::Unknown, 0.0);
    }

    // Rule 1: exact vocabulary match on name, then id.
    for attr in [&raw.name, &raw.id] {
        let token = normalize_token(attr);
        if token.is_empty() {
            continue;
        }
        for (kind, words) in VOCABULARY {
            if words.contains(&token.as_str()) {
                return (*kind, cfg.exact_match_confidence);
            }
        }
    }

    // Rule 2: label regex.
    if !raw.label.is_empty() {
        for (kind, re) in label_patterns() {
            if re.is_match(&raw.label) {
                return (*kind, cfg.label_match_confidence);
            }
        }
    }

    // Rule 3: placeholder text.
    if !raw.placeholder.is_empty() {
        for (kind, re) in label_patterns() {
            if re.is_match(&raw.placeholder) {
                return (*kind, cfg.placeholder_match_confidence);
            }
        }
    }

    // Rule 4: declared input type, a weak signal.
    match raw.input_type.to_lowercase().as_str() {
        "email" => return (FieldKind::Email, cfg.input_type_confidence),
        "tel" => return (FieldKind::Phone, cfg.input_type_confidence),
        _ => {}
    }

    (FieldKind::Unknown, 0.0)
}

/// Classify a whole scan, preserving input order.
pub fn classify_all(
    raws: &[RawField],
    source: FieldSource,
    cfg: &EntrantConfig,
) -> Vec<FieldDescriptor> {
    raws.iter().map(|r| classify(r, source, cfg)).collect()
}

/// Count of descriptors that are classified and above the confidence floor,
/// i.e. eligible for filling. Drives the visual-fallback trigger and the
/// too-few-fields structural check.
pub fn classifiable_count(fields: &[FieldDescriptor], cfg: &EntrantConfig) -> usize {
    fields
        .iter()
        .filter(|f| f.kind != FieldKind::Unknown && f.confidence >= cfg.confidence_floor)
        .count()
}

fn normalize_token(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

// ── Static DOM scan ──────────────────────────────────────────────────────────

/// Extract raw fields from static HTML.
///
/// When `scope` is given, only fields inside the first element matching that
/// selector are scanned; an unmatched scope yields no fields. Labels are
/// resolved via `label[for=<id>]` first, then a wrapping `<label>`. Locators
/// prefer `[name=...]`, fall back to `#id`, and finally to a per-parent
/// positional selector so every field remains addressable.
pub fn scan_fields(html: &str, scope: Option<&str>) -> Vec<RawField> {
    let document = Html::parse_document(html);
    let field_sel =
        Selector::parse("input, select, textarea").expect("field selector is valid");
    let label_sel = Selector::parse("label").expect("label selector is valid");

    // Index label[for] → text once, document-wide: a label may sit outside
    // the scoped form.
    let mut labels_by_for: Vec<(String, String)> = Vec::new();
    for label in document.select(&label_sel) {
        if let Some(for_id) = label.value().attr("for") {
            labels_by_for.push((for_id.to_string(), element_text(&label)));
        }
    }

    let elements: Vec<ElementRef> = match scope {
        Some(sel) => Selector::parse(sel)
            .ok()
            .and_then(|root_sel| document.select(&root_sel).next())
            .map(|root| root.select(&field_sel).collect())
            .unwrap_or_default(),
        None => document.select(&field_sel).collect(),
    };

    let mut fields = Vec::new();
    for el in elements {
        let input_type = el.value().attr("type").unwrap_or("text").to_string();
        // Hidden and submit inputs carry no user data.
        if matches!(input_type.as_str(), "hidden" | "submit" | "button" | "image") {
            continue;
        }

        let name = el.value().attr("name").unwrap_or("").to_string();
        let id = el.value().attr("id").unwrap_or("").to_string();
        let placeholder = el.value().attr("placeholder").unwrap_or("").to_string();

        let label = if !id.is_empty() {
            labels_by_for
                .iter()
                .find(|(for_id, _)| *for_id == id)
                .map(|(_, text)| text.clone())
                .unwrap_or_else(|| wrapping_label_text(&el))
        } else {
            wrapping_label_text(&el)
        };

        let locator = if !name.is_empty() {
            format!("[name=\"{name}\"]")
        } else if !id.is_empty() {
            format!("#{id}")
        } else {
            positional_locator(&el)
        };

        fields.push(RawField {
            name,
            id,
            label,
            placeholder,
            input_type,
            locator,
            bbox: None,
        });
    }
    fields
}

/// `tag:nth-of-type(n)` with `n` the element's position among same-tag
/// siblings of its parent, matching CSS nth-of-type resolution.
fn positional_locator(el: &ElementRef) -> String {
    let tag = el.value().name();
    let position = el
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|s| s.value().name() == tag)
        .count()
        + 1;
    format!("{tag}:nth-of-type({position})")
}

fn wrapping_label_text(el: &ElementRef) -> String {
    let mut current = el.parent();
    while let Some(node) = current {
        if let Some(parent_el) = ElementRef::wrap(node) {
            if parent_el.value().name() == "label" {
                return element_text(&parent_el);
            }
            current = node.parent();
        } else {
            break;
        }
    }
    String::new()
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
