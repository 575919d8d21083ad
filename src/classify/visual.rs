//! Visual fallback — map OCR text regions onto unclaimed input elements.
//!
//! The OCR itself is a collaborator: it turns a rendered screenshot into
//! text regions with bounding boxes. This module owns the mapping from
//! regions to fields. It fires only when the structural (DOM + iframe) scan
//! classified too few fields, and every visually-sourced classification
//! carries a fixed uncertainty penalty relative to DOM matches.

use crate::config::EntrantConfig;
use crate::model::{FieldDescriptor, FieldKind, FieldSource, RawField};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A detected text region from the OCR collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    /// `(x, y, w, h)` in viewport pixels.
    pub bbox: (f32, f32, f32, f32),
}

/// OCR/image-analysis collaborator: rendered image in, text regions out.
#[async_trait]
pub trait VisualScanner: Send + Sync {
    async fn detect(&self, png: &[u8]) -> Result<Vec<TextRegion>>;
}

/// Should the visual fallback run, given the structurally classified count?
pub fn should_invoke(classified_above_floor: usize, cfg: &EntrantConfig) -> bool {
    classified_above_floor < cfg.visual_trigger_threshold
}

/// Map text regions to the nearest unclaimed input by spatial proximity and
/// classify each claimed field from the region text.
///
/// `unclaimed` are raw fields the structural pass left `Unknown`; only those
/// with a bounding box participate. Each input is claimed at most once, by
/// the closest region, and each region claims at most one input.
pub fn map_regions(
    regions: &[TextRegion],
    unclaimed: &[RawField],
    cfg: &EntrantConfig,
) -> Vec<FieldDescriptor> {
    let mut claimed: Vec<bool> = vec![false; unclaimed.len()];
    let mut out = Vec::new();

    for region in regions {
        // Classify the region text first; skip regions that carry no signal
        // so they cannot claim an input away from a useful region.
        let synthetic = RawField {
            label: region.text.clone(),
            input_type: "text".into(),
            ..Default::default()
        };
        let classified = super::classify(&synthetic, FieldSource::Visual, cfg);
        if classified.kind == FieldKind::Unknown {
            continue;
        }

        let mut best: Option<(usize, f32)> = None;
        for (i, field) in unclaimed.iter().enumerate() {
            if claimed[i] {
                continue;
            }
            let Some(bbox) = field.bbox else { continue };
            let d = center_distance(region.bbox, bbox);
            if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((i, d));
            }
        }

        if let Some((i, _)) = best {
            claimed[i] = true;
            let confidence = (classified.confidence - cfg.visual_penalty).max(0.0);
            out.push(FieldDescriptor {
                kind: classified.kind,
                source: FieldSource::Visual,
                raw: unclaimed[i].clone(),
                confidence,
            });
        }
    }
    out
}

fn center_distance(a: (f32, f32, f32, f32), b: (f32, f32, f32, f32)) -> f32 {
    let (ax, ay) = (a.0 + a.2 / 2.0, a.1 + a.3 / 2.0);
    let (bx, by) = (b.0 + b.2 / 2.0, b.1 + b.3 / 2.0);
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}
