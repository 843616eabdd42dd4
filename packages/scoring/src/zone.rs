//! Critical-zone modifiers.

use storage_siting_scoring_models::{ZoneContext, ZoneScore};

use crate::context::{CompiledZone, SiteContext};

/// Applies each zone layer's modifier once when the candidate falls in any
/// of its polygons.
///
/// `context` picks the geometry tested: the candidate point, or its service
/// area when one exists. Modifiers from different layers add up.
#[must_use]
pub fn score_zones(
    site: &SiteContext,
    zones: &[CompiledZone],
    context: ZoneContext,
) -> Vec<ZoneScore> {
    zones
        .iter()
        .map(|zone| {
            let inside = match (context, &site.service_area) {
                (ZoneContext::ServiceArea, Some(area)) => {
                    !zone.polygons.intersecting(area).is_empty()
                }
                _ => !zone.polygons.touching(site.point).is_empty(),
            };

            ZoneScore {
                zone: zone.name.clone(),
                inside,
                applied: if inside { zone.modifier } else { 0.0 },
            }
        })
        .collect()
}

/// Sum of applied modifiers.
#[must_use]
pub fn zone_total(scores: &[ZoneScore]) -> f64 {
    scores.iter().map(|s| s.applied).sum()
}
