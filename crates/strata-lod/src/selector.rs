//! Distance-based LOD selection over the retention box around one or more viewers.
//!
//! With several streaming sources each selects its own box, and a region wanted by
//! more than one of them takes the finest LOD any of them asks for.

use std::collections::BTreeMap;

use glam::DVec3;
use strata_coords::{RegionCoord, RegionLayout};

use crate::bands::{LodBands, LodPolicyError};

/// How the viewer-to-region distance is measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Largest per-axis separation.
    Chebyshev,
    Euclidean,
}

/// Which point of a region the distance is measured to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceAnchor {
    /// Closest point of the region bounds (0 inside the region).
    NearestPoint,
    Center,
}

impl DistanceMetric {
    fn measure(self, delta: DVec3) -> f64 {
        match self {
            Self::Chebyshev => delta.abs().max_element(),
            Self::Euclidean => delta.length(),
        }
    }
}

/// Everything that decides which regions exist and at what LOD.
#[derive(Clone, Debug, PartialEq)]
pub struct LodPolicy {
    pub bands: LodBands,
    pub metric: DistanceMetric,
    pub anchor: DistanceAnchor,
    /// Distance that must be crossed past a band edge before a region's LOD changes.
    pub hysteresis: f64,
    /// Horizontal half-width of the selection box, in regions.
    pub retention_radius: u32,
    /// Vertical half-height of the selection box, in regions.
    pub vertical_radius: u32,
    /// Regions kept alive beyond the selection box before eviction.
    pub unload_margin: u32,
}

impl LodPolicy {
    /// A policy over `bands` with the default metric, radii and margins.
    pub fn new(bands: LodBands) -> Self {
        Self {
            bands,
            metric: DistanceMetric::Chebyshev,
            anchor: DistanceAnchor::NearestPoint,
            hysteresis: 4.0,
            retention_radius: 4,
            vertical_radius: 1,
            unload_margin: 1,
        }
    }

    pub fn validate(&self) -> Result<(), LodPolicyError> {
        if !self.hysteresis.is_finite() || self.hysteresis < 0.0 {
            return Err(LodPolicyError::InvalidHysteresis(self.hysteresis));
        }
        Ok(())
    }

    /// LOD for `distance`, keeping `current` while the distance stays within its
    /// band widened by the hysteresis margin on both sides.
    pub fn lod_with_hysteresis(&self, distance: f64, current: Option<u8>) -> u8 {
        let target = self.bands.lod_for_distance(distance);
        match current {
            Some(current) if current != target && current <= self.bands.max_lod() => {
                let (min, max) = self.bands.band_range(current);
                if distance >= min - self.hysteresis && distance < max + self.hysteresis {
                    current
                } else {
                    target
                }
            }
            _ => target,
        }
    }
}

/// Computes desired LODs for the regions around a viewer.
///
/// All methods are pure functions of their arguments and the selector's policy.
#[derive(Clone, Debug)]
pub struct LodSelector {
    layout: RegionLayout,
    policy: LodPolicy,
}

impl LodSelector {
    pub fn new(layout: RegionLayout, policy: LodPolicy) -> Result<Self, LodPolicyError> {
        policy.validate()?;
        Ok(Self { layout, policy })
    }

    pub fn policy(&self) -> &LodPolicy {
        &self.policy
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Distance from the viewer to a region under the policy's metric and anchor.
    pub fn distance(&self, viewer: DVec3, coord: RegionCoord) -> f64 {
        let anchor = match self.policy.anchor {
            DistanceAnchor::NearestPoint => self.layout.bounds(coord).nearest_point(viewer),
            DistanceAnchor::Center => self.layout.center(coord),
        };
        self.policy.metric.measure(anchor - viewer)
    }

    /// Desired LOD of a single region, without hysteresis.
    pub fn lod_for(&self, viewer: DVec3, coord: RegionCoord) -> u8 {
        self.policy.bands.lod_for_distance(self.distance(viewer, coord))
    }

    /// Desired LOD for every region in the selection box, keyed in coordinate order.
    pub fn select_lods(&self, viewer: DVec3) -> BTreeMap<RegionCoord, u8> {
        self.selection_box(viewer)
            .map(|coord| (coord, self.lod_for(viewer, coord)))
            .collect()
    }

    /// Like [`select_lods`](Self::select_lods), but a region whose current LOD is
    /// reported by `current` keeps it until the viewer moves more than the
    /// hysteresis margin past the band edge.
    pub fn select_lods_with_hysteresis<F>(
        &self,
        viewer: DVec3,
        current: F,
    ) -> BTreeMap<RegionCoord, u8>
    where
        F: Fn(RegionCoord) -> Option<u8>,
    {
        self.selection_box(viewer)
            .map(|coord| {
                let distance = self.distance(viewer, coord);
                (coord, self.policy.lod_with_hysteresis(distance, current(coord)))
            })
            .collect()
    }

    /// Union of every source's selection, each region at the finest LOD any source
    /// wants. Hysteresis applies per source.
    pub fn select_lods_for_sources<F>(
        &self,
        sources: &[DVec3],
        current: F,
    ) -> BTreeMap<RegionCoord, u8>
    where
        F: Fn(RegionCoord) -> Option<u8>,
    {
        let mut merged = BTreeMap::new();
        for &source in sources {
            for (coord, lod) in self.select_lods_with_hysteresis(source, &current) {
                merged
                    .entry(coord)
                    .and_modify(|finest: &mut u8| *finest = (*finest).min(lod))
                    .or_insert(lod);
            }
        }
        merged
    }

    /// Whether any source still keeps `coord` alive.
    pub fn retains_any(&self, sources: &[DVec3], coord: RegionCoord) -> bool {
        sources.iter().any(|&source| self.retains(source, coord))
    }

    /// Scheduling key against the nearest source. `u64::MAX` without sources.
    pub fn priority_any(&self, sources: &[DVec3], coord: RegionCoord) -> u64 {
        sources
            .iter()
            .map(|&source| self.priority(source, coord))
            .min()
            .unwrap_or(u64::MAX)
    }

    /// Whether a live region is still inside the unload radius.
    pub fn retains(&self, viewer: DVec3, coord: RegionCoord) -> bool {
        let center = self.layout.region_containing(viewer);
        let margin = u64::from(self.policy.unload_margin);
        coord.horizontal_distance(center) <= u64::from(self.policy.retention_radius) + margin
            && coord.vertical_distance(center) <= u64::from(self.policy.vertical_radius) + margin
    }

    /// Scheduling key for a region; smaller is more urgent.
    pub fn priority(&self, viewer: DVec3, coord: RegionCoord) -> u64 {
        coord.distance_sq(self.layout.region_containing(viewer))
    }

    fn selection_box(&self, viewer: DVec3) -> impl Iterator<Item = RegionCoord> {
        let center = self.layout.region_containing(viewer);
        let r = i64::from(self.policy.retention_radius);
        let v = i64::from(self.policy.vertical_radius);
        (-r..=r).flat_map(move |dx| {
            (-v..=v).flat_map(move |dy| {
                (-r..=r).map(move |dz| RegionCoord::new(center.x + dx, center.y + dy, center.z + dz))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(thresholds: Vec<f64>, retention: u32, vertical: u32) -> LodSelector {
        let mut policy = LodPolicy::new(LodBands::new(thresholds).unwrap());
        policy.retention_radius = retention;
        policy.vertical_radius = vertical;
        LodSelector::new(RegionLayout::new(32).unwrap(), policy).unwrap()
    }

    /// Region size 32, viewer at the origin, retention radius 2 and bands
    /// `[0,64) -> 0, [64,256) -> 1`: the 5x5 square around the origin, all LOD 0.
    #[test]
    fn test_origin_scenario_selects_five_by_five_at_lod_zero() {
        let selector = selector(vec![64.0, 256.0], 2, 0);
        let selected = selector.select_lods(DVec3::ZERO);

        let expected: BTreeMap<RegionCoord, u8> = (-2..=2)
            .flat_map(|x| (-2..=2).map(move |z| (RegionCoord::new(x, 0, z), 0)))
            .collect();
        assert_eq!(selected, expected);
        assert_eq!(selected.len(), 25);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let selector = selector(vec![48.0, 96.0, 200.0], 3, 1);
        let viewer = DVec3::new(123.4, -7.5, -410.25);
        let a = selector.select_lods(viewer);
        let b = selector.select_lods(viewer);
        assert_eq!(a, b);
        assert_eq!(a.len(), 7 * 3 * 7);
    }

    #[test]
    fn test_center_anchor_is_coarser_than_nearest_point() {
        let mut center = selector(vec![64.0, 256.0], 2, 0);
        center.policy.anchor = DistanceAnchor::Center;
        let nearest = selector(vec![64.0, 256.0], 2, 0);
        let corner = RegionCoord::new(2, 0, 2);

        assert_eq!(nearest.distance(DVec3::ZERO, corner), 48.0);
        assert_eq!(center.distance(DVec3::ZERO, corner), 64.0);
        assert_eq!(center.lod_for(DVec3::ZERO, corner), 1);
    }

    #[test]
    fn test_euclidean_metric() {
        let mut selector = selector(vec![64.0, 256.0], 2, 0);
        selector.policy.metric = DistanceMetric::Euclidean;
        let d = selector.distance(DVec3::ZERO, RegionCoord::new(2, 0, 2));
        assert!((d - (2.0_f64 * 48.0 * 48.0).sqrt()).abs() < 1e-9);
        assert_eq!(selector.lod_for(DVec3::ZERO, RegionCoord::new(2, 0, 2)), 1);
    }

    /// Crossing a band edge does not flip the LOD until the displacement exceeds
    /// the hysteresis margin.
    #[test]
    fn test_hysteresis_suppresses_flips_near_band_edge() {
        let selector = selector(vec![64.0, 256.0], 4, 0);
        let h = selector.policy().hysteresis;
        let coord = RegionCoord::new(3, 0, 0);
        // Region 3 starts at x = 80; viewer distance is 80 - x.
        let at = |distance: f64| DVec3::new(80.0 - distance, 0.0, 0.0);
        let current = |c: RegionCoord| (c == coord).then_some(0);

        let inside_margin = selector.select_lods_with_hysteresis(at(64.0 + h - 0.01), current);
        assert_eq!(inside_margin[&coord], 0);
        assert_eq!(selector.select_lods(at(64.0 + h - 0.01))[&coord], 1);

        let past_margin = selector.select_lods_with_hysteresis(at(64.0 + h), current);
        assert_eq!(past_margin[&coord], 1);
    }

    #[test]
    fn test_hysteresis_applies_when_refining() {
        let policy = selector(vec![64.0, 256.0], 4, 0).policy;
        assert_eq!(policy.lod_with_hysteresis(61.0, Some(1)), 1);
        assert_eq!(policy.lod_with_hysteresis(59.0, Some(1)), 0);
        // An unknown LOD from an older, longer band table is replaced.
        assert_eq!(policy.lod_with_hysteresis(10.0, Some(9)), 0);
    }

    #[test]
    fn test_retains_uses_unload_margin() {
        let selector = selector(vec![64.0], 2, 0);
        assert!(selector.retains(DVec3::ZERO, RegionCoord::new(3, 1, -3)));
        assert!(!selector.retains(DVec3::ZERO, RegionCoord::new(4, 0, 0)));
        assert!(!selector.retains(DVec3::ZERO, RegionCoord::new(0, 2, 0)));
    }

    #[test]
    fn test_priority_orders_by_region_distance() {
        let selector = selector(vec![64.0], 2, 0);
        let near = selector.priority(DVec3::ZERO, RegionCoord::new(1, 0, 0));
        let far = selector.priority(DVec3::ZERO, RegionCoord::new(2, 0, 1));
        assert!(near < far);
        assert_eq!(selector.priority(DVec3::ZERO, RegionCoord::ORIGIN), 0);
    }

    /// Overlapping sources take the finer LOD; disjoint boxes are both kept.
    #[test]
    fn test_sources_merge_to_finest_lod() {
        let selector = selector(vec![40.0, 256.0], 3, 0);
        let a = DVec3::ZERO;
        let b = DVec3::new(96.0, 0.0, 0.0);
        let merged = selector.select_lods_for_sources(&[a, b], |_| None);

        let (alone_a, alone_b) = (selector.select_lods(a), selector.select_lods(b));
        for (coord, &lod) in &merged {
            let expected = match (alone_a.get(coord), alone_b.get(coord)) {
                (Some(&x), Some(&y)) => x.min(y),
                (Some(&x), None) | (None, Some(&x)) => x,
                (None, None) => panic!("{coord} selected by neither source"),
            };
            assert_eq!(lod, expected, "{coord}");
        }
        assert_eq!(merged.len(), 10 * 7);
        // Region 3 is far from the origin viewer but next to the second one.
        assert_eq!(alone_a[&RegionCoord::new(3, 0, 0)], 1);
        assert_eq!(merged[&RegionCoord::new(3, 0, 0)], 0);
        assert_eq!(merged, selector.select_lods_for_sources(&[b, a], |_| None));
    }

    #[test]
    fn test_no_sources_select_nothing() {
        let selector = selector(vec![64.0], 2, 0);
        assert!(selector.select_lods_for_sources(&[], |_| None).is_empty());
        assert!(!selector.retains_any(&[], RegionCoord::ORIGIN));
        assert_eq!(selector.priority_any(&[], RegionCoord::ORIGIN), u64::MAX);
    }

    #[test]
    fn test_priority_and_retention_use_nearest_source() {
        let selector = selector(vec![64.0], 2, 0);
        let sources = [DVec3::ZERO, DVec3::new(320.0, 0.0, 0.0)];
        let coord = RegionCoord::new(9, 0, 0);
        assert_eq!(selector.priority_any(&sources, coord), 1);
        assert!(selector.retains_any(&sources, coord));
        assert!(!selector.retains(sources[0], coord));
    }

    #[test]
    fn test_negative_hysteresis_rejected() {
        let mut policy = LodPolicy::new(LodBands::new(vec![64.0]).unwrap());
        policy.hysteresis = -1.0;
        assert_eq!(
            LodSelector::new(RegionLayout::new(32).unwrap(), policy).unwrap_err(),
            LodPolicyError::InvalidHysteresis(-1.0)
        );
    }
}
