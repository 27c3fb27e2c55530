use std::sync::Arc;

use super::registry::IdentityRegistry;

/// Nearest-known-identity resolution over the immutable registry.
///
/// A detected descriptor maps to the enrolled identity with the smallest
/// cosine distance, provided that distance is within the configured
/// threshold; otherwise the face stays unknown and never touches counters.
#[derive(Clone)]
pub struct IdentityMatcher {
    registry: Arc<IdentityRegistry>,
    threshold: f32,
}

/// Cosine distance in [0, 2]; descriptors that cannot be normalized are
/// treated as maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::MAX;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return f32::MAX;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl IdentityMatcher {
    pub fn new(registry: Arc<IdentityRegistry>, threshold: f32) -> Self {
        Self {
            registry,
            threshold,
        }
    }

    /// Closest enrolled identity within the threshold, or `None` for an
    /// unknown face. Ties resolve to the smaller distance; an exact tie in
    /// distance resolves to the smaller identity id, so repeated calls with
    /// the same frame always agree.
    pub fn resolve(&self, descriptor: &[f32]) -> Option<i64> {
        let mut best: Option<(i64, f32)> = None;

        for profile in self.registry.iter() {
            let distance = cosine_distance(&profile.descriptor, descriptor);
            if distance > self.threshold {
                continue;
            }
            let closer = match best {
                None => true,
                Some((best_id, best_distance)) => {
                    distance < best_distance
                        || (distance == best_distance && profile.id < best_id)
                }
            };
            if closer {
                best = Some((profile.id, distance));
            }
        }

        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::registry::IdentityProfile;

    fn registry() -> Arc<IdentityRegistry> {
        Arc::new(
            IdentityRegistry::from_profiles(vec![
                IdentityProfile {
                    id: 1,
                    name: "Sana".into(),
                    descriptor: vec![1.0, 0.0, 0.0],
                },
                IdentityProfile {
                    id: 2,
                    name: "Ravi".into(),
                    descriptor: vec![0.0, 1.0, 0.0],
                },
            ])
            .unwrap(),
        )
    }

    #[test]
    fn identical_descriptor_has_zero_distance() {
        let d = vec![0.3, 0.4, 0.5];
        assert!(cosine_distance(&d, &d).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_descriptors_are_distance_one() {
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_never_matches() {
        let matcher = IdentityMatcher::new(registry(), 0.5);
        assert_eq!(matcher.resolve(&[0.0, 0.0, 0.0]), None);
    }

    #[test]
    fn resolves_nearest_within_threshold() {
        let matcher = IdentityMatcher::new(registry(), 0.5);
        // Closer to Sana's axis than Ravi's.
        assert_eq!(matcher.resolve(&[0.9, 0.2, 0.0]), Some(1));
        assert_eq!(matcher.resolve(&[0.1, 0.8, 0.0]), Some(2));
    }

    #[test]
    fn distant_descriptor_is_unknown() {
        let matcher = IdentityMatcher::new(registry(), 0.5);
        assert_eq!(matcher.resolve(&[0.0, 0.0, 1.0]), None);
    }

    #[test]
    fn equal_distances_resolve_to_the_smaller_id() {
        // [1,1,0] is equidistant from both enrolled descriptors.
        let matcher = IdentityMatcher::new(registry(), 0.5);
        assert_eq!(matcher.resolve(&[1.0, 1.0, 0.0]), Some(1));
    }

    #[test]
    fn boundary_distance_still_matches() {
        // Distance to [1,0,0] is exactly 1 - cos(45°), just under 0.293.
        let matcher = IdentityMatcher::new(registry(), 0.293);
        assert_eq!(matcher.resolve(&[1.0, 1.0, 0.0]), Some(1));
    }
}
