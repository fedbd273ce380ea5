//! # Hierarchy Builder
//!
//! Deterministically materializes the Release -> Wave -> Cluster -> Bundle -> App
//! tree from the run's size parameters. Identical inputs always yield identical ids:
//!
//! ```text
//! wave:wave-{i}
//! cluster:cluster-{i}-{j}
//! bundle:{cluster-token}-bundle
//! app:{bundle-token}-app-{k}
//! ```

use chrono::{DateTime, Utc};

use crate::constants::engine::MAX_ENTITIES_PER_RELEASE;
use crate::error::{ReleaseError, Result};
use crate::models::{App, Bundle, Cluster, EntityId, EntityKind, Wave};
use crate::state_machine::EntityState;

/// The four ordered entity collections of one release
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltHierarchy {
    pub waves: Vec<Wave>,
    pub clusters: Vec<Cluster>,
    pub bundles: Vec<Bundle>,
    pub apps: Vec<App>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyBuilder {
    num_waves: usize,
    clusters_per_wave: usize,
    apps_per_bundle: usize,
}

impl HierarchyBuilder {
    pub fn new(num_waves: usize, clusters_per_wave: usize, apps_per_bundle: usize) -> Self {
        Self {
            num_waves,
            clusters_per_wave,
            apps_per_bundle,
        }
    }

    /// Total number of records the tree would hold, or an error past the per-release cap
    pub fn entity_count(&self) -> Result<usize> {
        let too_large = || {
            ReleaseError::InvalidParameter(format!(
                "hierarchy of {} waves x {} clusters x {} apps exceeds {MAX_ENTITIES_PER_RELEASE} entities",
                self.num_waves, self.clusters_per_wave, self.apps_per_bundle
            ))
        };
        let clusters = self
            .num_waves
            .checked_mul(self.clusters_per_wave)
            .ok_or_else(too_large)?;
        let apps = clusters.checked_mul(self.apps_per_bundle).ok_or_else(too_large)?;
        // clusters and bundles are one-to-one
        let total = self
            .num_waves
            .checked_add(clusters.saturating_mul(2))
            .and_then(|n| n.checked_add(apps))
            .ok_or_else(too_large)?;
        if total > MAX_ENTITIES_PER_RELEASE {
            return Err(too_large());
        }
        Ok(total)
    }

    /// Materialize every record in `pending` state, timestamped `now`
    pub fn build(&self, release_id: &EntityId, now: DateTime<Utc>) -> Result<BuiltHierarchy> {
        if release_id.kind() != EntityKind::Release {
            return Err(ReleaseError::InvalidEntityId(format!(
                "hierarchy root must be a release id, got '{release_id}'"
            )));
        }

        self.entity_count()?;
        let total_clusters = self.num_waves * self.clusters_per_wave;
        let mut built = BuiltHierarchy {
            waves: Vec::with_capacity(self.num_waves),
            clusters: Vec::with_capacity(total_clusters),
            bundles: Vec::with_capacity(total_clusters),
            apps: Vec::with_capacity(total_clusters * self.apps_per_bundle),
        };

        for wave_num in 1..=self.num_waves {
            let wave_id = EntityId::new(EntityKind::Wave, &format!("wave-{wave_num}"))?;
            let mut cluster_ids = Vec::with_capacity(self.clusters_per_wave);

            for cluster_num in 1..=self.clusters_per_wave {
                let cluster_id = EntityId::new(
                    EntityKind::Cluster,
                    &format!("cluster-{wave_num}-{cluster_num}"),
                )?;
                let cluster_name = format!("Cluster {wave_num}-{cluster_num}");
                let bundle_id =
                    EntityId::new(EntityKind::Bundle, &format!("{}-bundle", cluster_id.token()))?;

                let mut app_ids = Vec::with_capacity(self.apps_per_bundle);
                for app_num in 1..=self.apps_per_bundle {
                    let app_id =
                        EntityId::new(EntityKind::App, &format!("{}-app-{app_num}", bundle_id.token()))?;
                    built.apps.push(App {
                        id: app_id.clone(),
                        bundle_id: bundle_id.clone(),
                        name: Some(format!("App {app_num} - {cluster_name}")),
                        version: format!("v1.{app_num}.0"),
                        state: EntityState::Pending,
                        created_at: now,
                        updated_at: now,
                    });
                    app_ids.push(app_id);
                }

                built.bundles.push(Bundle {
                    id: bundle_id.clone(),
                    cluster_id: cluster_id.clone(),
                    name: Some(format!("Bundle for {cluster_name}")),
                    state: EntityState::Pending,
                    created_at: now,
                    updated_at: now,
                    app_ids,
                });
                built.clusters.push(Cluster {
                    id: cluster_id.clone(),
                    wave_id: wave_id.clone(),
                    name: Some(cluster_name),
                    state: EntityState::Pending,
                    created_at: now,
                    updated_at: now,
                    bundle_id,
                });
                cluster_ids.push(cluster_id);
            }

            built.waves.push(Wave {
                id: wave_id,
                release_id: release_id.clone(),
                sequence: wave_num,
                state: EntityState::Pending,
                created_at: now,
                updated_at: now,
                cluster_ids,
            });
        }

        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn release() -> EntityId {
        EntityId::parse("release:rel-1").unwrap()
    }

    #[test]
    fn test_generated_ids_follow_naming_scheme() {
        let built = HierarchyBuilder::new(1, 2, 2).build(&release(), Utc::now()).unwrap();
        assert_eq!(built.waves[0].id.as_str(), "wave:wave-1");
        assert_eq!(built.clusters[1].id.as_str(), "cluster:cluster-1-2");
        assert_eq!(built.bundles[1].id.as_str(), "bundle:cluster-1-2-bundle");
        assert_eq!(built.apps[3].id.as_str(), "app:cluster-1-2-bundle-app-2");
        assert_eq!(built.apps[3].version, "v1.2.0");
        assert_eq!(built.clusters[1].name.as_deref(), Some("Cluster 1-2"));
        assert_eq!(built.waves[0].sequence, 1);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let now = Utc::now();
        let builder = HierarchyBuilder::new(2, 3, 2);
        assert_eq!(
            builder.build(&release(), now).unwrap(),
            builder.build(&release(), now).unwrap()
        );
    }

    #[test]
    fn test_rejects_non_release_root() {
        let wave = EntityId::parse("wave:wave-1").unwrap();
        assert!(HierarchyBuilder::new(1, 1, 1).build(&wave, Utc::now()).is_err());
    }

    #[test]
    fn test_empty_dimensions_build_empty_levels() {
        let built = HierarchyBuilder::new(2, 0, 5).build(&release(), Utc::now()).unwrap();
        assert_eq!(built.waves.len(), 2);
        assert!(built.clusters.is_empty());
        assert!(built.apps.is_empty());
    }

    #[test]
    fn test_oversized_trees_are_rejected_before_allocating() {
        let overflowing = HierarchyBuilder::new(1 << 40, 1 << 40, 1);
        assert!(matches!(
            overflowing.build(&release(), Utc::now()),
            Err(ReleaseError::InvalidParameter(_))
        ));

        let huge = HierarchyBuilder::new(1 << 40, 1, 0);
        assert!(matches!(huge.entity_count(), Err(ReleaseError::InvalidParameter(_))));

        assert_eq!(HierarchyBuilder::new(2, 2, 3).entity_count().unwrap(), 2 + 4 + 4 + 12);
        assert!(HierarchyBuilder::new(usize::MAX, 0, 0).entity_count().is_err());
    }

    proptest! {
        #[test]
        fn prop_cardinalities_and_back_references(w in 0usize..5, c in 0usize..5, a in 0usize..5) {
            let built = HierarchyBuilder::new(w, c, a).build(&release(), Utc::now()).unwrap();
            prop_assert_eq!(built.waves.len(), w);
            prop_assert_eq!(built.clusters.len(), w * c);
            prop_assert_eq!(built.bundles.len(), w * c);
            prop_assert_eq!(built.apps.len(), w * c * a);

            for wave in &built.waves {
                prop_assert_eq!(&wave.release_id, &release());
                for cluster_id in &wave.cluster_ids {
                    let cluster = built.clusters.iter().find(|cl| &cl.id == cluster_id).unwrap();
                    prop_assert_eq!(&cluster.wave_id, &wave.id);
                }
            }
            for cluster in &built.clusters {
                let owned: Vec<_> = built.bundles.iter().filter(|b| b.cluster_id == cluster.id).collect();
                prop_assert_eq!(owned.len(), 1);
                prop_assert_eq!(&owned[0].id, &cluster.bundle_id);
            }
            for bundle in &built.bundles {
                prop_assert_eq!(bundle.app_ids.len(), a);
                for app_id in &bundle.app_ids {
                    let app = built.apps.iter().find(|ap| &ap.id == app_id).unwrap();
                    prop_assert_eq!(&app.bundle_id, &bundle.id);
                }
            }
        }
    }
}
