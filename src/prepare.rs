//! Composition preparation
//!
//! Normalizes a composition for the downstream stages: applies type-based
//! parameter defaults, validates references and size ranges, and resolves
//! declarative compass positions to axial step directions. Preparation is
//! idempotent; running it twice leaves the composition unchanged.

use log::debug;

use crate::composition::{
    AreaType, Composition, Feature, FeatureStatus, FlowKind, Position,
};
use crate::defaults::{apply_defaults, area_defaults, mountain_height_defaults};
use crate::error::ComposeError;
use crate::hex::Side;

/// Prepare a composition in place. Returns every validation error found;
/// an empty error list means all features are PREPARED.
pub fn prepare(composition: &mut Composition) -> Result<(), Vec<ComposeError>> {
    let mut errors = Vec::new();

    // Validation reads the feature index while preparation mutates features,
    // so references are checked against a snapshot of ids and names first.
    let known: Vec<(String, String)> = composition
        .features
        .iter()
        .map(|f| (f.feature_id().to_string(), f.name().to_string()))
        .collect();
    let resolves = |reference: &str| {
        reference == "origin"
            || known
                .iter()
                .any(|(id, name)| id == reference || name == reference)
    };

    for index in 0..composition.features.len() {
        let feature = &composition.features[index];
        let feature_name = feature.name().to_string();

        // Duplicate feature ids break every later lookup
        let id = feature.feature_id();
        if known.iter().filter(|(known_id, _)| known_id == id).count() > 1 {
            errors.push(ComposeError::InvalidReference {
                feature: feature_name.clone(),
                reference: format!("duplicate featureId '{id}'"),
            });
        }

        match &composition.features[index] {
            Feature::Area(area) => {
                if area.size_from < 0 || area.size_to < 0 || area.size_from > area.size_to {
                    errors.push(ComposeError::InvalidSize {
                        feature: feature_name.clone(),
                        from: area.size_from as i64,
                        to: area.size_to as i64,
                    });
                }
                check_positions(&area.positions, &feature_name, &resolves, &mut errors);
            }
            Feature::Point(point) => {
                if !resolves(&point.snap.target) {
                    errors.push(ComposeError::InvalidReference {
                        feature: feature_name.clone(),
                        reference: point.snap.target.clone(),
                    });
                }
            }
            Feature::Flow(flow) => {
                for reference in [&flow.start_point_id, &flow.end_point_id]
                    .into_iter()
                    .flatten()
                {
                    if !resolves(reference) {
                        errors.push(ComposeError::InvalidReference {
                            feature: feature_name.clone(),
                            reference: reference.clone(),
                        });
                    }
                }
                for reference in &flow.waypoint_ids {
                    if !resolves(reference) {
                        errors.push(ComposeError::InvalidReference {
                            feature: feature_name.clone(),
                            reference: reference.clone(),
                        });
                    }
                }
                match &flow.kind {
                    FlowKind::River {
                        merge_to_id: Some(merge_to),
                        ..
                    } if !resolves(merge_to) => {
                        errors.push(ComposeError::InvalidReference {
                            feature: feature_name.clone(),
                            reference: merge_to.clone(),
                        });
                    }
                    FlowKind::SideWall {
                        target_biome_id, ..
                    } if !resolves(target_biome_id) => {
                        errors.push(ComposeError::InvalidReference {
                            feature: feature_name.clone(),
                            reference: target_biome_id.clone(),
                        });
                    }
                    _ => {}
                }
            }
            Feature::Structure(structure) => {
                check_positions(&structure.positions, &feature_name, &resolves, &mut errors);
            }
        }

        // Mutating pass: defaults, resolved sides, calculated sizes
        match &mut composition.features[index] {
            Feature::Area(area) => {
                if area.area_type == AreaType::Mountains {
                    if let Some(height) = area.height {
                        apply_defaults(&mut area.header.parameters, mountain_height_defaults(height));
                    }
                }
                apply_defaults(&mut area.header.parameters, area_defaults(area.area_type));
                area.calculated_size_from = Some(area.size_from);
                area.calculated_size_to = Some(area.size_to);
                resolve_sides(&mut area.positions);
            }
            Feature::Structure(structure) => {
                resolve_sides(&mut structure.positions);
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        for feature in &mut composition.features {
            let header = feature.header_mut();
            if header.status == FeatureStatus::New {
                header.status = FeatureStatus::Prepared;
            }
        }
        debug!(
            "prepared composition '{}' with {} features",
            composition.name,
            composition.features.len()
        );
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_positions(
    positions: &[Position],
    feature_name: &str,
    resolves: &dyn Fn(&str) -> bool,
    errors: &mut Vec<ComposeError>,
) {
    for position in positions {
        if !resolves(&position.anchor) {
            errors.push(ComposeError::InvalidReference {
                feature: feature_name.to_string(),
                reference: position.anchor.clone(),
            });
        }
        if position.distance_from < 0 || position.distance_from > position.distance_to {
            errors.push(ComposeError::InvalidSize {
                feature: feature_name.to_string(),
                from: position.distance_from as i64,
                to: position.distance_to as i64,
            });
        }
    }
}

fn resolve_sides(positions: &mut [Position]) {
    for position in positions {
        position.resolved_side = Some(Side::from_angle(position.angle()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{
        AreaFeature, AreaShape, Compass, FeatureHeader, MountainHeight,
    };

    fn area(id: &str, name: &str, area_type: AreaType) -> Feature {
        Feature::Area(AreaFeature {
            header: FeatureHeader {
                name: name.into(),
                feature_id: id.into(),
                ..Default::default()
            },
            area_type,
            shape: AreaShape::Circle,
            size_from: 3,
            size_to: 5,
            positions: vec![Position {
                direction: Some(Compass::N),
                direction_angle: None,
                distance_from: 2,
                distance_to: 4,
                anchor: "origin".into(),
                priority: 0,
                resolved_side: None,
            }],
            continent_id: None,
            height: None,
            deviation_left: None,
            deviation_right: None,
            deviation_tendency: None,
            direction_deviation: None,
            calculated_size_from: None,
            calculated_size_to: None,
        })
    }

    fn composition(features: Vec<Feature>) -> Composition {
        Composition {
            world_id: Some("w1".into()),
            name: "test".into(),
            seed: None,
            features,
            continents: vec![],
        }
    }

    #[test]
    fn test_prepare_applies_defaults_and_status() {
        let mut comp = composition(vec![area("m1", "peaks", AreaType::Mountains)]);
        prepare(&mut comp).unwrap();

        let Feature::Area(area) = &comp.features[0] else {
            panic!()
        };
        assert_eq!(area.header.status, FeatureStatus::Prepared);
        assert_eq!(
            area.header.parameters.get("g_builder").map(String::as_str),
            Some("mountain")
        );
        assert_eq!(area.calculated_size_from, Some(3));
        assert_eq!(area.positions[0].resolved_side, Some(Side::NorthEast));
    }

    #[test]
    fn test_mountain_height_class_wins_over_type_default() {
        let mut comp = composition(vec![area("m1", "peaks", AreaType::Mountains)]);
        let Feature::Area(area) = &mut comp.features[0] else {
            panic!()
        };
        area.height = Some(MountainHeight::HighPeaks);

        prepare(&mut comp).unwrap();
        let Feature::Area(area) = &comp.features[0] else {
            panic!()
        };
        assert_eq!(
            area.header.parameters.get("g_offset").map(String::as_str),
            Some("45")
        );
    }

    #[test]
    fn test_unknown_anchor_is_invalid_reference() {
        let mut comp = composition(vec![area("f1", "forest", AreaType::Forest)]);
        let Feature::Area(area) = &mut comp.features[0] else {
            panic!()
        };
        area.positions[0].anchor = "missing".into();

        let errors = prepare(&mut comp).unwrap_err();
        assert!(matches!(
            errors[0],
            ComposeError::InvalidReference { .. }
        ));
    }

    #[test]
    fn test_inverted_size_range_rejected() {
        let mut comp = composition(vec![area("f1", "forest", AreaType::Forest)]);
        let Feature::Area(area) = &mut comp.features[0] else {
            panic!()
        };
        area.size_from = 9;
        area.size_to = 3;

        let errors = prepare(&mut comp).unwrap_err();
        assert!(matches!(errors[0], ComposeError::InvalidSize { .. }));
    }

    #[test]
    fn test_duplicate_feature_ids_rejected() {
        let mut comp = composition(vec![
            area("same", "one", AreaType::Forest),
            area("same", "two", AreaType::Plains),
        ]);
        let errors = prepare(&mut comp).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let mut once = composition(vec![area("f1", "forest", AreaType::Forest)]);
        prepare(&mut once).unwrap();
        let mut twice = once.clone();
        prepare(&mut twice).unwrap();
        assert_eq!(once, twice);
    }
}
