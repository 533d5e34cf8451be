//! Built-in parameter defaults per feature type
//!
//! The preparer applies these tables to every area feature before
//! composition. Defaults never overwrite values the composition already
//! carries, so a document can always pin any parameter explicitly.

use crate::composition::{AreaType, MountainHeight, ParamMap};

/// Default cell parameters for an area type.
pub fn area_defaults(area_type: AreaType) -> &'static [(&'static str, &'static str)] {
    match area_type {
        AreaType::Plains => &[("g_offset", "1"), ("g_flora", "grass")],
        AreaType::Forest => &[("g_offset", "2"), ("g_flora", "forest")],
        AreaType::Mountains => &[
            ("g_builder", "mountain"),
            ("g_offset", "30"),
            ("g_roughness", "0.8"),
        ],
        AreaType::Desert => &[("g_offset", "1"), ("g_flora", "desert")],
        AreaType::Swamp => &[("g_offset", "0"), ("g_flora", "swamp")],
        AreaType::Ocean => &[("g_builder", "ocean"), ("g_offset", "-8")],
        AreaType::Coast => &[("g_builder", "coast"), ("g_offset", "0")],
        AreaType::Island => &[("g_builder", "island"), ("g_offset", "2")],
        AreaType::Village => &[("g_builder", "village")],
        AreaType::Town => &[("g_builder", "town")],
    }
}

/// Offset and roughness overrides for mountain height classes. Applied after
/// the area defaults, still without clobbering explicit values.
pub fn mountain_height_defaults(height: MountainHeight) -> &'static [(&'static str, &'static str)] {
    match height {
        MountainHeight::HighPeaks => &[("g_offset", "45"), ("g_roughness", "0.9")],
        MountainHeight::MediumPeaks => &[("g_offset", "30"), ("g_roughness", "0.8")],
        MountainHeight::LowPeaks => &[("g_offset", "18"), ("g_roughness", "0.6")],
        MountainHeight::Meadow => &[("g_offset", "8"), ("g_roughness", "0.3")],
    }
}

/// Merge a default table into a parameter map without overwriting.
pub fn apply_defaults(params: &mut ParamMap, defaults: &[(&str, &str)]) {
    for (key, value) in defaults {
        params
            .entry((*key).to_string())
            .or_insert_with(|| (*value).to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_do_not_overwrite() {
        let mut params = ParamMap::new();
        params.insert("g_offset".into(), "99".into());
        apply_defaults(&mut params, area_defaults(AreaType::Mountains));

        assert_eq!(params.get("g_offset").map(String::as_str), Some("99"));
        assert_eq!(params.get("g_builder").map(String::as_str), Some("mountain"));
        assert_eq!(params.get("g_roughness").map(String::as_str), Some("0.8"));
    }

    #[test]
    fn test_mountain_height_overrides_stack() {
        let mut params = ParamMap::new();
        apply_defaults(&mut params, mountain_height_defaults(MountainHeight::HighPeaks));
        apply_defaults(&mut params, area_defaults(AreaType::Mountains));

        // Height class was applied first, so its offset wins
        assert_eq!(params.get("g_offset").map(String::as_str), Some("45"));
        assert_eq!(params.get("g_builder").map(String::as_str), Some("mountain"));
    }
}
