//! Village and town templates
//!
//! A template fixes the hex footprint of a settlement and the coarse layout
//! rules inside each cell. Templates normally come from external storage;
//! the engine only sees the `TemplateProvider` capability, with a built-in
//! provider covering the three stock layouts.

use crate::hex::Hex;

/// Role a footprint cell plays in the settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellRole {
    /// Building plots around a central plaza.
    Plaza,
    /// Building plots only.
    Dwellings,
}

/// One cell of a template footprint, positioned relative to the anchor.
#[derive(Clone, Copy, Debug)]
pub struct FootprintCell {
    pub offset: Hex,
    pub role: CellRole,
}

/// A named settlement template.
#[derive(Clone, Debug)]
pub struct VillageTemplate {
    pub name: &'static str,
    /// Builder the cells are tagged with: "village" or "town".
    pub builder: &'static str,
    pub footprint: Vec<FootprintCell>,
    /// Building plots per axis inside one cell.
    pub plots_per_axis: i32,
}

/// Capability handed in by the caller; the engine holds no global registry.
pub trait TemplateProvider {
    fn template(&self, name: &str) -> Option<&VillageTemplate>;
}

/// The stock templates: a one-cell hamlet, a two-cell village and a
/// five-cell cross-shaped town.
pub struct BuiltinTemplates {
    templates: Vec<VillageTemplate>,
}

impl Default for BuiltinTemplates {
    fn default() -> Self {
        let templates = vec![
            VillageTemplate {
                name: "hamlet",
                builder: "village",
                footprint: vec![FootprintCell {
                    offset: Hex::new(0, 0),
                    role: CellRole::Dwellings,
                }],
                plots_per_axis: 3,
            },
            VillageTemplate {
                name: "village",
                builder: "village",
                footprint: vec![
                    FootprintCell {
                        offset: Hex::new(0, 0),
                        role: CellRole::Plaza,
                    },
                    FootprintCell {
                        offset: Hex::new(1, 0),
                        role: CellRole::Dwellings,
                    },
                ],
                plots_per_axis: 4,
            },
            VillageTemplate {
                name: "town",
                builder: "town",
                footprint: vec![
                    FootprintCell {
                        offset: Hex::new(0, 0),
                        role: CellRole::Plaza,
                    },
                    FootprintCell {
                        offset: Hex::new(1, 0),
                        role: CellRole::Dwellings,
                    },
                    FootprintCell {
                        offset: Hex::new(-1, 0),
                        role: CellRole::Dwellings,
                    },
                    FootprintCell {
                        offset: Hex::new(0, 1),
                        role: CellRole::Dwellings,
                    },
                    FootprintCell {
                        offset: Hex::new(0, -1),
                        role: CellRole::Dwellings,
                    },
                ],
                plots_per_axis: 4,
            },
        ];
        Self { templates }
    }
}

impl TemplateProvider for BuiltinTemplates {
    fn template(&self, name: &str) -> Option<&VillageTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_resolve() {
        let provider = BuiltinTemplates::default();
        assert_eq!(provider.template("hamlet").unwrap().footprint.len(), 1);
        assert_eq!(provider.template("village").unwrap().footprint.len(), 2);
        assert_eq!(provider.template("town").unwrap().footprint.len(), 5);
        assert!(provider.template("citadel").is_none());
    }

    #[test]
    fn test_town_footprint_is_connected() {
        let provider = BuiltinTemplates::default();
        let town = provider.template("town").unwrap();
        let center = town.footprint[0].offset;
        for cell in &town.footprint[1..] {
            assert_eq!(center.distance(cell.offset), 1);
        }
    }
}
