//! Composition orchestration
//!
//! Wires the pipeline stages in order, collects per-stage warnings, and
//! short-circuits on fatal errors. One call transforms one composition into
//! one `CompositionResult`; the engine holds no process-wide state, so
//! callers may run compositions concurrently, each owning its own graph.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::assemble::{self, AssembledPlan};
use crate::biome_placement::{self, BiomePlacementResult};
use crate::composition::Composition;
use crate::error::ComposeError;
use crate::flows::{self, FlowComposeResult};
use crate::gap_fill::{self, HexGridFillResult};
use crate::grid::CellPlanSink;
use crate::points::{self, PointPlacementResult};
use crate::seeds::CompositionSeeds;
use crate::structures::templates::TemplateProvider;
use crate::structures::{self, StructureDesignResult};

/// Cooperative cancellation flag, checked at stage boundaries. Stages are
/// monolithic transforms, so mid-stage cancellation is not supported.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run configuration for one composition.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Overrides the composition's own seed when set.
    pub seed: Option<u64>,
    pub fill_gaps: bool,
    pub ocean_border_rings: u32,
    /// Hand the finished plan to the persistence sink.
    pub generate_cell_plans: bool,
    pub cancel: CancelToken,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            fill_gaps: true,
            ocean_border_rings: 2,
            generate_cell_plans: true,
            cancel: CancelToken::new(),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Default, PartialEq)]
pub struct CompositionResult {
    pub success: bool,
    pub error_message: Option<String>,
    /// Per-stage warnings, in pipeline order.
    pub warnings: Vec<String>,
    pub seed: u64,
    pub total_biomes: usize,
    /// Cells in the final plan.
    pub total_grids: usize,
    /// Cells added by the gap fillers.
    pub filled_grids: usize,
    pub total_flows: usize,
    pub total_segments: usize,
    pub placement: Option<BiomePlacementResult>,
    pub fill: Option<HexGridFillResult>,
    pub point_placement: Option<PointPlacementResult>,
    pub flow: Option<FlowComposeResult>,
    pub structures: Option<StructureDesignResult>,
    pub plan: Option<AssembledPlan>,
}

impl CompositionResult {
    fn fatal(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Run the full pipeline over a composition.
///
/// The composition is mutated in place: features move through their
/// lifecycle statuses and placed coordinates are written back. When
/// `generate_cell_plans` is set and a sink is given, the finished plan is
/// handed over; on any fatal error nothing is published.
pub fn compose_world(
    composition: &mut Composition,
    config: &RunConfig,
    templates: &dyn TemplateProvider,
    mut sink: Option<&mut dyn CellPlanSink>,
) -> CompositionResult {
    let Some(world_id) = composition.world_id.clone().filter(|id| !id.is_empty()) else {
        return CompositionResult::fatal(ComposeError::MissingWorldId.to_string());
    };

    let master = config.seed.or(composition.seed).unwrap_or(0);
    let seeds = CompositionSeeds::from_master(master);
    info!(
        "composing world '{}' ({} features, seed {})",
        world_id,
        composition.features.len(),
        master
    );

    let mut result = CompositionResult {
        success: true,
        seed: master,
        ..Default::default()
    };

    // Preparation failures are fatal
    if let Err(errors) = crate::prepare::prepare(composition) {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return CompositionResult::fatal(message);
    }
    if cancelled(config, &mut result) {
        return result;
    }

    // Biome placement; failed features degrade to warnings
    let placement = biome_placement::compose_biomes(composition, seeds.biomes);
    result
        .warnings
        .extend(placement.errors.iter().map(ToString::to_string));
    result.total_biomes = placement.placed.len();
    if cancelled(config, &mut result) {
        result.placement = Some(placement);
        return result;
    }

    // Gap filling
    let fill = if config.fill_gaps {
        gap_fill::fill(&placement, composition, config.ocean_border_rings)
    } else {
        let mut bare = HexGridFillResult::default();
        for biome in &placement.placed {
            let mut parameters = biome.parameters.clone();
            parameters
                .entry("biome".into())
                .or_insert_with(|| biome.area_type.display_name().to_string());
            for cell in &biome.coordinates {
                bare.grid.insert(
                    *cell,
                    crate::grid::FilledCell {
                        kind: crate::grid::CellKind::Biome {
                            feature_id: biome.feature_id.clone(),
                        },
                        parameters: parameters.clone(),
                    },
                );
            }
        }
        bare
    };
    result.filled_grids = fill.filled_cells();
    if cancelled(config, &mut result) {
        result.placement = Some(placement);
        result.fill = Some(fill);
        return result;
    }

    // Point snapping
    let point_placement = points::compose_points(composition, &placement, seeds.points);
    result
        .warnings
        .extend(point_placement.errors.iter().map(ToString::to_string));
    if cancelled(config, &mut result) {
        result.placement = Some(placement);
        result.fill = Some(fill);
        result.point_placement = Some(point_placement);
        return result;
    }

    // Flow routing; a forced flow failure is fatal
    let flow = flows::compose_flows(composition, &placement, &fill, seeds.flows);
    result.warnings.extend(flow.warnings.iter().cloned());
    result
        .warnings
        .extend(flow.errors.iter().map(ToString::to_string));
    result.total_flows = flow.composed;
    result.total_segments = flow.total_segments;
    if !flow.success {
        warn!("forced flow failed, aborting composition");
        result.success = false;
        result.error_message = Some(
            flow.errors
                .first()
                .map(ToString::to_string)
                .unwrap_or_else(|| "forced flow failed".into()),
        );
        result.placement = Some(placement);
        result.fill = Some(fill);
        result.point_placement = Some(point_placement);
        result.flow = Some(flow);
        return result;
    }
    if cancelled(config, &mut result) {
        result.placement = Some(placement);
        result.fill = Some(fill);
        result.point_placement = Some(point_placement);
        result.flow = Some(flow);
        return result;
    }

    // Structure design; unknown templates are fatal
    let structure_result =
        structures::compose_structures(composition, &placement, templates, seeds.structures);
    result
        .warnings
        .extend(structure_result.errors.iter().map(ToString::to_string));
    if !structure_result.success {
        result.success = false;
        result.error_message = Some(
            structure_result
                .errors
                .first()
                .map(ToString::to_string)
                .unwrap_or_else(|| "structure design failed".into()),
        );
        result.placement = Some(placement);
        result.fill = Some(fill);
        result.point_placement = Some(point_placement);
        result.flow = Some(flow);
        result.structures = Some(structure_result);
        return result;
    }

    // Final assembly
    let plan = assemble::assemble(&fill, &flow, &structure_result);
    result.total_grids = plan.cells.len();

    if config.generate_cell_plans {
        if let Some(sink) = sink.as_deref_mut() {
            let records = plan.to_cell_plans(&world_id);
            if let Err(err) = sink.store(&records) {
                result
                    .warnings
                    .push(format!("cell plan sink failed: {err}"));
            }
        }
    }

    info!(
        "composed '{}': {} biomes, {} cells, {} flows",
        world_id, result.total_biomes, plan.cells.len(), result.total_flows
    );

    result.placement = Some(placement);
    result.fill = Some(fill);
    result.point_placement = Some(point_placement);
    result.flow = Some(flow);
    result.structures = Some(structure_result);
    result.plan = Some(plan);
    result
}

fn cancelled(config: &RunConfig, result: &mut CompositionResult) -> bool {
    if config.cancel.is_cancelled() {
        result.success = false;
        result.error_message = Some("composition cancelled".into());
        true
    } else {
        false
    }
}
