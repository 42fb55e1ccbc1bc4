use super::cancel::CancellationToken;
use super::config::SamplerConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::grid::Grid;
use crate::core::grid::islands::label_components;
use crate::core::models::atom::Atom;
use crate::core::models::channel::Channel;
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::{farthest_from, random_rotations};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Number of heavy atoms a charged probe's apolar body is balanced against.
const CHARGED_BALANCE_ATOMS: usize = 6;

/// A placed copy of a probe that scored above the retention threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledProbe {
    pub molecule: Molecule,
    /// Index of the anchor atom within `molecule`.
    pub anchor: usize,
    pub score: f64,
}

impl SampledProbe {
    pub fn anchor_position(&self) -> Option<Point3<f64>> {
        self.molecule.atom(self.anchor).map(|a| a.position)
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        self.molecule.centroid()
    }
}

/// Output of sampling one probe against the weighted maps.
#[derive(Debug, Clone)]
pub struct SamplingOutcome {
    pub channel: Channel,
    /// Best pose score observed at each cell touched by an active atom.
    pub grid: Grid,
    /// Retained poses, best first.
    pub probes: Vec<SampledProbe>,
}

/// A retained pose before its molecule is materialised.
#[derive(Debug, Clone, Copy)]
struct RankedPose {
    score: f64,
    rotation: usize,
    translation: usize,
}

impl PartialEq for RankedPose {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for RankedPose {}

impl PartialOrd for RankedPose {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Better poses order first: higher score, then earlier discovery. The heap top is therefore
// the worst retained pose.
impl Ord for RankedPose {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.rotation.cmp(&other.rotation))
            .then(self.translation.cmp(&other.translation))
    }
}

/// Poses and output values gathered by one batch of rotations.
struct BatchResult {
    grid: Grid,
    poses: BinaryHeap<RankedPose>,
}

impl BatchResult {
    fn empty(template: &Grid) -> BatchResult {
        BatchResult {
            grid: template.copy_and_clear(),
            poses: BinaryHeap::new(),
        }
    }

    fn merge(mut self, other: BatchResult, max_poses: usize) -> BatchResult {
        self.grid
            .values_mut()
            .zip_mut_with(other.grid.values(), |a, &b| *a = a.max(b));
        for pose in other.poses {
            push_bounded(&mut self.poses, pose, max_poses);
        }
        self
    }
}

fn push_bounded(heap: &mut BinaryHeap<RankedPose>, pose: RankedPose, max_poses: usize) {
    if heap.len() < max_poses {
        heap.push(pose);
    } else if heap.peek().is_some_and(|worst| pose < *worst) {
        heap.pop();
        heap.push(pose);
    }
}

/// Atoms of the probe scored against one weighted map.
struct ScoringChannel<'a> {
    channel: Channel,
    grid: &'a Grid,
    atoms: Vec<usize>,
    repeats: usize,
}

/// Everything fixed for the duration of one probe's sampling run.
struct SamplingPlan<'a> {
    base: Molecule,
    centroid: Point3<f64>,
    anchor: usize,
    targets: Vec<Point3<f64>>,
    scoring: Vec<ScoringChannel<'a>>,
    output_atoms: Vec<usize>,
    rotations: Vec<UnitQuaternion<f64>>,
}

/// Monte-Carlo rigid-body sampling of probes over weighted propensity maps.
///
/// For every random orientation of the probe, its anchor atom is placed on each translation
/// target and the pose is scored by the geometric mean of the weighted map values under the
/// probe's atoms. Each channel's output cell keeps the best score of any pose that put an
/// active atom there.
pub struct ProbeSampler<'a> {
    grids: &'a BTreeMap<Channel, Grid>,
    config: &'a SamplerConfig,
}

impl<'a> ProbeSampler<'a> {
    pub fn new(grids: &'a BTreeMap<Channel, Grid>, config: &'a SamplerConfig) -> Self {
        Self { grids, config }
    }

    #[instrument(skip_all, name = "probe_sampling", fields(channel = %channel, probe = probe.name()))]
    pub fn sample(
        &self,
        probe: &Molecule,
        channel: Channel,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<SamplingOutcome, EngineError> {
        let cancel = match self.config.deadline {
            Some(deadline) => cancel.with_deadline(deadline),
            None => cancel.clone(),
        };
        let template = self
            .grids
            .get(&channel)
            .ok_or(EngineError::MissingChannel(channel))?
            .copy_and_clear();
        let plan = self.plan(probe, channel)?;

        info!(
            rotations = plan.rotations.len(),
            targets = plan.targets.len(),
            "Sampling probe."
        );
        if plan.output_atoms.is_empty() {
            debug!("Probe has no atoms contributing to this channel's output map.");
        }

        let batches: Vec<(usize, &[UnitQuaternion<f64>])> = plan
            .rotations
            .chunks(self.config.batch_size)
            .enumerate()
            .map(|(n, chunk)| (n * self.config.batch_size, chunk))
            .collect();
        reporter.report(Progress::TaskStart {
            total_steps: batches.len() as u64,
        });

        // Each worker folds its batches into one accumulator; accumulators are max-reduced.
        let empty = || BatchResult::empty(&template);
        let accumulate =
            |batch: BatchResult, &(first, rotations): &(usize, &[UnitQuaternion<f64>])| {
                let result = self.run_batch(&plan, batch, first, rotations, &cancel);
                reporter.report(Progress::TaskIncrement);
                result
            };

        #[cfg(not(feature = "parallel"))]
        let merged = batches.iter().try_fold(empty(), accumulate);

        #[cfg(feature = "parallel")]
        let merged = batches
            .par_iter()
            .try_fold(empty, accumulate)
            .try_reduce(empty, |a, b| Ok(a.merge(b, self.config.max_poses)));

        reporter.report(Progress::TaskFinish);
        let merged = merged?;

        let probes: Vec<SampledProbe> = merged
            .poses
            .into_sorted_vec()
            .into_iter()
            .map(|pose| self.materialise(&plan, pose))
            .collect();
        info!(
            retained = probes.len(),
            best = probes.first().map_or(0.0, |p| p.score),
            "Sampling finished."
        );
        Ok(SamplingOutcome {
            channel,
            grid: merged.grid,
            probes,
        })
    }

    fn plan(&self, probe: &Molecule, channel: Channel) -> Result<SamplingPlan<'a>, EngineError> {
        let base = probe.without_hydrogens();
        let centroid = base.centroid().ok_or_else(|| EngineError::PhaseFailed {
            phase: "sampling",
            reason: format!("probe '{}' has no heavy atoms", probe.name()),
        })?;
        let anchor = select_anchor(&base, &centroid)
            .ok_or_else(|| EngineError::Internal("anchor selection on an empty probe".into()))?;
        let anchor_channel = Channel::of_atom(&base.atoms()[anchor]);
        let translation_grid = self
            .grids
            .get(&anchor_channel)
            .ok_or(EngineError::MissingChannel(anchor_channel))?;
        let threshold = self
            .config
            .translation_threshold(anchor_channel == Channel::Apolar);
        let targets: Vec<Point3<f64>> = label_components(translation_grid, threshold)
            .into_iter()
            .flat_map(|component| component.cells)
            .map(|cell| translation_grid.indices_to_point(cell))
            .collect();
        if targets.is_empty() {
            warn!(
                anchor_channel = %anchor_channel,
                threshold, "No translation targets above threshold; the output map stays empty."
            );
        }

        let repeats = if channel.is_charged() {
            match base.carbon_count() {
                0 => 1,
                carbons => (CHARGED_BALANCE_ATOMS / carbons).max(1),
            }
        } else {
            1
        };
        let grids: &'a BTreeMap<Channel, Grid> = self.grids;
        let scoring: Vec<ScoringChannel<'a>> = grids
            .iter()
            .filter_map(|(&ch, grid)| {
                let atoms = matching_atoms(base.atoms(), ch);
                (!atoms.is_empty()).then_some(ScoringChannel {
                    channel: ch,
                    grid,
                    atoms,
                    repeats: if ch == Channel::Apolar { repeats } else { 1 },
                })
            })
            .collect();
        for entry in &scoring {
            debug!(
                channel = %entry.channel,
                atoms = entry.atoms.len(),
                repeats = entry.repeats,
                "Probe atoms scored against channel."
            );
        }

        let carries_polar = base.atoms().iter().any(Atom::is_polar);
        let output_atoms = if channel == Channel::Apolar
            && carries_polar
            && !self.config.polar_contributions
        {
            Vec::new()
        } else {
            matching_atoms(base.atoms(), channel)
        };

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let rotations = random_rotations(self.config.rotations, &mut rng);

        Ok(SamplingPlan {
            base,
            centroid,
            anchor,
            targets,
            scoring,
            output_atoms,
            rotations,
        })
    }

    fn run_batch(
        &self,
        plan: &SamplingPlan,
        mut batch: BatchResult,
        first_rotation: usize,
        rotations: &[UnitQuaternion<f64>],
        cancel: &CancellationToken,
    ) -> Result<BatchResult, EngineError> {
        for (offset, rotation) in rotations.iter().enumerate() {
            cancel.check()?;
            let rotation_index = first_rotation + offset;
            let rotated = rotated_positions(&plan.base, &plan.centroid, rotation);
            let anchor = rotated[plan.anchor];

            for (translation_index, target) in plan.targets.iter().enumerate() {
                let shift = *target - anchor;
                let score = score_pose(plan, &rotated, &shift);
                if score < self.config.min_score {
                    continue;
                }
                if score > self.config.retain_score {
                    push_bounded(
                        &mut batch.poses,
                        RankedPose {
                            score,
                            rotation: rotation_index,
                            translation: translation_index,
                        },
                        self.config.max_poses,
                    );
                }
                for &atom in &plan.output_atoms {
                    if let Some(cell) = batch.grid.indices_of(&(rotated[atom] + shift)) {
                        let current = batch.grid.values()[cell];
                        if score > current {
                            batch.grid.set_value(cell, score);
                        }
                    }
                }
            }
        }
        Ok(batch)
    }

    fn materialise(&self, plan: &SamplingPlan, pose: RankedPose) -> SampledProbe {
        let mut molecule = plan.base.clone();
        let rotation = &plan.rotations[pose.rotation];
        molecule.rotate_about(&plan.centroid, rotation);
        let anchor = molecule.atoms()[plan.anchor].position;
        let shift: Vector3<f64> = plan.targets[pose.translation] - anchor;
        molecule.translate(&shift);
        SampledProbe {
            molecule,
            anchor: plan.anchor,
            score: pose.score,
        }
    }
}

/// The polar atom farthest from `centroid`, or the farthest atom when none is polar.
fn select_anchor(molecule: &Molecule, centroid: &Point3<f64>) -> Option<usize> {
    let atoms = molecule.atoms();
    let polar = atoms
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_polar())
        .map(|(n, a)| (n, &a.position));
    farthest_from(centroid, polar).or_else(|| {
        farthest_from(
            centroid,
            atoms.iter().enumerate().map(|(n, a)| (n, &a.position)),
        )
    })
}

fn matching_atoms(atoms: &[Atom], channel: Channel) -> Vec<usize> {
    atoms
        .iter()
        .enumerate()
        .filter(|(_, a)| channel.matches(a))
        .map(|(n, _)| n)
        .collect()
}

fn rotated_positions(
    molecule: &Molecule,
    centroid: &Point3<f64>,
    rotation: &UnitQuaternion<f64>,
) -> Vec<Point3<f64>> {
    molecule
        .atoms()
        .iter()
        .map(|a| centroid + rotation * (a.position - centroid))
        .collect()
}

/// Geometric mean of the map values under every scored atom, computed in log space.
///
/// Any non-positive value (including atoms off the map) makes the pose worthless.
fn score_pose(plan: &SamplingPlan, rotated: &[Point3<f64>], shift: &Vector3<f64>) -> f64 {
    let mut log_sum = 0.0;
    let mut count = 0usize;
    for scoring in &plan.scoring {
        for &atom in &scoring.atoms {
            let value = scoring.grid.value_at_point(&(rotated[atom] + *shift));
            if value <= 0.0 {
                return 0.0;
            }
            log_sum += value.ln() * scoring.repeats as f64;
            count += scoring.repeats;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (log_sum / count as f64).exp()
}

/// Samples every channel's probe from `probes` and collects the output maps.
///
/// Probes are taken in channel order; a channel without a weighted map is skipped with a
/// warning.
pub fn sample_channels(
    grids: &BTreeMap<Channel, Grid>,
    probes: &[(Channel, &Molecule)],
    config: &SamplerConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<BTreeMap<Channel, SamplingOutcome>, EngineError> {
    let sampler = ProbeSampler::new(grids, config);
    let mut outcomes = BTreeMap::new();
    for &(channel, probe) in probes {
        if !grids.contains_key(&channel) {
            warn!(channel = %channel, "No weighted map for channel; skipping its probe.");
            continue;
        }
        let outcome = sampler.sample(probe, channel, reporter, cancel)?;
        debug!(
            channel = %channel,
            scored_cells = outcome.grid.count_above(0.0),
            "Channel sampled."
        );
        outcomes.insert(channel, outcome);
    }
    Ok(outcomes)
}
