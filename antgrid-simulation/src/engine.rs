//! The authoritative game state and every operation that mutates it.
//!
//! `GameEngine` owns the grid, the ant list, the participant registry and the
//! changed-cell set. All operations are synchronous and bounded; callers
//! serialize access (the transport layer holds the engine behind one mutex).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use antgrid_core::{
    Ant, AntId, CellMap, Color, Direction, Grid, Participant, ParticipantId, Position, RuleSet,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{EngineError, RuleError};
use crate::movement::{plan_step, StepPlan};
use crate::rules::{default_rules, has_mandatory_rules, validate_rules, with_mandatory_rules, RawRule};

/// Below this many ants rule evaluation stays on the calling thread.
const PARALLEL_MIN_ANTS: usize = 256;

/// Engine parameters supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub grid_width: u32,
    pub grid_height: u32,
    pub tick_interval: Duration,
    pub max_participants: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 20,
            tick_interval: Duration::from_millis(250),
            max_participants: 10,
        }
    }
}

/// Outcome counters of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Ants that moved and repainted their former cell.
    pub moved: usize,
    /// Ants whose target cell was occupied or already claimed.
    pub blocked: usize,
    /// Ants with no matching rule.
    pub stalled: usize,
}

/// Result of removing a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub participant: Participant,
    pub ant_id: Option<AntId>,
    /// Cells that reverted to WHITE because the participant owned them.
    pub cleared: CellMap,
}

pub struct GameEngine {
    settings: EngineSettings,
    grid: Grid,
    ants: Vec<Ant>,
    participants: HashMap<ParticipantId, Participant>,
    changed: CellMap,
    rng: StdRng,
}

impl GameEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Deterministic color assignment, for tests and replays.
    pub fn with_seed(settings: EngineSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: EngineSettings, rng: StdRng) -> Self {
        Self {
            grid: Grid::new(settings.grid_width, settings.grid_height),
            settings,
            ants: Vec::new(),
            participants: HashMap::new(),
            changed: CellMap::new(),
            rng,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn tick_interval(&self) -> Duration {
        self.settings.tick_interval
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn color_at(&self, pos: Position) -> Color {
        self.grid.color_at(pos)
    }

    pub fn ants(&self) -> &[Ant] {
        &self.ants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Cells changed since the current tick began.
    pub fn changed_cells(&self) -> &CellMap {
        &self.changed
    }

    /// Clears grid, ants and participants; settings are kept.
    pub fn reset(&mut self) {
        self.grid = Grid::new(self.settings.grid_width, self.settings.grid_height);
        self.ants.clear();
        self.participants.clear();
        self.changed.clear();
        info!("Game session reset");
    }

    /// Registers a new participant with a fresh, unused, non-white color.
    pub fn join(&mut self) -> Result<Participant, EngineError> {
        if self.participants.len() >= self.settings.max_participants {
            return Err(EngineError::CapacityReached);
        }

        let participant = Participant {
            id: ParticipantId::random(),
            color: self.unused_color(),
            ant_id: None,
        };
        self.participants.insert(participant.id, participant.clone());
        info!(participant = %participant.id, color = %participant.color, "Participant joined");
        Ok(participant)
    }

    fn unused_color(&mut self) -> Color {
        loop {
            let candidate = Color::from_rgb(self.rng.gen_range(0..=Color::MAX_RGB)).unwrap_or(Color::WHITE);
            if !candidate.is_white() && !self.participants.values().any(|p| p.color == candidate) {
                return candidate;
            }
        }
    }

    /// Removes a participant, its ant and every cell painted in its color.
    pub fn leave(&mut self, id: ParticipantId) -> Result<Departure, EngineError> {
        let participant = self.participants.remove(&id).ok_or(EngineError::ParticipantNotFound)?;

        if let Some(ant_id) = participant.ant_id {
            self.ants.retain(|ant| ant.id != ant_id);
        }

        let cleared = self.grid.clear_color(participant.color);
        self.changed.extend(cleared.iter());

        info!(participant = %id, cleared = cleared.len(), "Participant left");
        Ok(Departure {
            ant_id: participant.ant_id,
            participant,
            cleared,
        })
    }

    /// Places the participant's single ant.
    ///
    /// With no rules (or an empty list) the ant gets the two default rules;
    /// otherwise the supplied rules are validated and any missing mandatory
    /// rule is appended.
    pub fn place_ant(
        &mut self,
        id: ParticipantId,
        position: Position,
        rules: Option<&[RawRule]>,
        direction: Direction,
    ) -> Result<Ant, EngineError> {
        let participant = self.participants.get(&id).ok_or(EngineError::ParticipantNotFound)?;
        if participant.ant_id.is_some() {
            return Err(EngineError::AlreadyHasAnt);
        }
        if !self.grid.contains(position) {
            return Err(EngineError::OutOfBounds);
        }
        if self.ants.iter().any(|ant| ant.position == position) {
            return Err(EngineError::PositionOccupied);
        }

        let color = participant.color;
        let rules = match rules {
            Some(raw) if !raw.is_empty() => with_mandatory_rules(validate_rules(raw)?, color),
            _ => default_rules(color),
        };

        let ant = Ant {
            id: AntId::random(),
            position,
            direction,
            color,
            rules,
        };
        self.ants.push(ant.clone());
        if let Some(participant) = self.participants.get_mut(&id) {
            participant.ant_id = Some(ant.id);
        }

        info!(participant = %id, ant = %ant.id, x = position.x, y = position.y, "Ant placed");
        Ok(ant)
    }

    /// Changes the rules of the participant's ant and returns the new list.
    ///
    /// A set covering both mandatory rules replaces the list outright. Any
    /// other set is appended; a supplied rule whose trigger color the ant
    /// already handles is skipped, so existing rules (mandatory ones
    /// included) stay as they are.
    pub fn update_rules(&mut self, id: ParticipantId, rules: &[RawRule]) -> Result<RuleSet, EngineError> {
        let participant = self.participants.get(&id).ok_or(EngineError::ParticipantNotFound)?;
        let ant_id = participant.ant_id.ok_or(EngineError::NoAnt)?;
        if rules.is_empty() {
            return Err(RuleError::Empty.into());
        }
        let supplied = validate_rules(rules)?;

        let ant = self
            .ants
            .iter_mut()
            .find(|ant| ant.id == ant_id)
            .ok_or(EngineError::NoAnt)?;

        if has_mandatory_rules(&supplied, ant.color) {
            ant.rules = supplied;
        } else {
            for rule in supplied {
                if ant.rule_for(rule.cell_color).is_none() {
                    ant.rules.push(rule);
                }
            }
        }

        debug!(participant = %id, rules = ant.rules.len(), "Rules updated");
        Ok(ant.rules.clone())
    }

    /// Paints a blank cell in the participant's color or erases the
    /// participant's own paint. Returns the changed cell.
    pub fn flip_tile(&mut self, id: ParticipantId, position: Position) -> Result<CellMap, EngineError> {
        let own = self.participants.get(&id).ok_or(EngineError::ParticipantNotFound)?.color;
        if !self.grid.contains(position) {
            return Err(EngineError::OutOfBounds);
        }

        let current = self.grid.color_at(position);
        let next = if current.is_white() {
            own
        } else if current == own {
            Color::WHITE
        } else {
            return Err(EngineError::NotOwner);
        };

        self.grid.paint(position, next);
        self.changed.insert(position, next);

        let mut flipped = CellMap::new();
        flipped.insert(position, next);
        Ok(flipped)
    }

    /// Resizes the grid (dropping all paint) and optionally changes the tick
    /// period. Only allowed while no ant exists.
    pub fn update_config(
        &mut self,
        width: i64,
        height: i64,
        tick_interval: Option<Duration>,
    ) -> Result<(), EngineError> {
        if !self.ants.is_empty() {
            return Err(EngineError::GameStarted);
        }

        let dimension = |value: i64| {
            u32::try_from(value)
                .ok()
                .filter(|v| *v > 0 && i32::try_from(*v).is_ok())
        };
        let (Some(grid_width), Some(grid_height)) = (dimension(width), dimension(height)) else {
            return Err(EngineError::InvalidDimensions { width, height });
        };
        if tick_interval == Some(Duration::ZERO) {
            return Err(EngineError::InvalidTickInterval);
        }

        self.grid.resize(grid_width, grid_height);
        self.changed.clear();
        self.settings.grid_width = grid_width;
        self.settings.grid_height = grid_height;
        if let Some(interval) = tick_interval {
            self.settings.tick_interval = interval;
        }

        info!(
            width = grid_width,
            height = grid_height,
            tick_interval_ms = u64::try_from(self.settings.tick_interval.as_millis()).unwrap_or(u64::MAX),
            "Game configuration updated"
        );
        Ok(())
    }

    /// Advances every ant by one step.
    ///
    /// Rules are evaluated against the pre-tick grid, in parallel for large
    /// ant counts. Moves are then applied in ant order: a target that was
    /// occupied before the tick, or already claimed by an earlier ant this
    /// tick, blocks the move unless it is the ant's own cell, and a blocked ant keeps its position and
    /// direction without repainting.
    pub fn tick(&mut self) -> TickSummary {
        self.changed.clear();

        let grid = &self.grid;
        let plans: Vec<Option<StepPlan>> = self
            .ants
            .par_iter()
            .with_min_len(PARALLEL_MIN_ANTS)
            .map(|ant| plan_step(ant, grid))
            .collect();

        let mut occupied: HashSet<Position> = self.ants.iter().map(|ant| ant.position).collect();
        let mut summary = TickSummary::default();

        for (ant, plan) in self.ants.iter_mut().zip(plans) {
            let Some(plan) = plan else {
                summary.stalled += 1;
                continue;
            };
            // On a one-cell-wide axis the target wraps onto the ant's own cell.
            if plan.target != ant.position && !occupied.insert(plan.target) {
                summary.blocked += 1;
                continue;
            }

            self.grid.paint(ant.position, plan.repaint);
            self.changed.insert(ant.position, plan.repaint);
            ant.position = plan.target;
            ant.direction = plan.direction;
            summary.moved += 1;
        }

        summary
    }
}
