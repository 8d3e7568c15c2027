//! Per-ant step planning on the toroidal grid.

use antgrid_core::{Ant, Color, Direction, Grid, Position};

/// Where an ant wants to go this tick, computed from pre-tick state only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub target: Position,
    pub direction: Direction,
    /// Color left behind on the vacated cell if the move goes through.
    pub repaint: Color,
}

fn wrap(value: i32, delta: i32, extent: u32) -> i32 {
    let wrapped = (i64::from(value) + i64::from(delta)).rem_euclid(i64::from(extent.max(1)));
    // extent never exceeds i32::MAX, so the remainder fits
    wrapped as i32
}

/// One step from `pos` along `direction`, wrapping at the grid edges.
pub fn wrap_step(pos: Position, direction: Direction, width: u32, height: u32) -> Position {
    let (dx, dy) = direction.offset();
    Position::new(wrap(pos.x, dx, width), wrap(pos.y, dy, height))
}

/// Evaluates `ant`'s rules against the cell it stands on.
///
/// Any cell not painted in the ant's own color reads as WHITE, and the
/// vacated cell flips to the other color of that pair. The ant advances along
/// the direction it faced at the start of the tick and then adopts the turned
/// direction. Returns `None` when no rule matches, which leaves the ant
/// untouched for this tick.
pub fn plan_step(ant: &Ant, grid: &Grid) -> Option<StepPlan> {
    let (trigger, repaint) = if grid.color_at(ant.position) == ant.color {
        (ant.color, Color::WHITE)
    } else {
        (Color::WHITE, ant.color)
    };

    let rule = ant.rule_for(trigger)?;
    Some(StepPlan {
        target: wrap_step(ant.position, ant.direction, grid.width(), grid.height()),
        direction: ant.direction.turn(rule.turn_direction),
        repaint,
    })
}
