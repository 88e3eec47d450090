//! Path replay: turns an authority-issued outcome into animation frames.
//!
//! The renderer is a plain state object. Something outside calls
//! [`PathRenderer::tick`] once per frame with the time since the previous
//! tick; the renderer answers with the next [`Frame`] to draw. It never sees
//! round phases or balances, so nothing it does can change an outcome.

use std::f64::consts::TAU;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::curves::{pump_curve, Scrambler};
use crate::formulas::{wheel_index, WHEEL_ORDER};
use crate::games::{GameKind, PLINKO_BUCKETS};
use crate::outcome::{OutcomePath, PathStep, Settlement, Verdict};

/// Share of the remaining distance covered per descent tick.
pub const EASE_FACTOR: f64 = 0.3;
/// Vertical distance at which a descent step counts as arrived.
pub const ARRIVAL_TOLERANCE: f64 = 1.0;
/// Linear ticks used to glide from the last peg row into the bucket.
pub const BUCKET_GLIDE_STEPS: usize = 20;

pub const CELL_STEP: Duration = Duration::from_millis(120);
pub const CRASH_TICK: Duration = Duration::from_millis(30);
pub const PUMP_TICK: Duration = Duration::from_millis(100);

pub const SPIN_DURATION: Duration = Duration::from_millis(3000);
pub const FULL_ROTATIONS: f64 = 5.0;
pub const DICE_SLIDE: Duration = Duration::from_millis(500);
pub const LIMBO_COUNT: Duration = Duration::from_millis(1000);
pub const CARD_FLIP: Duration = Duration::from_millis(400);

pub const SCRAMBLE_TICK: Duration = Duration::from_millis(50);
pub const DICE_SCRAMBLE_FRAMES: usize = 30;
pub const LIMBO_SCRAMBLE_FRAMES: usize = 20;

/// Where the dice marker rests before a roll.
const DICE_REST: f64 = 50.0;

/// `1 - (1 - p)^3`, clamped to `[0, 1]`.
pub fn ease_out_cubic(progress: f64) -> f64 {
    let p = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powi(3)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn lerp(self, to: Point, t: f64) -> Point {
        Point::new(self.x + (to.x - self.x) * t, self.y + (to.y - self.y) * t)
    }
}

/// Plinko board layout in canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardGeometry {
    pub width: f64,
    pub height: f64,
    pub start_y: f64,
    pub row_spacing: f64,
    pub buckets: usize,
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 700.0,
            start_y: 40.0,
            row_spacing: 35.0,
            buckets: PLINKO_BUCKETS,
        }
    }
}

impl BoardGeometry {
    pub fn drop_point(&self) -> Point {
        Point::new(self.width / 2.0, self.start_y)
    }

    /// Ball target after bouncing through `row` into `column`.
    /// Row `n` holds `n + 3` pegs.
    pub fn peg_target(&self, row: usize, column: u8) -> Point {
        let pegs = row + 3;
        let spacing = self.width / (pegs as f64 + 1.0);
        let x = spacing * (f64::from(column) + 1.5 - (pegs / 2) as f64);
        Point::new(x, self.start_y + row as f64 * self.row_spacing)
    }

    pub fn bucket_target(&self, column: u8) -> Point {
        let bucket_width = self.width / self.buckets as f64;
        Point::new((f64::from(column) + 0.5) * bucket_width, self.height - 60.0)
    }
}

/// A fully determined animation, ready to be started.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayPlan {
    /// Eased moves through `targets`, then an optional linear glide.
    Descent {
        start: Point,
        targets: Vec<Point>,
        landing: Option<Point>,
    },
    /// One grid cell uncovered per `interval`.
    Cells { cells: Vec<u8>, interval: Duration },
    /// One curve sample per `interval`, stopping early at `stop_at`.
    Curve {
        samples: Vec<f64>,
        interval: Duration,
        stop_at: Option<f64>,
    },
    /// Eased interpolation from `from` to `to`.
    Transform { from: f64, to: f64, duration: Duration },
    /// Throwaway values while the real result is pending.
    Scramble {
        frames: usize,
        interval: Duration,
        seed: u64,
    },
}

impl ReplayPlan {
    pub fn plinko(path: &OutcomePath, geometry: &BoardGeometry) -> Self {
        let columns: Vec<u8> = path
            .steps()
            .iter()
            .filter_map(|step| match step {
                PathStep::Peg(column) => Some(*column),
                _ => None,
            })
            .collect();
        let targets = columns
            .iter()
            .enumerate()
            .map(|(row, column)| geometry.peg_target(row, *column))
            .collect();
        ReplayPlan::Descent {
            start: geometry.drop_point(),
            targets,
            landing: columns.last().map(|column| geometry.bucket_target(*column)),
        }
    }

    pub fn cells(cells: Vec<u8>) -> Self {
        ReplayPlan::Cells {
            cells,
            interval: CELL_STEP,
        }
    }

    pub fn crash(path: &OutcomePath, stop_at: Option<f64>) -> Self {
        let samples = path
            .steps()
            .iter()
            .filter_map(|step| match step {
                PathStep::Sample(value) => Some(*value),
                _ => None,
            })
            .collect();
        ReplayPlan::Curve {
            samples,
            interval: CRASH_TICK,
            stop_at,
        }
    }

    /// Live pump curve up to the authority's pop point.
    pub fn pump(cap: f64, seed: u64) -> Self {
        ReplayPlan::Curve {
            samples: pump_curve(cap, seed),
            interval: PUMP_TICK,
            stop_at: None,
        }
    }

    /// Wheel rotation in radians landing `number` under the pointer after
    /// five full turns.
    pub fn wheel(number: u8) -> Self {
        let segment = TAU / WHEEL_ORDER.len() as f64;
        let index = wheel_index(number).unwrap_or(0);
        ReplayPlan::Transform {
            from: 0.0,
            to: FULL_ROTATIONS * TAU + index as f64 * segment,
            duration: SPIN_DURATION,
        }
    }

    pub fn dice_roll(roll: f64) -> Self {
        ReplayPlan::Transform {
            from: DICE_REST,
            to: roll,
            duration: DICE_SLIDE,
        }
    }

    pub fn limbo_count(result: f64) -> Self {
        ReplayPlan::Transform {
            from: 1.0,
            to: result,
            duration: LIMBO_COUNT,
        }
    }

    pub fn card_flip() -> Self {
        ReplayPlan::Transform {
            from: 0.0,
            to: 1.0,
            duration: CARD_FLIP,
        }
    }

    /// Filler shown while a single-shot game waits on the authority.
    pub fn scramble(game: GameKind, seed: u64) -> Option<Self> {
        let frames = match game {
            GameKind::Dice => DICE_SCRAMBLE_FRAMES,
            GameKind::Limbo => LIMBO_SCRAMBLE_FRAMES,
            _ => return None,
        };
        Some(ReplayPlan::Scramble {
            frames,
            interval: SCRAMBLE_TICK,
            seed,
        })
    }

    /// Replay for a settled round, built from its path alone.
    ///
    /// Pump has none: its curve plays live while the round is active.
    pub fn for_settlement(game: GameKind, settlement: &Settlement) -> Option<Self> {
        let path = &settlement.path;
        match game {
            GameKind::Plinko => Some(Self::plinko(path, &BoardGeometry::default())),
            GameKind::Mines | GameKind::Chicken => {
                let cells: Vec<u8> = path
                    .steps()
                    .iter()
                    .filter_map(|step| match step {
                        PathStep::Cell(cell) => Some(*cell),
                        _ => None,
                    })
                    .collect();
                (!cells.is_empty()).then(|| Self::cells(cells))
            }
            GameKind::Crash => {
                let stop_at = (settlement.verdict == Verdict::Win)
                    .then_some(settlement.transaction.multiplier);
                Some(Self::crash(path, stop_at))
            }
            GameKind::Pump => None,
            GameKind::Dice => match path.last() {
                Some(PathStep::Value(roll)) => Some(Self::dice_roll(*roll)),
                _ => None,
            },
            GameKind::Limbo => match path.last() {
                Some(PathStep::Value(result)) => Some(Self::limbo_count(*result)),
                _ => None,
            },
            GameKind::Roulette => match path.last() {
                Some(PathStep::Pocket(number)) => Some(Self::wheel(*number)),
                _ => None,
            },
            GameKind::Blackjack => Some(Self::card_flip()),
        }
    }
}

/// One drawable state of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Frame {
    Descent { position: Point, row: usize },
    Cell { position: u8, step: usize },
    Curve { multiplier: f64, index: usize },
    Transform { value: f64, progress: f64 },
    Scramble { value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Idle,
    Running,
    Finished,
    Cancelled,
}

#[derive(Debug)]
struct DescentState {
    position: Point,
    targets: Vec<Point>,
    landing: Option<Point>,
    row: usize,
    glide_from: Option<Point>,
    glide_step: usize,
}

#[derive(Debug)]
struct CellState {
    cells: Vec<u8>,
    interval: Duration,
    carry: Duration,
    next: usize,
}

#[derive(Debug)]
struct CurveState {
    samples: Vec<f64>,
    interval: Duration,
    stop_at: Option<f64>,
    carry: Duration,
    next: usize,
    last: Option<f64>,
}

#[derive(Debug)]
struct TransformState {
    from: f64,
    to: f64,
    duration: Duration,
    elapsed: Duration,
}

#[derive(Debug)]
struct ScrambleState {
    frames: usize,
    interval: Duration,
    carry: Duration,
    emitted: usize,
    scrambler: Scrambler,
}

#[derive(Debug)]
enum Animation {
    Descent(DescentState),
    Cells(CellState),
    Curve(CurveState),
    Transform(TransformState),
    Scramble(ScrambleState),
}

/// Frame-by-frame player for one [`ReplayPlan`] at a time.
#[derive(Debug)]
pub struct PathRenderer {
    animation: Option<Animation>,
    status: RenderStatus,
}

impl Default for PathRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathRenderer {
    pub fn new() -> Self {
        Self {
            animation: None,
            status: RenderStatus::Idle,
        }
    }

    pub fn status(&self) -> RenderStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RenderStatus::Running
    }

    /// Starts `plan`, replacing whatever was playing.
    pub fn start(&mut self, plan: ReplayPlan) {
        let animation = match plan {
            ReplayPlan::Descent {
                start,
                targets,
                landing,
            } => Animation::Descent(DescentState {
                position: start,
                targets,
                landing,
                row: 0,
                glide_from: None,
                glide_step: 0,
            }),
            ReplayPlan::Cells { cells, interval } => Animation::Cells(CellState {
                cells,
                interval,
                carry: Duration::ZERO,
                next: 0,
            }),
            ReplayPlan::Curve {
                samples,
                interval,
                stop_at,
            } => Animation::Curve(CurveState {
                samples,
                interval,
                stop_at,
                carry: Duration::ZERO,
                next: 0,
                last: None,
            }),
            ReplayPlan::Transform { from, to, duration } => {
                Animation::Transform(TransformState {
                    from,
                    to,
                    duration,
                    elapsed: Duration::ZERO,
                })
            }
            ReplayPlan::Scramble {
                frames,
                interval,
                seed,
            } => Animation::Scramble(ScrambleState {
                frames,
                interval,
                carry: Duration::ZERO,
                emitted: 0,
                scrambler: Scrambler::new(seed),
            }),
        };
        self.animation = Some(animation);
        self.status = RenderStatus::Running;
    }

    /// Advances the animation by `dt`.
    ///
    /// Returns the frame to draw, or `None` when nothing changed this tick.
    /// Once the animation completes the status moves to `Finished` and later
    /// ticks return `None`.
    pub fn tick(&mut self, dt: Duration) -> Option<Frame> {
        if self.status != RenderStatus::Running {
            return None;
        }
        let animation = self.animation.as_mut()?;
        let (frame, done) = match animation {
            Animation::Descent(state) => state.advance(),
            Animation::Cells(state) => state.advance(dt),
            Animation::Curve(state) => state.advance(dt),
            Animation::Transform(state) => state.advance(dt),
            Animation::Scramble(state) => state.advance(dt),
        };
        if done {
            self.status = RenderStatus::Finished;
        }
        frame
    }

    /// Stops the animation for good. Later ticks produce nothing.
    pub fn cancel(&mut self) {
        if self.animation.take().is_some() || self.status == RenderStatus::Running {
            self.status = RenderStatus::Cancelled;
        }
    }

    /// Freezes a running curve where it is and returns the multiplier last
    /// drawn. Does nothing for other shapes.
    pub fn cash_out(&mut self) -> Option<f64> {
        if self.status != RenderStatus::Running {
            return None;
        }
        match &self.animation {
            Some(Animation::Curve(state)) => {
                self.status = RenderStatus::Finished;
                state.last
            }
            _ => None,
        }
    }
}

impl DescentState {
    fn advance(&mut self) -> (Option<Frame>, bool) {
        if let Some(target) = self.targets.get(self.row).copied() {
            self.position = self.position.lerp(target, EASE_FACTOR);
            let frame = Frame::Descent {
                position: self.position,
                row: self.row,
            };
            if (self.position.y - target.y).abs() < ARRIVAL_TOLERANCE {
                self.row += 1;
            }
            let done = self.row >= self.targets.len() && self.landing.is_none();
            return (Some(frame), done);
        }

        let Some(landing) = self.landing else {
            return (None, true);
        };
        let from = *self.glide_from.get_or_insert(self.position);
        self.glide_step += 1;
        let t = self.glide_step as f64 / BUCKET_GLIDE_STEPS as f64;
        self.position = from.lerp(landing, t.min(1.0));
        let frame = Frame::Descent {
            position: self.position,
            row: self.targets.len(),
        };
        (Some(frame), self.glide_step >= BUCKET_GLIDE_STEPS)
    }
}

impl CellState {
    fn advance(&mut self, dt: Duration) -> (Option<Frame>, bool) {
        if self.next >= self.cells.len() {
            return (None, true);
        }
        self.carry += dt;
        if self.carry < self.interval {
            return (None, false);
        }
        self.carry -= self.interval;
        let frame = Frame::Cell {
            position: self.cells[self.next],
            step: self.next,
        };
        self.next += 1;
        (Some(frame), self.next >= self.cells.len())
    }
}

impl CurveState {
    fn advance(&mut self, dt: Duration) -> (Option<Frame>, bool) {
        if self.next >= self.samples.len() {
            return (None, true);
        }
        let last_index = self.samples.len() - 1;
        let due_index = if self.interval.is_zero() {
            self.next
        } else {
            self.carry += dt;
            if self.carry < self.interval {
                return (None, false);
            }
            // Late ticks skip ahead to the sample that is due now.
            let interval = self.interval.as_nanos();
            let due = (self.carry.as_nanos() / interval) as usize;
            self.carry = Duration::from_nanos((self.carry.as_nanos() % interval) as u64);
            (self.next + due - 1).min(last_index)
        };
        // Skipping ahead never jumps past the stop sample.
        let index = match self.stop_at {
            Some(stop) => (self.next..=due_index)
                .find(|&i| self.samples[i] >= stop)
                .unwrap_or(due_index),
            None => due_index,
        };
        self.next = index + 1;

        let mut multiplier = self.samples[index];
        let mut done = self.next >= self.samples.len();
        if let Some(stop) = self.stop_at {
            if multiplier >= stop {
                multiplier = stop;
                done = true;
            }
        }
        self.last = Some(multiplier);
        (Some(Frame::Curve { multiplier, index }), done)
    }
}

impl TransformState {
    fn advance(&mut self, dt: Duration) -> (Option<Frame>, bool) {
        self.elapsed += dt;
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };
        let value = if progress >= 1.0 {
            self.to
        } else {
            self.from + (self.to - self.from) * ease_out_cubic(progress)
        };
        (Some(Frame::Transform { value, progress }), progress >= 1.0)
    }
}

impl ScrambleState {
    fn advance(&mut self, dt: Duration) -> (Option<Frame>, bool) {
        if self.emitted >= self.frames {
            return (None, true);
        }
        self.carry += dt;
        if self.carry < self.interval {
            return (None, false);
        }
        self.carry -= self.interval;
        self.emitted += 1;
        let frame = Frame::Scramble {
            value: self.scrambler.next_value(),
        };
        (Some(frame), self.emitted >= self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn ease_out_cubic_hits_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert_eq!(ease_out_cubic(0.5), 0.875);
        assert_eq!(ease_out_cubic(2.0), 1.0);
    }

    #[test]
    fn idle_renderer_produces_nothing() {
        let mut renderer = PathRenderer::new();
        assert_eq!(renderer.tick(FRAME), None);
        assert_eq!(renderer.status(), RenderStatus::Idle);
    }

    #[test]
    fn cancel_stops_all_further_frames() {
        let mut renderer = PathRenderer::new();
        renderer.start(ReplayPlan::wheel(17));
        assert!(renderer.tick(FRAME).is_some());
        renderer.cancel();
        assert_eq!(renderer.status(), RenderStatus::Cancelled);
        for _ in 0..10 {
            assert_eq!(renderer.tick(FRAME), None);
        }
    }

    #[test]
    fn peg_targets_match_board_layout() {
        let geometry = BoardGeometry::default();
        // Row 0 has three pegs spaced 150 apart; column 0 sits half a gap in.
        assert_eq!(geometry.peg_target(0, 0), Point::new(75.0, 40.0));
        assert_eq!(geometry.bucket_target(12).y, 640.0);
    }

    #[test]
    fn scramble_runs_for_its_frame_count() {
        let mut renderer = PathRenderer::new();
        renderer.start(ReplayPlan::scramble(GameKind::Dice, 5).expect("dice scrambles"));
        let mut frames = 0;
        while renderer.is_running() {
            if renderer.tick(SCRAMBLE_TICK).is_some() {
                frames += 1;
            }
        }
        assert_eq!(frames, DICE_SCRAMBLE_FRAMES);
        assert!(ReplayPlan::scramble(GameKind::Roulette, 5).is_none());
    }
}
