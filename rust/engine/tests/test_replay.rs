use std::time::Duration;

use parlor_engine::games::GameKind;
use parlor_engine::ledger::Transaction;
use parlor_engine::money::Amount;
use parlor_engine::outcome::{OutcomeDetail, OutcomePath, PathStep, Settlement, Verdict};
use parlor_engine::replay::{
    BoardGeometry, Frame, PathRenderer, RenderStatus, ReplayPlan, BUCKET_GLIDE_STEPS, CRASH_TICK,
    FULL_ROTATIONS, SPIN_DURATION,
};

const FRAME: Duration = Duration::from_millis(16);

fn drain(renderer: &mut PathRenderer, dt: Duration) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut guard = 0;
    while renderer.is_running() {
        if let Some(frame) = renderer.tick(dt) {
            frames.push(frame);
        }
        guard += 1;
        assert!(guard < 100_000, "animation never finished");
    }
    frames
}

fn settlement(game: GameKind, verdict: Verdict, multiplier: f64, path: Vec<PathStep>) -> Settlement {
    Settlement {
        round: 1,
        verdict,
        transaction: Transaction::new(game, Amount::from_cents(100), multiplier, Amount::ZERO),
        balance: Amount::from_cents(1_000),
        path: OutcomePath::new(path),
        hazards: Vec::new(),
        detail: OutcomeDetail::default(),
    }
}

#[test]
fn plinko_descends_row_by_row_then_glides_into_bucket() {
    let columns = [7u8, 6, 7, 8, 7, 6, 5, 6, 5, 4, 5, 6, 7, 6, 5, 6];
    let path: OutcomePath = columns.iter().map(|c| PathStep::Peg(*c)).collect();
    let geometry = BoardGeometry::default();

    let mut renderer = PathRenderer::new();
    renderer.start(ReplayPlan::plinko(&path, &geometry));
    let frames = drain(&mut renderer, FRAME);

    let rows: Vec<usize> = frames
        .iter()
        .map(|frame| match frame {
            Frame::Descent { row, .. } => *row,
            other => panic!("unexpected frame {other:?}"),
        })
        .collect();
    assert!(rows.windows(2).all(|pair| pair[0] <= pair[1]), "rows never go back");
    assert_eq!(rows.iter().filter(|row| **row == columns.len()).count(), BUCKET_GLIDE_STEPS);

    let Some(Frame::Descent { position, .. }) = frames.last() else {
        panic!("no frames");
    };
    let bucket = geometry.bucket_target(6);
    assert!((position.x - bucket.x).abs() < 1e-9);
    assert!((position.y - bucket.y).abs() < 1e-9);
    assert_eq!(renderer.status(), RenderStatus::Finished);
}

#[test]
fn crash_curve_plays_to_the_bust_sample() {
    let samples = [1.0, 1.05, 1.1, 1.16, 1.22, 1.3];
    let path: OutcomePath = samples.iter().map(|s| PathStep::Sample(*s)).collect();
    let mut renderer = PathRenderer::new();
    renderer.start(ReplayPlan::crash(&path, None));

    let frames = drain(&mut renderer, CRASH_TICK);
    let drawn: Vec<f64> = frames
        .iter()
        .map(|frame| match frame {
            Frame::Curve { multiplier, .. } => *multiplier,
            other => panic!("unexpected frame {other:?}"),
        })
        .collect();
    assert_eq!(drawn, samples);
}

#[test]
fn crash_curve_stops_at_cash_out() {
    let samples = [1.0, 1.2, 1.4, 1.6, 1.8, 2.0, 2.2];
    let path: OutcomePath = samples.iter().map(|s| PathStep::Sample(*s)).collect();
    let won = settlement(GameKind::Crash, Verdict::Win, 1.5, path.steps().to_vec());

    let mut renderer = PathRenderer::new();
    renderer.start(ReplayPlan::for_settlement(GameKind::Crash, &won).expect("plan"));
    let frames = drain(&mut renderer, CRASH_TICK);
    assert_eq!(
        frames.last(),
        Some(&Frame::Curve {
            multiplier: 1.5,
            index: 3
        })
    );
}

#[test]
fn late_ticks_skip_samples_but_not_the_stop() {
    let samples = [1.0, 1.1, 1.2, 1.3, 1.4];
    let path: OutcomePath = samples.iter().map(|s| PathStep::Sample(*s)).collect();
    let mut renderer = PathRenderer::new();
    renderer.start(ReplayPlan::crash(&path, Some(1.15)));

    let frame = renderer.tick(CRASH_TICK * 4);
    assert_eq!(
        frame,
        Some(Frame::Curve {
            multiplier: 1.15,
            index: 2
        })
    );
    assert_eq!(renderer.status(), RenderStatus::Finished);
}

#[test]
fn engine_cash_out_freezes_a_live_curve() {
    let mut renderer = PathRenderer::new();
    renderer.start(ReplayPlan::pump(5.0, 42));
    let mut last = None;
    for _ in 0..10 {
        if let Some(Frame::Curve { multiplier, .. }) = renderer.tick(Duration::from_millis(100)) {
            last = Some(multiplier);
        }
    }
    assert_eq!(renderer.cash_out(), last);
    assert!(!renderer.is_running());
    assert_eq!(renderer.tick(Duration::from_millis(100)), None);
}

#[test]
fn wheel_spin_eases_out_to_the_target_pocket() {
    let mut renderer = PathRenderer::new();
    let plan = ReplayPlan::wheel(17);
    let ReplayPlan::Transform { to, .. } = plan.clone() else {
        panic!("wheel is a transform");
    };
    let segment = std::f64::consts::TAU / 37.0;
    assert!((to - (FULL_ROTATIONS * std::f64::consts::TAU + 8.0 * segment)).abs() < 1e-9);

    renderer.start(plan);
    let half = renderer.tick(SPIN_DURATION / 2).expect("frame");
    let Frame::Transform { value, progress } = half else {
        panic!("transform frame");
    };
    assert_eq!(progress, 0.5);
    assert!((value - to * 0.875).abs() < 1e-9);

    let end = renderer.tick(SPIN_DURATION).expect("final frame");
    assert_eq!(end, Frame::Transform { value: to, progress: 1.0 });
    assert_eq!(renderer.status(), RenderStatus::Finished);
}

#[test]
fn reveal_grid_uncovers_hazards_one_per_step() {
    let mut hit = settlement(
        GameKind::Mines,
        Verdict::Loss,
        0.0,
        vec![PathStep::Cell(4), PathStep::Cell(11), PathStep::Cell(19)],
    );
    hit.hazards = vec![4, 11, 19];
    let mut renderer = PathRenderer::new();
    renderer.start(ReplayPlan::for_settlement(GameKind::Mines, &hit).expect("plan"));
    let frames = drain(&mut renderer, FRAME);
    let cells: Vec<u8> = frames
        .iter()
        .map(|frame| match frame {
            Frame::Cell { position, .. } => *position,
            other => panic!("unexpected frame {other:?}"),
        })
        .collect();
    assert_eq!(cells, vec![4, 11, 19]);
}

#[test]
fn pump_has_no_settlement_replay() {
    let popped = settlement(GameKind::Pump, Verdict::Loss, 0.0, Vec::new());
    assert!(ReplayPlan::for_settlement(GameKind::Pump, &popped).is_none());
}

#[test]
fn restarting_replaces_the_current_animation() {
    let mut renderer = PathRenderer::new();
    renderer.start(ReplayPlan::scramble(GameKind::Limbo, 3).unwrap());
    renderer.tick(Duration::from_millis(50));
    renderer.start(ReplayPlan::limbo_count(4.2));
    let frames = drain(&mut renderer, FRAME);
    assert!(frames
        .iter()
        .all(|frame| matches!(frame, Frame::Transform { .. })));
    assert_eq!(
        frames.last(),
        Some(&Frame::Transform {
            value: 4.2,
            progress: 1.0
        })
    );
}
