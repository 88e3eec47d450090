use parlor_engine::cards::{Card, CardTable};
use parlor_engine::errors::EngineError;
use parlor_engine::games::{BetType, Direction, GameKind};
use parlor_engine::machine::{ActionPayload, RoundMachine};
use parlor_engine::money::Amount;
use parlor_engine::outcome::{
    AuthorityReply, OutcomeDetail, OutcomePath, PathStep, Resolution, Verdict,
};
use parlor_engine::replay::{Frame, PathRenderer, ReplayPlan, PUMP_TICK};
use parlor_engine::round::{ActionKind, GameParams, Move, RoundConfig, RoundPhase};

fn cents(value: i64) -> Amount {
    Amount::from_cents(value)
}

fn config(bet: i64, params: GameParams) -> RoundConfig {
    RoundConfig::new(cents(bet), params).expect("valid config")
}

fn resolution(verdict: Verdict, multiplier: f64, win: i64, balance: i64) -> Resolution {
    Resolution {
        verdict,
        multiplier,
        win: cents(win),
        balance: cents(balance),
        path: OutcomePath::default(),
        hazards: Vec::new(),
        detail: OutcomeDetail::default(),
    }
}

fn active_mines(balance: i64) -> RoundMachine {
    let mut machine = RoundMachine::new(GameKind::Mines);
    machine
        .begin_start("start".into(), config(1_000, GameParams::Mines { mines: 3 }), cents(balance))
        .expect("start");
    machine
        .apply(
            "start",
            AuthorityReply::Started {
                balance: cents(balance - 1_000),
                cap: None,
                table: None,
            },
        )
        .expect("started");
    machine
}

#[test]
fn bet_above_balance_is_rejected_before_any_request() {
    let mut machine = RoundMachine::new(GameKind::Dice);
    let err = machine
        .begin_start(
            "r1".into(),
            config(
                5_000,
                GameParams::Dice {
                    target: 50.0,
                    direction: Direction::Under,
                },
            ),
            cents(4_999),
        )
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientBalance {
            bet: cents(5_000),
            balance: cents(4_999),
        }
    );
    assert!(err.is_local_validation());
    assert!(machine.pending().is_none());
    assert_eq!(machine.phase(), RoundPhase::Idle);
}

#[test]
fn start_while_active_leaves_round_untouched() {
    let mut machine = active_mines(10_000);
    let before = machine.state().clone();
    let err = machine
        .begin_start("again".into(), config(100, GameParams::Mines { mines: 5 }), cents(10_000))
        .unwrap_err();
    assert_eq!(err, EngineError::RoundAlreadyActive(GameKind::Mines));
    assert_eq!(machine.state(), &before);
}

#[test]
fn double_click_is_rejected_while_pending() {
    let mut machine = active_mines(10_000);
    machine
        .begin_advance("reveal-1".into(), Move::Reveal(3))
        .expect("first reveal")
        .expect("request issued");
    let err = machine.begin_advance("reveal-2".into(), Move::Reveal(4)).unwrap_err();
    assert_eq!(err, EngineError::ActionPending("reveal-1".into()));
    assert!(matches!(
        machine.begin_cashout("cash".into()),
        Err(EngineError::ActionPending(_))
    ));
}

#[test]
fn re_revealing_a_safe_cell_is_a_no_op() {
    let mut machine = active_mines(10_000);
    machine.begin_advance("r1".into(), Move::Reveal(12)).unwrap();
    machine
        .apply("r1", AuthorityReply::Revealed { multiplier: 1.13 })
        .expect("safe");
    let before = machine.state().clone();

    let again = machine.begin_advance("r2".into(), Move::Reveal(12)).expect("no error");
    assert!(again.is_none());
    assert_eq!(machine.state(), &before);
    assert!(machine.pending().is_none());
}

#[test]
fn reveals_grow_the_safe_set_and_track_remaining_cells() {
    let mut machine = active_mines(10_000);
    for (i, (cell, multiplier)) in [(0u8, 1.13), (6, 1.29), (24, 1.48)].into_iter().enumerate() {
        let id = format!("reveal-{i}");
        machine.begin_advance(id.clone(), Move::Reveal(cell)).unwrap();
        let applied = machine
            .apply(&id, AuthorityReply::Revealed { multiplier })
            .unwrap();
        assert_eq!(applied.revealed, Some(cell));
        assert_eq!(applied.phases, vec![RoundPhase::Active]);
    }
    let state = machine.state();
    assert_eq!(state.revealed.len(), 3);
    assert_eq!(state.current_multiplier, 1.48);
    assert_eq!(
        state.revealed.len() as u8 + state.remaining_safe().unwrap(),
        state.total_safe().unwrap()
    );
}

#[test]
fn hitting_a_hazard_settles_as_a_loss() {
    let mut machine = active_mines(10_000);
    machine.begin_advance("boom".into(), Move::Reveal(9)).unwrap();
    let mut hit = resolution(Verdict::Loss, 0.0, 0, 9_000);
    hit.hazards = vec![9, 14, 20];
    hit.path = OutcomePath::new(vec![PathStep::Cell(9), PathStep::Cell(14), PathStep::Cell(20)]);
    let applied = machine.apply("boom", AuthorityReply::Resolved(hit)).unwrap();

    assert_eq!(
        applied.phases,
        vec![RoundPhase::Active, RoundPhase::Resolving, RoundPhase::Settled]
    );
    let settlement = applied.settlement.expect("settled");
    assert_eq!(settlement.verdict, Verdict::Loss);
    assert_eq!(settlement.transaction.win, Amount::ZERO);
    assert_eq!(settlement.balance, cents(9_000));
    assert!(!machine.state().revealed.contains(&9));
    assert_eq!(machine.state().hazards, vec![9, 14, 20]);
}

#[test]
fn remote_failure_keeps_round_active_for_retry() {
    let mut machine = active_mines(10_000);
    machine.begin_cashout("cash-1".into()).unwrap();
    assert_eq!(machine.phase(), RoundPhase::Awaiting(ActionKind::Cashout));
    assert_eq!(machine.fail("cash-1"), Ok(RoundPhase::Active));
    assert!(machine.state().pending_request_id.is_none());

    let retry = machine.begin_cashout("cash-2".into()).expect("retry allowed");
    assert_eq!(retry.payload, ActionPayload::Cashout { multiplier: None });
}

#[test]
fn single_shot_round_passes_every_phase_in_order() {
    let mut machine = RoundMachine::new(GameKind::Roulette);
    machine
        .begin_start(
            "spin".into(),
            config(1_000, GameParams::Roulette { bet_type: BetType::Red }),
            cents(10_000),
        )
        .unwrap();
    let mut spin = resolution(Verdict::Loss, 0.0, 0, 9_000);
    spin.path = OutcomePath::new(vec![PathStep::Pocket(17)]);
    spin.detail.number = Some(17);
    let applied = machine.apply("spin", AuthorityReply::Resolved(spin)).unwrap();
    assert_eq!(
        applied.phases,
        vec![RoundPhase::Active, RoundPhase::Resolving, RoundPhase::Settled]
    );
    assert_eq!(applied.settlement.unwrap().verdict, Verdict::Loss);

    // Nothing moves a settled round except the reset.
    assert!(matches!(
        machine.begin_advance("x".into(), Move::Reveal(1)),
        Err(EngineError::IllegalTransition { .. })
    ));
    assert!(matches!(
        machine.begin_cashout("y".into()),
        Err(EngineError::IllegalTransition { .. })
    ));
    machine.finish().unwrap();
    assert_eq!(machine.phase(), RoundPhase::Idle);
}

#[test]
fn a_settled_round_cannot_settle_twice() {
    let mut machine = RoundMachine::new(GameKind::Limbo);
    machine
        .begin_start("go".into(), config(1_000, GameParams::Limbo { target: 2.0 }), cents(10_000))
        .unwrap();
    machine
        .apply(
            "go",
            AuthorityReply::Resolved(resolution(Verdict::Win, 2.0, 2_000, 11_000)),
        )
        .unwrap();
    let replay = machine.apply(
        "go",
        AuthorityReply::Resolved(resolution(Verdict::Win, 2.0, 2_000, 13_000)),
    );
    assert_eq!(replay, Err(EngineError::StaleReply("go".into())));
    assert_eq!(
        machine.state().settlement.as_ref().unwrap().balance,
        cents(11_000)
    );
}

#[test]
fn moves_outside_active_are_illegal_transitions() {
    let mut machine = RoundMachine::new(GameKind::Mines);
    assert_eq!(
        machine.begin_advance("a".into(), Move::Reveal(0)),
        Err(EngineError::IllegalTransition {
            from: RoundPhase::Idle,
            to: RoundPhase::Awaiting(ActionKind::Advance),
        })
    );
    assert!(machine.pending().is_none());
}

#[test]
fn moves_must_belong_to_the_game() {
    let mut machine = active_mines(10_000);
    assert!(matches!(
        machine.begin_advance("h".into(), Move::Hit),
        Err(EngineError::InvalidParameter(_))
    ));
    assert!(matches!(
        machine.begin_advance("off".into(), Move::Reveal(25)),
        Err(EngineError::InvalidParameter(_))
    ));
    assert_eq!(machine.phase(), RoundPhase::Active);
}

#[test]
fn pump_cashout_reports_the_observed_multiplier() {
    let mut machine = RoundMachine::new(GameKind::Pump);
    machine
        .begin_start("pump".into(), config(1_000, GameParams::Pump), cents(10_000))
        .unwrap();
    machine
        .apply(
            "pump",
            AuthorityReply::Started {
                balance: cents(9_000),
                cap: Some(1.5),
                table: None,
            },
        )
        .unwrap();

    assert_eq!(machine.observe_multiplier(1.2), Some(1.2));
    assert_eq!(machine.observe_multiplier(1.1), None);
    assert_eq!(machine.observe_multiplier(1.49), Some(1.49));
    assert_eq!(machine.state().current_multiplier, 1.49);

    let pending = machine.begin_cashout("out".into()).unwrap();
    assert_eq!(
        pending.payload,
        ActionPayload::Cashout {
            multiplier: Some(1.49)
        }
    );
}

#[test]
fn pump_curve_never_offers_the_pop_point_for_cashout() {
    let mut machine = RoundMachine::new(GameKind::Pump);
    machine
        .begin_start("pump".into(), config(1_000, GameParams::Pump), cents(10_000))
        .unwrap();
    machine
        .apply(
            "pump",
            AuthorityReply::Started {
                balance: cents(9_000),
                cap: Some(2.5),
                table: None,
            },
        )
        .unwrap();

    let mut renderer = PathRenderer::new();
    renderer.start(ReplayPlan::pump(2.5, 7));
    let mut last_sample = 0.0;
    while let Some(frame) = renderer.tick(PUMP_TICK) {
        if let Frame::Curve { multiplier, .. } = frame {
            last_sample = multiplier;
            machine.observe_multiplier(multiplier);
        }
    }
    assert_eq!(last_sample, 2.5);
    assert!(machine.state().current_multiplier < 2.5);
    assert_eq!(machine.observe_multiplier(3.0), None);

    let pending = machine.begin_cashout("out".into()).unwrap();
    match pending.payload {
        ActionPayload::Cashout {
            multiplier: Some(multiplier),
        } => assert!(multiplier > 1.0 && multiplier < 2.5),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn pump_pop_settles_as_a_bust() {
    let mut machine = RoundMachine::new(GameKind::Pump);
    machine
        .begin_start("pump".into(), config(1_000, GameParams::Pump), cents(10_000))
        .unwrap();
    machine
        .apply(
            "pump",
            AuthorityReply::Started {
                balance: cents(9_000),
                cap: Some(1.3),
                table: None,
            },
        )
        .unwrap();
    machine.begin_advance("pop".into(), Move::Pop).unwrap();
    let applied = machine
        .apply(
            "pop",
            AuthorityReply::Resolved(resolution(Verdict::Loss, 0.0, 0, 9_000)),
        )
        .unwrap();
    assert_eq!(applied.settlement.unwrap().transaction.multiplier, 0.0);
}

#[test]
fn blackjack_hits_until_stand() {
    let mut machine = RoundMachine::new(GameKind::Blackjack);
    let card = |s: &str| s.parse::<Card>().unwrap();
    machine
        .begin_start("deal".into(), config(1_000, GameParams::Blackjack), cents(10_000))
        .unwrap();
    machine
        .apply(
            "deal",
            AuthorityReply::Started {
                balance: cents(9_000),
                cap: None,
                table: Some(CardTable {
                    player: vec![card("9♠"), card("5♥")],
                    dealer: vec![card("K♣"), card("7♦")],
                    player_score: 14,
                    dealer_score: 10,
                }),
            },
        )
        .unwrap();

    machine.begin_advance("hit".into(), Move::Hit).unwrap();
    let table = CardTable {
        player: vec![card("9♠"), card("5♥"), card("6♣")],
        dealer: vec![card("K♣"), card("7♦")],
        player_score: 20,
        dealer_score: 10,
    };
    machine
        .apply("hit", AuthorityReply::Dealt { table: table.clone() })
        .unwrap();
    assert_eq!(machine.state().table.as_ref().unwrap().player_score, 20);
    assert_eq!(machine.phase(), RoundPhase::Active);

    machine.begin_advance("stand".into(), Move::Stand).unwrap();
    let mut win = resolution(Verdict::Win, 2.0, 2_000, 11_000);
    win.detail.table = Some(CardTable {
        dealer_score: 17,
        ..table
    });
    let applied = machine.apply("stand", AuthorityReply::Resolved(win)).unwrap();
    assert_eq!(applied.settlement.unwrap().verdict, Verdict::Win);
    assert_eq!(machine.state().table.as_ref().unwrap().dealer_score, 17);
}

#[test]
fn abandon_drops_the_round_and_ignores_late_replies() {
    let mut machine = active_mines(10_000);
    machine.begin_advance("late".into(), Move::Reveal(2)).unwrap();
    assert!(machine.abandon());
    assert_eq!(machine.phase(), RoundPhase::Idle);
    assert_eq!(
        machine.apply("late", AuthorityReply::Revealed { multiplier: 1.1 }),
        Err(EngineError::StaleReply("late".into()))
    );
    assert!(!machine.abandon());
}

#[test]
fn every_settled_transaction_pays_bet_times_multiplier() {
    let cases = [
        (GameParams::Dice { target: 50.0, direction: Direction::Over }, Verdict::Win, 1.96, 1_960),
        (GameParams::Limbo { target: 3.5 }, Verdict::Win, 3.5, 3_500),
        (GameParams::Roulette { bet_type: BetType::Even }, Verdict::Loss, 0.0, 0),
    ];
    for (params, verdict, multiplier, win) in cases {
        let game = params.game();
        let mut machine = RoundMachine::new(game);
        machine
            .begin_start("p".into(), config(1_000, params), cents(10_000))
            .unwrap();
        let applied = machine
            .apply(
                "p",
                AuthorityReply::Resolved(resolution(verdict, multiplier, win, 10_000)),
            )
            .unwrap();
        let tx = applied.settlement.unwrap().transaction;
        assert_eq!(tx.game, game);
        assert!(tx.is_consistent(), "{game}: {tx:?}");
    }
}
