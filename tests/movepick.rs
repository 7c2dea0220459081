use cozy_chess::Move;
use magpie::board::{MoveClass, Position};
use magpie::search::movepick::{MovePicker, RootMove};
use magpie::search::Histories;

fn legal_moves(pos: &Position) -> Vec<Move> {
    let mut list = Vec::new();
    pos.generate(MoveClass::All, &mut list);
    list
}

fn drain(picker: &mut MovePicker) -> Vec<Move> {
    let mut out = Vec::new();
    while let Some(mv) = picker.next_move() {
        out.push(mv);
    }
    out
}

fn same_move_set(mut a: Vec<Move>, mut b: Vec<Move>) -> bool {
    let key = |m: &Move| (m.from as u8, m.to as u8, m.promotion.map(|p| p as u8));
    a.sort_by_key(key);
    b.sort_by_key(key);
    a == b
}

#[test]
fn tt_move_comes_first_and_only_once() {
    let pos = Position::startpos();
    let histories = Histories::new();
    let bundle = histories.bundle();
    let tt: Move = "e2e4".parse().unwrap();
    let mut picker = MovePicker::new(&pos, Some(tt), 8, 0, &bundle);

    let emitted = drain(&mut picker);
    assert_eq!(emitted[0], tt, "TT move must be emitted first");
    assert_eq!(
        emitted.iter().filter(|&&m| m == tt).count(),
        1,
        "TT move must be emitted exactly once"
    );
    assert!(same_move_set(emitted, legal_moves(&pos)));
}

#[test]
fn illegal_tt_move_is_never_emitted() {
    let pos = Position::startpos();
    let histories = Histories::new();
    let bundle = histories.bundle();
    let tt: Move = "e2e5".parse().unwrap();
    let mut picker = MovePicker::new(&pos, Some(tt), 8, 0, &bundle);
    let emitted = drain(&mut picker);
    assert!(!emitted.contains(&tt));
    assert!(same_move_set(emitted, legal_moves(&pos)));
}

#[test]
fn main_schedule_emits_every_legal_move_exactly_once() {
    let fens = [
        "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    ];
    let histories = Histories::new();
    let bundle = histories.bundle();
    for fen in fens {
        let pos = Position::from_fen(fen).unwrap();
        let mut picker = MovePicker::new(&pos, None, 6, 0, &bundle);
        let emitted = drain(&mut picker);
        let legal = legal_moves(&pos);
        assert_eq!(emitted.len(), legal.len(), "{fen}: wrong move count");
        assert!(same_move_set(emitted, legal), "{fen}: move sets differ");
        // A second call after exhaustion stays exhausted.
        assert_eq!(picker.next_move(), None);
        assert_eq!(picker.next_move(), None);
    }
}

#[test]
fn hanging_big_victims_are_captured_first() {
    // White can take an undefended queen with the rook and an undefended
    // knight with the bishop; the queen capture must come first.
    let pos = Position::from_fen("k7/8/3q4/8/3R4/8/5n2/K5B1 w - - 0 1").unwrap();
    let histories = Histories::new();
    let bundle = histories.bundle();
    let mut picker = MovePicker::new(&pos, None, 6, 0, &bundle);
    let emitted = drain(&mut picker);
    let rxq: Move = "d4d6".parse().unwrap();
    let bxn: Move = "g1f2".parse().unwrap();
    assert_eq!(emitted[0], rxq);
    assert_eq!(emitted[1], bxn);
    assert!(same_move_set(emitted, legal_moves(&pos)));
}

#[test]
fn evasions_only_and_checking_capture_first() {
    // White king on e1 is checked by the queen on f2.
    let pos = Position::from_fen("4k3/8/8/8/8/8/5q2/4K3 w - - 0 1").unwrap();
    assert!(pos.in_check());
    let histories = Histories::new();
    let bundle = histories.bundle();
    let mut picker = MovePicker::new(&pos, None, 6, 0, &bundle);
    let emitted = drain(&mut picker);
    let kxq: Move = "e1f2".parse().unwrap();
    assert_eq!(emitted[0], kxq, "capture evasion must lead");
    assert!(same_move_set(emitted, legal_moves(&pos)));
}

#[test]
fn quiescence_emits_captures_only() {
    let pos = Position::from_fen(
        "r1bqkbnr/pppp1ppp/2n5/4p3/3PP3/8/PPP2PPP/RNBQKBNR b KQkq - 0 3",
    )
    .unwrap();
    let histories = Histories::new();
    let bundle = histories.bundle();
    let mut picker = MovePicker::new(&pos, None, 0, 0, &bundle);
    let emitted = drain(&mut picker);
    assert!(!emitted.is_empty());
    for mv in &emitted {
        assert!(pos.capture_stage(*mv), "{mv} is not a capture-stage move");
    }
    let mut captures = Vec::new();
    pos.generate(MoveClass::Captures, &mut captures);
    assert!(same_move_set(emitted, captures));
}

#[test]
fn skip_quiet_moves_cuts_off_the_quiet_stages() {
    let pos = Position::from_fen(
        "r1bqkbnr/pppp1ppp/2n5/4p3/3PP3/8/PPP2PPP/RNBQKBNR b KQkq - 0 3",
    )
    .unwrap();
    let histories = Histories::new();
    let bundle = histories.bundle();
    let mut picker = MovePicker::new(&pos, None, 6, 0, &bundle);
    picker.skip_quiet_moves();
    let emitted = drain(&mut picker);
    for mv in &emitted {
        assert!(pos.capture_stage(*mv), "{mv} emitted despite skip_quiets");
    }
}

#[test]
fn probcut_emits_only_captures_meeting_the_threshold() {
    // Rook takes undefended queen passes any reasonable threshold; the
    // defended-pawn capture does not.
    let pos = Position::from_fen("k2q4/8/8/6p1/3R3N/8/8/K7 w - - 0 1").unwrap();
    let histories = Histories::new();
    let bundle = histories.bundle();
    let threshold = 500;
    let mut picker = MovePicker::new_probcut(&pos, None, threshold, &bundle);
    let emitted = drain(&mut picker);
    let rxq: Move = "d4d8".parse().unwrap();
    assert!(emitted.contains(&rxq));
    for mv in &emitted {
        assert!(pos.capture_stage(*mv));
        assert!(pos.see_ge(*mv, threshold), "{mv} fails the probcut threshold");
    }
}

#[test]
fn probcut_tt_move_must_itself_pass_the_threshold() {
    let pos = Position::from_fen("k2q4/8/8/6p1/3R3N/8/8/K7 w - - 0 1").unwrap();
    let histories = Histories::new();
    let bundle = histories.bundle();
    // Nxg5 wins only a pawn; with a rook-sized threshold it must not lead.
    let tt: Move = "h4g5".parse().unwrap();
    let mut picker = MovePicker::new_probcut(&pos, Some(tt), 1000, &bundle);
    let first = picker.next_move();
    assert_ne!(first, Some(tt), "sub-threshold TT move must not be emitted first");
}

#[test]
fn root_schedule_replays_by_descending_effort() {
    let pos = Position::startpos();
    let histories = Histories::new();
    let bundle = histories.bundle();
    let legal = legal_moves(&pos);
    let mut root_moves: Vec<RootMove> = legal.iter().map(|&m| RootMove::new(m)).collect();
    for (i, rm) in root_moves.iter_mut().enumerate() {
        rm.effort = (i as u64) * 10;
    }
    let mut picker = MovePicker::new(&pos, None, 6, 0, &bundle);
    picker.setup_root(&root_moves);
    let emitted = drain(&mut picker);
    assert_eq!(emitted.len(), legal.len());
    // Highest effort first.
    assert_eq!(emitted[0], *root_moves.last().unwrap().pv.first().unwrap());
    assert!(same_move_set(emitted, legal));
}
