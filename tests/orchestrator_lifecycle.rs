use gaze_control::core::coord::GazeCoordinate;
use gaze_control::core::timebase::ManualClock;
use gaze_control::gaze::aversion::AversionParams;
use gaze_control::gaze::behavior::{GazeDirection, GazeParams, JointAttentionStage};
use gaze_control::gaze::condition::Condition;
use gaze_control::gaze::orchestrator::Orchestrator;
use gaze_control::gaze::perception::PerceptionSnapshot;
use gaze_control::gaze::sink::PupilSink;
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn build(clock: &ManualClock, seed: u64) -> Orchestrator<ManualClock> {
    Orchestrator::new(
        GazeParams::default(),
        AversionParams::default(),
        PupilSink::default(),
        clock.clone(),
        SmallRng::seed_from_u64(seed),
    )
}

#[test]
fn trigger_left_runs_side_hold_return_then_mutual_gaze() {
    let clock = ManualClock::new(0);
    let mut orch = build(&clock, 17);
    let user = PerceptionSnapshot::with_face(0.3, 0.4);
    let side = GazeCoordinate::new(0.15, 0.5);
    let home = GazeCoordinate::new(0.7, 0.4);

    let cond = Condition::named("valid").with_validity(1.0);
    assert_eq!(
        orch.trigger(GazeDirection::Left, Some(&cond)),
        GazeDirection::Left
    );

    let mut stages = Vec::new();
    let mut reached_side_at = None;
    let mut finished_at = None;
    for i in 0..50 {
        clock.advance(50);
        orch.tick(&user);

        if let Some(ja) = orch.behavior().joint_attention() {
            let stage = ja.stage();
            if stages.last() != Some(&stage) {
                stages.push(stage);
            }
            if stage == JointAttentionStage::Hold {
                assert_eq!(orch.sink().current(), side, "hold must pin the side target");
            }
        }
        if reached_side_at.is_none() && orch.sink().current() == side {
            reached_side_at = Some(i);
        }
        if finished_at.is_none() && orch.behavior_name() == "MutualGaze" {
            finished_at = Some(i);
            assert_eq!(orch.sink().current(), home);
        }
    }

    let reached = reached_side_at.expect("side target never reached");
    let finished = finished_at.expect("joint attention never finished");
    assert!(reached < finished);
    assert_eq!(
        stages,
        vec![
            JointAttentionStage::TransitionToSide,
            JointAttentionStage::Hold,
            JointAttentionStage::ReturnToUser,
        ]
    );
    assert!(orch.sink().current().distance(home) < 1e-3);
}

#[test]
fn finished_behavior_is_replaced_within_the_same_tick() {
    let clock = ManualClock::new(0);
    let mut orch = build(&clock, 3);
    let user = PerceptionSnapshot::with_face(0.5, 0.5);
    orch.respond(GazeDirection::Right);

    let mut saw_responding = false;
    for _ in 0..200 {
        clock.advance(40);
        orch.tick(&user);
        match orch.behavior_name() {
            "RespondingJointAttention" => {
                saw_responding = true;
                assert!(!orch.behavior().is_finished());
            }
            "MutualGaze" => break,
            other => panic!("unexpected behavior {other}"),
        }
    }
    assert!(saw_responding);
    assert_eq!(orch.behavior_name(), "MutualGaze");
    assert!(!orch.behavior().is_finished());
}

#[test]
fn retrigger_discards_in_flight_sequence() {
    let clock = ManualClock::new(0);
    let mut orch = build(&clock, 8);
    let user = PerceptionSnapshot::absent();
    orch.trigger(GazeDirection::Left, None);
    for _ in 0..3 {
        clock.advance(16);
        orch.tick(&user);
    }
    let mid_flight = orch.sink().current();
    assert!(mid_flight.x < 0.5);

    orch.trigger(GazeDirection::Right, None);
    let ja = orch.behavior().joint_attention().expect("joint attention active");
    assert_eq!(ja.stage(), JointAttentionStage::TransitionToSide);

    clock.advance(16);
    orch.tick(&user);
    // The new saccade starts from wherever the sink was, not from center.
    assert!(orch.sink().current().x > mid_flight.x);
    assert!(orch.sink().current().x < 0.5);
}

#[test]
fn missing_validity_keeps_nominal_direction() {
    let clock = ManualClock::new(0);
    let mut orch = build(&clock, 99);
    for _ in 0..100 {
        assert_eq!(
            orch.trigger(GazeDirection::Right, Some(&Condition::named("no-validity"))),
            GazeDirection::Right
        );
        assert_eq!(orch.trigger(GazeDirection::Left, None), GazeDirection::Left);
    }
}
