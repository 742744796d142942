//! Operator session tests driving the controller end to end

use std::sync::Arc;

use rs_trainz_base::{
    config::{Config, HornConfig},
    hal::MockTransport,
    CommandDispatcher, Error, HornMonitor, InteractiveController, LoopControl, UserAction,
};

fn setup() -> (InteractiveController<MockTransport>, MockTransport) {
    let transport = MockTransport::new();
    let wire = transport.clone();
    let target = Config::default().target.build();
    let dispatcher = Arc::new(CommandDispatcher::new(target, transport));
    (InteractiveController::new(dispatcher), wire)
}

fn drive(controller: &InteractiveController<MockTransport>, keys: &[&str]) -> LoopControl {
    let mut control = LoopControl::Continue;
    for key in keys {
        let action = UserAction::parse(key).unwrap();
        control = controller.handle(action).unwrap();
    }
    control
}

#[test]
fn typical_session() {
    let (c, wire) = setup();
    let control = drive(&c, &["w", "*10", "+", "+", "-", "1", " ", "t", "q"]);

    assert_eq!(control, LoopControl::Exit);
    assert_eq!(
        wire.frames(),
        vec![
            [0xFE, 0x0B, 0x80], // forward
            [0xFE, 0x0B, 0xEA], // speed 10
            [0xFE, 0x0B, 0xC6], // +
            [0xFE, 0x0B, 0xC6], // +
            [0xFE, 0x0B, 0xC4], // -
            [0xFE, 0x0B, 0x9C], // horn 1
            [0xFE, 0x0B, 0x87], // brake
            [0xFE, 0x0B, 0x81], // toggle
            [0xFE, 0xFF, 0xFF], // halt
        ]
    );
    assert_eq!(c.dispatcher().speed(), 0);
    assert!(c.dispatcher().is_halted());
}

#[test]
fn relative_steps_stop_at_bounds() {
    let (c, wire) = setup();
    drive(&c, &["*19", "+", "+", "+"]);
    assert_eq!(c.dispatcher().speed(), 20);
    assert_eq!(wire.frames().len(), 2);

    drive(&c, &["h", "-", "-"]);
    assert_eq!(c.dispatcher().speed(), 0);
    assert_eq!(wire.frames().len(), 3);
}

#[test]
fn reverse_speed_after_steps() {
    let (c, wire) = setup();
    drive(&c, &["*4", "+", "+", "r"]);
    let frames = wire.frames();
    assert_eq!(frames[frames.len() - 2..], [[0xFE, 0x0B, 0x81], [0xFE, 0x0B, 0xE6]]);
    assert_eq!(c.dispatcher().speed(), 6);
}

#[test]
fn invalid_input_sends_nothing() {
    let (_c, wire) = setup();
    for key in ["z", "**", "* x", ""] {
        assert!(matches!(UserAction::parse(key), Err(Error::InvalidUserInput(_))));
    }
    assert!(wire.frames().is_empty());
}

#[test]
fn write_failures_do_not_end_session() {
    let (c, wire) = setup();
    wire.fail_sends();

    let err = c.handle(UserAction::Boost).unwrap_err();
    assert!(matches!(err, Error::WriteFailed(_)));
    assert!(!err.is_fatal());

    wire.recover();
    assert_eq!(c.handle(UserAction::Boost).unwrap(), LoopControl::Continue);
    assert_eq!(wire.frames(), vec![[0xFE, 0x0B, 0x84]]);
}

#[test]
fn quit_stops_horn_monitor() {
    let (c, wire) = setup();
    let config = HornConfig::default().with_period_ms(1);
    let monitor = HornMonitor::new(Arc::clone(c.dispatcher()), &config)
        .spawn()
        .unwrap();

    drive(&c, &["*15"]);
    std::thread::sleep(std::time::Duration::from_millis(10));
    assert_eq!(drive(&c, &["q"]), LoopControl::Exit);

    let report = monitor.join().unwrap();
    assert_eq!(wire.last_frame(), Some([0xFE, 0xFF, 0xFF]));
    assert_eq!(wire.frames().len() as u64, 2 + report.horns);
}
