mod utils;

use assertables::assert_lt;
use integration_tests::sim_bus::{SimBus, SimMotor};
use lyft_common::{DeskConfig, DeskMode, OperationPhase};
use lyft_controller::{Desk, SharedDesk};
use utils::{BusLogger, DISCOVERY_TICKS};

static DESK: SharedDesk = SharedDesk::new(DeskConfig::DEFAULT);

fn two_motors() -> Vec<SimMotor> {
    vec![
        SimMotor::new(0, 300, 6500, 800),
        SimMotor::new(1, 300, 6500, 810),
    ]
}

#[test]
fn test_shared_desk_discovery() {
    let mut bus = SimBus::new(two_motors());
    let _logger = BusLogger::new(bus.frame_log());

    DESK.with(|desk| {
        desk.init(&mut bus, true);
        desk.start_discovery()
    })
    .unwrap();

    let mut ticks: usize = 0;
    while DESK.with(|desk| desk.mode()) != DeskMode::Operation(OperationPhase::Normal) {
        assert_lt!(ticks, DISCOVERY_TICKS);
        DESK.with(|desk| bus.tick(desk));
        ticks += 1;
    }

    DESK.with(|desk| {
        assert_eq!(Ok((300, 6500)), desk.checked_limits());
        assert_eq!(Ok(800), desk.checked_position());
        assert_eq!(10, desk.drift());
    });
}

#[test]
fn test_discovery_without_echo() {
    let mut bus = SimBus::new(two_motors()).with_echo(false);
    let _logger = BusLogger::new(bus.frame_log());
    let mut desk = Desk::default();
    desk.init(&mut bus, true);
    desk.start_discovery().unwrap();

    bus.run_until(&mut desk, DISCOVERY_TICKS, |d| {
        d.mode() == DeskMode::Operation(OperationPhase::Normal)
    })
    .expect("Discovery did not finish");
    assert_eq!(810, desk.motor_position(1));
}
