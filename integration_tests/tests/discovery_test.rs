mod utils;

use integration_tests::sim_bus::{FrameKind, SimBus};
use lyft_common::{
    constants::diag_commands,
    lin::LinAddress,
    messages::{DiagRequest, MotorState},
    DeskConfig, DeskMode, OperationPhase, StartupPhase,
};
use lyft_controller::Desk;
use utils::{
    command_instructions, diag_requests, discover, setup_desk, BusLogger, LEFT_SCAN_ADDRESS,
    RIGHT_SCAN_ADDRESS,
};

fn announcements(bus: &SimBus) -> usize {
    diag_requests(&bus.frames())
        .iter()
        .filter(|f| f.data[1] == diag_commands::ANNOUNCE)
        .count()
}

#[test]
fn test_discover_two_motors() {
    let (mut desk, mut bus) = setup_desk(DeskConfig::DEFAULT, 1000);
    let _logger = BusLogger::new(bus.frame_log());

    discover(&mut desk, &mut bus);

    assert_eq!(Some(0), bus.motor(0).identifier);
    assert_eq!(Some(1), bus.motor(1).identifier);

    assert_eq!(LEFT_SCAN_ADDRESS, desk.motor_scan_address(0));
    assert_eq!(RIGHT_SCAN_ADDRESS, desk.motor_scan_address(1));
    assert_eq!(0x5A, desk.motor_capability(0));
    assert_eq!(6500, desk.motor_upper_limit(0));
    assert_eq!(300, desk.motor_lower_limit(0));
    assert_eq!(6400, desk.motor_upper_limit(1));
    assert_eq!(320, desk.motor_lower_limit(1));
    assert_eq!(Ok((320, 6400)), desk.checked_limits());
    assert_eq!(Ok(1000), desk.checked_position());
    assert_eq!(1000, desk.motor_position(1));
    assert_eq!(0, desk.drift());
}

#[test]
fn test_discovery_probes_every_candidate() {
    let (mut desk, mut bus) = setup_desk(DeskConfig::DEFAULT, 1000);
    let _logger = BusLogger::new(bus.frame_log());

    discover(&mut desk, &mut bus);

    let frames = bus.frames();
    let requests = diag_requests(&frames);
    let scanned: Vec<u8> = requests
        .iter()
        .filter(|f| f.data[1] == diag_commands::SCAN && f.data[0] < 8)
        .map(|f| f.data[0])
        .collect();
    assert_eq!(vec![0, 1, 2, 3, 4, 5, 6, 7], scanned);

    let assigned: Vec<(u8, u8)> = requests
        .iter()
        .filter(|f| f.data[1] == diag_commands::WRITE)
        .map(|f| (f.data[0], f.data[2]))
        .collect();
    assert_eq!(
        vec![(LEFT_SCAN_ADDRESS, 0), (RIGHT_SCAN_ADDRESS, 1)],
        assigned
    );
}

#[test]
fn test_discovery_step_timing() {
    let (mut desk, mut bus) = setup_desk(DeskConfig::DEFAULT, 1000);
    let _logger = BusLogger::new(bus.frame_log());

    desk.start_discovery().unwrap();
    assert_eq!(DeskMode::Startup(StartupPhase::Begin), desk.mode());
    assert!(desk.is_busy());
    assert!(desk.start_discovery().is_err());

    bus.run(&mut desk, 2);
    assert_eq!(DeskMode::Startup(StartupPhase::Begin), desk.mode());
    assert!(bus.frames().is_empty());

    bus.run(&mut desk, 1);
    assert_eq!(
        DeskMode::Startup(StartupPhase::AnnouncementOne),
        desk.mode()
    );
    bus.run(&mut desk, 4);
    assert_eq!(
        DeskMode::Startup(StartupPhase::AnnouncementOne),
        desk.mode()
    );
    bus.run(&mut desk, 1);
    assert_eq!(
        DeskMode::Startup(StartupPhase::AnnouncementTwo),
        desk.mode()
    );

    let frames = bus.frames();
    let timeline: Vec<(usize, u8, FrameKind)> = frames
        .iter()
        .map(|f| (f.tick, f.address, f.kind))
        .collect();
    assert_eq!(
        vec![
            (2, LinAddress::DIAG_TX.raw(), FrameKind::Write),
            (4, LinAddress::DIAG_RX.raw(), FrameKind::Read),
            (7, LinAddress::DIAG_TX.raw(), FrameKind::Write),
        ],
        timeline
    );
    assert_eq!(
        DiagRequest::Announcement.to_bytes().to_vec(),
        frames[0].data
    );
}

#[test]
fn test_discovery_restarts_after_retry_limit() {
    let (mut desk, mut bus) = setup_desk(DeskConfig::DEFAULT, 1000);
    let _logger = BusLogger::new(bus.frame_log());
    bus.motors()[0].mute_reads = 3;

    discover(&mut desk, &mut bus);

    assert_eq!(4, announcements(&bus));
    assert_eq!(Ok((320, 6400)), desk.checked_limits());
}

#[test]
fn test_discovery_retries_unanswered_read() {
    let (mut desk, mut bus) = setup_desk(DeskConfig::DEFAULT, 1000);
    let _logger = BusLogger::new(bus.frame_log());
    bus.motors()[1].mute_reads = 2;

    discover(&mut desk, &mut bus);

    assert_eq!(2, announcements(&bus));
    assert_eq!(Ok((320, 6400)), desk.checked_limits());
}

#[test]
fn test_discovery_without_nodes_keeps_scanning() {
    let mut bus = SimBus::new(vec![]);
    let mut desk = Desk::default();
    desk.init(&mut bus, true);
    desk.start_discovery().unwrap();

    bus.run(&mut desk, 300);

    assert!(matches!(desk.mode(), DeskMode::Startup(_)));
    assert!(desk.is_busy());
    assert!(desk.checked_position().is_err());
    let first_probes = diag_requests(&bus.frames())
        .iter()
        .filter(|f| f.data[0] == 0 && f.data[1] == diag_commands::SCAN)
        .count();
    assert!(first_probes >= 2);
    assert_eq!(2, announcements(&bus));
}

#[test]
fn test_release_limit_after_discovery() {
    let (mut desk, mut bus) = setup_desk(DeskConfig::DEFAULT, 1000);
    let _logger = BusLogger::new(bus.frame_log());
    bus.motors()[0].state = MotorState::LIMIT_A;

    desk.start_discovery().unwrap();
    bus.run_until(&mut desk, 1000, |d| {
        d.mode() == DeskMode::Operation(OperationPhase::Begin)
    })
    .unwrap();
    bus.clear_frames();
    bus.run_until(&mut desk, 100, |d| {
        d.mode() == DeskMode::Operation(OperationPhase::Normal)
    })
    .unwrap();

    let frames = bus.frames();
    let command = frames
        .iter()
        .find(|f| f.instruction().is_some())
        .expect("No command sent");
    assert_eq!(vec![0xF6, 0xFF, 0xBF], command.data);
    assert_eq!(MotorState::IDLE, bus.motor(0).state);
    assert_eq!(vec![0xBF], command_instructions(&frames));
}
