#![allow(dead_code)]
use integration_tests::sim_bus::{FrameKind, FrameLog, FrameRecord, SimBus, SimMotor};
use lyft_common::{lin::LinAddress, DeskConfig, DeskMode, OperationPhase};
use lyft_controller::Desk;

/// Maximum number of ticks a discovery with two motors is allowed to take
pub const DISCOVERY_TICKS: usize = 1000;

pub const LEFT_SCAN_ADDRESS: u8 = 2;
pub const RIGHT_SCAN_ADDRESS: u8 = 5;

/// Create a desk, and a bus with two motors standing at `position`
///
/// The left motor supports 300..=6500 and the right one 320..=6400.
pub fn setup_desk(config: DeskConfig, position: u16) -> (Desk, SimBus) {
    let motors = vec![
        SimMotor::new(LEFT_SCAN_ADDRESS, 300, 6500, position),
        SimMotor::new(RIGHT_SCAN_ADDRESS, 320, 6400, position),
    ];
    let mut bus = SimBus::new(motors);
    let mut desk = Desk::new(config);
    desk.init(&mut bus, true);
    (desk, bus)
}

/// Run discovery, and then let the desk settle into normal operation
pub fn discover(desk: &mut Desk, bus: &mut SimBus) {
    desk.start_discovery().unwrap();
    bus.run_until(desk, DISCOVERY_TICKS, |d| {
        d.mode() == DeskMode::Operation(OperationPhase::Normal)
    })
    .expect("Desk did not reach normal operation");
}

/// Run until the start of the next bus cycle
pub fn align_to_cycle(desk: &mut Desk, bus: &mut SimBus) {
    bus.run_until(desk, 20, |d| d.operation().tick() == 0)
        .expect("Operation cycle did not wrap");
}

/// The instructions of all motor commands in the log
pub fn command_instructions(frames: &[FrameRecord]) -> Vec<u8> {
    frames.iter().filter_map(|f| f.instruction()).collect()
}

/// All writes to the diagnostic request address
pub fn diag_requests(frames: &[FrameRecord]) -> Vec<&FrameRecord> {
    frames
        .iter()
        .filter(|f| f.kind == FrameKind::Write && f.address == LinAddress::DIAG_TX.raw())
        .collect()
}

pub struct BusLogger {
    log: FrameLog,
}

impl BusLogger {
    pub fn new(log: FrameLog) -> Self {
        Self { log }
    }

    pub fn print(&mut self) {
        println!("Bus frame history");
        println!("-----------------");
        for frame in self.log.borrow().iter() {
            println!("{frame}");
        }
    }
}

impl Drop for BusLogger {
    fn drop(&mut self) {
        self.print();
    }
}
