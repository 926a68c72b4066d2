use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

use lyft_common::{
    constants::{diag_commands, registers, values},
    lin::{checksum_classic, checksum_enhanced, ChecksumKind, LinAddress},
    messages::{Instruction, MotorState, DESK_PACKET_LEN, DIAG_PACKET_LEN},
    traits::LinUart,
};
use lyft_controller::Desk;

/// An event raised by the simulated UART, to be handed to the desk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    TxComplete,
    RxByte(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Master header and payload
    Write,
    /// Master header, and the slave response if there was one
    Read,
}

/// One frame seen on the simulated bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Bus tick the frame was started in
    pub tick: usize,
    pub address: u8,
    pub kind: FrameKind,
    /// Payload for writes; response bytes, including the checksum, for reads
    pub data: Vec<u8>,
}

impl FrameRecord {
    /// The motor command instruction, if this is a command frame
    pub fn instruction(&self) -> Option<u8> {
        if self.kind == FrameKind::Write && self.address == LinAddress::MASTER.raw() {
            self.data.get(2).copied()
        } else {
            None
        }
    }
}

impl fmt::Display for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FrameKind::Write => "W",
            FrameKind::Read => "R",
        };
        write!(
            f,
            "{:>6} {} 0x{:02x} {:02x?}",
            self.tick, kind, self.address, self.data
        )
    }
}

pub type FrameLog = Rc<RefCell<Vec<FrameRecord>>>;

/// A simulated motor node
///
/// It answers the discovery requests addressed to its scan address, and once it has been assigned
/// an identifier it reports its status on address 8 + identifier and follows the master commands.
#[derive(Debug, Clone)]
pub struct SimMotor {
    pub scan_address: u8,
    pub capability: u8,
    pub lower_limit: u16,
    pub upper_limit: u16,
    pub position: u16,
    pub state: u8,
    pub identifier: Option<u8>,
    /// Distance travelled per full speed command
    pub speed: u16,
    /// Distance travelled per slow command
    pub slow_speed: u16,
    /// Position at which the motor blocks when moving up
    pub block_at: Option<u16>,
    /// Number of register reads to leave unanswered
    pub mute_reads: usize,
    /// Number of status responses to send with a bad checksum
    pub corrupt_status: usize,
    /// All commands received, as (position, instruction)
    pub commands: Vec<(u16, u8)>,
    pending_diag: Option<[u8; DIAG_PACKET_LEN]>,
}

impl SimMotor {
    pub fn new(scan_address: u8, lower_limit: u16, upper_limit: u16, position: u16) -> Self {
        Self {
            scan_address,
            capability: 0x5A,
            lower_limit,
            upper_limit,
            position,
            state: MotorState::IDLE,
            identifier: None,
            speed: 50,
            slow_speed: 10,
            block_at: None,
            mute_reads: 0,
            corrupt_status: 0,
            commands: Vec::new(),
            pending_diag: None,
        }
    }

    /// The address the motor reports its status on, once it has an identifier
    pub fn app_address(&self) -> Option<u8> {
        self.identifier
            .map(|id| LinAddress::MOTOR_LEFT.raw() + id)
    }

    fn handle_diag(&mut self, payload: &[u8]) {
        let node = payload[0];
        if node != self.scan_address {
            return;
        }
        let mut response = [values::FILLER; DIAG_PACKET_LEN];
        match payload[1] {
            diag_commands::SCAN => {
                response[0] = node;
                response[1] = diag_commands::SCAN;
            }
            diag_commands::READ => {
                if self.mute_reads > 0 {
                    self.mute_reads -= 1;
                    return;
                }
                let register = payload[2];
                response[0] = register;
                response[1] = match register {
                    registers::STATUS => self.capability,
                    registers::UPPER_LIMIT_HI => self.upper_limit.to_be_bytes()[0],
                    registers::UPPER_LIMIT_LO => self.upper_limit.to_be_bytes()[1],
                    registers::LOWER_LIMIT_HI => self.lower_limit.to_be_bytes()[0],
                    registers::LOWER_LIMIT_LO => self.lower_limit.to_be_bytes()[1],
                    _ => 0,
                };
            }
            diag_commands::WRITE => {
                self.identifier = Some(payload[2]);
                response[0] = values::WRITE_ACK;
                response[1] = payload[2];
            }
            _ => return,
        }
        self.pending_diag = Some(response);
    }

    fn take_diag_response(&mut self) -> Option<Vec<u8>> {
        let data = self.pending_diag.take()?;
        let mut bytes = data.to_vec();
        bytes.push(checksum_classic(&data));
        Some(bytes)
    }

    fn status_response(&mut self, pid: u8) -> Vec<u8> {
        let [lo, hi] = self.position.to_le_bytes();
        let mut bytes = vec![lo, hi, self.state];
        let mut checksum = checksum_enhanced(pid, &bytes);
        if self.corrupt_status > 0 {
            self.corrupt_status -= 1;
            checksum ^= 0xFF;
        }
        bytes.push(checksum);
        bytes
    }

    fn handle_command(&mut self, payload: &[u8]) {
        let position = u16::from_le_bytes([payload[0], payload[1]]);
        self.commands.push((position, payload[2]));
        let Some(instruction) = Instruction::from_byte(payload[2]) else {
            return;
        };
        match instruction {
            Instruction::MoveUp => {
                if self.state == MotorState::BLOCKED {
                    return;
                }
                self.state = MotorState::MOVING;
                self.position = self
                    .position
                    .saturating_add(self.speed)
                    .min(self.upper_limit);
                if let Some(block) = self.block_at {
                    if self.position >= block {
                        self.position = block;
                        self.state = MotorState::BLOCKED;
                    }
                }
            }
            Instruction::MoveDown => {
                self.state = MotorState::MOVING;
                self.position = self
                    .position
                    .saturating_sub(self.speed)
                    .max(self.lower_limit);
            }
            Instruction::MoveSlow => {
                self.state = MotorState::MOVING_SLOW;
                if position > self.position {
                    self.position += (position - self.position).min(self.slow_speed);
                } else {
                    self.position -= (self.position - position).min(self.slow_speed);
                }
            }
            Instruction::Calibrate => {
                self.position = self.position.saturating_sub(self.speed);
                self.state = if self.position == 0 {
                    MotorState::CALIBRATED
                } else {
                    MotorState::CALIBRATING
                };
            }
            Instruction::MoveStop
            | Instruction::Idle
            | Instruction::CalibrateStop
            | Instruction::ReleaseLimitA
            | Instruction::ReleaseLimitB => self.state = MotorState::IDLE,
            _ => (),
        }
    }
}

fn is_master_frame(address: LinAddress) -> bool {
    address == LinAddress::DIAG_TX
        || address == LinAddress::HEARTBEAT
        || address == LinAddress::MASTER
}

/// A simulated LIN bus with motor nodes attached
///
/// The bus implements [`LinUart`] for the desk. Every byte written raises a transmit-complete
/// event, and the slave responses are delivered as received bytes once the desk enables
/// receiving. Events are queued, and handed to the desk by [`SimBus::process`].
#[derive(Debug)]
pub struct SimBus {
    motors: Vec<SimMotor>,
    events: VecDeque<BusEvent>,
    tx_bytes: Vec<u8>,
    header: Option<LinAddress>,
    response: Option<Vec<u8>>,
    receive_enabled: bool,
    echo: bool,
    tick: usize,
    log: FrameLog,
}

impl SimBus {
    pub fn new(motors: Vec<SimMotor>) -> Self {
        Self {
            motors,
            events: VecDeque::new(),
            tx_bytes: Vec::new(),
            header: None,
            response: None,
            receive_enabled: false,
            echo: true,
            tick: 0,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Enable or disable reading back the identifier byte after each header
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Accessor to allow tests to access motors on the bus while they are owned by the SimBus
    pub fn motors(&mut self) -> &mut [SimMotor] {
        &mut self.motors
    }

    pub fn motor(&self, idx: usize) -> &SimMotor {
        &self.motors[idx]
    }

    /// Get a shared handle to the frame history
    pub fn frame_log(&self) -> FrameLog {
        self.log.clone()
    }

    /// Snapshot of the frame history
    pub fn frames(&self) -> Vec<FrameRecord> {
        self.log.borrow().clone()
    }

    pub fn clear_frames(&self) {
        self.log.borrow_mut().clear();
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> usize {
        self.tick
    }

    /// Deliver all queued UART events to the desk
    pub fn process(&mut self, desk: &mut Desk) {
        while let Some(event) = self.events.pop_front() {
            match event {
                BusEvent::TxComplete => desk.on_tx_complete(self),
                BusEvent::RxByte(b) => {
                    if self.receive_enabled {
                        desk.on_rx_byte(b)
                    }
                }
            }
        }
    }

    /// Run a single desk tick, and deliver the resulting bus traffic
    pub fn tick(&mut self, desk: &mut Desk) {
        desk.tick(self);
        self.process(desk);
        self.tick += 1;
    }

    /// Run `n` desk ticks
    pub fn run(&mut self, desk: &mut Desk, n: usize) {
        for _ in 0..n {
            self.tick(desk);
        }
    }

    /// Run ticks until `cond` holds, giving up after `max_ticks`
    ///
    /// Returns the number of ticks run, or None if the condition never held.
    pub fn run_until(
        &mut self,
        desk: &mut Desk,
        max_ticks: usize,
        mut cond: impl FnMut(&Desk) -> bool,
    ) -> Option<usize> {
        for i in 0..max_ticks {
            if cond(desk) {
                return Some(i);
            }
            self.tick(desk);
        }
        cond(desk).then_some(max_ticks)
    }

    fn record(&self, address: LinAddress, kind: FrameKind, data: Vec<u8>) {
        self.log.borrow_mut().push(FrameRecord {
            tick: self.tick,
            address: address.raw(),
            kind,
            data,
        });
    }

    fn slave_response(&mut self, address: LinAddress) -> Option<Vec<u8>> {
        if address == LinAddress::DIAG_RX {
            self.motors
                .iter_mut()
                .find_map(|m| m.take_diag_response())
        } else {
            let pid = address.protected_id();
            self.motors
                .iter_mut()
                .find(|m| m.app_address() == Some(address.raw()))
                .map(|m| m.status_response(pid))
        }
    }

    fn header_complete(&mut self, pid: u8) {
        self.header = LinAddress::from_protected_id(pid);
        let Some(address) = self.header else {
            return;
        };
        if !is_master_frame(address) {
            self.response = self.slave_response(address);
            let data = self.response.clone().unwrap_or_default();
            self.record(address, FrameKind::Read, data);
        }
    }

    fn check_frame_complete(&mut self) {
        let Some(address) = self.header else {
            return;
        };
        if !is_master_frame(address) {
            return;
        }
        let len = if address == LinAddress::DIAG_TX {
            DIAG_PACKET_LEN
        } else {
            DESK_PACKET_LEN
        };
        if self.tx_bytes.len() != 3 + len + 1 {
            return;
        }
        let pid = self.tx_bytes[2];
        let payload = self.tx_bytes[3..3 + len].to_vec();
        let checksum = self.tx_bytes[3 + len];
        self.record(address, FrameKind::Write, payload.clone());
        if ChecksumKind::for_transmit(address).compute(pid, &payload) != checksum {
            println!("Dropping frame with bad checksum to 0x{:02x}", address.raw());
            return;
        }
        for motor in self.motors.iter_mut() {
            if address == LinAddress::DIAG_TX {
                motor.handle_diag(&payload);
            } else if address == LinAddress::MASTER {
                motor.handle_command(&payload);
            }
        }
    }
}

impl LinUart for SimBus {
    fn send_break(&mut self) {
        self.tx_bytes.clear();
        self.header = None;
        self.response = None;
    }

    fn write_byte(&mut self, byte: u8) {
        self.tx_bytes.push(byte);
        self.events.push_back(BusEvent::TxComplete);
        // break char, sync, identifier
        if self.tx_bytes.len() == 3 {
            self.header_complete(byte);
        } else {
            self.check_frame_complete();
        }
    }

    fn enable_receive(&mut self) {
        self.receive_enabled = true;
        if let Some(address) = self.header {
            if self.echo {
                self.events
                    .push_back(BusEvent::RxByte(address.protected_id()));
            }
        }
        if let Some(response) = self.response.take() {
            self.events
                .extend(response.into_iter().map(BusEvent::RxByte));
        }
    }

    fn disable_receive(&mut self) {
        self.receive_enabled = false;
    }
}
