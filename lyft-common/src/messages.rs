//! Application and diagnostic messages exchanged with the desk motors
//!
//! Diagnostic requests are always 8 bytes and sent on [`LinAddress::DIAG_TX`]; the nodes answer
//! on [`LinAddress::DIAG_RX`]. During operation every frame carries 3 bytes: a little-endian
//! position followed by an instruction (master to motors) or a state code (motors to master).
//!
//! [`LinAddress::DIAG_TX`]: crate::lin::LinAddress::DIAG_TX
//! [`LinAddress::DIAG_RX`]: crate::lin::LinAddress::DIAG_RX
use snafu::Snafu;

use crate::constants::{diag_commands, registers, values};

/// Length of a diagnostic frame payload
pub const DIAG_PACKET_LEN: usize = 8;

/// Length of every payload exchanged during operation
pub const DESK_PACKET_LEN: usize = 3;

/// Payload of the periodic heartbeat frame
pub const HEARTBEAT: [u8; DESK_PACKET_LEN] = [0x00, 0x00, 0x00];

/// Error returned when a received payload cannot be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum MessageError {
    /// The payload length does not match the message
    #[snafu(display("Expected a {expected} byte payload, got {len}"))]
    UnexpectedLength {
        /// Required payload length
        expected: usize,
        /// Length which was received
        len: usize,
    },
    /// A command frame carried an instruction code which is not known
    #[snafu(display("Unknown instruction 0x{code:x}"))]
    UnknownInstruction {
        /// The instruction byte received
        code: u8,
    },
    /// A diagnostic response echoed a different register than the one requested
    #[snafu(display("Response for register 0x{found:x}, expected 0x{expected:x}"))]
    RegisterMismatch {
        /// Register which was requested
        expected: u8,
        /// Register found in the response
        found: u8,
    },
}

/// The limit/status registers read from each node during discovery, in the order they are read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeRegister {
    /// Status/capability byte
    Status,
    /// Upper limit, high byte
    UpperLimitHi,
    /// Upper limit, low byte
    UpperLimitLo,
    /// Lower limit, high byte
    LowerLimitHi,
    /// Lower limit, low byte
    LowerLimitLo,
}

impl NodeRegister {
    /// The register id used on the bus
    pub fn id(&self) -> u8 {
        match self {
            NodeRegister::Status => registers::STATUS,
            NodeRegister::UpperLimitHi => registers::UPPER_LIMIT_HI,
            NodeRegister::UpperLimitLo => registers::UPPER_LIMIT_LO,
            NodeRegister::LowerLimitHi => registers::LOWER_LIMIT_HI,
            NodeRegister::LowerLimitLo => registers::LOWER_LIMIT_LO,
        }
    }
}

/// A diagnostic request sent by the master during discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagRequest {
    /// Broadcast announcement of the diagnostic session
    Announcement,
    /// One of the two preprocessing frames sent before scanning
    Preprocessing {
        /// 1 or 2
        step: u8,
    },
    /// Probe a node address
    ScanNode {
        /// Candidate node address
        node: u8,
        /// Logical identifier assigned most recently
        identifier: u8,
        /// Whether any node has answered a scan yet
        found: bool,
    },
    /// Read one register from a node
    ReadRegister {
        /// Node address
        node: u8,
        /// Register to read
        register: NodeRegister,
    },
    /// Assign a logical identifier to a node
    WriteIdentifier {
        /// Node address
        node: u8,
        /// Identifier to assign
        identifier: u8,
    },
    /// One of the two postprocessing frames sent after scanning
    Postprocessing {
        /// 1 or 2
        step: u8,
        /// Whether any node has answered a scan
        found: bool,
    },
}

fn found_marker(found: bool) -> u8 {
    if found {
        values::NODE_FOUND
    } else {
        values::NO_NODE_FOUND
    }
}

impl DiagRequest {
    /// Encode the request into its 8 byte payload
    pub fn to_bytes(&self) -> [u8; DIAG_PACKET_LEN] {
        let mut buf = [values::FILLER; DIAG_PACKET_LEN];
        match *self {
            DiagRequest::Announcement => {
                buf[0] = values::BROADCAST;
                buf[1] = diag_commands::ANNOUNCE;
            }
            DiagRequest::Preprocessing { step } => {
                if step == 1 {
                    buf[0] = values::BROADCAST;
                    buf[1] = diag_commands::PREPARE;
                } else {
                    buf[0] = values::CONFIGURATION;
                    buf[1] = diag_commands::SCAN;
                }
                buf[2] = values::UNASSIGNED_IDENTIFIER;
            }
            DiagRequest::ScanNode {
                node,
                identifier,
                found,
            } => {
                buf[0] = node;
                buf[1] = diag_commands::SCAN;
                buf[2] = identifier;
                buf[3] = found_marker(found);
            }
            DiagRequest::ReadRegister { node, register } => {
                buf[0] = node;
                buf[1] = diag_commands::READ;
                buf[2] = register.id();
                buf[3] = 0x00;
            }
            DiagRequest::WriteIdentifier { node, identifier } => {
                buf[0] = node;
                buf[1] = diag_commands::WRITE;
                buf[2] = identifier;
                buf[3] = 0x00;
            }
            DiagRequest::Postprocessing { step, found } => {
                buf[0] = values::CONFIGURATION;
                buf[1] = if step == 1 {
                    diag_commands::PREPARE
                } else {
                    diag_commands::SCAN
                };
                buf[2] = values::UNASSIGNED_IDENTIFIER;
                buf[3] = found_marker(found);
            }
        }
        buf
    }
}

/// A diagnostic response: byte 0 echoes the register, byte 1 holds its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiagResponse {
    /// Echoed register id (or the write acknowledge marker)
    pub register: u8,
    /// Register value
    pub value: u8,
}

impl DiagResponse {
    /// Check that the response answers a read of `register`, and return its value
    pub fn value_of(&self, register: NodeRegister) -> Result<u8, MessageError> {
        if self.register == register.id() {
            Ok(self.value)
        } else {
            RegisterMismatchSnafu {
                expected: register.id(),
                found: self.register,
            }
            .fail()
        }
    }

    /// Returns true if this acknowledges an identifier write
    pub fn is_write_ack(&self) -> bool {
        self.register == values::WRITE_ACK
    }
}

impl TryFrom<&[u8]> for DiagResponse {
    type Error = MessageError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != DIAG_PACKET_LEN {
            return UnexpectedLengthSnafu {
                expected: DIAG_PACKET_LEN,
                len: value.len(),
            }
            .fail();
        }
        Ok(Self {
            register: value[0],
            value: value[1],
        })
    }
}

/// Motor instruction codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Instruction {
    /// Hold position
    Idle = 0xFC,
    /// Announce an upcoming move or calibration
    Announce = 0xC4,
    /// Run the calibration
    Calibrate = 0xBD,
    /// Leave calibration
    CalibrateStop = 0xBC,
    /// Drive up at full speed
    MoveUp = 0x86,
    /// Drive down at full speed
    MoveDown = 0x85,
    /// Drive slowly towards the commanded position
    MoveSlow = 0x87,
    /// Stop
    MoveStop = 0x84,
    /// Begin a move beyond a limit
    LimitStart = 0x80,
    /// Lower limit reached
    LimitLow = 0x81,
    /// Upper limit reached
    LimitHigh = 0x82,
    /// Release a motor reporting limit state A
    ReleaseLimitA = 0xBF,
    /// Release a motor reporting limit state B
    ReleaseLimitB = 0xFF,
}

impl Instruction {
    /// Decode an instruction byte
    pub fn from_byte(b: u8) -> Option<Self> {
        use Instruction::*;
        [
            Idle,
            Announce,
            Calibrate,
            CalibrateStop,
            MoveUp,
            MoveDown,
            MoveSlow,
            MoveStop,
            LimitStart,
            LimitLow,
            LimitHigh,
            ReleaseLimitA,
            ReleaseLimitB,
        ]
        .into_iter()
        .find(|i| *i as u8 == b)
    }
}

/// State codes reported by the motors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorState {
    /// Not moving
    Idle,
    /// Calibration has finished
    Calibrated,
    /// Moving at full speed
    Moving,
    /// Moving slowly
    MovingSlow,
    /// Calibration in progress
    Calibrating,
    /// Sitting at a limit (observed as 0xA5)
    LimitA,
    /// Sitting at a limit (observed as 0x25)
    LimitB,
    /// The motor is blocked
    Blocked,
    /// General error
    Error,
    /// Any other code
    Unknown(u8),
}

impl MotorState {
    /// Code for [`MotorState::Idle`]
    pub const IDLE: u8 = 0x00;
    /// Code for [`MotorState::Calibrated`]
    pub const CALIBRATED: u8 = 0x01;
    /// Code for [`MotorState::Moving`]
    pub const MOVING: u8 = 0x02;
    /// Code for [`MotorState::MovingSlow`]
    pub const MOVING_SLOW: u8 = 0x03;
    /// Code for [`MotorState::Calibrating`]
    pub const CALIBRATING: u8 = 0x04;
    /// Code for [`MotorState::LimitA`]
    pub const LIMIT_A: u8 = 0xA5;
    /// Code for [`MotorState::LimitB`]
    pub const LIMIT_B: u8 = 0x25;
    /// Code for [`MotorState::Blocked`]
    pub const BLOCKED: u8 = 0x62;
    /// Code for [`MotorState::Error`]
    pub const ERROR: u8 = 0x65;

    /// Get the raw state code
    pub fn code(&self) -> u8 {
        match self {
            MotorState::Idle => Self::IDLE,
            MotorState::Calibrated => Self::CALIBRATED,
            MotorState::Moving => Self::MOVING,
            MotorState::MovingSlow => Self::MOVING_SLOW,
            MotorState::Calibrating => Self::CALIBRATING,
            MotorState::LimitA => Self::LIMIT_A,
            MotorState::LimitB => Self::LIMIT_B,
            MotorState::Blocked => Self::BLOCKED,
            MotorState::Error => Self::ERROR,
            MotorState::Unknown(code) => *code,
        }
    }
}

impl From<u8> for MotorState {
    fn from(value: u8) -> Self {
        match value {
            Self::IDLE => MotorState::Idle,
            Self::CALIBRATED => MotorState::Calibrated,
            Self::MOVING => MotorState::Moving,
            Self::MOVING_SLOW => MotorState::MovingSlow,
            Self::CALIBRATING => MotorState::Calibrating,
            Self::LIMIT_A => MotorState::LimitA,
            Self::LIMIT_B => MotorState::LimitB,
            Self::BLOCKED => MotorState::Blocked,
            Self::ERROR => MotorState::Error,
            other => MotorState::Unknown(other),
        }
    }
}

/// Status frame reported by a motor: its position and state code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorStatus {
    /// Position in device units
    pub position: u16,
    /// Raw state code
    pub state: u8,
}

impl MotorStatus {
    /// Encode the status into a 3 byte payload
    pub fn to_bytes(&self) -> [u8; DESK_PACKET_LEN] {
        let [lo, hi] = self.position.to_le_bytes();
        [lo, hi, self.state]
    }
}

impl TryFrom<&[u8]> for MotorStatus {
    type Error = MessageError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != DESK_PACKET_LEN {
            return UnexpectedLengthSnafu {
                expected: DESK_PACKET_LEN,
                len: value.len(),
            }
            .fail();
        }
        Ok(Self {
            position: u16::from_le_bytes([value[0], value[1]]),
            state: value[2],
        })
    }
}

/// Command broadcast to both motors once per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorCommand {
    /// Reference position
    pub position: u16,
    /// Instruction to execute
    pub instruction: Instruction,
}

impl MotorCommand {
    /// Create a new command
    pub const fn new(position: u16, instruction: Instruction) -> Self {
        Self {
            position,
            instruction,
        }
    }

    /// Encode into the 3 byte payload: position low byte, position high byte, instruction
    pub fn to_bytes(&self) -> [u8; DESK_PACKET_LEN] {
        let [lo, hi] = self.position.to_le_bytes();
        [lo, hi, self.instruction as u8]
    }
}

impl TryFrom<&[u8]> for MotorCommand {
    type Error = MessageError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != DESK_PACKET_LEN {
            return UnexpectedLengthSnafu {
                expected: DESK_PACKET_LEN,
                len: value.len(),
            }
            .fail();
        }
        let instruction = Instruction::from_byte(value[2])
            .ok_or(MessageError::UnknownInstruction { code: value[2] })?;
        Ok(Self {
            position: u16::from_le_bytes([value[0], value[1]]),
            instruction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_request_layout() {
        assert_eq!(
            [0xFF, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            DiagRequest::Announcement.to_bytes()
        );
        assert_eq!(
            [0xFF, 0x01, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            DiagRequest::Preprocessing { step: 1 }.to_bytes()
        );
        assert_eq!(
            [0xD0, 0x02, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            DiagRequest::Preprocessing { step: 2 }.to_bytes()
        );
        assert_eq!(
            [0x03, 0x02, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            DiagRequest::ScanNode {
                node: 3,
                identifier: 0x07,
                found: false
            }
            .to_bytes()
        );
        assert_eq!(
            [0x05, 0x06, 0x0C, 0x00, 0xFF, 0xFF, 0xFF, 0xFF],
            DiagRequest::ReadRegister {
                node: 5,
                register: NodeRegister::UpperLimitHi
            }
            .to_bytes()
        );
        assert_eq!(
            [0x05, 0x04, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF],
            DiagRequest::WriteIdentifier {
                node: 5,
                identifier: 1
            }
            .to_bytes()
        );
        assert_eq!(
            [0xD0, 0x01, 0x07, 0x00, 0xFF, 0xFF, 0xFF, 0xFF],
            DiagRequest::Postprocessing {
                step: 1,
                found: true
            }
            .to_bytes()
        );
        assert_eq!(
            [0xD0, 0x02, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            DiagRequest::Postprocessing {
                step: 2,
                found: false
            }
            .to_bytes()
        );
    }

    #[test]
    fn test_diag_response_register_check() {
        let payload = [0x0A, 0x12, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let resp = DiagResponse::try_from(&payload[..]).unwrap();
        assert_eq!(Ok(0x12), resp.value_of(NodeRegister::LowerLimitHi));
        assert_eq!(
            Err(MessageError::RegisterMismatch {
                expected: 0x0B,
                found: 0x0A
            }),
            resp.value_of(NodeRegister::LowerLimitLo)
        );
        assert!(DiagResponse::try_from(&payload[..3]).is_err());
    }

    #[test]
    fn test_motor_status_little_endian() {
        let status = MotorStatus::try_from(&[0x34, 0x12, 0x62][..]).unwrap();
        assert_eq!(0x1234, status.position);
        assert_eq!(MotorState::Blocked, MotorState::from(status.state));
        assert_eq!(
            Err(MessageError::UnexpectedLength {
                expected: 3,
                len: 2
            }),
            MotorStatus::try_from(&[0x34, 0x12][..])
        );
    }

    #[test]
    fn test_motor_command_encoding() {
        let cmd = MotorCommand::new(0x0190, Instruction::MoveUp);
        assert_eq!([0x90, 0x01, 0x86], cmd.to_bytes());
        assert_eq!(Ok(cmd), MotorCommand::try_from(&cmd.to_bytes()[..]));
        assert_eq!(Some(Instruction::ReleaseLimitB), Instruction::from_byte(0xFF));
        assert_eq!(None, Instruction::from_byte(0x00));
    }

    #[test]
    fn test_motor_state_codes() {
        for code in [0x00, 0x01, 0x02, 0x03, 0x04, 0x25, 0x62, 0x65, 0xA5, 0x77] {
            assert_eq!(code, MotorState::from(code).code());
        }
        assert_eq!(MotorState::Unknown(0x77), MotorState::from(0x77));
    }
}
