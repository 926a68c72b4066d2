//! Per node and per motor records
use lyft_common::{
    lin::LinAddress,
    messages::{MotorState, MotorStatus, NodeRegister},
};

/// Number of motor units driven by the controller
pub const NUM_MOTORS: usize = 2;

/// Identifies one of the two motor units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorUnit {
    /// Left motor, application address 8
    Left = 0,
    /// Right motor, application address 9
    Right = 1,
}

impl MotorUnit {
    /// Both units, in index order
    pub const ALL: [MotorUnit; NUM_MOTORS] = [MotorUnit::Left, MotorUnit::Right];

    /// Get the unit for a raw index, as used by the host protocol
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(MotorUnit::Left),
            1 => Some(MotorUnit::Right),
            _ => None,
        }
    }

    /// The address the unit is polled on during operation
    pub fn address(&self) -> LinAddress {
        match self {
            MotorUnit::Left => LinAddress::MOTOR_LEFT,
            MotorUnit::Right => LinAddress::MOTOR_RIGHT,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Raw data read from a node during discovery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeRecord {
    /// Address the node answered a scan on
    pub scan_address: u8,
    /// Status/capability byte
    pub capability: u8,
    /// High byte of the upper limit
    pub upper_limit_hi: u8,
    /// Low byte of the upper limit
    pub upper_limit_lo: u8,
    /// High byte of the lower limit
    pub lower_limit_hi: u8,
    /// Low byte of the lower limit
    pub lower_limit_lo: u8,
}

impl NodeRecord {
    /// Store the value read from `register`
    pub fn set_register(&mut self, register: NodeRegister, value: u8) {
        match register {
            NodeRegister::Status => self.capability = value,
            NodeRegister::UpperLimitHi => self.upper_limit_hi = value,
            NodeRegister::UpperLimitLo => self.upper_limit_lo = value,
            NodeRegister::LowerLimitHi => self.lower_limit_hi = value,
            NodeRegister::LowerLimitLo => self.lower_limit_lo = value,
        }
    }

    /// Upper limit assembled from its two register bytes
    pub fn upper_limit(&self) -> u16 {
        u16::from_be_bytes([self.upper_limit_hi, self.upper_limit_lo])
    }

    /// Lower limit assembled from its two register bytes
    pub fn lower_limit(&self) -> u16 {
        u16::from_be_bytes([self.lower_limit_hi, self.lower_limit_lo])
    }
}

/// Everything known about one motor unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorRecord {
    /// Application address
    pub address: LinAddress,
    /// Address the node answered the discovery scan on
    pub scan_address: u8,
    /// Last reported state code
    pub state: u8,
    /// Last reported position
    pub position: u16,
    /// Status/capability byte read during discovery
    pub capability: u8,
    /// Number of consecutive polls without a valid status
    pub outage: u8,
    /// Lowest position the motor supports
    pub lower_limit: u16,
    /// Highest position the motor supports
    pub upper_limit: u16,
}

impl MotorRecord {
    const fn new(address: LinAddress) -> Self {
        Self {
            address,
            scan_address: 0,
            state: 0,
            position: 0,
            capability: 0,
            outage: 0,
            lower_limit: 0,
            upper_limit: 0,
        }
    }

    /// Decoded state
    pub fn motor_state(&self) -> MotorState {
        MotorState::from(self.state)
    }

    /// True when the last poll returned a valid status
    pub fn is_healthy(&self) -> bool {
        self.outage == 0
    }

    /// Apply the outcome of a status poll
    ///
    /// A valid status replaces the stored position and state. Otherwise the previous values are
    /// kept and the outage counter is incremented.
    pub fn update(&mut self, status: Option<MotorStatus>) {
        match status {
            Some(status) => {
                self.outage = 0;
                self.position = status.position;
                self.state = status.state;
            }
            None => self.outage = self.outage.saturating_add(1),
        }
    }
}

/// Node records collected during discovery, and the motor records built from them
#[derive(Debug, Clone)]
pub struct Registry {
    nodes: [NodeRecord; NUM_MOTORS],
    motors: [MotorRecord; NUM_MOTORS],
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            nodes: [NodeRecord {
                scan_address: 0,
                capability: 0,
                upper_limit_hi: 0,
                upper_limit_lo: 0,
                lower_limit_hi: 0,
                lower_limit_lo: 0,
            }; NUM_MOTORS],
            motors: [
                MotorRecord::new(LinAddress::MOTOR_LEFT),
                MotorRecord::new(LinAddress::MOTOR_RIGHT),
            ],
        }
    }

    /// Clear all node and motor records
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Clear the node records only
    pub fn reset_nodes(&mut self) {
        self.nodes = [NodeRecord::default(); NUM_MOTORS];
    }

    /// Get the node record for a logical identifier, if there is a slot for it
    pub fn node(&self, identifier: u8) -> Option<&NodeRecord> {
        self.nodes.get(identifier as usize)
    }

    /// Get the node record for a logical identifier mutably, if there is a slot for it
    pub fn node_mut(&mut self, identifier: u8) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(identifier as usize)
    }

    /// Build the motor records from the node records
    ///
    /// The first node found becomes the left motor, the second the right.
    pub fn build_motors(&mut self) {
        for (motor, node) in self.motors.iter_mut().zip(self.nodes.iter()) {
            motor.scan_address = node.scan_address;
            motor.capability = node.capability;
            motor.outage = 0;
            motor.lower_limit = node.lower_limit();
            motor.upper_limit = node.upper_limit();
        }
    }

    /// Get a motor record
    pub fn motor(&self, unit: MotorUnit) -> &MotorRecord {
        &self.motors[unit.index()]
    }

    /// Get a motor record mutably
    pub fn motor_mut(&mut self, unit: MotorUnit) -> &mut MotorRecord {
        &mut self.motors[unit.index()]
    }

    /// Iterate over both motor records
    pub fn motors(&self) -> impl Iterator<Item = &MotorRecord> {
        self.motors.iter()
    }

    /// Returns true if any motor reports `state`
    pub fn any_in_state(&self, state: MotorState) -> bool {
        self.motors().any(|m| m.motor_state() == state)
    }

    /// Returns true if both motors report `state`
    pub fn all_in_state(&self, state: MotorState) -> bool {
        self.motors().all(|m| m.motor_state() == state)
    }

    /// Desk wide limits: the higher of the lower limits and the lower of the upper limits
    pub fn desk_limits(&self) -> (u16, u16) {
        let left = self.motor(MotorUnit::Left);
        let right = self.motor(MotorUnit::Right);
        (
            left.lower_limit.max(right.lower_limit),
            left.upper_limit.min(right.upper_limit),
        )
    }

    fn synchronized(&self, pick: fn(u16, u16) -> u16) -> Option<u16> {
        let left = self.motor(MotorUnit::Left);
        let right = self.motor(MotorUnit::Right);
        match (left.is_healthy(), right.is_healthy()) {
            (true, true) => Some(pick(left.position, right.position)),
            (true, false) => Some(left.position),
            (false, true) => Some(right.position),
            (false, false) => None,
        }
    }

    /// The position of the lower motor, ignoring motors in outage
    ///
    /// Returns None if neither motor reported a valid status in its last poll.
    pub fn lower_position(&self) -> Option<u16> {
        self.synchronized(u16::min)
    }

    /// The position of the higher motor, ignoring motors in outage
    ///
    /// Returns None if neither motor reported a valid status in its last poll.
    pub fn higher_position(&self) -> Option<u16> {
        self.synchronized(u16::max)
    }

    /// Absolute difference between the last known positions of both motors
    pub fn drift(&self) -> u16 {
        self.motor(MotorUnit::Left)
            .position
            .abs_diff(self.motor(MotorUnit::Right).position)
    }
}
