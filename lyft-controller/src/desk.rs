//! The desk object, and the context shared by its controllers
use defmt_or_log::info;
use lyft_common::{
    traits::LinUart, DeskConfig, DeskError, DeskMode, ModeCategory, OperationPhase, StartupPhase,
};

use crate::{
    discovery::Discovery,
    operation::Operation,
    registry::{MotorRecord, MotorUnit, Registry},
    transport::LinMaster,
};

/// Value returned by the byte sized motor queries for an unknown unit
pub const INVALID_BYTE: u8 = 0xFF;
/// Value returned by the 16-bit motor queries for an unknown unit
pub const INVALID_WORD: u16 = 0xFFFF;

/// Desk wide state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeskState {
    /// Current operating mode
    pub mode: DeskMode,
    /// A calibration has been requested and not yet completed
    pub calibrate: bool,
    /// Lowest position the desk may be moved to
    pub lower_limit: u16,
    /// Highest position the desk may be moved to
    pub upper_limit: u16,
    /// Position of the desk, as reported by the left motor
    pub current_position: u16,
    /// Position the desk is moving towards
    pub target_position: u16,
}

impl DeskState {
    const fn new() -> Self {
        Self {
            mode: DeskMode::Idle,
            calibrate: false,
            lower_limit: 0,
            upper_limit: 0,
            current_position: 0,
            target_position: 0,
        }
    }
}

impl Default for DeskState {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the discovery and operation controllers act on
#[derive(Debug)]
pub struct DeskContext {
    /// The bus transport
    pub bus: LinMaster,
    /// Node and motor records
    pub registry: Registry,
    /// Desk wide state
    pub state: DeskState,
    /// The bus schedule is active and the host must not be served
    pub busy: bool,
}

impl Default for DeskContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DeskContext {
    /// Create a new context with the transport disabled
    pub const fn new() -> Self {
        Self {
            bus: LinMaster::new(),
            registry: Registry::new(),
            state: DeskState::new(),
            busy: false,
        }
    }
}

/// A dual motor standing desk
///
/// The desk must be ticked periodically with [`Desk::tick`], and the UART events have to be
/// forwarded to [`Desk::on_tx_complete`] and [`Desk::on_rx_byte`]. Host commands should only be
/// served while [`Desk::is_busy`] returns false.
#[derive(Debug)]
pub struct Desk {
    ctx: DeskContext,
    discovery: Discovery,
    operation: Operation,
    config: DeskConfig,
}

impl Default for Desk {
    fn default() -> Self {
        Self::new(DeskConfig::DEFAULT)
    }
}

impl Desk {
    /// Create a new desk
    pub const fn new(config: DeskConfig) -> Self {
        Self {
            ctx: DeskContext::new(),
            discovery: Discovery::new(),
            operation: Operation::new(),
            config,
        }
    }

    /// Reset the desk to Idle, and enable or disable the bus transport
    pub fn init(&mut self, uart: &mut impl LinUart, enabled: bool) {
        if enabled {
            self.ctx.bus.init(uart);
        } else {
            self.ctx.bus.deinit();
        }
        self.ctx.registry.reset();
        self.ctx.state = DeskState::new();
        self.ctx.busy = false;
        self.discovery.reset();
        self.operation.reset();
    }

    /// Begin node discovery
    ///
    /// Only allowed while the desk is Idle.
    pub fn start_discovery(&mut self) -> Result<(), DeskError> {
        if self.ctx.state.mode != DeskMode::Idle {
            return Err(DeskError::NotIdle);
        }
        info!("Starting discovery");
        self.ctx.state.mode = DeskMode::Startup(StartupPhase::Begin);
        self.ctx.busy = true;
        self.discovery.start();
        Ok(())
    }

    /// Run one tick of the active controller
    pub fn tick(&mut self, uart: &mut impl LinUart) {
        match self.ctx.state.mode.category() {
            ModeCategory::Idle => (),
            ModeCategory::Startup => self.discovery.process(&mut self.ctx, uart, &self.config),
            ModeCategory::Operation => self.operation.process(&mut self.ctx, uart, &self.config),
        }
    }

    /// Forward a transmit-complete event from the UART
    pub fn on_tx_complete(&mut self, uart: &mut impl LinUart) {
        self.ctx.bus.on_tx_complete(uart);
    }

    /// Forward a received byte from the UART
    pub fn on_rx_byte(&mut self, byte: u8) {
        self.ctx.bus.on_rx_byte(byte);
    }

    /// Returns true while the bus schedule is active
    pub fn is_busy(&self) -> bool {
        self.ctx.busy
    }

    /// The current operating mode
    pub fn mode(&self) -> DeskMode {
        self.ctx.state.mode
    }

    /// The configuration in use
    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Access the full controller context
    pub fn context(&self) -> &DeskContext {
        &self.ctx
    }

    /// Access the operation controller
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Access the discovery controller
    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Absolute difference between the two motor positions
    pub fn drift(&self) -> u16 {
        self.ctx.registry.drift()
    }

    /// The current desk position
    pub fn position(&self) -> u16 {
        self.ctx.state.current_position
    }

    /// The position the desk is moving towards
    pub fn target_position(&self) -> u16 {
        self.ctx.state.target_position
    }

    /// Highest position the desk may be moved to
    pub fn upper_limit(&self) -> u16 {
        self.ctx.state.upper_limit
    }

    /// Lowest position the desk may be moved to
    pub fn lower_limit(&self) -> u16 {
        self.ctx.state.lower_limit
    }

    /// Returns true if a calibration is pending
    pub fn calibration_pending(&self) -> bool {
        self.ctx.state.calibrate
    }

    /// Get the record of a motor by raw unit index
    pub fn motor(&self, unit: u8) -> Option<&MotorRecord> {
        MotorUnit::from_index(unit).map(|u| self.ctx.registry.motor(u))
    }

    /// Last reported state code of a motor, or 0xFF for an unknown unit
    pub fn motor_state(&self, unit: u8) -> u8 {
        self.motor(unit).map_or(INVALID_BYTE, |m| m.state)
    }

    /// Last reported position of a motor, or 0xFFFF for an unknown unit
    pub fn motor_position(&self, unit: u8) -> u16 {
        self.motor(unit).map_or(INVALID_WORD, |m| m.position)
    }

    /// Upper limit of a motor, or 0xFFFF for an unknown unit
    pub fn motor_upper_limit(&self, unit: u8) -> u16 {
        self.motor(unit).map_or(INVALID_WORD, |m| m.upper_limit)
    }

    /// Lower limit of a motor, or 0xFFFF for an unknown unit
    pub fn motor_lower_limit(&self, unit: u8) -> u16 {
        self.motor(unit).map_or(INVALID_WORD, |m| m.lower_limit)
    }

    /// Application bus address of a motor, or 0xFF for an unknown unit
    pub fn motor_address(&self, unit: u8) -> u8 {
        MotorUnit::from_index(unit).map_or(INVALID_BYTE, |u| u.address().raw())
    }

    /// Address a motor answered the discovery scan on, or 0xFF for an unknown unit
    pub fn motor_scan_address(&self, unit: u8) -> u8 {
        self.motor(unit).map_or(INVALID_BYTE, |m| m.scan_address)
    }

    /// Capability byte of a motor, or 0xFF for an unknown unit
    pub fn motor_capability(&self, unit: u8) -> u8 {
        self.motor(unit).map_or(INVALID_BYTE, |m| m.capability)
    }

    /// Set a new target position
    ///
    /// Ignored unless the desk is at rest, the target is within the desk limits, and the target is
    /// further than the stopping distance from the current position.
    pub fn request_position(&mut self, target: u16) {
        let state = &mut self.ctx.state;
        if target < state.lower_limit || target > state.upper_limit {
            return;
        }
        if !state.mode.is_operation(OperationPhase::Normal) {
            return;
        }
        if target.abs_diff(state.current_position) > self.config.stopping_distance {
            state.target_position = target;
        }
    }

    /// Request a calibration run. It starts the next time the desk is at rest
    pub fn request_calibration(&mut self) {
        self.ctx.state.calibrate = true;
    }

    /// Stop at the current position
    pub fn request_halt(&mut self) {
        self.ctx.state.target_position = self.ctx.state.current_position;
    }

    /// Validate and apply a move request from the host
    ///
    /// A target equal to the current position is rejected with
    /// [`DeskError::BelowMinimumDistance`].
    pub fn command_position(&mut self, target: u16) -> Result<(), DeskError> {
        let state = &self.ctx.state;
        let stopping_distance = self.config.stopping_distance;
        let current = state.current_position;

        if !state.mode.is_operation(OperationPhase::Normal) {
            return Err(DeskError::Busy);
        }
        if target < state.lower_limit || target > state.upper_limit {
            return Err(DeskError::InvalidData {
                target,
                lower: state.lower_limit,
                upper: state.upper_limit,
            });
        }
        let distance = target.abs_diff(current);
        if target > current {
            if (state.upper_limit as u32) <= current as u32 + stopping_distance as u32 {
                return Err(DeskError::UpperLimitReached);
            }
        } else if target < current {
            if current < stopping_distance || state.lower_limit >= current - stopping_distance {
                return Err(DeskError::LowerLimitReached);
            }
        }
        if distance <= stopping_distance {
            return Err(DeskError::BelowMinimumDistance { distance });
        }

        self.request_position(target);
        Ok(())
    }

    /// Validate and apply a calibration request from the host
    pub fn command_calibration(&mut self) -> Result<(), DeskError> {
        if !self.ctx.state.mode.is_operation(OperationPhase::Normal) {
            return Err(DeskError::Busy);
        }
        self.request_calibration();
        Ok(())
    }

    /// Apply a halt request from the host
    pub fn command_halt(&mut self) -> Result<(), DeskError> {
        self.request_halt();
        Ok(())
    }

    /// Get the desk position, once discovery has completed
    pub fn checked_position(&self) -> Result<u16, DeskError> {
        if self.ctx.state.mode.category() != ModeCategory::Operation {
            return Err(DeskError::NotReady);
        }
        Ok(self.position())
    }

    /// Get the desk limits as `(lower, upper)`, once discovery has completed
    pub fn checked_limits(&self) -> Result<(u16, u16), DeskError> {
        if self.ctx.state.mode.category() != ModeCategory::Operation {
            return Err(DeskError::NotReady);
        }
        Ok((self.lower_limit(), self.upper_limit()))
    }
}
