//! Cyclic motor coordination
//!
//! Once discovery has finished, the bus follows a fixed schedule of [`CYCLE_LEN`] ticks:
//!
//! | Tick | Action |
//! | ---- | ------ |
//! | 0    | Mark the bus busy, send the heartbeat |
//! | 1    | Poll the left motor |
//! | 2    | Store the left status, poll the right motor |
//! | 3    | Store the right status, poll node 16 |
//! | 4    | Update the desk position, poll node 16 |
//! | 5-8  | Poll node 16 |
//! | 9    | Compute the next motor command, poll node 1 |
//! | 10   | Send the motor command |
//! | 11   | Release the bus |
//!
//! Responses from nodes 1 and 16 are read and discarded.
use defmt_or_log::{debug, info, warn};
use lyft_common::{
    constants::values,
    lin::LinAddress,
    messages::{Instruction, MotorCommand, MotorState, MotorStatus, HEARTBEAT},
    traits::LinUart,
    DeskConfig, DeskMode, OperationPhase,
};

use crate::{desk::DeskContext, registry::MotorUnit};

/// Number of ticks in one bus cycle
pub const CYCLE_LEN: u8 = 19;

/// Rescue commands are sent in this order, indexed by the rescue counter
const RESCUE_STOP_END: u8 = 3;
const RESCUE_REVERSE_END: u8 = 11;
const RESCUE_SLOW_END: u8 = 15;
const RESCUE_SETTLE_END: u8 = 18;
const RESCUE_DONE: u8 = 22;

/// Runs the motor loop while the desk is in an operation mode
#[derive(Debug)]
pub struct Operation {
    tick: u8,
    rescue_counter: u8,
    rescue_direction: Instruction,
    proximity: u8,
    command: MotorCommand,
}

impl Default for Operation {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation {
    /// Create a new operation controller
    pub const fn new() -> Self {
        Self {
            tick: 0,
            rescue_counter: 0,
            rescue_direction: Instruction::MoveStop,
            proximity: 0,
            command: MotorCommand::new(0, Instruction::Idle),
        }
    }

    /// Return to the power on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Position in the bus cycle of the next tick
    pub fn tick(&self) -> u8 {
        self.tick
    }

    /// The most recently computed motor command
    pub fn command(&self) -> MotorCommand {
        self.command
    }

    /// Number of rescue commands issued since the rescue started
    pub fn rescue_counter(&self) -> u8 {
        self.rescue_counter
    }

    /// Run one tick of the bus cycle
    ///
    /// Does nothing unless the desk is in an operation mode.
    pub fn process(
        &mut self,
        ctx: &mut DeskContext,
        uart: &mut impl LinUart,
        config: &DeskConfig,
    ) {
        if !matches!(ctx.state.mode, DeskMode::Operation(_)) {
            return;
        }

        match self.tick {
            0 => {
                ctx.busy = true;
                ctx.bus.write(uart, LinAddress::HEARTBEAT, &HEARTBEAT);
            }
            1 => {
                ctx.bus.read(uart, LinAddress::MOTOR_LEFT);
            }
            2 => {
                self.poll(ctx, uart, MotorUnit::Left);
                ctx.bus.read(uart, LinAddress::MOTOR_RIGHT);
            }
            3 => {
                self.poll(ctx, uart, MotorUnit::Right);
                ctx.bus.read(uart, LinAddress::NODE_SIXTEEN);
            }
            4 => {
                ctx.bus.take_response(uart).ok();
                ctx.state.current_position = ctx.registry.motor(MotorUnit::Left).position;
                ctx.bus.read(uart, LinAddress::NODE_SIXTEEN);
            }
            5..=8 => {
                ctx.bus.take_response(uart).ok();
                ctx.bus.read(uart, LinAddress::NODE_SIXTEEN);
            }
            9 => {
                ctx.bus.take_response(uart).ok();
                self.command = self.next_command(ctx, config);
                ctx.bus.read(uart, LinAddress::NODE_ONE);
            }
            10 => {
                ctx.bus.take_response(uart).ok();
                ctx.bus
                    .write(uart, LinAddress::MASTER, &self.command.to_bytes());
            }
            11 => {
                ctx.busy = false;
            }
            _ => (),
        }

        self.tick = (self.tick + 1) % CYCLE_LEN;
    }

    /// Read back a motor status, and check it for a blockage
    fn poll(&mut self, ctx: &mut DeskContext, uart: &mut impl LinUart, unit: MotorUnit) {
        let status = match ctx.bus.take_response(uart) {
            Ok(data) => MotorStatus::try_from(&data[..]).ok(),
            Err(_e) => {
                debug!("No valid status from motor {}", unit.address().raw());
                None
            }
        };
        ctx.registry.motor_mut(unit).update(status);
        self.check_fault(ctx);
    }

    fn check_fault(&mut self, ctx: &mut DeskContext) {
        let reverse = match ctx.state.mode {
            DeskMode::Operation(OperationPhase::MovingUp) => Instruction::MoveDown,
            DeskMode::Operation(OperationPhase::MovingDown) => Instruction::MoveUp,
            _ => return,
        };
        if ctx.registry.any_in_state(MotorState::Blocked) {
            warn!("Motor blocked at position {}, starting rescue", ctx.state.current_position);
            self.rescue_counter = 0;
            self.rescue_direction = reverse;
            ctx.state.mode = DeskMode::Operation(OperationPhase::Rescue);
        }
    }

    /// Resolve a synchronized position, or hold the last commanded position if neither motor
    /// reported a valid status
    fn hold_or(&self, position: Option<u16>) -> u16 {
        match position {
            Some(p) => p,
            None => {
                warn!("Both motors in outage, holding position {}", self.command.position);
                self.command.position
            }
        }
    }

    fn next_command(&mut self, ctx: &mut DeskContext, config: &DeskConfig) -> MotorCommand {
        let DeskMode::Operation(phase) = ctx.state.mode else {
            return self.command;
        };
        let state = &mut ctx.state;
        let registry = &ctx.registry;
        let left = registry.motor(MotorUnit::Left).position;
        let stopping_distance = config.stopping_distance;
        let mut next = phase;

        let command = match phase {
            OperationPhase::Begin => {
                state.current_position = left;
                state.target_position = left;
                if registry.any_in_state(MotorState::LimitA) {
                    MotorCommand::new(values::LIMIT_RELEASE_POSITION, Instruction::ReleaseLimitA)
                } else if registry.any_in_state(MotorState::LimitB) {
                    MotorCommand::new(values::LIMIT_RELEASE_POSITION, Instruction::ReleaseLimitB)
                } else {
                    next = OperationPhase::Normal;
                    MotorCommand::new(left, Instruction::Idle)
                }
            }
            OperationPhase::Normal => {
                if state.calibrate {
                    next = OperationPhase::Announcing;
                } else if state.target_position != state.current_position {
                    let distance = state.target_position.abs_diff(state.current_position);
                    if distance > stopping_distance {
                        next = OperationPhase::Announcing;
                    } else {
                        state.target_position = state.current_position;
                    }
                }
                MotorCommand::new(state.current_position, Instruction::Idle)
            }
            OperationPhase::Announcing => {
                next = if state.calibrate {
                    OperationPhase::Calibrating
                } else if state.target_position > state.current_position {
                    OperationPhase::MovingUp
                } else if state.target_position < state.current_position {
                    OperationPhase::MovingDown
                } else {
                    OperationPhase::Normal
                };
                MotorCommand::new(state.current_position, Instruction::Announce)
            }
            OperationPhase::MovingUp => {
                let position = self.hold_or(registry.lower_position());
                let distance = state.target_position.saturating_sub(state.current_position);
                if distance <= stopping_distance {
                    self.proximity = 0;
                    next = OperationPhase::MovingSlow;
                }
                MotorCommand::new(position, Instruction::MoveUp)
            }
            OperationPhase::MovingDown => {
                let position = self.hold_or(registry.higher_position());
                let distance = state.current_position.saturating_sub(state.target_position);
                if distance <= stopping_distance {
                    self.proximity = 0;
                    next = OperationPhase::MovingSlow;
                }
                MotorCommand::new(position, Instruction::MoveDown)
            }
            OperationPhase::MovingSlow => {
                self.proximity = self.proximity.saturating_add(1);
                if self.proximity >= config.slow_dwell_ticks {
                    next = OperationPhase::MovingStop;
                }
                MotorCommand::new(state.target_position, Instruction::MoveSlow)
            }
            OperationPhase::MovingStop => {
                state.target_position = state.current_position;
                next = OperationPhase::Normal;
                MotorCommand::new(left, Instruction::MoveStop)
            }
            OperationPhase::Calibrating => {
                if registry.all_in_state(MotorState::Calibrated) {
                    next = OperationPhase::CalibratingDone;
                }
                MotorCommand::new(0, Instruction::Calibrate)
            }
            OperationPhase::CalibratingDone => {
                let position = self.hold_or(registry.higher_position());
                state.calibrate = false;
                info!("Calibration finished");
                next = OperationPhase::Normal;
                MotorCommand::new(position, Instruction::CalibrateStop)
            }
            OperationPhase::Rescue => {
                let step = self.rescue_counter;
                self.rescue_counter = self.rescue_counter.saturating_add(1);
                match step {
                    0..RESCUE_STOP_END => MotorCommand::new(left, Instruction::MoveStop),
                    RESCUE_STOP_END..RESCUE_REVERSE_END => {
                        let position = match self.rescue_direction {
                            Instruction::MoveUp => self.hold_or(registry.lower_position()),
                            Instruction::MoveDown => self.hold_or(registry.higher_position()),
                            _ => left,
                        };
                        MotorCommand::new(position, self.rescue_direction)
                    }
                    RESCUE_REVERSE_END..RESCUE_SLOW_END => {
                        MotorCommand::new(left, Instruction::MoveSlow)
                    }
                    RESCUE_SLOW_END..RESCUE_SETTLE_END => {
                        MotorCommand::new(left, Instruction::MoveStop)
                    }
                    RESCUE_SETTLE_END => MotorCommand::new(left, Instruction::Announce),
                    RESCUE_DONE.. => {
                        state.target_position = state.current_position;
                        next = OperationPhase::Normal;
                        info!("Rescue finished at position {}", state.current_position);
                        MotorCommand::new(left, Instruction::Idle)
                    }
                    _ => MotorCommand::new(left, Instruction::Idle),
                }
            }
        };

        state.mode = DeskMode::Operation(next);
        command
    }
}
