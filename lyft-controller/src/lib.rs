//! A library to control a dual motor standing desk over LIN
//!
//! Lyft-controller is the control core of a motorized standing desk. It acts as the LIN master
//! for the two motor nodes of the desk frame. It is primarily intended to be run on
//! microcontrollers, and so it is no_std compatible and performs no heap allocation. It provides
//! the following features:
//!
//! * A byte level LIN master ([`transport::LinMaster`]), driven by UART interrupts.
//! * *Discovery* of the motor nodes at startup, reading out their travel limits and assigning
//!   them identifiers.
//! * A cyclic bus schedule which polls both motors and keeps them synchronized while moving,
//!   calibrating, or recovering from a blocked motor.
//! * A [`Desk`] object which a host command dispatcher can query and command.
//!
//! # Getting Started
//!
//! ## Implement the UART
//!
//! The application provides access to the UART through the
//! [`LinUart`](common::traits::LinUart) trait.
//!
//! ## Instantiating the [`Desk`] object
//!
//! ```ignore
//! let mut desk = Desk::new(DeskConfig::DEFAULT);
//! desk.init(&mut uart, true);
//! desk.start_discovery().ok();
//! ```
//!
//! When the UART events are handled in interrupts, use a [`SharedDesk`] stored in a static
//! instead.
//!
//! ## Driving the desk
//!
//! [`Desk::tick`] must be called at a fixed period. Each tick issues at most one bus request,
//! whose bytes are then pumped out by forwarding the UART transmit-complete events to
//! [`Desk::on_tx_complete`]. Received bytes are forwarded to [`Desk::on_rx_byte`].
//!
//! ```ignore
//! loop {
//!     wait_for_tick();
//!     desk.tick(&mut uart);
//!     if !desk.is_busy() {
//!         if let Some(cmd) = host.poll() {
//!             let result: ResultCode = match cmd {
//!                 HostCommand::Move(target) => desk.command_position(target).into(),
//!                 HostCommand::Calibrate => desk.command_calibration().into(),
//!                 HostCommand::Halt => desk.command_halt().into(),
//!             };
//!             host.reply(result);
//!         }
//!     }
//! }
//! ```
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod desk;
pub mod discovery;
pub mod operation;
pub mod registry;
mod shared;
pub mod transport;

pub use lyft_common as common;

pub use desk::{Desk, DeskContext, DeskState};
pub use registry::{MotorRecord, MotorUnit};
pub use shared::SharedDesk;
