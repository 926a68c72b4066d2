//! Common functionality shared among the lyft crates.
//!
//! This holds the bit-level LIN primitives (addresses, parity, checksums and frames), the
//! application messages exchanged with the desk motors, the desk mode taxonomy and the result
//! codes reported to a host. Most users will get at it through the re-export in
//! `lyft-controller`.
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod constants;
pub mod lin;
pub mod messages;
pub mod mode;
pub mod result;
pub mod traits;

pub use config::DeskConfig;
pub use lin::{LinAddress, LinFrame};
pub use mode::{DeskMode, ModeCategory, OperationPhase, StartupPhase};
pub use result::{DeskError, ResultCode};
