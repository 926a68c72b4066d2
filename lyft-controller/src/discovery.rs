//! Startup node discovery
//!
//! Discovery walks the motor nodes through a diagnostic session: it announces itself, probes
//! each candidate node address, reads the status and limit registers of every node which answers,
//! assigns it a logical identifier, and finally derives the desk wide limits from the two motors.
//!
//! Each step is a diagnostic request on [`LinAddress::DIAG_TX`], followed two ticks later by a
//! read of [`LinAddress::DIAG_RX`]. The answer is evaluated three ticks after that, when the next
//! request is sent, so every step takes five ticks.
use defmt_or_log::{debug, info, warn};
use lyft_common::{
    constants::values,
    lin::LinAddress,
    messages::{DiagRequest, DiagResponse, NodeRegister},
    traits::LinUart,
    DeskConfig, DeskMode, OperationPhase, StartupPhase,
};

use crate::{
    desk::DeskContext,
    registry::NUM_MOTORS,
    transport::{ReceiveError, Response},
};

/// Ticks to wait after a request before reading the response
const READBACK_DELAY: u8 = 1;
/// Ticks to wait after reading a response before evaluating it
const ADVANCE_DELAY: u8 = 2;

/// The register read in a given phase
fn register_for(phase: StartupPhase) -> Option<NodeRegister> {
    match phase {
        StartupPhase::ReadStatus => Some(NodeRegister::Status),
        StartupPhase::ReadUpperLimitHi => Some(NodeRegister::UpperLimitHi),
        StartupPhase::ReadUpperLimitLo => Some(NodeRegister::UpperLimitLo),
        StartupPhase::ReadLowerLimitHi => Some(NodeRegister::LowerLimitHi),
        StartupPhase::ReadLowerLimitLo => Some(NodeRegister::LowerLimitLo),
        _ => None,
    }
}

/// The phase following a successful register read
fn after_read(phase: StartupPhase) -> StartupPhase {
    match phase {
        StartupPhase::ReadStatus => StartupPhase::ReadUpperLimitHi,
        StartupPhase::ReadUpperLimitHi => StartupPhase::ReadUpperLimitLo,
        StartupPhase::ReadUpperLimitLo => StartupPhase::ReadLowerLimitHi,
        StartupPhase::ReadLowerLimitHi => StartupPhase::ReadLowerLimitLo,
        _ => StartupPhase::WriteIdentifier,
    }
}

/// Runs the discovery protocol while the desk is in a startup mode
#[derive(Debug)]
pub struct Discovery {
    timekeeper: u8,
    readback: bool,
    node_counter: u8,
    identifier: u8,
    found: bool,
    retries: u8,
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Discovery {
    /// Create a new discovery controller
    pub const fn new() -> Self {
        Self {
            timekeeper: 0,
            readback: false,
            node_counter: 0,
            identifier: values::UNASSIGNED_IDENTIFIER,
            found: false,
            retries: 0,
        }
    }

    /// Return to the power on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Restart the step timer. Called when the desk enters [`StartupPhase::Begin`]
    pub fn start(&mut self) {
        self.timekeeper = 0;
        self.readback = false;
    }

    /// Node address currently being probed
    pub fn node_counter(&self) -> u8 {
        self.node_counter
    }

    /// Number of consecutive bad responses in the current step
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Run one tick
    ///
    /// Does nothing unless the desk is in a startup mode.
    pub fn process(
        &mut self,
        ctx: &mut DeskContext,
        uart: &mut impl LinUart,
        config: &DeskConfig,
    ) {
        let DeskMode::Startup(phase) = ctx.state.mode else {
            return;
        };

        self.timekeeper = self.timekeeper.saturating_add(1);

        if self.readback {
            if self.timekeeper > READBACK_DELAY {
                ctx.bus.read(uart, LinAddress::DIAG_RX);
                self.readback = false;
                self.timekeeper = 0;
            }
        } else if self.timekeeper > ADVANCE_DELAY {
            let response = if phase != StartupPhase::Begin {
                Some(ctx.bus.take_response(uart))
            } else {
                None
            };

            let next = self.advance(ctx, phase, response, config);
            ctx.state.mode = next;

            if let Some(request) = self.request_for(next) {
                ctx.bus.write(uart, LinAddress::DIAG_TX, &request.to_bytes());
                self.readback = true;
            }
            self.timekeeper = 0;
        }
    }

    fn begin(&mut self, ctx: &mut DeskContext) {
        self.node_counter = 0;
        self.identifier = values::UNASSIGNED_IDENTIFIER;
        self.found = false;
        self.retries = 0;
        ctx.registry.reset_nodes();
    }

    fn advance(
        &mut self,
        ctx: &mut DeskContext,
        phase: StartupPhase,
        response: Option<Result<Response, ReceiveError>>,
        config: &DeskConfig,
    ) -> DeskMode {
        let candidates = config
            .scan_candidates
            .clamp(1, DeskConfig::MAX_SCAN_CANDIDATES);
        let answered = matches!(response, Some(Ok(_)));
        let diag = match &response {
            Some(Ok(data)) => DiagResponse::try_from(&data[..]).ok(),
            _ => None,
        };

        let next = match phase {
            StartupPhase::Begin => {
                self.begin(ctx);
                StartupPhase::AnnouncementOne
            }
            StartupPhase::AnnouncementOne => StartupPhase::AnnouncementTwo,
            StartupPhase::AnnouncementTwo => StartupPhase::PreprocessingOne,
            StartupPhase::PreprocessingOne => StartupPhase::PreprocessingTwo,
            StartupPhase::PreprocessingTwo => {
                self.node_counter = 0;
                self.identifier = values::UNASSIGNED_IDENTIFIER;
                self.found = false;
                StartupPhase::ScanNode
            }
            StartupPhase::ScanNode => {
                if answered {
                    self.found = true;
                    self.identifier = if self.identifier == values::UNASSIGNED_IDENTIFIER {
                        0
                    } else {
                        self.identifier.wrapping_add(1)
                    };
                    info!(
                        "Found node on address {} as identifier {}",
                        self.node_counter, self.identifier
                    );
                    match ctx.registry.node_mut(self.identifier) {
                        Some(node) => node.scan_address = self.node_counter,
                        None => warn!(
                            "Ignoring node {}, only {} motors are supported",
                            self.identifier, NUM_MOTORS
                        ),
                    }
                    StartupPhase::ReadStatus
                } else if self.node_counter + 1 < candidates {
                    self.node_counter += 1;
                    StartupPhase::ScanNode
                } else {
                    StartupPhase::PostprocessingOne
                }
            }
            StartupPhase::ReadStatus
            | StartupPhase::ReadUpperLimitHi
            | StartupPhase::ReadUpperLimitLo
            | StartupPhase::ReadLowerLimitHi
            | StartupPhase::ReadLowerLimitLo => {
                let value = register_for(phase)
                    .and_then(|register| Some((register, diag?.value_of(register).ok()?)));
                match value {
                    Some((register, value)) => {
                        if let Some(node) = ctx.registry.node_mut(self.identifier) {
                            node.set_register(register, value);
                        }
                        self.retries = 0;
                        after_read(phase)
                    }
                    None => return self.retry(phase, config),
                }
            }
            StartupPhase::WriteIdentifier => {
                if diag.is_some_and(|d| d.is_write_ack()) {
                    self.retries = 0;
                    if self.node_counter + 1 < candidates {
                        self.node_counter += 1;
                        StartupPhase::ScanNode
                    } else {
                        StartupPhase::PostprocessingOne
                    }
                } else {
                    return self.retry(phase, config);
                }
            }
            StartupPhase::PostprocessingOne => StartupPhase::PostprocessingTwo,
            StartupPhase::PostprocessingTwo => {
                if !self.found {
                    debug!("No node answered the scan, scanning again");
                    self.node_counter = 0;
                    self.identifier = values::UNASSIGNED_IDENTIFIER;
                    StartupPhase::ScanNode
                } else {
                    ctx.registry.build_motors();
                    let (lower, upper) = ctx.registry.desk_limits();
                    ctx.state.lower_limit = lower;
                    ctx.state.upper_limit = upper;
                    info!("Discovery complete, desk limits {}..={}", lower, upper);
                    return DeskMode::Operation(OperationPhase::Begin);
                }
            }
        };
        DeskMode::Startup(next)
    }

    fn retry(&mut self, phase: StartupPhase, config: &DeskConfig) -> DeskMode {
        self.retries = self.retries.saturating_add(1);
        if self.retries > config.read_retry_limit {
            warn!(
                "Discovery step 0x{:x} failed {} times, restarting",
                phase as u8, self.retries
            );
            DeskMode::Startup(StartupPhase::Begin)
        } else {
            debug!("Bad response in discovery step 0x{:x}, retrying", phase as u8);
            DeskMode::Startup(phase)
        }
    }

    fn request_for(&self, mode: DeskMode) -> Option<DiagRequest> {
        let DeskMode::Startup(phase) = mode else {
            return None;
        };
        let node = self.node_counter;
        let request = match phase {
            StartupPhase::Begin => return None,
            StartupPhase::AnnouncementOne | StartupPhase::AnnouncementTwo => {
                DiagRequest::Announcement
            }
            StartupPhase::PreprocessingOne => DiagRequest::Preprocessing { step: 1 },
            StartupPhase::PreprocessingTwo => DiagRequest::Preprocessing { step: 2 },
            StartupPhase::ScanNode => DiagRequest::ScanNode {
                node,
                identifier: self.identifier,
                found: self.found,
            },
            StartupPhase::WriteIdentifier => DiagRequest::WriteIdentifier {
                node,
                identifier: self.identifier,
            },
            StartupPhase::PostprocessingOne => DiagRequest::Postprocessing {
                step: 1,
                found: self.found,
            },
            StartupPhase::PostprocessingTwo => DiagRequest::Postprocessing {
                step: 2,
                found: self.found,
            },
            read if read.is_register_read() => DiagRequest::ReadRegister {
                node,
                register: register_for(read)?,
            },
            _ => return None,
        };
        Some(request)
    }
}
