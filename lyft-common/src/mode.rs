//! Desk operating modes
//!
//! Each mode has a one byte code visible to the host. The high nibble of the code encodes the
//! category (0x0_ idle, 0x2_ startup, 0x4_ operation).

/// Phases of the startup node discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StartupPhase {
    /// Reset counters and node records
    Begin = 0x21,
    /// First diagnostic announcement
    AnnouncementOne = 0x22,
    /// Second diagnostic announcement
    AnnouncementTwo = 0x23,
    /// First preprocessing frame
    PreprocessingOne = 0x24,
    /// Second preprocessing frame
    PreprocessingTwo = 0x25,
    /// Probing a candidate node address
    ScanNode = 0x26,
    /// Reading the status register
    ReadStatus = 0x27,
    /// Reading the high byte of the upper limit
    ReadUpperLimitHi = 0x28,
    /// Reading the low byte of the upper limit
    ReadUpperLimitLo = 0x29,
    /// Reading the high byte of the lower limit
    ReadLowerLimitHi = 0x2A,
    /// Reading the low byte of the lower limit
    ReadLowerLimitLo = 0x2B,
    /// Assigning the logical identifier
    WriteIdentifier = 0x2C,
    /// First postprocessing frame
    PostprocessingOne = 0x2D,
    /// Second postprocessing frame
    PostprocessingTwo = 0x2E,
}

impl StartupPhase {
    const ALL: [StartupPhase; 14] = [
        StartupPhase::Begin,
        StartupPhase::AnnouncementOne,
        StartupPhase::AnnouncementTwo,
        StartupPhase::PreprocessingOne,
        StartupPhase::PreprocessingTwo,
        StartupPhase::ScanNode,
        StartupPhase::ReadStatus,
        StartupPhase::ReadUpperLimitHi,
        StartupPhase::ReadUpperLimitLo,
        StartupPhase::ReadLowerLimitHi,
        StartupPhase::ReadLowerLimitLo,
        StartupPhase::WriteIdentifier,
        StartupPhase::PostprocessingOne,
        StartupPhase::PostprocessingTwo,
    ];

    /// Returns true for the phases which read a register from a node
    pub fn is_register_read(&self) -> bool {
        matches!(
            self,
            StartupPhase::ReadStatus
                | StartupPhase::ReadUpperLimitHi
                | StartupPhase::ReadUpperLimitLo
                | StartupPhase::ReadLowerLimitHi
                | StartupPhase::ReadLowerLimitLo
        )
    }
}

/// Phases of normal operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OperationPhase {
    /// First cycle after discovery, releases motors parked at a limit
    Begin = 0x41,
    /// At rest
    Normal = 0x42,
    /// Recovering from a blocked motor
    Rescue = 0x43,
    /// Announcing a move or calibration
    Announcing = 0x44,
    /// Moving up at full speed
    MovingUp = 0x45,
    /// Moving down at full speed
    MovingDown = 0x46,
    /// Approaching the target slowly
    MovingSlow = 0x47,
    /// Stopping
    MovingStop = 0x48,
    /// Calibration running
    Calibrating = 0x49,
    /// Leaving calibration
    CalibratingDone = 0x4A,
}

impl OperationPhase {
    const ALL: [OperationPhase; 10] = [
        OperationPhase::Begin,
        OperationPhase::Normal,
        OperationPhase::Rescue,
        OperationPhase::Announcing,
        OperationPhase::MovingUp,
        OperationPhase::MovingDown,
        OperationPhase::MovingSlow,
        OperationPhase::MovingStop,
        OperationPhase::Calibrating,
        OperationPhase::CalibratingDone,
    ];
}

/// Coarse category of a [`DeskMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeCategory {
    /// Not started
    Idle,
    /// Discovering nodes
    Startup,
    /// Running the motor loop
    Operation,
}

/// The operating mode of the desk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeskMode {
    /// Not started
    #[default]
    Idle,
    /// Node discovery in progress
    Startup(StartupPhase),
    /// Discovery finished, motors under control
    Operation(OperationPhase),
}

impl DeskMode {
    /// Code reported for [`DeskMode::Idle`]
    pub const IDLE_CODE: u8 = 0x00;

    /// Get the category of the mode
    pub fn category(&self) -> ModeCategory {
        match self {
            DeskMode::Idle => ModeCategory::Idle,
            DeskMode::Startup(_) => ModeCategory::Startup,
            DeskMode::Operation(_) => ModeCategory::Operation,
        }
    }

    /// Get the host visible mode code
    pub fn code(&self) -> u8 {
        match self {
            DeskMode::Idle => Self::IDLE_CODE,
            DeskMode::Startup(phase) => *phase as u8,
            DeskMode::Operation(phase) => *phase as u8,
        }
    }

    /// Decode a host visible mode code
    ///
    /// Returns None for codes which do not name a mode
    pub fn from_code(code: u8) -> Option<Self> {
        match code & 0xF0 {
            0x00 if code == Self::IDLE_CODE => Some(DeskMode::Idle),
            0x20 => StartupPhase::ALL
                .into_iter()
                .find(|p| *p as u8 == code)
                .map(DeskMode::Startup),
            0x40 => OperationPhase::ALL
                .into_iter()
                .find(|p| *p as u8 == code)
                .map(DeskMode::Operation),
            _ => None,
        }
    }

    /// Returns true if the desk is in the given operation phase
    pub fn is_operation(&self, phase: OperationPhase) -> bool {
        *self == DeskMode::Operation(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_codes_round_trip() {
        assert_eq!(Some(DeskMode::Idle), DeskMode::from_code(0));
        for phase in StartupPhase::ALL {
            let mode = DeskMode::Startup(phase);
            assert_eq!(0x20, mode.code() & 0xF0);
            assert_eq!(Some(mode), DeskMode::from_code(mode.code()));
        }
        for phase in OperationPhase::ALL {
            let mode = DeskMode::Operation(phase);
            assert_eq!(0x40, mode.code() & 0xF0);
            assert_eq!(Some(mode), DeskMode::from_code(mode.code()));
        }
    }

    #[test]
    fn test_invalid_codes() {
        assert_eq!(None, DeskMode::from_code(0x01));
        assert_eq!(None, DeskMode::from_code(0x20));
        assert_eq!(None, DeskMode::from_code(0x2F));
        assert_eq!(None, DeskMode::from_code(0x4B));
        assert_eq!(None, DeskMode::from_code(0x80));
    }

    #[test]
    fn test_category() {
        assert_eq!(ModeCategory::Idle, DeskMode::default().category());
        assert_eq!(
            ModeCategory::Startup,
            DeskMode::Startup(StartupPhase::WriteIdentifier).category()
        );
        assert_eq!(
            ModeCategory::Operation,
            DeskMode::Operation(OperationPhase::Rescue).category()
        );
        assert_eq!(0x43, DeskMode::Operation(OperationPhase::Rescue).code());
        assert_eq!(0x2C, DeskMode::Startup(StartupPhase::WriteIdentifier).code());
    }

    #[test]
    fn test_phase_helpers() {
        assert!(StartupPhase::ReadStatus.is_register_read());
        assert!(!StartupPhase::ScanNode.is_register_read());
        assert!(!StartupPhase::WriteIdentifier.is_register_read());

        let normal = DeskMode::Operation(OperationPhase::Normal);
        assert!(normal.is_operation(OperationPhase::Normal));
        assert!(!normal.is_operation(OperationPhase::Rescue));
        assert!(!DeskMode::default().is_operation(OperationPhase::Normal));
    }
}
