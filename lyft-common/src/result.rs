//! Result codes reported to the host, and the errors that produce them
use snafu::Snafu;

/// Result codes of the host protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResultCode {
    /// Command accepted
    Ok = 0,
    /// No response in time
    Timeout = 1,
    /// An argument was out of range
    InvalidData = 2,
    /// Unknown command
    InvalidCommand = 3,
    /// Host frame checksum did not match
    InvalidChecksum = 4,
    /// The desk is busy executing another action
    Busy = 5,
    /// Discovery can only be started from Idle
    NotIdle = 6,
    /// Discovery has not finished yet
    NotReady = 7,
    /// Requested move is shorter than the stopping distance
    MinDistance = 8,
    /// The upper limit does not leave room for the move
    UpperLimitReached = 9,
    /// The lower limit does not leave room for the move
    LowerLimitReached = 10,
}

/// Errors returned by the checked desk commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeskError {
    /// The desk is not at rest
    #[snafu(display("Desk is busy"))]
    Busy,
    /// The target is outside of the desk limits
    #[snafu(display("Target {target} outside of limits {lower}..={upper}"))]
    InvalidData {
        /// Requested target position
        target: u16,
        /// Desk lower limit
        lower: u16,
        /// Desk upper limit
        upper: u16,
    },
    /// Discovery requested while not idle
    #[snafu(display("Desk is not idle"))]
    NotIdle,
    /// Desk limits are not known yet
    #[snafu(display("Desk discovery has not completed"))]
    NotReady,
    /// Requested move is too short
    #[snafu(display("Distance {distance} is not above the stopping distance"))]
    BelowMinimumDistance {
        /// Absolute distance to the target
        distance: u16,
    },
    /// Moving up would run into the upper limit
    #[snafu(display("Upper limit reached"))]
    UpperLimitReached,
    /// Moving down would run into the lower limit
    #[snafu(display("Lower limit reached"))]
    LowerLimitReached,
}

impl DeskError {
    /// Get the host result code for this error
    pub fn code(&self) -> ResultCode {
        match self {
            DeskError::Busy => ResultCode::Busy,
            DeskError::InvalidData { .. } => ResultCode::InvalidData,
            DeskError::NotIdle => ResultCode::NotIdle,
            DeskError::NotReady => ResultCode::NotReady,
            DeskError::BelowMinimumDistance { .. } => ResultCode::MinDistance,
            DeskError::UpperLimitReached => ResultCode::UpperLimitReached,
            DeskError::LowerLimitReached => ResultCode::LowerLimitReached,
        }
    }
}

impl From<DeskError> for ResultCode {
    fn from(value: DeskError) -> Self {
        value.code()
    }
}

impl<T> From<Result<T, DeskError>> for ResultCode {
    fn from(value: Result<T, DeskError>) -> Self {
        match value {
            Ok(_) => ResultCode::Ok,
            Err(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes() {
        assert_eq!(0, ResultCode::from(Ok::<(), DeskError>(())) as u8);
        assert_eq!(5, DeskError::Busy.code() as u8);
        assert_eq!(6, ResultCode::from(DeskError::NotIdle) as u8);
        assert_eq!(7, DeskError::NotReady.code() as u8);
        assert_eq!(
            8,
            DeskError::BelowMinimumDistance { distance: 0 }.code() as u8
        );
        assert_eq!(9, DeskError::UpperLimitReached.code() as u8);
        assert_eq!(10, DeskError::LowerLimitReached.code() as u8);
        assert_eq!(
            ResultCode::InvalidData,
            ResultCode::from(Err::<(), _>(DeskError::InvalidData {
                target: 10,
                lower: 100,
                upper: 200
            }))
        );
    }
}
