//! LIN bus primitives
//!
//! Addresses, the protected identifier parity, the two checksum variants and the frame
//! container the master transmits. All of the arithmetic here is bit-exact with what the motor
//! nodes expect on the wire.
use snafu::Snafu;

/// The sync field byte which follows every break
pub const SYNC_FIELD: u8 = 0x55;

/// Maximum number of payload bytes in a LIN frame
pub const MAX_PAYLOAD: usize = 8;

/// A 6-bit LIN frame address
///
/// The address is combined with two parity bits to form the protected identifier that is actually
/// sent on the bus. See [`LinAddress::protected_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinAddress(u8);

impl LinAddress {
    /// The largest valid address
    pub const MAX: u8 = 0x3F;

    /// Master request frame used for all diagnostic requests
    pub const DIAG_TX: LinAddress = LinAddress(0x3C);
    /// Slave response frame used for all diagnostic responses
    pub const DIAG_RX: LinAddress = LinAddress(0x3D);
    /// Placeholder node polled once per cycle
    pub const NODE_ONE: LinAddress = LinAddress(1);
    /// Status frame of the left motor
    pub const MOTOR_LEFT: LinAddress = LinAddress(8);
    /// Status frame of the right motor
    pub const MOTOR_RIGHT: LinAddress = LinAddress(9);
    /// Placeholder node polled in the idle slots of each cycle
    pub const NODE_SIXTEEN: LinAddress = LinAddress(16);
    /// Periodic heartbeat frame
    pub const HEARTBEAT: LinAddress = LinAddress(17);
    /// Master broadcast frame carrying the motor command
    pub const MASTER: LinAddress = LinAddress(18);

    /// Create an address, failing if the value does not fit in 6 bits
    pub const fn new(value: u8) -> Result<Self, InvalidAddressError> {
        if value <= Self::MAX {
            Ok(LinAddress(value))
        } else {
            Err(InvalidAddressError)
        }
    }

    /// Recover the address from a protected identifier
    ///
    /// Returns None if the parity bits do not match the address bits.
    pub const fn from_protected_id(pid: u8) -> Option<Self> {
        let address = LinAddress(pid & Self::MAX);
        if address.protected_id() == pid {
            Some(address)
        } else {
            None
        }
    }

    /// Get the raw address value
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Get the protected identifier for this address, i.e. the address with its two parity bits
    pub const fn protected_id(&self) -> u8 {
        self.0 | parity_bits(self.0)
    }
}

impl TryFrom<u8> for LinAddress {
    type Error = InvalidAddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LinAddress::new(value)
    }
}

impl From<LinAddress> for u8 {
    fn from(value: LinAddress) -> Self {
        value.raw()
    }
}

/// Error returned when an address value does not fit in 6 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAddressError;

impl core::fmt::Display for InvalidAddressError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid LIN address")
    }
}
impl core::error::Error for InvalidAddressError {}

const fn bit(value: u8, n: u8) -> u8 {
    (value >> n) & 1
}

/// Compute the two parity bits of a protected identifier, already shifted into bits 6 and 7
///
/// p0 = b0 ^ b1 ^ b2 ^ b4, p1 = !(b1 ^ b3 ^ b4 ^ b5)
pub const fn parity_bits(address: u8) -> u8 {
    let p0 = bit(address, 0) ^ bit(address, 1) ^ bit(address, 2) ^ bit(address, 4);
    let p1 = !(bit(address, 1) ^ bit(address, 3) ^ bit(address, 4) ^ bit(address, 5)) & 1;
    (p0 | (p1 << 1)) << 6
}

// Carries are folded back by subtracting 255, so the sum is effectively modulo 255
fn checksum_seeded(seed: u8, data: &[u8]) -> u8 {
    let mut sum = seed as u16;
    for &b in data {
        sum += b as u16;
        if sum > 255 {
            sum -= 255;
        }
    }
    !(sum as u8)
}

/// Classic checksum: computed over the payload bytes only
pub fn checksum_classic(data: &[u8]) -> u8 {
    checksum_seeded(0, data)
}

/// Enhanced checksum: computed over the protected identifier and the payload bytes
pub fn checksum_enhanced(pid: u8, data: &[u8]) -> u8 {
    checksum_seeded(pid, data)
}

/// Selects which checksum variant covers a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChecksumKind {
    /// Sum over the payload only
    Classic,
    /// Sum over the protected identifier and payload
    Enhanced,
}

impl ChecksumKind {
    /// The variant used when the master transmits a frame to `address`
    pub fn for_transmit(address: LinAddress) -> Self {
        if address == LinAddress::DIAG_TX {
            ChecksumKind::Classic
        } else {
            ChecksumKind::Enhanced
        }
    }

    /// The variant used to validate a response received for the protected identifier `pid`
    ///
    /// Only the diagnostic response frame uses the classic checksum.
    pub fn for_receive(pid: u8) -> Self {
        if pid == LinAddress::DIAG_RX.protected_id() {
            ChecksumKind::Classic
        } else {
            ChecksumKind::Enhanced
        }
    }

    /// Compute the checksum of `data` sent with protected identifier `pid`
    pub fn compute(&self, pid: u8, data: &[u8]) -> u8 {
        match self {
            ChecksumKind::Classic => checksum_classic(data),
            ChecksumKind::Enhanced => checksum_enhanced(pid, data),
        }
    }
}

/// Error returned when building a frame from an invalid payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum FrameError {
    /// A frame must carry at least one payload byte
    #[snafu(display("LIN frame payload is empty"))]
    EmptyPayload,
    /// The payload exceeds the 8 bytes a LIN frame can carry
    #[snafu(display("LIN frame payload of {len} bytes exceeds {MAX_PAYLOAD}"))]
    PayloadTooLong {
        /// The rejected payload length
        len: usize,
    },
}

/// A master-transmitted LIN frame
///
/// On the wire the frame follows a break and consists of the sync field, the protected
/// identifier, the payload and the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinFrame {
    pid: u8,
    data: [u8; MAX_PAYLOAD],
    len: u8,
    checksum: u8,
}

impl LinFrame {
    /// Build a frame for `address`, computing the protected identifier and checksum
    pub fn new(address: LinAddress, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.is_empty() {
            return EmptyPayloadSnafu.fail();
        }
        if payload.len() > MAX_PAYLOAD {
            return PayloadTooLongSnafu { len: payload.len() }.fail();
        }
        let pid = address.protected_id();
        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        let checksum = ChecksumKind::for_transmit(address).compute(pid, payload);
        Ok(Self {
            pid,
            data,
            len: payload.len() as u8,
            checksum,
        })
    }

    /// The protected identifier
    pub fn pid(&self) -> u8 {
        self.pid
    }

    /// The payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// The checksum byte
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Number of bytes sent after the break
    pub fn wire_len(&self) -> usize {
        self.len as usize + 3
    }

    /// Get the nth byte sent after the break, or None past the end of the frame
    pub fn wire_byte(&self, n: usize) -> Option<u8> {
        let len = self.len as usize;
        match n {
            0 => Some(SYNC_FIELD),
            1 => Some(self.pid),
            n if n - 2 < len => Some(self.data[n - 2]),
            n if n - 2 == len => Some(self.checksum),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_protected_ids() {
        let table = [
            (0x01, 0xC1),
            (0x08, 0x08),
            (0x09, 0x49),
            (0x10, 0x50),
            (0x11, 0x11),
            (0x12, 0x92),
            (0x3C, 0x3C),
            (0x3D, 0x7D),
        ];
        for (address, pid) in table {
            let address = LinAddress::new(address).unwrap();
            assert_eq!(pid, address.protected_id(), "address {:?}", address);
        }
    }

    #[test]
    fn test_parity_is_deterministic_and_reversible() {
        for raw in 0..=LinAddress::MAX {
            let address = LinAddress::new(raw).unwrap();
            let pid = address.protected_id();
            assert_eq!(pid, address.protected_id());
            assert_eq!(raw, pid & LinAddress::MAX);
            assert_eq!(Some(address), LinAddress::from_protected_id(pid));
            // Flipping either parity bit must be detected
            assert_eq!(None, LinAddress::from_protected_id(pid ^ 0x40));
            assert_eq!(None, LinAddress::from_protected_id(pid ^ 0x80));
        }
    }

    #[test]
    fn test_invalid_address() {
        assert_eq!(Err(InvalidAddressError), LinAddress::new(0x40));
        assert_eq!(Err(InvalidAddressError), LinAddress::try_from(0xFFu8));
    }

    #[test]
    fn test_checksum_folds_carry_by_255() {
        // 0xFF + 0x07 = 0x106 -> 0x07, and each further 0xFF leaves 0x07
        let announcement = [0xFF, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(0xF8, checksum_classic(&announcement));

        assert_eq!(0xFF, checksum_classic(&[0x00]));
        assert_eq!(0x00, checksum_classic(&[0xFF]));
        // 0x80 + 0x80 = 0x100 -> 0x01
        assert_eq!(0xFE, checksum_classic(&[0x80, 0x80]));
    }

    #[test]
    fn test_enhanced_checksum_includes_pid() {
        let heartbeat = [0x00, 0x00, 0x00];
        assert_eq!(0xEE, checksum_enhanced(LinAddress::HEARTBEAT.protected_id(), &heartbeat));
        assert_eq!(0x6D, checksum_enhanced(LinAddress::MASTER.protected_id(), &heartbeat));
        assert_eq!(checksum_classic(&heartbeat), checksum_enhanced(0, &heartbeat));
    }

    #[test]
    fn test_checksum_kind_selection() {
        assert_eq!(ChecksumKind::Classic, ChecksumKind::for_transmit(LinAddress::DIAG_TX));
        assert_eq!(ChecksumKind::Enhanced, ChecksumKind::for_transmit(LinAddress::MASTER));
        assert_eq!(ChecksumKind::Classic, ChecksumKind::for_receive(0x7D));
        assert_eq!(
            ChecksumKind::Enhanced,
            ChecksumKind::for_receive(LinAddress::MOTOR_LEFT.protected_id())
        );
    }

    #[test]
    fn test_frame_wire_bytes() {
        let frame = LinFrame::new(LinAddress::MASTER, &[0x64, 0x00, 0xFC]).unwrap();
        let expected_checksum = checksum_enhanced(0x92, &[0x64, 0x00, 0xFC]);
        let bytes: Vec<u8> = (0..).map_while(|n| frame.wire_byte(n)).collect();
        assert_eq!(vec![SYNC_FIELD, 0x92, 0x64, 0x00, 0xFC, expected_checksum], bytes);
        assert_eq!(frame.wire_len(), bytes.len());
    }

    #[test]
    fn test_frame_rejects_bad_payloads() {
        assert_eq!(
            Err(FrameError::EmptyPayload),
            LinFrame::new(LinAddress::MASTER, &[])
        );
        assert_eq!(
            Err(FrameError::PayloadTooLong { len: 9 }),
            LinFrame::new(LinAddress::DIAG_TX, &[0; 9])
        );
    }
}
