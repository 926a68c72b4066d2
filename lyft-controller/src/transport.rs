//! Byte level LIN master
//!
//! The [`LinMaster`] never blocks. [`LinMaster::write`] and [`LinMaster::read`] only start a
//! frame; the remaining bytes are pumped out from [`LinMaster::on_tx_complete`], which must be
//! called for every transmit-complete event of the UART. Received bytes are handed in through
//! [`LinMaster::on_rx_byte`], and collected with [`LinMaster::take_response`] once the schedule
//! has given the slave enough time to answer.
use heapless::Vec;
use lyft_common::{
    lin::{ChecksumKind, LinAddress, LinFrame},
    traits::LinUart,
};
use snafu::Snafu;

/// Size of the receive buffer, including the checksum byte
pub const RX_BUFFER_LEN: usize = 12;

/// Byte sent to the UART to produce the break field
const BREAK_CHAR: u8 = 0x00;

/// State of the bus transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    /// Transport is disabled
    #[default]
    Idle,
    /// Waiting for a new request
    Ready,
    /// Transmitting a frame
    Sending,
    /// Header sent, collecting the slave response
    Receiving,
}

/// Error returned when a received response cannot be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiveError {
    /// Fewer than two bytes (one data byte plus checksum) were received
    #[snafu(display("Response too short: {len} bytes"))]
    TooShort {
        /// Number of bytes received
        len: usize,
    },
    /// The trailing checksum does not match the received bytes
    #[snafu(display("Checksum mismatch: expected 0x{expected:x}, got 0x{found:x}"))]
    ChecksumMismatch {
        /// Checksum computed over the received data
        expected: u8,
        /// Checksum byte received
        found: u8,
    },
}

/// Payload of a validated response
pub type Response = Vec<u8, RX_BUFFER_LEN>;

#[derive(Debug, Clone, Copy)]
enum Transfer {
    None,
    Write(LinFrame),
    Read { pid: u8 },
}

/// A LIN master driving one UART
#[derive(Debug)]
pub struct LinMaster {
    state: BusState,
    transfer: Transfer,
    tx_count: usize,
    rx_buffer: Vec<u8, RX_BUFFER_LEN>,
    /// The next received byte may be the transceiver echo of the identifier
    echo_pending: bool,
}

impl Default for LinMaster {
    fn default() -> Self {
        Self::new()
    }
}

impl LinMaster {
    /// Create a new, disabled, transport
    pub const fn new() -> Self {
        Self {
            state: BusState::Idle,
            transfer: Transfer::None,
            tx_count: 0,
            rx_buffer: Vec::new(),
            echo_pending: false,
        }
    }

    /// Enable the transport
    pub fn init(&mut self, uart: &mut impl LinUart) {
        uart.disable_receive();
        self.transfer = Transfer::None;
        self.tx_count = 0;
        self.rx_buffer.clear();
        self.echo_pending = false;
        self.state = BusState::Ready;
    }

    /// Disable the transport. Requests are ignored until the next [`LinMaster::init`]
    pub fn deinit(&mut self) {
        self.state = BusState::Idle;
    }

    /// Get the current state
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Returns true if a new request will be accepted
    pub fn is_ready(&self) -> bool {
        self.state == BusState::Ready
    }

    /// Start transmitting `payload` to `address`
    ///
    /// The request is ignored unless the transport is [`BusState::Ready`] and the payload is 1 to
    /// 8 bytes long. Returns true if the request was accepted.
    pub fn write(&mut self, uart: &mut impl LinUart, address: LinAddress, payload: &[u8]) -> bool {
        if self.state != BusState::Ready {
            return false;
        }
        let Ok(frame) = LinFrame::new(address, payload) else {
            return false;
        };
        self.transfer = Transfer::Write(frame);
        self.tx_count = 0;
        self.state = BusState::Sending;
        uart.send_break();
        uart.write_byte(BREAK_CHAR);
        true
    }

    /// Send the header for `address` and prepare to receive the slave response
    ///
    /// The request is ignored unless the transport is [`BusState::Ready`]. Returns true if the
    /// request was accepted.
    pub fn read(&mut self, uart: &mut impl LinUart, address: LinAddress) -> bool {
        if self.state != BusState::Ready {
            return false;
        }
        self.transfer = Transfer::Read {
            pid: address.protected_id(),
        };
        self.tx_count = 0;
        self.rx_buffer.clear();
        self.echo_pending = true;
        self.state = BusState::Receiving;
        uart.send_break();
        uart.write_byte(BREAK_CHAR);
        true
    }

    /// Handle a transmit-complete event from the UART
    pub fn on_tx_complete(&mut self, uart: &mut impl LinUart) {
        let n = self.tx_count;
        self.tx_count = self.tx_count.saturating_add(1);
        match (self.state, self.transfer) {
            (BusState::Sending, Transfer::Write(frame)) => match frame.wire_byte(n) {
                Some(b) => uart.write_byte(b),
                None => {
                    self.transfer = Transfer::None;
                    self.state = BusState::Ready;
                }
            },
            (BusState::Receiving, Transfer::Read { pid }) => match n {
                0 => uart.write_byte(lyft_common::lin::SYNC_FIELD),
                1 => uart.write_byte(pid),
                _ => uart.enable_receive(),
            },
            _ => (),
        }
    }

    /// Handle a received byte from the UART
    pub fn on_rx_byte(&mut self, byte: u8) {
        if self.state != BusState::Receiving {
            return;
        }
        let Transfer::Read { pid } = self.transfer else {
            return;
        };
        // The transceiver reads back the identifier it just sent. Only the first byte can be
        // the echo, later bytes equal to the identifier are data.
        if core::mem::take(&mut self.echo_pending) && byte == pid {
            return;
        }
        // Overflowing bytes are dropped and will fail the checksum
        self.rx_buffer.push(byte).ok();
    }

    /// Consume the response collected since the last [`LinMaster::read`]
    ///
    /// The transport is returned to [`BusState::Ready`] (unless it is disabled) whether or not the
    /// response was valid. Invalid responses are dropped.
    pub fn take_response(&mut self, uart: &mut impl LinUart) -> Result<Response, ReceiveError> {
        uart.disable_receive();
        let pid = match self.transfer {
            Transfer::Read { pid } => Some(pid),
            _ => None,
        };
        let buffer = core::mem::take(&mut self.rx_buffer);
        self.echo_pending = false;
        self.tx_count = 0;
        self.transfer = Transfer::None;
        if self.state != BusState::Idle {
            self.state = BusState::Ready;
        }

        let len = buffer.len();
        if len < 2 {
            return TooShortSnafu { len }.fail();
        }
        let pid = pid.unwrap_or_default();
        let (data, checksum) = buffer.split_at(len - 1);
        let expected = ChecksumKind::for_receive(pid).compute(pid, data);
        if expected != checksum[0] {
            return ChecksumMismatchSnafu {
                expected,
                found: checksum[0],
            }
            .fail();
        }
        // data is shorter than the buffer capacity
        Ok(Vec::from_slice(data).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyft_common::lin::{checksum_classic, checksum_enhanced};

    #[derive(Debug, Default)]
    struct RecordingUart {
        breaks: usize,
        written: std::vec::Vec<u8>,
        receive_enabled: bool,
    }

    impl LinUart for RecordingUart {
        fn send_break(&mut self) {
            self.breaks += 1;
        }

        fn write_byte(&mut self, byte: u8) {
            self.written.push(byte);
        }

        fn enable_receive(&mut self) {
            self.receive_enabled = true;
        }

        fn disable_receive(&mut self) {
            self.receive_enabled = false;
        }
    }

    fn pump(master: &mut LinMaster, uart: &mut RecordingUart, events: usize) {
        for _ in 0..events {
            master.on_tx_complete(uart);
        }
    }

    #[test]
    fn test_requests_ignored_when_disabled() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        assert_eq!(BusState::Idle, master.state());
        assert!(!master.write(&mut uart, LinAddress::HEARTBEAT, &[0, 0, 0]));
        assert!(!master.read(&mut uart, LinAddress::MOTOR_LEFT));
        assert!(uart.written.is_empty());
        assert_eq!(0, uart.breaks);
    }

    #[test]
    fn test_write_pumps_frame() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        assert!(master.is_ready());

        assert!(master.write(&mut uart, LinAddress::HEARTBEAT, &[0, 0, 0]));
        assert_eq!(BusState::Sending, master.state());
        // A second request is ignored while sending
        assert!(!master.write(&mut uart, LinAddress::MASTER, &[1, 2, 3]));

        // break char, sync, pid, 3 data, checksum
        pump(&mut master, &mut uart, 6);
        assert_eq!(BusState::Sending, master.state());
        pump(&mut master, &mut uart, 1);
        assert_eq!(BusState::Ready, master.state());
        assert_eq!(1, uart.breaks);
        assert_eq!(
            vec![0x00, 0x55, 0x11, 0x00, 0x00, 0x00, checksum_enhanced(0x11, &[0, 0, 0])],
            uart.written
        );
    }

    #[test]
    fn test_diag_write_uses_classic_checksum() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        let payload = [0xFF, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        master.write(&mut uart, LinAddress::DIAG_TX, &payload);
        pump(&mut master, &mut uart, 12);
        assert_eq!(BusState::Ready, master.state());
        assert_eq!(Some(&checksum_classic(&payload)), uart.written.last());
        assert_eq!(0x3C, uart.written[2]);
    }

    #[test]
    fn test_invalid_payload_rejected() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        assert!(!master.write(&mut uart, LinAddress::MASTER, &[]));
        assert!(!master.write(&mut uart, LinAddress::MASTER, &[0; 9]));
        assert!(master.is_ready());
    }

    #[test]
    fn test_read_response() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        assert!(master.read(&mut uart, LinAddress::MOTOR_LEFT));
        pump(&mut master, &mut uart, 2);
        assert!(!uart.receive_enabled);
        pump(&mut master, &mut uart, 1);
        assert!(uart.receive_enabled);
        assert_eq!(vec![0x00, 0x55, 0x08], uart.written);

        let data = [0x34, 0x12, 0x00];
        // Echo of the identifier is discarded
        master.on_rx_byte(0x08);
        for b in data {
            master.on_rx_byte(b);
        }
        master.on_rx_byte(checksum_enhanced(0x08, &data));

        let response = master.take_response(&mut uart).unwrap();
        assert_eq!(&data[..], &response[..]);
        assert!(!uart.receive_enabled);
        assert!(master.is_ready());
    }

    #[test]
    fn test_data_equal_to_identifier_after_echo() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        master.read(&mut uart, LinAddress::MOTOR_LEFT);
        pump(&mut master, &mut uart, 3);

        // Position low byte happens to equal the identifier
        let data = [0x08, 0x03, 0x00, 0x00];
        master.on_rx_byte(0x08);
        for b in data {
            master.on_rx_byte(b);
        }
        master.on_rx_byte(checksum_enhanced(0x08, &data));
        let response = master.take_response(&mut uart).unwrap();
        assert_eq!(&data[..], &response[..]);

        // Without an echo, a leading identifier byte is still taken as the echo
        let data = [0x49, 0x01, 0x02];
        master.read(&mut uart, LinAddress::MOTOR_RIGHT);
        for b in data {
            master.on_rx_byte(b);
        }
        master.on_rx_byte(checksum_enhanced(0x49, &data));
        assert!(master.take_response(&mut uart).is_err());
    }

    #[test]
    fn test_diag_response_checksum_variant() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        let data = [0x09, 0x42, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

        master.read(&mut uart, LinAddress::DIAG_RX);
        for b in data {
            master.on_rx_byte(b);
        }
        master.on_rx_byte(checksum_classic(&data));
        assert_eq!(8, master.take_response(&mut uart).unwrap().len());

        // The enhanced variant does not validate on the diagnostic response
        master.read(&mut uart, LinAddress::DIAG_RX);
        for b in data {
            master.on_rx_byte(b);
        }
        let wrong = checksum_enhanced(0x7D, &data);
        master.on_rx_byte(wrong);
        assert_eq!(
            Err(ReceiveError::ChecksumMismatch {
                expected: checksum_classic(&data),
                found: wrong
            }),
            master.take_response(&mut uart)
        );
        assert!(master.is_ready());
    }

    #[test]
    fn test_short_response() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        master.read(&mut uart, LinAddress::MOTOR_RIGHT);
        master.on_rx_byte(0x12);
        assert_eq!(
            Err(ReceiveError::TooShort { len: 1 }),
            master.take_response(&mut uart)
        );
        assert!(master.is_ready());

        // Nothing at all received
        master.read(&mut uart, LinAddress::MOTOR_RIGHT);
        assert_eq!(
            Err(ReceiveError::TooShort { len: 0 }),
            master.take_response(&mut uart)
        );
    }

    #[test]
    fn test_bytes_ignored_unless_receiving() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        master.on_rx_byte(0x01);
        master.on_rx_byte(0x02);
        master.read(&mut uart, LinAddress::MOTOR_LEFT);
        assert_eq!(
            Err(ReceiveError::TooShort { len: 0 }),
            master.take_response(&mut uart)
        );
    }

    #[test]
    fn test_idle_transport_stays_idle() {
        let mut uart = RecordingUart::default();
        let mut master = LinMaster::new();
        master.init(&mut uart);
        master.deinit();
        assert!(master.take_response(&mut uart).is_err());
        assert_eq!(BusState::Idle, master.state());
    }
}
