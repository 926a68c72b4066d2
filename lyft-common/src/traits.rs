//! Common traits

/// Byte level access to the UART peripheral driving the LIN transceiver
///
/// The bus transport calls these from its entry points and from its byte completion callbacks.
/// A hardware implementation is expected to raise a transmit-complete event for every byte
/// written, including the break, and a byte-received event for every byte read back while
/// receiving is enabled.
pub trait LinUart {
    /// Start the break field of a new frame
    fn send_break(&mut self);
    /// Write one byte to the bus
    fn write_byte(&mut self, byte: u8);
    /// Start delivering received bytes
    fn enable_receive(&mut self);
    /// Stop delivering received bytes
    fn disable_receive(&mut self);
}

impl<T: LinUart + ?Sized> LinUart for &mut T {
    fn send_break(&mut self) {
        (**self).send_break()
    }

    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }

    fn enable_receive(&mut self) {
        (**self).enable_receive()
    }

    fn disable_receive(&mut self) {
        (**self).disable_receive()
    }
}
