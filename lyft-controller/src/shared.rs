//! Sharing a desk between the main loop and UART interrupts
//!
//! On an MCU, the transmit-complete and byte-received events arrive in interrupt context while
//! the tick runs in the main loop. A [`SharedDesk`] can be stored in a static, and guards every
//! access with a critical section.
//!
//! ```ignore
//! static DESK: SharedDesk = SharedDesk::new(DeskConfig::DEFAULT);
//!
//! #[interrupt]
//! fn USART1() {
//!     if tx_complete() {
//!         DESK.on_tx_complete(&mut uart());
//!     }
//!     if let Some(byte) = rx_byte() {
//!         DESK.on_rx_byte(byte);
//!     }
//! }
//! ```
use core::cell::RefCell;

use critical_section::Mutex;
use lyft_common::{traits::LinUart, DeskConfig};

use crate::desk::Desk;

/// A [`Desk`] guarded by a critical section mutex
pub struct SharedDesk {
    inner: Mutex<RefCell<Desk>>,
}

impl core::fmt::Debug for SharedDesk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedDesk").finish_non_exhaustive()
    }
}

impl SharedDesk {
    /// Create a new shared desk
    pub const fn new(config: DeskConfig) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Desk::new(config))),
        }
    }

    /// Run `f` with exclusive access to the desk
    pub fn with<R>(&self, f: impl FnOnce(&mut Desk) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// See [`Desk::tick`]
    pub fn tick(&self, uart: &mut impl LinUart) {
        self.with(|desk| desk.tick(uart))
    }

    /// See [`Desk::on_tx_complete`]
    pub fn on_tx_complete(&self, uart: &mut impl LinUart) {
        self.with(|desk| desk.on_tx_complete(uart))
    }

    /// See [`Desk::on_rx_byte`]
    pub fn on_rx_byte(&self, byte: u8) {
        self.with(|desk| desk.on_rx_byte(byte))
    }

    /// See [`Desk::is_busy`]
    pub fn is_busy(&self) -> bool {
        self.with(|desk| desk.is_busy())
    }
}
