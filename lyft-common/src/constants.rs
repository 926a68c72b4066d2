//! Constants defining diagnostic commands, node registers and special values

/// Sub-commands carried in byte 1 of a diagnostic request
pub mod diag_commands {
    /// Prepare the nodes for scanning, or finalize after it
    pub const PREPARE: u8 = 0x01;
    /// Probe a node address, or commit a scan
    pub const SCAN: u8 = 0x02;
    /// Write a logical identifier to the node
    pub const WRITE: u8 = 0x04;
    /// Read one register from the node
    pub const READ: u8 = 0x06;
    /// Announce the diagnostic session
    pub const ANNOUNCE: u8 = 0x07;
}

/// Node registers read out during discovery
pub mod registers {
    /// Status/capability byte
    pub const STATUS: u8 = 0x09;
    /// High byte of the lower travel limit
    pub const LOWER_LIMIT_HI: u8 = 0x0A;
    /// Low byte of the lower travel limit
    pub const LOWER_LIMIT_LO: u8 = 0x0B;
    /// High byte of the upper travel limit
    pub const UPPER_LIMIT_HI: u8 = 0x0C;
    /// Low byte of the upper travel limit
    pub const UPPER_LIMIT_LO: u8 = 0x0D;
}

/// Special values used in diagnostic and application frames
pub mod values {
    /// Target byte addressing every node on the bus
    pub const BROADCAST: u8 = 0xFF;
    /// Target byte used for the configuration phase frames
    pub const CONFIGURATION: u8 = 0xD0;
    /// Padding for unused diagnostic bytes
    pub const FILLER: u8 = 0xFF;
    /// Identifier byte sent before any node has been assigned one
    pub const UNASSIGNED_IDENTIFIER: u8 = 0x07;
    /// Marker sent while no node has answered a scan yet
    pub const NO_NODE_FOUND: u8 = 0xFF;
    /// Marker sent once at least one node has answered a scan
    pub const NODE_FOUND: u8 = 0x00;
    /// First response byte acknowledging an identifier write
    pub const WRITE_ACK: u8 = 0xFF;
    /// Position sent along with the limit release instructions
    pub const LIMIT_RELEASE_POSITION: u16 = 0xFFF6;
}
