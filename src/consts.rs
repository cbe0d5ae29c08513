pub mod commands {
    /// GO_IDLE_STATE - reset the card to idle state.
    pub const CMD0: u8 = 0;
    /// ALL_SEND_CID - ask the card to send its identification registers.
    pub const CMD2: u8 = 2;
    /// SEND_RELATIVE_ADDR - ask the card to publish a relative address.
    pub const CMD3: u8 = 3;
    /// SEND_IF_COND - verify the card interface operating condition.
    pub const CMD8: u8 = 8;
    /// SEND_CSD - read the Card Specific Data (CSD register).
    pub const CMD9: u8 = 9;
    /// APP_CMD - escape for application specific command.
    pub const CMD55: u8 = 55;
    /// SD_SEND_OP_COND - sends host capacity support information and
    /// activates the card's initialization process.
    pub const ACMD41: u8 = 41;
}

pub mod status {
    /// Response CRC check failed.
    pub const CCRCFAIL: u32 = 1 << 0;
    /// Response hardware timeout.
    pub const CTIMEOUT: u32 = 1 << 2;
    /// Command response received.
    pub const CMDREND: u32 = 1 << 6;
    /// Command sent (no response expected).
    pub const CMDSENT: u32 = 1 << 7;
    /// All command-path completion flags.
    pub const COMPLETION_FLAGS: u32 = CMDREND | CCRCFAIL | CTIMEOUT;
    /// Every acknowledgeable command status bit, for the clear register.
    pub const CLEAR_MASK: u32 = 0x5FF;
}

pub mod control {
    /// Command-path state machine enable.
    pub const CPSMEN: u32 = 1 << 10;
    /// Short (48-bit) response expected.
    pub const WAITRESP_SHORT: u32 = 0b01 << 6;
    /// Long (136-bit) response expected.
    pub const WAITRESP_LONG: u32 = 0b11 << 6;
    /// Command index field of the command register.
    pub const INDEX_MASK: u32 = 0x3F;
}

pub mod arguments {
    /// CMD8 argument: 2.7-3.6V supply marker plus the 0xAA check pattern.
    pub const IF_COND_CHECK: u32 = 0x1AA;
    /// ACMD41 voltage window (2.7-3.6V).
    pub const VOLTAGE_WINDOW: u32 = 0x8010_0000;
    /// ACMD41 host high capacity support (SDHC/SDXC).
    pub const HIGH_CAPACITY: u32 = 0x4000_0000;
}

pub mod masks {
    /// Card error bits of an R1 card status word.
    pub const R1_ERRORS: u32 = 0xFDFF_E008;
    /// R6 general unknown error.
    pub const R6_GENERAL_UNKNOWN_ERROR: u32 = 0x2000;
    /// R6 illegal command.
    pub const R6_ILLEGAL_COMMAND: u32 = 0x4000;
    /// R6 command CRC failed.
    pub const R6_COM_CRC_FAILED: u32 = 0x8000;
    /// All R6 error bits combined.
    pub const R6_ERRORS: u32 =
        R6_GENERAL_UNKNOWN_ERROR | R6_ILLEGAL_COMMAND | R6_COM_CRC_FAILED;
    /// OCR power-up complete bit.
    pub const OCR_POWER_UP: u32 = 1 << 31;
}
