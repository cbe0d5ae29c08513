/// Represents config for [`SdioCard`](crate::SdioCard).
pub trait SdioConfig {
    /// Software-counted completion budget, in status poll iterations.
    const SOFT_TIMEOUT_CYCLES: u32;
    /// Max polls of the response-echo field before a response is declared
    /// illegal.
    const ECHO_POLL_ATTEMPTS: u32;
    /// Repeated reads of a response word before its value is used, to let
    /// the register settle. At least one read is always performed.
    const RESPONSE_SETTLE_READS: u32;
    /// Max APP_CMD/SD_SEND_OP_COND round trips while waiting for the card
    /// to finish powering up.
    const OP_COND_ATTEMPTS: u32;
}

/// Default implementation of [`SdioConfig`](crate::SdioConfig).
pub struct DefaultSdioConfig;

impl SdioConfig for DefaultSdioConfig {
    const SOFT_TIMEOUT_CYCLES: u32 = 10_000;
    const ECHO_POLL_ATTEMPTS: u32 = 100;
    const RESPONSE_SETTLE_READS: u32 = 1_000;
    const OP_COND_ATTEMPTS: u32 = 0xFFFF;
}
