/// Register-level interface to an SDIO host peripheral's command path.
///
/// The driver never touches hardware directly; it drives the six registers
/// below through this trait. An implementation over a real peripheral maps
/// each method to one volatile register access (on an STM32-style SDIO
/// block: ARG, CMD, STA, ICR, RESPCMD and RESP1..RESP4). Clock and pin
/// configuration stay outside of this trait and must be done before the
/// first command is issued.
///
/// Register ordering matters: the argument register has to be written
/// before the command register, and status bits are acknowledged through
/// [`clear_status`](SdioBus::clear_status) only after they have been
/// consumed.
pub trait SdioBus {
    /// Write the 32-bit command argument register.
    fn write_argument(&mut self, argument: u32);

    /// Write the command register (index, response length and command-path
    /// state machine enable). Writing this register starts the command
    /// transmission.
    fn write_command(&mut self, control: u32);

    /// Read the command status register.
    fn status(&mut self) -> u32;

    /// Acknowledge the status bits set in `mask`.
    fn clear_status(&mut self, mask: u32);

    /// Read the command index echoed by the last received response.
    fn response_command(&mut self) -> u8;

    /// Read one of the four response words; `index` is 0..=3, word 0 holds
    /// the most significant part of a long response.
    fn response_word(&mut self, index: usize) -> u32;
}
