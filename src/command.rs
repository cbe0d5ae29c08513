use crate::consts::commands;

/// Response class of an SD command, as seen by the host peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum ResponseType {
    /// No response expected.
    None,
    /// Short response carrying the card status.
    R1,
    /// Long response, CID or CSD register.
    R2,
    /// Short response carrying the OCR register. The CRC and command index
    /// fields of an R3 response are architecturally invalid.
    R3,
    /// Short response publishing the relative card address.
    R6,
    /// Short response to the interface condition check.
    R7,
}

/// Descriptor for one supported command: its response shape and which
/// timeout policy gates its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdInfo {
    /// Command index (0..=63).
    pub index: u8,
    /// Expected response class.
    pub response_type: ResponseType,
    /// Completion is additionally bounded by a software-counted budget.
    pub use_software_timeout: bool,
    /// The peripheral's response-timeout flag is meaningless for this
    /// command; wait for the command-sent flag instead.
    pub ignore_hardware_timeout: bool,
}

impl CmdInfo {
    const fn new(
        index: u8,
        response_type: ResponseType,
        use_software_timeout: bool,
        ignore_hardware_timeout: bool,
    ) -> Self {
        CmdInfo {
            index,
            response_type,
            use_software_timeout,
            ignore_hardware_timeout,
        }
    }
}

/// Descriptors for the normal command namespace.
static COMMANDS: [CmdInfo; 6] = [
    CmdInfo::new(commands::CMD0, ResponseType::None, true, true),
    CmdInfo::new(commands::CMD2, ResponseType::R2, false, false),
    CmdInfo::new(commands::CMD3, ResponseType::R6, false, false),
    CmdInfo::new(commands::CMD8, ResponseType::R7, true, false),
    CmdInfo::new(commands::CMD9, ResponseType::R2, false, false),
    CmdInfo::new(commands::CMD55, ResponseType::R1, false, false),
];

/// Descriptors for the application-specific command namespace, valid only
/// for the command issued right after APP_CMD.
static APP_COMMANDS: [CmdInfo; 1] =
    [CmdInfo::new(commands::ACMD41, ResponseType::R3, false, false)];

/// Look up the descriptor for `index` in the selected namespace.
///
/// Returns `None` when the command is not supported; issuing such a
/// command is a programming error and the transmitter refuses it instead
/// of driving the bus with an undefined descriptor.
pub fn lookup(app_command: bool, index: u8) -> Option<&'static CmdInfo> {
    let table: &[CmdInfo] = if app_command {
        &APP_COMMANDS
    } else {
        &COMMANDS
    };

    table.iter().find(|cmd| cmd.index == index)
}
