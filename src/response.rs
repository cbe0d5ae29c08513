use crate::consts::masks;

use bitfield::bitfield;

bitfield! {
    /// R1 card status bitset.
    pub struct CardStatus(u32);
    pub out_of_range, _: 31;
    pub address_error, _: 30;
    pub block_len_error, _: 29;
    pub erase_seq_error, _: 28;
    pub erase_param, _: 27;
    pub wp_violation, _: 26;
    pub lock_unlock_failed, _: 24;
    pub com_crc_error, _: 23;
    pub illegal_command, _: 22;
    pub card_ecc_failed, _: 21;
    pub cc_error, _: 20;
    pub general_error, _: 19;
    pub csd_overwrite, _: 16;
    pub wp_erase_skip, _: 15;
    pub ready_for_data, _: 8;
    pub app_cmd, _: 5;
    pub ake_seq_error, _: 3;
}

impl CardStatus {
    /// Card error bits of the status word.
    pub fn errors(&self) -> u32 {
        self.0 & masks::R1_ERRORS
    }

    /// Returns true if the card reported any error.
    pub fn has_errors(&self) -> bool {
        self.errors() != 0
    }
}

bitfield! {
    /// R3 OCR register bitset.
    pub struct Ocr(u32);
    pub power_up_complete, _: 31;
    pub card_capacity_status, _: 30;
    pub uhs2_card_status, _: 29;
    pub over_2tb_support, _: 27;
    pub switch_to_1v8_accepted, _: 24;
    pub u32, voltage_window, _: 23, 0;
}

bitfield! {
    /// R6 published-RCA response bitset.
    pub struct PublishedRca(u32);
    pub u16, address, _: 31, 16;
    pub com_crc_failed, _: 15;
    pub illegal_command, _: 14;
    pub general_unknown_error, _: 13;
}

impl PublishedRca {
    /// Returns true if any of the three R6 error bits is set.
    pub fn has_errors(&self) -> bool {
        self.0 & masks::R6_ERRORS != 0
    }
}
