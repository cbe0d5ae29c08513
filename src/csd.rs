use bitfield::bitfield;
use size::{consts::KiB, Size};

/// Long (136-bit) response payload as delivered by the peripheral's four
/// response words, most significant word first.
pub type ResponseWords = [u32; 4];

const BLOCK_SIZE_U64: u64 = 512;

fn words_to_u128(words: ResponseWords) -> u128 {
    (u128::from(words[0]) << 96)
        | (u128::from(words[1]) << 64)
        | (u128::from(words[2]) << 32)
        | u128::from(words[3])
}

bitfield! {
    /// Card Identification register.
    pub struct Cid(u128);
    pub u8, manufacturer_id, _: 127, 120;
    pub u16, oem_application_id, _: 119, 104;
    pub u8, product_revision, _: 63, 56;
    pub u32, product_serial_number, _: 55, 24;
    pub u8, manufacturing_year, _: 19, 12;
    pub u8, manufacturing_month, _: 11, 8;
    pub u8, crc, _: 7, 1;
}

impl Cid {
    /// Raw register value.
    pub fn raw(&self) -> u128 {
        self.0
    }
}

impl From<ResponseWords> for Cid {
    fn from(words: ResponseWords) -> Self {
        Cid(words_to_u128(words))
    }
}

bitfield! {
    /// Card Specific Data, version 1.
    pub struct CsdV1(u128);
    pub u8, version, _: 127, 126;
    pub u8, data_read_access_time1, _: 119, 112;
    pub u8, data_read_access_time2, _: 111, 104;
    pub u8, max_data_transfer_rate, _: 103, 96;
    pub u16, card_command_classes, _: 95, 84;
    pub u8, read_block_length, _: 83, 80;
    pub read_partial_blocks, _: 79;
    pub write_block_misalignment, _: 78;
    pub read_block_misalignment, _: 77;
    pub dsr_implemented, _: 76;
    pub u16, device_size, _: 73, 62;
    pub u8, device_size_multiplier, _: 49, 47;
    pub erase_single_block_enabled, _: 46;
    pub u8, erase_sector_size, _: 45, 39;
    pub write_protect_group_enable, _: 31;
    pub u8, write_speed_factor, _: 28, 26;
    pub write_partial_blocks_allowed, _: 21;
    pub permanent_write_protection, _: 13;
    pub temporary_write_protection, _: 12;
    pub u8, file_format, _: 11, 10;
    pub u8, crc, _: 7, 1;
}

bitfield! {
    /// Card Specific Data, version 2.
    pub struct CsdV2(u128);
    pub u8, version, _: 127, 126;
    pub u8, data_read_access_time1, _: 119, 112;
    pub u8, data_read_access_time2, _: 111, 104;
    pub u8, max_data_transfer_rate, _: 103, 96;
    pub u16, card_command_classes, _: 95, 84;
    pub u8, read_block_length, _: 83, 80;
    pub read_partial_blocks, _: 79;
    pub write_block_misalignment, _: 78;
    pub read_block_misalignment, _: 77;
    pub dsr_implemented, _: 76;
    pub u32, device_size, _: 69, 48;
    pub erase_single_block_enabled, _: 46;
    pub u8, erase_sector_size, _: 45, 39;
    pub write_protect_group_enable, _: 31;
    pub u8, write_speed_factor, _: 28, 26;
    pub write_partial_blocks_allowed, _: 21;
    pub permanent_write_protection, _: 13;
    pub temporary_write_protection, _: 12;
    pub u8, file_format, _: 11, 10;
    pub u8, crc, _: 7, 1;
}

/// Card Specific Data, generic container.
pub enum Csd {
    V1(CsdV1),
    V2(CsdV2),
}

impl Csd {
    /// Raw register value.
    pub fn raw(&self) -> u128 {
        match self {
            Csd::V1(csd) => csd.0,
            Csd::V2(csd) => csd.0,
        }
    }
}

impl From<ResponseWords> for Csd {
    fn from(words: ResponseWords) -> Self {
        let raw = words_to_u128(words);

        // CSD_STRUCTURE selects the register layout.
        match CsdV1(raw).version() {
            0 => Csd::V1(CsdV1(raw)),
            _ => Csd::V2(CsdV2(raw)),
        }
    }
}

/// Represents capacity provider.
pub trait CapacityProvider {
    /// Returns the card capacity in bytes.
    fn card_capacity(&self) -> Size;

    /// Returns the card capacity in 512-byte blocks.
    fn card_capacity_blocks(&self) -> u64;
}

impl CapacityProvider for CsdV1 {
    fn card_capacity(&self) -> Size {
        Size::from_bytes(
            (u64::from(self.device_size()) + 1)
                << (self.device_size_multiplier() + self.read_block_length() + 2),
        )
    }

    fn card_capacity_blocks(&self) -> u64 {
        (u64::from(self.device_size()) + 1)
            << (self.device_size_multiplier() + self.read_block_length() - 7)
    }
}

impl CapacityProvider for CsdV2 {
    fn card_capacity(&self) -> Size {
        Size::from_bytes(self.card_capacity_blocks() * BLOCK_SIZE_U64)
    }

    fn card_capacity_blocks(&self) -> u64 {
        (u64::from(self.device_size()) + 1) * (KiB as u64)
    }
}

impl CapacityProvider for Csd {
    fn card_capacity(&self) -> Size {
        match self {
            Csd::V1(csd) => csd.card_capacity(),
            Csd::V2(csd) => csd.card_capacity(),
        }
    }

    fn card_capacity_blocks(&self) -> u64 {
        match self {
            Csd::V1(csd) => csd.card_capacity_blocks(),
            Csd::V2(csd) => csd.card_capacity_blocks(),
        }
    }
}
