//! CRC-16 (reflected polynomial 0xA001, initial value 0)

/// Reflected CRC-16 polynomial
pub const CRC16_POLY: u16 = 0xA001;

/// Fold one byte into a running CRC, bit at a time
pub fn crc16_update(mut crc: u16, byte: u8) -> u16 {
    crc ^= byte as u16;
    for _ in 0..8 {
        crc = if crc & 1 != 0 {
            (crc >> 1) ^ CRC16_POLY
        } else {
            crc >> 1
        };
    }
    crc
}

/// CRC-16 of a whole buffer
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, &byte| crc16_update(crc, byte))
}
