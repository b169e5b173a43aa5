//! CRC 校验和计算.
//!
//! FLAC 帧头使用 CRC-8 (多项式 0x07), 帧尾使用 CRC-16 (多项式 0x8005), 初始值均为 0.

const CRC8_TABLE: [u8; 256] = build_crc8_table(0x07);
const CRC16_TABLE: [u16; 256] = build_crc16_table(0x8005);

const fn build_crc8_table(poly: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ poly } else { crc << 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn build_crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ poly } else { crc << 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// 计算 CRC-8
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

/// 计算 CRC-16
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| {
        (crc << 8) ^ CRC16_TABLE[((crc >> 8) as u8 ^ byte) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_check_value() {
        assert_eq!(crc8(b""), 0);
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b""), 0);
        assert_eq!(crc16(b"123456789"), 0xFEE8);
    }

    #[test]
    fn test_crc_追加校验值后归零() {
        let mut data = b"yin".to_vec();
        let crc = crc8(&data);
        data.push(crc);
        assert_eq!(crc8(&data), 0);
    }
}
