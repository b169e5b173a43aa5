//! 比特流写入器.
//!
//! 按大端位序 (MSB first) 向字节缓冲区写入数据, 供 ADTS 头、
//! AudioSpecificConfig、STREAMINFO 和 FLAC 帧打包使用.

/// 比特流写入器
///
/// # 示例
/// ```
/// use yin_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bits(0b0001, 4);
/// bw.write_bits(0b01010101, 8);
/// assert_eq!(bw.finish(), vec![0b10110001, 0b01010101]);
/// ```
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前正在填充的字节
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 是否位于字节边界
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_count == 0
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        self.current_byte = (self.current_byte << 1) | (bit & 1) as u8;
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入值的低 N 位 (最多 32 位), 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);
        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - u32::from(self.bit_count);
            let take = remaining.min(available);
            let shift = remaining - take;
            let bits = ((value >> shift) & ((1u32 << take) - 1)) as u8;
            self.current_byte = if take == 8 {
                bits
            } else {
                (self.current_byte << take) | bits
            };
            self.bit_count += take as u8;
            if self.bit_count == 8 {
                self.data.push(self.current_byte);
                self.current_byte = 0;
                self.bit_count = 0;
            }
            remaining -= take;
        }
    }

    /// 写入值的低 N 位 (最多 64 位)
    pub fn write_bits_u64(&mut self, value: u64, n: u32) {
        if n > 32 {
            self.write_bits((value >> 32) as u32, n - 32);
            self.write_bits(value as u32, 32);
        } else {
            self.write_bits(value as u32, n);
        }
    }

    /// 写入有符号整数 (二进制补码, N 位)
    pub fn write_bits_signed(&mut self, value: i32, n: u32) {
        let mask = ((1u64 << n) - 1) as u32;
        self.write_bits(value as u32 & mask, n);
    }

    /// 写入一元编码: `count` 个 `!stop_bit`, 然后一个 `stop_bit`
    pub fn write_unary(&mut self, count: u32, stop_bit: u32) {
        let fill = 1 - (stop_bit & 1);
        for _ in 0..count {
            self.write_bit(fill);
        }
        self.write_bit(stop_bit & 1);
    }

    /// 写入 FLAC 使用的 UTF-8 风格变长整数 (最多 36 位)
    pub fn write_utf8_u64(&mut self, value: u64) {
        if value < 0x80 {
            self.write_bits(value as u32, 8);
            return;
        }
        let total_bytes: u32 = match value {
            v if v < 0x800 => 2,
            v if v < 0x1_0000 => 3,
            v if v < 0x20_0000 => 4,
            v if v < 0x400_0000 => 5,
            v if v < 0x8000_0000 => 6,
            _ => 7,
        };
        let continuation = total_bytes - 1;
        let lead_mask = (0xFF00u32 >> total_bytes) & 0xFF;
        let lead_bits = (value >> (6 * continuation)) as u32;
        self.write_bits(lead_mask | lead_bits, 8);
        for i in (0..continuation).rev() {
            let chunk = ((value >> (6 * i)) & 0x3F) as u32;
            self.write_bits(0x80 | chunk, 8);
        }
    }

    /// 对齐到字节边界 (用 0 填充)
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            self.data.push(self.current_byte << pad);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 已完成的字节 (不含正在填充的字节)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 写入完整字节
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_count == 0 {
            self.data.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }

    /// 完成写入并返回字节数据, 不足一字节的尾部用 0 填充
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_bits_cross_byte() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.write_bits(0b1_1000_1111, 9);
        bw.write_bits(0b0110, 4);
        assert_eq!(bw.finish(), vec![0b1011_1000, 0b1111_0110]);
    }

    #[test]
    fn test_write_bits_32_and_64() {
        let mut bw = BitWriter::new();
        bw.write_bits(0xFF00_FF00, 32);
        bw.write_bits_u64(0x1_2345_6789, 36);
        bw.write_bits(0, 4);
        assert_eq!(
            bw.finish(),
            vec![0xFF, 0x00, 0xFF, 0x00, 0x12, 0x34, 0x56, 0x78, 0x90]
        );
    }

    #[test]
    fn test_write_signed() {
        let mut bw = BitWriter::new();
        bw.write_bits_signed(-1, 4);
        bw.write_bits_signed(3, 4);
        bw.write_bits_signed(-128, 8);
        assert_eq!(bw.finish(), vec![0xF3, 0x80]);
    }

    #[test]
    fn test_write_unary() {
        let mut bw = BitWriter::new();
        bw.write_unary(3, 1); // 0001
        bw.write_unary(0, 1); // 1
        assert_eq!(bw.bits_written(), 5);
        assert_eq!(bw.finish(), vec![0b0001_1000]);
    }

    #[test]
    fn test_utf8_变长编码() {
        let encode = |v: u64| {
            let mut bw = BitWriter::new();
            bw.write_utf8_u64(v);
            bw.finish()
        };
        assert_eq!(encode(0x7F), vec![0x7F]);
        assert_eq!(encode(0x80), vec![0xC2, 0x80]);
        assert_eq!(encode(0x7FF), vec![0xDF, 0xBF]);
        assert_eq!(encode(0x800), vec![0xE0, 0xA0, 0x80]);
        assert_eq!(encode(0x1_0000), vec![0xF0, 0x90, 0x80, 0x80]);
    }

    #[test]
    fn test_align_and_write_bytes() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        assert!(!bw.is_byte_aligned());
        bw.align_to_byte();
        assert!(bw.is_byte_aligned());
        bw.write_bytes(&[0x01, 0x02]);
        assert_eq!(bw.data(), &[0b1010_0000, 0x01, 0x02]);
    }
}
