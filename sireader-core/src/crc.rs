//! SportIdent CRC16
//!
//! From the SI programmer's manual:
//! 1. Seed with the first two bytes (big-endian)
//! 2. Feed the rest as big-endian 16-bit words, zero padded. An even
//!    remainder still gets one trailing zero word.
//! 3. Shift each word through the seed bit by bit, XOR with 0x8005 when
//!    the seed's top bit falls out
//! 4. Return the low 16 bits

use tracing::trace;

/// Generator polynomial
pub const POLYNOMIAL: u16 = 0x8005;

const TOP_BIT: u16 = 0x8000;

/// Calculate the CRC of `data`
///
/// Inputs shorter than two bytes yield 0.
///
/// # Examples
///
/// ```
/// use sireader_core::crc;
///
/// // command 0xF0, length 1, parameter 'M'
/// let crc = crc::calculate(&[0xF0, 0x01, 0x4D]);
/// println!("CRC: 0x{:04X}", crc);
/// ```
pub fn calculate(data: &[u8]) -> u16 {
    if data.len() < 2 {
        return 0;
    }

    let mut crc = u16::from_be_bytes([data[0], data[1]]);
    let rest = &data[2..];

    if !rest.is_empty() {
        // Pad to an even length; even remainders still get a zero word
        let mut words = Vec::with_capacity(rest.len() + 2);
        words.extend_from_slice(rest);
        if rest.len() % 2 == 0 {
            words.extend_from_slice(&[0, 0]);
        } else {
            words.push(0);
        }

        for chunk in words.chunks_exact(2) {
            let mut val = u16::from_be_bytes([chunk[0], chunk[1]]);

            for _ in 0..16 {
                let carry = u16::from(val & TOP_BIT != 0);
                if crc & TOP_BIT != 0 {
                    crc = ((crc << 1) | carry) ^ POLYNOMIAL;
                } else {
                    crc = (crc << 1) | carry;
                }
                val <<= 1;
            }
        }
    }

    trace!(
        len = data.len(),
        crc = format!("0x{:04X}", crc),
        "Calculated CRC"
    );

    crc
}

/// Verify a received CRC
pub fn verify(data: &[u8], expected: u16) -> bool {
    calculate(data) == expected
}
