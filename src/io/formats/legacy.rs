//! Windows-1251 decoding for spreadsheet exports saved in the legacy
//! Cyrillic code page.

use encoding_rs::WINDOWS_1251;

/// Decodes Windows-1251 bytes.
///
/// Every byte maps to one character (`0x98` becomes U+FFFD), so decoding
/// never fails.
#[must_use]
pub fn decode_windows_1251(bytes: &[u8]) -> String {
    let (text, _had_errors) = WINDOWS_1251.decode_without_bom_handling(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        assert_eq!(decode_windows_1251(b"Widget 9.99"), "Widget 9.99");
    }

    #[test]
    fn test_cyrillic() {
        // "Привет" in Windows-1251
        let bytes = [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        assert_eq!(decode_windows_1251(&bytes), "Привет");
    }

    #[test]
    fn test_high_half() {
        assert_eq!(decode_windows_1251(&[0xA8, 0xB8, 0xB9]), "Ёё№");
        assert_eq!(decode_windows_1251(&[0x88]), "€");
    }

    #[test]
    fn test_unassigned_byte_is_replaced() {
        assert_eq!(decode_windows_1251(&[0x41, 0x98, 0x42]), "A\u{FFFD}B");
    }
}
