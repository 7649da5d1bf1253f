// ABOUTME: GSM 03.38 default alphabet with its escape extension table and septet packing
// ABOUTME: Converts text to septets and back, and packs septets into octets for TPDU user data

/// Escape septet introducing a character from the extension table
pub const ESCAPE: u8 = 0x1B;

/// GSM 03.38 default alphabet, indexed by septet value.
/// Position 0x1B is the escape and never maps to a character on its own.
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

/// Extension table: (septet following the escape, character)
const EXTENDED: [(u8, char); 10] = [
    (0x0A, '\u{0c}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

fn basic_septet(c: char) -> Option<u8> {
    if c == '\u{1b}' {
        return None;
    }
    BASIC.iter().position(|&b| b == c).map(|p| p as u8)
}

fn extended_septet(c: char) -> Option<u8> {
    EXTENDED.iter().find(|(_, e)| *e == c).map(|(s, _)| *s)
}

/// Returns the septets needed for `c`: one for the basic table, two for the
/// extension table, `None` when the character is not representable.
pub fn char_width(c: char) -> Option<usize> {
    if basic_septet(c).is_some() {
        Some(1)
    } else if extended_septet(c).is_some() {
        Some(2)
    } else {
        None
    }
}

/// True if every character of `text` can be sent with the default alphabet
pub fn is_representable(text: &str) -> bool {
    text.chars().all(|c| char_width(c).is_some())
}

/// Number of septets `text` occupies, or `None` if it is not representable
pub fn septet_count(text: &str) -> Option<usize> {
    text.chars().map(char_width).sum()
}

/// Converts text to unpacked septets.
///
/// Returns the first character that has no default-alphabet representation as
/// the error value.
pub fn encode(text: &str) -> Result<Vec<u8>, char> {
    let mut septets = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(s) = basic_septet(c) {
            septets.push(s);
        } else if let Some(s) = extended_septet(c) {
            septets.push(ESCAPE);
            septets.push(s);
        } else {
            return Err(c);
        }
    }
    Ok(septets)
}

/// Converts unpacked septets back to text.
///
/// An escape followed by a value missing from the extension table decodes as
/// the basic character for that value; a trailing lone escape is dropped.
pub fn decode(septets: &[u8]) -> String {
    let mut text = String::with_capacity(septets.len());
    let mut iter = septets.iter().map(|s| s & 0x7F);
    while let Some(septet) = iter.next() {
        if septet == ESCAPE {
            let Some(next) = iter.next() else { break };
            match EXTENDED.iter().find(|(s, _)| *s == next) {
                Some((_, c)) => text.push(*c),
                None => text.push(BASIC[next as usize]),
            }
        } else {
            text.push(BASIC[septet as usize]);
        }
    }
    text
}

/// Packs septets into octets, least significant bit first.
///
/// `fill_bits` zero bits are emitted before the first septet so that text
/// following a user data header starts on a septet boundary.
pub fn pack(septets: &[u8], fill_bits: u8) -> Vec<u8> {
    let total_bits = fill_bits as usize + septets.len() * 7;
    let mut octets = Vec::with_capacity(total_bits.div_ceil(8));
    let mut acc: u32 = 0;
    let mut acc_bits = fill_bits as u32;

    for &septet in septets {
        acc |= ((septet & 0x7F) as u32) << acc_bits;
        acc_bits += 7;
        while acc_bits >= 8 {
            octets.push((acc & 0xFF) as u8);
            acc >>= 8;
            acc_bits -= 8;
        }
    }
    if acc_bits > 0 {
        octets.push((acc & 0xFF) as u8);
    }
    octets
}

/// Unpacks up to `count` septets from packed octets
pub fn unpack(octets: &[u8], count: usize) -> Vec<u8> {
    let mut septets = Vec::with_capacity(count);
    let mut acc: u32 = 0;
    let mut acc_bits = 0u32;

    for &octet in octets {
        acc |= (octet as u32) << acc_bits;
        acc_bits += 8;
        while acc_bits >= 7 && septets.len() < count {
            septets.push((acc & 0x7F) as u8);
            acc >>= 7;
            acc_bits -= 7;
        }
        if septets.len() == count {
            break;
        }
    }
    septets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_characters_round_trip() {
        let text = "Hello world! @£$¥èé 0123456789";
        let septets = encode(text).unwrap();
        assert_eq!(septets.len(), text.chars().count());
        assert_eq!(decode(&septets), text);
    }

    #[test]
    fn extension_table_uses_escape() {
        let septets = encode("€[]").unwrap();
        assert_eq!(septets, vec![0x1B, 0x65, 0x1B, 0x3C, 0x1B, 0x3E]);
        assert_eq!(decode(&septets), "€[]");
        assert_eq!(septet_count("a{b}"), Some(6));
    }

    #[test]
    fn unrepresentable_character_is_reported() {
        assert_eq!(encode("Helló"), Err('ó'));
        assert!(!is_representable("worłd"));
        assert!(is_representable("Hellò wor£d!"));
        assert_eq!(septet_count("ł"), None);
    }

    #[test]
    fn packs_hello_world() {
        let septets = encode("Hello world!").unwrap();
        let packed = pack(&septets, 0);
        assert_eq!(
            packed,
            vec![0xC8, 0x32, 0x9B, 0xFD, 0x06, 0xDD, 0xDF, 0x72, 0x36, 0x39, 0x04]
        );
        assert_eq!(unpack(&packed, septets.len()), septets);
    }

    #[test]
    fn packs_with_fill_bits() {
        let septets = encode("12").unwrap();
        let packed = pack(&septets, 1);
        assert_eq!(packed[0], 0x62);
        assert_eq!(packed[1], 0x32);
    }

    #[test]
    fn unpack_stops_at_count() {
        let packed = pack(&encode("abcdefgh").unwrap(), 0);
        assert_eq!(decode(&unpack(&packed, 3)), "abc");
    }

    #[test]
    fn unknown_escape_falls_back_to_basic_table() {
        assert_eq!(decode(&[0x1B, 0x41]), "A");
        assert_eq!(decode(&[0x41, 0x1B]), "A");
    }
}
