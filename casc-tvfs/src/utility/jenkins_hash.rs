//! Bob Jenkins' lookup3 `hashlittle`, the checksum stored in CASC guarded block headers.

use byteorder::{ByteOrder, LittleEndian};

/// Hashes `data` with lookup3 `hashlittle`, seeded with `initval`.
pub fn hashlittle(data: &[u8], initval: u32) -> u32 {
    let length = u32::try_from(data.len()).unwrap_or(u32::MAX);
    let mut a = 0xdead_beef_u32.wrapping_add(length).wrapping_add(initval);
    let mut b = a;
    let mut c = a;

    if data.is_empty() {
        return c;
    }

    let mut k = data;
    while k.len() > 12 {
        a = a.wrapping_add(LittleEndian::read_u32(&k[0..4]));
        b = b.wrapping_add(LittleEndian::read_u32(&k[4..8]));
        c = c.wrapping_add(LittleEndian::read_u32(&k[8..12]));
        mix(&mut a, &mut b, &mut c);
        k = &k[12..];
    }

    // The last 1..=12 bytes; missing bytes contribute zero.
    let mut tail = [0u8; 12];
    tail[..k.len()].copy_from_slice(k);
    a = a.wrapping_add(LittleEndian::read_u32(&tail[0..4]));
    b = b.wrapping_add(LittleEndian::read_u32(&tail[4..8]));
    c = c.wrapping_add(LittleEndian::read_u32(&tail[8..12]));

    final_mix(&mut a, &mut b, &mut c);
    c
}

fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);

    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);

    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);

    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);

    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);

    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

fn final_mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(14));

    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(11));

    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(25));

    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(16));

    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(4));

    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(14));

    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(24));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_seeded_state() {
        assert_eq!(hashlittle(b"", 0), 0xdead_beef);
    }

    #[test]
    fn matches_lookup3_reference_values() {
        assert_eq!(hashlittle(b"Four score and seven years ago", 0), 0x1777_0551);
        assert_eq!(hashlittle(b"Four score and seven years ago", 1), 0xcd62_8161);
    }

    #[test]
    fn tail_lengths_around_block_boundary() {
        let cases: [(&[u8], u32); 5] = [
            (b"a", 0x58d6_8708),
            (b"abcd", 0xb5f4_889c),
            (b"abcdefghi", 0xac65_72b4),
            (b"abcdefghijkl", 0x4012_f87b),
            (b"abcdefghijklm", 0x9281_28f9),
        ];
        for (data, expected) in cases {
            assert_eq!(
                hashlittle(data, 0),
                expected,
                "len {}",
                data.len()
            );
        }
    }
}
