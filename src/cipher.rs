//! Autokey stream obfuscation used by the Kasa device protocol.
//!
//! Every datagram exchanged with a device is XOR-obfuscated with a running
//! key: the key starts at a fixed seed and is replaced after each byte.
//! This is obfuscation, not encryption; there is no integrity check and no
//! resistance to tampering. Both directions are single-pass and
//! order-dependent, so [`encode`] and [`decode`] are exact inverses only
//! when applied with the same seed.

/// Seed used by every Kasa-family device.
pub const DEFAULT_KEY: u8 = 0xab;

/// Obfuscate `data` for transmission.
///
/// Each output byte is the XOR of the input byte and the running key; the
/// key is then replaced with the *output* byte.
///
/// # Examples
///
/// ```
/// use kasa_lights_rs::cipher::{decode, encode, DEFAULT_KEY};
///
/// let plain = br#"{"system":{"get_sysinfo":{}}}"#;
/// let wire = encode(plain, DEFAULT_KEY);
/// assert_eq!(decode(&wire, DEFAULT_KEY), plain);
/// ```
pub fn encode(data: &[u8], key: u8) -> Vec<u8> {
    let mut key = key;
    data.iter()
        .map(|byte| {
            let out = byte ^ key;
            key = out;
            out
        })
        .collect()
}

/// Reverse [`encode`].
///
/// Same transform as [`encode`], except the running key is replaced with
/// the *input* byte, which is what makes the pair invertible.
pub fn decode(data: &[u8], key: u8) -> Vec<u8> {
    let mut key = key;
    data.iter()
        .map(|byte| {
            let out = byte ^ key;
            key = *byte;
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_seeds() {
        let data = b"{\"system\":{\"set_relay_state\":{\"state\":1}}}";
        for key in 0..=u8::MAX {
            assert_eq!(decode(&encode(data, key), key), data);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(encode(&[], DEFAULT_KEY).is_empty());
        assert!(decode(&[], DEFAULT_KEY).is_empty());
    }

    #[test]
    fn test_length_preserved() {
        let data = vec![0u8; 1024];
        assert_eq!(encode(&data, DEFAULT_KEY).len(), data.len());
    }

    #[test]
    fn test_key_chains_through_output() {
        // With the autokey scheme, two identical plain bytes never encode
        // to the same wire byte unless the chain happens to repeat.
        let wire = encode(&[0x42, 0x42], DEFAULT_KEY);
        assert_eq!(wire[0], 0x42 ^ DEFAULT_KEY);
        assert_eq!(wire[1], 0x42 ^ wire[0]);
    }

    #[test]
    fn test_mismatched_seed_does_not_round_trip() {
        let data = b"hello bulbs";
        let wire = encode(data, DEFAULT_KEY);
        assert_ne!(decode(&wire, 0x00), data);
    }
}
