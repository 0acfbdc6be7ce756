use base64::{engine::general_purpose, Engine as _};

/// Encode raw image bytes for the `data` field of a predict envelope.
pub fn encode_image(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode the `data` field back into raw image bytes.
pub fn decode_image(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips_byte_identical() {
        let original: Vec<u8> = (0..=255).collect();

        let encoded = encode_image(&original);
        let decoded = decode_image(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_rejects_invalid_input() {
        assert!(decode_image("not base64!!!").is_err());
    }
}
