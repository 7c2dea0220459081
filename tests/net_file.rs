use magpie::eval::nnue::{Network, NetworkError, FT_SMALL};

fn serialized_small() -> Vec<u8> {
    let net = Network::<FT_SMALL>::embedded();
    let mut bytes = Vec::new();
    net.save(&mut bytes).unwrap();
    bytes
}

#[test]
fn save_load_round_trip_is_byte_exact() {
    let bytes = serialized_small();
    let loaded = Network::<FT_SMALL>::load(&mut bytes.as_slice()).unwrap();
    let mut again = Vec::new();
    loaded.save(&mut again).unwrap();
    assert_eq!(bytes, again, "save(load(x)) must reproduce x");
}

#[test]
fn loaded_parameters_match_saved_ones() {
    let net = Network::<FT_SMALL>::embedded();
    let mut bytes = Vec::new();
    net.save(&mut bytes).unwrap();
    let loaded = Network::<FT_SMALL>::load(&mut bytes.as_slice()).unwrap();
    assert_eq!(&net.transformer.biases[..], &loaded.transformer.biases[..]);
    assert_eq!(&net.transformer.weights[..], &loaded.transformer.weights[..]);
    assert_eq!(
        &net.transformer.psqt_weights[..],
        &loaded.transformer.psqt_weights[..]
    );
}

#[test]
fn header_mismatch_is_rejected() {
    let mut bytes = serialized_small();
    bytes[0] ^= 0xFF;
    let err = Network::<FT_SMALL>::load(&mut bytes.as_slice())
        .err()
        .expect("corrupt header must fail");
    assert!(
        matches!(err, NetworkError::HeaderMismatch { .. }),
        "expected HeaderMismatch, got {err:?}"
    );
}

#[test]
fn truncated_file_is_rejected() {
    let bytes = serialized_small();
    for cut in [3, 6, bytes.len() / 2, bytes.len() - 1] {
        let err = Network::<FT_SMALL>::load(&mut &bytes[..cut])
            .err()
            .unwrap_or_else(|| panic!("cut at {cut} must fail"));
        assert!(
            matches!(err, NetworkError::Truncated),
            "cut at {cut}: expected Truncated, got {err:?}"
        );
    }
}

#[test]
fn file_round_trip_through_disk() {
    let path = std::path::Path::new("target/net_file_roundtrip.mag");
    let net = Network::<FT_SMALL>::embedded();
    net.save_file(path).unwrap();
    let loaded = Network::<FT_SMALL>::load_file(path).unwrap();
    assert_eq!(&net.transformer.weights[..], &loaded.transformer.weights[..]);
}
