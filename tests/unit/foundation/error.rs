use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        AnimError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(AnimError::decode("x").to_string().contains("decode error:"));
    assert!(AnimError::render("x").to_string().contains("render error:"));
    assert!(
        AnimError::allocation("x")
            .to_string()
            .contains("allocation error:")
    );
    assert!(
        AnimError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn frame_out_of_range_names_both_numbers() {
    let msg = AnimError::FrameOutOfRange {
        frame: 7,
        frame_count: 3,
    }
    .to_string();
    assert_eq!(msg, "frame 7 out of range (frame count 3)");
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = AnimError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
