use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ReelError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        ReelError::subtitle("x")
            .to_string()
            .contains("subtitle error:")
    );
    assert!(ReelError::media("x").to_string().contains("media error:"));
    assert!(ReelError::render("x").to_string().contains("render error:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("disk gone");
    let err = ReelError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("disk gone"));
}
