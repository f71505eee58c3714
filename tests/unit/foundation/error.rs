use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        AnimError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        AnimError::allocation("x")
            .to_string()
            .contains("allocation error:")
    );
    assert!(AnimError::render("x").to_string().contains("render error:"));
    assert!(
        AnimError::scheduler("x")
            .to_string()
            .contains("scheduler error:")
    );
    assert!(AnimError::config("x").to_string().contains("config error:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = AnimError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
