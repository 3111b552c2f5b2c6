//! Basic smoke test to verify crate compiles.

#[test]
fn crate_compiles() {
    // If this test runs, the crate skeleton is valid.
    let _ = std::any::type_name::<boothwarden::EngineConfig>();
    let _ = std::any::type_name::<boothwarden::LicenseError>();
    let _ = std::any::type_name::<boothwarden::LifecycleEngine>();
}
