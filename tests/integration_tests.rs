// Integration tests entry point
// These tests drive the controller through its public API with an in-memory
// content API; no network or Docker is required.

mod integration {
    mod lifecycle_test;
    mod offline_properties_test;
    pub mod support;
}
