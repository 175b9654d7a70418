//! Build script for vidgpu crate
//!
//! Sets up conditional compilation aliases for platform-specific modules.

fn main() {
    cfg_aliases::cfg_aliases! {
        // Targets with std::time::Instant and a filesystem, where the frame sequence player works
        native: { not(target_arch = "wasm32") },
    }
}
