//! Build script for vidgpu-effects crate
//!
//! Validates and minifies every WGSL kernel under `shaders/` and writes the
//! result to `OUT_DIR`, where `pipelines.rs` embeds it with `include_str!`.

/// Kernels embedded into the effect pipelines
const SHADERS: &[&str] = &["deblur_dog", "denoise_bilateral_mean", "restore", "upscale_x2"];

/// Minifies WGSL shader source code to reduce binary size
///
/// Uses naga to parse, validate, and regenerate the WGSL code in a more compact form.
/// A kernel that fails validation aborts the build instead of failing at pipeline creation.
fn minify_wgsl(name: &str, shader: &str) -> String {
    let mut module = naga::front::wgsl::parse_str(shader).unwrap_or_else(|e| panic!("Failed to parse WGSL shader {name}: {e}"));

    wgsl_minifier::minify_module(&mut module);

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    let info = validator.validate(&module).unwrap_or_else(|e| panic!("Failed to validate WGSL shader {name}: {e:?}"));
    let output = naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty()).expect("Failed to write WGSL");

    wgsl_minifier::minify_wgsl_source(&output)
}

fn main() {
    let manifest_dir = std::path::PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR not set"));

    for name in SHADERS {
        let path = manifest_dir.join("shaders").join(format!("{name}.wgsl"));
        println!("cargo:rerun-if-changed={}", path.display());

        let source = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
        std::fs::write(out_dir.join(format!("{name}.wgsl")), minify_wgsl(name, &source)).expect("Failed to write minified shader");
    }
}
