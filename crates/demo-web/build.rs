use std::{env, fs, path::Path};

fn main() {
    println!("cargo:rerun-if-changed=index.html");

    // Place index.html next to the wasm-pack output so the demo can be served as is
    let Ok(out_dir) = env::var("OUT_DIR") else {
        return;
    };
    let dest_path = Path::new(&out_dir).join("../../../index.html");
    if fs::copy("index.html", &dest_path).is_ok() {
        println!("cargo:warning=Copied index.html to {}", dest_path.display());
    }
}
