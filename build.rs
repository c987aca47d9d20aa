use std::env;
use std::path::PathBuf;

fn main() {
    // The engine library is resolved at runtime via dlopen, not linked.
    // Surface the override here so a bad path shows up at build time
    // instead of as a load failure later.
    println!("cargo:rerun-if-env-changed=NNENGINE_LIBRARY");

    if let Some(path) = env::var_os("NNENGINE_LIBRARY") {
        let path = PathBuf::from(path);
        if path.exists() {
            println!("cargo:warning=Using engine library {}", path.display());
        } else {
            println!(
                "cargo:warning=NNENGINE_LIBRARY points to missing file {}",
                path.display()
            );
        }
        if let Some(dir) = path.parent() {
            println!("cargo:rustc-link-search=native={}", dir.display());
        }
    }
}
