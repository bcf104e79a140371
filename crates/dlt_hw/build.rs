/// Build script for dlt_hw crate.
///
/// With the `vendor` feature enabled, compiles the C shim against the vendor
/// AXI-DMA headers and links the vendor library. Header and library
/// locations come from `AXIDMA_INCLUDE_DIR` and `AXIDMA_LIB_DIR`; the
/// library name defaults to `axidmaapp` and can be overridden with
/// `AXIDMA_LIB_NAME`. Without the feature nothing is compiled and only the
/// loopback engine is built.
use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/shim/axidma_shim.c");
    println!("cargo:rerun-if-env-changed=AXIDMA_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=AXIDMA_LIB_DIR");
    println!("cargo:rerun-if-env-changed=AXIDMA_LIB_NAME");

    if env::var_os("CARGO_FEATURE_VENDOR").is_none() {
        return;
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let include_dir = env::var("AXIDMA_INCLUDE_DIR")
        .expect("AXIDMA_INCLUDE_DIR must point at the directory holding axidmaapp.h");

    cc::Build::new()
        .file(manifest_dir.join("src/shim/axidma_shim.c"))
        .include(&include_dir)
        .warnings(false)
        .compile("dlt_axidma_shim");

    if let Ok(lib_dir) = env::var("AXIDMA_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", lib_dir);
    }
    let lib_name = env::var("AXIDMA_LIB_NAME").unwrap_or_else(|_| "axidmaapp".to_string());
    println!("cargo:rustc-link-lib={}", lib_name);
}
