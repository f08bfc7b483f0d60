//! Build script - copies the linker script into the output directory
//! so that the linker can find it at link time.
//!
//! Only the firmware build needs it; host builds (library, desktop
//! adapter, tests) skip the linker setup entirely.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    // Copy memory.x to OUT_DIR
    fs::copy("memory.x", out_dir.join("memory.x")).expect("memory.x must exist");

    // Tell cargo to look for linker scripts in OUT_DIR
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Linker scripts apply to the firmware binary only
    println!("cargo:rustc-link-arg-bin=usb2serial-fw=--nmagic");
    println!("cargo:rustc-link-arg-bin=usb2serial-fw=-Tlink.x");
    println!("cargo:rustc-link-arg-bin=usb2serial-fw=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bin=usb2serial-fw=-Tdefmt.x");

    // Rebuild if the linker script changes
    println!("cargo:rerun-if-changed=memory.x");
}
