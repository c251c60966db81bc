//! Build script for symdex-core
//!
//! Checks the compiler version before compilation. The workspace uses
//! edition 2024 in places and recent standard library helpers, so Rust
//! 1.85.0 is the minimum.

const MIN_RUST_VERSION: (u64, u64, u64) = (1, 85, 0);

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    match rustc_version::version() {
        Ok(version) => {
            let (major, minor, patch) = MIN_RUST_VERSION;
            if (version.major, version.minor, version.patch) < MIN_RUST_VERSION {
                panic!("symdex-core requires Rust {major}.{minor}.{patch} or newer, found {version}");
            }
        }
        // Some build environments hide the compiler; don't fail there.
        Err(_) => println!("cargo:warning=could not verify Rust version"),
    }
}
