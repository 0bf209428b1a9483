//! Build script for meridian.
//!
//! Currently a no-op placeholder. The remote-read protocol messages are
//! implemented directly in Rust (see src/remote/proto.rs) rather than
//! generated from protobuf definitions.
//!
//! If proto-based codegen is needed in the future, prost-build can be
//! configured here to compile proto files from a `proto/` directory.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
}
