//! Build script for compiling protobuf definitions.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_file = "proto/keeper.proto";
    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR")?);

    println!("cargo:rerun-if-changed={proto_file}");

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        // Descriptor set for the reflection service
        .file_descriptor_set_path(out_dir.join("keeper_descriptor.bin"))
        .compile_protos(&[proto_file], &["proto/"])?;

    Ok(())
}
