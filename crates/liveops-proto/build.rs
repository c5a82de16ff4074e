fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/events.proto");
    tonic_prost_build::configure().compile_protos(&["proto/events.proto"], &["proto"])?;
    Ok(())
}
