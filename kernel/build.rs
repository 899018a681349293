fn main() {
    let arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap();
    let dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();

    match arch.as_str() {
        "aarch64" => {
            println!("cargo:rustc-link-arg=-T{dir}/linker-{arch}.ld");
            println!("cargo:rerun-if-changed={dir}/linker-{arch}.ld");
            println!("cargo:rerun-if-changed=src/arch/aarch64/boot.S");
            println!("cargo:rerun-if-changed=src/arch/aarch64/exception_vectors.S");

            cc::Build::new()
                .file("src/arch/aarch64/boot.S")
                .file("src/arch/aarch64/exception_vectors.S")
                .compile("aarch64_boot");
        }
        _ => {
            println!("cargo:warning=kernel only boots on aarch64, not {}", arch);
        }
    }
}
