use rustc_version::{version, version_meta, Channel};

fn main() {
    println!("cargo:rustc-check-cfg=cfg(rustc_nightly)");
    println!("cargo:rustc-check-cfg=cfg(rustc_beta)");

    let ver = match version() {
        Ok(ver) => ver,
        Err(_) => return,
    };
    assert!(ver.major >= 1);

    if let Ok(meta) = version_meta() {
        match meta.channel {
            Channel::Nightly => {
                println!("cargo:rustc-cfg=rustc_nightly");
            }
            Channel::Beta => {
                println!("cargo:rustc-cfg=rustc_beta");
            }
            _ => {}
        }
    }
}
