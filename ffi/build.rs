use std::env;
use std::path::PathBuf;

// The header lands in `$OUT_DIR/curlfetch.h`; `CURLFETCH_HEADER_DIR` copies it
// somewhere stable for C consumers.
fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CURLFETCH_HEADER_DIR");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR")) else {
        println!("cargo:warning=header generation skipped: cargo env not set");
        return;
    };
    let header = PathBuf::from(out_dir).join("curlfetch.h");

    let bindings = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("CURLFETCH_H")
        .with_cpp_compat(true)
        .generate();

    match bindings {
        Ok(bindings) => {
            bindings.write_to_file(&header);
            if let Ok(dir) = env::var("CURLFETCH_HEADER_DIR") {
                let dir = PathBuf::from(dir);
                let copied = std::fs::create_dir_all(&dir)
                    .and_then(|()| std::fs::copy(&header, dir.join("curlfetch.h")));
                if let Err(e) = copied {
                    println!("cargo:warning=could not copy header to {}: {e}", dir.display());
                }
            }
        }
        Err(e) => println!("cargo:warning=header generation skipped: {e}"),
    }
}
