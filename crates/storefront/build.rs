//! Build script for storefront crate.
//!
//! Generates content-based hashes for static assets so templates can
//! reference immutable, cache-busted URLs.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    hash_asset("css", "main", "CSS_HASH");
}

/// Hash `static/<dir>/<name>.<dir>` and copy it to `static/<dir>/derived/`
/// with the hash in the filename.
///
/// Sets `env_var` for use with `env!()`; empty when the asset is missing.
fn hash_asset(dir: &str, name: &str, env_var: &str) {
    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:rustc-env={env_var}=");
        return;
    };
    let source = Path::new(&manifest_dir)
        .join("static")
        .join(dir)
        .join(format!("{name}.{dir}"));

    println!("cargo:rerun-if-changed={}", source.display());

    let content = match fs::read(&source) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", source.display());
            println!("cargo:rustc-env={env_var}=");
            return;
        }
    };

    let digest = Sha256::digest(&content);
    let short_hash = digest.iter().take(4).fold(String::new(), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    });

    println!("cargo:rustc-env={env_var}={short_hash}");

    let derived_dir = Path::new(&manifest_dir).join("static").join(dir).join("derived");
    if fs::create_dir_all(&derived_dir).is_ok() {
        let derived = derived_dir.join(format!("{name}.{short_hash}.{dir}"));
        if let Err(e) = fs::copy(&source, &derived) {
            println!("cargo:warning=Could not copy {}: {e}", source.display());
        }
    }
}
