//! Build script for storefront crate.
//!
//! Hashes the stylesheet so templates can cache-bust it with
//! `/static/css/main.css?v={{ ""|css_hash }}`.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    hash_css();
}

/// Sets `CSS_HASH` (first 8 hex chars of the SHA-256 of main.css) for use
/// with `env!("CSS_HASH")`.
fn hash_css() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let css_path = Path::new(&manifest_dir).join("static/css/main.css");

    println!("cargo:rerun-if-changed={}", css_path.display());

    let content = match fs::read(&css_path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read main.css: {e}");
            println!("cargo:rustc-env=CSS_HASH=dev");
            return;
        }
    };

    let hash = format!("{:x}", Sha256::digest(&content));
    println!("cargo:rustc-env=CSS_HASH={}", &hash[..8]);
}
