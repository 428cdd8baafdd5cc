// README-to-rustdoc step shared by every crate's build.rs.
// Include it with: include!("../build_common.rs");
//
// The including file must import:
//   use std::env;
//   use std::fs;
//   use std::path::Path;

/// Copy the crate README into `OUT_DIR/README_GENERATED.md` with its links
/// rewritten for rustdoc.
///
/// - `](src/foo/mod.rs)` becomes `](foo/mod)` so rustdoc resolves the module
/// - `](../../README.md)` points at the repository URL from the workspace
///   manifest
///
/// A crate without a README gets an empty page rather than a build failure.
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");
    println!("cargo:rerun-if-changed=../../Cargo.toml");

    let readme = fs::read_to_string(Path::new(crate_dir).join("README.md")).unwrap_or_default();

    let mut doc = readme.replace("](src/", "](").replace(".rs)", ")");
    if let Some(url) = workspace_repository(crate_dir) {
        doc = doc.replace("](../../README.md", &format!("]({url}"));
    }

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(Path::new(&out_dir).join("README_GENERATED.md"), doc)
        .expect("write README_GENERATED.md");
}

/// `repository = "..."` from the workspace Cargo.toml, if present.
fn workspace_repository(crate_dir: &str) -> Option<String> {
    let manifest = Path::new(crate_dir).parent()?.parent()?.join("Cargo.toml");
    let content = fs::read_to_string(manifest).ok()?;

    content.lines().map(str::trim).find_map(|line| {
        let value = line.strip_prefix("repository")?.trim_start().strip_prefix('=')?;
        let value = value.trim().strip_prefix('"')?;
        value.split('"').next().map(str::to_string)
    })
}
