//! Shell-script stand-ins for the conversion engine.

use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write a fake `soffice` that understands `--convert-to` and `--outdir`.
///
/// Before `body` runs, `$out` holds the path LibreOffice would write and
/// `$name` the input's file name.
#[cfg(unix)]
pub fn stub_engine(dir: &Path, body: &str) -> PathBuf {
    let script = format!(
        r#"fmt=pdf
outdir=.
input=
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) fmt="$2"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    --version) echo "LibreOffice 0.0 stub"; exit 0 ;;
    --*) shift ;;
    *) input="$1"; shift ;;
  esac
done
name=$(basename "$input")
out="$outdir/${{name%.*}}.$fmt"
{body}"#
    );
    write_script(dir, "soffice", &script)
}

/// Engine body that writes the expected output.
pub const WRITES_OUTPUT: &str = r#"echo "converted $name" > "$out""#;

/// Engine body that exits 0 without writing anything.
pub const NO_OUTPUT: &str = "exit 0";

/// Engine body that fails like LibreOffice does on an unreadable input.
pub const FAILS: &str = r#"echo "Error: source file could not be loaded" >&2
exit 81"#;

/// Engine body that writes a partial file and then hangs.
pub const HANGS: &str = r#"echo partial > "$out"
sleep 5"#;

/// Create `name` with some content inside `dir`.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"document body").unwrap();
    path
}
