//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which writes a shell-script stand-in for
//! `soffice`, builds a full [`AppContext`] around it and serves the router on
//! a random port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use df_convert::ConversionEngine;
use df_core::config::Config;
use df_server::context::AppContext;
use df_server::router::build_router;

/// Engine body that writes the expected output.
pub const WRITES_OUTPUT: &str = r#"echo "converted $name" > "$out""#;

/// Engine body that exits 0 without writing anything.
pub const NO_OUTPUT: &str = "exit 0";

/// Engine body that fails with a diagnostic mentioning the input path.
pub const FAILS: &str = r#"echo "Error: $input could not be loaded" >&2
exit 1"#;

/// Engine body that writes a partial file and then hangs.
pub const HANGS: &str = r#"echo partial > "$out"
sleep 5"#;

/// Test harness serving a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub addr: SocketAddr,
    pub dir: tempfile::TempDir,
}

impl TestHarness {
    /// Serve with the default configuration and the given engine body.
    pub async fn with_engine(body: &str) -> Self {
        Self::start(Some(body), |_| {}).await
    }

    /// Serve with no engine installed.
    pub async fn without_engine() -> Self {
        Self::start(None, |_| {}).await
    }

    /// Serve with a customised configuration.
    ///
    /// `uploads.dir` always points into the harness temp dir.
    pub async fn start(engine_body: Option<&str>, configure: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.uploads.dir = dir.path().join("uploads");
        configure(&mut config);
        df_server::prepare_dirs(&config).expect("failed to create upload dirs");

        let engine = match engine_body {
            Some(body) => ConversionEngine::at(stub_engine(dir.path(), body)),
            None => ConversionEngine::missing(),
        };

        let ctx = AppContext::new(config, engine);
        let app = build_router(ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { ctx, addr, dir }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.ctx.config.uploads.dir.clone()
    }

    /// Every regular file left under the uploads directory.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.uploads_dir(), &mut files);
        files
    }

    /// Wait up to two seconds for the uploads directory to empty.
    pub async fn wait_for_cleanup(&self) -> Vec<PathBuf> {
        for _ in 0..100 {
            let files = self.leftover_files();
            if files.is_empty() {
                return files;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        self.leftover_files()
    }

    /// POST `data` as the `file` field of a multipart form.
    pub async fn convert(&self, file_name: &str, data: &[u8]) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        reqwest::Client::new()
            .post(self.url("/convert"))
            .multipart(form)
            .send()
            .await
            .expect("request failed")
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

/// Write a fake `soffice` that understands `--convert-to` and `--outdir`.
///
/// Before `body` runs, `$out` holds the path LibreOffice would write, `$name`
/// the input's file name and `$outdir` the output directory.
pub fn stub_engine(dir: &Path, body: &str) -> PathBuf {
    let script = format!(
        r#"#!/bin/sh
fmt=pdf
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
{body}
"#
    );
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).expect("failed to create bin dir");
    let path = bin.join("soffice");
    std::fs::write(&path, script).expect("failed to write engine stub");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to chmod engine stub");
    }
    path
}
