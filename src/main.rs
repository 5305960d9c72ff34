mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, Overrides};
use df_convert::{
    ConversionEngine, ConversionExecutor, ConversionRequest, ConversionService, JobLimiter,
};
use df_core::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "docforge=trace,df_core=trace,df_convert=trace,df_server=trace,tower_http=debug"
                .to_string()
        } else {
            "docforge=info,df_core=info,df_convert=info,df_server=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let mut config = load_config(cli.config.as_deref(), &cli.overrides);
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            tracing::info!("Starting docforge server");
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(df_server::start(config))?;
            Ok(())
        }
        Commands::Convert { input, out_dir } => {
            let config = load_config(cli.config.as_deref(), &cli.overrides);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_file(config, &input, out_dir))
        }
        Commands::CheckEngine => {
            let config = load_config(cli.config.as_deref(), &cli.overrides);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_engine(&config))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref(), &cli.overrides)
        }
        Commands::Version => {
            println!("docforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, overrides: &Overrides) -> Config {
    let mut config = Config::load_or_default(path);
    overrides.apply(&mut config);
    config
}

/// Convert one local file through the same pipeline the server uses.
///
/// The input is copied into a scratch workspace first; the job deletes its
/// own copy, never the user's file.
async fn convert_file(config: Config, input: &Path, out_dir: Option<PathBuf>) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    let out_dir = match out_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;

    let workspace = tempfile::tempdir().context("cannot create workspace")?;
    let engine_out = workspace.path().join("out");
    std::fs::create_dir_all(&engine_out)?;

    let original_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let staged = workspace.path().join(format!("input{ext}"));
    std::fs::copy(input, &staged)
        .with_context(|| format!("cannot read {}", input.display()))?;

    let engine = ConversionEngine::discover(&config.conversion);
    let executor = ConversionExecutor::new(engine, config.conversion.timeout());
    let service = ConversionService::new(
        JobLimiter::new(config.conversion.concurrency),
        executor,
        config.conversion.target_format(),
    );

    let mut document = service
        .convert(ConversionRequest {
            input: staged,
            original_name,
            output_dir: engine_out,
        })
        .await?;

    let target = write_new(document.path(), &out_dir, document.download_name())?;
    document.mark_delivered();
    drop(document);

    println!("{}", target.display());
    Ok(())
}

/// Copy `src` into `dir` as `name`, or as `stem (N).ext` when that name is
/// taken. Existing files, the input included, are never overwritten.
fn write_new(src: &Path, dir: &Path, name: &str) -> Result<PathBuf> {
    let name = Path::new(name);
    let stem = name.file_stem().unwrap_or(name.as_os_str()).to_string_lossy();
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for n in 0..1000u32 {
        let candidate = match n {
            0 => dir.join(name),
            n => dir.join(format!("{stem} ({n}){ext}")),
        };
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("cannot write {}", candidate.display()))
            }
        };
        if n > 0 {
            tracing::info!("{} exists; writing {}", dir.join(name).display(), candidate.display());
        }
        let mut source = std::fs::File::open(src)
            .with_context(|| format!("cannot read {}", src.display()))?;
        std::io::copy(&mut source, &mut file)
            .with_context(|| format!("cannot write {}", candidate.display()))?;
        return Ok(candidate);
    }

    anyhow::bail!("no free file name for {} in {}", name.display(), dir.display())
}

async fn check_engine(config: &Config) -> Result<()> {
    println!("Checking conversion engine...\n");

    let info = ConversionEngine::discover(&config.conversion).check().await;
    let status = if info.available { "✓" } else { "✗" };
    print!("{} {}", status, info.name);
    if let Some(ref version) = info.version {
        print!(" ({version})");
    }
    if let Some(ref path) = info.path {
        print!(" - {}", path.display());
    }
    println!();

    println!();
    if info.available {
        println!("The conversion engine is available!");
    } else {
        println!("LibreOffice was not found. Install it or set SOFFICE_PATH.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>, overrides: &Overrides) -> Result<()> {
    let mut config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            Config::load(p).with_context(|| format!("invalid config {}", p.display()))?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };
    overrides.apply(&mut config);

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        for warning in &warnings {
            println!("⚠ {warning}");
        }
    }
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Uploads: {} (max {} bytes)",
        config.uploads.dir.display(),
        config.uploads.max_file_size
    );
    println!(
        "  Conversion: {} | concurrency {} | timeout {}ms",
        config.conversion.target_format(),
        config.conversion.concurrency,
        config.conversion.timeout_ms
    );

    Ok(())
}
