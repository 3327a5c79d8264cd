//! Batch resolution harness.
//!
//! Reads declarative resource sheets, installs everything they describe,
//! runs one resolve pass and prints the result.
//!
//! # Usage
//!
//! ```bash
//! resolve [--critical] [--no-fragments] [--json] <sheet.yaml>...
//! ```
//!
//! - `--critical`: exit non-zero when any resource stays unresolved
//! - `--no-fragments`: disable fragment attachment
//! - `--json`: print a JSON snapshot instead of the table
//! - `RUST_LOG`: log filter (e.g. `patchbay=debug`)

use anyhow::{bail, Context, Result};
use patchbay::resource::ResourceSet;
use patchbay::runtime::{Runtime, RuntimeConfig};

struct Args {
    files: Vec<String>,
    critical: bool,
    fragments: bool,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        files: Vec::new(),
        critical: false,
        fragments: true,
        json: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--critical" => args.critical = true,
            "--no-fragments" => args.fragments = false,
            "--json" => args.json = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("unknown flag: {flag}"),
            file => args.files.push(file.to_string()),
        }
    }
    if args.files.is_empty() {
        bail!("no spec sheets given; try --help");
    }
    Ok(args)
}

fn print_usage() {
    println!("resolve [--critical] [--no-fragments] [--json] <sheet.yaml>...");
    println!();
    println!("  --critical       fail when any resource stays unresolved");
    println!("  --no-fragments   disable fragment attachment");
    println!("  --json           print a JSON snapshot instead of the table");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let mut runtime = Runtime::with_config(RuntimeConfig {
        fragments_enabled: args.fragments,
    });

    let mut installed = Vec::new();
    for file in &args.files {
        let set = ResourceSet::from_yaml_file(file).with_context(|| format!("loading {file}"))?;
        let ids = runtime
            .install_set(&set)
            .with_context(|| format!("installing resources from {file}"))?;
        installed.extend(ids);
    }

    let outcome = if args.critical {
        runtime.resolve_critical(&installed)?
    } else {
        runtime.resolve(&installed)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&runtime.snapshot())?);
    } else {
        print_table(&runtime);
        if !outcome.satisfied() {
            println!();
            println!("{}", outcome.report);
        }
    }
    Ok(())
}

fn print_table(runtime: &Runtime) {
    let snapshot = runtime.snapshot();
    println!(
        "{:<5} {:<32} {:<12} {:<10} {:<8}",
        "id", "resource", "version", "state", "current"
    );
    for view in &snapshot.resources {
        let mut name = view.name.clone().unwrap_or_else(|| "(anonymous)".to_string());
        if view.fragment {
            name.push_str(" (fragment)");
        }
        let version = view
            .version
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<5} {:<32} {:<12} {:<10} {:<8}",
            view.id.to_string(),
            name,
            version,
            view.state.to_string(),
            if view.current { "yes" } else { "no" },
        );
        for wire in &view.required {
            println!("        -> {} from {}", wire.namespace, wire.provider);
        }
    }
}
