use crate::cli::{Cli, Commands};
use crate::client::BatchReader;
use crate::render::{Format, RenderOptions, Renderer};
use clap::CommandFactory;
use clap_complete::generate;
use serde::Deserialize as _;
use std::fs;
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run the CLI logic in-process.
///
/// Returns an exit code (0 = success).
#[must_use]
pub fn run_cli(cli: Cli) -> i32 {
    init_tracing();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = crate::cli::Cli::command();
            let bin_name = env!("CARGO_PKG_NAME");
            let mut out = io::stdout();
            generate(shell, &mut cmd, bin_name, &mut out);
            0
        }
        Commands::Build { file, output, truncate, config, out, cluster_host } => {
            // Config file values take precedence over flag defaults.
            let cfg = match config.as_ref() {
                Some(path) => crate::utils::config::load_config_at(std::path::Path::new(path)),
                None => crate::utils::config::load_config_near(std::path::Path::new(".")),
            };
            let (cfg_format, cfg_truncate) = cfg
                .and_then(|c| c.output)
                .map_or((None, None), |o| (o.format, o.truncate));
            let format_token = cfg_format.unwrap_or(output);
            let truncate = cfg_truncate.unwrap_or(truncate);

            let format = match format_token.parse::<Format>() {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("{e}");
                    return 2;
                }
            };

            let mut objects = Vec::new();
            for path in &file {
                match load_objects(path) {
                    Ok(batch) => objects.extend(batch),
                    Err(e) => {
                        eprintln!("Failed to read {path}: {e}");
                        return 1;
                    }
                }
            }

            let reader = BatchReader::new(&objects).with_cluster_host(cluster_host);
            let mut processed = 0usize;
            let built = crate::graph::build_with_progress(&reader, &objects, || processed += 1);
            let (graph, errors) = match built {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("Build failed: {e}");
                    return 1;
                }
            };
            eprintln!("Processed {processed} objects");
            for error in &errors {
                eprintln!("warning: {error}");
            }

            let renderer = Renderer::new(RenderOptions { truncate });
            let text = match renderer.render(&graph, format) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Render failed: {e}");
                    return 1;
                }
            };

            match out {
                Some(path) => {
                    if let Err(e) = fs::write(&path, text) {
                        eprintln!("Failed to write {path}: {e}");
                        return 1;
                    }
                }
                None => print!("{text}"),
            }
            0
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kube_graph=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

/// Read one dump file into a flat list of raw objects.
///
/// Accepts a JSON array, a JSON/YAML `List` object (`items` unwrapped), a
/// single object, or multi-document YAML.
///
/// # Errors
/// Returns a description of the I/O or parse failure.
pub fn load_objects(path: &str) -> Result<Vec<serde_json::Value>, String> {
    let data = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut objects = Vec::new();

    if path.ends_with(".yaml") || path.ends_with(".yml") {
        for document in serde_yaml::Deserializer::from_str(&data) {
            let value = serde_json::Value::deserialize(document).map_err(|e| e.to_string())?;
            push_objects(value, &mut objects);
        }
    } else {
        let value: serde_json::Value = serde_json::from_str(&data).map_err(|e| e.to_string())?;
        push_objects(value, &mut objects);
    }

    Ok(objects)
}

fn push_objects(value: serde_json::Value, out: &mut Vec<serde_json::Value>) {
    match value {
        serde_json::Value::Array(items) => out.extend(items),
        serde_json::Value::Object(mut map) => {
            if let Some(serde_json::Value::Array(items)) = map.remove("items") {
                out.extend(items);
            } else {
                out.push(serde_json::Value::Object(map));
            }
        }
        serde_json::Value::Null => {}
        other => out.push(other),
    }
}
