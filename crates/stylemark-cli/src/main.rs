//! `stylemark` command-line entry point.
//!
//! Three stages, each a subcommand:
//!
//! - `inventory`: sample computed styles from the rendered site with headless
//!   Chrome, writing the raw and deduplicated inventories under `artifacts/`.
//! - `states`: capture hover, focus, active and disabled styles of the first
//!   button, link and input on every page into `artifacts/style-states.json`.
//! - `tokenize`: turn an inventory into `tokens.candidates.json` and the
//!   mirrored `tokens.css` stylesheets.
//!
//! `inventory --reference` and `states --reference` sample the deployed site
//! named in `reference.config.json` instead, writing under
//! `artifacts/reference/`.
//!
//! Environment: `PHASE2_BASE_URL`, `PAGE_FILTER`, `PAGE_LIMIT` tune the
//! local browser stages; `RUST_LOG` controls diagnostics on stderr.

mod probe;
mod serve;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use stylemark::pipeline::{
    DEDUP_INVENTORY_PATH, RAW_INVENTORY_PATH, REFERENCE_DEDUP_INVENTORY_PATH,
    REFERENCE_RAW_INVENTORY_PATH,
};
use stylemark::states::{REFERENCE_STATES_PATH, STATES_PATH};
use stylemark::{
    collect_inventory, collect_states, deduplicate, default_state_categories,
    load_reference_settings, load_role_selectors, load_sampler_config,
    reference_state_categories, tokenize, write_json, EnvOverrides, Settings, TokenSummary,
    TokenizeOptions,
};

use crate::probe::ChromeProbe;
use crate::serve::{ensure_server, StaticServer};

#[derive(Debug, Parser)]
#[command(
    name = "stylemark",
    version,
    about = "Extract design tokens from the computed styles of a static site"
)]
struct Cli {
    /// Project root holding the configs, artifacts and the `docs/` export.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sample computed styles for every route and viewport.
    Inventory {
        /// Sample the site in `reference.config.json` instead of the local export.
        #[arg(long)]
        reference: bool,
    },
    /// Capture interaction-state styles of buttons, links and inputs.
    States {
        /// Sample the site in `reference.config.json` instead of the local export.
        #[arg(long)]
        reference: bool,
    },
    /// Deduplicate an inventory and emit token candidates.
    Tokenize {
        /// Raw inventory array or deduplicated inventory object.
        #[arg(long = "in", value_name = "PATH")]
        input: Option<PathBuf>,
        /// Token manifest output path.
        #[arg(long, value_name = "PATH")]
        out_tokens_json: Option<PathBuf>,
        /// Stylesheet output path; repeat to mirror. Replaces the defaults.
        #[arg(long, value_name = "PATH")]
        out_css: Vec<PathBuf>,
    },
}

/// Resolves tokenize flags against the project root; absent flags keep the
/// defaults.
fn tokenize_options(
    root: &Path,
    input: Option<&Path>,
    out_tokens_json: Option<&Path>,
    out_css: &[PathBuf],
) -> TokenizeOptions {
    let mut options = TokenizeOptions::for_root(root);
    if let Some(input) = input {
        options.input = root.join(input);
    }
    if let Some(path) = out_tokens_json {
        options.tokens_json = root.join(path);
    }
    if !out_css.is_empty() {
        options.css_outputs = out_css.iter().map(|p| root.join(p)).collect();
    }
    options
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Settings for the local export, with environment overrides applied.
fn local_settings(root: &Path) -> anyhow::Result<Settings> {
    let config = load_sampler_config(root)?;
    Ok(Settings::resolve(&config, &EnvOverrides::from_env(), root))
}

/// Starts the static server for local runs; reference sites are already up.
fn serve_local(settings: &Settings, reference: bool) -> anyhow::Result<Option<StaticServer>> {
    if reference {
        return Ok(None);
    }
    ensure_server(settings)
}

fn run_inventory(root: &Path, reference: bool) -> anyhow::Result<()> {
    let (settings, roles) = if reference {
        load_reference_settings(root)?
    } else {
        (local_settings(root)?, load_role_selectors(root)?)
    };

    // Declared before the probe so the browser closes first.
    let _server = serve_local(&settings, reference)?;
    let mut probe = ChromeProbe::launch()?;
    let report = collect_inventory(&mut probe, &settings, &roles)?;
    drop(probe);

    let (raw_path, dedup_path, title) = if reference {
        (
            root.join(REFERENCE_RAW_INVENTORY_PATH),
            root.join(REFERENCE_DEDUP_INVENTORY_PATH),
            "reference style inventory saved",
        )
    } else {
        (
            root.join(RAW_INVENTORY_PATH),
            root.join(DEDUP_INVENTORY_PATH),
            "style inventory saved",
        )
    };
    write_json(&raw_path, &report.records)?;
    write_json(&dedup_path, &deduplicate(&report.records))?;

    println!("{}", style(title).bold());
    println!("raw: {}", raw_path.display());
    println!("dedup: {}", dedup_path.display());
    print!("{}", report.summary(&roles));
    Ok(())
}

fn run_states(root: &Path, reference: bool) -> anyhow::Result<()> {
    let (settings, categories) = if reference {
        let (settings, roles) = load_reference_settings(root)?;
        (settings, reference_state_categories(&roles))
    } else {
        (local_settings(root)?, default_state_categories())
    };

    let _server = serve_local(&settings, reference)?;
    let mut probe = ChromeProbe::launch()?;
    let report = collect_states(&mut probe, &settings, &categories)?;
    drop(probe);

    let path = root.join(if reference {
        REFERENCE_STATES_PATH
    } else {
        STATES_PATH
    });
    write_json(&path, &report.records)?;

    println!(
        "{}",
        style(format!("style states saved to {}", path.display())).bold()
    );
    print!("{}", report);
    Ok(())
}

fn run_tokenize(options: &TokenizeOptions) -> anyhow::Result<()> {
    let tokens = tokenize(options)
        .with_context(|| format!("tokenizing {}", options.input.display()))?;
    println!("{}", TokenSummary(&tokens));
    println!("tokens json: {}", options.tokens_json.display());
    for css in &options.css_outputs {
        println!("tokens css: {}", css.display());
    }
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Inventory { reference } => run_inventory(&cli.root, *reference),
        Command::States { reference } => run_states(&cli.root, *reference),
        Command::Tokenize {
            input,
            out_tokens_json,
            out_css,
        } => run_tokenize(&tokenize_options(
            &cli.root,
            input.as_deref(),
            out_tokens_json.as_deref(),
            out_css,
        )),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            if let Some(hint) = err
                .chain()
                .find_map(|e| e.downcast_ref::<stylemark::Error>())
                .and_then(stylemark::Error::hint)
            {
                eprintln!("{} {}", style("hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inventory() {
        let cli = Cli::try_parse_from(["stylemark", "inventory"]).unwrap();
        assert!(matches!(cli.command, Command::Inventory { reference: false }));
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn test_parse_reference_stages() {
        let cli = Cli::try_parse_from(["stylemark", "inventory", "--reference"]).unwrap();
        assert!(matches!(cli.command, Command::Inventory { reference: true }));
        let cli = Cli::try_parse_from(["stylemark", "states", "--reference"]).unwrap();
        assert!(matches!(cli.command, Command::States { reference: true }));
        let cli = Cli::try_parse_from(["stylemark", "states"]).unwrap();
        assert!(matches!(cli.command, Command::States { reference: false }));
    }

    /// Tokenize options as `run` would build them.
    fn parsed_tokenize_options(args: &[&str]) -> TokenizeOptions {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        let Command::Tokenize {
            input,
            out_tokens_json,
            out_css,
        } = &cli.command
        else {
            panic!("expected tokenize, got {:?}", cli.command);
        };
        tokenize_options(&cli.root, input.as_deref(), out_tokens_json.as_deref(), out_css)
    }

    #[test]
    fn test_parse_tokenize_defaults() {
        let options = parsed_tokenize_options(&["stylemark", "--root", "/site", "tokenize"]);
        assert_eq!(options, TokenizeOptions::for_root(Path::new("/site")));
    }

    #[test]
    fn test_parse_tokenize_overrides() {
        let options = parsed_tokenize_options(&[
            "stylemark",
            "tokenize",
            "--root",
            "/site",
            "--in",
            "artifacts/reference/style-inventory.dedup.json",
            "--out-tokens-json",
            "/tmp/tokens.json",
            "--out-css",
            "public/css/tokens.css",
            "--out-css",
            "docs/css/tokens.css",
        ]);
        assert_eq!(
            options.input,
            PathBuf::from("/site/artifacts/reference/style-inventory.dedup.json")
        );
        assert_eq!(options.tokens_json, PathBuf::from("/tmp/tokens.json"));
        assert_eq!(
            options.css_outputs,
            vec![
                PathBuf::from("/site/public/css/tokens.css"),
                PathBuf::from("/site/docs/css/tokens.css"),
            ]
        );
    }

    #[test]
    fn test_tokenize_options_keep_absolute_paths() {
        let options = tokenize_options(
            Path::new("/site"),
            Some(Path::new("/data/inventory.json")),
            None,
            &[],
        );
        assert_eq!(options.input, PathBuf::from("/data/inventory.json"));
        assert_eq!(
            options.tokens_json,
            TokenizeOptions::for_root(Path::new("/site")).tokens_json
        );
    }

    #[test]
    fn test_run_states_reference_needs_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_states(dir.path(), true).unwrap_err();
        assert!(format!("{:#}", err).contains("reference.config.json"));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["stylemark", "publish"]).is_err());
    }

    #[test]
    fn test_run_tokenize_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let options = TokenizeOptions::for_root(dir.path());
        let err = run_tokenize(&options).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("missing input file"));
        assert!(!dir.path().join("tokens.candidates.json").exists());
    }
}
