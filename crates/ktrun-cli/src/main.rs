//! ktrun CLI - run Kotlin scripts from files, URLs, stdin or inline text.

mod clear;
mod run;

use clap::{CommandFactory, FromArgMatches, Parser};
use ktrun_core::Config;

#[derive(Parser)]
#[command(name = "ktrun")]
#[command(about = "Compile and run Kotlin scripts with cached artifacts")]
#[command(version)]
struct Cli {
    /// Script file, URL, `-` for stdin, or inline Kotlin code
    #[arg(required_unless_present = "clear_cache")]
    script: Option<String>,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Start an interactive shell with the script's classpath
    #[arg(short, long)]
    interactive: bool,

    /// Enable text-processing mode (adds the text support preamble)
    #[arg(short, long)]
    text: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    silent: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Delete every cached artifact and exit
    #[arg(long)]
    clear_cache: bool,

    /// Extra options for the kotlin launcher
    #[arg(long, value_name = "OPTS", allow_hyphen_values = true)]
    kotlin_opts: Option<String>,

    /// Extra options for kotlinc
    #[arg(long, value_name = "OPTS", allow_hyphen_values = true)]
    compiler_opts: Option<String>,
}

fn main() {
    let config = Config::from_env();

    let matches = Cli::command()
        .override_usage(format!(
            "{} [OPTIONS] <SCRIPT> [ARGS]...",
            config.display_name
        ))
        .get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.silent {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = if cli.clear_cache {
        clear::execute(&config).map(|()| 0)
    } else {
        let options = run::RunOptions {
            interactive: cli.interactive,
            text_support: cli.text,
            runtime_options: split_options(cli.kotlin_opts.as_deref()),
            compiler_options: split_options(cli.compiler_opts.as_deref()),
        };
        // `script` is required unless --clear-cache is given.
        let script = cli.script.unwrap_or_default();
        run::execute(&config, &script, &cli.args, &options)
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            let message = match err.downcast_ref::<ktrun_core::Error>() {
                Some(core_err) => core_err.with_hint(),
                None => format!("{:#}", err),
            };
            eprintln!("[{}] {}", config.display_name, message);
            1
        }
    };

    std::process::exit(code);
}

fn split_options(opts: Option<&str>) -> Vec<String> {
    opts.map(|o| o.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}
