//! Run command implementation for ktrun CLI.
//!
//! Builds the script through the core pipeline, then hands the artifact to
//! the `kotlin` launcher (or starts `kotlinc` as an interactive shell).

use std::path::Path;
use std::process::Command;

use ktrun_core::resource;
use ktrun_core::{
    BuildOptions, BuildOrchestrator, BuildOutput, Classpath, CommandResolver, Config, HttpFetcher,
    KotlincToolchain,
};

/// Options taken from the command line.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub interactive: bool,
    pub text_support: bool,
    pub runtime_options: Vec<String>,
    pub compiler_options: Vec<String>,
}

/// Build and run `script`, returning the program's exit code.
pub fn execute(
    config: &Config,
    script: &str,
    args: &[String],
    options: &RunOptions,
) -> anyhow::Result<i32> {
    let toolchain = KotlincToolchain::locate(config)?;
    config.ensure_dirs()?;

    let fetcher = HttpFetcher::new();
    let resolver = CommandResolver::from_config(config);

    let resource = resource::resolve(script, config, &fetcher, &mut std::io::stdin().lock())?;
    tracing::debug!("Resolved {} to {}", script, resource.path.display());

    let build_options = BuildOptions {
        custom_preamble: true,
        text_support: options.text_support,
        interactive: options.interactive,
        compiler_options: options.compiler_options.clone(),
        runtime_options: options.runtime_options.clone(),
    };

    let orchestrator = BuildOrchestrator::new(config, &fetcher, &resolver, &toolchain);
    let output = orchestrator.build(&resource, &build_options, &Classpath::new())?;

    if output.cache_hit {
        tracing::debug!("Using cached artifact for {}", resource.display_name());
    }

    if options.interactive {
        return launch_shell(toolchain.kotlinc(), &output);
    }

    launch(toolchain.launcher(), &output, args)
}

/// Run the compiled program with the `kotlin` launcher.
fn launch(launcher: &Path, output: &BuildOutput, args: &[String]) -> anyhow::Result<i32> {
    let mut cmd = Command::new(launcher);
    cmd.args(&output.runtime_options)
        .arg("-classpath")
        .arg(output.runtime_classpath().join())
        .arg(&output.entry_symbol)
        .args(args);

    tracing::debug!("Running {:?}", cmd);

    let status = cmd
        .status()
        .map_err(|e| anyhow::anyhow!("failed to run {}: {}", launcher.display(), e))?;

    Ok(status.code().unwrap_or(1))
}

/// Start the interactive shell with the composed classpath.
fn launch_shell(kotlinc: &Path, output: &BuildOutput) -> anyhow::Result<i32> {
    let mut cmd = Command::new(kotlinc);
    cmd.args(&output.runtime_options);
    if !output.classpath.is_empty() {
        cmd.arg("-classpath").arg(output.classpath.join());
    }

    tracing::info!("Starting interactive shell");
    tracing::debug!("Running {:?}", cmd);

    let status = cmd
        .status()
        .map_err(|e| anyhow::anyhow!("failed to run {}: {}", kotlinc.display(), e))?;

    Ok(status.code().unwrap_or(1))
}
