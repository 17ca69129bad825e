//! Pipeline state 着色器编译工具
//!
//! 读取 TOC，为每个 pipeline state 的 root signature 与各个 shader stage 调用一次 dxc，
//! 产物输出到 `--out-dir`，命名为 `{name}.rso` / `.vso` / `.pso` / `.cso`。

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use cli::{Cli, CliCommand, USAGE};
use psoc_crate_tools::init_log::init_log_with_level;

fn main() -> ExitCode {
    let cli = match Cli::parse_from(std::env::args().skip(1)) {
        Ok(CliCommand::Run(cli)) => cli,
        Ok(CliCommand::Help) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    init_log_with_level(if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info });

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = cli.into_options()?;

    log::info!("Compiler: {:?}", options.compiler);
    log::info!("Configuration: {}", options.configuration);
    log::info!("TOC: {:?}", options.input);
    log::info!("Output path: {:?}", options.out_dir);

    let input = options.input.clone();
    let report = psoc_shader_build::build(options).with_context(|| format!("build pipeline states in {input:?}"))?;

    for artifact in &report.artifacts {
        log::debug!("{} {}: {:?}", artifact.pipeline_state, artifact.stage, artifact.path);
    }
    log::info!("Shader compilation completed: {} artifact(s).", report.artifacts.len());

    Ok(())
}
