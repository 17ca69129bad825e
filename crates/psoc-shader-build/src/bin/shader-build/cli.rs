//! 命令行参数

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use psoc_shader_build::{BuildConfiguration, BuildOptions, BuildSettings};

pub const USAGE: &str = "\
usage: shader-build -d <compiler> -c <Debug|Release|Trace> -i <toc> -o <out-dir> [options]

required:
  -d, --compiler <path>     path to dxc
  -c, --config <name>       build configuration: Debug, Release or Trace
  -i, --input <path>        pipeline state TOC (.toml or .json)
  -o, --out-dir <path>      output folder, also the compiler's working directory

options:
      --settings <path>     TOML settings file
      --temp-dir <path>     where root signature placeholders are written
      --timeout <secs>      per-invocation timeout, 0 disables
      --retain-artifacts    keep root signature placeholders after the run
      --verify              verify each shader against its root signature
  -v, --verbose             debug logging
  -h, --help                print this message";

/// 解析后的命令行
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Cli {
    pub compiler: PathBuf,
    pub configuration: Option<BuildConfiguration>,
    pub input: PathBuf,
    pub out_dir: PathBuf,

    pub settings: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub retain_artifacts: bool,
    pub verify: bool,
    pub verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliCommand {
    Run(Cli),
    Help,
}

impl Cli {
    /// 解析参数，不包括程序名；支持 `--flag value` 与 `--flag=value`
    pub fn parse_from<I, S>(args: I) -> anyhow::Result<CliCommand>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cli = Cli::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            let (flag, inline_value) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg, None),
            };
            let mut value = || -> anyhow::Result<String> {
                match inline_value.clone() {
                    Some(value) => Ok(value),
                    None => args.next().with_context(|| format!("missing value for {flag}")),
                }
            };

            match flag.as_str() {
                "-h" | "--help" => return Ok(CliCommand::Help),
                "-d" | "--compiler" => cli.compiler = value()?.into(),
                "-c" | "--config" => cli.configuration = Some(value()?.parse()?),
                "-i" | "--input" => cli.input = value()?.into(),
                "-o" | "--out-dir" => cli.out_dir = value()?.into(),
                "--settings" => cli.settings = Some(value()?.into()),
                "--temp-dir" => cli.temp_dir = Some(value()?.into()),
                "--timeout" => {
                    let secs = value()?;
                    cli.timeout_secs = Some(secs.parse().with_context(|| format!("invalid timeout '{secs}'"))?);
                }
                "--retain-artifacts" => cli.retain_artifacts = true,
                "--verify" => cli.verify = true,
                "-v" | "--verbose" => cli.verbose = true,
                _ => bail!("unknown argument '{flag}'"),
            }
        }

        for (flag, missing) in [
            ("--compiler", cli.compiler.as_os_str().is_empty()),
            ("--config", cli.configuration.is_none()),
            ("--input", cli.input.as_os_str().is_empty()),
            ("--out-dir", cli.out_dir.as_os_str().is_empty()),
        ] {
            if missing {
                bail!("{flag} is required");
            }
        }

        Ok(CliCommand::Run(cli))
    }

    /// 加载配置文件，命令行参数覆盖文件中的值，并检查输入是否存在
    pub fn into_options(self) -> anyhow::Result<BuildOptions> {
        let mut settings = match &self.settings {
            Some(path) => BuildSettings::from_file(path).with_context(|| format!("load settings {path:?}"))?,
            None => BuildSettings::default(),
        };
        if let Some(timeout_secs) = self.timeout_secs {
            settings.timeout_secs = timeout_secs;
        }
        if self.temp_dir.is_some() {
            settings.temp_dir = self.temp_dir;
        }
        settings.retain_artifacts |= self.retain_artifacts;
        settings.verify_root_signature |= self.verify;

        check_compiler(&self.compiler)?;
        if !self.input.is_file() {
            bail!("input TOC {:?} does not exist", self.input);
        }

        let configuration = self.configuration.context("--config is required")?;

        Ok(BuildOptions {
            compiler: self.compiler,
            configuration,
            input: self.input,
            out_dir: self.out_dir,
            settings,
        })
    }
}

/// 带目录的编译器路径必须存在；单独的程序名交给 `PATH`
fn check_compiler(compiler: &Path) -> anyhow::Result<()> {
    if compiler.components().count() > 1 {
        if !compiler.is_file() {
            bail!("compiler {:?} does not exist", compiler);
        }
    } else if !compiler.is_file() {
        log::warn!("compiler {:?} will be resolved from PATH", compiler);
    }
    Ok(())
}
