//! 调用外部编译器
//!
//! 每个编译单元启动一个进程，等待它结束后再处理下一个。
//! 占位 shader 会在编译结束后被删除，所以不能在进程还在运行时返回。

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use psoc_toc::{PipelineState, ShaderComponent, ShaderStage};

use crate::build_config::{BuildConfiguration, BuildOptions};
use crate::command::CompileCommand;
use crate::error::{BuildError, Result};
use crate::flag_table::FlagTable;

/// 轮询子进程状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// 一个编译产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub pipeline_state: String,
    pub stage: ShaderStage,
    pub path: PathBuf,
    /// 由共享的 root signature 复制而来，没有重新编译
    pub reused: bool,
}

/// 一次编译的结果
#[derive(Debug, Default)]
pub struct BuildReport {
    pub artifacts: Vec<Artifact>,
    /// 实际启动的编译器进程数量，包括校验
    pub invocations: usize,
}

impl BuildReport {
    pub fn compiled_count(&self) -> usize {
        self.artifacts.iter().filter(|a| !a.reused).count()
    }
}

/// dxc 编译器
pub struct ShaderCompiler {
    program: PathBuf,
    out_dir: PathBuf,
    configuration: BuildConfiguration,
    table: FlagTable,
    timeout: Option<Duration>,
    verify_root_signature: bool,
}

// new & init
impl ShaderCompiler {
    pub fn new(options: &BuildOptions) -> Result<Self> {
        let table = FlagTable::new(&options.settings)?;

        Ok(Self {
            program: options.compiler.clone(),
            out_dir: options.out_dir.clone(),
            configuration: options.configuration,
            table,
            timeout: options.settings.timeout(),
            verify_root_signature: options.settings.verify_root_signature,
        })
    }
}

// tools
impl ShaderCompiler {
    /// 按顺序编译所有 pipeline state，遇到第一个错误即中止
    ///
    /// 被多个 pipeline state 共享的 root signature 只编译一次，
    /// 其余的 pipeline state 得到一份复制的 `{name}.rso`。
    pub fn compile_shaders(&self, pipeline_states: &[PipelineState]) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        // 占位 shader 路径 -> 第一次编译的产物
        let mut compiled_root_signatures: HashMap<PathBuf, PathBuf> = HashMap::new();

        for pipeline_state in pipeline_states {
            log::info!("compile pipeline state: {}", pipeline_state.name);

            for component in pipeline_state.components() {
                let shared = match component.stage() {
                    ShaderStage::RootSignature => compiled_root_signatures.get(component.source_path()).cloned(),
                    _ => None,
                };

                let artifact = match shared {
                    Some(compiled) => self.reuse_root_signature(pipeline_state, &compiled)?,
                    None => {
                        let artifact = self.compile_component(pipeline_state, component)?;
                        report.invocations += 1;
                        if component.stage() == ShaderStage::RootSignature {
                            compiled_root_signatures
                                .insert(component.source_path().to_path_buf(), artifact.path.clone());
                        }
                        artifact
                    }
                };
                report.artifacts.push(artifact);

                if self.verify_root_signature {
                    if let Some(verify) = CompileCommand::verify_root_signature(
                        &self.program,
                        &self.out_dir,
                        &self.table,
                        pipeline_state,
                        component.stage(),
                    ) {
                        log::info!(
                            "verify {} against root signature",
                            pipeline_state.output_file_name(component.stage())
                        );
                        self.execute(&verify)?;
                        report.invocations += 1;
                    }
                }
            }
        }

        log::info!(
            "{} artifact(s), {} compiled, {} compiler invocation(s)",
            report.artifacts.len(),
            report.compiled_count(),
            report.invocations
        );
        Ok(report)
    }

    fn compile_component(&self, pipeline_state: &PipelineState, component: &ShaderComponent) -> Result<Artifact> {
        let command = CompileCommand::compile(
            &self.program,
            &self.out_dir,
            &self.table,
            self.configuration,
            pipeline_state,
            component,
        )?;

        log::info!("compiling {}: {:?}", component.stage(), component.source_path());
        self.execute(&command)?;

        Ok(Artifact {
            pipeline_state: pipeline_state.name.clone(),
            stage: component.stage(),
            path: self.out_dir.join(pipeline_state.output_file_name(component.stage())),
            reused: false,
        })
    }

    fn reuse_root_signature(&self, pipeline_state: &PipelineState, compiled: &Path) -> Result<Artifact> {
        let path = self.out_dir.join(pipeline_state.output_file_name(ShaderStage::RootSignature));

        if path != compiled {
            log::info!("reuse root signature {:?} -> {:?}", compiled, path);
            fs::copy(compiled, &path).map_err(|e| BuildError::io(compiled, e))?;
        }

        Ok(Artifact {
            pipeline_state: pipeline_state.name.clone(),
            stage: ShaderStage::RootSignature,
            path,
            reused: true,
        })
    }

    /// 运行命令，非 0 退出码视为错误
    fn execute(&self, command: &CompileCommand) -> Result<()> {
        let output = run_command(command, self.timeout)?;
        process_cmd_output(&output);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::CompilerInvocation {
                command: command.command_line(),
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

/// 启动进程并等待其结束，同时收集 stdout 与 stderr
///
/// `timeout` 为 `None` 时一直等待；超时后杀掉进程并返回 [`BuildError::CompilerTimeout`]，
/// 其它等待失败同样会先杀掉并回收进程。
pub fn run_command(command: &CompileCommand, timeout: Option<Duration>) -> Result<Output> {
    let command_line = command.command_line();
    log::debug!("run: {command_line} (cwd: {:?})", command.working_dir);

    let mut child = command
        .to_process()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BuildError::CompilerInvocation {
            command: command_line.clone(),
            detail: format!("failed to start: {e}"),
        })?;

    // 在单独的线程中读取，避免管道写满导致子进程阻塞
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let status = match wait_with_timeout(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            terminate(&mut child);
            join_reader(stdout);
            join_reader(stderr);
            return Err(BuildError::CompilerTimeout {
                command: command_line,
                timeout: timeout.unwrap_or_default(),
            });
        }
        Err(e) => {
            terminate(&mut child);
            join_reader(stdout);
            join_reader(stderr);
            return Err(BuildError::CompilerInvocation {
                command: command_line,
                detail: format!("failed to wait: {e}"),
            });
        }
    };

    Ok(Output {
        status,
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
    })
}

/// 杀掉子进程并回收，保证出错返回时不留下仍在运行的编译器
fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("failed to kill compiler: {e}");
    }
    if let Err(e) = child.wait() {
        log::warn!("failed to reap compiler: {e}");
    }
}

/// 根据 cmd 执行的结果，处理输出信息
pub fn process_cmd_output(output: &Output) {
    if !output.stdout.is_empty() {
        log::info!("stdout: {}", String::from_utf8_lossy(&output.stdout));
    }
    if !output.stderr.is_empty() {
        // dxc 的 warning 也输出到 stderr
        if output.status.success() {
            log::warn!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        } else {
            log::error!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        }
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            log::warn!("failed to read compiler output: {e}");
        }
        buf
    })
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|handle| handle.join().ok()).unwrap_or_default()
}


#[cfg(all(test, unix))]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::build_config::BuildSettings;
    use psoc_crate_tools::scoped_temp::ScopedTempDir;
    use std::sync::Arc;

    fn options(compiler: PathBuf, out_dir: &Path, settings: BuildSettings) -> BuildOptions {
        BuildOptions {
            compiler,
            configuration: BuildConfiguration::Release,
            input: PathBuf::from("unused.toml"),
            out_dir: out_dir.to_path_buf(),
            settings,
        }
    }

    fn pipeline_state(name: &str, rs: &Arc<ShaderComponent>, pixel: &Path) -> PipelineState {
        let mut ps = PipelineState::new(name, rs.clone());
        ps.set_stage(ShaderComponent::shader(ShaderStage::Pixel, pixel, "PSMain"));
        ps
    }

    #[test]
    fn test_compile_in_out_dir() {
        let _lock = process_lock();
        let dir = ScopedTempDir::new("psoc_compiler_test", false).unwrap();
        let out_dir = dir.join("out");
        fs::create_dir_all(&out_dir).unwrap();
        let log = dir.join("invocations.log");
        let compiler = fake_compiler(dir.path(), &log, 0);

        let rs = Arc::new(ShaderComponent::root_signature(dir.join("rs_placeholder.hlsl")));
        let states = vec![pipeline_state("Opaque", &rs, &dir.join("opaque.hlsl"))];

        let report = ShaderCompiler::new(&options(compiler, &out_dir, BuildSettings::default()))
            .unwrap()
            .compile_shaders(&states)
            .unwrap();

        let lines = read_log(&log);
        assert_eq!(lines.len(), 2);
        let cwd = fs::canonicalize(&out_dir).unwrap();
        assert!(lines.iter().all(|line| line.starts_with(&format!("cwd={} ", cwd.display()))));
        assert!(lines[0].contains("-T cs_6_4") && lines[0].contains("-Fo Opaque.rso"));
        assert!(lines[1].contains("-T ps_6_4"));
        assert!(lines[1].contains("-E PSMain") && lines[1].contains("-Fo Opaque.pso"));

        assert_eq!(report.invocations, 2);
        assert_eq!(report.artifacts.len(), 2);
        assert!(out_dir.join("Opaque.rso").is_file());
        assert!(out_dir.join("Opaque.pso").is_file());
    }

    #[test]
    fn test_shared_root_signature_compiled_once() {
        let _lock = process_lock();
        let dir = ScopedTempDir::new("psoc_compiler_test", false).unwrap();
        let log = dir.join("invocations.log");
        let compiler = fake_compiler(dir.path(), &log, 0);

        let rs = Arc::new(ShaderComponent::root_signature(dir.join("rs_placeholder.hlsl")));
        let states = vec![
            pipeline_state("A", &rs, &dir.join("a.hlsl")),
            pipeline_state("B", &rs, &dir.join("b.hlsl")),
        ];

        let report = ShaderCompiler::new(&options(compiler, dir.path(), BuildSettings::default()))
            .unwrap()
            .compile_shaders(&states)
            .unwrap();

        let lines = read_log(&log);
        assert_eq!(lines.iter().filter(|line| line.contains(".rso")).count(), 1);
        assert_eq!(report.invocations, 3);
        assert_eq!(report.compiled_count(), 3);

        let reused: Vec<_> = report.artifacts.iter().filter(|a| a.reused).collect();
        assert_eq!(reused.len(), 1);
        assert_eq!(reused[0].pipeline_state, "B");
        assert_eq!(fs::read_to_string(dir.join("B.rso")).unwrap(), fs::read_to_string(dir.join("A.rso")).unwrap());
    }

    #[test]
    fn test_verify_root_signature() {
        let _lock = process_lock();
        let dir = ScopedTempDir::new("psoc_compiler_test", false).unwrap();
        let log = dir.join("invocations.log");
        let compiler = fake_compiler(dir.path(), &log, 0);

        let rs = Arc::new(ShaderComponent::root_signature(dir.join("rs_placeholder.hlsl")));
        let states = vec![pipeline_state("Opaque", &rs, &dir.join("opaque.hlsl"))];
        let settings = BuildSettings {
            verify_root_signature: true,
            ..Default::default()
        };

        let report = ShaderCompiler::new(&options(compiler, dir.path(), settings))
            .unwrap()
            .compile_shaders(&states)
            .unwrap();

        let lines = read_log(&log);
        assert_eq!(report.invocations, 3);
        assert!(lines[2].contains("-verifyrootsignature Opaque.rso Opaque.pso"));
    }

    #[test]
    fn test_non_zero_exit() {
        let _lock = process_lock();
        let dir = ScopedTempDir::new("psoc_compiler_test", false).unwrap();
        let log = dir.join("invocations.log");
        let compiler = fake_compiler(dir.path(), &log, 3);

        let rs = Arc::new(ShaderComponent::root_signature(dir.join("rs_placeholder.hlsl")));
        let states = vec![pipeline_state("Opaque", &rs, &dir.join("opaque.hlsl"))];

        let err = ShaderCompiler::new(&options(compiler, dir.path(), BuildSettings::default()))
            .unwrap()
            .compile_shaders(&states)
            .unwrap_err();

        assert!(matches!(err, BuildError::CompilerInvocation { detail, .. } if detail.contains("compiled")));
        // 第一个错误就中止
        assert_eq!(read_log(&log).len(), 1);
    }

    #[test]
    fn test_missing_compiler() {
        let dir = ScopedTempDir::new("psoc_compiler_test", false).unwrap();
        let command = CompileCommand {
            program: dir.join("no_such_dxc"),
            args: vec![],
            working_dir: dir.path().to_path_buf(),
            output: None,
        };

        let err = run_command(&command, None).unwrap_err();
        assert!(matches!(err, BuildError::CompilerInvocation { detail, .. } if detail.starts_with("failed to start")));
    }

    #[test]
    fn test_timeout() {
        let _lock = process_lock();
        let dir = ScopedTempDir::new("psoc_compiler_test", false).unwrap();
        let script = write_script(dir.path(), "hang.sh", "#!/bin/sh\necho $$ > hang.pid\nexec sleep 5\n");
        let command = CompileCommand {
            program: script,
            args: vec![],
            working_dir: dir.path().to_path_buf(),
            output: None,
        };

        let started = Instant::now();
        let err = run_command(&command, Some(Duration::from_millis(200))).unwrap_err();

        assert!(matches!(err, BuildError::CompilerTimeout { timeout, .. } if timeout == Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(4));

        // 进程已被杀掉并回收：僵尸进程仍然能通过 `kill -0`
        let pid = fs::read_to_string(dir.join("hang.pid")).unwrap();
        let alive = std::process::Command::new("kill")
            .args(["-0", pid.trim()])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success());
    }
}
