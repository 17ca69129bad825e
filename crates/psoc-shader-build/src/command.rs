use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use psoc_toc::{PipelineState, ShaderComponent, ShaderStage};

use crate::build_config::BuildConfiguration;
use crate::error::Result;
use crate::flag_table::FlagTable;

/// 一次外部编译器调用
///
/// 输出文件名相对于 `working_dir`，也就是输出目录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
    /// 产物的完整路径，仅用于记录，不传给编译器
    pub output: Option<PathBuf>,
}

impl CompileCommand {
    /// 编译 `component`，输出为 `{pipeline_state.name}.{suffix}`
    ///
    /// `-T <profile> <flags..> [-E <entry>] <source> -Fo <output>`
    pub fn compile(
        program: &Path,
        working_dir: &Path,
        table: &FlagTable,
        configuration: BuildConfiguration,
        pipeline_state: &PipelineState,
        component: &ShaderComponent,
    ) -> Result<Self> {
        let template = table.get(component.stage(), configuration)?;
        let output_name = pipeline_state.output_file_name(component.stage());

        let mut args: Vec<OsString> = Vec::with_capacity(template.flags.len() + 7);
        args.push("-T".into());
        args.push(template.profile.as_str().into());
        args.extend(template.flags.iter().map(OsString::from));
        if let Some(entry_point) = component.entry_point() {
            args.push("-E".into());
            args.push(entry_point.into());
        }
        args.push(component.source_path().into());
        args.push("-Fo".into());
        args.push(output_name.as_str().into());

        Ok(Self {
            program: program.to_path_buf(),
            args,
            working_dir: working_dir.to_path_buf(),
            output: Some(working_dir.join(output_name)),
        })
    }

    /// 检查已经编译好的 shader 与同一个 pipeline state 的 root signature 是否匹配
    ///
    /// `-T <profile> -verifyrootsignature {name}.rso {name}.{suffix}`，root signature 本身返回 `None`
    pub fn verify_root_signature(
        program: &Path,
        working_dir: &Path,
        table: &FlagTable,
        pipeline_state: &PipelineState,
        stage: ShaderStage,
    ) -> Option<Self> {
        if stage == ShaderStage::RootSignature {
            return None;
        }

        let args = vec![
            OsString::from("-T"),
            format!("{}_{}", stage.profile_prefix(), table.shader_model()).into(),
            "-verifyrootsignature".into(),
            pipeline_state.output_file_name(ShaderStage::RootSignature).into(),
            pipeline_state.output_file_name(stage).into(),
        ];

        Some(Self {
            program: program.to_path_buf(),
            args,
            working_dir: working_dir.to_path_buf(),
            output: None,
        })
    }

    /// 用于日志与错误信息的命令行
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(&arg);
                line.push('"');
            } else {
                line.push_str(&arg);
            }
        }
        line
    }

    pub fn to_process(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(&self.working_dir);
        command
    }
}
