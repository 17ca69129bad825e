//! 编译配置
//!
//! - [`BuildConfiguration`]：Debug / Release / Trace
//! - [`BuildSettings`]：可选的 TOML 配置文件，命令行参数会覆盖其中的值
//! - [`BuildOptions`]：一次编译所需的全部输入

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildConfiguration {
    /// 关闭优化，嵌入调试信息
    Debug,
    Release,
    /// 与 Release 相同的优化，额外定义 `TRACE`
    Trace,
}

impl BuildConfiguration {
    pub const ALL: [BuildConfiguration; 3] = [Self::Debug, Self::Release, Self::Trace];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
            Self::Trace => "Trace",
        }
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildConfiguration {
    type Err = BuildError;

    /// 不区分大小写
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|config| config.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BuildError::InvalidConfiguration(s.to_string()))
    }
}

/// TOML 配置文件
///
/// ```toml
/// shader_model = "6_4"
/// timeout_secs = 60
/// retain_artifacts = false
/// verify_root_signature = true
///
/// [extra_flags]
/// pixel_shader = ["-HV", "2021"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    /// dxc 的 shader model，形如 `6_4`
    pub shader_model: String,

    /// 单次编译器调用的超时时间，0 表示不限制
    pub timeout_secs: u64,

    /// 保留 root signature 的占位 shader 以及临时目录
    pub retain_artifacts: bool,

    /// 编译 shader 之后，用 `-verifyrootsignature` 检查其与 root signature 是否匹配
    pub verify_root_signature: bool,

    /// 占位 shader 的写入位置，默认为系统临时目录
    pub temp_dir: Option<PathBuf>,

    /// 每个 stage 额外的编译参数，key 为 TOC 中的 stage 字段名
    pub extra_flags: BTreeMap<String, Vec<String>>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            // WARP 最高只支持到 6.4
            shader_model: "6_4".to_string(),
            timeout_secs: 120,
            retain_artifacts: false,
            verify_root_signature: false,
            temp_dir: None,
            extra_flags: BTreeMap::new(),
        }
    }
}

impl BuildSettings {
    /// 从 TOML 文件加载配置，未填写的字段使用默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;

        toml::from_str(&content).map_err(|e| BuildError::Settings {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// 一次编译所需的全部输入
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// 外部编译器（dxc）的路径
    pub compiler: PathBuf,
    pub configuration: BuildConfiguration,
    /// TOC 文件
    pub input: PathBuf,
    /// 编译产物的输出目录，也是编译器的工作目录
    pub out_dir: PathBuf,
    pub settings: BuildSettings,
}

impl BuildOptions {
    /// 将相对路径转换为绝对路径
    ///
    /// 编译器的工作目录是输出目录，传给它的路径不能相对于当前目录。
    /// 不带目录的编译器名（例如 `dxc`）保持不变，由 `PATH` 查找。
    pub fn resolved(mut self) -> Result<Self> {
        let absolute = |path: &Path| std::path::absolute(path).map_err(|e| BuildError::io(path, e));

        if self.compiler.components().count() > 1 {
            self.compiler = absolute(&self.compiler)?;
        }
        self.input = absolute(&self.input)?;
        self.out_dir = absolute(&self.out_dir)?;
        if let Some(temp_dir) = &self.settings.temp_dir {
            self.settings.temp_dir = Some(absolute(temp_dir)?);
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_configuration() {
        assert_eq!("Debug".parse::<BuildConfiguration>().unwrap(), BuildConfiguration::Debug);
        assert_eq!("release".parse::<BuildConfiguration>().unwrap(), BuildConfiguration::Release);
        assert_eq!("TRACE".parse::<BuildConfiguration>().unwrap(), BuildConfiguration::Trace);

        let err = "Profile".parse::<BuildConfiguration>().unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfiguration(s) if s == "Profile"));
    }

    #[test]
    fn test_settings_defaults() {
        let settings: BuildSettings = toml::from_str("").unwrap();
        assert_eq!(settings, BuildSettings::default());
        assert_eq!(settings.timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: BuildSettings = toml::from_str(
            r#"
            shader_model = "6_6"
            timeout_secs = 0
            retain_artifacts = true

            [extra_flags]
            pixel_shader = ["-HV", "2021"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.shader_model, "6_6");
        assert_eq!(settings.timeout(), None);
        assert!(settings.retain_artifacts);
        assert!(!settings.verify_root_signature);
        assert_eq!(settings.extra_flags["pixel_shader"], vec!["-HV", "2021"]);
    }

    #[test]
    fn test_resolved_paths() {
        let options = BuildOptions {
            compiler: PathBuf::from("dxc"),
            configuration: BuildConfiguration::Debug,
            input: PathBuf::from("data/shaders.toml"),
            out_dir: PathBuf::from("out"),
            settings: BuildSettings {
                temp_dir: Some(PathBuf::from("tmp")),
                ..Default::default()
            },
        }
        .resolved()
        .unwrap();

        assert_eq!(options.compiler, Path::new("dxc"));
        assert!(options.input.is_absolute() && options.input.ends_with("data/shaders.toml"));
        assert!(options.out_dir.is_absolute());
        assert!(options.settings.temp_dir.as_ref().unwrap().is_absolute());

        let options = BuildOptions {
            compiler: PathBuf::from("tools/dxc"),
            ..options
        };
        assert!(options.resolved().unwrap().compiler.is_absolute());
    }

    #[test]
    fn test_settings_unknown_field() {
        assert!(toml::from_str::<BuildSettings>("shader_modle = \"6_4\"").is_err());
    }
}
