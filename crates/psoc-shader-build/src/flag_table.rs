//! (stage, configuration) -> dxc 参数模板
//!
//! 参数表在加载配置时一次性构建并检查完整性，
//! 因此不支持的 stage 在读取配置时就会报错，而不是等到调用编译器时。

use std::collections::HashMap;

use psoc_toc::ShaderStage;
use psoc_toc::root_signature::RS_MACRO;

use crate::build_config::{BuildConfiguration, BuildSettings};
use crate::error::{BuildError, Result};

/// 某个 stage 在某个配置下的编译参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagTemplate {
    /// `-T` 的值，例如 `ps_6_4`
    pub profile: String,
    /// 除 `-T`、`-E`、源文件与 `-Fo` 以外的参数
    pub flags: Vec<String>,
}

impl FlagTemplate {
    /// 默认模板
    ///
    /// | configuration | flags |
    /// |---|---|
    /// | Debug | `-D HLSL -Od -Zi -Qembed_debug` |
    /// | Release | `-D HLSL` |
    /// | Trace | `-D HLSL -D TRACE` |
    ///
    /// root signature 额外加上 `-rootsig-define RS -extractrootsignature`
    pub fn default_for(stage: ShaderStage, configuration: BuildConfiguration, shader_model: &str) -> Self {
        let mut flags: Vec<String> = vec!["-D".into(), "HLSL".into()];

        match configuration {
            BuildConfiguration::Debug => flags.extend(["-Od", "-Zi", "-Qembed_debug"].map(String::from)),
            BuildConfiguration::Release => {}
            BuildConfiguration::Trace => flags.extend(["-D", "TRACE"].map(String::from)),
        }

        if stage == ShaderStage::RootSignature {
            flags.extend(["-rootsig-define", RS_MACRO, "-extractrootsignature"].map(String::from));
        }

        Self {
            profile: format!("{}_{}", stage.profile_prefix(), shader_model),
            flags,
        }
    }
}

/// 完整的参数表，包含每一种 stage 与 configuration 的组合
#[derive(Debug, Clone)]
pub struct FlagTable {
    shader_model: String,
    templates: HashMap<(ShaderStage, BuildConfiguration), FlagTemplate>,
}

// new & init
impl FlagTable {
    /// 由默认模板与配置中的额外参数构建
    pub fn new(settings: &BuildSettings) -> Result<Self> {
        let shader_model = normalize_shader_model(&settings.shader_model).ok_or_else(|| {
            BuildError::InvalidConfiguration(format!("shader model '{}'", settings.shader_model))
        })?;

        let mut templates = HashMap::new();
        for stage in ShaderStage::ALL {
            for configuration in BuildConfiguration::ALL {
                templates
                    .insert((stage, configuration), FlagTemplate::default_for(stage, configuration, &shader_model));
            }
        }

        for (stage_name, extra) in &settings.extra_flags {
            let stage: ShaderStage = stage_name.parse().map_err(|_| BuildError::UnsupportedStage {
                stage: stage_name.clone(),
            })?;
            for configuration in BuildConfiguration::ALL {
                if let Some(template) = templates.get_mut(&(stage, configuration)) {
                    template.flags.extend(extra.iter().cloned());
                }
            }
        }

        Self::from_templates(shader_model, templates)
    }

    /// 检查 `templates` 覆盖了所有 stage 与 configuration 的组合
    pub fn from_templates(
        shader_model: impl Into<String>,
        templates: HashMap<(ShaderStage, BuildConfiguration), FlagTemplate>,
    ) -> Result<Self> {
        for stage in ShaderStage::ALL {
            for configuration in BuildConfiguration::ALL {
                if !templates.contains_key(&(stage, configuration)) {
                    return Err(BuildError::UnsupportedStage {
                        stage: format!("{stage} has no flags for {configuration}"),
                    });
                }
            }
        }

        Ok(Self {
            shader_model: shader_model.into(),
            templates,
        })
    }
}

// getter
impl FlagTable {
    #[inline]
    pub fn shader_model(&self) -> &str {
        &self.shader_model
    }

    pub fn get(&self, stage: ShaderStage, configuration: BuildConfiguration) -> Result<&FlagTemplate> {
        self.templates.get(&(stage, configuration)).ok_or_else(|| BuildError::UnsupportedStage {
            stage: stage.to_string(),
        })
    }
}

/// `6_4` 与 `6.4` 都可以，统一为 `6_4`
fn normalize_shader_model(shader_model: &str) -> Option<String> {
    let (major, minor) = shader_model.split_once(['_', '.'])?;
    let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    (is_number(major) && is_number(minor)).then(|| format!("{major}_{minor}"))
}
