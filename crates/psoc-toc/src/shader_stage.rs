use std::fmt;
use std::str::FromStr;

use crate::error::TocError;

/// 一个编译单元在 pipeline state 中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    /// 以宏的形式书写，借助占位 compute shader 编译
    RootSignature,
    Vertex,
    /// HLSL Pixel shader
    Pixel,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 4] = [Self::RootSignature, Self::Vertex, Self::Pixel, Self::Compute];

    /// TOC 中对应的字段名
    pub const fn manifest_key(self) -> &'static str {
        match self {
            Self::RootSignature => "root_signature",
            Self::Vertex => "vertex_shader",
            Self::Pixel => "pixel_shader",
            Self::Compute => "compute_shader",
        }
    }

    /// 传递给 dxc 的 shader model target 前缀
    ///
    /// root signature 由占位 compute shader 承载，所以也是 `cs`
    pub const fn profile_prefix(self) -> &'static str {
        match self {
            Self::RootSignature => "cs",
            Self::Vertex => "vs",
            Self::Pixel => "ps",
            Self::Compute => "cs",
        }
    }

    /// 编译产物的扩展名
    pub const fn output_suffix(self) -> &'static str {
        match self {
            Self::RootSignature => "rso",
            Self::Vertex => "vso",
            Self::Pixel => "pso",
            Self::Compute => "cso",
        }
    }

    /// 是否需要 entry point
    #[inline]
    pub const fn requires_entry_point(self) -> bool {
        !matches!(self, Self::RootSignature)
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key())
    }
}

impl FromStr for ShaderStage {
    type Err = TocError;

    /// 同时接受 snake_case 的字段名和 PascalCase 的元素名
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root_signature" | "RootSignature" => Ok(Self::RootSignature),
            "vertex_shader" | "VertexShader" => Ok(Self::Vertex),
            "pixel_shader" | "PixelShader" => Ok(Self::Pixel),
            "compute_shader" | "ComputeShader" => Ok(Self::Compute),
            _ => Err(TocError::UnsupportedStage { stage: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stage_names() {
        for stage in ShaderStage::ALL {
            assert_eq!(stage.manifest_key().parse::<ShaderStage>().unwrap(), stage);
        }
        assert_eq!("PixelShader".parse::<ShaderStage>().unwrap(), ShaderStage::Pixel);
    }

    #[test]
    fn test_unknown_stage() {
        let err = "geometry_shader".parse::<ShaderStage>().unwrap_err();
        assert!(matches!(err, TocError::UnsupportedStage { stage } if stage == "geometry_shader"));
    }

    #[test]
    fn test_suffixes_are_distinct() {
        let suffixes: std::collections::HashSet<_> = ShaderStage::ALL.iter().map(|s| s.output_suffix()).collect();
        assert_eq!(suffixes.len(), ShaderStage::ALL.len());
    }
}
