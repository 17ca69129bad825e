use std::fs;

use psoc_crate_tools::scoped_temp::ScopedTempDir;
use psoc_toc::{RootSignatureCache, TocParser};

use crate::build_config::BuildOptions;
use crate::compiler::{BuildReport, ShaderCompiler};
use crate::error::{BuildError, Result};

/// 解析 TOC 并编译其中所有的 pipeline state
///
/// root signature 的占位 shader 写在本次运行专用的临时目录中，
/// 无论成功还是失败，返回时都会被删除（`retain_artifacts` 为 true 时保留）。
pub fn build(options: BuildOptions) -> Result<BuildReport> {
    let options = options.resolved()?;

    // 先构建参数表：配置有误时不必解析 TOC
    let compiler = ShaderCompiler::new(&options)?;

    fs::create_dir_all(&options.out_dir).map_err(|e| BuildError::io(&options.out_dir, e))?;

    let retain = options.settings.retain_artifacts;
    let session_dir = match &options.settings.temp_dir {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            ScopedTempDir::new_in(parent, "psoc", retain).map_err(|e| BuildError::io(parent, e))?
        }
        None => ScopedTempDir::new("psoc", retain).map_err(|e| BuildError::io(std::env::temp_dir(), e))?,
    };
    log::info!("placeholder dir: {:?}", session_dir.path());

    // cache 持有占位文件，需要先于 session_dir 释放
    let mut cache = RootSignatureCache::new(session_dir.path(), retain);
    let pipeline_states = TocParser::new(&mut cache).parse(&options.input)?;

    log::info!(
        "compile {} pipeline state(s) with {:?} ({})",
        pipeline_states.len(),
        options.compiler,
        options.configuration
    );
    compiler.compile_shaders(&pipeline_states)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::build_config::{BuildConfiguration, BuildSettings};
    use crate::compiler::test_utils::*;
    use psoc_toc::{ShaderStage, TocError};
    use std::path::{Path, PathBuf};

    struct Project {
        root: ScopedTempDir,
        log: PathBuf,
        compiler: PathBuf,
    }

    impl Project {
        fn new(toc: &str) -> Self {
            let root = ScopedTempDir::new("psoc_driver_test", false).unwrap();
            let data = root.join("data");
            fs::create_dir_all(data.join("rs")).unwrap();
            fs::write(
                data.join("rs/opaque.rs.hlsl"),
                "RootFlags(ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT),\n\nCBV(b0)\n",
            )
            .unwrap();
            fs::write(data.join("opaque.hlsl"), "float4 PSMain() : SV_Target { return 1; }\n").unwrap();
            fs::write(data.join("shaders.toml"), toc).unwrap();

            let log = root.join("invocations.log");
            let compiler = fake_compiler(root.path(), &log, 0);
            Self { root, log, compiler }
        }

        fn options(&self, retain: bool) -> BuildOptions {
            BuildOptions {
                compiler: self.compiler.clone(),
                configuration: BuildConfiguration::Debug,
                input: self.root.join("data/shaders.toml"),
                out_dir: self.root.join("out"),
                settings: BuildSettings {
                    temp_dir: Some(self.temp_parent()),
                    retain_artifacts: retain,
                    ..Default::default()
                },
            }
        }

        fn temp_parent(&self) -> PathBuf {
            self.root.join("tmp")
        }

        fn temp_entries(&self) -> Vec<PathBuf> {
            walk(&self.temp_parent())
        }
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(dir) else {
            return vec![];
        };
        entries
            .filter_map(|e| e.ok())
            .flat_map(|e| {
                let path = e.path();
                if path.is_dir() { walk(&path) } else { vec![path] }
            })
            .collect()
    }

    const OPAQUE_TOC: &str = r#"
        [[pipeline_state]]
        name = "Opaque"
        root_signature = { path = "rs/opaque.rs.hlsl" }
        pixel_shader = { path = "opaque.hlsl", entry = "PSMain" }
    "#;

    #[test]
    fn test_build_opaque() {
        let _lock = process_lock();
        let project = Project::new(OPAQUE_TOC);

        let report = build(project.options(false)).unwrap();

        let lines = read_log(&project.log);
        assert_eq!(lines.len(), 2);

        let out_dir = fs::canonicalize(project.root.join("out")).unwrap();
        let pixel = &lines[1];
        assert!(pixel.starts_with(&format!("cwd={} ", out_dir.display())));
        assert!(pixel.contains("-T ps_6_4"));
        assert!(pixel.contains("-Od -Zi -Qembed_debug"));
        assert!(pixel.contains("-E PSMain"));
        assert!(pixel.contains("-Fo Opaque.pso"));

        let rs = &lines[0];
        assert!(rs.contains("-rootsig-define RS"));
        assert!(rs.contains("-Fo Opaque.rso"));
        assert!(!rs.contains("-E "));

        let stages: Vec<_> = report.artifacts.iter().map(|a| a.stage).collect();
        assert_eq!(stages, vec![ShaderStage::RootSignature, ShaderStage::Pixel]);
        assert!(out_dir.join("Opaque.pso").is_file());

        // 占位 shader 与临时目录已删除
        assert!(project.temp_entries().is_empty());
        assert_eq!(fs::read_dir(project.temp_parent()).unwrap().count(), 0);
    }

    #[test]
    fn test_retain_artifacts() {
        let _lock = process_lock();
        let project = Project::new(OPAQUE_TOC);

        build(project.options(true)).unwrap();

        let retained = project.temp_entries();
        assert_eq!(retained.len(), 1);
        let source = fs::read_to_string(&retained[0]).unwrap();
        assert!(source.starts_with("#define RS RootFlags(ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT), \\\nCBV(b0)\n"));
    }

    #[test]
    fn test_placeholders_removed_on_failure() {
        let _lock = process_lock();
        let project = Project::new(
            r#"
            [[pipeline_state]]
            name = "Opaque"
            root_signature = { path = "rs/opaque.rs.hlsl" }

            [[pipeline_state]]
            name = "Broken"
            root_signature = { path = "rs/opaque.rs.hlsl" }
            vertex_shader = { path = "missing.hlsl", entry = "VSMain" }
            "#,
        );

        let err = build(project.options(false)).unwrap_err();

        assert!(matches!(err, BuildError::Toc(TocError::MissingResource { path }) if path.ends_with("missing.hlsl")));
        // 解析失败时不调用编译器
        assert!(read_log(&project.log).is_empty());
        assert!(project.temp_entries().is_empty());
    }

    #[test]
    fn test_invalid_settings_before_parse() {
        let project = Project::new("this is not toml [[");
        let mut options = project.options(false);
        options.settings.extra_flags.insert("hull_shader".to_string(), vec![]);

        let err = build(options).unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedStage { .. }));
    }
}
