//! 着色器编译
//!
//! HLSL 源文件在运行时读取并编译。编译器通过 [`ShaderCompiler`] 抽象：
//! Windows 下由 `D3DCompile` 实现，测试中使用记录型的模拟编译器。
//!
//! 编译失败时错误中携带编译器的完整诊断文本，调用方负责展示给用户。
//! 没有缓存的后备着色器，失败即致命。
//!
//! `#include "file"` 在交给编译器之前展开（相对于源文件所在目录），
//! 并插入 `#line` 指令，诊断中的行号仍指向原文件。
//!
//! # 着色器组合
//!
//! | RenderMode | 文件 | VS | 纹理 PS | 纯色 PS |
//! |------------|------|----|---------|---------|
//! | Pbr | `pbr.hlsl` | `VS` | `PS_Normal` | `PS_SolidColor` |
//! | Skinned | `skinned.hlsl` | `VS` | `PS` | `PS_SolidColor` |

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::core::config::RenderMode;
use crate::core::error::{FrameworkError, GraphicsError, Result};

/// 顶点着色器目标
pub const VS_PROFILE: &str = "vs_4_0";
/// 像素着色器目标
pub const PS_PROFILE: &str = "ps_4_0";

/// 着色器编译器
pub trait ShaderCompiler {
    /// 编译一段 HLSL 源码
    ///
    /// 成功时返回字节码，失败时返回编译器诊断文本。
    fn compile_source(
        &self,
        source: &str,
        source_name: &str,
        entry_point: &str,
        profile: &str,
    ) -> std::result::Result<Vec<u8>, String>;
}

/// 最大嵌套包含深度
const MAX_INCLUDE_DEPTH: usize = 8;

/// 展开 `#include "file"` 指令
fn expand_includes(source: &str, source_name: &str, dir: &Path, depth: usize) -> Result<String> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(FrameworkError::Initialization(format!(
            "{}: includes nested deeper than {}",
            source_name, MAX_INCLUDE_DEPTH
        )));
    }

    let mut expanded = String::with_capacity(source.len());
    for (number, line) in source.lines().enumerate() {
        let included = line
            .trim_start()
            .strip_prefix("#include")
            .map(str::trim)
            .and_then(|rest| rest.strip_prefix('"'))
            .and_then(|rest| rest.split('"').next());

        match included {
            Some(name) => {
                let path = dir.join(name);
                let text = fs::read_to_string(&path).map_err(|e| {
                    error!(path = %path.display(), from = source_name, "Cannot read shader include: {}", e);
                    FrameworkError::Io(e)
                })?;
                let nested_dir = path.parent().unwrap_or(dir);
                expanded.push_str(&format!("#line 1 \"{}\"\n", name));
                expanded.push_str(&expand_includes(&text, name, nested_dir, depth + 1)?);
                expanded.push_str(&format!("#line {} \"{}\"\n", number + 2, source_name));
            }
            None => {
                expanded.push_str(line);
                expanded.push('\n');
            }
        }
    }
    Ok(expanded)
}

/// 编译完成的着色器阶段
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub source: PathBuf,
    pub entry_point: String,
    pub profile: String,
    pub bytecode: Vec<u8>,
}

/// 一种渲染模式使用的着色器文件和入口点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderSet {
    pub file: &'static str,
    pub vertex_entry: &'static str,
    pub textured_pixel_entry: &'static str,
    pub solid_pixel_entry: &'static str,
}

impl ShaderSet {
    pub fn for_mode(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Pbr => Self {
                file: "pbr.hlsl",
                vertex_entry: "VS",
                textured_pixel_entry: "PS_Normal",
                solid_pixel_entry: "PS_SolidColor",
            },
            RenderMode::Skinned => Self {
                file: "skinned.hlsl",
                vertex_entry: "VS",
                textured_pixel_entry: "PS",
                solid_pixel_entry: "PS_SolidColor",
            },
        }
    }
}

/// 一个渲染模式所需的全部着色器阶段
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub vertex: CompiledStage,
    pub textured_pixel: CompiledStage,
    pub solid_pixel: CompiledStage,
}

impl ShaderProgram {
    /// 读取源文件并在指定入口点编译
    ///
    /// # 错误
    ///
    /// - 源文件无法读取：`Io`
    /// - 编译失败或字节码为空：`ShaderCompilation`，诊断文本非空
    pub fn compile<C: ShaderCompiler + ?Sized>(
        compiler: &C,
        source_path: &Path,
        entry_point: &str,
        profile: &str,
    ) -> Result<CompiledStage> {
        let source = fs::read_to_string(source_path).map_err(|e| {
            error!(path = %source_path.display(), "Cannot read shader source: {}", e);
            FrameworkError::Io(e)
        })?;
        let source_name = source_path.display().to_string();
        let dir = source_path.parent().unwrap_or_else(|| Path::new("."));
        let source = expand_includes(&source, &source_name, dir, 0)?;

        let failure = |diagnostics: String| -> FrameworkError {
            let diagnostics = if diagnostics.trim().is_empty() {
                format!("{} ({}): compiler reported failure without diagnostics", entry_point, profile)
            } else {
                diagnostics
            };
            error!(source = %source_name, entry = entry_point, "Shader compilation failed:\n{}", diagnostics);
            GraphicsError::ShaderCompilation {
                source: source_name.clone(),
                entry_point: entry_point.to_string(),
                diagnostics,
            }
            .into()
        };

        let bytecode = compiler
            .compile_source(&source, &source_name, entry_point, profile)
            .map_err(&failure)?;
        if bytecode.is_empty() {
            return Err(failure(format!(
                "{} ({}): compiler returned empty bytecode",
                entry_point, profile
            )));
        }

        debug!(source = %source_name, entry = entry_point, profile, bytes = bytecode.len(), "Shader compiled");
        Ok(CompiledStage {
            source: source_path.to_path_buf(),
            entry_point: entry_point.to_string(),
            profile: profile.to_string(),
            bytecode,
        })
    }

    /// 编译渲染模式对应的三个阶段
    pub fn load<C: ShaderCompiler + ?Sized>(
        compiler: &C,
        shader_dir: &Path,
        mode: RenderMode,
    ) -> Result<Self> {
        let set = ShaderSet::for_mode(mode);
        let path = shader_dir.join(set.file);
        Ok(Self {
            vertex: Self::compile(compiler, &path, set.vertex_entry, VS_PROFILE)?,
            textured_pixel: Self::compile(compiler, &path, set.textured_pixel_entry, PS_PROFILE)?,
            solid_pixel: Self::compile(compiler, &path, set.solid_pixel_entry, PS_PROFILE)?,
        })
    }
}
