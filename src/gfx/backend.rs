//! 设备协商
//!
//! 按驱动类型（硬件、WARP、参考）依次尝试，每种驱动使用从新到旧的特性级别列表，
//! 第一次成功即返回。旧运行时不认识 11_1 时会返回 `E_INVALIDARG`，
//! 此时对同一驱动去掉 11_1 重试一次。
//!
//! 具体的创建调用由 [`DeviceFactory`] 提供，D3D11 后端包装 `D3D11CreateDevice`，
//! 测试中使用脚本化的工厂。

use std::fmt;

use tracing::{debug, info, warn};

use crate::core::error::{GraphicsError, Result};

/// 驱动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverType {
    Hardware,
    /// 软件光栅化（Windows Advanced Rasterization Platform）
    Warp,
    Reference,
}

impl DriverType {
    /// 协商顺序
    pub const PREFERENCE: [DriverType; 3] = [DriverType::Hardware, DriverType::Warp, DriverType::Reference];

    pub fn name(&self) -> &'static str {
        match self {
            DriverType::Hardware => "hardware",
            DriverType::Warp => "WARP",
            DriverType::Reference => "reference",
        }
    }
}

/// 特性级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureLevel {
    Level10_0,
    Level10_1,
    Level11_0,
    Level11_1,
}

impl FeatureLevel {
    /// 请求列表，从新到旧
    pub const REQUESTED: [FeatureLevel; 4] = [
        FeatureLevel::Level11_1,
        FeatureLevel::Level11_0,
        FeatureLevel::Level10_1,
        FeatureLevel::Level10_0,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureLevel::Level10_0 => "10_0",
            FeatureLevel::Level10_1 => "10_1",
            FeatureLevel::Level11_0 => "11_0",
            FeatureLevel::Level11_1 => "11_1",
        }
    }
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一次创建失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateError {
    /// 运行时不认识请求列表中的某个特性级别
    InvalidArg,
    Other(String),
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateError::InvalidArg => f.write_str("invalid argument"),
            CreateError::Other(msg) => f.write_str(msg),
        }
    }
}

/// 设备创建
pub trait DeviceFactory {
    type Device;

    /// 用指定驱动和特性级别列表创建设备，成功时返回实际得到的特性级别
    fn create(
        &mut self,
        driver: DriverType,
        levels: &[FeatureLevel],
    ) -> std::result::Result<(Self::Device, FeatureLevel), CreateError>;
}

/// 一次创建尝试
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub driver: DriverType,
    pub levels: Vec<FeatureLevel>,
    pub error: Option<CreateError>,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let levels: Vec<&str> = self.levels.iter().map(FeatureLevel::name).collect();
        write!(f, "{} [{}]", self.driver.name(), levels.join(", "))?;
        match &self.error {
            Some(e) => write!(f, ": {}", e),
            None => f.write_str(": ok"),
        }
    }
}

/// 协商结果
#[derive(Debug)]
pub struct NegotiatedDevice<T> {
    pub device: T,
    pub driver: DriverType,
    pub feature_level: FeatureLevel,
    pub attempts: Vec<Attempt>,
}

/// 依次尝试所有驱动类型
///
/// 全部失败时返回 `DeviceCreation`，错误信息列出每一次尝试。
pub fn negotiate<F: DeviceFactory>(factory: &mut F) -> Result<NegotiatedDevice<F::Device>> {
    let mut attempts = Vec::new();

    for driver in DriverType::PREFERENCE {
        let mut levels = FeatureLevel::REQUESTED.to_vec();
        let mut result = factory.create(driver, &levels);

        if result.as_ref().err() == Some(&CreateError::InvalidArg) {
            debug!(driver = driver.name(), "Runtime rejected 11_1, retrying without it");
            attempts.push(Attempt {
                driver,
                levels: levels.clone(),
                error: Some(CreateError::InvalidArg),
            });
            levels.retain(|&l| l != FeatureLevel::Level11_1);
            result = factory.create(driver, &levels);
        }

        match result {
            Ok((device, feature_level)) => {
                attempts.push(Attempt {
                    driver,
                    levels,
                    error: None,
                });
                info!(driver = driver.name(), feature_level = %feature_level, "Device created");
                return Ok(NegotiatedDevice {
                    device,
                    driver,
                    feature_level,
                    attempts,
                });
            }
            Err(e) => {
                warn!(driver = driver.name(), "Device creation failed: {}", e);
                attempts.push(Attempt {
                    driver,
                    levels,
                    error: Some(e),
                });
            }
        }
    }

    let summary: Vec<String> = attempts.iter().map(Attempt::to_string).collect();
    Err(GraphicsError::DeviceCreation(format!(
        "no driver type succeeded; attempts: {}",
        summary.join("; ")
    ))
    .into())
}
