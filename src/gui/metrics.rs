//! 帧率统计模块
//!
//! FrameStats 按滚动的一秒窗口统计帧数。时间由调用方以帧间隔传入，
//! 不读取系统时钟，便于在测试中精确控制。

/// 帧率统计
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    accumulator: f32,
    frame_counter: u32,
    fps: u32,
    last_delta: f32,
}

impl FrameStats {
    /// 创建新的帧率统计器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一帧
    ///
    /// 累计时间超过一秒时，把这一秒内的帧数作为新的 FPS，窗口向前滑动一秒。
    pub fn record_frame(&mut self, delta_time: f32) {
        self.last_delta = delta_time.max(0.0);
        self.accumulator += self.last_delta;
        self.frame_counter += 1;

        if self.accumulator > 1.0 {
            self.accumulator -= 1.0;
            self.fps = self.frame_counter;
            self.frame_counter = 0;
        }
    }

    /// 上一个完整窗口的 FPS
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// 最近一帧的帧时间（毫秒）
    pub fn frame_time_ms(&self) -> f32 {
        self.last_delta * 1000.0
    }
}
