/// 动画模块
///
/// glTF 动画由若干通道组成，每个通道驱动一个节点的平移、旋转或缩放。
/// 采样时按时间戳二分查找关键帧，平移 / 缩放线性插值，旋转使用球面插值。

use crate::geometry::hierarchy::NodeHierarchy;
use crate::math::{Quaternion, Vector3};

/// 一个通道的关键帧数据
#[derive(Debug, Clone)]
pub enum Keyframes {
    Translation(Vec<Vector3>),
    Rotation(Vec<Quaternion>),
    Scale(Vec<Vector3>),
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) | Keyframes::Scale(v) => v.len(),
            Keyframes::Rotation(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 关键帧之间的插值方式
///
/// glTF 的三次样条在加载时只保留关键帧数值，按线性处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

/// 动画通道
#[derive(Debug, Clone)]
pub struct Channel {
    /// 目标节点（层级中的下标）
    pub node: usize,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
    pub interpolation: Interpolation,
}

impl Channel {
    /// 时间 `t` 所在的关键帧区间：(前一帧, 后一帧, 插值系数)
    fn locate(&self, t: f32) -> Option<(usize, usize, f32)> {
        let count = self.timestamps.len().min(self.keyframes.len());
        if count == 0 {
            return None;
        }

        let times = &self.timestamps[..count];
        let next = times.partition_point(|&k| k <= t);
        if next == 0 {
            return Some((0, 0, 0.0));
        }
        if next >= count {
            return Some((count - 1, count - 1, 0.0));
        }

        let prev = next - 1;
        let span = times[next] - times[prev];
        let factor = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear if span > f32::EPSILON => (t - times[prev]) / span,
            Interpolation::Linear => 0.0,
        };
        Some((prev, next, factor))
    }

    /// 在时间 `t` 采样并写入层级中的目标节点
    pub fn apply(&self, t: f32, hierarchy: &mut NodeHierarchy) {
        let Some((a, b, factor)) = self.locate(t) else {
            return;
        };
        let Some(node) = hierarchy.node_mut(self.node) else {
            return;
        };

        match &self.keyframes {
            Keyframes::Translation(values) => {
                node.transform.set_translation(values[a].lerp(&values[b], factor));
            }
            Keyframes::Rotation(values) => {
                let rotation = values[a]
                    .try_slerp(&values[b], factor, 1e-6)
                    .unwrap_or(values[a]);
                node.transform.set_rotation(rotation);
            }
            Keyframes::Scale(values) => {
                node.transform.set_scale(values[a].lerp(&values[b], factor));
            }
        }
    }
}

/// 动画片段
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
    /// 片段时长（最后一个时间戳）
    pub duration: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.timestamps.last().copied())
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            channels,
            duration,
        }
    }

    /// 在时间 `t` 采样所有通道
    pub fn apply(&self, t: f32, hierarchy: &mut NodeHierarchy) {
        for channel in &self.channels {
            channel.apply(t, hierarchy);
        }
    }
}

/// 循环播放状态
#[derive(Debug, Clone, Default)]
pub struct AnimationPlayer {
    clip: Option<usize>,
    time: f32,
}

impl AnimationPlayer {
    pub fn new(clip: Option<usize>) -> Self {
        Self { clip, time: 0.0 }
    }

    pub fn clip(&self) -> Option<usize> {
        self.clip
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// 前进 `delta_time` 秒并把结果写入层级
    ///
    /// 时长为 0 的片段停留在第一帧。
    pub fn advance(&mut self, delta_time: f32, clips: &[AnimationClip], hierarchy: &mut NodeHierarchy) {
        let Some(clip) = self.clip.and_then(|i| clips.get(i)) else {
            return;
        };

        self.time += delta_time.max(0.0);
        if clip.duration > 0.0 {
            self.time %= clip.duration;
        } else {
            self.time = 0.0;
        }
        clip.apply(self.time, hierarchy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Transform;
    use crate::geometry::hierarchy::NodeDesc;

    fn single_node() -> NodeHierarchy {
        let descs = vec![NodeDesc {
            name: "bone".into(),
            transform: Transform::identity(),
            ..Default::default()
        }];
        NodeHierarchy::build(descs, &[0]).unwrap().0
    }

    fn translation_clip(interpolation: Interpolation) -> AnimationClip {
        AnimationClip::new(
            "move",
            vec![Channel {
                node: 0,
                timestamps: vec![0.0, 1.0, 2.0],
                keyframes: Keyframes::Translation(vec![
                    Vector3::new(0.0, 0.0, 0.0),
                    Vector3::new(2.0, 0.0, 0.0),
                    Vector3::new(2.0, 4.0, 0.0),
                ]),
                interpolation,
            }],
        )
    }

    #[test]
    fn test_duration() {
        assert_eq!(translation_clip(Interpolation::Linear).duration, 2.0);
    }

    #[test]
    fn test_linear_sampling() {
        let clip = translation_clip(Interpolation::Linear);
        let mut hierarchy = single_node();

        clip.apply(0.5, &mut hierarchy);
        let t = hierarchy.node(0).unwrap().transform.translation();
        assert!((t.x - 1.0).abs() < 1e-6);

        clip.apply(1.5, &mut hierarchy);
        let t = hierarchy.node(0).unwrap().transform.translation();
        assert!((t.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_step_sampling_and_clamping() {
        let clip = translation_clip(Interpolation::Step);
        let mut hierarchy = single_node();

        clip.apply(0.9, &mut hierarchy);
        assert_eq!(hierarchy.node(0).unwrap().transform.translation().x, 0.0);

        clip.apply(10.0, &mut hierarchy);
        assert_eq!(hierarchy.node(0).unwrap().transform.translation().y, 4.0);
    }

    #[test]
    fn test_rotation_slerp() {
        let end = Quaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2);
        let clip = AnimationClip::new(
            "spin",
            vec![Channel {
                node: 0,
                timestamps: vec![0.0, 1.0],
                keyframes: Keyframes::Rotation(vec![Quaternion::identity(), end]),
                interpolation: Interpolation::Linear,
            }],
        );
        let mut hierarchy = single_node();
        clip.apply(0.5, &mut hierarchy);

        let angle = hierarchy.node(0).unwrap().transform.rotation().angle();
        assert!((angle - std::f32::consts::FRAC_PI_4).abs() < 1e-5);
    }

    #[test]
    fn test_player_loops() {
        let clips = vec![translation_clip(Interpolation::Linear)];
        let mut hierarchy = single_node();
        let mut player = AnimationPlayer::new(Some(0));

        player.advance(2.5, &clips, &mut hierarchy);
        assert!((player.time() - 0.5).abs() < 1e-6);

        let t = hierarchy.node(0).unwrap().transform.translation();
        assert!((t.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_player_without_clip_is_inert() {
        let mut hierarchy = single_node();
        let mut player = AnimationPlayer::new(Some(3));
        player.advance(1.0, &[], &mut hierarchy);
        assert_eq!(player.time(), 0.0);
    }
}
