//! 动画时间轴与播放
//!
//! `AnimationHandler` 持有一段动画的全部关键帧，并在每一帧把可见层上的关键帧叠加到方块树上。
//! 引擎不会自行重置姿态：调用方如需确定性的叠加结果，应在 `animate` 之前先恢复绑定姿态。

use std::collections::{BTreeMap, HashMap};

use super::capture::{is_negligible, PoseCapture};
use super::keyframe::{Keyframe, KeyframeId};
use crate::skeleton::CubeManager;

/// 播放状态
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayState {
    /// 当前时间（tick）
    pub ticks: f32,
    /// 循环混合期间界面显示用的时间，其余时候为 None
    pub visible_ticks: Option<f32>,
    /// 播放速度倍率
    pub speed: f32,
    pub playing: bool,
}

impl Default for PlayState {
    fn default() -> Self {
        Self {
            ticks: 0.0,
            visible_ticks: None,
            speed: 1.0,
            playing: false,
        }
    }
}

impl PlayState {
    /// 推进一帧
    pub fn on_frame(&mut self, delta_time: f32) {
        if self.playing {
            self.ticks += delta_time * self.speed;
        }
    }

    /// 界面显示的时间
    pub fn display_ticks(&self) -> f32 {
        self.visible_ticks.unwrap_or(self.ticks)
    }
}

/// 关键帧层信息
#[derive(Clone, Debug, PartialEq)]
pub struct LayerInfo {
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    /// 定义模式：关键帧的结束姿态作为绝对目标保存
    pub defined_mode: bool,
}

impl LayerInfo {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            name: format!("Layer {}", id),
            visible: true,
            locked: false,
            defined_mode: false,
        }
    }
}

/// 循环区间：`[start, end]` 循环，结束后用 `duration` 个 tick 混合回起点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopData {
    pub start: f32,
    pub end: f32,
    pub duration: f32,
}

impl LoopData {
    pub fn new(start: f32, end: f32, duration: f32) -> Self {
        Self { start, end, duration }
    }

    /// 包含混合段的循环结束时间
    pub fn window_end(&self) -> f32 {
        self.end + self.duration
    }
}

/// 事件数据
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventData {
    pub event_type: String,
    pub data: String,
}

impl EventData {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}

/// 时间轴事件
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationEvent {
    pub time: f32,
    pub data: Vec<EventData>,
}

/// 动画时间轴
#[derive(Clone, Debug)]
pub struct AnimationHandler {
    pub(crate) keyframes: Vec<Keyframe>,
    /// 层 ID -> 层信息
    pub(crate) keyframe_info: BTreeMap<u32, LayerInfo>,
    /// 定义模式下各关键帧的结束姿态
    pub(crate) defined_keyframe_info: HashMap<KeyframeId, PoseCapture>,
    /// 按时间排序
    events: Vec<AnimationEvent>,
    /// 循环混合用的合成关键帧
    loop_keyframe: Keyframe,
    loop_data: Option<LoopData>,
    pub playstate: PlayState,
    pub looping: bool,
    finish_looping: bool,
    finish_looping_marker: bool,
    /// 外部强制的时间（预览用，不影响播放进度）
    pub forced_ticks: Option<f32>,
    next_id: u64,
}

impl Default for AnimationHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationHandler {
    pub fn new() -> Self {
        Self {
            keyframes: Vec::new(),
            keyframe_info: BTreeMap::new(),
            defined_keyframe_info: HashMap::new(),
            events: Vec::new(),
            loop_keyframe: Keyframe::new(KeyframeId(0)),
            loop_data: None,
            playstate: PlayState::default(),
            looping: false,
            finish_looping: false,
            finish_looping_marker: false,
            forced_ticks: None,
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> KeyframeId {
        let id = KeyframeId(self.next_id);
        self.next_id += 1;
        id
    }

    // ========== 关键帧 ==========

    /// 在指定层创建空关键帧
    pub fn create_keyframe(&mut self, layer: u32) -> KeyframeId {
        let id = self.allocate_id();
        let mut keyframe = Keyframe::new(id);
        keyframe.layer = layer;
        self.ensure_layer(layer);
        self.keyframes.push(keyframe);
        id
    }

    /// 添加关键帧，重新分配 ID
    pub fn add_keyframe(&mut self, mut keyframe: Keyframe) -> KeyframeId {
        let id = self.allocate_id();
        keyframe.id = id;
        self.ensure_layer(keyframe.layer);
        self.keyframes.push(keyframe);
        id
    }

    pub fn remove_keyframe(&mut self, id: KeyframeId) -> Option<Keyframe> {
        let index = self.keyframes.iter().position(|k| k.id == id)?;
        self.defined_keyframe_info.remove(&id);
        Some(self.keyframes.remove(index))
    }

    /// 复制关键帧（不含 grow 增量），返回新 ID
    pub fn duplicate_keyframe(&mut self, id: KeyframeId) -> Option<KeyframeId> {
        let new_id = KeyframeId(self.next_id);
        let copy = self.keyframe(id)?.clone_keyframe(new_id);
        self.next_id += 1;
        self.keyframes.push(copy);
        Some(new_id)
    }

    pub fn keyframe(&self, id: KeyframeId) -> Option<&Keyframe> {
        self.keyframes.iter().find(|k| k.id == id)
    }

    pub fn keyframe_mut(&mut self, id: KeyframeId) -> Option<&mut Keyframe> {
        self.keyframes.iter_mut().find(|k| k.id == id)
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    // ========== 层 ==========

    pub fn ensure_layer(&mut self, layer: u32) -> &mut LayerInfo {
        self.keyframe_info
            .entry(layer)
            .or_insert_with(|| LayerInfo::new(layer))
    }

    pub fn layer_info(&self, layer: u32) -> Option<&LayerInfo> {
        self.keyframe_info.get(&layer)
    }

    pub fn layer_info_mut(&mut self, layer: u32) -> Option<&mut LayerInfo> {
        self.keyframe_info.get_mut(&layer)
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerInfo> {
        self.keyframe_info.values()
    }

    /// 没有层信息的层视为可见
    pub fn is_layer_visible(&self, layer: u32) -> bool {
        self.keyframe_info.get(&layer).map_or(true, |info| info.visible)
    }

    pub fn is_layer_locked(&self, layer: u32) -> bool {
        self.keyframe_info.get(&layer).map_or(false, |info| info.locked)
    }

    // ========== 事件 ==========

    /// 按时间插入事件
    pub fn add_event(&mut self, event: AnimationEvent) {
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
    }

    pub fn events(&self) -> &[AnimationEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// 时间落在 `(from, to]` 内的事件
    pub fn events_between(&self, from: f32, to: f32) -> impl Iterator<Item = &AnimationEvent> {
        self.events.iter().filter(move |e| e.time > from && e.time <= to)
    }

    // ========== 循环 ==========

    pub fn loop_data(&self) -> Option<LoopData> {
        self.loop_data
    }

    /// 设置循环区间，之后需要调用 `update_loop_keyframe`
    pub fn set_loop_data(&mut self, loop_data: Option<LoopData>) {
        self.loop_data = loop_data;
    }

    pub fn loop_keyframe(&self) -> &Keyframe {
        &self.loop_keyframe
    }

    pub fn finish_looping(&self) -> bool {
        self.finish_looping
    }

    pub fn finish_looping_marker(&self) -> bool {
        self.finish_looping_marker
    }

    /// 请求结束循环；清除请求时同时复位标记
    pub fn set_finish_looping(&mut self, finish: bool) {
        self.finish_looping = finish;
        if !finish {
            self.finish_looping_marker = false;
        }
    }

    /// 重新生成循环混合关键帧（方块树变化后调用）
    ///
    /// 分别在循环起点和终点求值并记录姿态，增量为 `起点 - 终点`。结束后方块树恢复绑定姿态。
    pub fn update_loop_keyframe(&mut self, manager: &mut CubeManager) {
        let mut loop_keyframe = Keyframe::new(KeyframeId(0));
        let Some(loop_data) = self.loop_data else {
            self.loop_keyframe = loop_keyframe;
            return;
        };

        manager.reset_to_bind_pose();
        self.animate_at(loop_data.start, manager);
        let start = PoseCapture::capture(manager);

        manager.reset_to_bind_pose();
        self.animate_at(loop_data.end, manager);
        let end = PoseCapture::capture(manager);
        manager.reset_to_bind_pose();

        let mut delta = start.difference(&end);
        for map in [&mut delta.rotation, &mut delta.position, &mut delta.cube_grow] {
            map.retain(|_, value| !is_negligible(*value, 0.0));
        }

        loop_keyframe.start_time = 0.0;
        loop_keyframe.duration = loop_data.duration;
        loop_keyframe.rotation_map = delta.rotation;
        loop_keyframe.rotation_point_map = delta.position;
        loop_keyframe.cube_grow_map = delta.cube_grow;
        log::debug!(
            "Loop keyframe rebuilt: {} rotation, {} position, {} grow entries",
            loop_keyframe.rotation_map.len(),
            loop_keyframe.rotation_point_map.len(),
            loop_keyframe.cube_grow_map.len()
        );
        self.loop_keyframe = loop_keyframe;
    }

    // ========== 播放 ==========

    /// 每帧调用：推进时间、处理循环，并把可见层的关键帧叠加到方块树
    pub fn animate(&mut self, delta_time: f32, manager: &mut CubeManager) {
        self.playstate.on_frame(delta_time);

        let forced = self.forced_ticks;
        let mut ticks = forced.unwrap_or(self.playstate.ticks);
        self.playstate.visible_ticks = None;

        let mut loop_ticks = None;
        if forced.is_none() && self.playstate.playing && self.looping && !self.finish_looping_marker {
            if let Some(loop_data) = self.loop_data {
                let window_end = loop_data.window_end();
                let window = window_end - loop_data.start;
                if ticks >= window_end && window > 0.0 {
                    ticks = loop_data.start + (ticks - loop_data.start).rem_euclid(window);
                    self.playstate.ticks = ticks;
                }

                if loop_data.duration > 0.0 && ticks >= loop_data.end && ticks < window_end {
                    if self.finish_looping {
                        self.finish_looping_marker = true;
                    } else {
                        let progress = (ticks - loop_data.end) / loop_data.duration;
                        self.playstate.visible_ticks =
                            Some(loop_data.end + (loop_data.start - loop_data.end) * progress);
                        loop_ticks = Some(ticks - loop_data.end);
                        ticks = loop_data.end;
                    }
                }
            }
        }

        for keyframe in &self.keyframes {
            if self.is_layer_visible(keyframe.layer) {
                keyframe.animate(ticks, manager);
            }
        }
        if let Some(loop_ticks) = loop_ticks {
            self.loop_keyframe.animate(loop_ticks, manager);
        }
        manager.update_world_transforms();
    }

    /// 在指定时间求值全部关键帧（忽略层可见性和播放状态）
    pub fn animate_at(&self, ticks: f32, manager: &mut CubeManager) {
        for keyframe in &self.keyframes {
            keyframe.animate(ticks, manager);
        }
        manager.update_world_transforms();
    }

    /// 记录当前姿态
    pub fn capture_pose(&self, manager: &CubeManager) -> PoseCapture {
        PoseCapture::capture(manager)
    }

    /// 最晚的关键帧结束时间，没有关键帧时为 0
    pub fn total_time(&self) -> f32 {
        self.keyframes
            .iter()
            .map(Keyframe::end_time)
            .reduce(f32::max)
            .unwrap_or(0.0)
    }

    /// 最早的关键帧开始时间，没有关键帧时为 0
    pub fn min_time(&self) -> f32 {
        self.keyframes
            .iter()
            .map(|k| k.start_time)
            .reduce(f32::min)
            .unwrap_or(0.0)
    }

    /// 方块改名：同步所有关键帧、循环关键帧和定义姿态的键
    pub fn rename_cube(&mut self, old_name: &str, new_name: &str) {
        for keyframe in &mut self.keyframes {
            keyframe.rename(old_name, new_name);
        }
        self.loop_keyframe.rename(old_name, new_name);
        for capture in self.defined_keyframe_info.values_mut() {
            capture.rename(old_name, new_name);
        }
    }
}
