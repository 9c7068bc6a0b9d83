//! 进度曲线
//!
//! 每个关键帧用一组稀疏控制点描述缓动。存储是反向的：`y = 1` 表示"0% 进度"。

/// 进度曲线控制点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressionPoint {
    pub x: f32,
    pub y: f32,
    /// 端点（x = 0 / x = 1），不可删除
    pub required: bool,
}

impl ProgressionPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            required: false,
        }
    }

    pub fn required(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            required: true,
        }
    }

    /// 默认的线性曲线：(0, 1) 和 (1, 0)
    pub fn defaults() -> Vec<ProgressionPoint> {
        vec![Self::required(0.0, 1.0), Self::required(1.0, 0.0)]
    }
}

/// 按 x 排序并保证两个端点存在
pub fn normalize_points(points: &mut Vec<ProgressionPoint>) {
    points.retain(|p| p.x.is_finite() && p.y.is_finite());
    for point in points.iter_mut() {
        point.x = point.x.clamp(0.0, 1.0);
        point.y = point.y.clamp(0.0, 1.0);
        point.required = point.x == 0.0 || point.x == 1.0;
    }
    points.sort_by(|a, b| a.x.total_cmp(&b.x));
    points.dedup_by(|a, b| a.x == b.x);

    if points.first().map_or(true, |p| p.x != 0.0) {
        points.insert(0, ProgressionPoint::required(0.0, 1.0));
    }
    if points.last().map_or(true, |p| p.x != 1.0) {
        points.push(ProgressionPoint::required(1.0, 0.0));
    }
}

/// 存储值（反向）：在包围 t 的两个控制点之间线性插值 y，端点包含在内
pub fn stored_value(points: &[ProgressionPoint], t: f32) -> Option<f32> {
    points.windows(2).find_map(|pair| {
        let (point, next) = (pair[0], pair[1]);
        (t >= point.x && t <= next.x).then(|| interpolate(point, next, t))
    })
}

/// 进度值：在严格包围 t 的两个控制点之间取 `1 - y`
///
/// t 恰好落在某个控制点上，或找不到包围点时，原样返回 t。
pub fn progression_value(points: &[ProgressionPoint], t: f32) -> f32 {
    if points.iter().any(|p| p.x == t) {
        return t;
    }
    points
        .windows(2)
        .find_map(|pair| {
            let (point, next) = (pair[0], pair[1]);
            (point.x < t && t < next.x).then(|| 1.0 - interpolate(point, next, t))
        })
        .unwrap_or(t)
}

fn interpolate(point: ProgressionPoint, next: ProgressionPoint, t: f32) -> f32 {
    let span = next.x - point.x;
    let amount = if span > 0.0 { (t - point.x) / span } else { 0.0 };
    point.y + (next.y - point.y) * amount
}
