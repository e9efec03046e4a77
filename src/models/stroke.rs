use serde::{Deserialize, Serialize};

/// 笔迹采样点，记录后不可变
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    /// 压感，范围 [0, 1]
    pub pressure: f64,
    pub timestamp_ms: i64,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64, pressure: f64, timestamp_ms: i64) -> Self {
        Self {
            x,
            y,
            pressure: pressure.clamp(0.0, 1.0),
            timestamp_ms,
        }
    }
}

/// 输入设备类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PointerType {
    #[default]
    Pen,
    Touch,
    Mouse,
}

/// 一笔
///
/// 由画布持有，交给识别流程时只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: String,
    pub points: Vec<StrokePoint>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    pub start_timestamp_ms: i64,
    #[serde(default)]
    pub pointer_type: PointerType,
}

fn default_color() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> f64 {
    2.0
}

impl Stroke {
    pub fn new(id: impl Into<String>, points: Vec<StrokePoint>) -> Self {
        let start_timestamp_ms = points.first().map(|p| p.timestamp_ms).unwrap_or_default();
        Self {
            id: id.into(),
            points,
            color: default_color(),
            stroke_width: default_stroke_width(),
            start_timestamp_ms,
            pointer_type: PointerType::Pen,
        }
    }

    pub fn with_pointer_type(mut self, pointer_type: PointerType) -> Self {
        self.pointer_type = pointer_type;
        self
    }

    /// 至少两个点才能参与识别
    pub fn is_valid_for_recognition(&self) -> bool {
        self.points.len() >= 2
    }
}
