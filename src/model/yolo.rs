// 该文件是 Yushi （鱼识） 项目的一部分。
// src/model/yolo.rs - YOLO 目标检测器
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use image::RgbImage;
use ort::{session::Session, value::Tensor};
use tracing::{debug, info};

use super::{Detector, ModelError, create_session, io_names};
use crate::{
  frame::{RgbNchwFrame, TensorLayout},
  region::BoundingBox,
};

const YOLO_INPUT_W: u32 = 640;
const YOLO_INPUT_H: u32 = 640;
const YOLO_BOX_VALUES: usize = 4;
const YOLO_MAX_DETECTIONS: usize = 300;

pub(super) const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub(super) const DEFAULT_NMS_THRESHOLD: f32 = 0.7;

/// 输入帧类型
pub type YoloInput = RgbNchwFrame<YOLO_INPUT_W, YOLO_INPUT_H>;

/// 解码后的候选框，坐标为原图像素
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub score: f32,
  pub class_id: usize,
}

impl Candidate {
  fn area(&self) -> f32 {
    (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
  }

  fn iou(&self, other: &Candidate) -> f32 {
    let x1 = self.x1.max(other.x1);
    let y1 = self.y1.max(other.y1);
    let x2 = self.x2.min(other.x2);
    let y2 = self.y2.min(other.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }

  /// 截断取整，与 numpy astype(int) 一致
  fn to_bbox(self) -> BoundingBox {
    BoundingBox::new(
      self.x1.trunc() as i32,
      self.y1.trunc() as i32,
      self.x2.trunc() as i32,
      self.y2.trunc() as i32,
    )
  }
}

pub struct YoloDetectorBuilder {
  model_path: PathBuf,
  confidence_threshold: f32,
  nms_threshold: f32,
  intra_threads: usize,
}

impl YoloDetectorBuilder {
  pub fn new<P: AsRef<Path>>(model_path: P) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      intra_threads: 4,
    }
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads;
    self
  }

  pub fn build(self) -> Result<YoloDetector, ModelError> {
    let session = create_session(&self.model_path, self.intra_threads)?;
    let (input_name, output_name) = io_names(&session)?;
    debug!("检测模型输入: {}, 输出: {}", input_name, output_name);
    info!("检测模型加载完成");

    Ok(YoloDetector {
      session,
      input_name,
      output_name,
      confidence_threshold: self.confidence_threshold,
      nms_threshold: self.nms_threshold,
    })
  }
}

/// 基于 ONNX Runtime 的 YOLOv8 检测器
pub struct YoloDetector {
  session: Session,
  input_name: String,
  output_name: String,
  confidence_threshold: f32,
  nms_threshold: f32,
}

impl Detector for YoloDetector {
  type Error = ModelError;

  fn propose(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, Self::Error> {
    let frame = YoloInput::from_image(image);
    let tensor = Tensor::from_array((frame.shape(), frame.into_vec())).map_err(ModelError::ort)?;

    debug!("执行检测模型推理");
    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => tensor])
      .map_err(ModelError::ort)?;

    let output = outputs
      .get(self.output_name.as_str())
      .ok_or_else(|| ModelError::UnexpectedOutput(format!("缺少输出 {}", self.output_name)))?;
    let (shape, data) = output.try_extract_tensor::<f32>().map_err(ModelError::ort)?;
    let shape: Vec<i64> = shape.iter().copied().collect();

    let scale = (
      image.width() as f32 / YOLO_INPUT_W as f32,
      image.height() as f32 / YOLO_INPUT_H as f32,
    );
    let candidates = decode(&shape, data, scale, self.confidence_threshold)?;
    debug!("阈值过滤后候选框数量: {}", candidates.len());

    let kept = nms(candidates, self.nms_threshold, YOLO_MAX_DETECTIONS);
    debug!("NMS 后检测框数量: {}", kept.len());

    Ok(kept.into_iter().map(Candidate::to_bbox).collect())
  }
}

/// 解码 `[1, 4 + C, P]` 输出：每列为 (cx, cy, w, h, 类别分数...)
pub(crate) fn decode(
  shape: &[i64],
  data: &[f32],
  (scale_x, scale_y): (f32, f32),
  confidence_threshold: f32,
) -> Result<Vec<Candidate>, ModelError> {
  let (rows, proposals) = match shape {
    [1, rows, proposals] if *rows > YOLO_BOX_VALUES as i64 && *proposals >= 0 => {
      (*rows as usize, *proposals as usize)
    }
    _ => {
      return Err(ModelError::UnexpectedOutput(format!(
        "检测输出形状 {:?} 不是 [1, 4 + C, P]",
        shape
      )));
    }
  };

  if data.len() != rows * proposals {
    return Err(ModelError::UnexpectedOutput(format!(
      "检测输出长度 {} 与形状 {:?} 不符",
      data.len(),
      shape
    )));
  }

  let num_classes = rows - YOLO_BOX_VALUES;
  let mut candidates = Vec::new();

  for i in 0..proposals {
    let mut score = f32::MIN;
    let mut class_id = 0usize;
    for c in 0..num_classes {
      let s = data[(YOLO_BOX_VALUES + c) * proposals + i];
      if s > score {
        score = s;
        class_id = c;
      }
    }

    if score.is_nan() || score < confidence_threshold {
      continue;
    }

    let cx = data[i];
    let cy = data[proposals + i];
    let w = data[2 * proposals + i];
    let h = data[3 * proposals + i];

    candidates.push(Candidate {
      x1: (cx - w / 2.0) * scale_x,
      y1: (cy - h / 2.0) * scale_y,
      x2: (cx + w / 2.0) * scale_x,
      y2: (cy + h / 2.0) * scale_y,
      score,
      class_id,
    });
  }

  Ok(candidates)
}

/// 按类别的非极大值抑制，结果按置信度降序
pub(crate) fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32, limit: usize) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    if kept.len() >= limit {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }

  kept
}
