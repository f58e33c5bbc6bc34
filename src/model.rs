// 该文件是 Yushi （鱼识） 项目的一部分。
// src/model.rs - 模型能力定义与加载
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
use ort::session::{Session, builder::GraphOptimizationLevel};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  error::{PipelineError, Stage},
  frame::BgrNhwcFrame,
  labels::LabelVocabulary,
  region::BoundingBox,
};

/// 分类器输入边长，与训练好的分类模型约定，不可调整
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

pub type ClassifierInput = BgrNhwcFrame<CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE>;

/// 目标检测能力：给出候选区域，阈值与去重在能力内部完成
pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn propose(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, Self::Error>;
}

/// 分类能力：返回词表上的概率分布
pub trait Classifier {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&mut self, input: &ClassifierInput) -> Result<Vec<f32>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("ONNX Runtime 错误: {0}")]
  Ort(String),
  #[error("模型输出异常: {0}")]
  UnexpectedOutput(String),
}

impl ModelError {
  pub fn ort<E: std::fmt::Display>(err: E) -> Self {
    ModelError::Ort(err.to_string())
  }
}

pub(crate) fn create_session(path: &Path, intra_threads: usize) -> Result<Session, ModelError> {
  debug!("创建 ONNX Runtime 会话: {}", path.display());
  Session::builder()
    .map_err(ModelError::ort)?
    .with_optimization_level(GraphOptimizationLevel::Level3)
    .map_err(ModelError::ort)?
    .with_intra_threads(intra_threads)
    .map_err(ModelError::ort)?
    .commit_from_file(path)
    .map_err(ModelError::ort)
}

/// 只取第一个输入与第一个输出的名称
pub(crate) fn io_names(session: &Session) -> Result<(String, String), ModelError> {
  let input = session
    .inputs
    .first()
    .map(|input| input.name.to_string())
    .ok_or_else(|| ModelError::UnexpectedOutput("模型没有输入".to_string()))?;
  let output = session
    .outputs
    .first()
    .map(|output| output.name.to_string())
    .ok_or_else(|| ModelError::UnexpectedOutput("模型没有输出".to_string()))?;
  Ok((input, output))
}

mod classifier;
mod yolo;

pub use self::classifier::{OnnxClassifier, OnnxClassifierBuilder};
pub use self::yolo::{YoloDetector, YoloDetectorBuilder};

pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_DETECTOR_FILE: &str = "yolov8sfish.onnx";
pub const DEFAULT_CLASSIFIER_FILE: &str = "fishclass.onnx";
pub const DEFAULT_LABELS_FILE: &str = "labels.txt";

/// 模型产物路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
  pub detector: PathBuf,
  pub classifier: PathBuf,
  pub labels: PathBuf,
}

impl ModelPaths {
  /// 按固定目录布局解析
  pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
    let dir = dir.as_ref();
    Self {
      detector: dir.join(DEFAULT_DETECTOR_FILE),
      classifier: dir.join(DEFAULT_CLASSIFIER_FILE),
      labels: dir.join(DEFAULT_LABELS_FILE),
    }
  }

  /// 两个模型文件都必须存在，否则整个调用失败
  pub fn verify(&self) -> Result<(), PipelineError> {
    for path in [&self.detector, &self.classifier] {
      if !path.is_file() {
        return Err(PipelineError::ModelNotFound(path.clone()));
      }
    }
    Ok(())
  }
}

impl Default for ModelPaths {
  fn default() -> Self {
    Self::in_dir(DEFAULT_MODELS_DIR)
  }
}

/// 模型加载参数
#[derive(Debug, Clone)]
pub struct ModelOptions {
  pub confidence_threshold: f32,
  pub nms_threshold: f32,
  pub intra_threads: usize,
}

impl Default for ModelOptions {
  fn default() -> Self {
    Self {
      confidence_threshold: yolo::DEFAULT_CONFIDENCE_THRESHOLD,
      nms_threshold: yolo::DEFAULT_NMS_THRESHOLD,
      intra_threads: 4,
    }
  }
}

/// 已加载、可直接推理的模型集合
pub struct LoadedModels {
  pub detector: YoloDetector,
  pub classifier: OnnxClassifier,
  pub vocabulary: LabelVocabulary,
}

impl LoadedModels {
  pub fn load(paths: &ModelPaths, options: &ModelOptions) -> Result<Self, PipelineError> {
    paths.verify()?;

    info!("加载检测模型: {}", paths.detector.display());
    let detector = YoloDetectorBuilder::new(&paths.detector)
      .confidence_threshold(options.confidence_threshold)
      .nms_threshold(options.nms_threshold)
      .intra_threads(options.intra_threads)
      .build()
      .map_err(|e| PipelineError::ModelLoad {
        stage: Stage::Detector,
        path: paths.detector.clone(),
        reason: e.to_string(),
      })?;

    info!("加载分类模型: {}", paths.classifier.display());
    let classifier = OnnxClassifierBuilder::new(&paths.classifier)
      .intra_threads(options.intra_threads)
      .build()
      .map_err(|e| PipelineError::ModelLoad {
        stage: Stage::Classifier,
        path: paths.classifier.clone(),
        reason: e.to_string(),
      })?;

    let vocabulary = LabelVocabulary::from_file(&paths.labels)?;
    info!("模型加载完成，类别数量: {}", vocabulary.len());

    Ok(Self {
      detector,
      classifier,
      vocabulary,
    })
  }
}
