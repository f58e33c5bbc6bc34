// 该文件是 Yushi （鱼识） 项目的一部分。
// src/pipeline.rs - 检测、裁剪、分类流水线
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

use std::{
  panic::{AssertUnwindSafe, catch_unwind},
  path::PathBuf,
};

use image::RgbImage;
use tracing::{debug, error, info};

use crate::{
  classify::RegionClassifier,
  error::{PipelineError, Stage},
  labels::LabelVocabulary,
  model::{
    Classifier, Detector, LoadedModels, ModelOptions, ModelPaths, OnnxClassifier, YoloDetector,
  },
  output::{Annotator, read_image, save_image},
  region::{RegionError, RegionNormalizer},
  result::{Detection, PipelineResult, ResultAggregator},
};

pub const DEFAULT_PADDING: u32 = 20;

/// 单张图像的处理请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub image: PathBuf,
  pub output: PathBuf,
  pub padding: u32,
}

impl Request {
  pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(image: I, output: O) -> Self {
    Self {
      image: image.into(),
      output: output.into(),
      padding: DEFAULT_PADDING,
    }
  }

  pub fn with_padding(mut self, padding: u32) -> Self {
    self.padding = padding;
    self
  }
}

/// 持有已加载模型的流水线，可在多张图像之间复用
pub struct Pipeline<D, C> {
  detector: D,
  classifier: RegionClassifier<C>,
  annotator: Annotator,
}

impl Pipeline<YoloDetector, OnnxClassifier> {
  /// 加载两个模型与标签词表，任一模型缺失即失败
  pub fn load(
    paths: &ModelPaths,
    options: &ModelOptions,
    annotator: Annotator,
  ) -> Result<Self, PipelineError> {
    let LoadedModels {
      detector,
      classifier,
      vocabulary,
    } = LoadedModels::load(paths, options)?;
    Ok(Self::new(detector, classifier, vocabulary, annotator))
  }
}

impl<D: Detector, C: Classifier> Pipeline<D, C> {
  pub fn new(detector: D, classifier: C, vocabulary: LabelVocabulary, annotator: Annotator) -> Self {
    Self {
      detector,
      classifier: RegionClassifier::new(classifier, vocabulary),
      annotator,
    }
  }

  /// 检测 → 规整 → 分类，结果顺序与检测器给出的顺序一致
  pub fn detect(&mut self, image: &RgbImage, padding: u32) -> Result<ResultAggregator, PipelineError> {
    let boxes = self
      .detector
      .propose(image)
      .map_err(|e| PipelineError::inference(Stage::Detector, e))?;
    debug!("检测器给出 {} 个候选框", boxes.len());

    let normalizer = RegionNormalizer::new(image.width(), image.height(), padding);
    let mut aggregator = ResultAggregator::new();

    for bbox in &boxes {
      let region = match normalizer.normalize(bbox) {
        Ok(region) => region,
        Err(RegionError::EmptyRegion { .. }) => {
          debug!("跳过空区域: {:?}", bbox);
          continue;
        }
      };

      let classified = self.classifier.classify(image, &region)?;
      let detection = aggregator.push(region, classified);
      debug!(
        "区域 {:?} -> {} ({:.2})",
        detection.bbox, detection.label, detection.confidence
      );
    }

    Ok(aggregator)
  }

  /// 在源图像副本上绘制检测结果
  pub fn annotate(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut annotated = image.clone();
    self.annotator.draw_detections(&mut annotated, detections);
    annotated
  }

  /// 处理一张图像，错误向上传递
  pub fn process(&mut self, request: &Request) -> Result<PipelineResult, PipelineError> {
    info!("处理图像: {}", request.image.display());
    let image = read_image(&request.image)?;
    debug!("图像尺寸: {}x{}", image.width(), image.height());

    let aggregator = self.detect(&image, request.padding)?;
    let annotated = self.annotate(&image, aggregator.detections());
    save_image(&annotated, &request.output)?;
    info!("检测到 {} 条鱼", aggregator.len());

    Ok(aggregator.finish(&request.output))
  }

  /// 处理一张图像，所有错误与意外中断都转换为失败结果
  pub fn run(&mut self, request: &Request) -> PipelineResult {
    envelope(|| self.process(request))
  }
}

/// 一次性调用：加载模型后处理一张图像
pub fn run_once(
  paths: &ModelPaths,
  options: &ModelOptions,
  annotator: Annotator,
  request: &Request,
) -> PipelineResult {
  envelope(|| {
    let mut pipeline = Pipeline::load(paths, options, annotator)?;
    pipeline.process(request)
  })
}

fn envelope<F>(f: F) -> PipelineResult
where
  F: FnOnce() -> Result<PipelineResult, PipelineError>,
{
  let outcome = catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
    let message = payload
      .downcast_ref::<&str>()
      .map(|s| s.to_string())
      .or_else(|| payload.downcast_ref::<String>().cloned())
      .unwrap_or_else(|| "unknown panic".to_string());
    Err(PipelineError::Internal(message))
  });

  outcome.unwrap_or_else(|e| {
    error!("处理失败: {}", e);
    PipelineResult::failure(e)
  })
}
