// 该文件是 Yushi （鱼识） 项目的一部分。
// src/classify.rs - 区域分类
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

use image::RgbImage;
use thiserror::Error;
use tracing::trace;

use crate::{
  error::{PipelineError, Stage},
  labels::LabelVocabulary,
  model::{Classifier, ClassifierInput},
  region::Region,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
  #[error("分类输出为空")]
  EmptyDistribution,
  #[error("分类输出第 {index} 项无效: {value}")]
  InvalidProbability { index: usize, value: f32 },
}

/// 分类器给出的最大概率类别
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
  pub index: usize,
  pub confidence: f32,
}

impl Prediction {
  /// 取最大值下标，并列时取第一个
  pub fn from_distribution(distribution: &[f32]) -> Result<Self, PredictionError> {
    if let Some(index) = distribution.iter().position(|p| !p.is_finite()) {
      return Err(PredictionError::InvalidProbability {
        index,
        value: distribution[index],
      });
    }

    let (index, confidence) = distribution
      .iter()
      .copied()
      .enumerate()
      .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
        Some((_, best_p)) if best_p >= p => best,
        _ => Some((i, p)),
      })
      .ok_or(PredictionError::EmptyDistribution)?;

    if !(0.0..=1.0).contains(&confidence) {
      return Err(PredictionError::InvalidProbability {
        index,
        value: confidence,
      });
    }

    Ok(Self { index, confidence })
  }
}

/// 已分类的区域结果
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
  pub label: String,
  pub confidence: f32,
}

/// 区域分类器：裁剪、缩放、归一化后调用分类能力
pub struct RegionClassifier<C> {
  classifier: C,
  vocabulary: LabelVocabulary,
}

impl<C: Classifier> RegionClassifier<C> {
  pub fn new(classifier: C, vocabulary: LabelVocabulary) -> Self {
    Self {
      classifier,
      vocabulary,
    }
  }

  pub fn classify(&mut self, image: &RgbImage, region: &Region) -> Result<Classified, PipelineError> {
    let crop = image::imageops::crop_imm(
      image,
      region.x1(),
      region.y1(),
      region.width(),
      region.height(),
    )
    .to_image();
    let input = ClassifierInput::from_image(&crop);

    let distribution = self
      .classifier
      .infer(&input)
      .map_err(|e| PipelineError::inference(Stage::Classifier, e))?;
    let prediction = Prediction::from_distribution(&distribution)
      .map_err(|e| PipelineError::inference(Stage::Classifier, e))?;
    trace!("分类结果: {:?}", prediction);

    Ok(Classified {
      label: self.vocabulary.resolve(prediction.index),
      confidence: prediction.confidence,
    })
  }
}
