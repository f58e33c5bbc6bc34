// 该文件是 Yushi （鱼识） 项目的一部分。
// src/error.rs - 流水线错误定义
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

use std::path::PathBuf;

use thiserror::Error;

use crate::labels::LabelError;

/// 推理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Detector,
  Classifier,
}

impl std::fmt::Display for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Stage::Detector => write!(f, "detector"),
      Stage::Classifier => write!(f, "classifier"),
    }
  }
}

/// 单次调用中的致命错误，会在边界处转换为 `{success: false, error}`
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("Model not found at {}", .0.display())]
  ModelNotFound(PathBuf),
  #[error("Failed to load {stage} model from {}: {reason}", .path.display())]
  ModelLoad {
    stage: Stage,
    path: PathBuf,
    reason: String,
  },
  #[error("Could not read image {}: {source}", .path.display())]
  ImageReadFailure {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("Could not write image {}: {reason}", .path.display())]
  ImageWriteFailure { path: PathBuf, reason: String },
  #[error("{stage} inference failed: {source}")]
  InferenceFailure {
    stage: Stage,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
  },
  #[error(transparent)]
  LabelFile(#[from] LabelError),
  #[error("Internal error: {0}")]
  Internal(String),
}

impl PipelineError {
  pub fn inference<E>(stage: Stage, err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    PipelineError::InferenceFailure {
      stage,
      source: Box::new(err),
    }
  }
}
