// 该文件是 Yushi （鱼识） 项目的一部分。
// src/args.rs - 模型与日志参数配置
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

use clap::Args;

use crate::{
  model::{DEFAULT_MODELS_DIR, ModelOptions, ModelPaths},
  output::Annotator,
};

/// 两个入口共用的模型参数
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
  /// 模型目录，包含 yolov8sfish.onnx、fishclass.onnx 与 labels.txt
  #[arg(long, default_value = DEFAULT_MODELS_DIR, value_name = "DIR")]
  pub models_dir: PathBuf,

  /// 检测模型文件路径（覆盖模型目录中的默认文件）
  #[arg(long, value_name = "FILE")]
  pub detector: Option<PathBuf>,

  /// 分类模型文件路径（覆盖模型目录中的默认文件）
  #[arg(long, value_name = "FILE")]
  pub classifier: Option<PathBuf>,

  /// 标签文件路径，每行一个类别
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 标注文字使用的 TrueType 字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 检测置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.7", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 每个模型的推理线程数
  #[arg(long, default_value = "4", value_name = "COUNT")]
  pub threads: usize,

  /// 日志详细程度（-v, -vv）
  #[arg(short, action = clap::ArgAction::Count)]
  pub verbose: u8,
}

impl ModelArgs {
  pub fn paths(&self) -> ModelPaths {
    let defaults = ModelPaths::in_dir(&self.models_dir);
    ModelPaths {
      detector: self.detector.clone().unwrap_or(defaults.detector),
      classifier: self.classifier.clone().unwrap_or(defaults.classifier),
      labels: self.labels.clone().unwrap_or(defaults.labels),
    }
  }

  pub fn options(&self) -> ModelOptions {
    ModelOptions {
      confidence_threshold: self.confidence,
      nms_threshold: self.nms_threshold,
      intra_threads: self.threads,
    }
  }

  pub fn annotator(&self) -> Annotator {
    Annotator::with_font_search(self.font.as_deref())
  }
}
