// 该文件是 Yushi （鱼识） 项目的一部分。
// src/model/classifier.rs - 区域分类模型
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

use ort::{session::Session, value::Tensor};
use tracing::{debug, info, trace};

use super::{Classifier, ClassifierInput, ModelError, create_session, io_names};
use crate::frame::TensorLayout;

pub struct OnnxClassifierBuilder {
  model_path: PathBuf,
  intra_threads: usize,
}

impl OnnxClassifierBuilder {
  pub fn new<P: AsRef<Path>>(model_path: P) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      intra_threads: 4,
    }
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads;
    self
  }

  pub fn build(self) -> Result<OnnxClassifier, ModelError> {
    let session = create_session(&self.model_path, self.intra_threads)?;
    let (input_name, output_name) = io_names(&session)?;
    debug!("分类模型输入: {}, 输出: {}", input_name, output_name);
    info!("分类模型加载完成");

    Ok(OnnxClassifier {
      session,
      input_name,
      output_name,
    })
  }
}

/// 从 Keras 导出的 ONNX 分类器，输入 `[1, 224, 224, 3]`，输出 `[1, N]` 概率
pub struct OnnxClassifier {
  session: Session,
  input_name: String,
  output_name: String,
}

impl Classifier for OnnxClassifier {
  type Error = ModelError;

  fn infer(&mut self, input: &ClassifierInput) -> Result<Vec<f32>, Self::Error> {
    let tensor =
      Tensor::from_array((input.shape(), input.as_slice().to_vec())).map_err(ModelError::ort)?;

    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => tensor])
      .map_err(ModelError::ort)?;

    let output = outputs
      .get(self.output_name.as_str())
      .ok_or_else(|| ModelError::UnexpectedOutput(format!("缺少输出 {}", self.output_name)))?;
    let (shape, data) = output.try_extract_tensor::<f32>().map_err(ModelError::ort)?;
    trace!("分类输出形状: {:?}", shape);

    // 批次为 1，整段输出即为概率分布
    if data.is_empty() {
      return Err(ModelError::UnexpectedOutput("分类输出为空".to_string()));
    }

    Ok(data.to_vec())
  }
}
