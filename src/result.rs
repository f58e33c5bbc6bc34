// 该文件是 Yushi （鱼识） 项目的一部分。
// src/result.rs - 检测结果与输出约定
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

use std::path::Path;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{classify::Classified, region::Region};

/// 一个已定位并分类的目标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub bbox: Region,
  pub label: String,
  pub confidence: f32,
}

/// 单次调用的对外结果
///
/// 成功时序列化为 `{success, output_image, fish_count, detections}`，
/// 失败时序列化为 `{success, error}`。
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
  error: Option<String>,
  output_image: Option<String>,
  detections: Vec<Detection>,
}

impl PipelineResult {
  pub fn failure<E: std::fmt::Display>(error: E) -> Self {
    Self {
      error: Some(error.to_string()),
      output_image: None,
      detections: Vec::new(),
    }
  }

  pub fn success(&self) -> bool {
    self.error.is_none()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn output_image(&self) -> Option<&str> {
    self.output_image.as_deref()
  }

  /// 始终等于检测数量
  pub fn fish_count(&self) -> usize {
    self.detections.len()
  }

  pub fn detections(&self) -> &[Detection] {
    &self.detections
  }

  pub fn to_json(&self) -> String {
    // 字段均为可序列化的基本类型，失败时退化为最小的失败信封
    serde_json::to_string(self).unwrap_or_else(|e| {
      serde_json::json!({ "success": false, "error": e.to_string() }).to_string()
    })
  }
}

impl Serialize for PipelineResult {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match &self.error {
      Some(error) => {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("success", &false)?;
        map.serialize_entry("error", error)?;
        map.end()
      }
      None => {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("success", &true)?;
        map.serialize_entry("output_image", &self.output_image)?;
        map.serialize_entry("fish_count", &self.fish_count())?;
        map.serialize_entry("detections", &self.detections)?;
        map.end()
      }
    }
  }
}

/// 结果汇总器：按流式顺序收集检测结果
#[derive(Debug, Default)]
pub struct ResultAggregator {
  detections: Vec<Detection>,
}

impl ResultAggregator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, bbox: Region, classified: Classified) -> &Detection {
    self.detections.push(Detection {
      bbox,
      label: classified.label,
      confidence: classified.confidence,
    });
    &self.detections[self.detections.len() - 1]
  }

  pub fn detections(&self) -> &[Detection] {
    &self.detections
  }

  pub fn len(&self) -> usize {
    self.detections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  pub fn finish(self, output_image: &Path) -> PipelineResult {
    PipelineResult {
      error: None,
      output_image: Some(output_image.display().to_string()),
      detections: self.detections,
    }
  }
}
