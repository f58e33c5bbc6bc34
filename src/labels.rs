// 该文件是 Yushi （鱼识） 项目的一部分。
// src/labels.rs - 标签词表
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

use std::{path::Path, str::FromStr, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("Could not read label file {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("Empty label at line {0}")]
  EmptyLabel(usize),
  #[error("Label file contains no labels")]
  NoLabels,
}

/// 有序、不可变的类别词表，下标即分类器输出的类别编号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
  labels: Arc<[String]>,
}

impl LabelVocabulary {
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let vocabulary: Self = content.parse()?;
    debug!("标签数量: {}", vocabulary.len());
    Ok(vocabulary)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }

  /// 越界时退化为下标的字符串形式，不会失败
  pub fn resolve(&self, index: usize) -> String {
    self
      .get(index)
      .map(str::to_owned)
      .unwrap_or_else(|| index.to_string())
  }
}

impl FromStr for LabelVocabulary {
  type Err = LabelError;

  /// 每行一个标签；只允许文件末尾出现空行
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut lines: Vec<&str> = s.lines().map(|line| line.trim()).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
      lines.pop();
    }

    if lines.is_empty() {
      return Err(LabelError::NoLabels);
    }

    if let Some(pos) = lines.iter().position(|line| line.is_empty()) {
      return Err(LabelError::EmptyLabel(pos + 1));
    }

    Ok(lines.into_iter().map(str::to_owned).collect())
  }
}

impl FromIterator<String> for LabelVocabulary {
  fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().collect(),
    }
  }
}

impl<'a> FromIterator<&'a str> for LabelVocabulary {
  fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
    iter.into_iter().map(str::to_owned).collect()
  }
}
