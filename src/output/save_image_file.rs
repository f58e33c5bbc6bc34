// 该文件是 Yushi （鱼识） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use image::{ImageReader, RgbImage};
use tracing::info;

use crate::error::PipelineError;

/// 读取并解码源图像，格式按内容判断
pub fn read_image(path: &Path) -> Result<RgbImage, PipelineError> {
  let to_error = |source| PipelineError::ImageReadFailure {
    path: path.to_path_buf(),
    source,
  };

  let image = ImageReader::open(path)
    .map_err(|e| to_error(image::ImageError::IoError(e)))?
    .with_guessed_format()
    .map_err(|e| to_error(image::ImageError::IoError(e)))?
    .decode()
    .map_err(to_error)?
    .to_rgb8();

  Ok(image)
}

/// 保存图像，父目录不存在时自动创建
pub fn save_image(image: &RgbImage, path: &Path) -> Result<(), PipelineError> {
  let to_error = |reason: String| PipelineError::ImageWriteFailure {
    path: path.to_path_buf(),
    reason,
  };

  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(|e| to_error(e.to_string()))?;
  }

  image.save(path).map_err(|e| to_error(e.to_string()))?;
  info!("保存标注图像到文件: {}", path.display());

  Ok(())
}
