// 该文件是 Yushi （鱼识） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{region::Region, result::Detection};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_MARGIN: i32 = 4;
const BOX_THICKNESS: u32 = 2;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const TEXT_COLOR: [u8; 3] = [0, 0, 0];

/// 常见的系统字体位置，按顺序查找
const SYSTEM_FONTS: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "/Library/Fonts/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum FontError {
  #[error("无法读取字体文件 {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("字体文件无效: {0}")]
  Invalid(String),
}

pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec, FontError> {
  let path = path.as_ref();
  let data = std::fs::read(path).map_err(|source| FontError::Io {
    path: path.display().to_string(),
    source,
  })?;
  FontVec::try_from_vec(data).map_err(|_| FontError::Invalid(path.display().to_string()))
}

fn find_system_font() -> Option<PathBuf> {
  SYSTEM_FONTS
    .iter()
    .map(PathBuf::from)
    .find(|path| path.is_file())
}

/// 标注器：在图像副本上绘制检测框与 `"{label} ({confidence:.2})"` 文本
pub struct Annotator {
  font: Option<FontVec>,
  font_size: f32,
  box_color: Rgb<u8>,
  text_color: Rgb<u8>,
}

impl Default for Annotator {
  fn default() -> Self {
    Self::new(None)
  }
}

impl Annotator {
  pub fn new(font: Option<FontVec>) -> Self {
    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      box_color: Rgb(BOX_COLOR),
      text_color: Rgb(TEXT_COLOR),
    }
  }

  /// 指定字体优先，其次查找系统字体；都没有时只画框
  pub fn with_font_search(font: Option<&Path>) -> Self {
    let path = font.map(Path::to_path_buf).or_else(find_system_font);
    let font = match path {
      Some(path) => match load_font(&path) {
        Ok(font) => {
          debug!("使用字体: {}", path.display());
          Some(font)
        }
        Err(e) => {
          warn!("字体加载失败，仅绘制检测框: {}", e);
          None
        }
      },
      None => {
        warn!("未找到可用字体，仅绘制检测框");
        None
      }
    };
    Self::new(font)
  }

  pub fn label_text(label: &str, confidence: f32) -> String {
    format!("{} ({:.2})", label, confidence)
  }

  /// 按检测顺序绘制，后绘制的覆盖先绘制的
  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      self.draw_bbox_with_label(
        image,
        &detection.bbox,
        &Self::label_text(&detection.label, detection.confidence),
      );
    }
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, region: &Region, label: &str) {
    let (x, y) = (region.x1() as i32, region.y1() as i32);
    let (width, height) = (region.width(), region.height());

    for t in 0..BOX_THICKNESS {
      if width <= 2 * t || height <= 2 * t {
        break;
      }
      let rect = Rect::at(x + t as i32, y + t as i32).of_size(width - 2 * t, height - 2 * t);
      draw_hollow_rect_mut(image, rect, self.box_color);
    }

    let Some(font) = self.font.as_ref() else {
      return;
    };

    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, label);
    let label_height = text_height as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;

    // 标签放在框的上方，空间不够时贴着图像上边缘
    let label_x = x;
    let label_y = (y - label_height - LABEL_MARGIN).max(0);

    let max_width = (image.width() as i32 - label_x).max(0) as u32;
    let label_width = (text_width + 2 * LABEL_TEXT_VERTICAL_PADDING as u32).min(max_width);

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, label_height as u32);
      draw_filled_rect_mut(image, rect, self.box_color);
      draw_text_mut(
        image,
        self.text_color,
        label_x + LABEL_TEXT_VERTICAL_PADDING,
        label_y + LABEL_TEXT_VERTICAL_PADDING,
        scale,
        font,
        label,
      );
    }
  }
}
