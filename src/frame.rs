// 该文件是 Yushi （鱼识） 项目的一部分。
// src/frame.rs - NCHW/NHWC 浮点帧定义
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

use image::{RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;

/// 像素值缩放到 [0, 1]
fn scale(value: u8) -> f32 {
  f32::from(value) / 255.0
}

fn resize_exact<const W: u32, const H: u32>(image: &RgbImage) -> RgbImage {
  if image.dimensions() == (W, H) {
    image.clone()
  } else {
    image::imageops::resize(image, W, H, FilterType::Triangle)
  }
}

pub trait TensorLayout {
  /// 带批次维度的张量形状
  fn shape(&self) -> [usize; 4];
  fn as_slice(&self) -> &[f32];
  fn into_vec(self) -> Vec<f32>;
}

/// 固定尺寸的 RGB NCHW 浮点帧，检测器输入
#[derive(Debug, Clone)]
pub struct RgbNchwFrame<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> RgbNchwFrame<W, H> {
  pub fn from_image(image: &RgbImage) -> Self {
    let resized = resize_exact::<W, H>(image);
    let plane = (W as usize) * (H as usize);
    let mut data = vec![0f32; RGB_CHANNELS * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = (y as usize) * (W as usize) + (x as usize);
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = scale(pixel[c]);
      }
    }

    Self {
      data: data.into_boxed_slice(),
    }
  }

}

impl<const W: u32, const H: u32> TensorLayout for RgbNchwFrame<W, H> {
  fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, H as usize, W as usize]
  }

  fn as_slice(&self) -> &[f32] {
    &self.data
  }

  fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }
}

/// 固定尺寸的 BGR NHWC 浮点帧，分类器输入
///
/// 分类模型以 OpenCV 读入的 BGR 图像训练，通道需反转
#[derive(Debug, Clone)]
pub struct BgrNhwcFrame<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> BgrNhwcFrame<W, H> {
  pub fn from_image(image: &RgbImage) -> Self {
    let data: Vec<f32> = resize_exact::<W, H>(image)
      .pixels()
      .flat_map(|pixel| {
        let [r, g, b] = pixel.0;
        [b, g, r]
      })
      .map(scale)
      .collect();

    Self {
      data: data.into_boxed_slice(),
    }
  }

}

impl<const W: u32, const H: u32> TensorLayout for BgrNhwcFrame<W, H> {
  fn shape(&self) -> [usize; 4] {
    [1, H as usize, W as usize, RGB_CHANNELS]
  }

  fn as_slice(&self) -> &[f32] {
    &self.data
  }

  fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }
}
