// 该文件是 Yushi （鱼识） 项目的一部分。
// src/region.rs - 检测框与区域规整
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

use serde::Serialize;
use thiserror::Error;

/// 检测器给出的原始检测框，像素坐标，可能越界或退化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl BoundingBox {
  pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self { x1, y1, x2, y2 }
  }
}

impl From<[i32; 4]> for BoundingBox {
  fn from([x1, y1, x2, y2]: [i32; 4]) -> Self {
    Self { x1, y1, x2, y2 }
  }
}

/// 经过填充与裁剪后的区域，保证位于图像内且面积为正
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "[u32; 4]")]
pub struct Region {
  x1: u32,
  y1: u32,
  x2: u32,
  y2: u32,
}

impl Region {
  pub fn x1(&self) -> u32 {
    self.x1
  }

  pub fn y1(&self) -> u32 {
    self.y1
  }

  pub fn x2(&self) -> u32 {
    self.x2
  }

  pub fn y2(&self) -> u32 {
    self.y2
  }

  pub fn width(&self) -> u32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> u32 {
    self.y2 - self.y1
  }

  pub fn contains(&self, other: &Region) -> bool {
    self.x1 <= other.x1 && self.y1 <= other.y1 && self.x2 >= other.x2 && self.y2 >= other.y2
  }
}

impl From<Region> for [u32; 4] {
  fn from(region: Region) -> Self {
    [region.x1, region.y1, region.x2, region.y2]
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
  #[error("Empty region ({x1}, {y1}, {x2}, {y2}) after padding")]
  EmptyRegion { x1: i64, y1: i64, x2: i64, y2: i64 },
}

/// 区域规整器：按填充量扩展检测框并裁剪到图像范围内
#[derive(Debug, Clone, Copy)]
pub struct RegionNormalizer {
  width: u32,
  height: u32,
  padding: u32,
}

impl RegionNormalizer {
  pub fn new(width: u32, height: u32, padding: u32) -> Self {
    Self {
      width,
      height,
      padding,
    }
  }

  pub fn normalize(&self, bbox: &BoundingBox) -> Result<Region, RegionError> {
    // i64 下计算，任意 i32 坐标加 u32 填充都不会溢出
    let padding = i64::from(self.padding);
    let x1 = (i64::from(bbox.x1) - padding).max(0);
    let y1 = (i64::from(bbox.y1) - padding).max(0);
    let x2 = (i64::from(bbox.x2) + padding).min(i64::from(self.width));
    let y2 = (i64::from(bbox.y2) + padding).min(i64::from(self.height));

    if x2 <= x1 || y2 <= y1 {
      return Err(RegionError::EmptyRegion { x1, y1, x2, y2 });
    }

    // 此时 0 <= x1 < x2 <= width，转换不会截断
    Ok(Region {
      x1: x1 as u32,
      y1: y1 as u32,
      x2: x2 as u32,
      y2: y2 as u32,
    })
  }
}
