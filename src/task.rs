// 该文件是 Yushi （鱼识） 项目的一部分。
// src/task.rs - 单张与批量任务
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

use std::{
  collections::HashSet,
  io::Write,
  path::{Path, PathBuf},
  sync::mpsc::{Receiver, channel},
  time::Instant,
};

use tracing::{debug, info, warn};

use crate::{
  model::{Classifier, Detector},
  pipeline::{Pipeline, Request},
  result::PipelineResult,
};

/// 批量模式识别的图像扩展名
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// 标注图像的文件名前缀
pub const ANNOTATED_PREFIX: &str = "annotated-";

pub trait Task<D, C>: Sized {
  type Output;
  fn run_task(self, pipeline: &mut Pipeline<D, C>) -> Self::Output;
}

pub struct OneShotTask {
  request: Request,
}

impl OneShotTask {
  pub fn new(request: Request) -> Self {
    Self { request }
  }
}

impl<D: Detector, C: Classifier> Task<D, C> for OneShotTask {
  type Output = PipelineResult;

  fn run_task(self, pipeline: &mut Pipeline<D, C>) -> Self::Output {
    let now = Instant::now();
    let result = pipeline.run(&self.request);
    info!("处理完成，耗时: {:.2?}", now.elapsed());
    result
  }
}

/// 批量任务的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
  pub processed: usize,
  pub failed: usize,
  pub interrupted: bool,
}

impl BatchSummary {
  pub fn all_succeeded(&self) -> bool {
    self.failed == 0 && !self.interrupted
  }
}

/// 复用同一组已加载模型处理多张图像，每张图像输出一行 JSON
pub struct BatchTask<W> {
  requests: Vec<Request>,
  sink: W,
  interrupt: Option<Receiver<()>>,
}

impl<W: Write> BatchTask<W> {
  pub fn new(requests: Vec<Request>, sink: W) -> Self {
    Self {
      requests,
      sink,
      interrupt: None,
    }
  }

  pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  /// 安装 Ctrl-C 处理，当前图像处理完后停止
  pub fn with_ctrlc(self) -> Result<Self, ctrlc::Error> {
    let (tx, rx) = channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，处理完当前图像后退出...");
      let _ = tx.send(());
    })?;
    Ok(self.with_interrupt(rx))
  }

  fn interrupted(&self) -> bool {
    self
      .interrupt
      .as_ref()
      .is_some_and(|rx| rx.try_recv().is_ok())
  }
}

impl<D: Detector, C: Classifier, W: Write> Task<D, C> for BatchTask<W> {
  type Output = std::io::Result<BatchSummary>;

  fn run_task(mut self, pipeline: &mut Pipeline<D, C>) -> Self::Output {
    info!("开始批量任务，共 {} 张图像", self.requests.len());
    let mut summary = BatchSummary::default();
    let requests = std::mem::take(&mut self.requests);

    for (index, request) in requests.iter().enumerate() {
      if self.interrupted() {
        warn!("中断信号接收，退出任务循环");
        summary.interrupted = true;
        break;
      }

      info!("({}/{}) {}", index + 1, requests.len(), request.image.display());
      let result = pipeline.run(request);
      if !result.success() {
        summary.failed += 1;
      }
      summary.processed += 1;

      writeln!(self.sink, "{}", result.to_json())?;
      self.sink.flush()?;
    }

    info!(
      "批量任务完成: 处理 {} 张，失败 {} 张",
      summary.processed, summary.failed
    );
    Ok(summary)
  }
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// 目录下的图像文件，按文件名排序
pub fn collect_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
  let mut images = Vec::new();
  for entry in std::fs::read_dir(dir)? {
    let path = entry?.path();
    if is_image_file(&path) {
      images.push(path);
    }
  }
  images.sort();
  Ok(images)
}

/// 为每张图像生成 `<output_dir>/annotated-<文件名>` 的请求
///
/// 文件名重复时追加序号 `annotated-<名称>-<n>.<扩展名>`，保证输出互不覆盖
pub fn batch_requests(images: &[PathBuf], output_dir: &Path, padding: u32) -> Vec<Request> {
  let mut used = HashSet::new();
  images
    .iter()
    .map(|image| {
      let name = unique_output_name(image, &mut used);
      Request::new(image.clone(), output_dir.join(name)).with_padding(padding)
    })
    .collect()
}

fn unique_output_name(image: &Path, used: &mut HashSet<String>) -> String {
  let stem = image
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_else(|| "image".to_string());
  let suffix = image
    .extension()
    .map(|ext| format!(".{}", ext.to_string_lossy()))
    .unwrap_or_else(|| ".png".to_string());

  let mut name = format!("{ANNOTATED_PREFIX}{stem}{suffix}");
  let mut n = 1;
  while !used.insert(name.clone()) {
    debug!("输出文件名重复: {}", name);
    name = format!("{ANNOTATED_PREFIX}{stem}-{n}{suffix}");
    n += 1;
  }
  name
}
