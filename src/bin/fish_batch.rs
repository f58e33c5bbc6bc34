// 该文件是 Yushi （鱼识） 项目的一部分。
// src/bin/fish_batch.rs - 批量图像检测分类
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

use std::{io::Write, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, error::ErrorKind};
use tracing::{error, info};

use yushi::{
  DEFAULT_PADDING, Pipeline, PipelineResult,
  args::ModelArgs,
  task::{BatchTask, Task, batch_requests, collect_images},
  utils,
};

/// 一次加载模型，批量处理多张图像，每张图像输出一行 JSON
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 待处理的图像文件
  #[arg(value_name = "IMAGE")]
  pub images: Vec<PathBuf>,

  /// 待处理的图像目录（与图像文件合并）
  #[arg(long, value_name = "DIR")]
  pub input_dir: Option<PathBuf>,

  /// 标注图像输出目录
  #[arg(long, value_name = "DIR")]
  pub output_dir: PathBuf,

  /// 检测框四周的填充像素
  #[arg(long, default_value_t = DEFAULT_PADDING, value_name = "PIXELS")]
  pub padding: u32,

  #[command(flatten)]
  pub model: ModelArgs,
}

/// 启动阶段的失败同样以 JSON 失败信封输出
fn fail<E: std::fmt::Display>(error: E) -> Result<ExitCode> {
  error!("{}", error);
  let mut stdout = std::io::stdout().lock();
  writeln!(stdout, "{}", PipelineResult::failure(error).to_json())?;
  stdout.flush()?;
  Ok(ExitCode::FAILURE)
}

fn main() -> Result<ExitCode> {
  let args = match Args::try_parse() {
    Ok(args) => args,
    Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
    Err(e) => {
      return fail(format!(
        "Usage: fish-batch --output-dir <DIR> [--input-dir <DIR>] [IMAGE]...: {}",
        e.kind()
      ));
    }
  };
  utils::init_tracing(args.model.verbose);

  let Args {
    mut images,
    input_dir,
    output_dir,
    padding,
    model,
  } = args;

  if let Some(dir) = &input_dir {
    match collect_images(dir) {
      Ok(found) => images.extend(found),
      Err(e) => return fail(format!("无法读取图像目录 {}: {}", dir.display(), e)),
    }
  }
  if images.is_empty() {
    return fail("没有待处理的图像");
  }

  info!("正在加载模型...");
  let mut pipeline = match Pipeline::load(&model.paths(), &model.options(), model.annotator()) {
    Ok(pipeline) => pipeline,
    Err(e) => return fail(e),
  };
  info!("模型加载完成");

  let requests = batch_requests(&images, &output_dir, padding);
  let summary = BatchTask::new(requests, std::io::stdout().lock())
    .with_ctrlc()
    .context("无法设置 Ctrl-C 处理")?
    .run_task(&mut pipeline)?;

  Ok(if summary.all_succeeded() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}
