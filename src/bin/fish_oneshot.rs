// 该文件是 Yushi （鱼识） 项目的一部分。
// src/bin/fish_oneshot.rs - 单张图像检测分类
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

use anyhow::Result;
use clap::{Parser, error::ErrorKind};
use tracing::info;

use yushi::{DEFAULT_PADDING, PipelineResult, Request, args::ModelArgs, run_once, utils};

/// 检测图像中的鱼并分类，输出标注图像与 JSON 结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 源图像路径
  #[arg(value_name = "IMAGE")]
  pub image: PathBuf,

  /// 标注图像输出路径
  #[arg(value_name = "OUTPUT")]
  pub output: PathBuf,

  /// 检测框四周的填充像素
  #[arg(value_name = "PADDING", default_value_t = DEFAULT_PADDING)]
  pub padding: u32,

  #[command(flatten)]
  pub model: ModelArgs,
}

fn emit(result: &PipelineResult) -> Result<ExitCode> {
  let mut stdout = std::io::stdout().lock();
  writeln!(stdout, "{}", result.to_json())?;
  stdout.flush()?;

  Ok(if result.success() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

fn main() -> Result<ExitCode> {
  let args = match Args::try_parse() {
    Ok(args) => args,
    Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
    Err(e) => {
      let message = format!(
        "Usage: fish-oneshot <IMAGE> <OUTPUT> [PADDING]: {}",
        e.kind()
      );
      return emit(&PipelineResult::failure(message));
    }
  };

  utils::init_tracing(args.model.verbose);

  info!("源图像: {}", args.image.display());
  info!("输出路径: {}", args.output.display());
  info!("填充像素: {}", args.padding);

  let request = Request::new(args.image, args.output).with_padding(args.padding);
  let result = run_once(
    &args.model.paths(),
    &args.model.options(),
    args.model.annotator(),
    &request,
  );

  emit(&result)
}
