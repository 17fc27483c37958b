// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/bin/mask_detect.rs - 口罩检测程序
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use kouzhao::{
  FromUrl,
  input::{DEFAULT_SAMPLE_URL, open_input},
  model::{LabelPolicy, MaskLabel, Yolov5Builder},
  output::{OutputWrapper, draw::Draw},
  task::{OneShotTask, Task},
};

/// 口罩检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型，例如 yolov5:models/best.onnx?conf=0.25&iou=0.45
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 用户上传的图片，例如 image:photos/team.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Option<Url>,
  /// 未提供图片时使用的示例图片
  #[arg(long, value_name = "SAMPLE", default_value = DEFAULT_SAMPLE_URL)]
  pub sample: Url,
  /// 输出，image:<路径> 或 compare:<路径>，可加 ?record=txt|json
  #[arg(long, value_name = "OUTPUT", default_value = "compare:output/annotated.png")]
  pub output: Url,
  /// 标签字体（TrueType），默认使用内置字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 未知标签按 Mask 处理而不是报错
  #[arg(long)]
  pub lenient_labels: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输出路径: {}", args.output);

  // 模型加载失败时直接退出
  let model = Yolov5Builder::from_url(&args.model)?.build()?;
  let input = open_input(args.input.as_ref(), &args.sample)?;

  let mut output = OutputWrapper::from_url(&args.output)?;
  if let Some(font) = &args.font {
    output = output.with_draw(Draw::with_font_file(font)?);
  }

  let policy = if args.lenient_labels {
    LabelPolicy::Lenient
  } else {
    LabelPolicy::Strict
  };

  let outcome = OneShotTask::<MaskLabel>::default()
    .with_label_policy(policy)
    .run_task(input, &model, &output)?;

  println!("{}", outcome);
  info!("结果已保存: {}", output.path().display());

  Ok(())
}
