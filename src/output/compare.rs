// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/output/compare.rs - 原图与标注图并排输出
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

use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::draw_text_mut;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{DetectResult, WithLabel},
  output::{
    Render,
    draw::{Draw, DrawDetectionOnImage, DrawError},
    output_path, record::Record, record_from_url, save_image,
  },
};

const COMPARE_GAP: u32 = 16;
const CAPTION_HEIGHT: u32 = 28;
const CAPTION_PADDING: i32 = 6;
const BACKGROUND_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const CAPTION_COLOR: Rgb<u8> = Rgb([96, 96, 96]);

pub const ANNOTATED_CAPTION: &str = "With bounding boxes";

#[derive(Error, Debug)]
pub enum CompareOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("输出参数错误: {0}")]
  InvalidUrl(String),
}

/// 左边原图、右边标注图，各自下方带标题
pub struct CompareOutput {
  path: PathBuf,
  draw: Draw,
  record: Option<Record>,
}

impl FromUrlWithScheme for CompareOutput {
  const SCHEME: &'static str = "compare";
}

impl FromUrl for CompareOutput {
  type Error = CompareOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(CompareOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(CompareOutput {
      path: output_path(uri).map_err(CompareOutputError::InvalidUrl)?,
      draw: Draw::new()?,
      record: record_from_url(uri).map_err(CompareOutputError::InvalidUrl)?,
    })
  }
}

impl CompareOutput {
  pub fn new(path: impl Into<PathBuf>, draw: Draw) -> Self {
    Self {
      path: path.into(),
      draw,
      record: None,
    }
  }

  pub fn with_record(mut self, record: Option<Record>) -> Self {
    self.record = record;
    self
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn draw_caption(&self, canvas: &mut RgbImage, x: u32, y: u32, caption: &str) {
    draw_text_mut(
      canvas,
      CAPTION_COLOR,
      x as i32,
      y as i32 + CAPTION_PADDING,
      self.draw.scale(),
      self.draw.font(),
      caption,
    );
  }

  /// 拼接两张图像
  pub fn compose(
    &self,
    original: &RgbImage,
    annotated: &RgbImage,
    left_caption: &str,
    right_caption: &str,
  ) -> RgbImage {
    let (w1, h1) = original.dimensions();
    let (w2, h2) = annotated.dimensions();
    let height = h1.max(h2);

    let mut canvas = RgbImage::from_pixel(
      w1 + COMPARE_GAP + w2,
      height + CAPTION_HEIGHT,
      BACKGROUND_COLOR,
    );
    imageops::replace(&mut canvas, original, 0, 0);
    imageops::replace(&mut canvas, annotated, (w1 + COMPARE_GAP) as i64, 0);

    self.draw_caption(&mut canvas, 0, height, left_caption);
    self.draw_caption(&mut canvas, w1 + COMPARE_GAP, height, right_caption);

    canvas
  }
}

impl<T: WithLabel> Render<Frame, DetectResult<T>> for CompareOutput {
  type Error = CompareOutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    let annotated = self.draw.annotate(&frame.image, result);
    let canvas = self.compose(
      &frame.image,
      &annotated,
      frame.origin.caption(),
      ANNOTATED_CAPTION,
    );
    save_image(&self.path, &canvas)?;
    info!("保存对比图像到文件: {}", self.path.display());

    if let Some(record) = &self.record {
      record.record(result, &self.path)?;
    }

    Ok(())
  }
}
