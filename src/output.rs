// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{DetectResult, WithLabel},
  url_file_path, url_query,
};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub mod draw;
pub mod record;

mod compare;
pub use self::compare::{ANNOTATED_CAPTION, CompareOutput, CompareOutputError};

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

use self::{
  draw::Draw,
  record::{Record, RecordFormat},
};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("对比图像输出错误: {0}")]
  CompareOutputError(#[from] CompareOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub(crate) fn output_path(url: &Url) -> Result<PathBuf, String> {
  let path = url_file_path(url).map_err(|e| e.to_string())?;
  if path.as_os_str().is_empty() {
    return Err("输出路径为空".to_string());
  }
  Ok(path)
}

pub(crate) fn record_from_url(url: &Url) -> Result<Option<Record>, String> {
  match url_query(url, "record") {
    Some(value) => RecordFormat::from_query(&value)
      .map(|format| Some(Record { format }))
      .ok_or_else(|| format!("未知的记录格式: {}", value)),
    None => Ok(None),
  }
}

pub(crate) fn save_image(path: &Path, image: &RgbImage) -> Result<(), image::ImageError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(image::ImageError::IoError)?;
  }
  image.save(path)
}

pub enum OutputWrapper {
  SaveImageFileOutput(SaveImageFileOutput),
  CompareOutput(CompareOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      CompareOutput::SCHEME => {
        let output = CompareOutput::from_url(url)?;
        Ok(OutputWrapper::CompareOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl OutputWrapper {
  /// 替换绘制工具（例如使用自定义字体）
  pub fn with_draw(self, draw: Draw) -> Self {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_draw(draw))
      }
      OutputWrapper::CompareOutput(output) => OutputWrapper::CompareOutput(output.with_draw(draw)),
    }
  }

  pub fn path(&self) -> &Path {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output.path(),
      OutputWrapper::CompareOutput(output) => output.path(),
    }
  }
}

impl<T: WithLabel> Render<Frame, DetectResult<T>> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::CompareOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}
