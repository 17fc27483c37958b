// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, ImageOrigin},
  url_file_path,
};

/// 允许的图像文件扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Invalid path: {0}")]
  InvalidPath(String),
  #[error("Unsupported image format: {}", .0.display())]
  UnsupportedFormat(PathBuf),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

pub struct ImageFileInput {
  frame: Option<Frame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = url_file_path(url).map_err(|e| ImageFileInputError::InvalidPath(e.to_string()))?;
    Self::open(&path, ImageOrigin::Uploaded(path.clone()))
  }
}

fn is_supported(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
    })
    .unwrap_or(false)
}

impl ImageFileInput {
  /// 打开并解码图片，`origin` 记录图片来源
  pub fn open(path: &Path, origin: ImageOrigin) -> Result<Self, ImageFileInputError> {
    if !is_supported(path) {
      return Err(ImageFileInputError::UnsupportedFormat(path.to_path_buf()));
    }

    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8();
    debug!(
      "读取图片 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(ImageFileInput {
      frame: Some(Frame::new(image, origin)),
    })
  }

  /// 作为默认示例图片打开
  pub fn sample_from_url(url: &Url) -> Result<Self, ImageFileInputError> {
    let mut input = Self::from_url(url)?;
    if let Some(frame) = input.frame.as_mut() {
      frame.origin = ImageOrigin::Sample(frame.origin.path().to_path_buf());
    }
    Ok(input)
  }

  pub fn origin(&self) -> Option<&ImageOrigin> {
    self.frame.as_ref().map(|frame| &frame.origin)
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}
