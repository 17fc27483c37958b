// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/input.rs - 图像输入
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, SUPPORTED_EXTENSIONS};

/// 未提供输入时使用的示例图片
pub const DEFAULT_SAMPLE_URL: &str = "image:assets/download.jpg";

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

fn check_scheme(url: &Url) -> Result<(), InputError> {
  if url.scheme() == ImageFileInput::SCHEME {
    Ok(())
  } else {
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

/// 选择输入：有用户图片时读取用户图片，否则读取默认示例
pub fn open_input(upload: Option<&Url>, sample: &Url) -> Result<ImageFileInput, InputError> {
  match upload {
    Some(url) => {
      check_scheme(url)?;
      info!("读取上传图片: {}", url);
      Ok(ImageFileInput::from_url(url)?)
    }
    None => {
      check_scheme(sample)?;
      info!("未提供图片，使用示例图片: {}", sample);
      Ok(ImageFileInput::sample_from_url(sample)?)
    }
  }
}
