// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/frame.rs - 帧定义
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

/// 图像来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOrigin {
  /// 用户提供的图片
  Uploaded(PathBuf),
  /// 未提供图片时使用的默认示例
  Sample(PathBuf),
}

impl ImageOrigin {
  pub fn path(&self) -> &Path {
    match self {
      ImageOrigin::Uploaded(path) | ImageOrigin::Sample(path) => path,
    }
  }

  pub fn is_sample(&self) -> bool {
    matches!(self, ImageOrigin::Sample(_))
  }

  /// 原图的标题
  pub fn caption(&self) -> &'static str {
    match self {
      ImageOrigin::Uploaded(_) => "Uploaded image",
      ImageOrigin::Sample(_) => "Sample Image",
    }
  }
}

#[derive(Debug, Clone)]
pub struct Frame {
  pub image: RgbImage,
  pub origin: ImageOrigin,
}

impl Frame {
  pub fn new(image: RgbImage, origin: ImageOrigin) -> Self {
    Self { image, origin }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}
