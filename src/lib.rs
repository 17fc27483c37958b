// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod summary;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 从 URL 中取出文件路径（已做百分号解码）
///
/// `image:assets/a.jpg` 得到相对路径 `assets/a.jpg`，
/// `image:///tmp/a%20b.jpg` 得到绝对路径 `/tmp/a b.jpg`。
pub fn url_file_path(url: &url::Url) -> Result<PathBuf, std::string::FromUtf8Error> {
  let decoded = urlencoding::decode(url.path())?;
  Ok(PathBuf::from(decoded.into_owned()))
}

/// 读取 URL 查询参数中的某个键
pub fn url_query(url: &url::Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn relative_path_is_kept_relative() {
    let url = Url::parse("image:assets/download.jpg").unwrap();
    assert_eq!(
      url_file_path(&url).unwrap(),
      PathBuf::from("assets/download.jpg")
    );
  }

  #[test]
  fn absolute_path_is_percent_decoded() {
    let url = Url::parse("image:///tmp/my%20photo.png").unwrap();
    assert_eq!(
      url_file_path(&url).unwrap(),
      PathBuf::from("/tmp/my photo.png")
    );
  }

  #[test]
  fn query_lookup() {
    let url = Url::parse("yolov5:models/best.onnx?conf=0.3&iou=0.5").unwrap();
    assert_eq!(url_query(&url, "conf").as_deref(), Some("0.3"));
    assert_eq!(url_query(&url, "iou").as_deref(), Some("0.5"));
    assert_eq!(url_query(&url, "size"), None);
  }
}
