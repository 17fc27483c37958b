// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/output/record.rs - 检测结果记录
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

use serde_json::json;
use tracing::debug;

use crate::model::{DetectResult, WithLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
  Text,
  Json,
}

impl RecordFormat {
  pub fn from_query(value: &str) -> Option<Self> {
    match value {
      "txt" | "text" => Some(RecordFormat::Text),
      "json" => Some(RecordFormat::Json),
      _ => None,
    }
  }

  fn extension(&self) -> &'static str {
    match self {
      RecordFormat::Text => "txt",
      RecordFormat::Json => "json",
    }
  }
}

// 与文本记录一样保留四位小数，避免 f32 转 f64 后出现 0.8999999761581421
fn rounded(value: f32) -> f64 {
  (f64::from(value) * 1e4).round() / 1e4
}

/// 将检测结果写到图像旁边的文件中
pub struct Record {
  pub format: RecordFormat,
}

impl Record {
  pub fn render<T: WithLabel>(&self, result: &DetectResult<T>) -> String {
    match self.format {
      RecordFormat::Text => result
        .iter()
        .map(|item| {
          format!(
            "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
            item.kind.to_label_str(),
            item.score,
            item.bbox[0],
            item.bbox[1],
            item.bbox[2],
            item.bbox[3]
          )
        })
        .collect::<Vec<_>>()
        .join("\n"),
      RecordFormat::Json => {
        let detections = result
          .iter()
          .map(|item| {
            json!({
              "name": item.kind.to_label_str(),
              "confidence": rounded(item.score),
              "xmin": rounded(item.bbox[0]),
              "ymin": rounded(item.bbox[1]),
              "xmax": rounded(item.bbox[2]),
              "ymax": rounded(item.bbox[3]),
            })
          })
          .collect::<Vec<_>>();
        json!({ "detections": detections }).to_string()
      }
    }
  }

  /// 写入与图像同名、扩展名不同的记录文件
  pub fn record<T: WithLabel>(
    &self,
    result: &DetectResult<T>,
    image_path: &Path,
  ) -> Result<PathBuf, std::io::Error> {
    let path = image_path.with_extension(self.format.extension());
    std::fs::write(&path, self.render(result))?;
    debug!("写入检测记录: {}", path.display());
    Ok(path)
  }
}
