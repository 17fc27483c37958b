// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/summary.rs - 结果页面文本
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

use std::fmt;

use crate::frame::ImageOrigin;

pub const HEADER: &str = "Face Mask Detection using YOLOv5";
pub const LEGEND: &str = "Green boxes - With Face Mask | Red boxes - Without Face Mask";
pub const UPLOAD_STATUS: &str = "Image successfully detected!";
pub const SAMPLE_STATUS: &str = "You can upload an image consisting of people with or without face mask";
pub const TRAINING_LINK: &str =
  "https://colab.research.google.com/drive/1HzFrpWmx2o9AkPd9she6oArFm6cwN_ra?usp=sharing";

/// 一次检测的结果概要
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
  pub origin: ImageOrigin,
  pub detections: usize,
  pub label_counts: Vec<(String, usize)>,
}

impl Outcome {
  pub fn status(&self) -> &'static str {
    if self.origin.is_sample() {
      SAMPLE_STATUS
    } else {
      UPLOAD_STATUS
    }
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{}", HEADER)?;
    writeln!(f, "{}", "=".repeat(HEADER.len()))?;
    writeln!(f, "{}", LEGEND)?;
    writeln!(f)?;
    writeln!(f, "{}: {}", self.origin.caption(), self.origin.path().display())?;
    write!(f, "Detections: {}", self.detections)?;
    for (label, count) in &self.label_counts {
      write!(f, ", {} x{}", label, count)?;
    }
    writeln!(f)?;
    writeln!(f)?;
    writeln!(f, "{}", self.status())?;
    writeln!(f)?;
    write!(
      f,
      "The following link will redirect you to the Colab where the training of the model occurs: {}",
      TRAINING_LINK
    )
  }
}
