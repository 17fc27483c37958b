// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/model/table.rs - 检测表
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

/// 检测表中的一行，列与 YOLOv5 的 `xyxy` 表一致
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRow {
  pub xmin: f32,
  pub ymin: f32,
  pub xmax: f32,
  pub ymax: f32,
  pub confidence: f32,
  pub class: u32,
  pub name: String,
}

impl DetectionRow {
  pub fn bbox(&self) -> [f32; 4] {
    [self.xmin, self.ymin, self.xmax, self.ymax]
  }
}

/// 检测器的原始输出，每个目标一行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionTable {
  rows: Vec<DetectionRow>,
}

impl DetectionTable {
  pub fn rows(&self) -> &[DetectionRow] {
    &self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn push(&mut self, row: DetectionRow) {
    self.rows.push(row);
  }
}

impl From<Vec<DetectionRow>> for DetectionTable {
  fn from(rows: Vec<DetectionRow>) -> Self {
    Self { rows }
  }
}
