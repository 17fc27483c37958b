// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/model.rs - 模型与检测结果
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

mod table;
pub use self::table::{DetectionRow, DetectionTable};

#[cfg(feature = "model_yolov5")]
mod yolov5;
#[cfg(feature = "model_yolov5")]
pub use self::yolov5::{Yolov5, Yolov5Builder, Yolov5Config, Yolov5Error};

/// 检测器适配层：一张图像进，一张检测表出
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn from_label_str(label: &str) -> Option<Self>;

  /// 宽松模式下无法识别的标签回退到的类别
  fn fallback_label() -> Option<Self> {
    None
  }
}

/// 口罩检测的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskLabel {
  /// 佩戴口罩
  Mask,
  /// 未佩戴口罩
  NoMask,
}

impl MaskLabel {
  pub const MASK: &'static str = "Mask";
  pub const NO_MASK: &'static str = "NO-Mask";

  pub fn as_str(&self) -> &'static str {
    match self {
      MaskLabel::Mask => Self::MASK,
      MaskLabel::NoMask => Self::NO_MASK,
    }
  }
}

impl std::fmt::Display for MaskLabel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl WithLabel for MaskLabel {
  fn to_label_str(&self) -> String {
    self.as_str().to_string()
  }

  fn from_label_str(label: &str) -> Option<Self> {
    match label {
      Self::MASK => Some(MaskLabel::Mask),
      Self::NO_MASK => Some(MaskLabel::NoMask),
      _ => None,
    }
  }

  // 与最初的规则一致：不是 "NO-Mask" 的都当作佩戴口罩
  fn fallback_label() -> Option<Self> {
    Some(MaskLabel::Mask)
  }
}

#[derive(Debug, Clone)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

/// 标签解析策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelPolicy {
  /// 未知标签直接报错
  #[default]
  Strict,
  /// 未知标签使用 [`WithLabel::fallback_label`]
  Lenient,
}

#[derive(Error, Debug, PartialEq)]
pub enum ShapeError {
  #[error("第 {index} 个检测结果的标签无法识别: {label:?}")]
  UnknownLabel { index: usize, label: String },
}

impl<T> DetectResult<T> {
  pub fn empty() -> Self {
    Self {
      items: Box::new([]),
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem<T>> {
    self.items.iter()
  }
}

impl<T> From<Vec<DetectItem<T>>> for DetectResult<T> {
  fn from(items: Vec<DetectItem<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<T: WithLabel> DetectResult<T> {
  /// 把检测表整理成逐条的检测记录，顺序与检测表一致
  pub fn from_table(table: &DetectionTable, policy: LabelPolicy) -> Result<Self, ShapeError> {
    let items = table
      .rows()
      .iter()
      .enumerate()
      .map(|(index, row)| {
        let kind = match (T::from_label_str(&row.name), policy) {
          (Some(kind), _) => kind,
          (None, LabelPolicy::Lenient) => {
            T::fallback_label().ok_or_else(|| ShapeError::UnknownLabel {
              index,
              label: row.name.clone(),
            })?
          }
          (None, LabelPolicy::Strict) => {
            return Err(ShapeError::UnknownLabel {
              index,
              label: row.name.clone(),
            });
          }
        };
        Ok(DetectItem {
          kind,
          score: row.confidence,
          bbox: row.bbox(),
        })
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(items.into())
  }

  /// 各类别的数量，按首次出现的顺序
  pub fn label_counts(&self) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in self.items.iter() {
      let label = item.kind.to_label_str();
      match counts.iter_mut().find(|(l, _)| *l == label) {
        Some((_, n)) => *n += 1,
        None => counts.push((label, 1)),
      }
    }
    counts
  }
}
