// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;

use crate::model::{DetectItem, DetectResult, MaskLabel, WithLabel};

// 绘制常量
const LABEL_FONT_SIZE: f32 = 16.0;
pub const BOX_STROKE_WIDTH: i32 = 5;
pub const LABEL_OFFSET_Y: f32 = 20.0;
const LABEL_CLIP_MARGIN: i64 = 1 << 16;

pub const NO_MASK_COLOR: Rgb<u8> = Rgb([255, 0, 0]); // 红色
pub const MASK_COLOR: Rgb<u8> = Rgb([0, 128, 0]); // 绿色

static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 标签颜色：只有 "NO-Mask" 是红色，其余都是绿色
pub fn label_color(label: &str) -> Rgb<u8> {
  if label == MaskLabel::NO_MASK {
    NO_MASK_COLOR
  } else {
    MASK_COLOR
  }
}

/// 标签文本，置信度保留两位小数
pub fn label_text(label: &str, score: f32) -> String {
  format!("{}: {:.2}", label, score)
}

pub struct Draw {
  font: FontArc,
  font_size: f32,
  stroke_width: i32,
  label_offset_y: f32,
}

impl Draw {
  /// 使用内嵌字体
  pub fn new() -> Result<Self, DrawError> {
    let font = FontArc::try_from_slice(EMBEDDED_FONT)?;
    Ok(Self::with_font(font))
  }

  /// 从 TrueType 字体文件加载
  pub fn with_font_file(path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    Ok(Self::with_font(font))
  }

  fn with_font(font: FontArc) -> Self {
    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      stroke_width: BOX_STROKE_WIDTH,
      label_offset_y: LABEL_OFFSET_Y,
    }
  }

  pub fn font(&self) -> &FontArc {
    &self.font
  }

  pub fn scale(&self) -> PxScale {
    PxScale::from(self.font_size)
  }

  // 边框向内加粗。浮点坐标先饱和到 i32，再用 i64 计算，
  // 并把矩形裁剪到画布外一圈，超大的框也只画画布附近的部分
  fn draw_outline(&self, image: &mut RgbImage, bbox: &[f32; 4], color: Rgb<u8>) {
    let x_min = i64::from(bbox[0] as i32);
    let y_min = i64::from(bbox[1] as i32);
    let x_max = i64::from(bbox[2] as i32);
    let y_max = i64::from(bbox[3] as i32);

    let stroke = i64::from(self.stroke_width);
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));

    for thickness in 0..stroke {
      let (left, top) = (x_min + thickness, y_min + thickness);
      let (right, bottom) = (x_max - thickness, y_max - thickness);
      if right < left || bottom < top {
        break;
      }

      let left = left.max(-stroke);
      let top = top.max(-stroke);
      let right = right.min(width + stroke);
      let bottom = bottom.min(height + stroke);
      if right < left || bottom < top {
        continue;
      }

      let rect = Rect::at(left as i32, top as i32)
        .of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  fn draw_label(&self, image: &mut RgbImage, bbox: &[f32; 4], text: &str, color: Rgb<u8>) {
    // 锚点离画布足够远时文字本来就不可见，收紧范围避免 imageproc 内部的加法溢出
    let clamp = |v: i32, extent: u32| {
      i64::from(v).clamp(-LABEL_CLIP_MARGIN, i64::from(extent) + LABEL_CLIP_MARGIN) as i32
    };
    let x = clamp(bbox[0] as i32, image.width());
    let y = clamp((bbox[1] - self.label_offset_y) as i32, image.height());
    draw_text_mut(image, color, x, y, self.scale(), &self.font, text);
  }

  fn draw_item<T: WithLabel>(&self, image: &mut RgbImage, item: &DetectItem<T>) {
    let label = item.kind.to_label_str();
    let color = label_color(&label);
    self.draw_outline(image, &item.bbox, color);
    self.draw_label(image, &item.bbox, &label_text(&label, item.score), color);
  }
}

pub trait DrawDetectionOnImage<T: WithLabel> {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>);

  /// 在图像副本上绘制，原图保持不变
  fn annotate(&self, image: &RgbImage, result: &DetectResult<T>) -> RgbImage {
    let mut copy = image.clone();
    self.draw_detections_on_image(&mut copy, result);
    copy
  }
}

impl<T: WithLabel> DrawDetectionOnImage<T> for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    // 按给定顺序绘制，后画的覆盖先画的
    for item in result.iter() {
      self.draw_item(image, item);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

  fn item(kind: MaskLabel, score: f32, bbox: [f32; 4]) -> DetectItem<MaskLabel> {
    DetectItem { kind, score, bbox }
  }

  fn non_black_in(
    image: &RgbImage,
    xs: std::ops::Range<u32>,
    ys: std::ops::Range<u32>,
  ) -> Vec<Rgb<u8>> {
    let mut pixels = Vec::new();
    for y in ys {
      for x in xs.clone() {
        let pixel = *image.get_pixel(x, y);
        if pixel != BLACK {
          pixels.push(pixel);
        }
      }
    }
    pixels
  }

  #[test]
  fn color_rule_is_exact_match() {
    assert_eq!(label_color("NO-Mask"), NO_MASK_COLOR);
    assert_eq!(label_color("Mask"), MASK_COLOR);
    assert_eq!(label_color(""), MASK_COLOR);
    assert_eq!(label_color("no-mask"), MASK_COLOR);
    assert_eq!(label_color("NO-Mask "), MASK_COLOR);
    assert_eq!(label_color("person"), MASK_COLOR);
  }

  #[test]
  fn confidence_has_two_decimals() {
    assert_eq!(label_text("Mask", 0.95), "Mask: 0.95");
    assert_eq!(label_text("NO-Mask", 0.8765), "NO-Mask: 0.88");
    assert_eq!(label_text("Mask", 1.0), "Mask: 1.00");
    assert_eq!(label_text("Mask", 0.0), "Mask: 0.00");
  }

  #[test]
  fn no_detections_leaves_image_unchanged() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::from_fn(32, 24, |x, y| Rgb([x as u8, y as u8, 7]));
    let result = DetectResult::<MaskLabel>::empty();
    assert_eq!(draw.annotate(&image, &result), image);
  }

  #[test]
  fn mask_box_is_green_with_five_pixel_stroke() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::new(100, 100);
    let result = DetectResult::from(vec![item(MaskLabel::Mask, 0.95, [10.0, 10.0, 50.0, 50.0])]);
    let annotated = draw.annotate(&image, &result);

    for (x, y) in [(10, 10), (50, 50), (10, 30), (30, 10), (14, 30), (46, 30), (30, 46)] {
      assert_eq!(*annotated.get_pixel(x, y), MASK_COLOR, "({}, {})", x, y);
    }
    for (x, y) in [(15, 30), (45, 30), (30, 15), (30, 30), (9, 30), (51, 30)] {
      assert_eq!(*annotated.get_pixel(x, y), BLACK, "({}, {})", x, y);
    }

    // 文字锚点在 (10, -10)，上半部分被裁掉，下半部分仍在第 0..6 行
    let text_pixels = non_black_in(&annotated, 10..100, 0..6);
    assert!(!text_pixels.is_empty());
    assert!(text_pixels.iter().all(|p| p[0] == 0 && p[2] == 0));
    assert!(non_black_in(&annotated, 0..10, 0..6).is_empty());

    // 原图不受影响
    assert_eq!(image, RgbImage::new(100, 100));
  }

  #[test]
  fn no_mask_box_is_red() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::new(100, 100);
    let result = DetectResult::from(vec![item(MaskLabel::NoMask, 0.5, [10.0, 10.0, 50.0, 50.0])]);
    let annotated = draw.annotate(&image, &result);
    assert_eq!(*annotated.get_pixel(10, 10), NO_MASK_COLOR);
    assert_eq!(*annotated.get_pixel(12, 30), NO_MASK_COLOR);
  }

  #[test]
  fn label_is_drawn_above_box_in_box_color() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::new(120, 120);

    let red = DetectResult::from(vec![item(MaskLabel::NoMask, 0.88, [20.0, 40.0, 80.0, 90.0])]);
    let annotated = draw.annotate(&image, &red);
    let text_pixels = non_black_in(&annotated, 20..120, 20..40);
    assert!(!text_pixels.is_empty());
    assert!(text_pixels.iter().all(|p| p[1] == 0 && p[2] == 0));
    // 标签左侧不应有像素
    assert!(non_black_in(&annotated, 0..20, 0..40).is_empty());

    let green = DetectResult::from(vec![item(MaskLabel::Mask, 0.88, [20.0, 40.0, 80.0, 90.0])]);
    let annotated = draw.annotate(&image, &green);
    let text_pixels = non_black_in(&annotated, 20..120, 20..40);
    assert!(!text_pixels.is_empty());
    assert!(text_pixels.iter().all(|p| p[0] == 0 && p[2] == 0));
  }

  #[test]
  fn overlapping_boxes_are_drawn_in_order() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::new(100, 100);
    let result = DetectResult::from(vec![
      item(MaskLabel::Mask, 0.9, [10.0, 10.0, 60.0, 60.0]),
      item(MaskLabel::NoMask, 0.8, [30.0, 30.0, 80.0, 80.0]),
    ]);
    let annotated = draw.annotate(&image, &result);

    // 第二个框的边覆盖第一个框的边
    assert_eq!(*annotated.get_pixel(32, 58), NO_MASK_COLOR);
    // 第二个框内部保留第一个框的边
    assert_eq!(*annotated.get_pixel(58, 45), MASK_COLOR);
    assert_eq!(*annotated.get_pixel(10, 45), MASK_COLOR);
    assert_eq!(*annotated.get_pixel(80, 70), NO_MASK_COLOR);
  }

  #[test]
  fn annotation_is_deterministic() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::from_pixel(64, 64, Rgb([40, 40, 40]));
    let result = DetectResult::from(vec![
      item(MaskLabel::Mask, 0.42, [5.0, 25.0, 30.0, 60.0]),
      item(MaskLabel::NoMask, 0.77, [20.0, 30.0, 63.0, 63.0]),
    ]);
    assert_eq!(draw.annotate(&image, &result), draw.annotate(&image, &result));
  }

  #[test]
  fn boxes_off_canvas_do_not_panic() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::new(50, 50);
    let result = DetectResult::from(vec![
      item(MaskLabel::Mask, 0.9, [-10.0, -10.0, 20.0, 20.0]),
      item(MaskLabel::Mask, 0.9, [40.0, 40.0, 200.0, 200.0]),
      item(MaskLabel::NoMask, 0.9, [-90.0, -90.0, -60.0, -60.0]),
      item(MaskLabel::NoMask, 0.9, [30.0, 30.0, 10.0, 10.0]),
    ]);
    let annotated = draw.annotate(&image, &result);
    assert_eq!(*annotated.get_pixel(20, 5), MASK_COLOR);
    assert_eq!(*annotated.get_pixel(40, 45), MASK_COLOR);
    // 反向的框不画边框
    assert_eq!(*annotated.get_pixel(30, 30), BLACK);
  }

  #[test]
  fn lenient_unknown_label_is_drawn_as_mask() {
    use crate::model::{DetectionRow, DetectionTable, LabelPolicy};

    let table = DetectionTable::from(vec![DetectionRow {
      xmin: 10.0,
      ymin: 30.0,
      xmax: 40.0,
      ymax: 60.0,
      confidence: 0.5,
      class: 7,
      name: "person".to_string(),
    }]);
    let result = DetectResult::<MaskLabel>::from_table(&table, LabelPolicy::Lenient).unwrap();
    let item = &result.items[0];
    assert_eq!(label_text(&item.kind.to_label_str(), item.score), "Mask: 0.50");

    let annotated = Draw::new().unwrap().annotate(&RgbImage::new(80, 80), &result);
    assert_eq!(*annotated.get_pixel(10, 30), MASK_COLOR);
  }

  #[test]
  fn huge_boxes_are_clipped_without_overflow() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::new(50, 50);

    let wide = DetectResult::from(vec![item(MaskLabel::Mask, 0.9, [-3e9, 0.0, 3e9, 10.0])]);
    let annotated = draw.annotate(&image, &wide);
    assert_eq!(*annotated.get_pixel(25, 0), MASK_COLOR);
    assert_eq!(*annotated.get_pixel(25, 10), MASK_COLOR);
    assert_eq!(*annotated.get_pixel(25, 30), BLACK);

    let far = DetectResult::from(vec![item(MaskLabel::NoMask, 0.9, [0.0, 0.0, 1e9, 1e9])]);
    let annotated = draw.annotate(&image, &far);
    assert_eq!(*annotated.get_pixel(0, 25), NO_MASK_COLOR);
    assert_eq!(*annotated.get_pixel(25, 4), NO_MASK_COLOR);
    assert_eq!(*annotated.get_pixel(25, 25), BLACK);
  }

  #[test]
  fn non_finite_and_extreme_anchors_do_not_panic() {
    let draw = Draw::new().unwrap();
    let image = RgbImage::new(20, 20);
    let result = DetectResult::from(vec![
      item(MaskLabel::Mask, 0.5, [1e30, 1e30, 2e30, 2e30]),
      item(MaskLabel::Mask, 0.5, [-1e30, -1e30, -1e29, -1e29]),
      item(MaskLabel::NoMask, 0.5, [f32::NAN, f32::NAN, f32::INFINITY, f32::INFINITY]),
      item(MaskLabel::NoMask, 0.5, [i32::MAX as f32, 5.0, f32::MAX, 15.0]),
    ]);
    let annotated = draw.annotate(&image, &result);
    assert_eq!(annotated.dimensions(), (20, 20));
  }

  #[test]
  fn missing_font_file_is_an_error() {
    assert!(matches!(
      Draw::with_font_file(Path::new("/nonexistent/font.ttf")),
      Err(DrawError::IoError(_))
    ));
  }
}
