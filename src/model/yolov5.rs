// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/model/yolov5.rs - YOLOv5 ONNX 检测器
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

use image::{Rgb, RgbImage, imageops, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info, warn};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectionRow, DetectionTable, Model},
  url_file_path, url_query,
};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const YOLOV5_INPUT_SIZE: u32 = 640;
const YOLOV5_MAX_INPUT_SIZE: u32 = 4096;
const YOLOV5_CONF_THRESH: f32 = 0.25;
const YOLOV5_IOU_THRESH: f32 = 0.45;
const YOLOV5_MAX_DET: usize = 1000;
const YOLOV5_MAX_NMS: usize = 30000;
const YOLOV5_PAD_VALUE: u8 = 114;
const YOLOV5_BOX_COLS: usize = 5; // cx, cy, w, h, objectness
const YOLOV5_DEFAULT_NAMES: [&str; 2] = ["Mask", "NO-Mask"];

#[derive(Error, Debug)]
pub enum Yolov5Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("参数错误: {0}")]
  ConfigError(String),
  #[error("图像尺寸无效: {0}x{1}")]
  InvalidImage(u32, u32),
  #[error("模型输出形状无效: {0:?}")]
  OutputShape(Vec<usize>),
}

impl Yolov5Error {
  pub fn invalid(msg: &str, e: impl std::fmt::Display) -> Self {
    Yolov5Error::ModelInvalid(format!("{}: {}", msg, e))
  }
}

/// 推理参数
#[derive(Debug, Clone, PartialEq)]
pub struct Yolov5Config {
  /// 网络输入边长（正方形）
  pub input_size: u32,
  /// 置信度阈值
  pub conf_threshold: f32,
  /// NMS IoU 阈值
  pub iou_threshold: f32,
  /// 最多保留的检测数
  pub max_det: usize,
  /// 类别名称，下标即类别编号
  pub names: Vec<String>,
}

impl Default for Yolov5Config {
  fn default() -> Self {
    Self {
      input_size: YOLOV5_INPUT_SIZE,
      conf_threshold: YOLOV5_CONF_THRESH,
      iou_threshold: YOLOV5_IOU_THRESH,
      max_det: YOLOV5_MAX_DET,
      names: YOLOV5_DEFAULT_NAMES.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl Yolov5Config {
  fn class_name(&self, class: usize) -> String {
    self
      .names
      .get(class)
      .cloned()
      .unwrap_or_else(|| class.to_string())
  }
}

pub struct Yolov5 {
  runnable: RunnableModel,
  config: Yolov5Config,
}

pub struct Yolov5Builder {
  model_path: PathBuf,
  config: Yolov5Config,
}

impl FromUrlWithScheme for Yolov5Builder {
  const SCHEME: &'static str = "yolov5";
}

fn parse_query<T: std::str::FromStr>(url: &Url, key: &str) -> Result<Option<T>, Yolov5Error> {
  match url_query(url, key) {
    Some(value) => value
      .parse()
      .map(Some)
      .map_err(|_| Yolov5Error::ConfigError(format!("无法解析参数 {}={}", key, value))),
    None => Ok(None),
  }
}

impl FromUrl for Yolov5Builder {
  type Error = Yolov5Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolov5Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let model_path =
      url_file_path(url).map_err(|e| Yolov5Error::ModelPathError(format!("{}", e)))?;
    if model_path.as_os_str().is_empty() {
      return Err(Yolov5Error::ModelPathError("模型路径为空".to_string()));
    }

    let mut config = Yolov5Config::default();
    if let Some(conf) = parse_query(url, "conf")? {
      config.conf_threshold = conf;
    }
    if let Some(iou) = parse_query(url, "iou")? {
      config.iou_threshold = iou;
    }
    if let Some(size) = parse_query(url, "size")? {
      config.input_size = size;
    }
    if let Some(max_det) = parse_query(url, "max_det")? {
      config.max_det = max_det;
    }
    if let Some(names) = url_query(url, "names") {
      config.names = names.split(',').map(|s| s.trim().to_string()).collect();
    }

    Yolov5Builder { model_path, config }.validated()
  }
}

impl Yolov5Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      config: Yolov5Config::default(),
    }
  }

  pub fn config(mut self, config: Yolov5Config) -> Self {
    self.config = config;
    self
  }

  pub fn model_path(&self) -> &std::path::Path {
    &self.model_path
  }

  pub fn yolov5_config(&self) -> &Yolov5Config {
    &self.config
  }

  fn validated(self) -> Result<Self, Yolov5Error> {
    let config = &self.config;
    if config.input_size == 0 || config.input_size % 32 != 0 {
      return Err(Yolov5Error::ConfigError(format!(
        "输入尺寸必须是 32 的正整数倍: {}",
        config.input_size
      )));
    }
    if config.input_size > YOLOV5_MAX_INPUT_SIZE {
      return Err(Yolov5Error::ConfigError(format!(
        "输入尺寸不能超过 {}: {}",
        YOLOV5_MAX_INPUT_SIZE, config.input_size
      )));
    }
    if !(0.0..=1.0).contains(&config.conf_threshold) {
      return Err(Yolov5Error::ConfigError(format!(
        "置信度阈值必须在 0 到 1 之间: {}",
        config.conf_threshold
      )));
    }
    if !(0.0..=1.0).contains(&config.iou_threshold) {
      return Err(Yolov5Error::ConfigError(format!(
        "IoU 阈值必须在 0 到 1 之间: {}",
        config.iou_threshold
      )));
    }
    Ok(self)
  }

  pub fn build(self) -> Result<Yolov5, Yolov5Error> {
    let Yolov5Builder { model_path, config } = self.validated()?;

    info!("加载模型文件: {}", model_path.display());
    let metadata = std::fs::metadata(&model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    let size = config.input_size as usize;
    let runnable = tract_onnx::onnx()
      .model_for_path(&model_path)
      .map_err(|e| Yolov5Error::invalid("无法解析 ONNX 模型", e))?
      .with_input_fact(0, f32::fact([1, 3, size, size]).into())
      .map_err(|e| Yolov5Error::invalid("无法设置模型输入形状", e))?
      .into_optimized()
      .map_err(|e| Yolov5Error::invalid("无法优化模型", e))?
      .into_runnable()
      .map_err(|e| Yolov5Error::invalid("无法生成可执行模型", e))?;

    info!("模型加载完成");
    debug!("模型参数: {:?}", config);

    Ok(Yolov5 { runnable, config })
  }
}

/// 等比缩放并填充到网络输入尺寸
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
  size: u32,
  gain: f32,
  resized: (u32, u32),
  offset: (u32, u32),
  pad: (f32, f32),
  source: (u32, u32),
}

impl Letterbox {
  pub(crate) fn new(source: (u32, u32), size: u32) -> Self {
    let (w, h) = source;
    let gain = (size as f32 / h as f32).min(size as f32 / w as f32);
    let resized = (
      ((w as f32 * gain).round() as u32).clamp(1, size),
      ((h as f32 * gain).round() as u32).clamp(1, size),
    );
    let dw = (size - resized.0) as f32 / 2.0;
    let dh = (size - resized.1) as f32 / 2.0;
    let offset = (
      (dw - 0.1).round().max(0.0) as u32,
      (dh - 0.1).round().max(0.0) as u32,
    );
    // 还原坐标时使用未取整的填充量
    let pad = (
      (size as f32 - w as f32 * gain) / 2.0,
      (size as f32 - h as f32 * gain) / 2.0,
    );

    Self {
      size,
      gain,
      resized,
      offset,
      pad,
      source,
    }
  }

  pub(crate) fn apply(&self, image: &RgbImage) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(self.size, self.size, Rgb([YOLOV5_PAD_VALUE; 3]));
    if image.dimensions() == self.resized {
      imageops::replace(&mut canvas, image, self.offset.0 as i64, self.offset.1 as i64);
    } else {
      let resized = imageops::resize(image, self.resized.0, self.resized.1, FilterType::Triangle);
      imageops::replace(
        &mut canvas,
        &resized,
        self.offset.0 as i64,
        self.offset.1 as i64,
      );
    }
    canvas
  }

  /// 网络坐标还原为原图坐标，并裁剪到原图范围内
  pub(crate) fn unmap(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (w, h) = (self.source.0 as f32, self.source.1 as f32);
    [
      ((bbox[0] - self.pad.0) / self.gain).clamp(0.0, w),
      ((bbox[1] - self.pad.1) / self.gain).clamp(0.0, h),
      ((bbox[2] - self.pad.0) / self.gain).clamp(0.0, w),
      ((bbox[3] - self.pad.1) / self.gain).clamp(0.0, h),
    ]
  }
}

/// RGB 图像转为 [1, 3, H, W] 的 f32 张量，数值归一化到 [0, 1]
fn to_nchw_tensor(image: &RgbImage) -> TractResult<Tensor> {
  let (width, height) = image.dimensions();
  let plane = width as usize * height as usize;
  let mut data = vec![0f32; 3 * plane];
  for (x, y, pixel) in image.enumerate_pixels() {
    let idx = y as usize * width as usize + x as usize;
    for c in 0..3 {
      data[c * plane + idx] = pixel[c] as f32 / 255.0;
    }
  }
  Tensor::from_shape(&[1, 3, height as usize, width as usize], &data)
}

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
  bbox: [f32; 4],
  score: f32,
  class: usize,
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

/// 解码输出行 [cx, cy, w, h, obj, cls...]
fn decode_predictions(data: &[f32], cols: usize, conf_threshold: f32) -> Vec<Candidate> {
  data
    .chunks_exact(cols)
    .filter_map(|row| {
      let objectness = row[4];
      if objectness <= conf_threshold {
        return None;
      }

      let (class, class_score) = row[YOLOV5_BOX_COLS..].iter().copied().enumerate().fold(
        (0usize, f32::MIN),
        |best, (idx, score)| if score > best.1 { (idx, score) } else { best },
      );
      let score = objectness * class_score;
      if score <= conf_threshold {
        return None;
      }

      let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
      Some(Candidate {
        bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
        score,
        class,
      })
    })
    .collect()
}

/// 按类别的非极大值抑制，结果按置信度降序
fn non_max_suppression(
  mut candidates: Vec<Candidate>,
  iou_threshold: f32,
  max_det: usize,
) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
  candidates.truncate(YOLOV5_MAX_NMS);

  let mut kept: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    if kept.len() >= max_det {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|k| k.class == candidate.class && iou(&k.bbox, &candidate.bbox) > iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }
  kept
}

impl Yolov5 {
  pub fn config(&self) -> &Yolov5Config {
    &self.config
  }

  fn postprocess(
    output: &[f32],
    shape: &[usize],
    letterbox: &Letterbox,
    config: &Yolov5Config,
  ) -> Result<DetectionTable, Yolov5Error> {
    let (rows, cols) = match shape {
      [1, rows, cols] | [rows, cols] => (*rows, *cols),
      other => return Err(Yolov5Error::OutputShape(other.to_vec())),
    };
    if cols <= YOLOV5_BOX_COLS || output.len() != rows * cols {
      return Err(Yolov5Error::OutputShape(shape.to_vec()));
    }

    let num_classes = cols - YOLOV5_BOX_COLS;
    if num_classes != config.names.len() {
      warn!(
        "模型类别数 {} 与类别名称数 {} 不一致",
        num_classes,
        config.names.len()
      );
    }

    let candidates = decode_predictions(output, cols, config.conf_threshold);
    debug!("候选框数量: {}", candidates.len());
    let kept = non_max_suppression(candidates, config.iou_threshold, config.max_det);
    debug!("NMS 后检测数量: {}", kept.len());

    let table = kept
      .into_iter()
      .map(|candidate| {
        let [xmin, ymin, xmax, ymax] = letterbox.unmap(candidate.bbox);
        DetectionRow {
          xmin,
          ymin,
          xmax,
          ymax,
          confidence: candidate.score,
          class: candidate.class as u32,
          name: config.class_name(candidate.class),
        }
      })
      .collect::<Vec<_>>();

    Ok(DetectionTable::from(table))
  }
}

impl Model for Yolov5 {
  type Input = RgbImage;
  type Output = DetectionTable;
  type Error = Yolov5Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (width, height) = input.dimensions();
    if width == 0 || height == 0 {
      return Err(Yolov5Error::InvalidImage(width, height));
    }

    debug!("预处理输入图像 {}x{}", width, height);
    let letterbox = Letterbox::new((width, height), self.config.input_size);
    let tensor = to_nchw_tensor(&letterbox.apply(input))
      .map_err(|e| Yolov5Error::InferenceError(format!("无法构建输入张量: {}", e)))?;

    debug!("执行模型推理");
    let outputs = self
      .runnable
      .run(tvec!(tensor.into()))
      .map_err(|e| Yolov5Error::InferenceError(format!("{}", e)))?;

    let output = outputs
      .into_iter()
      .next()
      .ok_or_else(|| Yolov5Error::InferenceError("模型没有输出".to_string()))?
      .into_tensor();
    let data = output
      .as_slice::<f32>()
      .map_err(|e| Yolov5Error::InferenceError(format!("模型输出不是 f32: {}", e)))?;

    Self::postprocess(data, output.shape(), &letterbox, &self.config)
  }
}
