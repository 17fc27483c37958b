// 该文件是 Kouzhao （口罩检测） 项目的一部分。
// src/task.rs - 检测任务
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

use std::marker::PhantomData;

use image::RgbImage;
use tracing::{debug, info};

use crate::{
  frame::Frame,
  model::{DetectResult, DetectionTable, LabelPolicy, MaskLabel, Model, WithLabel},
  output::Render,
  summary::Outcome,
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: &M, output: &O) -> Result<Self::Output, Self::Error>;
}

/// 读取一帧，检测、整理、绘制，然后结束
#[derive(Debug)]
pub struct OneShotTask<T = MaskLabel> {
  policy: LabelPolicy,
  _label: PhantomData<T>,
}

impl<T> Default for OneShotTask<T> {
  fn default() -> Self {
    Self {
      policy: LabelPolicy::default(),
      _label: PhantomData,
    }
  }
}

impl<T> OneShotTask<T> {
  pub fn with_label_policy(mut self, policy: LabelPolicy) -> Self {
    self.policy = policy;
    self
  }
}

impl<
  T: WithLabel,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Model<Input = RgbImage, Output = DetectionTable, Error = ME>,
  O: Render<Frame, DetectResult<T>, Error = RE>,
> Task<I, M, O> for OneShotTask<T>
{
  type Output = Outcome;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: &M, output: &O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!(
      "输入帧获取成功 ({}x{})，开始推理...",
      frame.width(),
      frame.height()
    );

    let now = std::time::Instant::now();
    let table = model.infer(&frame.image)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let result = DetectResult::<T>::from_table(&table, self.policy)?;
    info!("检测到 {} 个目标", result.len());
    for item in result.iter() {
      debug!(
        "  - {}: {:.2} at ({:.0}, {:.0}, {:.0}, {:.0})",
        item.kind.to_label_str(),
        item.score,
        item.bbox[0],
        item.bbox[1],
        item.bbox[2],
        item.bbox[3]
      );
    }

    let now = std::time::Instant::now();
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(Outcome {
      detections: result.len(),
      label_counts: result.label_counts(),
      origin: frame.origin,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::{frame::ImageOrigin, model::DetectionRow, model::ShapeError};

  struct FixedModel(DetectionTable);

  impl Model for FixedModel {
    type Input = RgbImage;
    type Output = DetectionTable;
    type Error = std::io::Error;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Ok(self.0.clone())
    }
  }

  struct FailingModel;

  impl Model for FailingModel {
    type Input = RgbImage;
    type Output = DetectionTable;
    type Error = std::io::Error;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Err(std::io::Error::other("incompatible channel count"))
    }
  }

  #[derive(Default)]
  struct CapturingOutput {
    rendered: RefCell<Vec<usize>>,
  }

  impl Render<Frame, DetectResult<MaskLabel>> for CapturingOutput {
    type Error = std::io::Error;

    fn render_result(
      &self,
      _frame: &Frame,
      result: &DetectResult<MaskLabel>,
    ) -> Result<(), Self::Error> {
      self.rendered.borrow_mut().push(result.len());
      Ok(())
    }
  }

  fn frames(origin: ImageOrigin) -> std::vec::IntoIter<Frame> {
    vec![Frame::new(RgbImage::new(16, 16), origin)].into_iter()
  }

  fn row(name: &str) -> DetectionRow {
    DetectionRow {
      xmin: 1.0,
      ymin: 1.0,
      xmax: 5.0,
      ymax: 5.0,
      confidence: 0.9,
      class: 0,
      name: name.to_string(),
    }
  }

  #[test]
  fn runs_detection_and_renders_once() {
    let model = FixedModel(DetectionTable::from(vec![row("Mask"), row("NO-Mask")]));
    let output = CapturingOutput::default();

    let outcome = OneShotTask::<MaskLabel>::default()
      .run_task(frames(ImageOrigin::Uploaded("a.jpg".into())), &model, &output)
      .unwrap();

    assert_eq!(outcome.detections, 2);
    assert_eq!(*output.rendered.borrow(), vec![2]);
    assert!(!outcome.origin.is_sample());
  }

  #[test]
  fn zero_detections_still_renders() {
    let model = FixedModel(DetectionTable::default());
    let output = CapturingOutput::default();

    let outcome = OneShotTask::<MaskLabel>::default()
      .run_task(frames(ImageOrigin::Sample("s.jpg".into())), &model, &output)
      .unwrap();

    assert_eq!(outcome.detections, 0);
    assert_eq!(*output.rendered.borrow(), vec![0]);
    assert!(outcome.origin.is_sample());
  }

  #[test]
  fn model_failure_propagates() {
    let output = CapturingOutput::default();
    let err = OneShotTask::<MaskLabel>::default()
      .run_task(
        frames(ImageOrigin::Uploaded("a.jpg".into())),
        &FailingModel,
        &output,
      )
      .unwrap_err();

    assert!(err.to_string().contains("incompatible channel count"));
    assert!(output.rendered.borrow().is_empty());
  }

  #[test]
  fn label_policy_controls_unknown_labels() {
    let model = FixedModel(DetectionTable::from(vec![row("person")]));
    let output = CapturingOutput::default();

    let err = OneShotTask::<MaskLabel>::default()
      .run_task(frames(ImageOrigin::Uploaded("a.jpg".into())), &model, &output)
      .unwrap_err();
    assert!(err.downcast_ref::<ShapeError>().is_some());

    let outcome = OneShotTask::<MaskLabel>::default()
      .with_label_policy(LabelPolicy::Lenient)
      .run_task(frames(ImageOrigin::Uploaded("a.jpg".into())), &model, &output)
      .unwrap();
    assert_eq!(outcome.label_counts, vec![("Mask".to_string(), 1)]);
  }

  #[test]
  fn empty_input_is_an_error() {
    let model = FixedModel(DetectionTable::default());
    let output = CapturingOutput::default();
    let result = OneShotTask::<MaskLabel>::default().run_task(
      Vec::<Frame>::new().into_iter(),
      &model,
      &output,
    );
    assert!(result.is_err());
  }
}
