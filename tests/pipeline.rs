// 该文件是 Yushi （鱼识） 项目的一部分。
// tests/pipeline.rs - 流水线集成测试
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

use std::{
  convert::Infallible,
  path::{Path, PathBuf},
};

use image::{Rgb, RgbImage};
use serde_json::{Value, json};
use thiserror::Error;

use yushi::{
  BoundingBox, LabelVocabulary, Pipeline, PipelineError, Request, run_once,
  model::{Classifier, ClassifierInput, Detector, LoadedModels, ModelOptions, ModelPaths},
  output::{Annotator, read_image},
  task::{BatchTask, OneShotTask, Task, batch_requests},
};

/// 固定输出的检测器
struct StubDetector {
  boxes: Vec<BoundingBox>,
}

impl Detector for StubDetector {
  type Error = Infallible;

  fn propose(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, Self::Error> {
    Ok(self.boxes.clone())
  }
}

/// 按调用顺序轮流返回预设类别
struct StubClassifier {
  answers: Vec<(usize, f32)>,
  classes: usize,
  calls: usize,
}

impl StubClassifier {
  fn new(answers: Vec<(usize, f32)>, classes: usize) -> Self {
    Self {
      answers,
      classes,
      calls: 0,
    }
  }
}

impl Classifier for StubClassifier {
  type Error = Infallible;

  fn infer(&mut self, _input: &ClassifierInput) -> Result<Vec<f32>, Self::Error> {
    let (index, p) = self.answers[self.calls % self.answers.len()];
    self.calls += 1;
    let len = self.classes.max(index + 1);
    let rest = (1.0 - p) / (len - 1) as f32;
    Ok((0..len).map(|i| if i == index { p } else { rest }).collect())
  }
}

#[derive(Error, Debug)]
#[error("detector exploded")]
struct DetectorExploded;

struct FailingDetector;

impl Detector for FailingDetector {
  type Error = DetectorExploded;

  fn propose(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, Self::Error> {
    Err(DetectorExploded)
  }
}

fn vocabulary() -> LabelVocabulary {
  let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/labels.txt");
  LabelVocabulary::from_file(path).unwrap()
}

fn pipeline(
  boxes: Vec<BoundingBox>,
  answers: Vec<(usize, f32)>,
) -> Pipeline<StubDetector, StubClassifier> {
  Pipeline::new(
    StubDetector { boxes },
    StubClassifier::new(answers, 31),
    vocabulary(),
    Annotator::default(),
  )
}

fn write_source(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
  let image = RgbImage::from_fn(width, height, |x, y| {
    Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
  });
  let path = dir.join(name);
  image.save(&path).unwrap();
  path
}

fn as_json(result: &yushi::PipelineResult) -> Value {
  serde_json::from_str(&result.to_json()).unwrap()
}

#[test]
fn zero_boxes_yield_empty_success_and_identical_image() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 64, 48);
  let output = dir.path().join("out/annotated.png");

  let mut pipeline = pipeline(vec![], vec![(0, 0.5)]);
  let result = pipeline.run(&Request::new(&source, &output));

  assert_eq!(
    as_json(&result),
    json!({
      "success": true,
      "output_image": output.display().to_string(),
      "fish_count": 0,
      "detections": [],
    })
  );
  assert_eq!(read_image(&output).unwrap(), read_image(&source).unwrap());
}

#[test]
fn single_box_is_padded_and_labelled() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 640, 480);
  let output = dir.path().join("annotated.png");

  let mut pipeline = pipeline(vec![BoundingBox::new(100, 100, 200, 200)], vec![(7, 0.93)]);
  let result = pipeline.run(&Request::new(&source, &output).with_padding(20));

  assert!(result.success());
  let value = as_json(&result);
  assert_eq!(value["fish_count"], 1);
  assert_eq!(
    value["detections"],
    json!([{"bbox": [80, 80, 220, 220], "label": "Glass Perchlet", "confidence": 0.93}])
  );
  assert!(output.is_file());
}

#[test]
fn corner_box_clamps_to_origin() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 640, 480);
  let output = dir.path().join("annotated.png");

  let mut pipeline = pipeline(vec![BoundingBox::new(0, 0, 30, 30)], vec![(3, 0.6)]);
  let result = pipeline.run(&Request::new(&source, &output).with_padding(50));

  let value = as_json(&result);
  assert_eq!(value["detections"][0]["bbox"], json!([0, 0, 80, 80]));
  assert_eq!(value["detections"][0]["label"], "Catfish");
}

#[test]
fn index_past_vocabulary_falls_back_to_number() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 100, 100);
  let output = dir.path().join("annotated.png");

  let mut pipeline = pipeline(vec![BoundingBox::new(10, 10, 40, 40)], vec![(31, 0.8)]);
  let result = pipeline.run(&Request::new(&source, &output));

  assert!(result.success());
  assert_eq!(result.detections()[0].label, "31");
}

#[test]
fn missing_detector_fails_without_writing_output() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 32, 32);
  let output = dir.path().join("out/annotated.png");

  let paths = ModelPaths {
    detector: dir.path().join("models/yolov8sfish.onnx"),
    classifier: dir.path().join("models/fishclass.onnx"),
    labels: Path::new(env!("CARGO_MANIFEST_DIR")).join("models/labels.txt"),
  };
  let result = run_once(
    &paths,
    &ModelOptions::default(),
    Annotator::default(),
    &Request::new(&source, &output),
  );

  assert!(!result.success());
  let value = as_json(&result);
  assert_eq!(value["success"], false);
  assert!(value["error"].as_str().unwrap().contains("yolov8sfish.onnx"));
  assert!(value.get("output_image").is_none());
  assert!(!output.exists());
}

#[test]
fn missing_classifier_fails_without_writing_output() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 32, 32);
  let output = dir.path().join("out/annotated.png");

  let models = dir.path().join("models");
  std::fs::create_dir(&models).unwrap();
  std::fs::write(models.join("yolov8sfish.onnx"), b"").unwrap();
  let paths = ModelPaths {
    labels: Path::new(env!("CARGO_MANIFEST_DIR")).join("models/labels.txt"),
    ..ModelPaths::in_dir(&models)
  };

  match LoadedModels::load(&paths, &ModelOptions::default()) {
    Err(PipelineError::ModelNotFound(path)) => assert_eq!(path, paths.classifier),
    Err(e) => panic!("unexpected error: {e}"),
    Ok(_) => panic!("loading must fail"),
  }

  let result = run_once(
    &paths,
    &ModelOptions::default(),
    Annotator::default(),
    &Request::new(&source, &output),
  );
  assert!(!result.success());
  assert!(result.error().unwrap().contains("fishclass.onnx"));
  assert!(!output.exists());
}

#[test]
fn unreadable_image_is_reported() {
  let dir = tempfile::tempdir().unwrap();
  let output = dir.path().join("annotated.png");

  let mut pipeline = pipeline(vec![], vec![(0, 0.5)]);
  let result = pipeline.run(&Request::new(dir.path().join("missing.jpg"), &output));

  assert!(!result.success());
  assert!(result.error().unwrap().contains("missing.jpg"));
  assert_eq!(result.fish_count(), 0);
  assert!(!output.exists());
}

#[test]
fn detector_failure_becomes_failure_envelope() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 32, 32);
  let output = dir.path().join("annotated.png");

  let mut pipeline = Pipeline::new(
    FailingDetector,
    StubClassifier::new(vec![(0, 0.5)], 31),
    vocabulary(),
    Annotator::default(),
  );
  let result = pipeline.run(&Request::new(&source, &output));

  assert!(!result.success());
  assert!(result.error().unwrap().contains("detector exploded"));
  assert!(!output.exists());
}

#[test]
fn empty_regions_are_skipped_and_order_is_kept() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 200, 100);
  let output = dir.path().join("annotated.png");

  let boxes = vec![
    BoundingBox::new(150, 50, 190, 90),
    BoundingBox::new(300, 10, 350, 40), // 完全在图像外
    BoundingBox::new(20, 20, 20, 60),   // 零宽度
    BoundingBox::new(10, 10, 60, 40),
  ];
  let mut pipeline = pipeline(boxes, vec![(0, 0.4), (30, 0.9)]);
  let result = pipeline.run(&Request::new(&source, &output).with_padding(0));

  assert_eq!(result.fish_count(), 2);
  let value = as_json(&result);
  assert_eq!(
    value["detections"],
    json!([
      {"bbox": [150, 50, 190, 90], "label": "Bangus", "confidence": 0.4},
      {"bbox": [10, 10, 60, 40], "label": "Tilapia", "confidence": 0.9},
    ])
  );
}

#[test]
fn detections_respect_bounds_and_confidence_range() {
  let dir = tempfile::tempdir().unwrap();
  let (width, height) = (120u32, 90u32);
  let source = write_source(dir.path(), "src.png", width, height);
  let output = dir.path().join("annotated.png");

  let boxes = vec![
    BoundingBox::new(-50, -50, 10, 10),
    BoundingBox::new(100, 70, 500, 500),
    BoundingBox::new(30, 30, 60, 60),
    BoundingBox::new(i32::MIN, 0, i32::MAX, 5),
  ];
  let mut pipeline = pipeline(boxes, vec![(1, 0.2), (2, 1.0), (5, 0.55)]);
  let result = pipeline.run(&Request::new(&source, &output).with_padding(15));

  assert!(result.success());
  assert_eq!(result.fish_count(), result.detections().len());
  for detection in result.detections() {
    let bbox = detection.bbox;
    assert!(bbox.x1() < bbox.x2() && bbox.x2() <= width);
    assert!(bbox.y1() < bbox.y2() && bbox.y2() <= height);
    assert!((0.0..=1.0).contains(&detection.confidence));
    assert!(!detection.label.is_empty());
  }
}

#[test]
fn repeated_runs_are_identical() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 320, 240);
  let boxes = vec![
    BoundingBox::new(10, 10, 100, 80),
    BoundingBox::new(200, 100, 300, 230),
  ];

  let run = |name: &str| {
    let mut pipeline = pipeline(boxes.clone(), vec![(4, 0.7), (12, 0.35)]);
    pipeline.run(&Request::new(&source, dir.path().join(name)))
  };
  let first = run("a.png");
  let second = run("b.png");

  assert_eq!(first.detections(), second.detections());
  assert_eq!(
    read_image(&dir.path().join("a.png")).unwrap(),
    read_image(&dir.path().join("b.png")).unwrap()
  );
}

#[test]
fn annotation_draws_on_copy_only() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 100, 100);
  let output = dir.path().join("annotated.png");
  let before = read_image(&source).unwrap();

  let mut pipeline = pipeline(vec![BoundingBox::new(20, 20, 60, 60)], vec![(0, 0.5)]);
  let result = pipeline.run(&Request::new(&source, &output).with_padding(0));

  assert!(result.success());
  assert_eq!(read_image(&source).unwrap(), before);
  let annotated = read_image(&output).unwrap();
  assert_eq!(annotated.get_pixel(20, 20), &Rgb([0, 255, 0]));
  assert_ne!(annotated, before);
}

#[test]
fn batch_reuses_models_and_isolates_failures() {
  let dir = tempfile::tempdir().unwrap();
  let good = write_source(dir.path(), "good.png", 100, 100);
  let missing = dir.path().join("missing.png");
  let also_good = write_source(dir.path(), "also.png", 100, 100);
  let out_dir = dir.path().join("out");

  let requests = batch_requests(&[good, missing, also_good], &out_dir, 5);
  let mut pipeline = pipeline(vec![BoundingBox::new(10, 10, 50, 50)], vec![(9, 0.66)]);
  let mut sink = Vec::new();
  let summary = BatchTask::new(requests, &mut sink)
    .run_task(&mut pipeline)
    .unwrap();

  assert_eq!(summary.processed, 3);
  assert_eq!(summary.failed, 1);
  assert!(!summary.all_succeeded());

  let lines: Vec<Value> = String::from_utf8(sink)
    .unwrap()
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();
  assert_eq!(lines.len(), 3);
  assert_eq!(lines[0]["success"], true);
  assert_eq!(lines[0]["detections"][0]["bbox"], json!([5, 5, 55, 55]));
  assert_eq!(lines[0]["detections"][0]["label"], "Gold Fish");
  assert_eq!(lines[1]["success"], false);
  assert_eq!(lines[2]["success"], true);
  assert!(out_dir.join("annotated-good.png").is_file());
  assert!(out_dir.join("annotated-also.png").is_file());
  assert!(!out_dir.join("annotated-missing.png").exists());
}

#[test]
fn batch_stops_on_interrupt() {
  let dir = tempfile::tempdir().unwrap();
  let image = write_source(dir.path(), "a.png", 10, 10);
  let requests = batch_requests(&[image.clone(), image], &dir.path().join("out"), 0);

  let (tx, rx) = std::sync::mpsc::channel();
  tx.send(()).unwrap();

  let mut pipeline = pipeline(vec![], vec![(0, 0.5)]);
  let mut sink = Vec::new();
  let summary = BatchTask::new(requests, &mut sink)
    .with_interrupt(rx)
    .run_task(&mut pipeline)
    .unwrap();

  assert!(summary.interrupted);
  assert_eq!(summary.processed, 0);
  assert!(sink.is_empty());
}

#[test]
fn one_shot_task_reuses_loaded_pipeline() {
  let dir = tempfile::tempdir().unwrap();
  let source = write_source(dir.path(), "src.png", 80, 60);
  let mut pipeline = pipeline(vec![BoundingBox::new(5, 5, 30, 30)], vec![(21, 0.75)]);

  for name in ["first.png", "second.png"] {
    let output = dir.path().join(name);
    let result = OneShotTask::new(Request::new(&source, &output)).run_task(&mut pipeline);
    assert!(result.success());
    assert_eq!(result.detections()[0].label, "Mullet");
    assert_eq!(result.output_image(), Some(output.display().to_string().as_str()));
  }
}

#[test]
fn batch_keeps_outputs_of_same_named_images_apart() {
  let dir = tempfile::tempdir().unwrap();
  for sub in ["x", "y"] {
    std::fs::create_dir(dir.path().join(sub)).unwrap();
  }
  let large = write_source(&dir.path().join("x"), "fish.png", 40, 40);
  let small = write_source(&dir.path().join("y"), "fish.png", 20, 20);
  let out_dir = dir.path().join("out");

  let requests = batch_requests(&[large, small], &out_dir, 0);
  let mut pipeline = pipeline(vec![], vec![(0, 0.5)]);
  let mut sink = Vec::new();
  let summary = BatchTask::new(requests, &mut sink)
    .run_task(&mut pipeline)
    .unwrap();
  assert!(summary.all_succeeded());

  let lines: Vec<Value> = String::from_utf8(sink)
    .unwrap()
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();
  let outputs: Vec<PathBuf> = lines
    .iter()
    .map(|line| PathBuf::from(line["output_image"].as_str().unwrap()))
    .collect();
  assert_ne!(outputs[0], outputs[1]);
  assert_eq!(read_image(&outputs[0]).unwrap().dimensions(), (40, 40));
  assert_eq!(read_image(&outputs[1]).unwrap().dimensions(), (20, 20));
}
