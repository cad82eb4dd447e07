// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dataset loading and splitting for facial-expression classification

use crate::metrics::MAX_CLASSES;
use anyhow::{bail, ensure, Context, Result};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Expression classes of the CK+48 layout, in directory order
pub const EXPRESSIONS: [&str; 7] = ["anger", "contempt", "disgust", "fear", "happy", "sadness", "surprise"];

/// Side length of synthetic faces; 25 x 25 = 625 features
pub const SYNTHETIC_SIDE: usize = 25;

/// File extensions read by [`Dataset::load_image_dir`]
pub const IMAGE_EXTENSIONS: [&str; 4] = ["pgm", "png", "jpg", "jpeg"];

/// A single grayscale face image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSample {
    /// Unique identifier
    pub id: String,
    /// Class index
    pub label: usize,
    /// Expression name (if known)
    #[serde(default)]
    pub expression: Option<String>,
    /// Row-major intensities in [0, 1]
    pub pixels: Vec<f64>,
}

/// Description of a loaded dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: String,
    pub format: String,
    pub image_width: usize,
    pub image_height: usize,
    pub class_names: Vec<String>,
}

/// A loaded, unsplit dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    pub config: DatasetConfig,
    pub samples: Vec<FaceSample>,
}

/// Train, validation and test splits as aligned feature/label pairs
#[derive(Debug, Clone)]
pub struct DataSplits {
    pub train_x: Array2<f64>,
    pub train_y: Vec<usize>,
    pub val_x: Array2<f64>,
    pub val_y: Vec<usize>,
    pub test_x: Array2<f64>,
    pub test_y: Vec<usize>,
    pub image_width: usize,
    pub image_height: usize,
}

impl DataSplits {
    pub fn total_samples(&self) -> usize {
        self.train_y.len() + self.val_y.len() + self.test_y.len()
    }
}

#[derive(Debug, Deserialize)]
struct JsonlRecord {
    #[serde(default)]
    id: Option<String>,
    label: usize,
    #[serde(default)]
    expression: Option<String>,
    pixels: Vec<f64>,
    #[serde(default)]
    width: Option<usize>,
}

impl Dataset {
    /// Load from a directory of per-class image folders or a JSON Lines file
    pub fn load_dataset(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::load_image_dir(path)
        } else {
            Self::load_jsonl(path)
        }
    }

    /// Load a directory holding one sub-directory of images per class
    /// (the CK+48 layout). PGM files are parsed directly; PNG and JPEG files
    /// are decoded and converted to 8-bit grayscale.
    ///
    /// Class indices follow the sorted sub-directory names.
    pub fn load_image_dir(data_dir: &Path) -> Result<Self> {
        let mut class_dirs: Vec<_> = std::fs::read_dir(data_dir)
            .with_context(|| format!("Failed to read dataset directory {}", data_dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_dir())
            .collect();
        class_dirs.sort();
        ensure!(!class_dirs.is_empty(), "no class directories found in {}", data_dir.display());

        let mut class_names = Vec::new();
        let mut samples = Vec::new();
        let mut shape: Option<(usize, usize)> = None;

        ensure!(
            class_dirs.len() <= MAX_CLASSES,
            "{} class directories found, at most {} classes are supported",
            class_dirs.len(),
            MAX_CLASSES
        );

        for (label, class_dir) in class_dirs.iter().enumerate() {
            let class_name = class_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            let mut files: Vec<_> = std::fs::read_dir(class_dir)
                .with_context(|| format!("Failed to read class directory {}", class_dir.display()))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| image_extension(p).is_some())
                .collect();
            files.sort();

            for file in files {
                let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
                let decoded = match image_extension(&file) {
                    Some("pgm") => parse_pgm(&bytes),
                    _ => decode_grayscale(&bytes),
                };
                let (width, height, pixels) =
                    decoded.with_context(|| format!("Failed to decode {}", file.display()))?;

                match shape {
                    None => shape = Some((width, height)),
                    Some(expected) if expected != (width, height) => bail!(
                        "{} is {}x{} but earlier images are {}x{}",
                        file.display(),
                        width,
                        height,
                        expected.0,
                        expected.1
                    ),
                    Some(_) => {}
                }

                let stem = file.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
                samples.push(FaceSample {
                    id: format!("{}/{}", class_name, stem),
                    label,
                    expression: Some(class_name.clone()),
                    pixels,
                });
            }

            tracing::debug!("Class {} ({}) loaded", label, class_name);
            class_names.push(class_name);
        }

        let (image_width, image_height) =
            shape.with_context(|| format!("no images found under {}", data_dir.display()))?;

        Ok(Self {
            config: DatasetConfig {
                id: "image-dir".to_string(),
                name: data_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "images".to_string()),
                description: "Per-class directories of grayscale face images".to_string(),
                source: data_dir.display().to_string(),
                format: "images".to_string(),
                image_width,
                image_height,
                class_names,
            },
            samples,
        })
    }

    /// Load a JSON Lines file: `{"id", "label", "expression", "pixels", "width"}`.
    ///
    /// Images without a width are assumed square.
    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut samples = Vec::new();
        let mut shape: Option<(usize, usize)> = None;
        let mut class_names: BTreeMap<usize, String> = BTreeMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read line")?;
            if line.trim().is_empty() {
                continue;
            }
            let record: JsonlRecord = serde_json::from_str(&line)
                .with_context(|| format!("Invalid record on line {}", line_num + 1))?;

            ensure!(
                record.label < MAX_CLASSES,
                "line {}: label {} exceeds the class limit of {}",
                line_num + 1,
                record.label,
                MAX_CLASSES
            );

            let width = match record.width {
                Some(w) => w,
                None => {
                    let side = (record.pixels.len() as f64).sqrt().round() as usize;
                    ensure!(
                        side * side == record.pixels.len(),
                        "line {}: {} pixels is not a square image and no width is given",
                        line_num + 1,
                        record.pixels.len()
                    );
                    side
                }
            };
            ensure!(
                width > 0 && record.pixels.len() % width == 0,
                "line {}: {} pixels cannot form rows of width {}",
                line_num + 1,
                record.pixels.len(),
                width
            );
            let dims = (width, record.pixels.len() / width);
            match shape {
                None => shape = Some(dims),
                Some(expected) => ensure!(
                    expected == dims,
                    "line {}: image is {}x{} but earlier images are {}x{}",
                    line_num + 1,
                    dims.0,
                    dims.1,
                    expected.0,
                    expected.1
                ),
            }

            if let Some(ref name) = record.expression {
                class_names.entry(record.label).or_insert_with(|| name.clone());
            }
            samples.push(FaceSample {
                id: record.id.unwrap_or_else(|| format!("{}_{}", path.display(), line_num)),
                label: record.label,
                expression: record.expression,
                pixels: record.pixels,
            });
        }

        let (image_width, image_height) = shape.with_context(|| format!("{} holds no samples", path.display()))?;
        let n_classes = samples.iter().map(|s| s.label).max().map_or(0, |m| m + 1);
        let class_names = (0..n_classes)
            .map(|c| class_names.get(&c).cloned().unwrap_or_else(|| c.to_string()))
            .collect();

        Ok(Self {
            config: DatasetConfig {
                id: "jsonl".to_string(),
                name: path
                    .file_stem()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "jsonl".to_string()),
                description: "Face images stored as JSON Lines records".to_string(),
                source: path.display().to_string(),
                format: "jsonl".to_string(),
                image_width,
                image_height,
                class_names,
            },
            samples,
        })
    }

    /// Generate synthetic faces whose mouth, brows and mouth opening vary by class
    pub fn load_synthetic(size: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n_classes = EXPRESSIONS.len();

        let samples = (0..size)
            .map(|i| {
                let label = rng.gen_range(0..n_classes);
                FaceSample {
                    id: format!("synthetic_{}", i),
                    label,
                    expression: Some(EXPRESSIONS[label].to_string()),
                    pixels: synthetic_face(SYNTHETIC_SIDE, label, n_classes, &mut rng),
                }
            })
            .collect();

        Self {
            config: DatasetConfig {
                id: "synthetic".to_string(),
                name: "Synthetic Faces".to_string(),
                description: "Generated cartoon faces for pipeline testing".to_string(),
                source: "generated".to_string(),
                format: "memory".to_string(),
                image_width: SYNTHETIC_SIDE,
                image_height: SYNTHETIC_SIDE,
                class_names: EXPRESSIONS.iter().map(|s| s.to_string()).collect(),
            },
            samples,
        }
    }

    /// Shuffle with `seed` and split 80/10/10 into train, validation and test
    pub fn split_data(&self, seed: u64) -> Result<DataSplits> {
        ensure!(!self.samples.is_empty(), "cannot split an empty dataset");
        let n_features = self.config.image_width * self.config.image_height;

        let mut order: Vec<&FaceSample> = self.samples.iter().collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        let n = order.len();
        let train_end = (n as f64 * 0.8) as usize;
        let val_end = (n as f64 * 0.9) as usize;

        let (train_x, train_y) = stack(&order[..train_end], n_features)?;
        let (val_x, val_y) = stack(&order[train_end..val_end], n_features)?;
        let (test_x, test_y) = stack(&order[val_end..], n_features)?;

        Ok(DataSplits {
            train_x,
            train_y,
            val_x,
            val_y,
            test_x,
            test_y,
            image_width: self.config.image_width,
            image_height: self.config.image_height,
        })
    }

    pub fn total_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn n_classes(&self) -> usize {
        self.config.class_names.len()
    }

    /// Count of samples per class index
    pub fn label_distribution(labels: &[usize]) -> BTreeMap<usize, usize> {
        let mut dist = BTreeMap::new();
        for &label in labels {
            *dist.entry(label).or_insert(0) += 1;
        }
        dist
    }
}

fn stack(samples: &[&FaceSample], n_features: usize) -> Result<(Array2<f64>, Vec<usize>)> {
    let mut flat = Vec::with_capacity(samples.len() * n_features);
    for sample in samples {
        ensure!(
            sample.pixels.len() == n_features,
            "sample {} has {} pixels, expected {}",
            sample.id,
            sample.pixels.len(),
            n_features
        );
        flat.extend_from_slice(&sample.pixels);
    }
    let x = Array2::from_shape_vec((samples.len(), n_features), flat)?;
    Ok((x, samples.iter().map(|s| s.label).collect()))
}

fn synthetic_face(side: usize, class: usize, n_classes: usize, rng: &mut ChaCha8Rng) -> Vec<f64> {
    let s = side as f64;
    let smile = class as f64 / (n_classes - 1).max(1) as f64 * 2.0 - 1.0;
    let brow = ((class * 3) % n_classes) as f64 / n_classes as f64 - 0.5;
    let open = if class % 2 == 0 { 0.0 } else { 0.04 };

    let mut pixels = Vec::with_capacity(side * side);
    for r in 0..side {
        for c in 0..side {
            let y = (r as f64 + 0.5) / s;
            let x = (c as f64 + 0.5) / s;

            let mut v: f64 = 0.15;
            if ((x - 0.5) / 0.4).powi(2) + ((y - 0.52) / 0.46).powi(2) <= 1.0 {
                v = 0.75;
            }
            for ex in [0.35, 0.65] {
                if (x - ex).powi(2) + (y - 0.42).powi(2) < 0.004 {
                    v = 0.1;
                }
                // Brows tilt toward or away from the nose
                let tilt = if ex < 0.5 { brow } else { -brow };
                if (x - ex).abs() < 0.1 && (y - (0.3 + tilt * (x - ex))).abs() < 0.03 {
                    v = 0.1;
                }
            }
            let mx = (x - 0.5) / 0.18;
            if mx.abs() < 1.0 {
                let mouth_y = 0.74 - smile * 0.1 * (1.0 - mx * mx);
                if (y - mouth_y).abs() < 0.03 + open {
                    v = 0.1;
                }
            }

            pixels.push((v + rng.gen_range(-0.08..0.08)).clamp(0.0, 1.0));
        }
    }
    pixels
}

fn image_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().copied().find(|&known| known == ext)
}

/// Decode any image format the `image` crate reads into 8-bit grayscale
/// scaled to [0, 1].
pub fn decode_grayscale(bytes: &[u8]) -> Result<(usize, usize, Vec<f64>)> {
    let gray = image::load_from_memory(bytes)?.to_luma8();
    let (width, height) = gray.dimensions();
    let pixels = gray.as_raw().iter().map(|&v| v as f64 / 255.0).collect();
    Ok((width as usize, height as usize, pixels))
}

struct HeaderReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    fn next_token(&mut self) -> Result<&'a str> {
        loop {
            match self.bytes.get(self.pos) {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'#') => {
                    while self.bytes.get(self.pos).map_or(false, |&b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let start = self.pos;
        while self.bytes.get(self.pos).map_or(false, |b| !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        ensure!(start < self.pos, "PGM data ended early");
        std::str::from_utf8(&self.bytes[start..self.pos]).context("PGM header is not ASCII")
    }

    fn next_usize(&mut self) -> Result<usize> {
        let token = self.next_token()?;
        token
            .parse()
            .with_context(|| format!("expected a number in PGM data, found '{}'", token))
    }
}

/// Decode a binary (P5) or ASCII (P2) PGM image into `(width, height, pixels)`
/// with intensities scaled to [0, 1].
pub fn parse_pgm(bytes: &[u8]) -> Result<(usize, usize, Vec<f64>)> {
    let mut reader = HeaderReader { bytes, pos: 0 };
    let magic = reader.next_token()?;
    let width = reader.next_usize()?;
    let height = reader.next_usize()?;
    let max_value = reader.next_usize()?;
    ensure!(width > 0 && height > 0, "PGM image has no pixels");
    ensure!(
        (1..=65535).contains(&max_value),
        "PGM maximum value {} is out of range",
        max_value
    );

    let count = width
        .checked_mul(height)
        .with_context(|| format!("PGM size {}x{} is too large", width, height))?;
    let scale = max_value as f64;
    let pixels = match magic {
        "P5" => {
            // A single whitespace byte separates the header from the raster
            let start = reader.pos + 1;
            let bytes_per_pixel = if max_value < 256 { 1 } else { 2 };
            let end = count
                .checked_mul(bytes_per_pixel)
                .and_then(|len| len.checked_add(start))
                .context("PGM raster size overflows")?;
            let raster = bytes.get(start..end).context("PGM pixel data is truncated")?;
            if bytes_per_pixel == 1 {
                raster.iter().map(|&b| b as f64 / scale).collect()
            } else {
                raster
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]) as f64 / scale)
                    .collect()
            }
        }
        "P2" => (0..count)
            .map(|_| reader.next_usize().map(|v| v as f64 / scale))
            .collect::<Result<Vec<_>>>()?,
        other => bail!("unsupported image format '{}' (expected P2 or P5 PGM)", other),
    };

    Ok((width, height, pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("face_eval_{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_synthetic_dataset() {
        let dataset = Dataset::load_synthetic(100, 42);

        assert_eq!(dataset.config.id, "synthetic");
        assert_eq!(dataset.total_samples(), 100);
        assert_eq!(dataset.n_classes(), 7);
        assert!(dataset.samples.iter().all(|s| s.pixels.len() == 625));
        assert!(dataset.samples.iter().flat_map(|s| &s.pixels).all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_synthetic_dataset_is_seeded() {
        let a = Dataset::load_synthetic(20, 7);
        let b = Dataset::load_synthetic(20, 7);
        let c = Dataset::load_synthetic(20, 8);

        assert_eq!(a.samples[3].pixels, b.samples[3].pixels);
        assert_ne!(
            a.samples.iter().map(|s| s.label).collect::<Vec<_>>(),
            c.samples.iter().map(|s| s.label).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_split_sizes() {
        let dataset = Dataset::load_synthetic(100, 42);
        let splits = dataset.split_data(42).unwrap();

        assert_eq!(splits.train_x.dim(), (80, 625));
        assert_eq!(splits.train_y.len(), 80);
        assert_eq!(splits.val_x.nrows(), 10);
        assert_eq!(splits.val_y.len(), 10);
        assert_eq!(splits.test_x.nrows(), 10);
        assert_eq!(splits.test_y.len(), 10);
        assert_eq!(splits.total_samples(), 100);
    }

    #[test]
    fn test_split_keeps_rows_and_labels_aligned() {
        let dataset = Dataset::load_synthetic(30, 1);
        let splits = dataset.split_data(9).unwrap();

        for (row, &label) in splits.test_x.rows().into_iter().zip(splits.test_y.iter()) {
            let source = dataset
                .samples
                .iter()
                .find(|s| s.pixels.as_slice() == row.as_slice().unwrap())
                .unwrap();
            assert_eq!(source.label, label);
        }
    }

    #[test]
    fn test_label_distribution() {
        let dist = Dataset::label_distribution(&[2, 0, 2, 2, 1]);
        assert_eq!(dist.get(&2), Some(&3));
        assert_eq!(dist.get(&0), Some(&1));
        assert_eq!(dist.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_ascii_pgm_with_comment() {
        let data = b"P2\n# a comment\n3 2\n255\n0 255 51\n102 153 204\n";
        let (w, h, pixels) = parse_pgm(data).unwrap();

        assert_eq!((w, h), (3, 2));
        assert_eq!(pixels.len(), 6);
        assert!((pixels[1] - 1.0).abs() < 1e-12);
        assert!((pixels[2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_parse_binary_pgm() {
        let mut data = b"P5 2 2 255\n".to_vec();
        data.extend_from_slice(&[0, 255, 128, 64]);
        let (w, h, pixels) = parse_pgm(&data).unwrap();

        assert_eq!((w, h), (2, 2));
        assert_eq!(pixels[0], 0.0);
        assert_eq!(pixels[1], 1.0);
    }

    #[test]
    fn test_parse_pgm_rejects_bad_input() {
        assert!(parse_pgm(b"P6 1 1 255\n\x00\x00\x00").is_err());
        assert!(parse_pgm(b"P5 4 4 255\n\x00\x01").is_err());
        assert!(parse_pgm(b"P2 2 1 255\n10").is_err());
    }

    #[test]
    fn test_parse_pgm_rejects_oversized_header() {
        assert!(parse_pgm(b"P5 18446744073709551615 2 255\n\x00").is_err());
        assert!(parse_pgm(b"P5 9223372036854775807 1 65535\n\x00").is_err());
        assert!(parse_pgm(b"P2 18446744073709551615 18446744073709551615 255\n0").is_err());
    }

    #[test]
    fn test_load_png_image_dir() {
        let root = temp_path("png_dir");
        for (class, value) in [("surprise", 200u8), ("fear", 50u8)] {
            let dir = root.join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..3 {
                let img = image::GrayImage::from_fn(3, 2, |x, _| image::Luma([if x == 0 { 0 } else { value }]));
                img.save(dir.join(format!("S00{}_001.png", i))).unwrap();
            }
        }

        let dataset = Dataset::load_dataset(&root).unwrap();
        assert_eq!(dataset.config.class_names, vec!["fear", "surprise"]);
        assert_eq!(dataset.total_samples(), 6);
        assert_eq!((dataset.config.image_width, dataset.config.image_height), (3, 2));

        let sample = dataset.samples.iter().find(|s| s.id == "surprise/S001_001").unwrap();
        assert_eq!(sample.label, 1);
        assert_eq!(sample.pixels[0], 0.0);
        assert!((sample.pixels[1] - 200.0 / 255.0).abs() < 1e-12);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_decode_grayscale_rejects_garbage() {
        assert!(decode_grayscale(b"not an image").is_err());
    }

    #[test]
    fn test_load_image_dir() {
        let root = temp_path("image_dir");
        for (class, value) in [("happy", 255u8), ("anger", 0u8)] {
            let dir = root.join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..2 {
                let mut bytes = b"P5 2 2 255\n".to_vec();
                bytes.extend_from_slice(&[value; 4]);
                std::fs::write(dir.join(format!("img{}.pgm", i)), bytes).unwrap();
            }
            std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        }

        let dataset = Dataset::load_dataset(&root).unwrap();
        assert_eq!(dataset.config.class_names, vec!["anger", "happy"]);
        assert_eq!(dataset.total_samples(), 4);
        assert_eq!((dataset.config.image_width, dataset.config.image_height), (2, 2));

        let happy = dataset.samples.iter().find(|s| s.id == "happy/img0").unwrap();
        assert_eq!(happy.label, 1);
        assert_eq!(happy.pixels, vec![1.0; 4]);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_load_jsonl() {
        let path = temp_path("faces.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"id": "a", "label": 1, "expression": "happy", "pixels": [0.0, 0.5, 0.5, 1.0]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"label": 0, "pixels": [1.0, 1.0, 0.0, 0.0]}}"#).unwrap();
        drop(file);

        let dataset = Dataset::load_dataset(&path).unwrap();
        assert_eq!(dataset.total_samples(), 2);
        assert_eq!((dataset.config.image_width, dataset.config.image_height), (2, 2));
        assert_eq!(dataset.config.class_names, vec!["0", "happy"]);
        assert_eq!(dataset.samples[0].id, "a");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_jsonl_rejects_mixed_sizes() {
        let path = temp_path("mixed.jsonl");
        std::fs::write(
            &path,
            "{\"label\": 0, \"pixels\": [0.0, 0.0, 0.0, 0.0]}\n{\"label\": 1, \"pixels\": [0.0]}\n",
        )
        .unwrap();

        assert!(Dataset::load_jsonl(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_jsonl_rejects_huge_label() {
        let path = temp_path("huge_label.jsonl");
        std::fs::write(&path, "{\"label\": 1000000000000000000, \"pixels\": [0, 0, 0, 0]}\n").unwrap();

        let err = Dataset::load_jsonl(&path).unwrap_err();
        assert!(err.to_string().contains("class limit"));
        std::fs::remove_file(&path).ok();
    }
}
