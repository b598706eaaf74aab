use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use roxmltree::Node;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("failed to read cascade {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid cascade: {0}")]
    Format(String),
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
}

fn format_err(msg: impl Into<String>) -> CascadeError {
    CascadeError::Format(msg.into())
}

/// One weighted rectangle of a Haar feature, in base-window coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
struct WeightedRect {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    weight: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct HaarFeature {
    rects: Vec<WeightedRect>,
}

/// Tree node. Non-positive child values index `leaves` (negated).
#[derive(Clone, Copy, Debug, PartialEq)]
struct TreeNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct WeakClassifier {
    nodes: Vec<TreeNode>,
    leaves: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
struct Stage {
    threshold: f64,
    classifiers: Vec<WeakClassifier>,
}

/// A boosted Haar cascade in OpenCV's `opencv-cascade-classifier` XML layout.
///
/// Only upright (non-tilted) HAAR features with BOOST stages are supported,
/// which covers the stock frontal-face and eye cascades.
#[derive(Clone, Debug, PartialEq)]
pub struct HaarCascade {
    window_width: usize,
    window_height: usize,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    pub fn load(path: &Path) -> Result<Self, CascadeError> {
        let text = fs::read_to_string(path).map_err(|source| CascadeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_xml(&text)
    }

    pub fn from_xml(text: &str) -> Result<Self, CascadeError> {
        let doc = roxmltree::Document::parse(text)?;
        let cascade = doc
            .descendants()
            .find(|n| n.has_tag_name("cascade"))
            .ok_or_else(|| {
                CascadeError::Unsupported("no <cascade> element (old-style cascade?)".into())
            })?;

        let stage_type = child_text(cascade, "stageType")?;
        if stage_type != "BOOST" {
            return Err(CascadeError::Unsupported(format!("stage type {stage_type}")));
        }
        let feature_type = child_text(cascade, "featureType")?;
        if feature_type != "HAAR" {
            return Err(CascadeError::Unsupported(format!(
                "feature type {feature_type}"
            )));
        }

        let window_width: usize = parse_one(child_text(cascade, "width")?)?;
        let window_height: usize = parse_one(child_text(cascade, "height")?)?;
        if window_width < 3 || window_height < 3 {
            return Err(format_err("window must be at least 3x3"));
        }

        let stages = items(child(cascade, "stages")?)
            .map(parse_stage)
            .collect::<Result<Vec<_>, _>>()?;
        let features = items(child(cascade, "features")?)
            .map(|n| parse_feature(n, window_width, window_height))
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err(format_err("cascade has no stages"));
        }
        let max_feature = stages
            .iter()
            .flat_map(|s| &s.classifiers)
            .flat_map(|c| &c.nodes)
            .map(|n| n.feature)
            .max()
            .unwrap_or(0);
        if max_feature >= features.len() {
            return Err(format_err(format!(
                "node references feature {max_feature} but only {} defined",
                features.len()
            )));
        }

        Ok(Self {
            window_width,
            window_height,
            stages,
            features,
        })
    }

    /// Base detection window `(width, height)`.
    pub fn window_size(&self) -> (usize, usize) {
        (self.window_width, self.window_height)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs every stage on the window whose top-left corner is `(x, y)`.
    ///
    /// The caller guarantees the window lies inside the integral image.
    pub fn accepts(&self, ii: &IntegralImages, x: usize, y: usize) -> bool {
        let inner_w = self.window_width - 2;
        let inner_h = self.window_height - 2;
        let area = (inner_w * inner_h) as f64;
        let sum = ii.sum(x + 1, y + 1, inner_w, inner_h) as f64;
        let sq_sum = ii.sq_sum(x + 1, y + 1, inner_w, inner_h) as f64;
        let nf = area * sq_sum - sum * sum;
        let nf = if nf > 0.0 { nf.sqrt() } else { 1.0 };

        self.stages.iter().all(|stage| {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|c| self.classify(c, ii, x, y, nf))
                .sum();
            score >= stage.threshold
        })
    }

    fn classify(&self, c: &WeakClassifier, ii: &IntegralImages, x: usize, y: usize, nf: f64) -> f64 {
        let mut idx = 0i32;
        loop {
            let node = &c.nodes[idx as usize];
            let value = self.feature_value(node.feature, ii, x, y);
            idx = if value < node.threshold * nf {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return c.leaves[(-idx) as usize];
            }
        }
    }

    fn feature_value(&self, feature: usize, ii: &IntegralImages, x: usize, y: usize) -> f64 {
        self.features[feature]
            .rects
            .iter()
            .map(|r| r.weight * ii.sum(x + r.x, y + r.y, r.width, r.height) as f64)
            .sum()
    }
}

/// Summed-area tables for pixel values and their squares.
pub struct IntegralImages {
    sum: Array2<i64>,
    sq_sum: Array2<i64>,
}

impl IntegralImages {
    pub fn new(gray: &[u8], width: usize, height: usize) -> Self {
        debug_assert_eq!(gray.len(), width * height);
        let mut sum = Array2::<i64>::zeros((height + 1, width + 1));
        let mut sq_sum = Array2::<i64>::zeros((height + 1, width + 1));
        for y in 0..height {
            let mut row_sum = 0i64;
            let mut row_sq = 0i64;
            for x in 0..width {
                let v = gray[y * width + x] as i64;
                row_sum += v;
                row_sq += v * v;
                sum[[y + 1, x + 1]] = sum[[y, x + 1]] + row_sum;
                sq_sum[[y + 1, x + 1]] = sq_sum[[y, x + 1]] + row_sq;
            }
        }
        Self { sum, sq_sum }
    }

    pub fn sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        rect_sum(&self.sum, x, y, w, h)
    }

    pub fn sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        rect_sum(&self.sq_sum, x, y, w, h)
    }
}

fn rect_sum(table: &Array2<i64>, x: usize, y: usize, w: usize, h: usize) -> i64 {
    table[[y + h, x + w]] - table[[y, x + w]] - table[[y + h, x]] + table[[y, x]]
}

// ── XML helpers ──────────────────────────────────────────────────────

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Result<Node<'a, 'i>, CascadeError> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| format_err(format!("missing <{name}>")))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, CascadeError> {
    Ok(child(node, name)?.text().unwrap_or("").trim())
}

/// The anonymous `<_>` list entries under a node.
fn items<'a, 'i: 'a>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(|n| n.is_element())
}

fn parse_one<T: std::str::FromStr>(text: &str) -> Result<T, CascadeError> {
    text.trim()
        .parse()
        .map_err(|_| format_err(format!("bad number {text:?}")))
}

fn parse_numbers(text: &str) -> Result<Vec<f64>, CascadeError> {
    text.split_whitespace().map(parse_one).collect()
}

fn parse_stage(node: Node<'_, '_>) -> Result<Stage, CascadeError> {
    let threshold = parse_one(child_text(node, "stageThreshold")?)?;
    let classifiers = items(child(node, "weakClassifiers")?)
        .map(parse_weak_classifier)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage {
        threshold,
        classifiers,
    })
}

fn parse_weak_classifier(node: Node<'_, '_>) -> Result<WeakClassifier, CascadeError> {
    let raw_nodes = parse_numbers(child_text(node, "internalNodes")?)?;
    let leaves = parse_numbers(child_text(node, "leafValues")?)?;
    if raw_nodes.is_empty() || raw_nodes.len() % 4 != 0 {
        return Err(format_err("internalNodes must hold groups of 4 values"));
    }

    let nodes: Vec<TreeNode> = raw_nodes
        .chunks_exact(4)
        .map(|n| TreeNode {
            left: n[0] as i32,
            right: n[1] as i32,
            feature: n[2] as usize,
            threshold: n[3],
        })
        .collect();

    for n in &nodes {
        for child in [n.left, n.right] {
            let in_range = if child <= 0 {
                ((-child) as usize) < leaves.len()
            } else {
                (child as usize) < nodes.len()
            };
            if !in_range {
                return Err(format_err(format!("tree child {child} out of range")));
            }
        }
    }

    Ok(WeakClassifier { nodes, leaves })
}

fn parse_feature(
    node: Node<'_, '_>,
    window_width: usize,
    window_height: usize,
) -> Result<HaarFeature, CascadeError> {
    if let Ok(tilted) = child_text(node, "tilted") {
        if tilted != "0" {
            return Err(CascadeError::Unsupported("tilted Haar features".into()));
        }
    }

    let rects = items(child(node, "rects")?)
        .map(|r| {
            let v = parse_numbers(r.text().unwrap_or(""))?;
            if v.len() != 5 {
                return Err(format_err("feature rect needs 5 values"));
            }
            let rect = WeightedRect {
                x: v[0] as usize,
                y: v[1] as usize,
                width: v[2] as usize,
                height: v[3] as usize,
                weight: v[4],
            };
            if v[..4].iter().any(|&c| c < 0.0)
                || rect.x + rect.width > window_width
                || rect.y + rect.height > window_height
            {
                return Err(format_err("feature rect outside the detection window"));
            }
            Ok(rect)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rects.is_empty() {
        return Err(format_err("feature without rects"));
    }
    Ok(HaarFeature { rects })
}
