use roster_source::{PixelRect, RawDetection};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Max vertical center offset, in line heights, for tokens on one line
const SAME_LINE_TOLERANCE: f64 = 0.5;
/// Max horizontal gap, in line heights, between words of one label
const WORD_GAP: f64 = 0.8;
/// Max vertical gap, in line heights, between wrapped lines of one label
const WRAP_GAP: f64 = 0.6;
/// Max center offset, in label widths, for wrapped lines
const WRAP_CENTER_TOLERANCE: f64 = 0.5;

/// A single on-screen label assembled from one or more OCR tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCluster {
    pub text: String,
    pub bounds: PixelRect,
    pub token_count: usize,
}

impl TextCluster {
    pub fn center(&self) -> (f64, f64) {
        self.bounds.center()
    }

    /// Digits with optional separators, e.g. a power rating "12,345"
    pub fn is_numeric(&self) -> bool {
        self.text.chars().any(|c| c.is_ascii_digit())
            && self
                .text
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | ' ' | '\''))
    }

    pub fn has_letter(&self) -> bool {
        self.text.chars().any(|c| c.is_alphabetic())
    }

    /// Parse the numeric value, ignoring thousands separators
    pub fn numeric_value(&self) -> Option<u32> {
        if !self.is_numeric() {
            return None;
        }
        let digits: String = self.text.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    fn merge(&self, other: &TextCluster, text: String) -> TextCluster {
        TextCluster {
            text,
            bounds: self.bounds.union(&other.bounds),
            token_count: self.token_count + other.token_count,
        }
    }
}

/// Cluster raw OCR tokens into labels.
///
/// Tokens on the same text line separated by a word-sized gap are joined,
/// then a label wrapped onto a second centered line is joined with its
/// first line. Numeric tokens never merge with alphabetic ones.
pub fn normalize_detections(detections: &[RawDetection]) -> Vec<TextCluster> {
    let mut clusters: Vec<TextCluster> = detections
        .iter()
        .filter_map(|d| {
            let text = d.text.trim();
            let bounds = d.bounds();
            if text.is_empty() || bounds.height == 0 {
                return None;
            }
            Some(TextCluster {
                text: text.to_string(),
                bounds,
                token_count: 1,
            })
        })
        .collect();

    let token_count = clusters.len();

    merge_until_stable(&mut clusters, |a, b| {
        if !same_line(a, b) || a.is_numeric() != b.is_numeric() {
            return None;
        }
        let line_h = a.bounds.height.max(b.bounds.height) as f64;
        let gap = a.bounds.x.max(b.bounds.x) - a.bounds.right().min(b.bounds.right());
        if gap as f64 > WORD_GAP * line_h {
            return None;
        }
        let (left, right) = if a.bounds.x <= b.bounds.x { (a, b) } else { (b, a) };
        Some(a.merge(b, format!("{} {}", left.text, right.text)))
    });

    merge_until_stable(&mut clusters, |a, b| {
        if a.is_numeric() || b.is_numeric() {
            return None;
        }
        let (top, bottom) = if a.bounds.y <= b.bounds.y { (a, b) } else { (b, a) };
        let line_h = top.bounds.height.max(bottom.bounds.height) as f64;
        let gap = bottom.bounds.y - top.bounds.bottom();
        if gap < 0 || gap as f64 > WRAP_GAP * line_h {
            return None;
        }
        let width = top.bounds.width.max(bottom.bounds.width) as f64;
        if (top.center().0 - bottom.center().0).abs() > WRAP_CENTER_TOLERANCE * width {
            return None;
        }
        Some(a.merge(b, format!("{} {}", top.text, bottom.text)))
    });

    clusters.sort_by(|a, b| {
        a.bounds
            .y
            .cmp(&b.bounds.y)
            .then_with(|| a.bounds.x.cmp(&b.bounds.x))
    });

    debug!(
        "Normalized {} token(s) into {} cluster(s)",
        token_count,
        clusters.len()
    );
    clusters
}

fn same_line(a: &TextCluster, b: &TextCluster) -> bool {
    let line_h = a.bounds.height.max(b.bounds.height) as f64;
    (a.center().1 - b.center().1).abs() <= SAME_LINE_TOLERANCE * line_h
}

/// Repeatedly merge the first mergeable pair until none remain
fn merge_until_stable<F>(clusters: &mut Vec<TextCluster>, try_merge: F)
where
    F: Fn(&TextCluster, &TextCluster) -> Option<TextCluster>,
{
    'outer: loop {
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                if let Some(merged) = try_merge(&clusters[i], &clusters[j]) {
                    clusters[i] = merged;
                    clusters.remove(j);
                    continue 'outer;
                }
            }
        }
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_on_one_line_merge() {
        let dets = vec![
            RawDetection::from_rect("Doom", 48.0, 100.0, 30.0, 10.0),
            RawDetection::from_rect("Dr", 40.0, 101.0, 12.0, 10.0),
        ];
        let clusters = normalize_detections(&dets);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].text, "Dr Doom");
        assert_eq!(clusters[0].token_count, 2);
    }

    #[test]
    fn test_distant_labels_stay_apart() {
        let dets = vec![
            RawDetection::from_rect("Hulk", 10.0, 100.0, 30.0, 10.0),
            RawDetection::from_rect("Thor", 110.0, 100.0, 30.0, 10.0),
        ];
        let clusters = normalize_detections(&dets);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].text, "Hulk");
        assert_eq!(clusters[1].text, "Thor");
    }

    #[test]
    fn test_wrapped_label_merges() {
        let dets = vec![
            RawDetection::from_rect("Doctor", 10.0, 100.0, 40.0, 10.0),
            RawDetection::from_rect("Strange", 8.0, 113.0, 44.0, 10.0),
        ];
        let clusters = normalize_detections(&dets);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].text, "Doctor Strange");
    }

    #[test]
    fn test_numeric_does_not_merge_with_name() {
        let dets = vec![
            RawDetection::from_rect("Hulk", 10.0, 100.0, 30.0, 10.0),
            RawDetection::from_rect("12,345", 10.0, 113.0, 36.0, 10.0),
        ];
        let clusters = normalize_detections(&dets);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[1].numeric_value(), Some(12345));
        assert!(clusters[0].has_letter());
    }

    #[test]
    fn test_blank_tokens_dropped() {
        let dets = vec![RawDetection::from_rect("   ", 0.0, 0.0, 10.0, 10.0)];
        assert!(normalize_detections(&dets).is_empty());
    }
}
