//! Greedy CTC decoding of recognition model output

use ndarray::ArrayView2;
use serde::Serialize;

use super::vocabulary::{Vocabulary, BLANK_INDEX};

/// Decoded text with the mean score of the emitted symbols
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedText {
    pub text: String,
    pub confidence: f32,
}

/// Best index and score per timestep
///
/// Ties go to the lowest index and NaN scores are skipped. A timestep with
/// no usable scores counts as blank.
pub fn argmax_indices(scores: ArrayView2<'_, f32>) -> Vec<(usize, f32)> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = (BLANK_INDEX, f32::NEG_INFINITY);
            for (idx, &val) in row.iter().enumerate() {
                if val > best.1 {
                    best = (idx, val);
                }
            }
            best
        })
        .collect()
}

/// Single pass over `items`: drop an item whose index repeats the
/// immediately preceding one, then drop blanks
fn collapse_by<T: Copy>(items: &[T], index: impl Fn(&T) -> usize) -> Vec<T> {
    let mut kept = Vec::with_capacity(items.len());
    let mut prev = None;
    for item in items {
        let idx = index(item);
        if prev != Some(idx) && idx != BLANK_INDEX {
            kept.push(*item);
        }
        prev = Some(idx);
    }
    kept
}

/// Drop repeats of the immediately preceding index, then drop blanks
pub fn collapse(indices: &[usize]) -> Vec<usize> {
    collapse_by(indices, |&idx| idx)
}

/// Decode a (timesteps x vocabulary) score matrix into text
pub fn greedy_decode(scores: ArrayView2<'_, f32>, vocabulary: &Vocabulary) -> DecodedText {
    let best = argmax_indices(scores);

    let mut text = String::new();
    let mut score_sum = 0.0f32;
    let mut emitted = 0usize;

    for (idx, score) in collapse_by(&best, |&(idx, _)| idx) {
        // Indices past the vocabulary contribute nothing
        if let Some(symbol) = vocabulary.symbol(idx) {
            text.push_str(symbol);
            score_sum += score;
            emitted += 1;
        }
    }

    let confidence = if emitted == 0 {
        0.0
    } else {
        score_sum / emitted as f32
    };

    DecodedText { text, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// One-hot score matrix picking `indices` over a vocabulary of `width`
    fn one_hot(indices: &[usize], width: usize) -> Array2<f32> {
        let mut scores = Array2::<f32>::zeros((indices.len(), width));
        for (t, &idx) in indices.iter().enumerate() {
            scores[[t, idx]] = 0.9;
        }
        scores
    }

    fn abc() -> Vocabulary {
        Vocabulary::from_entries(["A", "B"])
    }

    #[test]
    fn test_collapse_keeps_repeats_across_blank() {
        assert_eq!(collapse(&[0, 0, 5, 5, 0, 5, 0]), vec![5, 5]);
        assert_eq!(collapse(&[5, 0, 5]), vec![5, 5]);
        assert_eq!(collapse(&[1, 1, 0, 2]), vec![1, 2]);
        assert!(collapse(&[]).is_empty());
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        let scores = Array2::from_shape_vec((2, 3), vec![0.2, 0.4, 0.4, 0.5, 0.5, 0.5]).unwrap();

        let best = argmax_indices(scores.view());
        assert_eq!(best[0].0, 1);
        assert_eq!(best[1].0, 0);
    }

    #[test]
    fn test_argmax_skips_nan() {
        let nan = f32::NAN;
        let scores = Array2::from_shape_vec((3, 3), vec![nan, 0.1, 0.3, 0.2, nan, 0.1, nan, nan, nan]).unwrap();

        let best: Vec<usize> = argmax_indices(scores.view()).into_iter().map(|(idx, _)| idx).collect();
        assert_eq!(best, vec![2, 0, 0]);
    }

    #[test]
    fn test_nan_blank_score_does_not_hide_symbol() {
        let scores = Array2::from_shape_vec((2, 4), vec![f32::NAN, 0.8, 0.1, 0.0, f32::NAN, 0.0, 0.9, 0.0]).unwrap();
        let decoded = greedy_decode(scores.view(), &abc());

        assert_eq!(decoded.text, "AB");
        assert!((decoded.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_decoder_follows_collapse() {
        let vocab = Vocabulary::from_entries(["v", "w", "x", "y", "A"]);
        for raw in [vec![0, 0, 5, 5, 0, 5, 0], vec![5, 0, 5], vec![5, 5, 5], vec![1, 1, 0, 2, 2, 3]] {
            let expected: String = collapse(&raw)
                .into_iter()
                .map(|idx| vocab.symbol(idx).unwrap())
                .collect();
            let scores = one_hot(&raw, vocab.len());
            assert_eq!(greedy_decode(scores.view(), &vocab).text, expected, "raw {:?}", raw);
        }
    }

    #[test]
    fn test_argmax_handles_negative_logits() {
        let scores = Array2::from_shape_vec((1, 3), vec![-3.0, -1.0, -2.0]).unwrap();
        assert_eq!(argmax_indices(scores.view()), vec![(1, -1.0)]);
    }

    #[test]
    fn test_end_to_end_sequence() {
        let scores = one_hot(&[1, 1, 0, 2], 4);
        let decoded = greedy_decode(scores.view(), &abc());

        assert_eq!(decoded.text, "AB");
        assert!((decoded.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_repeat_across_blank_decodes_twice() {
        let vocab = Vocabulary::from_entries(["v", "w", "x", "y", "A"]);
        let scores = one_hot(&[0, 0, 5, 5, 0, 5, 0], vocab.len());

        assert_eq!(greedy_decode(scores.view(), &vocab).text, "AA");
    }

    #[test]
    fn test_all_blank_is_empty() {
        let scores = one_hot(&[0, 0, 0, 0], 4);
        let decoded = greedy_decode(scores.view(), &abc());

        assert_eq!(decoded.text, "");
        assert_eq!(decoded.confidence, 0.0);
    }

    #[test]
    fn test_trailing_space_symbol() {
        let scores = one_hot(&[1, 3, 2], 4);
        assert_eq!(greedy_decode(scores.view(), &abc()).text, "A B");
    }

    #[test]
    fn test_out_of_range_index_contributes_nothing() {
        // Model emits 6 classes, vocabulary only has 4
        let scores = one_hot(&[1, 5, 2], 6);
        assert_eq!(greedy_decode(scores.view(), &abc()).text, "AB");
    }

    #[test]
    fn test_deterministic() {
        let scores = Array2::from_shape_fn((16, 4), |(t, v)| ((t * 7 + v * 3) % 5) as f32);
        let vocab = abc();

        let first = greedy_decode(scores.view(), &vocab);
        let second = greedy_decode(scores.view(), &vocab);
        assert_eq!(first, second);
        assert!(first.text.chars().count() <= 16);
    }
}
