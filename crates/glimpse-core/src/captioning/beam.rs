//! Beam search decoding.
//!
//! Model-agnostic: the caller supplies a step function that maps the current
//! set of live sequences to next-token logits, one row per sequence.

use std::cmp::Ordering;

/// Beam search parameters.
#[derive(Debug, Clone)]
pub struct BeamConfig {
    /// Number of hypotheses kept alive per step
    pub num_beams: usize,
    /// Maximum sequence length, prompt included
    pub max_length: usize,
    /// Token that terminates a hypothesis
    pub eos_token_id: i64,
    /// Exponent applied to the sequence length when ranking finished hypotheses
    pub length_penalty: f32,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<i64>,
    score: f32,
}

/// Run beam search from `prompt` and return the generated tokens of the best
/// hypothesis (prompt and EOS excluded).
///
/// `step` receives every live sequence (all the same length) and must return
/// the logits for the next token of each, in the same order.
pub fn beam_search<E, F>(config: &BeamConfig, prompt: Vec<i64>, mut step: F) -> Result<Vec<i64>, E>
where
    F: FnMut(&[Vec<i64>]) -> Result<Vec<Vec<f32>>, E>,
{
    let prompt_len = prompt.len();
    let num_beams = config.num_beams.max(1);
    let normalize = |tokens: &[i64], score: f32| {
        score / (tokens.len().max(1) as f32).powf(config.length_penalty)
    };

    let mut live = vec![Hypothesis {
        tokens: prompt,
        score: 0.0,
    }];
    let mut finished: Vec<Hypothesis> = Vec::new();

    while live[0].tokens.len() < config.max_length {
        let sequences: Vec<Vec<i64>> = live.iter().map(|h| h.tokens.clone()).collect();
        let logits = step(&sequences)?;

        // Each live beam proposes its 2k best continuations so that at least
        // k non-EOS candidates always survive.
        let mut candidates: Vec<(f32, usize, i64)> = Vec::new();
        for (beam, row) in logits.iter().enumerate().take(live.len()) {
            let log_probs = log_softmax(row);
            for (token, log_prob) in top_k(&log_probs, 2 * num_beams) {
                candidates.push((live[beam].score + log_prob, beam, token as i64));
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut next = Vec::with_capacity(num_beams);
        for (rank, (score, beam, token)) in candidates.into_iter().enumerate() {
            if token == config.eos_token_id {
                if rank < num_beams {
                    let tokens = live[beam].tokens.clone();
                    let score = normalize(&tokens, score);
                    finished.push(Hypothesis { tokens, score });
                }
            } else {
                let mut tokens = live[beam].tokens.clone();
                tokens.push(token);
                next.push(Hypothesis { tokens, score });
            }
            if next.len() == num_beams {
                break;
            }
        }

        finished.sort_by(|a, b| b.score.total_cmp(&a.score));
        finished.truncate(num_beams);

        if next.is_empty() {
            live.clear();
            break;
        }
        live = next;

        if finished.len() >= num_beams {
            let best_live = normalize(&live[0].tokens, live[0].score);
            let worst_finished = finished[finished.len() - 1].score;
            if best_live <= worst_finished {
                live.clear();
                break;
            }
        }
    }

    // Hypotheses still alive at max_length compete with the finished ones.
    for hyp in live {
        let score = normalize(&hyp.tokens, hyp.score);
        finished.push(Hypothesis {
            tokens: hyp.tokens,
            score,
        });
    }

    let best = finished
        .into_iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
        .map(|h| h.tokens)
        .unwrap_or_default();

    Ok(best.into_iter().skip(prompt_len).collect())
}

/// Numerically stable log-softmax.
fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let log_sum = logits.iter().map(|&x| (x - max).exp()).sum::<f32>().ln();
    logits.iter().map(|&x| x - max - log_sum).collect()
}

/// Indices and values of the `k` largest entries, descending.
fn top_k(values: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = values.iter().copied().enumerate().collect();
    let k = k.min(indexed.len());
    if k == 0 {
        return Vec::new();
    }
    indexed.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed
}
