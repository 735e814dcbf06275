//! Inference transcript scraping.
//!
//! Two generations of the on-device engine produce different timing output.
//! The verbose dialect prints per-phase timing lines:
//!
//! ```text
//! llama_print_timings: prompt eval time =   500.00 ms /  10 tokens (  50.00 ms per token,  20.00 tokens per second)
//! llama_print_timings:        eval time =  3200.00 ms / 128 tokens (  25.00 ms per token,  40.00 tokens per second)
//! llama_print_timings:       total time =  3700.00 ms
//! ```
//!
//! The compact dialect only reports aggregate figures:
//!
//! ```text
//! prefill time: 512
//! decode time: 3187
//! 40.12 tokens/s
//! ```
//!
//! Each rule is applied independently; a line the transcript lacks leaves
//! its field at the default instead of failing the others.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use wattburn_core::{InferenceMetrics, TtftStrategy};

static PROMPT_EVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"prompt eval time\s*=\s*([0-9.]+)\s*ms\s*/\s*([0-9]+)\s*tokens\s*\(\s*([0-9.]+)\s*ms per token,\s*([0-9.]+)\s*tokens per second",
    )
    .unwrap()
});

// The generation line shares the `eval time` substring with the prompt
// line, so the text before the label is captured and checked instead of
// relying on rule order (the regex crate has no lookbehind).
static EVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(.*?)eval time\s*=\s*([0-9.]+)\s*ms\s*/\s*([0-9]+)\s*tokens\s*\(\s*([0-9.]+)\s*ms per token,\s*([0-9.]+)\s*tokens per second",
    )
    .unwrap()
});

static TOTAL_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"total time\s*=\s*([0-9.]+)\s*ms").unwrap());

static COMPACT_PREFILL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"prefill time:\s*([0-9]+(?:\.[0-9]+)?)").unwrap());

static COMPACT_DECODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"decode time:\s*([0-9]+(?:\.[0-9]+)?)").unwrap());

static COMPACT_TPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+\.[0-9]+)\s+tokens/s").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Verbose,
    Compact,
}

/// Raw quantities pulled from the transcript before normalization.
/// `None` marks a rule that found nothing, as opposed to a parsed zero.
#[derive(Debug, Clone, Copy, Default)]
struct RawTimings {
    prefill_ms: Option<f64>,
    input_tokens: Option<u32>,
    prompt_tps: Option<f64>,
    generation_ms: Option<f64>,
    output_tokens: Option<u32>,
    decode_ms_per_token: Option<f64>,
    gen_tps: Option<f64>,
    total_ms: Option<f64>,
}

impl RawTimings {
    fn is_usable(&self) -> bool {
        self.prefill_ms.is_some()
            || self.generation_ms.is_some()
            || self.total_ms.is_some()
            || self.gen_tps.is_some()
    }
}

fn capture_f64(caps: &regex::Captures<'_>, idx: usize) -> Option<f64> {
    caps.get(idx)?.as_str().parse().ok()
}

fn capture_u32(caps: &regex::Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

fn extract_verbose(transcript: &str) -> RawTimings {
    let mut raw = RawTimings::default();

    if let Some(caps) = PROMPT_EVAL_RE.captures(transcript) {
        raw.prefill_ms = capture_f64(&caps, 1);
        raw.input_tokens = capture_u32(&caps, 2);
        raw.prompt_tps = capture_f64(&caps, 4);
    }

    for caps in EVAL_RE.captures_iter(transcript) {
        let preceding = caps.get(1).map_or("", |m| m.as_str());
        if preceding.trim_end().ends_with("prompt") {
            continue; // already claimed by the prefill rule
        }
        raw.generation_ms = capture_f64(&caps, 2);
        raw.output_tokens = capture_u32(&caps, 3);
        raw.decode_ms_per_token = capture_f64(&caps, 4);
        raw.gen_tps = capture_f64(&caps, 5);
        break;
    }

    if let Some(caps) = TOTAL_TIME_RE.captures(transcript) {
        raw.total_ms = capture_f64(&caps, 1);
    }

    raw
}

fn extract_compact(transcript: &str) -> RawTimings {
    let mut raw = RawTimings::default();

    if let Some(caps) = COMPACT_PREFILL_RE.captures(transcript) {
        raw.prefill_ms = capture_f64(&caps, 1);
    }
    if let Some(caps) = COMPACT_DECODE_RE.captures(transcript) {
        raw.generation_ms = capture_f64(&caps, 1);
    }
    if let Some(caps) = COMPACT_TPS_RE.captures(transcript) {
        raw.gen_tps = capture_f64(&caps, 1);
    }

    raw
}

#[derive(Debug, Clone)]
pub struct TranscriptParser {
    ttft_strategy: TtftStrategy,
}

impl TranscriptParser {
    pub fn new(ttft_strategy: TtftStrategy) -> Self {
        Self { ttft_strategy }
    }

    /// Which dialect the transcript would be read as, if any.
    ///
    /// Verbose is tried first: its timing lines are a superset, and the
    /// compact throughput pattern would also hit a verbose transcript.
    pub fn detect_dialect(transcript: &str) -> Option<Dialect> {
        if extract_verbose(transcript).is_usable() {
            Some(Dialect::Verbose)
        } else if extract_compact(transcript).is_usable() {
            Some(Dialect::Compact)
        } else {
            None
        }
    }

    /// Scrape timing metrics from one transcript. Infallible: fields whose
    /// rule found no line stay at zero.
    pub fn parse(&self, transcript: &str) -> InferenceMetrics {
        let verbose = extract_verbose(transcript);
        let raw = if verbose.is_usable() {
            verbose
        } else {
            let compact = extract_compact(transcript);
            if !compact.is_usable() {
                debug!("no timing lines recognized in transcript");
            }
            compact
        };

        let prefill_latency_s = raw.prefill_ms.unwrap_or(0.0) / 1000.0;
        let generation_latency_s = raw.generation_ms.unwrap_or(0.0) / 1000.0;
        let inference_latency_s = match raw.total_ms {
            Some(total) => total / 1000.0,
            None => prefill_latency_s + generation_latency_s,
        };

        let gen_tps = raw.gen_tps.unwrap_or(0.0);
        let decode_step_s = self.decode_step_s(gen_tps, raw.decode_ms_per_token);

        InferenceMetrics {
            input_token_count: raw.input_tokens.unwrap_or(0),
            output_token_count: raw.output_tokens.unwrap_or(0),
            prefill_latency_s,
            generation_latency_s,
            inference_latency_s,
            prompt_tps: raw.prompt_tps.unwrap_or(0.0),
            gen_tps,
            time_to_first_token_s: prefill_latency_s + decode_step_s,
            model_response: String::new(),
        }
    }

    /// Duration of one decode step, the part of TTFT past prefill. Each
    /// strategy falls back to the other's datum when its own is missing.
    fn decode_step_s(&self, gen_tps: f64, decode_ms_per_token: Option<f64>) -> f64 {
        let from_tps = (gen_tps > 0.0).then(|| 1.0 / gen_tps);
        let from_per_token = decode_ms_per_token.map(|ms| ms / 1000.0);

        match self.ttft_strategy {
            TtftStrategy::ReciprocalThroughput => from_tps.or(from_per_token),
            TtftStrategy::PerTokenTiming => from_per_token.or(from_tps),
        }
        .unwrap_or(0.0)
    }
}

impl Default for TranscriptParser {
    fn default() -> Self {
        Self::new(TtftStrategy::default())
    }
}
