use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stroop_core::{Condition, ResponseRecord};

/// Per-condition statistics. Mean/SD use correct trials only; accuracy and N
/// are computed over every record of the condition, timeouts included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStats {
    pub mean_rt: Option<f64>,
    pub sd_rt: Option<f64>,
    pub accuracy: Option<f64>,
    pub n: usize,
}

/// Derived session-level summary. Pure function of the finalized record
/// lists; recomputing from the same inputs yields the same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub participant_id: String,
    pub date: String,
    pub timestamp: DateTime<Utc>,
    pub positive: ConditionStats,
    pub negative: ConditionStats,
    pub neutral: ConditionStats,
    /// negative − neutral mean correct RT, when both are defined.
    pub interference_negative: Option<f64>,
    /// positive − neutral mean correct RT, when both are defined.
    pub interference_positive: Option<f64>,
    pub rt_overall_mean: Option<f64>,
    pub acc_overall: Option<f64>,
    pub n_total: usize,
    pub practice_acc: Option<f64>,
    pub practice_rt_mean: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
}

pub fn summarize(
    experimental: &[ResponseRecord],
    practice: &[ResponseRecord],
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
) -> SessionSummary {
    let by_condition = |condition: Condition| -> ConditionStats {
        let records: Vec<&ResponseRecord> = experimental
            .iter()
            .filter(|r| r.condition == condition)
            .collect();
        let correct_rts: Vec<f64> = records
            .iter()
            .filter(|r| r.is_correct())
            .map(|r| r.rt_seconds)
            .collect();
        ConditionStats {
            mean_rt: mean(&correct_rts).map(round4),
            sd_rt: sample_sd(&correct_rts).map(round4),
            accuracy: accuracy(&records).map(round4),
            n: records.len(),
        }
    };

    let positive = by_condition(Condition::Positive);
    let negative = by_condition(Condition::Negative);
    let neutral = by_condition(Condition::Neutral);

    let interference = |cond_mean: Option<f64>| match (cond_mean, neutral.mean_rt) {
        (Some(c), Some(n)) => Some(round4(c - n)),
        _ => None,
    };
    let interference_negative = interference(negative.mean_rt);
    let interference_positive = interference(positive.mean_rt);

    let all_correct_rts: Vec<f64> = experimental
        .iter()
        .filter(|r| r.is_correct())
        .map(|r| r.rt_seconds)
        .collect();
    let all_refs: Vec<&ResponseRecord> = experimental.iter().collect();
    let practice_refs: Vec<&ResponseRecord> = practice.iter().collect();
    let practice_correct_rts: Vec<f64> = practice
        .iter()
        .filter(|r| r.is_correct())
        .map(|r| r.rt_seconds)
        .collect();

    SessionSummary {
        participant_id: experimental
            .first()
            .or(practice.first())
            .map(|r| r.participant_id.clone())
            .unwrap_or_default(),
        date: ended_at.format("%Y-%m-%d").to_string(),
        timestamp: ended_at,
        positive,
        negative,
        neutral,
        interference_negative,
        interference_positive,
        rt_overall_mean: mean(&all_correct_rts).map(round4),
        acc_overall: accuracy(&all_refs).map(round4),
        n_total: experimental.len(),
        practice_acc: accuracy(&practice_refs).map(round4),
        practice_rt_mean: mean(&practice_correct_rts).map(round4),
        started_at,
        ended_at,
        duration_secs: round4((ended_at - started_at).num_milliseconds() as f64 / 1000.0),
    }
}

/// Flattens the summary plus the raw per-trial data into the ordered
/// (header, value) columns of the one-row-per-session export.
pub fn summary_row(
    summary: &SessionSummary,
    experimental: &[ResponseRecord],
    practice: &[ResponseRecord],
) -> Vec<(String, String)> {
    let mut row: Vec<(String, String)> = Vec::new();
    let mut push = |name: &str, value: String| row.push((name.to_owned(), value));

    push("participant_id", summary.participant_id.clone());
    push("date", summary.date.clone());
    push("timestamp", summary.timestamp.to_rfc3339());

    for (name, stats) in [
        ("positive", &summary.positive),
        ("negative", &summary.negative),
        ("neutral", &summary.neutral),
    ] {
        push(&format!("rt_{name}_mean"), opt_f64(stats.mean_rt));
        push(&format!("rt_{name}_sd"), opt_f64(stats.sd_rt));
        push(&format!("acc_{name}"), opt_f64(stats.accuracy));
        push(&format!("n_{name}"), stats.n.to_string());
    }

    push("interference_negative", opt_f64(summary.interference_negative));
    push("interference_positive", opt_f64(summary.interference_positive));
    push("rt_overall_mean", opt_f64(summary.rt_overall_mean));
    push("acc_overall", opt_f64(summary.acc_overall));
    push("n_total", summary.n_total.to_string());
    push("practice_acc", opt_f64(summary.practice_acc));
    push("practice_rt_mean", opt_f64(summary.practice_rt_mean));

    for (i, r) in practice.iter().enumerate() {
        let i = i + 1;
        push(&format!("p{i}_word"), r.word.clone());
        push(&format!("p{i}_color"), r.color.as_str().to_owned());
        push(&format!("p{i}_resp"), r.response.as_str().to_owned());
        push(&format!("p{i}_acc"), r.accuracy.to_string());
        push(&format!("p{i}_rt"), format!("{:.4}", r.rt_seconds));
    }

    for (i, r) in experimental.iter().enumerate() {
        let i = i + 1;
        push(&format!("t{i}_word"), r.word.clone());
        push(&format!("t{i}_cond"), r.condition.short_code().to_owned());
        push(&format!("t{i}_color"), r.color.as_str().to_owned());
        push(&format!("t{i}_resp"), r.response.as_str().to_owned());
        push(&format!("t{i}_acc"), r.accuracy.to_string());
        push(&format!("t{i}_rt"), format!("{:.4}", r.rt_seconds));
    }

    row
}

fn opt_f64(v: Option<f64>) -> String {
    v.map(|v| format!("{v}")).unwrap_or_default()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1); undefined for fewer than 2 values.
fn sample_sd(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn accuracy(records: &[&ResponseRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let correct = records.iter().filter(|r| r.is_correct()).count();
    Some(correct as f64 / records.len() as f64)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
