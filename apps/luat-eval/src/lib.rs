use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use luat_domain::EvidenceState;
use luat_service::{EvidenceResult, LuatService};

#[derive(Debug, Parser)]
#[command(
	version = luat_cli::VERSION,
	rename_all = "kebab",
	styles = luat_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Cut-off for the ranking metrics. Defaults to `rerank.top_k`, or the full grounding.
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	#[arg(long, value_name = "N", default_value_t = 1)]
	pub runs_per_query: u32,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	question: String,
	#[serde(default)]
	expected_fragment_ids: Vec<i64>,
	#[serde(default)]
	expect_refusal: bool,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	generated_at: String,
	dataset: EvalDatasetInfo,
	settings: EvalSettings,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	query_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSettings {
	config_path: String,
	expansion_mode: String,
	rerank_threshold: f32,
	min_results: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	top_k: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	runs_per_query: Option<u32>,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	avg_recall_at_k: f64,
	avg_precision_at_k: f64,
	mean_rr: f64,
	mean_ndcg: f64,
	refusal_accuracy: f64,
	error_count: usize,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	stability: Option<StabilitySummary>,
}

#[derive(Debug, Serialize)]
struct StabilitySummary {
	runs_per_query: u32,
	avg_positional_churn_at_k: f64,
	avg_set_churn_at_k: f64,
	/// Queries whose grounding differed between runs.
	unstable_queries: usize,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	question: String,
	trace_id: Uuid,
	#[serde(skip_serializing_if = "Option::is_none")]
	trace_ids: Option<Vec<Uuid>>,
	evidence: Option<EvidenceState>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
	expect_refusal: bool,
	refusal_correct: bool,
	expected_count: usize,
	retrieved_count: usize,
	relevant_count: usize,
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	latency_ms: f64,
	expected_fragment_ids: Vec<i64>,
	retrieved_fragment_ids: Vec<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	stability: Option<QueryStability>,
}

#[derive(Debug, Serialize, Clone, Copy)]
struct QueryStability {
	runs_per_query: u32,
	positional_churn_at_k: f64,
	set_churn_at_k: f64,
	identical: bool,
}

struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	relevant_count: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = luat_config::load(&args.config)?;
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let dataset = load_dataset(&args.dataset)?;
	let service = LuatService::open(config).await?;
	let output = evaluate(&service, &dataset, &args).await?;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}
	if let Some(query) = dataset.queries.iter().find(|query| query.question.trim().is_empty()) {
		return Err(eyre::eyre!(
			"Dataset query {:?} has an empty question.",
			query.id.as_deref().unwrap_or("<unnamed>")
		));
	}

	Ok(dataset)
}

async fn evaluate(
	service: &LuatService,
	dataset: &EvalDataset,
	args: &Args,
) -> color_eyre::Result<EvalOutput> {
	let top_k = args.top_k.or(service.cfg.rerank.top_k);
	let runs_per_query = args.runs_per_query.max(1);
	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let id = query.id.clone().unwrap_or_else(|| format!("q{}", index + 1));
		let (first, latency_ms, stability, trace_ids) =
			run_query_n_times(service, &query.question, runs_per_query, top_k).await?;
		let retrieved = cut(first.grounding_ids(), top_k);
		let expected: HashSet<i64> = query.expected_fragment_ids.iter().copied().collect();
		let metrics = compute_metrics(&retrieved, &expected);
		let refusal_correct = first.error.is_none() && first.is_refusal() == query.expect_refusal;

		tracing::info!(
			query_id = %id,
			evidence = ?first.evidence,
			recall_at_k = metrics.recall_at_k,
			refusal_correct,
			"Evaluated query."
		);

		reports.push(QueryReport {
			id,
			question: query.question.clone(),
			trace_id: first.trace_id,
			trace_ids: (trace_ids.len() > 1).then_some(trace_ids),
			evidence: first.evidence,
			error: first.error.clone(),
			expect_refusal: query.expect_refusal,
			refusal_correct,
			expected_count: expected.len(),
			retrieved_count: retrieved.len(),
			relevant_count: metrics.relevant_count,
			recall_at_k: metrics.recall_at_k,
			precision_at_k: metrics.precision_at_k,
			rr: metrics.rr,
			ndcg: metrics.ndcg,
			latency_ms,
			expected_fragment_ids: query.expected_fragment_ids.clone(),
			retrieved_fragment_ids: retrieved,
			stability,
		});
		latencies_ms.push(latency_ms);
	}

	let mut summary = summarize(&reports, &latencies_ms);

	if runs_per_query > 1 {
		summary.stability = summarize_stability(&reports, runs_per_query);
	}

	let generated_at = OffsetDateTime::now_utc().format(&Rfc3339)?;

	Ok(EvalOutput {
		generated_at,
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "eval".to_string()),
			query_count: reports.len(),
		},
		settings: EvalSettings {
			config_path: args.config.display().to_string(),
			expansion_mode: service.cfg.expansion.mode.clone(),
			rerank_threshold: service.cfg.rerank.threshold,
			min_results: service.cfg.rerank.min_results,
			top_k,
			runs_per_query: (runs_per_query > 1).then_some(runs_per_query),
		},
		summary,
		queries: reports,
	})
}

async fn run_query_n_times(
	service: &LuatService,
	question: &str,
	runs_per_query: u32,
	top_k: Option<u32>,
) -> color_eyre::Result<(EvidenceResult, f64, Option<QueryStability>, Vec<Uuid>)> {
	let runs = runs_per_query.max(1);
	let mut first: Option<EvidenceResult> = None;
	let mut baseline: Vec<i64> = Vec::new();
	let mut trace_ids = Vec::with_capacity(runs as usize);
	let mut latency_total_ms = 0.0_f64;
	let mut positional_churn_sum = 0.0_f64;
	let mut set_churn_sum = 0.0_f64;
	let mut churn_count = 0_u32;
	let mut identical = true;

	for run_idx in 0..runs {
		let start = Instant::now();
		let result = service.ground(question).await;

		latency_total_ms += start.elapsed().as_secs_f64() * 1_000.0;

		trace_ids.push(result.trace_id);

		let retrieved = cut(result.grounding_ids(), top_k);

		if run_idx == 0 {
			baseline = retrieved;
			first = Some(result);

			continue;
		}

		let k = top_k.map(|k| k as usize).unwrap_or(baseline.len().max(retrieved.len()));
		let (positional_churn_at_k, set_churn_at_k) =
			churn_against_baseline_at_k(&baseline, &retrieved, k);

		identical &= retrieved == baseline;
		positional_churn_sum += positional_churn_at_k;
		set_churn_sum += set_churn_at_k;
		churn_count += 1;
	}

	let stability = (churn_count > 0).then(|| QueryStability {
		runs_per_query: runs,
		positional_churn_at_k: positional_churn_sum / churn_count as f64,
		set_churn_at_k: set_churn_sum / churn_count as f64,
		identical,
	});
	let first = first.ok_or_else(|| eyre::eyre!("No grounding results were collected."))?;

	Ok((first, latency_total_ms / runs as f64, stability, trace_ids))
}

fn cut(mut ids: Vec<i64>, top_k: Option<u32>) -> Vec<i64> {
	if let Some(k) = top_k {
		ids.truncate(k as usize);
	}

	ids
}

fn churn_against_baseline_at_k(baseline: &[i64], other: &[i64], k: usize) -> (f64, f64) {
	let k = k.max(1);
	let positional_diff = (0..k).filter(|idx| baseline.get(*idx) != other.get(*idx)).count();
	let positional_churn = positional_diff as f64 / k as f64;
	let base_set: HashSet<i64> = baseline.iter().take(k).copied().collect();
	let other_set: HashSet<i64> = other.iter().take(k).copied().collect();
	let union = base_set.union(&other_set).count();
	let overlap = base_set.intersection(&other_set).count();
	let set_churn = if union == 0 { 0.0 } else { 1.0 - (overlap as f64 / union as f64) };

	(positional_churn, set_churn)
}

fn compute_metrics(retrieved: &[i64], expected: &HashSet<i64>) -> Metrics {
	let mut relevant_count = 0_usize;
	let mut dcg = 0.0_f64;
	let mut first_hit: Option<usize> = None;

	for (idx, id) in retrieved.iter().enumerate() {
		if !expected.contains(id) {
			continue;
		}

		let rank = idx + 1;

		relevant_count += 1;
		dcg += 1.0 / (rank as f64 + 1.0).log2();

		if first_hit.is_none() {
			first_hit = Some(rank);
		}
	}

	let rr = first_hit.map(|rank| 1.0 / rank as f64).unwrap_or(0.0);
	let idcg: f64 = (1..=expected.len().min(retrieved.len()))
		.map(|rank| 1.0 / (rank as f64 + 1.0).log2())
		.sum();
	let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };
	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected.is_empty() { 0.0 } else { relevant_count as f64 / expected.len() as f64 };

	Metrics { recall_at_k, precision_at_k, rr, ndcg, relevant_count }
}

/// Ranking metrics average over queries that expect evidence; refusal accuracy covers all.
fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let ranked: Vec<&QueryReport> =
		reports.iter().filter(|report| report.expected_count > 0).collect();
	let ranked_count = ranked.len().max(1) as f64;
	let mean = |metric: fn(&QueryReport) -> f64| {
		ranked.iter().map(|report| metric(report)).sum::<f64>() / ranked_count
	};
	let refusal_correct = reports.iter().filter(|report| report.refusal_correct).count();
	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

	EvalSummary {
		avg_recall_at_k: mean(|report| report.recall_at_k),
		avg_precision_at_k: mean(|report| report.precision_at_k),
		mean_rr: mean(|report| report.rr),
		mean_ndcg: mean(|report| report.ndcg),
		refusal_accuracy: refusal_correct as f64 / reports.len().max(1) as f64,
		error_count: reports.iter().filter(|report| report.error.is_some()).count(),
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
		stability: None,
	}
}

fn summarize_stability(reports: &[QueryReport], runs_per_query: u32) -> Option<StabilitySummary> {
	let stabilities: Vec<QueryStability> =
		reports.iter().filter_map(|report| report.stability).collect();

	if stabilities.is_empty() {
		return None;
	}

	let count = stabilities.len() as f64;

	Some(StabilitySummary {
		runs_per_query,
		avg_positional_churn_at_k: stabilities.iter().map(|s| s.positional_churn_at_k).sum::<f64>()
			/ count,
		avg_set_churn_at_k: stabilities.iter().map(|s| s.set_churn_at_k).sum::<f64>() / count,
		unstable_queries: stabilities.iter().filter(|s| !s.identical).count(),
	})
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
