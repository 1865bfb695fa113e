use std::collections::HashSet;

use crate::{fragment::Candidate, rerank::cmp_f32_desc};

/// Structural hits first, then semantic hits by similarity. The first occurrence of an id wins.
pub fn merge_candidates(structural: Vec<Candidate>, mut semantic: Vec<Candidate>) -> Vec<Candidate> {
	semantic.sort_by(|a, b| {
		cmp_f32_desc(a.similarity(), b.similarity()).then_with(|| a.id().cmp(&b.id()))
	});

	let mut seen = HashSet::new();
	let mut out = Vec::with_capacity(structural.len() + semantic.len());

	for candidate in structural.into_iter().chain(semantic) {
		if seen.insert(candidate.id()) {
			out.push(candidate);
		}
	}

	out
}
