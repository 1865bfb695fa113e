pub mod context;
pub mod fragment;
pub mod gate;
pub mod merge;
pub mod query;
pub mod reference;
pub mod rerank;

pub use fragment::{Candidate, CandidateSource, Fragment, FragmentReject, Locator, NewFragment};
pub use gate::{Evidence, EvidenceState, RefusalMessages};
pub use query::{ExpansionMode, QueryPlan};
pub use reference::LegalReferences;
pub use rerank::{RerankPolicy, RerankQueryMode, ScoredCandidate};
