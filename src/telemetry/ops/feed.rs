use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Feed;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Normalize, Commit, Fetch, Paginate, Resolve, Ingest }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Normalize => "normalize",
        Phase::Commit => "commit",
        Phase::Fetch => "fetch",
        Phase::Paginate => "paginate",
        Phase::Resolve => "resolve",
        Phase::Ingest => "ingest",
    }}
    fn span(&self) -> Span { match self {
        Phase::Normalize => info_span!("normalize"),
        Phase::Commit => info_span!("commit"),
        Phase::Fetch => info_span!("fetch"),
        Phase::Paginate => info_span!("paginate"),
        Phase::Resolve => info_span!("resolve"),
        Phase::Ingest => info_span!("ingest"),
    }}
}

impl OpMarker for Feed {
    const NAME: &'static str = "feed";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("feed") }
}
