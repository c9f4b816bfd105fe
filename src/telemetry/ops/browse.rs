use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Browse;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Setup, Scroll, Poll, Output }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Setup => "setup", Phase::Scroll => "scroll", Phase::Poll => "poll", Phase::Output => "output" } }
    fn span(&self) -> Span { match self { Phase::Setup => info_span!("setup"), Phase::Scroll => info_span!("scroll"), Phase::Poll => info_span!("poll"), Phase::Output => info_span!("output") } }
}

impl OpMarker for Browse {
    const NAME: &'static str = "browse";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("browse") }
}

#[derive(Copy, Clone, Debug)]
pub struct Normalize;

#[derive(Copy, Clone, Debug)]
pub enum NormalizePhase { Merge, Output }

impl PhaseSpan for NormalizePhase {
    fn name(&self) -> &'static str { match self { NormalizePhase::Merge => "merge", NormalizePhase::Output => "output" } }
    fn span(&self) -> Span { match self { NormalizePhase::Merge => info_span!("merge"), NormalizePhase::Output => info_span!("output") } }
}

impl OpMarker for Normalize {
    const NAME: &'static str = "normalize";
    type Phase = NormalizePhase;
    fn root_span() -> Span { info_span!("normalize") }
}
