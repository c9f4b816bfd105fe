pub mod config;
pub mod presenter;
pub mod types;

use anyhow::Result;
use serde::Serialize;

pub use presenter::Emitter;
pub use types::{Envelope, Meta};

use config::OutputConfig;

fn emitter() -> Emitter {
    let cfg = OutputConfig::from_env().with_json(crate::telemetry::config::json_mode());
    Emitter::from_config(cfg)
}

pub fn emit_plan<T: Serialize>(op: &'static str, plan: &T, meta: Option<Meta>) -> Result<()> {
    let env = Envelope::plan(op, plan, meta)?;
    emitter().emit(&env)?;
    Ok(())
}

pub fn emit_result<T: Serialize>(op: &'static str, result: &T, meta: Option<Meta>) -> Result<()> {
    let env = Envelope::result(op, result, meta)?;
    emitter().emit(&env)?;
    Ok(())
}
