//! Counters emitted through the global `metrics` recorder; without the `metrics` feature every
//! function here compiles to nothing.

// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter labeled by `flow` + `outcome`, bumped on every attempt and resolution.
pub const FLOW_COUNTER: &str = "bff_relay_flow_total";
/// Counter labeled by the resource `status` that sent a relay request into a refresh.
pub const REFRESH_TRIGGER_COUNTER: &str = "bff_relay_refresh_trigger_total";

/// Records a flow outcome.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
			.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records why a relay request refreshed; `None` means no usable first reply existed.
pub fn record_refresh_trigger(status: Option<u16>) {
	#[cfg(feature = "metrics")]
	{
		let status = status.map_or_else(|| "none".to_owned(), |status| status.to_string());

		metrics::counter!(REFRESH_TRIGGER_COUNTER, "status" => status).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = status;
}
