// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by session flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"session_broker.flow",
				flow = kind.as_str(),
				stage,
				credential = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Records the fingerprint of the credential the flow is working with.
	pub fn record_credential(&self, fingerprint: &str) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("credential", fingerprint);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = fingerprint;
		}
	}

	/// Emits a warning event inside the span.
	pub fn warn(&self, message: &'static str, error: &dyn Display) {
		#[cfg(feature = "tracing")]
		{
			tracing::warn!(parent: &self.span, error = %error, "{message}");
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (message, error);
		}
	}

	/// Emits a debug event inside the span.
	pub fn debug(&self, message: &'static str) {
		#[cfg(feature = "tracing")]
		{
			tracing::debug!(parent: &self.span, "{message}");
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = message;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
