// self
use crate::_prelude::*;

/// How the API expects credentials and how it reports that they were refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConvention {
	/// Scheme prefixed to the access token in the `Authorization` header.
	pub scheme: String,
	/// Status code reserved for authentication failure.
	pub unauthorized_status: u16,
}
impl Default for AuthConvention {
	fn default() -> Self {
		Self { scheme: "Bearer".into(), unauthorized_status: 401 }
	}
}
