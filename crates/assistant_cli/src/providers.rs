use std::sync::Arc;

use agent_provider::{ProviderInitError, RunProvider};
use agent_provider_mock::{MockProvider, ECHO_PROVIDER_ID, MOCK_PROVIDER_ID};

/// The echo backend quotes each question, so repeated questions still get
/// distinct answers.
pub const DEFAULT_PROVIDER_ID: &str = ECHO_PROVIDER_ID;

/// Resolves `provider_id`, falling back to [`DEFAULT_PROVIDER_ID`].
pub fn provider_for_id(
    provider_id: Option<&str>,
) -> Result<Arc<dyn RunProvider>, ProviderInitError> {
    match provider_id.map(str::trim).unwrap_or(DEFAULT_PROVIDER_ID) {
        ECHO_PROVIDER_ID => Ok(Arc::new(MockProvider::echo())),
        MOCK_PROVIDER_ID => Ok(Arc::new(MockProvider::default())),
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {ECHO_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        ))),
    }
}
